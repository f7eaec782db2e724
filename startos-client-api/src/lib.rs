//! Client side of the StartOS server API.
//!
//! [`ApiService`] lists every operation. [`RpcApiService`] implements it over
//! JSON-RPC and is also the [`PatchSource`](startos_client_db::PatchSource)
//! that feeds the local database replica; [`Client`] wires the two together.

pub mod client;
pub mod config;
pub mod error;
pub mod rpc;
pub mod service;
pub mod session;
pub mod types;
mod validate;

pub use client::Client;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use rpc::RpcApiService;
pub use service::{ApiService, ApiStream};
pub use session::{SessionEvent, SessionEvents, SessionTopic};
