//! Types shared by the `startos` client crates.
//!
//! - [`id`]: validated identifiers
//! - [`model`]: the mirrored server document and its package entries
//! - [`patch`]: snapshot and patch records as they travel over the wire
//! - [`lifecycle`]: pure rules that interpret package entries

pub mod id;
pub mod lifecycle;
pub mod model;
pub mod patch;
