use std::{future::Future, process::exit, sync::Arc};

use anyhow::{Context as _, Result};
use futures_util::{Stream, StreamExt as _};
use serde::Serialize;
use startos_client_api::{Client, RpcApiService};
use tracing::info;

use crate::{
    interrupt::{InterruptState, InterruptedError},
    options::Options,
};

/// Create the single-threaded tokio runtime used by the CLI.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio runtime")
}

/// Handle a Result, printing the error and exiting with code 1 on failure.
pub fn handle_result(r: Result<()>) {
    match r {
        Ok(()) => {}
        Err(e) => {
            eprintln!("startos error: {:?}", e);
            exit(1);
        }
    }
}

pub fn api(options: &Options) -> Result<Arc<RpcApiService>> {
    let api = RpcApiService::new(options.api_config()?).context("setting up the api client")?;
    Ok(Arc::new(api))
}

/// Run a command against a live replica of the server database.
///
/// Subscribes to the database, waits for the first snapshot and then runs
/// `f`. Synchronization stops when the last reference to the client is
/// dropped.
pub async fn with_client<F, Fut, R>(
    interrupt_state: &InterruptState,
    options: &Options,
    f: F,
) -> Result<R>
where
    F: FnOnce(Arc<Client<RpcApiService>>) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let client = Arc::new(Client::connect(api(options)?, options.sync_config()));
    let sequence = tokio::select! {
        r = client.sync().live() => r.context("subscribing to the server database")?,
        _ = interrupt_state.interrupted() => return Err(InterruptedError {}.into()),
    };
    info!(sequence, "Database loaded");
    f(client).await
}

/// Print every item as a line of JSON, until the stream ends or the user
/// interrupts.
pub async fn print_until_interrupted<S, T, E>(interrupt_state: &InterruptState, stream: S) -> Result<()>
where
    S: Stream<Item = Result<T, E>>,
    T: Serialize,
    E: std::error::Error + Send + Sync + 'static,
{
    futures_util::pin_mut!(stream);
    loop {
        tokio::select! {
            item = stream.next() => match item {
                Some(item) => println!("{}", serde_json::to_string(&item?)?),
                None => return Ok(()),
            },
            _ = interrupt_state.interrupted() => {
                info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}
