use anyhow::{Context as _, Result};
use startos_client_api::{
    types::{FollowLogsReq, LogEntry, LogsReq},
    ApiService as _,
};

use crate::{application, interrupt::InterruptState, options::Options};

#[derive(clap::Args, Debug)]
pub struct LogsArgs {
    /// Number of entries to show
    #[arg(long, short = 'n')]
    pub limit: Option<u32>,

    /// Keep printing new entries until interrupted
    #[arg(long, short, default_value_t = false)]
    pub follow: bool,
}

pub async fn state(options: &Options) -> Result<()> {
    let state = application::api(options)?
        .get_state()
        .await
        .context("getting server state")?;
    println!("{}", serde_json::to_string(&state)?);
    Ok(())
}

pub async fn logs(interrupt_state: &InterruptState, options: &Options, args: &LogsArgs) -> Result<()> {
    let api = application::api(options)?;
    if args.follow {
        let stream = api
            .follow_server_logs(FollowLogsReq { limit: args.limit })
            .await
            .context("following server logs")?;
        return application::print_until_interrupted(interrupt_state, stream).await;
    }
    let logs = api
        .get_server_logs(LogsReq {
            limit: args.limit,
            ..Default::default()
        })
        .await
        .context("getting server logs")?;
    print_entries(&logs.entries);
    Ok(())
}

pub async fn metrics(options: &Options) -> Result<()> {
    let metrics = application::api(options)?
        .get_server_metrics()
        .await
        .context("getting server metrics")?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

pub fn print_entries(entries: &[LogEntry]) {
    for entry in entries {
        println!("{} {}", entry.timestamp, entry.message);
    }
}
