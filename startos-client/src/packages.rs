use anyhow::{Context as _, Result};
use futures_util::StreamExt as _;
use startos_client_api::{
    types::{FollowLogsReq, FollowPackageLogsReq, InstallPackageReq, LogsReq, PackageLogsReq, PackageReq},
    ApiService as _,
};
use startos_client_core::{
    id::PackageId,
    lifecycle::{get_manifest, is_installed, needs_config, package_state, PackageState},
    model::PackageDataEntry,
};
use startos_client_db::packages::Packages;
use tracing::info;

use crate::{
    application,
    interrupt::{InterruptState, InterruptedError},
    options::Options,
    server::{print_entries, LogsArgs},
};

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Install a package from a marketplace
    Install {
        id: PackageId,

        /// Version to install
        #[arg(long)]
        version: String,

        #[arg(long, default_value = "https://registry.start9.com")]
        marketplace_url: String,

        /// Wait until the package is installed
        #[arg(long, default_value_t = false)]
        wait: bool,
    },
    Uninstall {
        id: PackageId,
    },
    Start {
        id: PackageId,
    },
    Stop {
        id: PackageId,
    },
    Restart {
        id: PackageId,
    },
    /// Show the logs of a package
    Logs {
        id: PackageId,

        #[command(flatten)]
        logs: LogsArgs,
    },
}

#[derive(Debug, PartialEq, Eq)]
struct PackageRow {
    id: PackageId,
    state: PackageState,
    version: String,
    needs_config: bool,
}

fn package_rows(packages: &Packages) -> Vec<PackageRow> {
    packages
        .iter()
        .map(|(id, entry)| PackageRow {
            id: id.clone(),
            state: package_state(entry),
            version: get_manifest(entry).version.clone(),
            needs_config: needs_config(id.as_str(), &entry.requested_actions),
        })
        .collect()
}

pub async fn list(interrupt_state: &InterruptState, options: &Options) -> Result<()> {
    application::with_client(interrupt_state, options, |client| async move {
        let packages = client
            .store()
            .get_all_packages()
            .context("decoding package data")?;
        println!("{:<24} {:<12} {:<16} NEEDS CONFIG", "ID", "STATE", "VERSION");
        for row in package_rows(&packages) {
            println!(
                "{:<24} {:<12} {:<16} {}",
                row.id,
                row.state.to_string(),
                row.version,
                if row.needs_config { "yes" } else { "no" }
            );
        }
        Ok(())
    })
    .await
}

pub async fn run(interrupt_state: &InterruptState, options: &Options, command: &Command) -> Result<()> {
    let api = application::api(options)?;
    match command {
        Command::Install {
            id,
            version,
            marketplace_url,
            wait,
        } => {
            if *wait {
                return install_and_wait(interrupt_state, options, id, version, marketplace_url).await;
            }
            api.install_package(InstallPackageReq {
                id: id.clone(),
                marketplace_url: marketplace_url.clone(),
                version: version.clone(),
            })
            .await
            .with_context(|| format!("installing {}", id))?;
        }
        Command::Uninstall { id } => {
            api.uninstall_package(PackageReq { id: id.clone() })
                .await
                .with_context(|| format!("uninstalling {}", id))?;
        }
        Command::Start { id } => {
            api.start_package(PackageReq { id: id.clone() })
                .await
                .with_context(|| format!("starting {}", id))?;
        }
        Command::Stop { id } => {
            api.stop_package(PackageReq { id: id.clone() })
                .await
                .with_context(|| format!("stopping {}", id))?;
        }
        Command::Restart { id } => {
            api.restart_package(PackageReq { id: id.clone() })
                .await
                .with_context(|| format!("restarting {}", id))?;
        }
        Command::Logs { id, logs } => {
            if logs.follow {
                let stream = api
                    .follow_package_logs(FollowPackageLogsReq {
                        id: id.clone(),
                        logs: FollowLogsReq { limit: logs.limit },
                    })
                    .await
                    .with_context(|| format!("following logs of {}", id))?;
                return application::print_until_interrupted(interrupt_state, stream).await;
            }
            let res = api
                .get_package_logs(PackageLogsReq {
                    id: id.clone(),
                    logs: LogsReq {
                        limit: logs.limit,
                        ..Default::default()
                    },
                })
                .await
                .with_context(|| format!("getting logs of {}", id))?;
            print_entries(&res.entries);
        }
    }
    Ok(())
}

/// Whether an install of `version` is done. An installed entry only counts
/// once the package went through another state, or when it already has the
/// requested version; otherwise it is the entry from before the request.
fn install_finished(seen_progress: bool, entry: &PackageDataEntry, version: &str) -> bool {
    is_installed(entry) && (seen_progress || get_manifest(entry).version == version)
}

/// Request the install, then follow the package entry until it is installed.
async fn install_and_wait(
    interrupt_state: &InterruptState,
    options: &Options,
    id: &PackageId,
    version: &str,
    marketplace_url: &str,
) -> Result<()> {
    application::with_client(interrupt_state, options, |client| async move {
        // Watch first, so that no transition is missed
        let entries = client.store().watch_package(id);
        futures_util::pin_mut!(entries);

        client
            .api()
            .install_package(InstallPackageReq {
                id: id.clone(),
                marketplace_url: marketplace_url.to_owned(),
                version: version.to_owned(),
            })
            .await
            .with_context(|| format!("installing {}", id))?;

        let mut seen_progress = false;
        loop {
            let entry = tokio::select! {
                entry = entries.next() => entry,
                _ = interrupt_state.interrupted() => return Err(InterruptedError {}.into()),
            };
            let Some(entry) = entry else {
                anyhow::bail!("stopped receiving updates for {}", id);
            };
            match entry.context("decoding package entry")? {
                Some(entry) if install_finished(seen_progress, &entry, version) => {
                    info!(package = %id, version = %get_manifest(&entry).version, "Installed");
                    return Ok(());
                }
                Some(entry) => {
                    seen_progress |= !is_installed(&entry);
                    info!(package = %id, state = %package_state(&entry), "Waiting");
                }
                None => {}
            }
        }
    })
    .await
}
