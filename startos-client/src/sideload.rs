use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde_json::Value;
use startos_client_api::{types::SideloadPackageReq, ApiService as _};
use tracing::info;

use crate::{application, interrupt::InterruptState, options::Options};

#[derive(clap::Args, Debug)]
pub struct Args {
    /// The package file to upload
    file: PathBuf,

    /// JSON file with the manifest of the package
    #[arg(long)]
    manifest: PathBuf,

    /// Icon of the package, as a data url
    #[arg(long, default_value = "data:image/png;base64,")]
    icon: String,

    /// Print install progress until the install completes
    #[arg(long, default_value_t = false)]
    follow: bool,
}

/// Announce the package, upload it, and print the id to follow its install
/// progress with.
pub async fn sideload(interrupt_state: &InterruptState, options: &Options, args: &Args) -> Result<()> {
    let manifest = std::fs::read(&args.manifest)
        .with_context(|| format!("reading {}", args.manifest.display()))?;
    let manifest: Value = serde_json::from_slice(&manifest)
        .with_context(|| format!("parsing manifest {}", args.manifest.display()))?;
    let body = std::fs::read(&args.file).with_context(|| format!("reading {}", args.file.display()))?;

    let api = application::api(options)?;
    let res = api
        .sideload_package(SideloadPackageReq {
            manifest,
            icon: args.icon.clone(),
        })
        .await
        .context("announcing sideload")?;
    info!(bytes = body.len(), "Uploading package");
    api.upload_package(&res.upload, body)
        .await
        .context("uploading package")?;
    println!("{}", res.progress);

    if args.follow {
        let progress = api
            .follow_install_progress(&res.progress)
            .await
            .context("following install progress")?;
        application::print_until_interrupted(interrupt_state, progress).await?;
    }
    Ok(())
}
