use std::io::{BufRead as _, IsTerminal as _, Write as _};

use anyhow::{bail, Context as _, Result};
use serde_json::json;
use startos_client_api::{types::LoginReq, ApiService as _};
use tracing::warn;

use crate::{application, options::Options};

#[derive(clap::Args, Debug)]
pub struct LoginArgs {
    /// Let the session expire when the server restarts
    #[arg(long, default_value_t = false)]
    ephemeral: bool,
}

/// Log in with a password read from stdin, and print the session token.
pub async fn login(options: &Options, args: &LoginArgs) -> Result<()> {
    let password = read_password()?;
    let api = application::api(options)?;
    api.login(LoginReq {
        password,
        metadata: json!({ "platforms": ["cli"] }),
        ephemeral: args.ephemeral,
    })
    .await
    .context("logging in")?;
    match api.session() {
        Some(session) => println!("{}", session),
        None => warn!("The server did not hand out a session token"),
    }
    Ok(())
}

pub async fn logout(options: &Options) -> Result<()> {
    application::api(options)?
        .logout()
        .await
        .context("logging out")?;
    Ok(())
}

fn read_password() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprint!("Password: ");
        std::io::stderr().flush()?;
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line).context("reading password")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("no password given");
    }
    Ok(password.to_owned())
}
