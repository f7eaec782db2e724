use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{ColorChoice, Parser};
use startos_client_api::ApiConfig;
use startos_client_db::SyncConfig;

#[derive(Parser, Debug, Clone)]
pub struct Options {
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[arg(long, global = true, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Address of the server
    #[arg(long, global = true, env = "STARTOS_URL", default_value = "http://start9.local")]
    pub url: String,

    /// Session token, as printed by `startos login`
    #[arg(long, global = true, env = "STARTOS_SESSION", hide_env_values = true)]
    pub session: Option<String>,

    /// Maximum number of out-of-order patches to hold before resynchronizing
    #[arg(long, global = true, value_name = "COUNT")]
    pub patch_buffer: Option<usize>,

    /// How long to wait for a missing patch before resynchronizing
    #[arg(long, global = true, value_name = "MILLISECONDS")]
    pub gap_timeout_ms: Option<u64>,
}

impl Options {
    pub fn api_config(&self) -> Result<ApiConfig> {
        Ok(ApiConfig::new(&self.url)
            .with_context(|| format!("invalid server url {}", self.url))?
            .with_session(self.session.clone()))
    }

    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::default();
        if let Some(n) = self.patch_buffer {
            config.max_buffered_patches = n;
        }
        if let Some(ms) = self.gap_timeout_ms {
            config.gap_timeout = Duration::from_millis(ms);
        }
        config
    }

    /// Whether stderr output may use ANSI colors.
    pub fn use_color(&self) -> bool {
        match self.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    struct Wrapper {
        #[command(flatten)]
        options: Options,
    }

    fn parse(args: &[&str]) -> Options {
        Wrapper::try_parse_from(std::iter::once("startos").chain(args.iter().copied()))
            .unwrap()
            .options
    }

    #[test]
    fn test_sync_config() {
        let options = parse(&["--patch-buffer", "10", "--gap-timeout-ms", "250"]);
        let config = options.sync_config();
        assert_eq!(config.max_buffered_patches, 10);
        assert_eq!(config.gap_timeout, Duration::from_millis(250));

        let defaults = parse(&[]).sync_config();
        assert_eq!(defaults, SyncConfig::default());
    }

    #[test]
    fn test_api_config() {
        let options = parse(&["--url", "https://10.0.0.2", "--session", "abc"]);
        let config = options.api_config().unwrap();
        assert_eq!(config.rpc_url, "https://10.0.0.2/rpc/v1");
        assert_eq!(config.session.as_deref(), Some("abc"));

        assert!(parse(&["--url", "start9.local"]).api_config().is_err());
    }
}
