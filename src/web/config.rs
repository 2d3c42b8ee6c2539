//! Configuration types and constants for the looknlink-web server.

use std::path::PathBuf;

use clap::Parser;

pub(crate) const MAX_WS_CONNECTIONS: usize = 64;
pub(crate) const DB_FILE_NAME: &str = "looknlink.db";
pub(crate) const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Web server for the LooknLink link-sharing app.
///
/// Provides a REST API and a WebSocket change stream over a SQLite-backed
/// tree store.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug, Default)]
#[command(name = "looknlink-web", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: LOOKNLINK_WEB_BIND] [default: 127.0.0.1:3000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database [env: LOOKNLINK_HOME] [default: ~/.looknlink]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,

    /// Number of link previews kept in memory [default: 256]
    #[arg(long)]
    pub preview_cache: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
    pub preview_cache: usize,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("LOOKNLINK_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".looknlink"))
                    .unwrap_or_else(|_| PathBuf::from(".looknlink"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("LOOKNLINK_WEB_BIND").ok())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        Self {
            bind_addr,
            data_dir,
            preview_cache: cli
                .preview_cache
                .unwrap_or(crate::preview::DEFAULT_CACHE_CAPACITY),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_take_precedence() {
        let cli = Cli {
            bind: Some("0.0.0.0:9000".into()),
            data_dir: Some(PathBuf::from("/tmp/lnl")),
            preview_cache: Some(8),
        };
        let config = Config::from_cli_and_env(cli);
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/lnl/looknlink.db"));
        assert_eq!(config.preview_cache, 8);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from(["looknlink-web", "-b", "127.0.0.1:4000", "-d", "/data"]);
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1:4000"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(cli.preview_cache, None);
    }
}
