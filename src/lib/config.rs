use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::adapters::HttpServerConfig;
use crate::core::{OverflowPolicy, QueueConfig, RelayError};

/// Command line and environment settings for the relay server.
#[derive(Debug, Clone, Parser)]
#[command(name = "relay", about = "Store-and-forward relay: receive, persist, transmit")]
pub struct Settings {
    /// Server port.
    #[arg(long, env = "RELAY_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Directory to store the database in.
    #[arg(long, env = "RELAY_PATH", default_value = "./")]
    pub path: PathBuf,

    /// Queue name; the store file is `<path>/<name>.db`.
    #[arg(long, env = "RELAY_NAME", default_value = "rxtx")]
    pub name: String,

    /// Seconds between transmissions.
    #[arg(long, env = "RELAY_INTERVAL", default_value_t = 60)]
    pub interval: u64,

    /// Messages per transmitted batch.
    #[arg(long, env = "RELAY_BATCH", default_value_t = 100)]
    pub batch: usize,

    /// Max number of messages kept while the collector is failing.
    #[arg(long, env = "RELAY_MAXQ", default_value_t = 100_000)]
    pub maxq: usize,

    /// Collector endpoint batches are POSTed to.
    #[arg(long, env = "RELAY_INGEST", default_value = "http://localhost:8081/in")]
    pub ingest: String,

    /// Also enforce maxq after successful transmissions.
    #[arg(long, env = "RELAY_TRIM_ON_SUCCESS")]
    pub trim_on_success: bool,

    /// Log every HTTP request.
    #[arg(long)]
    pub verbose: bool,
}

impl Settings {
    pub fn queue_config(&self) -> Result<QueueConfig, RelayError> {
        let config = QueueConfig {
            interval: Duration::from_secs(self.interval),
            batch_size: self.batch,
            max_queue_size: self.maxq,
            receiver: self.ingest.clone(),
            overflow_policy: if self.trim_on_success {
                OverflowPolicy::Always
            } else {
                OverflowPolicy::OnFailure
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.path.join(format!("{}.db", self.name))
    }

    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], self.port)),
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original_agent() {
        let settings = Settings::try_parse_from(["relay"]).unwrap();
        let config = settings.queue_config().unwrap();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_queue_size, 100_000);
        assert_eq!(config.receiver, "http://localhost:8081/in");
        assert_eq!(config.overflow_policy, OverflowPolicy::OnFailure);
        assert_eq!(settings.store_path(), PathBuf::from("./rxtx.db"));
        assert_eq!(settings.http_config().addr.port(), 8080);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "relay",
            "--port",
            "9000",
            "--path",
            "/var/lib/relay",
            "--interval",
            "5",
            "--batch",
            "10",
            "--maxq",
            "50",
            "--ingest",
            "http://collector/in",
            "--trim-on-success",
            "--verbose",
        ])
        .unwrap();
        let config = settings.queue_config().unwrap();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_queue_size, 50);
        assert_eq!(config.overflow_policy, OverflowPolicy::Always);
        assert_eq!(settings.store_path(), PathBuf::from("/var/lib/relay/rxtx.db"));
        assert!(settings.http_config().verbose);
    }

    #[test]
    fn rejects_zero_batch_and_interval() {
        let settings = Settings::try_parse_from(["relay", "--batch", "0"]).unwrap();
        assert!(matches!(settings.queue_config(), Err(RelayError::Config(_))));
        let settings = Settings::try_parse_from(["relay", "--interval", "0"]).unwrap();
        assert!(matches!(settings.queue_config(), Err(RelayError::Config(_))));
    }
}
