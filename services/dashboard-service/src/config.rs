use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Environment-driven service configuration.
///
/// `HASHDECK_LISTEN_ADDR` (default `0.0.0.0:8080`), `HASHDECK_DATA_DIR`
/// (RocksDB path; in-memory state when unset), `HASHDECK_TICK_SECS`
/// (simulation interval, default 3).
#[derive(Debug, Clone)]
pub(crate) struct ServiceConfig {
    pub(crate) listen_addr: SocketAddr,
    pub(crate) data_dir: Option<String>,
    pub(crate) tick_interval: Duration,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        let listen_addr = match env::var("HASHDECK_LISTEN_ADDR") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("invalid HASHDECK_LISTEN_ADDR: {value}"))?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let data_dir = env::var("HASHDECK_DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let tick_secs = match env::var("HASHDECK_TICK_SECS") {
            Ok(value) => value
                .parse::<u64>()
                .with_context(|| format!("invalid HASHDECK_TICK_SECS: {value}"))?,
            Err(_) => 3,
        };

        Ok(Self {
            listen_addr,
            data_dir,
            tick_interval: Duration::from_secs(tick_secs.max(1)),
        })
    }
}
