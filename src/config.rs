use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

const DEFAULT_STORE_PATH: &str = "carbonflow.db";
const DEFAULT_DATA_PATH: &str = "demos/database.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store_path: PathBuf,
    pub data_path: PathBuf,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let timeout_secs = match lookup("CARBONFLOW_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("CARBONFLOW_UPSTREAM_TIMEOUT_SECS is not a number: {raw}"))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            store_path: lookup("CARBONFLOW_STORE_PATH")
                .unwrap_or_else(|| DEFAULT_STORE_PATH.to_string())
                .into(),
            data_path: lookup("CARBONFLOW_DATA_PATH")
                .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string())
                .into(),
            upstream_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.store_path, PathBuf::from("carbonflow.db"));
        assert_eq!(config.data_path, PathBuf::from("demos/database.json"));
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn reads_overrides() {
        let env = HashMap::from([
            ("CARBONFLOW_STORE_PATH", "/tmp/cache.db"),
            ("CARBONFLOW_UPSTREAM_TIMEOUT_SECS", "3"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/cache.db"));
        assert_eq!(config.upstream_timeout, Duration::from_secs(3));
    }

    #[test]
    fn rejects_bad_timeout() {
        let result = Config::from_lookup(|key| {
            (key == "CARBONFLOW_UPSTREAM_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
