//! Process configuration, read from the environment.

use log::warn;
use std::env;

const BIND_ADDR_VAR: &str = "CAPSULES_BIND_ADDR";
const MAX_WORK_VAR: &str = "CAPSULES_MAX_WORK";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_MAX_WORK: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Upper bound on `maxTriesCount * maxFixesCount * generateCount` for
    /// one request. The solver has no timeout, so this bounds how long a
    /// request can hold a blocking thread.
    pub max_work: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_work: DEFAULT_MAX_WORK,
        }
    }
}

impl ServerConfig {
    /// Reads `CAPSULES_BIND_ADDR` and `CAPSULES_MAX_WORK`, falling back to
    /// the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let bind_addr = lookup(BIND_ADDR_VAR)
            .filter(|addr| !addr.trim().is_empty())
            .unwrap_or(defaults.bind_addr);
        let max_work = match lookup(MAX_WORK_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(max_work) if max_work > 0 => max_work,
                _ => {
                    warn!("Ignoring {MAX_WORK_VAR}={raw:?}, using {}", defaults.max_work);
                    defaults.max_work
                }
            },
            None => defaults.max_work,
        };
        Self {
            bind_addr,
            max_work,
        }
    }
}
