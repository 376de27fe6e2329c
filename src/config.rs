// Configuration from the environment
//
//   ISITOPEN_DB                 SQLite file            (isitopen.db)
//   ISITOPEN_BIND               server listen address  (0.0.0.0:3000)
//   ISITOPEN_LOG_JSON           JSON log lines         (false)
//   ISITOPEN_EXPIRY_MINUTES     status expiry window   (30)
//   ISITOPEN_CONFLICT_MINUTES   conflict window        (15)
//   ISITOPEN_PAGE_SIZE          default search page    (20)
//
// Unusable values fall back to the default and are remembered in
// `rejected`. Config is read before logging is up, so binaries call
// `log_rejected()` once the subscriber is installed.

use chrono::Duration;
use std::env;
use std::path::PathBuf;

use tracing::warn;

use crate::policy::{
    StatusPolicy, DEFAULT_CONFLICT_MINUTES, DEFAULT_EXPIRY_MINUTES, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};

pub const DEFAULT_DB_PATH: &str = "isitopen.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// A variable that was set but could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSetting {
    pub variable: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub log_json: bool,
    pub status_policy: StatusPolicy,
    pub page_size: u32,
    pub rejected: Vec<RejectedSetting>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            log_json: false,
            status_policy: StatusPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            rejected: Vec::new(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

/// Minute count that fits in a Duration and is strictly positive
fn parse_window(raw: &str) -> Option<Duration> {
    raw.parse::<i64>()
        .ok()
        .filter(|minutes| *minutes > 0)
        .and_then(Duration::try_minutes)
}

fn parse_page_size(raw: &str) -> Option<u32> {
    raw.parse::<u64>()
        .ok()
        .filter(|size| *size > 0)
        .map(|size| size.min(MAX_PAGE_SIZE as u64) as u32)
}

/// Reads variables and records the ones that had to be ignored
struct Reader<F> {
    lookup: F,
    rejected: Vec<RejectedSetting>,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn parsed<T>(&mut self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let raw = (self.lookup)(name)?;
        let value = parse(raw.trim());
        if value.is_none() {
            self.rejected.push(RejectedSetting {
                variable: name.to_string(),
                value: raw,
            });
        }
        value
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let mut reader = Reader {
            lookup,
            rejected: Vec::new(),
        };

        let expiry = reader
            .parsed("ISITOPEN_EXPIRY_MINUTES", parse_window)
            .unwrap_or_else(|| Duration::minutes(DEFAULT_EXPIRY_MINUTES));
        let conflict = reader
            .parsed("ISITOPEN_CONFLICT_MINUTES", parse_window)
            .unwrap_or_else(|| Duration::minutes(DEFAULT_CONFLICT_MINUTES));
        let page_size = reader
            .parsed("ISITOPEN_PAGE_SIZE", parse_page_size)
            .unwrap_or(defaults.page_size);
        let log_json = reader
            .parsed("ISITOPEN_LOG_JSON", parse_bool)
            .unwrap_or(defaults.log_json);

        Config {
            db_path: reader
                .text("ISITOPEN_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            bind_addr: reader
                .text("ISITOPEN_BIND")
                .unwrap_or(defaults.bind_addr),
            log_json,
            status_policy: StatusPolicy::new(expiry, conflict),
            page_size,
            rejected: reader.rejected,
        }
    }

    /// Warn about ignored settings. Call after `init_tracing`.
    pub fn log_rejected(&self) {
        for setting in &self.rejected {
            warn!(
                variable = %setting.variable,
                value = %setting.value,
                "ignoring invalid setting, using default"
            );
        }
    }
}
