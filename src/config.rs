//! Runtime configuration read from the environment (and `.env`, if present).
//!
//! - `TASKLANE_BACKEND`: `memory` (default) | `supabase`
//! - `SUPABASE_URL`, `SUPABASE_ANON_KEY`: required for `supabase`
//! - `TASKLANE_LOG_FILE`: log destination (default `tasklane.log`)
//! - `RUST_LOG`: log filter (default `tasklane=info`)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

const DEFAULT_LOG_FILE: &str = "tasklane.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    #[default]
    Memory,
    Supabase,
}

impl FromStr for BackendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(BackendMode::Memory),
            "supabase" => Ok(BackendMode::Supabase),
            other => Err(Error::Config(format!(
                "invalid TASKLANE_BACKEND '{other}' (expected memory or supabase)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: BackendMode,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendMode::default(),
            supabase_url: None,
            supabase_anon_key: None,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = match get("TASKLANE_BACKEND") {
            Some(value) => value.parse()?,
            None => BackendMode::default(),
        };
        let config = Self {
            backend,
            supabase_url: get("SUPABASE_URL"),
            supabase_anon_key: get("SUPABASE_ANON_KEY"),
            log_file: get("TASKLANE_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendMode::Supabase {
            if self.supabase_url.is_none() {
                return Err(Error::Config("SUPABASE_URL is required".into()));
            }
            if self.supabase_anon_key.is_none() {
                return Err(Error::Config("SUPABASE_ANON_KEY is required".into()));
            }
        }
        Ok(())
    }
}
