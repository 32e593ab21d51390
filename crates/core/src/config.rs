//! Environment loading shared by every ClinPort crate.
//!
//! Keys are read through an optional profile prefix: with
//! `CLINPORT_PROFILE=PROD`, `PROD_{KEY}` is tried before `{KEY}`.

use std::env;

/// Env var naming the active profile.
pub const PROFILE_VAR: &str = "CLINPORT_PROFILE";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
}

/// The active profile, upper-cased. Empty when unset.
pub fn active_profile() -> String {
    env_opt(PROFILE_VAR)
        .map(|s| s.to_uppercase())
        .unwrap_or_default()
}

pub fn profile_label(profile: &str) -> &str {
    if profile.is_empty() { "default" } else { profile }
}

/// Read an env var, treating empty values as unset.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries `{PROFILE}_{KEY}` first, falls back to `{KEY}`.
pub fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

pub fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

/// Unparsable values fall back to `default`.
pub fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
