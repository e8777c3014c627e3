//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::str::FromStr;
use std::sync::Once;

static INIT: Once = Once::new();

/// Load `.env` from the current directory (or the crate root as a fallback)
/// and apply no further side effects. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_err() {
            let root = env!("CARGO_MANIFEST_DIR");
            let _ = dotenv::from_filename(format!("{root}/.env"));
        }
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Clone,
{
    init_env();
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Root directory under which `cache/` and `data/quarantine/` live.
/// Defaults to `./var`, overridable via `NBA_VAULT_ROOT`.
pub fn vault_root() -> std::path::PathBuf {
    env_opt("NBA_VAULT_ROOT")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("./var"))
}

/// Path to the local SQLite store, overridable via `NBA_VAULT_DB`.
pub fn store_path() -> std::path::PathBuf {
    env_opt("NBA_VAULT_DB")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| vault_root().join("nba_vault.sqlite3"))
}
