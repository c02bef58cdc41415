//! Configuration file loading with `${VAR}` expansion.

use regex_lite::{Captures, Regex};
use std::path::Path;
use tracing::info;

use super::{AppConfig, ConfigError};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "LIQUIDATOR_CONFIG";

/// Used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "./config/liquidator.toml";

const PLACEHOLDER: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Replace every `${VAR}` with the value of `VAR`. Comment lines are left alone.
pub fn expand_env(content: &str) -> Result<String, ConfigError> {
    let placeholder = Regex::new(PLACEHOLDER).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let mut missing = None;
    let mut expanded = String::with_capacity(content.len());

    for line in content.lines() {
        if line.trim_start().starts_with('#') {
            expanded.push_str(line);
        } else {
            let replaced = placeholder.replace_all(line, |caps: &Captures<'_>| {
                let name = &caps[1];
                match std::env::var(name) {
                    Ok(value) => value,
                    Err(_) => {
                        missing.get_or_insert_with(|| name.to_string());
                        String::new()
                    }
                }
            });
            expanded.push_str(&replaced);
        }
        expanded.push('\n');
    }

    match missing {
        Some(name) => Err(ConfigError::MissingEnv(name)),
        None => Ok(expanded),
    }
}

/// Read, expand and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let config = AppConfig::from_toml_str(&expand_env(&raw)?)?;
    info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

/// Load from `LIQUIDATOR_CONFIG`, falling back to the default path.
pub fn load_config_from_env() -> Result<AppConfig, ConfigError> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_config(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_expansion() {
        std::env::set_var("LIQ_TEST_RPC", "http://node:8545");
        let expanded = expand_env("rpc_url = \"${LIQ_TEST_RPC}\"").unwrap();
        assert_eq!(expanded.trim(), "rpc_url = \"http://node:8545\"");
    }

    #[test]
    fn test_missing_variable_is_reported() {
        std::env::remove_var("LIQ_TEST_DEFINITELY_UNSET");
        let err = expand_env("key = \"${LIQ_TEST_DEFINITELY_UNSET}\"").unwrap_err();
        match err {
            ConfigError::MissingEnv(name) => assert_eq!(name, "LIQ_TEST_DEFINITELY_UNSET"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_comments_are_not_expanded() {
        std::env::remove_var("LIQ_TEST_COMMENTED");
        let expanded = expand_env("# private_key = \"${LIQ_TEST_COMMENTED}\"\na = 1").unwrap();
        assert!(expanded.contains("${LIQ_TEST_COMMENTED}"));
    }

    #[test]
    fn test_load_config_file() {
        std::env::set_var("LIQ_TEST_WALLET_KEY", "0xfeed");
        let path = std::env::temp_dir().join(format!("liquidator-test-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[chain]
rpc_url = "http://127.0.0.1:8545"
chain_id = 56
comptroller = "0x2222222222222222222222222222222222222222"

[index]
url = "http://127.0.0.1:8000"

[wallet]
private_key = "${LIQ_TEST_WALLET_KEY}"

[scanner]
scan_interval_secs = 15
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.chain.chain_id, 56);
        assert_eq!(config.wallet.private_key, "0xfeed");
        assert_eq!(config.scanner.scan_interval_secs, 15);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/liquidator.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
