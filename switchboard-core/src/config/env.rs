//! Environment variable interpolation and the environment-only configuration

use super::error::ConfigError;
use super::schema::{ProviderSettings, SwitchboardConfig};
use super::secrets::SecretString;
use crate::providers::ProviderKind;
use regex::{Captures, Regex};
use std::env;
use std::sync::OnceLock;
use tracing::warn;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

/// `${VAR}` or `${VAR:-default}`
fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("placeholder pattern should be valid")
    })
}

/// Interpolate environment variables in a configuration string
///
/// `${VAR}` must be set; `${VAR:-default}` falls back to `default` (which may
/// be empty) when `VAR` is unset.
pub fn interpolate_env_vars(content: &str) -> Result<String, ConfigError> {
    interpolate_with(content, |name| env::var(name).ok())
}

/// Interpolate placeholders using an arbitrary variable lookup
pub fn interpolate_with<F>(content: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing: Option<String> = None;

    let result = placeholder().replace_all(content, |cap: &Captures<'_>| {
        let name = &cap[1];
        match (lookup(name), cap.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => default.as_str().to_string(),
            (None, None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(ConfigError::EnvVarNotFound { var }),
        None => Ok(result.into_owned()),
    }
}

/// Build a configuration from the process environment alone
///
/// Reads `LLM_PRIMARY_PROVIDER`, `LLM_FALLBACK_ORDER` (comma separated),
/// `LLM_AUTO_FALLBACK`, `GEMINI_API_KEY`, `GEMINI_API_KEY_BACKUP`,
/// `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and the optional `GEMINI_MODEL`,
/// `OPENAI_MODEL` and `ANTHROPIC_MODEL` overrides. All three reference
/// providers are always present; a missing key leaves that provider
/// uninitialized.
pub fn from_env() -> SwitchboardConfig {
    from_lookup(|name| env::var(name).ok())
}

/// [`from_env`] over an arbitrary variable lookup
pub fn from_lookup<F>(lookup: F) -> SwitchboardConfig
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let providers = ProviderKind::ALL
        .iter()
        .map(|kind| {
            let prefix = kind.default_id().to_ascii_uppercase();
            let mut settings = ProviderSettings::new(
                *kind,
                read(&format!("{}_API_KEY", prefix)).unwrap_or_default(),
            );
            if *kind == ProviderKind::Gemini {
                settings.backup_api_key =
                    read("GEMINI_API_KEY_BACKUP").map(SecretString::new);
            }
            settings.model = read(&format!("{}_MODEL", prefix));
            settings
        })
        .collect();

    let mut config = SwitchboardConfig::new(providers);

    if let Some(primary) = read("LLM_PRIMARY_PROVIDER") {
        config.routing.primary = primary;
    }
    if let Some(order) = read("LLM_FALLBACK_ORDER") {
        config.routing.fallback_order = order
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(flag) = read("LLM_AUTO_FALLBACK") {
        match parse_flag(&flag) {
            Some(enabled) => config.routing.auto_fallback = enabled,
            None => warn!(value = %flag, "Unrecognized LLM_AUTO_FALLBACK value; keeping default"),
        }
    }

    config
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
