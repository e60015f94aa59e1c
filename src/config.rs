//! Provider configuration.
//!
//! Recognized options, each with an environment fallback so credentials can
//! stay out of checked-in configuration:
//!
//! | attribute      | env variable          |            |
//! |----------------|-----------------------|------------|
//! | `user`         | `ZABBIX_USER`         | required   |
//! | `password`     | `ZABBIX_PASSWORD`     | required   |
//! | `server_url`   | `ZABBIX_SERVER_URL`   | required   |
//! | `tls_insecure` | `ZABBIX_TLS_INSECURE` | optional   |
//!
//! The raw `serde_json::Value` handed over by the host framework is decoded
//! once into [`ProviderConfig`]; everything downstream works with typed
//! fields.

use serde::Deserialize;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Environment variable consulted when `user` is not configured.
pub const ENV_USER: &str = "ZABBIX_USER";
/// Environment variable consulted when `password` is not configured.
pub const ENV_PASSWORD: &str = "ZABBIX_PASSWORD";
/// Environment variable consulted when `server_url` is not configured.
pub const ENV_SERVER_URL: &str = "ZABBIX_SERVER_URL";
/// Environment variable consulted when `tls_insecure` is not configured.
pub const ENV_TLS_INSECURE: &str = "ZABBIX_TLS_INSECURE";

/// Validated provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// API user name.
    pub user: String,
    /// API password.
    pub password: String,
    /// URL of the server's JSON-RPC endpoint.
    pub server_url: String,
    /// Skip TLS certificate verification when talking to the server.
    pub tls_insecure: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    server_url: Option<String>,
    #[serde(default)]
    tls_insecure: Option<bool>,
}

impl ProviderConfig {
    /// Decode the configuration value handed over by the host framework,
    /// applying environment fallbacks for absent attributes.
    pub fn from_value(config: serde_json::Value) -> Result<Self, ProviderError> {
        let raw: RawConfig = serde_json::from_value(config)
            .map_err(|e| ProviderError::Configuration(format!("invalid provider config: {}", e)))?;

        Ok(Self {
            user: required(raw.user, "user", ENV_USER)?,
            password: required(raw.password, "password", ENV_PASSWORD)?,
            server_url: required(raw.server_url, "server_url", ENV_SERVER_URL)?,
            tls_insecure: match raw.tls_insecure {
                Some(v) => v,
                None => env_bool(ENV_TLS_INSECURE),
            },
        })
    }

    /// The schema describing the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "user",
                Attribute::required_string()
                    .with_env_default(ENV_USER)
                    .with_description("User name for the Zabbix API."),
            )
            .with_attribute(
                "password",
                Attribute::required_string()
                    .with_env_default(ENV_PASSWORD)
                    .sensitive()
                    .with_description("Password for the Zabbix API."),
            )
            .with_attribute(
                "server_url",
                Attribute::required_string()
                    .with_env_default(ENV_SERVER_URL)
                    .with_description("URL of the Zabbix API endpoint (api_jsonrpc.php)."),
            )
            .with_attribute(
                "tls_insecure",
                Attribute::optional_bool()
                    .with_env_default(ENV_TLS_INSECURE)
                    .with_description("Skip TLS certificate verification."),
            )
    }
}

fn required(
    value: Option<String>,
    attribute: &str,
    env: &str,
) -> Result<String, ProviderError> {
    if let Some(v) = value {
        if !v.is_empty() {
            return Ok(v);
        }
    }
    match std::env::var(env) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ProviderError::Configuration(format!(
            "'{}' is not set and the {} environment variable is empty",
            attribute, env
        ))),
    }
}

fn env_bool(env: &str) -> bool {
    matches!(
        std::env::var(env).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("True")
    )
}
