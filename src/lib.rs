//! Hemmer provider for the Zabbix monitoring server.
//!
//! This crate translates declarative resource definitions into calls
//! against the Zabbix JSON-RPC management API, implementing a full
//! Create/Read/Exists/Update/Delete lifecycle per resource kind and
//! reconciling declared configuration with the server's state.
//!
//! # Overview
//!
//! The provider manages:
//!
//! - **Hosts and host groups** (`zabbix_host`, `zabbix_host_group`)
//! - **Items and triggers** (`zabbix_item`, `zabbix_trigger`)
//! - **Templates** with user macros and template linkage
//!   (`zabbix_template`)
//! - **Low-level discovery rules and prototypes** (`zabbix_lld_rule`,
//!   `zabbix_item_prototype`, `zabbix_trigger_prototype`)
//! - **Link resources** (`zabbix_template_link`, `zabbix_lld_rule_link`)
//!   that reconcile which children belong directly to a template or
//!   discovery rule, pruning server-side leftovers while never touching
//!   children materialized by template inheritance
//! - A **`zabbix_server` data source** exposing the server version and the
//!   version-gated duration-unit suffixes
//!
//! Mutating calls run through a retry layer that absorbs the backend's
//! transient concurrent-execution failures and verifies delete cascades
//! against the template inheritance graph (see [`retry`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use hemmer_provider_zabbix::{init_logging, ProviderService, ZabbixProvider};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! init_logging();
//!
//! let provider = ZabbixProvider::new();
//! provider
//!     .configure(json!({
//!         "user": "Admin",
//!         "password": "zabbix",
//!         "server_url": "http://localhost/api_jsonrpc.php",
//!     }))
//!     .await?;
//!
//! let group = provider
//!     .create("zabbix_host_group", json!({"name": "Linux servers"}))
//!     .await?;
//! println!("created group {}", group["id"]);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Recognized provider options, each with an environment fallback:
//! `user` (`ZABBIX_USER`), `password` (`ZABBIX_PASSWORD`), `server_url`
//! (`ZABBIX_SERVER_URL`), and `tls_insecure` (`ZABBIX_TLS_INSECURE`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod datasource;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod service;
pub mod testing;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::ZabbixProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
