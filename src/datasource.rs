//! The `zabbix_server` data source.
//!
//! Exposes the server version and the facts derived from it that other
//! resources need: the duration-unit suffixes for history/trends retention
//! (the suffix syntax appeared in server 3.4), and comparisons against a
//! caller-supplied version for feature gating in configuration.

use serde::Deserialize;
use serde_json::{json, Value};
use std::cmp::Ordering;

use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Data source type name.
pub const TYPE: &str = "zabbix_server";

/// Server version that introduced time-unit suffixes (`30d`, `12h`, ...).
const SUFFIX_VERSION: &str = "3.4.0";

#[derive(Debug, Default, Deserialize)]
struct ServerQuery {
    /// Force the version instead of asking the server.
    #[serde(default)]
    server_version: Option<String>,
    /// Version to compare the server version against.
    #[serde(default)]
    compare_version: Option<String>,
}

/// The server data source schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "server_version",
            Attribute::optional_computed_string()
                .with_description("Version of the Zabbix server."),
        )
        .with_attribute(
            "compare_version",
            Attribute::optional_string()
                .with_description("Version to compare the server version against."),
        )
        .with_attribute(
            "unit_time_days",
            Attribute::computed_string().with_description(
                "Days unit suffix used by the server (`d` for 3.4+, empty otherwise).",
            ),
        )
        .with_attribute(
            "unit_time_hours",
            Attribute::computed_string().with_description(
                "Hours unit suffix used by the server (`h` for 3.4+, empty otherwise).",
            ),
        )
        .with_attribute(
            "unit_time_minutes",
            Attribute::computed_string().with_description(
                "Minutes unit suffix used by the server (`m` for 3.4+, empty otherwise).",
            ),
        )
        .with_attribute(
            "unit_time_seconds",
            Attribute::computed_string().with_description(
                "Seconds unit suffix used by the server (`s` for 3.4+, empty otherwise).",
            ),
        )
        .with_attribute(
            "unit_time_weeks",
            Attribute::computed_string().with_description(
                "Weeks unit suffix used by the server (`w` for 3.4+, empty otherwise).",
            ),
        )
        .with_attribute("server_version_gt", Attribute::computed_bool())
        .with_attribute("server_version_ge", Attribute::computed_bool())
        .with_attribute("server_version_lt", Attribute::computed_bool())
        .with_attribute("server_version_le", Attribute::computed_bool())
}

/// Build the data source state for a session whose server reports
/// `session_version`; an explicit `server_version` in the query wins.
pub fn read(session_version: &str, config: Value) -> Result<Value, ProviderError> {
    let query: ServerQuery = serde_json::from_value(config)
        .map_err(|e| ProviderError::Validation(format!("invalid {} query: {}", TYPE, e)))?;
    let version = query
        .server_version
        .as_deref()
        .unwrap_or(session_version);

    let suffixed = compare_versions(version, SUFFIX_VERSION) != Ordering::Less;
    let mut state = json!({
        "id": format!("zabbix_server_{}", version.replace('.', "_")),
        "server_version": version,
        "unit_time_days": if suffixed { "d" } else { "" },
        "unit_time_hours": if suffixed { "h" } else { "" },
        "unit_time_minutes": if suffixed { "m" } else { "" },
        "unit_time_seconds": if suffixed { "s" } else { "" },
        "unit_time_weeks": if suffixed { "w" } else { "" },
    });

    if let Some(compare) = query.compare_version.as_deref() {
        let ordering = compare_versions(version, compare);
        let fields = state.as_object_mut().expect("state is an object");
        fields.insert("compare_version".to_string(), json!(compare));
        fields.insert(
            "server_version_gt".to_string(),
            json!(ordering == Ordering::Greater),
        );
        fields.insert(
            "server_version_ge".to_string(),
            json!(ordering != Ordering::Less),
        );
        fields.insert(
            "server_version_lt".to_string(),
            json!(ordering == Ordering::Less),
        );
        fields.insert(
            "server_version_le".to_string(),
            json!(ordering != Ordering::Greater),
        );
    }

    Ok(state)
}

/// Compare dotted numeric version strings segment by segment; missing
/// segments count as zero, non-numeric segments as equal.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.map_or(0, segment_value);
                let r = r.map_or(0, segment_value);
                match l.cmp(&r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

fn segment_value(segment: &str) -> u64 {
    segment.trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison() {
        assert_eq!(compare_versions("3.4.0", "3.4.0"), Ordering::Equal);
        assert_eq!(compare_versions("3.2.11", "3.4.0"), Ordering::Less);
        assert_eq!(compare_versions("4.0", "3.4.15"), Ordering::Greater);
        // Missing segments count as zero.
        assert_eq!(compare_versions("3.4", "3.4.0"), Ordering::Equal);
    }

    #[test]
    fn pre_suffix_server_yields_empty_units() {
        let state = read("3.2.0", json!({})).unwrap();
        assert_eq!(state["server_version"], "3.2.0");
        assert_eq!(state["unit_time_days"], "");
        assert_eq!(state["unit_time_hours"], "");
        assert_eq!(state["unit_time_minutes"], "");
        assert_eq!(state["unit_time_seconds"], "");
        assert_eq!(state["unit_time_weeks"], "");
        assert_eq!(state["id"], "zabbix_server_3_2_0");
        assert!(state.get("server_version_ge").is_none());
    }

    #[test]
    fn suffix_capable_server_yields_unit_letters() {
        let state = read("3.4.0", json!({})).unwrap();
        assert_eq!(state["unit_time_days"], "d");
        assert_eq!(state["unit_time_hours"], "h");
        assert_eq!(state["unit_time_minutes"], "m");
        assert_eq!(state["unit_time_seconds"], "s");
        assert_eq!(state["unit_time_weeks"], "w");
    }

    #[test]
    fn forced_version_overrides_session() {
        let state = read("3.4.15", json!({"server_version": "3.2.0"})).unwrap();
        assert_eq!(state["server_version"], "3.2.0");
        assert_eq!(state["unit_time_days"], "");
    }

    #[test]
    fn comparison_outputs() {
        let state = read("3.4.0", json!({"compare_version": "3.4.0"})).unwrap();
        assert_eq!(state["server_version_gt"], false);
        assert_eq!(state["server_version_ge"], true);
        assert_eq!(state["server_version_lt"], false);
        assert_eq!(state["server_version_le"], true);

        let state = read("3.2.11", json!({"compare_version": "3.4.0"})).unwrap();
        assert_eq!(state["server_version_gt"], false);
        assert_eq!(state["server_version_ge"], false);
        assert_eq!(state["server_version_lt"], true);
        assert_eq!(state["server_version_le"], true);
    }
}
