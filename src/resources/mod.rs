//! Resource reconcilers, one module per managed object kind.
//!
//! Every module follows the same shape: a typed configuration struct
//! decoded once from the state `Value` the host framework hands over, a
//! `schema()` description, and `create`/`read`/`update`/`delete` functions
//! translating between the declared configuration and the server's object
//! model. Mutations go through [`crate::retry`].
//!
//! [`link`] holds the diff/prune core shared by [`template_link`] and
//! [`lld_rule_link`].

pub mod host;
pub mod host_group;
pub mod item;
pub mod item_prototype;
pub mod link;
pub mod lld_rule;
pub mod lld_rule_link;
pub mod template;
pub mod template_link;
pub mod trigger;
pub mod trigger_prototype;

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::api::types::{HostGroupRef, TemplateRef};
use crate::api::ZabbixClient;
use crate::error::ProviderError;

/// Decode declared state into a typed configuration struct, failing fast
/// with a descriptive error instead of trusting individual field accesses.
pub(crate) fn decode<T: DeserializeOwned>(
    resource_type: &str,
    state: Value,
) -> Result<T, ProviderError> {
    serde_json::from_value(state)
        .map_err(|e| ProviderError::Validation(format!("invalid {} state: {}", resource_type, e)))
}

/// Pull the server-assigned id out of a decoded configuration.
pub(crate) fn require_id<'a>(
    id: &'a Option<String>,
    resource_type: &str,
) -> Result<&'a str, ProviderError> {
    match id.as_deref() {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ProviderError::Validation(format!(
            "{} has no id set",
            resource_type
        ))),
    }
}

/// The single id a create/update call is expected to return.
pub(crate) fn single_id(mut ids: Vec<String>) -> Result<String, ProviderError> {
    match ids.len() {
        1 => Ok(ids.remove(0)),
        got => Err(ProviderError::Api {
            code: 0,
            message: format!("expected one affected id, got {}", got),
            data: String::new(),
        }),
    }
}

/// Resolve host group names to id references, requiring every name to
/// exist.
pub(crate) async fn group_refs_by_name(
    client: &ZabbixClient,
    names: &BTreeSet<String>,
) -> Result<Vec<HostGroupRef>, ProviderError> {
    let groups = client
        .host_groups_get(json!({
            "output": "extend",
            "filter": {"name": names},
        }))
        .await?;

    if groups.len() != names.len() {
        let found: BTreeSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        let missing: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !found.contains(name))
            .collect();
        return Err(ProviderError::Validation(format!(
            "host group(s) not found: {}",
            missing.join(", ")
        )));
    }

    Ok(groups
        .into_iter()
        .map(|g| HostGroupRef {
            group_id: g.group_id,
        })
        .collect())
}

/// The names of the host groups a host or template belongs to.
pub(crate) async fn group_names_of(
    client: &ZabbixClient,
    host_id: &str,
) -> Result<BTreeSet<String>, ProviderError> {
    let groups = client
        .host_groups_get(json!({
            "output": "extend",
            "hostids": [host_id],
        }))
        .await?;
    Ok(groups.into_iter().map(|g| g.name).collect())
}

/// Resolve template technical names to id references, requiring every name
/// to exist.
pub(crate) async fn template_refs_by_name(
    client: &ZabbixClient,
    names: &BTreeSet<String>,
) -> Result<Vec<TemplateRef>, ProviderError> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    let templates = client
        .templates_get(json!({
            "output": "extend",
            "filter": {"host": names},
        }))
        .await?;

    if templates.len() != names.len() {
        let found: BTreeSet<&str> = templates.iter().map(|t| t.host.as_str()).collect();
        let missing: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !found.contains(name))
            .collect();
        return Err(ProviderError::Validation(format!(
            "template(s) not found: {}",
            missing.join(", ")
        )));
    }

    Ok(templates
        .into_iter()
        .map(|t| TemplateRef {
            template_id: t.template_id,
        })
        .collect())
}
