//! Trigger prototype resource.
//!
//! Mirrors the trigger resource, including the human-readable expression
//! expansion on Read, for triggers generated by low-level discovery.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::api::types::{TriggerPrototype, TriggerRef};
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::trigger::expand_expression;
use crate::resources::{decode, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_trigger_prototype";

/// Declared configuration of a trigger prototype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPrototypeConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Trigger name.
    #[serde(default)]
    pub description: String,
    /// Trigger expression.
    #[serde(default)]
    pub expression: String,
    /// Severity (0 not classified .. 5 disaster).
    #[serde(default)]
    pub priority: i64,
    /// Status (0 enabled, 1 disabled).
    #[serde(default)]
    pub status: i64,
    /// Ids of the trigger prototypes this prototype depends on.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

/// The trigger prototype schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute("expression", Attribute::required_string())
        .with_attribute(
            "priority",
            Attribute::optional_int64().with_default(json!(0)).with_range(0, 5),
        )
        .with_attribute(
            "status",
            Attribute::optional_int64().with_default(json!(0)).with_range(0, 1),
        )
        .with_attribute(
            "dependencies",
            Attribute::optional(AttributeType::set(AttributeType::String)),
        )
}

fn to_remote(config: &TriggerPrototypeConfig) -> TriggerPrototype {
    TriggerPrototype {
        trigger_id: config.id.clone().unwrap_or_default(),
        description: config.description.clone(),
        expression: config.expression.clone(),
        priority: config.priority,
        status: config.status,
        dependencies: config
            .dependencies
            .iter()
            .map(|id| TriggerRef {
                trigger_id: id.clone(),
            })
            .collect(),
        functions: Vec::new(),
        parent_hosts: Vec::new(),
    }
}

/// Create the trigger prototype and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: TriggerPrototypeConfig = decode(TYPE, planned)?;
    let prototype = to_remote(&config);

    let id = retry::retry_create(|| {
        let prototype = prototype.clone();
        async move { single_id(client.trigger_prototypes_create(&[prototype]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Read the trigger prototype state back, with the expression expanded.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: TriggerPrototypeConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    read_by_id(client, id).await
}

async fn read_by_id(client: &ZabbixClient, id: &str) -> Result<Value, ProviderError> {
    let mut prototype = client.trigger_prototype_by_id(id).await?;
    prototype.expression =
        expand_expression(client, &prototype.expression, &prototype.functions).await?;

    Ok(serde_json::to_value(TriggerPrototypeConfig {
        id: Some(prototype.trigger_id),
        description: prototype.description,
        expression: prototype.expression,
        priority: prototype.priority,
        status: prototype.status,
        dependencies: prototype
            .dependencies
            .into_iter()
            .map(|d| d.trigger_id)
            .collect(),
    })?)
}

/// Update the trigger prototype and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: TriggerPrototypeConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let prototype = to_remote(&config);

    retry::retry_create(|| {
        let prototype = prototype.clone();
        async move { single_id(client.trigger_prototypes_update(&[prototype]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Delete the trigger prototype, verifying the inheritance cascade.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: TriggerPrototypeConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();

    retry::retry_delete(
        client,
        &id,
        || parent_host_id(client, &id),
        || {
            let id = id.clone();
            async move { client.trigger_prototypes_delete_by_ids(&[id]).await }
        },
    )
    .await
}

async fn parent_host_id(client: &ZabbixClient, id: &str) -> Result<String, ProviderError> {
    let prototype = client.trigger_prototype_by_id(id).await?;
    match prototype.parent_hosts.as_slice() {
        [host] => Ok(host.host_id.clone()),
        hosts => Err(ProviderError::AmbiguousResult {
            kind: "parent host for trigger prototype",
            id: id.to_string(),
            got: hosts.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn read_expands_expression() {
        let transport = MockTransport::new()
            .expect(
                "triggerprototype.get",
                json!([{
                    "triggerid": "28500",
                    "description": "Low space on {#FSNAME}",
                    "expression": "{28501}<10",
                    "priority": "2",
                    "functions": [{
                        "functionid": "28501",
                        "itemid": "28400",
                        "function": "last",
                        "parameter": "0",
                    }],
                }]),
            )
            .expect(
                "item.get",
                json!([{
                    "itemid": "28400",
                    "key_": "vfs.fs.size[{#FSNAME},pfree]",
                    "name": "Free space on {#FSNAME}",
                    "hosts": [{"hostid": "10084", "host": "server-1"}],
                }]),
            );
        let client = ZabbixClient::with_transport(Box::new(transport));

        let state = read(
            &client,
            json!({
                "id": "28500",
                "description": "Low space on {#FSNAME}",
                "expression": "{28501}<10",
            }),
        )
        .await
        .unwrap();

        assert_eq!(
            state["expression"],
            "{server-1:vfs.fs.size[{#FSNAME},pfree].last(0)}<10"
        );
        assert_eq!(state["priority"], 2);
    }
}
