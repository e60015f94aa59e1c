//! Trigger resource.
//!
//! The server stores trigger expressions with opaque function-id references
//! (`{13175}>5`). For state that humans can diff, Read expands each
//! reference into the `{host:key.function(params)}` form; the API accepts
//! either form on submission, so the expansion needs no inverse.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::api::types::{Trigger, TriggerFunction, TriggerRef};
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{decode, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_trigger";

/// Declared configuration of a trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Trigger name.
    #[serde(default)]
    pub description: String,
    /// Trigger expression.
    #[serde(default)]
    pub expression: String,
    /// Additional comments.
    #[serde(default)]
    pub comment: String,
    /// Severity (0 not classified .. 5 disaster).
    #[serde(default)]
    pub priority: i64,
    /// Status (0 enabled, 1 disabled).
    #[serde(default)]
    pub status: i64,
    /// Ids of the triggers this trigger depends on.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

/// The trigger schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("description", Attribute::required_string())
        .with_attribute("expression", Attribute::required_string())
        .with_attribute("comment", Attribute::optional_string())
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
            Attribute::optional(AttributeType::set(AttributeType::String))
                .with_description("IDs of the triggers this trigger depends on."),
        )
}

fn to_remote(config: &TriggerConfig) -> Trigger {
    Trigger {
        trigger_id: config.id.clone().unwrap_or_default(),
        description: config.description.clone(),
        expression: config.expression.clone(),
        comments: config.comment.clone(),
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

/// Create the trigger and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: TriggerConfig = decode(TYPE, planned)?;
    let trigger = to_remote(&config);

    let id = retry::retry_create(|| {
        let trigger = trigger.clone();
        async move { single_id(client.triggers_create(&[trigger]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Read the trigger state back from the server, with the expression
/// expanded into its human-readable form.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: TriggerConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    read_by_id(client, id).await
}

async fn read_by_id(client: &ZabbixClient, id: &str) -> Result<Value, ProviderError> {
    let mut trigger = client.trigger_by_id(id).await?;
    trigger.expression = expand_expression(client, &trigger.expression, &trigger.functions).await?;

    Ok(serde_json::to_value(TriggerConfig {
        id: Some(trigger.trigger_id),
        description: trigger.description,
        expression: trigger.expression,
        comment: trigger.comments,
        priority: trigger.priority,
        status: trigger.status,
        dependencies: trigger
            .dependencies
            .into_iter()
            .map(|d| d.trigger_id)
            .collect(),
    })?)
}

/// Update the trigger and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: TriggerConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let trigger = to_remote(&config);

    retry::retry_create(|| {
        let trigger = trigger.clone();
        async move { single_id(client.triggers_update(&[trigger]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Delete the trigger, verifying the inheritance cascade.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: TriggerConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();

    retry::retry_delete(
        client,
        &id,
        || parent_host_id(client, &id),
        || {
            let id = id.clone();
            async move { client.triggers_delete_by_ids(&[id]).await }
        },
    )
    .await
}

/// The host a single trigger lives on.
pub(crate) async fn parent_host_id(
    client: &ZabbixClient,
    id: &str,
) -> Result<String, ProviderError> {
    let trigger = client.trigger_by_id(id).await?;
    match trigger.parent_hosts.as_slice() {
        [host] => Ok(host.host_id.clone()),
        hosts => Err(ProviderError::AmbiguousResult {
            kind: "parent host for trigger",
            id: id.to_string(),
            got: hosts.len(),
        }),
    }
}

/// Expand every `{<functionid>}` reference in `expression` into
/// `{host:key.function(params)}` by resolving the function's item and its
/// parent host.
pub(crate) async fn expand_expression(
    client: &ZabbixClient,
    expression: &str,
    functions: &[TriggerFunction],
) -> Result<String, ProviderError> {
    let mut expanded = expression.to_string();
    for function in functions {
        let item = client.item_by_id(&function.item_id).await?;
        let host = match item.parent_hosts.as_slice() {
            [host] => host.host.clone(),
            hosts => {
                return Err(ProviderError::AmbiguousResult {
                    kind: "parent host for item",
                    id: function.item_id.clone(),
                    got: hosts.len(),
                })
            }
        };
        let reference = format!("{{{}}}", function.function_id);
        let readable = format!(
            "{{{}:{}.{}({})}}",
            host, item.key, function.function, function.parameter
        );
        expanded = expanded.replacen(&reference, &readable, 1);
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn read_expands_function_references() {
        let transport = MockTransport::new()
            .expect(
                "trigger.get",
                json!([{
                    "triggerid": "13497",
                    "description": "CPU load too high",
                    "expression": "{13175}>5",
                    "priority": "4",
                    "status": "0",
                    "functions": [{
                        "functionid": "13175",
                        "itemid": "23296",
                        "function": "last",
                        "parameter": "0",
                    }],
                }]),
            )
            .expect(
                "item.get",
                json!([{
                    "itemid": "23296",
                    "key_": "system.cpu.load[all,avg1]",
                    "name": "CPU load",
                    "hosts": [{"hostid": "10084", "host": "server-1"}],
                }]),
            );
        let client = ZabbixClient::with_transport(Box::new(transport));

        let state = read(
            &client,
            json!({"id": "13497", "description": "CPU load too high", "expression": "{13175}>5"}),
        )
        .await
        .unwrap();

        assert_eq!(
            state["expression"],
            "{server-1:system.cpu.load[all,avg1].last(0)}>5"
        );
        assert_eq!(state["priority"], 4);
    }

    #[tokio::test]
    async fn expansion_handles_multiple_functions() {
        let functions = vec![
            TriggerFunction {
                function_id: "1".to_string(),
                item_id: "11".to_string(),
                function: "last".to_string(),
                parameter: "0".to_string(),
            },
            TriggerFunction {
                function_id: "2".to_string(),
                item_id: "12".to_string(),
                function: "avg".to_string(),
                parameter: "5m".to_string(),
            },
        ];
        let transport = MockTransport::new()
            .expect(
                "item.get",
                json!([{
                    "itemid": "11",
                    "key_": "net.if.in[eth0]",
                    "name": "in",
                    "hosts": [{"hostid": "1", "host": "gw"}],
                }]),
            )
            .expect(
                "item.get",
                json!([{
                    "itemid": "12",
                    "key_": "net.if.out[eth0]",
                    "name": "out",
                    "hosts": [{"hostid": "1", "host": "gw"}],
                }]),
            );
        let client = ZabbixClient::with_transport(Box::new(transport));

        let expanded = expand_expression(&client, "{1}>100 and {2}>100", &functions)
            .await
            .unwrap();
        assert_eq!(
            expanded,
            "{gw:net.if.in[eth0].last(0)}>100 and {gw:net.if.out[eth0].avg(5m)}>100"
        );
    }

    #[tokio::test]
    async fn create_sends_dependencies() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect("trigger.create", json!({"triggerids": ["13500"]}))
                .expect(
                    "trigger.get",
                    json!([{
                        "triggerid": "13500",
                        "description": "Disk full",
                        "expression": "{1}>0",
                        "dependencies": [{"triggerid": "13497"}],
                        "functions": [],
                    }]),
                ),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let state = create(
            &client,
            json!({
                "description": "Disk full",
                "expression": "{server-1:vfs.fs.size[/,free].last(0)}<1G",
                "dependencies": ["13497"],
            }),
        )
        .await
        .unwrap();

        let create_params = &transport.calls()[0].1;
        assert_eq!(
            create_params[0]["dependencies"],
            json!([{"triggerid": "13497"}])
        );
        assert_eq!(state["dependencies"], json!(["13497"]));
    }
}
