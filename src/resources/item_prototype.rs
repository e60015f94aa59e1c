//! Item prototype resource.
//!
//! Prototypes live under a discovery rule (`rule_id`) and otherwise mirror
//! items, including the delete cascade through inheriting templates.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::types::ItemPrototype;
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{decode, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_item_prototype";

fn default_interface_id() -> String {
    "0".to_string()
}

/// Declared configuration of an item prototype.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPrototypeConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Update interval, suffixed forms allowed.
    #[serde(default)]
    pub delay: String,
    /// Id of the host or template the prototype belongs to.
    #[serde(default)]
    pub host_id: String,
    /// Id of the discovery rule the prototype belongs to.
    #[serde(default)]
    pub rule_id: String,
    /// Id of the host interface used.
    #[serde(default = "default_interface_id")]
    pub interface_id: String,
    /// Item key.
    #[serde(default)]
    pub key: String,
    /// Item name.
    #[serde(default)]
    pub name: String,
    /// Item type.
    #[serde(default, rename = "type")]
    pub item_type: i64,
    /// Type of stored values.
    #[serde(default)]
    pub value_type: i64,
    /// Data type of the item.
    #[serde(default)]
    pub data_type: i64,
    /// Delta processing of received values.
    #[serde(default)]
    pub delta: i64,
    /// Prototype description.
    #[serde(default)]
    pub description: String,
    /// History retention; server-defaulted when unset.
    #[serde(default)]
    pub history: String,
    /// Trends retention; server-defaulted when unset.
    #[serde(default)]
    pub trends: String,
    /// Allowed hosts, used only by trapper items.
    #[serde(default)]
    pub trapper_host: String,
    /// Status of the prototype (0 enabled, 1 disabled).
    #[serde(default)]
    pub status: i64,
}

/// The item prototype schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("delay", Attribute::optional_string())
        .with_attribute(
            "host_id",
            Attribute::required_string().with_description(
                "ID of the host or template that the item prototype belongs to.",
            ),
        )
        .with_attribute(
            "rule_id",
            Attribute::required_string()
                .with_description("ID of the low level discovery rule."),
        )
        .with_attribute(
            "interface_id",
            Attribute::optional_string().with_default(json!("0")),
        )
        .with_attribute(
            "key",
            Attribute::required_string().with_description("Item prototype key."),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the item prototype."),
        )
        .with_attribute(
            "type",
            Attribute::optional_int64().with_default(json!(0)).with_range(0, 16),
        )
        .with_attribute(
            "value_type",
            Attribute::optional_int64().with_default(json!(0)).with_range(0, 4),
        )
        .with_attribute(
            "data_type",
            Attribute::optional_int64()
                .with_default(json!(0))
                .with_range(0, 3)
                .with_description("Data type of the item prototype (removed in Zabbix 3.4)."),
        )
        .with_attribute(
            "delta",
            Attribute::optional_int64()
                .with_default(json!(0))
                .with_range(0, 2)
                .with_description("Value that will be stored (removed in Zabbix 3.4)."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_default(json!("")),
        )
        .with_attribute("history", Attribute::optional_computed_string())
        .with_attribute("trends", Attribute::optional_computed_string())
        .with_attribute("trapper_host", Attribute::optional_string())
        .with_attribute(
            "status",
            Attribute::optional_int64().with_default(json!(0)).with_range(0, 1),
        )
}

fn to_remote(config: &ItemPrototypeConfig) -> ItemPrototype {
    ItemPrototype {
        item_id: config.id.clone().unwrap_or_default(),
        rule_id: config.rule_id.clone(),
        delay: config.delay.clone(),
        host_id: config.host_id.clone(),
        interface_id: config.interface_id.clone(),
        key: config.key.clone(),
        name: config.name.clone(),
        item_type: config.item_type,
        value_type: config.value_type,
        data_type: config.data_type,
        delta: config.delta,
        description: config.description.clone(),
        history: config.history.clone(),
        trends: config.trends.clone(),
        trapper_hosts: config.trapper_host.clone(),
        status: config.status,
        parent_hosts: Vec::new(),
    }
}

fn state_from(prototype: ItemPrototype, rule_id: String) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(ItemPrototypeConfig {
        id: Some(prototype.item_id),
        delay: prototype.delay,
        host_id: prototype.host_id,
        // itemprototype.get does not return the rule id; it is stable, so
        // the declared value is carried through.
        rule_id,
        interface_id: prototype.interface_id,
        key: prototype.key,
        name: prototype.name,
        item_type: prototype.item_type,
        value_type: prototype.value_type,
        data_type: prototype.data_type,
        delta: prototype.delta,
        description: prototype.description,
        history: prototype.history,
        trends: prototype.trends,
        trapper_host: prototype.trapper_hosts,
        status: prototype.status,
    })?)
}

/// Create the item prototype and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: ItemPrototypeConfig = decode(TYPE, planned)?;
    let prototype = to_remote(&config);

    let id = retry::retry_create(|| {
        let prototype = prototype.clone();
        async move { single_id(client.item_prototypes_create(&[prototype]).await?) }
    })
    .await?;

    read_by_id(client, &id, config.rule_id).await
}

/// Read the item prototype state back from the server.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: ItemPrototypeConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    read_by_id(client, &id, config.rule_id).await
}

async fn read_by_id(
    client: &ZabbixClient,
    id: &str,
    rule_id: String,
) -> Result<Value, ProviderError> {
    state_from(client.item_prototype_by_id(id).await?, rule_id)
}

/// Update the item prototype and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: ItemPrototypeConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let prototype = to_remote(&config);

    retry::retry_create(|| {
        let prototype = prototype.clone();
        async move { single_id(client.item_prototypes_update(&[prototype]).await?) }
    })
    .await?;

    read_by_id(client, &id, config.rule_id).await
}

/// Delete the item prototype, verifying the inheritance cascade.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: ItemPrototypeConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();

    retry::retry_delete(
        client,
        &id,
        || parent_host_id(client, &id),
        || {
            let id = id.clone();
            async move { client.item_prototypes_delete_by_ids(&[id]).await }
        },
    )
    .await
}

async fn parent_host_id(client: &ZabbixClient, id: &str) -> Result<String, ProviderError> {
    let prototype = client.item_prototype_by_id(id).await?;
    match prototype.parent_hosts.as_slice() {
        [host] => Ok(host.host_id.clone()),
        hosts => Err(ProviderError::AmbiguousResult {
            kind: "parent host for item prototype",
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
    async fn create_carries_rule_id_through() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect("itemprototype.create", json!({"itemids": ["28400"]}))
                .expect(
                    "itemprototype.get",
                    json!([{
                        "itemid": "28400",
                        "delay": "1m",
                        "hostid": "10084",
                        "key_": "vfs.fs.size[{#FSNAME},free]",
                        "name": "Free disk space on {#FSNAME}",
                        "history": "90",
                        "trends": "365",
                        "status": "0",
                    }]),
                ),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let state = create(
            &client,
            json!({
                "delay": "1m",
                "host_id": "10084",
                "rule_id": "28336",
                "key": "vfs.fs.size[{#FSNAME},free]",
                "name": "Free disk space on {#FSNAME}",
            }),
        )
        .await
        .unwrap();

        assert_eq!(transport.calls()[0].1[0]["ruleid"], "28336");
        assert_eq!(state["id"], "28400");
        assert_eq!(state["rule_id"], "28336");
        // Server-computed retention values flow into state.
        assert_eq!(state["history"], "90");
        assert_eq!(state["trends"], "365");
    }
}
