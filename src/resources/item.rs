//! Item resource.
//!
//! Items under templates cascade on delete: removing an item also removes
//! the copies inheritance pushed onto linked templates and their hosts, so
//! deletion goes through the cascade-verifying retry helper with the item's
//! parent host as the cascade root.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::types::Item;
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{decode, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_item";

fn default_interface_id() -> String {
    "0".to_string()
}

fn default_history() -> String {
    "90".to_string()
}

fn default_trends() -> String {
    "365".to_string()
}

/// Declared configuration of an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Update interval in seconds.
    #[serde(default)]
    pub delay: i64,
    /// Id of the host or template the item belongs to.
    #[serde(default)]
    pub host_id: String,
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
    /// Item description.
    #[serde(default)]
    pub description: String,
    /// History retention.
    #[serde(default = "default_history")]
    pub history: String,
    /// Trends retention.
    #[serde(default = "default_trends")]
    pub trends: String,
    /// Allowed hosts, used only by trapper items.
    #[serde(default)]
    pub trapper_host: String,
}

/// The item schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("delay", Attribute::optional_int64())
        .with_attribute(
            "host_id",
            Attribute::required_string()
                .with_description("ID of the host or template that the item belongs to."),
        )
        .with_attribute(
            "interface_id",
            Attribute::optional_string().with_default(json!("0")),
        )
        .with_attribute(
            "key",
            Attribute::required_string().with_description("Item key."),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the item."),
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
            Attribute::optional_int64().with_default(json!(0)).with_range(0, 3),
        )
        .with_attribute(
            "delta",
            Attribute::optional_int64()
                .with_default(json!(0))
                .with_range(0, 2)
                .with_description("Value that will be stored."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_default(json!("")),
        )
        .with_attribute(
            "history",
            Attribute::optional_string()
                .with_default(json!("90"))
                .with_description("Number of days to keep item's history data."),
        )
        .with_attribute(
            "trends",
            Attribute::optional_string()
                .with_default(json!("365"))
                .with_description("Number of days to keep item's trends data."),
        )
        .with_attribute(
            "trapper_host",
            Attribute::optional_string()
                .with_description("Allowed hosts. Used only by trapper items."),
        )
}

fn to_remote(config: &ItemConfig) -> Item {
    Item {
        item_id: config.id.clone().unwrap_or_default(),
        delay: config.delay,
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
        parent_hosts: Vec::new(),
    }
}

fn state_from(item: Item) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(ItemConfig {
        id: Some(item.item_id),
        delay: item.delay,
        host_id: item.host_id,
        interface_id: item.interface_id,
        key: item.key,
        name: item.name,
        item_type: item.item_type,
        value_type: item.value_type,
        data_type: item.data_type,
        delta: item.delta,
        description: item.description,
        history: item.history,
        trends: item.trends,
        trapper_host: item.trapper_hosts,
    })?)
}

/// Create the item and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: ItemConfig = decode(TYPE, planned)?;
    let item = to_remote(&config);

    let id = retry::retry_create(|| {
        let item = item.clone();
        async move { single_id(client.items_create(&[item]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Read the item state back from the server.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: ItemConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    read_by_id(client, id).await
}

async fn read_by_id(client: &ZabbixClient, id: &str) -> Result<Value, ProviderError> {
    state_from(client.item_by_id(id).await?)
}

/// Update the item and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: ItemConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let item = to_remote(&config);

    retry::retry_create(|| {
        let item = item.clone();
        async move { single_id(client.items_update(&[item]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Delete the item, verifying the inheritance cascade.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: ItemConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();

    retry::retry_delete(
        client,
        &id,
        || parent_host_id(client, &id),
        || {
            let id = id.clone();
            async move { client.items_delete_by_ids(&[id]).await }
        },
    )
    .await
}

/// The host a single item lives on, used as the root of the cascade
/// estimate.
pub(crate) async fn parent_host_id(
    client: &ZabbixClient,
    id: &str,
) -> Result<String, ProviderError> {
    let item = client.item_by_id(id).await?;
    match item.parent_hosts.as_slice() {
        [host] => Ok(host.host_id.clone()),
        hosts => Err(ProviderError::AmbiguousResult {
            kind: "parent host for item",
            id: id.to_string(),
            got: hosts.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn remote_item() -> Value {
        json!({
            "itemid": "23296",
            "delay": "30",
            "hostid": "10084",
            "interfaceid": "0",
            "key_": "system.cpu.load[all,avg1]",
            "name": "CPU load",
            "type": "0",
            "value_type": "0",
            "data_type": "0",
            "delta": "0",
            "history": "90",
            "trends": "365",
            "hosts": [{"hostid": "10084", "host": "server-1"}],
        })
    }

    #[tokio::test]
    async fn create_round_trips_every_field() {
        let transport = MockTransport::new()
            .expect("item.create", json!({"itemids": ["23296"]}))
            .expect("item.get", json!([remote_item()]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let state = create(
            &client,
            json!({
                "delay": 30,
                "host_id": "10084",
                "key": "system.cpu.load[all,avg1]",
                "name": "CPU load",
            }),
        )
        .await
        .unwrap();

        assert_eq!(state["id"], "23296");
        assert_eq!(state["delay"], 30);
        assert_eq!(state["key"], "system.cpu.load[all,avg1]");
        assert_eq!(state["history"], "90");
        assert_eq!(state["trends"], "365");
    }

    #[tokio::test]
    async fn create_retries_transient_backend_errors() {
        let transport = MockTransport::new()
            .expect_transient("item.create")
            .expect("item.create", json!({"itemids": ["23296"]}))
            .expect("item.get", json!([remote_item()]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        tokio::time::pause();
        let state = create(
            &client,
            json!({
                "host_id": "10084",
                "key": "system.cpu.load[all,avg1]",
                "name": "CPU load",
            }),
        )
        .await
        .unwrap();
        assert_eq!(state["id"], "23296");
    }

    #[tokio::test]
    async fn delete_checks_cascade_against_inheriting_templates() {
        // Item on host 10084; one template inherits it and is linked to one
        // host: expected cascade is 1 + (1 + 1) = 3, and the server deletes
        // exactly 3 objects.
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect("item.get", json!([remote_item()]))
                .expect(
                    "template.get",
                    json!([{
                        "templateid": "10093",
                        "host": "template-linked",
                        "hosts": [{"hostid": "10201", "host": "web-1"}],
                    }]),
                )
                .expect("item.delete", json!({"itemids": ["23296", "23401", "23402"]})),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        delete(
            &client,
            json!({
                "id": "23296",
                "host_id": "10084",
                "key": "system.cpu.load[all,avg1]",
                "name": "CPU load",
            }),
        )
        .await
        .unwrap();

        let calls = transport.calls();
        assert_eq!(calls[1].0, "template.get");
        assert_eq!(calls[1].1["parentTemplateids"], json!("10084"));
    }

    #[tokio::test]
    async fn delete_fails_on_cascade_mismatch() {
        let transport = MockTransport::new()
            .expect("item.get", json!([remote_item()]))
            .expect("template.get", json!([]))
            .expect("item.delete", json!({"itemids": ["23296", "99999"]}));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = delete(
            &client,
            json!({
                "id": "23296",
                "host_id": "10084",
                "key": "system.cpu.load[all,avg1]",
                "name": "CPU load",
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ProviderError::CascadeMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }
}
