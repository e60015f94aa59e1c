//! Host group resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::api::types::HostGroup;
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{decode, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_host_group";

/// Declared configuration of a host group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostGroupConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Group name.
    #[serde(default)]
    pub name: String,
    /// Server-assigned id, also exposed as an attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// The host group schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the host group."),
        )
        .with_attribute("group_id", Attribute::computed_string())
}

fn to_remote(config: &HostGroupConfig) -> HostGroup {
    HostGroup {
        group_id: config.id.clone().unwrap_or_default(),
        name: config.name.clone(),
    }
}

/// Create the host group and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: HostGroupConfig = decode(TYPE, planned)?;
    let group = to_remote(&config);

    let id = retry::retry_create(|| {
        let group = group.clone();
        async move { single_id(client.host_groups_create(&[group]).await?) }
    })
    .await?;
    debug!(group_id = %id, "created host group");

    read_by_id(client, &id).await
}

/// Read the host group state back from the server.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: HostGroupConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    read_by_id(client, id).await
}

async fn read_by_id(client: &ZabbixClient, id: &str) -> Result<Value, ProviderError> {
    let group = client.host_group_by_id(id).await?;
    Ok(serde_json::to_value(HostGroupConfig {
        id: Some(group.group_id.clone()),
        name: group.name,
        group_id: Some(group.group_id),
    })?)
}

/// Update the host group and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: HostGroupConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let group = HostGroup {
        group_id: id.clone(),
        name: config.name.clone(),
    };

    retry::retry_create(|| {
        let group = group.clone();
        async move { single_id(client.host_groups_update(&[group]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Delete the host group.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: HostGroupConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    client.host_groups_delete_by_ids(&[id.to_string()]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn create_round_trips_state() {
        let transport = MockTransport::new()
            .expect("hostgroup.create", json!({"groupids": ["7"]}))
            .expect("hostgroup.get", json!([{"groupid": "7", "name": "Databases"}]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let state = create(&client, json!({"name": "Databases"})).await.unwrap();
        assert_eq!(state["id"], "7");
        assert_eq!(state["group_id"], "7");
        assert_eq!(state["name"], "Databases");
    }

    #[tokio::test]
    async fn read_surfaces_out_of_band_deletion() {
        let transport = MockTransport::new().expect("hostgroup.get", json!([]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = read(&client, json!({"id": "7", "name": "Databases"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_targets_the_stored_id() {
        let transport = std::sync::Arc::new(
            MockTransport::new().expect("hostgroup.delete", json!({"groupids": ["7"]})),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        delete(&client, json!({"id": "7", "name": "Databases"}))
            .await
            .unwrap();
        assert_eq!(transport.calls()[0].1, json!(["7"]));
    }
}
