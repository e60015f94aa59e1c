//! Host resource.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::api::types::{Host, HostInterface};
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{
    decode, group_names_of, group_refs_by_name, require_id, single_id, template_refs_by_name,
};
use crate::retry;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_host";

fn default_true() -> bool {
    true
}

fn default_port() -> String {
    "10050".to_string()
}

/// One declared host interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// DNS name, may be empty when connecting via IP.
    #[serde(default)]
    pub dns: String,
    /// IP address, may be empty when connecting via DNS.
    #[serde(default)]
    pub ip: String,
    /// Whether this is the default interface.
    #[serde(default = "default_true")]
    pub main: bool,
    /// Port the agent listens on.
    #[serde(default = "default_port")]
    pub port: String,
}

/// Declared configuration of a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Technical host name.
    #[serde(default)]
    pub host: String,
    /// Visible host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the host is actively monitored.
    #[serde(default = "default_true")]
    pub monitored: bool,
    /// Host interfaces; at least one is required by the server.
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
    /// Names of the host groups the host belongs to.
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Technical names of the templates linked to the host.
    #[serde(default)]
    pub templates: BTreeSet<String>,
}

/// The host schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "host",
            Attribute::required_string().with_description("Technical name of the host."),
        )
        .with_attribute(
            "name",
            Attribute::optional_string().with_description("Visible name of the host."),
        )
        .with_attribute(
            "monitored",
            Attribute::optional_bool().with_default(json!(true)),
        )
        .with_attribute(
            "interfaces",
            Attribute::required(AttributeType::list(AttributeType::object([
                ("dns", AttributeType::String),
                ("ip", AttributeType::String),
                ("main", AttributeType::Bool),
                ("port", AttributeType::String),
            ]))),
        )
        .with_attribute(
            "groups",
            Attribute::required(AttributeType::set(AttributeType::String))
                .with_description("Names of the host groups the host belongs to."),
        )
        .with_attribute(
            "templates",
            Attribute::optional(AttributeType::set(AttributeType::String))
                .with_description("Technical names of the templates linked to the host."),
        )
}

fn interfaces_to_remote(interfaces: &[InterfaceConfig]) -> Vec<HostInterface> {
    interfaces
        .iter()
        .map(|iface| HostInterface {
            interface_id: String::new(),
            main: iface.main as i64,
            // Zabbix agent interface.
            interface_type: 1,
            use_ip: (!iface.ip.is_empty()) as i64,
            ip: iface.ip.clone(),
            dns: iface.dns.clone(),
            port: iface.port.clone(),
        })
        .collect()
}

async fn to_remote(client: &ZabbixClient, config: &HostConfig) -> Result<Host, ProviderError> {
    Ok(Host {
        host_id: config.id.clone().unwrap_or_default(),
        host: config.host.clone(),
        name: config.name.clone().unwrap_or_default(),
        status: if config.monitored { 0 } else { 1 },
        interfaces: interfaces_to_remote(&config.interfaces),
        groups: group_refs_by_name(client, &config.groups).await?,
        templates: template_refs_by_name(client, &config.templates).await?,
        parent_templates: Vec::new(),
    })
}

/// Create the host and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: HostConfig = decode(TYPE, planned)?;
    if config.interfaces.is_empty() {
        return Err(ProviderError::Validation(
            "a host needs at least one interface".to_string(),
        ));
    }
    let host = to_remote(client, &config).await?;

    let id = retry::retry_create(|| {
        let host = host.clone();
        async move { single_id(client.hosts_create(&[host]).await?) }
    })
    .await?;

    read_by_id(client, &id, &config).await
}

/// Read the host state back from the server.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: HostConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    read_by_id(client, &id, &config).await
}

async fn read_by_id(
    client: &ZabbixClient,
    id: &str,
    declared: &HostConfig,
) -> Result<Value, ProviderError> {
    let host = client.host_by_id(id).await?;

    let name = if host.name != host.host {
        Some(host.name.clone())
    } else {
        declared.name.clone().filter(|n| n == &host.name)
    };

    let template_names = template_names_of(client, &host).await?;

    Ok(serde_json::to_value(HostConfig {
        id: Some(host.host_id.clone()),
        host: host.host,
        name,
        monitored: host.status == 0,
        interfaces: host
            .interfaces
            .into_iter()
            .map(|iface| InterfaceConfig {
                dns: iface.dns,
                ip: iface.ip,
                main: iface.main == 1,
                port: iface.port,
            })
            .collect(),
        groups: group_names_of(client, id).await?,
        templates: template_names,
    })?)
}

async fn template_names_of(
    client: &ZabbixClient,
    host: &Host,
) -> Result<BTreeSet<String>, ProviderError> {
    if host.parent_templates.is_empty() {
        return Ok(BTreeSet::new());
    }
    let ids: Vec<&str> = host
        .parent_templates
        .iter()
        .map(|t| t.template_id.as_str())
        .collect();
    let templates = client
        .templates_get(json!({"output": "extend", "templateids": ids}))
        .await?;
    Ok(templates.into_iter().map(|t| t.host).collect())
}

/// Update the host and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: HostConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let host = to_remote(client, &config).await?;

    retry::retry_create(|| {
        let host = host.clone();
        async move { single_id(client.hosts_update(&[host]).await?) }
    })
    .await?;

    read_by_id(client, &id, &config).await
}

/// Delete the host.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: HostConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    client.hosts_delete_by_ids(&[id.to_string()]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn create_resolves_names_and_reads_back() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect(
                    "hostgroup.get",
                    json!([{"groupid": "2", "name": "Linux servers"}]),
                )
                .expect(
                    "template.get",
                    json!([{"templateid": "10104", "host": "Template ICMP Ping"}]),
                )
                .expect("host.create", json!({"hostids": ["10084"]}))
                .expect(
                    "host.get",
                    json!([{
                        "hostid": "10084",
                        "host": "server-1",
                        "name": "server-1",
                        "status": "0",
                        "interfaces": [{
                            "interfaceid": "1",
                            "main": "1",
                            "type": "1",
                            "useip": "1",
                            "ip": "127.0.0.1",
                            "dns": "",
                            "port": "10050",
                        }],
                        "parentTemplates": [{"templateid": "10104"}],
                    }]),
                )
                .expect(
                    "template.get",
                    json!([{"templateid": "10104", "host": "Template ICMP Ping"}]),
                )
                .expect(
                    "hostgroup.get",
                    json!([{"groupid": "2", "name": "Linux servers"}]),
                ),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let state = create(
            &client,
            json!({
                "host": "server-1",
                "interfaces": [{"ip": "127.0.0.1"}],
                "groups": ["Linux servers"],
                "templates": ["Template ICMP Ping"],
            }),
        )
        .await
        .unwrap();

        let create_params = &transport.calls()[2].1;
        assert_eq!(create_params[0]["groups"], json!([{"groupid": "2"}]));
        assert_eq!(create_params[0]["templates"], json!([{"templateid": "10104"}]));
        assert_eq!(create_params[0]["status"], "0");
        assert_eq!(create_params[0]["interfaces"][0]["useip"], "1");

        assert_eq!(state["id"], "10084");
        assert_eq!(state["monitored"], true);
        assert_eq!(state["groups"], json!(["Linux servers"]));
        assert_eq!(state["templates"], json!(["Template ICMP Ping"]));
        assert_eq!(state["interfaces"][0]["port"], "10050");
    }

    #[tokio::test]
    async fn create_requires_an_interface() {
        let transport = MockTransport::new();
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = create(
            &client,
            json!({"host": "server-1", "interfaces": [], "groups": ["Linux servers"]}),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("at least one interface"));
    }

    #[tokio::test]
    async fn unmonitored_host_maps_to_status_one() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect("hostgroup.get", json!([{"groupid": "2", "name": "Linux servers"}]))
                .expect("host.update", json!({"hostids": ["10084"]}))
                .expect(
                    "host.get",
                    json!([{
                        "hostid": "10084",
                        "host": "server-1",
                        "status": "1",
                        "interfaces": [],
                    }]),
                )
                .expect("hostgroup.get", json!([{"groupid": "2", "name": "Linux servers"}])),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let state = update(
            &client,
            json!({
                "id": "10084",
                "host": "server-1",
                "monitored": false,
                "interfaces": [{"ip": "127.0.0.1"}],
                "groups": ["Linux servers"],
            }),
        )
        .await
        .unwrap();

        assert_eq!(transport.calls()[1].1[0]["status"], "1");
        assert_eq!(state["monitored"], false);
    }
}
