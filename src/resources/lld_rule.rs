//! Low-level discovery rule resource.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::types::{LldCondition, LldFilter, LldRule};
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{decode, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_lld_rule";

fn default_operator() -> i64 {
    // "matches regex"
    8
}

/// One declared filter condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// LLD macro the condition matches on, e.g. `{#FSTYPE}`.
    pub macro_name: String,
    /// Regular expression to match against.
    pub value: String,
    /// Condition operator.
    #[serde(default = "default_operator")]
    pub operator: i64,
}

/// The declared discovery filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Filter conditions.
    #[serde(default)]
    pub condition: Vec<ConditionConfig>,
    /// Evaluation method.
    #[serde(default)]
    pub eval_type: i64,
    /// Custom evaluation formula.
    #[serde(default)]
    pub formula: String,
}

/// Declared configuration of a discovery rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LldRuleConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Update interval in seconds.
    #[serde(default)]
    pub delay: i64,
    /// Id of the host or template the rule belongs to.
    #[serde(default)]
    pub host_id: String,
    /// Id of the host interface used.
    #[serde(default)]
    pub interface_id: String,
    /// Rule key.
    #[serde(default)]
    pub key: String,
    /// Rule name.
    #[serde(default)]
    pub name: String,
    /// Rule type.
    #[serde(default, rename = "type")]
    pub rule_type: i64,
    /// Discovery filter.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// The discovery rule schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("delay", Attribute::required_int64())
        .with_attribute("host_id", Attribute::required_string())
        .with_attribute("interface_id", Attribute::required_string())
        .with_attribute("key", Attribute::required_string())
        .with_attribute("name", Attribute::required_string())
        .with_attribute("type", Attribute::required_int64())
        .with_attribute(
            "filter",
            Attribute::required(AttributeType::object([
                (
                    "condition",
                    AttributeType::set(AttributeType::object([
                        ("macro_name", AttributeType::String),
                        ("value", AttributeType::String),
                        ("operator", AttributeType::Int64),
                    ])),
                ),
                ("eval_type", AttributeType::Int64),
                ("formula", AttributeType::String),
            ])),
        )
}

fn to_remote(config: &LldRuleConfig) -> LldRule {
    LldRule {
        item_id: config.id.clone().unwrap_or_default(),
        delay: config.delay,
        host_id: config.host_id.clone(),
        interface_id: config.interface_id.clone(),
        key: config.key.clone(),
        name: config.name.clone(),
        rule_type: config.rule_type,
        filter: LldFilter {
            eval_type: config.filter.eval_type,
            formula: config.filter.formula.clone(),
            conditions: config
                .filter
                .condition
                .iter()
                .map(|c| LldCondition {
                    macro_name: c.macro_name.clone(),
                    value: c.value.clone(),
                    operator: c.operator,
                })
                .collect(),
        },
    }
}

fn state_from(rule: LldRule) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(LldRuleConfig {
        id: Some(rule.item_id),
        delay: rule.delay,
        host_id: rule.host_id,
        interface_id: rule.interface_id,
        key: rule.key,
        name: rule.name,
        rule_type: rule.rule_type,
        filter: FilterConfig {
            condition: rule
                .filter
                .conditions
                .into_iter()
                .map(|c| ConditionConfig {
                    macro_name: c.macro_name,
                    value: c.value,
                    operator: c.operator,
                })
                .collect(),
            eval_type: rule.filter.eval_type,
            formula: rule.filter.formula,
        },
    })?)
}

/// Create the discovery rule and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: LldRuleConfig = decode(TYPE, planned)?;
    let rule = to_remote(&config);

    let id = retry::retry_create(|| {
        let rule = rule.clone();
        async move { single_id(client.lld_rules_create(&[rule]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Read the discovery rule state back from the server.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: LldRuleConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    read_by_id(client, id).await
}

async fn read_by_id(client: &ZabbixClient, id: &str) -> Result<Value, ProviderError> {
    state_from(client.lld_rule_by_id(id).await?)
}

/// Update the discovery rule and return the refreshed state.
pub async fn update(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: LldRuleConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    let rule = to_remote(&config);

    retry::retry_create(|| {
        let rule = rule.clone();
        async move { single_id(client.lld_rules_update(&[rule]).await?) }
    })
    .await?;

    read_by_id(client, &id).await
}

/// Delete the discovery rule; its prototypes go with it server-side.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: LldRuleConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    client.lld_rules_delete_by_ids(&[id.to_string()]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    fn remote_rule() -> Value {
        json!({
            "itemid": "28336",
            "delay": "60",
            "hostid": "10084",
            "interfaceid": "1",
            "key_": "vfs.fs.discovery",
            "name": "Mounted filesystem discovery",
            "type": "0",
            "filter": {
                "evaltype": "0",
                "formula": "",
                "conditions": [{
                    "macro": "{#FSTYPE}",
                    "value": "@File systems for discovery",
                    "operator": "8",
                }],
            },
        })
    }

    #[tokio::test]
    async fn create_round_trips_filter() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect("discoveryrule.create", json!({"itemids": ["28336"]}))
                .expect("discoveryrule.get", json!([remote_rule()])),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let state = create(
            &client,
            json!({
                "delay": 60,
                "host_id": "10084",
                "interface_id": "1",
                "key": "vfs.fs.discovery",
                "name": "Mounted filesystem discovery",
                "type": 0,
                "filter": {
                    "condition": [{
                        "macro_name": "{#FSTYPE}",
                        "value": "@File systems for discovery",
                    }],
                    "eval_type": 0,
                },
            }),
        )
        .await
        .unwrap();

        let create_params = &transport.calls()[0].1;
        assert_eq!(
            create_params[0]["filter"]["conditions"][0]["macro"],
            "{#FSTYPE}"
        );
        assert_eq!(create_params[0]["filter"]["conditions"][0]["operator"], "8");

        assert_eq!(state["id"], "28336");
        assert_eq!(state["filter"]["condition"][0]["macro_name"], "{#FSTYPE}");
        assert_eq!(state["filter"]["eval_type"], 0);
    }

    #[tokio::test]
    async fn read_maps_not_found() {
        let transport = MockTransport::new().expect("discoveryrule.get", json!([]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = read(
            &client,
            json!({
                "id": "28336",
                "delay": 60,
                "host_id": "10084",
                "interface_id": "1",
                "key": "vfs.fs.discovery",
                "name": "Mounted filesystem discovery",
                "type": 0,
                "filter": {"condition": [], "eval_type": 0},
            }),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
