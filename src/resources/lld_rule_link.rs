//! Discovery rule link resource.
//!
//! The prototype-level twin of the template link: reconciles the item and
//! trigger prototypes directly owned by a low-level discovery rule,
//! protecting the ones inherited through template linkage.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::link::{merge_remote, prune_candidates, trusted, LinkedRef};
use crate::resources::template_link::split_ids;
use crate::resources::decode;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_lld_rule_link";

/// A declared item prototype child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPrototypeChild {
    /// Id of the item prototype.
    pub item_id: String,
    /// Whether the prototype is managed by its own resource.
    #[serde(default)]
    pub local: bool,
}

/// A declared trigger prototype child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerPrototypeChild {
    /// Id of the trigger prototype.
    pub trigger_id: String,
    /// Whether the prototype is managed by its own resource.
    #[serde(default)]
    pub local: bool,
}

/// Declared configuration of a discovery rule link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LldRuleLinkConfig {
    /// Link id; the discovery rule id doubles as the link's identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the discovery rule whose prototypes are reconciled.
    #[serde(default)]
    pub lld_rule_id: String,
    /// Declared item prototypes.
    #[serde(default)]
    pub item_prototype: Vec<ItemPrototypeChild>,
    /// Declared trigger prototypes.
    #[serde(default)]
    pub trigger_prototype: Vec<TriggerPrototypeChild>,
}

/// The discovery rule link schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("lld_rule_id", Attribute::required_string())
        .with_attribute(
            "item_prototype",
            Attribute::optional(AttributeType::set(AttributeType::object([
                ("item_id", AttributeType::String),
                ("local", AttributeType::Bool),
            ]))),
        )
        .with_attribute(
            "trigger_prototype",
            Attribute::optional(AttributeType::set(AttributeType::object([
                ("trigger_id", AttributeType::String),
                ("local", AttributeType::Bool),
            ]))),
        )
}

fn item_refs(children: &[ItemPrototypeChild]) -> Vec<LinkedRef> {
    children
        .iter()
        .map(|c| LinkedRef {
            id: c.item_id.clone(),
            local: c.local,
        })
        .collect()
}

fn trigger_refs(children: &[TriggerPrototypeChild]) -> Vec<LinkedRef> {
    children
        .iter()
        .map(|c| LinkedRef {
            id: c.trigger_id.clone(),
            local: c.local,
        })
        .collect()
}

async fn remote_item_prototype_ids(
    client: &ZabbixClient,
    rule_id: &str,
    inherited: bool,
) -> Result<Vec<String>, ProviderError> {
    let prototypes = client
        .item_prototypes_get(json!({
            "output": "extend",
            "discoveryids": [rule_id],
            "inherited": inherited,
        }))
        .await?;
    Ok(prototypes.into_iter().map(|p| p.item_id).collect())
}

async fn remote_trigger_prototype_ids(
    client: &ZabbixClient,
    rule_id: &str,
    inherited: bool,
) -> Result<Vec<String>, ProviderError> {
    let prototypes = client
        .trigger_prototypes_get(json!({
            "output": "extend",
            "discoveryids": [rule_id],
            "inherited": inherited,
        }))
        .await?;
    Ok(prototypes.into_iter().map(|p| p.trigger_id).collect())
}

fn state_from(
    rule_id: String,
    items: Vec<LinkedRef>,
    triggers: Vec<LinkedRef>,
) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(LldRuleLinkConfig {
        id: Some(rule_id.clone()),
        lld_rule_id: rule_id,
        item_prototype: items
            .into_iter()
            .map(|c| ItemPrototypeChild {
                item_id: c.id,
                local: c.local,
            })
            .collect(),
        trigger_prototype: triggers
            .into_iter()
            .map(|c| TriggerPrototypeChild {
                trigger_id: c.id,
                local: c.local,
            })
            .collect(),
    })?)
}

/// Create the link: a trusted read keyed by the discovery rule id.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: LldRuleLinkConfig = decode(TYPE, planned)?;
    read_trusted(client, &config.lld_rule_id).await
}

/// Plan-view read: declared prototypes keep their ids, server-side extras
/// are surfaced with `local = false`.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: LldRuleLinkConfig = decode(TYPE, current)?;

    let items = merge_remote(
        &item_refs(&config.item_prototype),
        remote_item_prototype_ids(client, &config.lld_rule_id, false).await?,
    );
    let triggers = merge_remote(
        &trigger_refs(&config.trigger_prototype),
        remote_trigger_prototype_ids(client, &config.lld_rule_id, false).await?,
    );

    state_from(config.lld_rule_id, items, triggers)
}

async fn read_trusted(client: &ZabbixClient, rule_id: &str) -> Result<Value, ProviderError> {
    let items = trusted(remote_item_prototype_ids(client, rule_id, false).await?);
    let triggers = trusted(remote_trigger_prototype_ids(client, rule_id, false).await?);
    state_from(rule_id.to_string(), items, triggers)
}

/// Reconcile: delete prototypes that dropped out of the declared set,
/// except inherited and locally-managed ones, then re-read.
pub async fn update(
    client: &ZabbixClient,
    prior: Value,
    planned: Value,
) -> Result<Value, ProviderError> {
    let prior_config: LldRuleLinkConfig = decode(TYPE, prior)?;
    let config: LldRuleLinkConfig = decode(TYPE, planned)?;
    let rule_id = &config.lld_rule_id;

    let protected: HashSet<String> = remote_item_prototype_ids(client, rule_id, true)
        .await?
        .into_iter()
        .collect();
    let removed_items = prune_candidates(
        &item_refs(&prior_config.item_prototype),
        &item_refs(&config.item_prototype),
        &protected,
    );
    if !removed_items.is_empty() {
        tracing::debug!(%rule_id, ids = ?removed_items, "pruning item prototypes from rule link");
        client.item_prototypes_delete_by_ids(&removed_items).await?;
    }

    let protected: HashSet<String> = remote_trigger_prototype_ids(client, rule_id, true)
        .await?
        .into_iter()
        .collect();
    let removed_triggers = prune_candidates(
        &trigger_refs(&prior_config.trigger_prototype),
        &trigger_refs(&config.trigger_prototype),
        &protected,
    );
    if !removed_triggers.is_empty() {
        tracing::debug!(%rule_id, ids = ?removed_triggers, "pruning trigger prototypes from rule link");
        client
            .trigger_prototypes_delete_by_ids(&removed_triggers)
            .await?;
    }

    read_trusted(client, rule_id).await
}

/// Deleting a link deletes nothing remotely; the prototypes have owners.
pub async fn delete(_client: &ZabbixClient, _current: Value) -> Result<(), ProviderError> {
    Ok(())
}

/// Parse a composite import id of the form
/// `RULEID_ITEMIDS_TRIGGERIDS`, with `.`-separated id lists.
pub fn import_state(id: &str) -> Result<Value, ProviderError> {
    let parts: Vec<&str> = id.split('_').collect();
    let [rule_id, item_ids, trigger_ids] = parts.as_slice() else {
        return Err(ProviderError::Validation(format!(
            "expected import id format RULEID_ITEMIDS_TRIGGERIDS \
             (use \".\" to separate multiple ids), got {:?}",
            id
        )));
    };

    Ok(serde_json::to_value(LldRuleLinkConfig {
        id: Some(rule_id.to_string()),
        lld_rule_id: rule_id.to_string(),
        item_prototype: split_ids(item_ids)
            .map(|item_id| ItemPrototypeChild {
                item_id,
                local: true,
            })
            .collect(),
        trigger_prototype: split_ids(trigger_ids)
            .map(|trigger_id| TriggerPrototypeChild {
                trigger_id,
                local: true,
            })
            .collect(),
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::sync::Arc;

    fn prototypes_result(ids: &[&str]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| json!({"itemid": id, "key_": "k", "name": "n"}))
                .collect(),
        )
    }

    fn trigger_prototypes_result(ids: &[&str]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| json!({"triggerid": id, "description": "d"}))
                .collect(),
        )
    }

    #[tokio::test]
    async fn queries_are_keyed_by_discovery_rule() {
        let transport = Arc::new(
            MockTransport::new()
                .expect("itemprototype.get", prototypes_result(&["1"]))
                .expect("triggerprototype.get", trigger_prototypes_result(&[])),
        );
        let client = ZabbixClient::with_transport(Box::new(Arc::clone(&transport)));

        let state = read(
            &client,
            json!({"id": "28336", "lld_rule_id": "28336"}),
        )
        .await
        .unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].1["discoveryids"], json!(["28336"]));
        assert_eq!(calls[0].1["inherited"], json!(false));
        assert_eq!(
            state["item_prototype"],
            json!([{"item_id": "1", "local": false}])
        );
    }

    #[tokio::test]
    async fn update_prunes_unprotected_prototypes() {
        let transport = Arc::new(
            MockTransport::new()
                .expect("itemprototype.get", prototypes_result(&["7"])) // inherited
                .expect("itemprototype.delete", json!({"prototypeids": ["2"]}))
                .expect("triggerprototype.get", trigger_prototypes_result(&["8"])) // inherited
                .expect("triggerprototype.delete", json!({"triggerids": ["5"]}))
                .expect("itemprototype.get", prototypes_result(&["1", "7"]))
                .expect("triggerprototype.get", trigger_prototypes_result(&["8"])),
        );
        let client = ZabbixClient::with_transport(Box::new(Arc::clone(&transport)));

        let prior = json!({
            "id": "28336",
            "lld_rule_id": "28336",
            "item_prototype": [
                {"item_id": "1", "local": true},
                {"item_id": "2", "local": false},
                {"item_id": "7", "local": false},
            ],
            "trigger_prototype": [
                {"trigger_id": "5", "local": false},
                {"trigger_id": "8", "local": false},
            ],
        });
        let planned = json!({
            "id": "28336",
            "lld_rule_id": "28336",
            "item_prototype": [{"item_id": "1", "local": true}],
        });

        update(&client, prior, planned).await.unwrap();

        let calls = transport.calls();
        // 7 and 8 are inherited: protected. 1 is local. Only 2 and 5 go.
        assert_eq!(calls[1].0, "itemprototype.delete");
        assert_eq!(calls[1].1, json!(["2"]));
        assert_eq!(calls[3].0, "triggerprototype.delete");
        assert_eq!(calls[3].1, json!(["5"]));
    }

    #[test]
    fn import_parses_composite_id() {
        let state = import_state("28336_1_5.6").unwrap();
        assert_eq!(state["lld_rule_id"], "28336");
        assert_eq!(
            state["trigger_prototype"],
            json!([
                {"trigger_id": "5", "local": true},
                {"trigger_id": "6", "local": true},
            ])
        );
    }
}
