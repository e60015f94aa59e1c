//! Template link resource.
//!
//! Declares which items and triggers belong directly to a template, and
//! prunes the ones the server grew beyond that declaration. Children that
//! exist because another template is linked (`inherited = true`) are owned
//! by that template and are never deleted here, no matter what the diff
//! says. Children flagged `local` have their own resource managing them
//! and are skipped as well.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;

use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::link::{merge_remote, prune_candidates, trusted, LinkedRef};
use crate::resources::decode;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_template_link";

/// A declared item child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemChild {
    /// Id of the item.
    pub item_id: String,
    /// Whether the item is managed by its own resource.
    #[serde(default)]
    pub local: bool,
}

/// A declared trigger child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerChild {
    /// Id of the trigger.
    pub trigger_id: String,
    /// Whether the trigger is managed by its own resource.
    #[serde(default)]
    pub local: bool,
}

/// Declared configuration of a template link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateLinkConfig {
    /// Link id; the template id doubles as the link's identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the template whose children are reconciled.
    #[serde(default)]
    pub template_id: String,
    /// Declared items.
    #[serde(default)]
    pub item: Vec<ItemChild>,
    /// Declared triggers.
    #[serde(default)]
    pub trigger: Vec<TriggerChild>,
}

/// The template link schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute("template_id", Attribute::required_string())
        .with_attribute(
            "item",
            Attribute::optional(AttributeType::set(AttributeType::object([
                ("item_id", AttributeType::String),
                ("local", AttributeType::Bool),
            ]))),
        )
        .with_attribute(
            "trigger",
            Attribute::optional(AttributeType::set(AttributeType::object([
                ("trigger_id", AttributeType::String),
                ("local", AttributeType::Bool),
            ]))),
        )
}

fn item_refs(children: &[ItemChild]) -> Vec<LinkedRef> {
    children
        .iter()
        .map(|c| LinkedRef {
            id: c.item_id.clone(),
            local: c.local,
        })
        .collect()
}

fn trigger_refs(children: &[TriggerChild]) -> Vec<LinkedRef> {
    children
        .iter()
        .map(|c| LinkedRef {
            id: c.trigger_id.clone(),
            local: c.local,
        })
        .collect()
}

async fn remote_item_ids(
    client: &ZabbixClient,
    template_id: &str,
    inherited: bool,
) -> Result<Vec<String>, ProviderError> {
    let items = client
        .items_get(json!({
            "output": "extend",
            "templateids": [template_id],
            "inherited": inherited,
        }))
        .await?;
    Ok(items.into_iter().map(|i| i.item_id).collect())
}

async fn remote_trigger_ids(
    client: &ZabbixClient,
    template_id: &str,
    inherited: bool,
) -> Result<Vec<String>, ProviderError> {
    let triggers = client
        .triggers_get(json!({
            "output": "extend",
            "templateids": [template_id],
            "inherited": inherited,
        }))
        .await?;
    Ok(triggers.into_iter().map(|t| t.trigger_id).collect())
}

fn state_from(
    template_id: String,
    items: Vec<LinkedRef>,
    triggers: Vec<LinkedRef>,
) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(TemplateLinkConfig {
        id: Some(template_id.clone()),
        template_id,
        item: items
            .into_iter()
            .map(|c| ItemChild {
                item_id: c.id,
                local: c.local,
            })
            .collect(),
        trigger: triggers
            .into_iter()
            .map(|c| TriggerChild {
                trigger_id: c.id,
                local: c.local,
            })
            .collect(),
    })?)
}

/// Create the link: nothing exists remotely for a link itself, so this is
/// a trusted read keyed by the template id.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: TemplateLinkConfig = decode(TYPE, planned)?;
    read_trusted(client, &config.template_id).await
}

/// Plan-view read: declared children keep their ids, server-side extras
/// are surfaced with `local = false`.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: TemplateLinkConfig = decode(TYPE, current)?;

    let items = merge_remote(
        &item_refs(&config.item),
        remote_item_ids(client, &config.template_id, false).await?,
    );
    let triggers = merge_remote(
        &trigger_refs(&config.trigger),
        remote_trigger_ids(client, &config.template_id, false).await?,
    );

    state_from(config.template_id, items, triggers)
}

/// Post-apply read: whatever the server holds directly on the template is
/// the declared set now.
async fn read_trusted(client: &ZabbixClient, template_id: &str) -> Result<Value, ProviderError> {
    let items = trusted(remote_item_ids(client, template_id, false).await?);
    let triggers = trusted(remote_trigger_ids(client, template_id, false).await?);
    state_from(template_id.to_string(), items, triggers)
}

/// Reconcile: delete children that dropped out of the declared set, except
/// inherited and locally-managed ones, then re-read.
pub async fn update(
    client: &ZabbixClient,
    prior: Value,
    planned: Value,
) -> Result<Value, ProviderError> {
    let prior_config: TemplateLinkConfig = decode(TYPE, prior)?;
    let config: TemplateLinkConfig = decode(TYPE, planned)?;
    let template_id = &config.template_id;

    let protected: HashSet<String> = remote_item_ids(client, template_id, true)
        .await?
        .into_iter()
        .collect();
    let removed_items = prune_candidates(
        &item_refs(&prior_config.item),
        &item_refs(&config.item),
        &protected,
    );
    if !removed_items.is_empty() {
        tracing::debug!(%template_id, ids = ?removed_items, "pruning items from template link");
        client.items_delete_by_ids(&removed_items).await?;
    }

    let protected: HashSet<String> = remote_trigger_ids(client, template_id, true)
        .await?
        .into_iter()
        .collect();
    let removed_triggers = prune_candidates(
        &trigger_refs(&prior_config.trigger),
        &trigger_refs(&config.trigger),
        &protected,
    );
    if !removed_triggers.is_empty() {
        tracing::debug!(%template_id, ids = ?removed_triggers, "pruning triggers from template link");
        client.triggers_delete_by_ids(&removed_triggers).await?;
    }

    read_trusted(client, template_id).await
}

/// Deleting a link deletes nothing remotely; the children have owners.
pub async fn delete(_client: &ZabbixClient, _current: Value) -> Result<(), ProviderError> {
    Ok(())
}

/// Parse a composite import id of the form
/// `TEMPLATEID_ITEMIDS_TRIGGERIDS`, with `.`-separated id lists.
pub fn import_state(id: &str) -> Result<Value, ProviderError> {
    let parts: Vec<&str> = id.split('_').collect();
    let [template_id, item_ids, trigger_ids] = parts.as_slice() else {
        return Err(ProviderError::Validation(format!(
            "expected import id format TEMPLATEID_ITEMIDS_TRIGGERIDS \
             (use \".\" to separate multiple ids), got {:?}",
            id
        )));
    };

    Ok(serde_json::to_value(TemplateLinkConfig {
        id: Some(template_id.to_string()),
        template_id: template_id.to_string(),
        item: split_ids(item_ids)
            .map(|item_id| ItemChild {
                item_id,
                local: true,
            })
            .collect(),
        trigger: split_ids(trigger_ids)
            .map(|trigger_id| TriggerChild {
                trigger_id,
                local: true,
            })
            .collect(),
    })?)
}

pub(crate) fn split_ids(ids: &str) -> impl Iterator<Item = String> + '_ {
    ids.split('.')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use std::sync::Arc;

    fn items_result(ids: &[&str]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| json!({"itemid": id, "key_": "k", "name": "n"}))
                .collect(),
        )
    }

    fn triggers_result(ids: &[&str]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| json!({"triggerid": id, "description": "d"}))
                .collect(),
        )
    }

    #[tokio::test]
    async fn read_surfaces_declared_and_server_side_children() {
        // Declared: items A=1, B=2. The server also holds item 9 directly
        // on the template; inherited children don't show up in the
        // non-inherited listing at all.
        let transport = MockTransport::new()
            .expect("item.get", items_result(&["1", "2", "9"]))
            .expect("trigger.get", triggers_result(&[]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let state = read(
            &client,
            json!({
                "id": "10093",
                "template_id": "10093",
                "item": [
                    {"item_id": "1", "local": true},
                    {"item_id": "2", "local": true},
                ],
            }),
        )
        .await
        .unwrap();

        assert_eq!(
            state["item"],
            json!([
                {"item_id": "1", "local": true},
                {"item_id": "2", "local": true},
                {"item_id": "9", "local": false},
            ])
        );
    }

    #[tokio::test]
    async fn update_prunes_only_unprotected_remote_children() {
        // Prior children: 2 (discovered) and 3 (discovered). Declared set
        // keeps neither. 3 is inherited from a linked template, so only 2
        // may be deleted.
        let transport = Arc::new(
            MockTransport::new()
                .expect("item.get", items_result(&["3"])) // inherited = true
                .expect("item.delete", json!({"itemids": ["2"]}))
                .expect("trigger.get", triggers_result(&[])) // inherited = true
                .expect("item.get", items_result(&["1", "3"])) // trusted read
                .expect("trigger.get", triggers_result(&[])),
        );
        let client = ZabbixClient::with_transport(Box::new(Arc::clone(&transport)));

        let prior = json!({
            "id": "10093",
            "template_id": "10093",
            "item": [
                {"item_id": "1", "local": true},
                {"item_id": "2", "local": false},
                {"item_id": "3", "local": false},
            ],
        });
        let planned = json!({
            "id": "10093",
            "template_id": "10093",
            "item": [{"item_id": "1", "local": true}],
        });

        let state = update(&client, prior, planned).await.unwrap();

        let calls = transport.calls();
        assert_eq!(calls[0].1["inherited"], json!(true));
        assert_eq!(calls[1].0, "item.delete");
        assert_eq!(calls[1].1, json!(["2"]));

        // Trusted read-back marks the survivors local.
        assert_eq!(
            state["item"],
            json!([
                {"item_id": "1", "local": true},
                {"item_id": "3", "local": true},
            ])
        );
    }

    #[tokio::test]
    async fn update_leaves_locally_managed_children_alone() {
        // Item 5 was declared local and dropped out of the declared set:
        // its own resource deletes it, the link must not.
        let transport = Arc::new(
            MockTransport::new()
                .expect("item.get", items_result(&[])) // inherited = true
                .expect("trigger.get", triggers_result(&[]))
                .expect("item.get", items_result(&[]))
                .expect("trigger.get", triggers_result(&[])),
        );
        let client = ZabbixClient::with_transport(Box::new(Arc::clone(&transport)));

        let prior = json!({
            "id": "10093",
            "template_id": "10093",
            "item": [{"item_id": "5", "local": true}],
        });
        let planned = json!({"id": "10093", "template_id": "10093"});

        update(&client, prior, planned).await.unwrap();

        // No delete call was issued.
        assert!(transport
            .calls()
            .iter()
            .all(|(method, _)| method != "item.delete"));
    }

    #[tokio::test]
    async fn second_pass_deletes_nothing() {
        // After a reconcile the trusted read makes prior equal declared;
        // running update again issues no deletes.
        let transport = Arc::new(
            MockTransport::new()
                .expect("item.get", items_result(&[]))
                .expect("trigger.get", triggers_result(&[]))
                .expect("item.get", items_result(&["1"]))
                .expect("trigger.get", triggers_result(&[])),
        );
        let client = ZabbixClient::with_transport(Box::new(Arc::clone(&transport)));

        let settled = json!({
            "id": "10093",
            "template_id": "10093",
            "item": [{"item_id": "1", "local": true}],
        });

        update(&client, settled.clone(), settled).await.unwrap();
        assert!(transport
            .calls()
            .iter()
            .all(|(method, _)| !method.ends_with(".delete")));
    }

    #[tokio::test]
    async fn create_assigns_template_id_as_link_id() {
        let transport = MockTransport::new()
            .expect("item.get", items_result(&["1"]))
            .expect("trigger.get", triggers_result(&["4"]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let state = create(&client, json!({"template_id": "10093"})).await.unwrap();
        assert_eq!(state["id"], "10093");
        assert_eq!(state["item"], json!([{"item_id": "1", "local": true}]));
        assert_eq!(state["trigger"], json!([{"trigger_id": "4", "local": true}]));
    }

    #[test]
    fn import_parses_composite_id() {
        let state = import_state("10093_1.2_4").unwrap();
        assert_eq!(state["template_id"], "10093");
        assert_eq!(
            state["item"],
            json!([
                {"item_id": "1", "local": true},
                {"item_id": "2", "local": true},
            ])
        );
        assert_eq!(state["trigger"], json!([{"trigger_id": "4", "local": true}]));

        assert!(import_state("10093_1").is_err());
    }
}
