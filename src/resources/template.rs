//! Template resource.
//!
//! User macros are stored remotely with a `{$NAME}` wrapper; declared state
//! keeps the bare names as map keys, so the wrapper is added on the way out
//! and stripped on the way back. A stored name that does not parse as
//! `{$NAME}` is a fatal error rather than a silently mangled key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::api::types::{Macro, Template, TemplateRef};
use crate::api::ZabbixClient;
use crate::error::ProviderError;
use crate::resources::{decode, group_names_of, group_refs_by_name, require_id, single_id};
use crate::retry;
use crate::schema::{Attribute, AttributeType, Schema};

/// Resource type name.
pub const TYPE: &str = "zabbix_template";

/// Declared configuration of a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Server-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Technical name of the template.
    #[serde(default)]
    pub host: String,
    /// Names of the host groups the template belongs to.
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Visible name of the template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Template description.
    #[serde(default)]
    pub description: String,
    /// User macros, bare names to values.
    #[serde(default, rename = "macro")]
    pub macros: BTreeMap<String, String>,
    /// Ids of templates linked to this template.
    #[serde(default)]
    pub linked_template: BTreeSet<String>,
}

/// The template schema.
pub fn schema() -> Schema {
    Schema::v0()
        .with_attribute("id", Attribute::computed_string())
        .with_attribute(
            "host",
            Attribute::required_string().with_description("Technical name of the template."),
        )
        .with_attribute(
            "groups",
            Attribute::required(AttributeType::set(AttributeType::String))
                .with_description("Names of the host groups the template belongs to."),
        )
        .with_attribute(
            "name",
            Attribute::optional_string().with_description("Visible name of the template."),
        )
        .with_attribute(
            "description",
            Attribute::optional_string().with_description("Description of the template."),
        )
        .with_attribute(
            "macro",
            Attribute::optional(AttributeType::map(AttributeType::String))
                .with_description("User macros for the template."),
        )
        .with_attribute(
            "linked_template",
            Attribute::optional(AttributeType::set(AttributeType::String)),
        )
}

/// Wrap a bare macro name into the server's `{$NAME}` form.
pub(crate) fn wrap_macro_name(name: &str) -> String {
    format!("{{${}}}", name)
}

/// Strip the `{$NAME}` wrapper off a stored macro name.
pub(crate) fn strip_macro_name(raw: &str) -> Result<String, ProviderError> {
    let inner = raw
        .strip_prefix("{$")
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| ProviderError::MacroFormat(raw.to_string()))?;
    if inner.is_empty() || inner.contains('{') || inner.contains('}') {
        return Err(ProviderError::MacroFormat(raw.to_string()));
    }
    Ok(inner.to_string())
}

fn macros_to_remote(macros: &BTreeMap<String, String>) -> Vec<Macro> {
    macros
        .iter()
        .map(|(name, value)| Macro {
            name: wrap_macro_name(name),
            value: value.clone(),
        })
        .collect()
}

fn macros_from_remote(macros: Vec<Macro>) -> Result<BTreeMap<String, String>, ProviderError> {
    macros
        .into_iter()
        .map(|m| Ok((strip_macro_name(&m.name)?, m.value)))
        .collect()
}

async fn to_remote(
    client: &ZabbixClient,
    config: &TemplateConfig,
) -> Result<Template, ProviderError> {
    Ok(Template {
        template_id: config.id.clone().unwrap_or_default(),
        host: config.host.clone(),
        name: config.name.clone().unwrap_or_default(),
        description: config.description.clone(),
        groups: group_refs_by_name(client, &config.groups).await?,
        user_macros: macros_to_remote(&config.macros),
        linked_templates: config
            .linked_template
            .iter()
            .map(|id| TemplateRef {
                template_id: id.clone(),
            })
            .collect(),
        templates_clear: Vec::new(),
        parent_templates: Vec::new(),
        linked_hosts: Vec::new(),
    })
}

/// Create the template and return the refreshed state.
pub async fn create(client: &ZabbixClient, planned: Value) -> Result<Value, ProviderError> {
    let config: TemplateConfig = decode(TYPE, planned)?;
    let template = to_remote(client, &config).await?;

    let id = retry::retry_create(|| {
        let template = template.clone();
        async move { single_id(client.templates_create(&[template]).await?) }
    })
    .await?;

    read_by_id(client, &id, &config).await
}

/// Read the template state back from the server.
pub async fn read(client: &ZabbixClient, current: Value) -> Result<Value, ProviderError> {
    let config: TemplateConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?.to_string();
    read_by_id(client, &id, &config).await
}

async fn read_by_id(
    client: &ZabbixClient,
    id: &str,
    declared: &TemplateConfig,
) -> Result<Value, ProviderError> {
    let template = client.template_by_id(id).await?;

    // The server mirrors an empty visible name from the technical name;
    // don't surface that echo as a declared name.
    let name = if template.name != template.host {
        Some(template.name.clone())
    } else {
        declared.name.clone().filter(|n| n == &template.name)
    };

    // Parse the stored macros before issuing further queries; malformed
    // names abort the read.
    let macros = macros_from_remote(template.user_macros)?;
    let groups = group_names_of(client, id).await?;

    Ok(serde_json::to_value(TemplateConfig {
        id: Some(template.template_id.clone()),
        host: template.host,
        groups,
        name,
        description: template.description,
        macros,
        linked_template: template
            .parent_templates
            .into_iter()
            .map(|t| t.template_id)
            .collect(),
    })?)
}

/// Update the template and return the refreshed state.
///
/// Templates removed from `linked_template` are unlinked *and cleared*, so
/// their inherited objects disappear from this template.
pub async fn update(
    client: &ZabbixClient,
    prior: Value,
    planned: Value,
) -> Result<Value, ProviderError> {
    let prior_config: TemplateConfig = decode(TYPE, prior)?;
    let config: TemplateConfig = decode(TYPE, planned)?;
    let id = require_id(&config.id, TYPE)?.to_string();

    let mut template = to_remote(client, &config).await?;
    template.template_id = id.clone();
    template.templates_clear = prior_config
        .linked_template
        .difference(&config.linked_template)
        .map(|unlinked| TemplateRef {
            template_id: unlinked.clone(),
        })
        .collect();

    retry::retry_create(|| {
        let template = template.clone();
        async move { single_id(client.templates_update(&[template]).await?) }
    })
    .await?;

    read_by_id(client, &id, &config).await
}

/// Delete the template.
pub async fn delete(client: &ZabbixClient, current: Value) -> Result<(), ProviderError> {
    let config: TemplateConfig = decode(TYPE, current)?;
    let id = require_id(&config.id, TYPE)?;
    client.templates_delete_by_ids(&[id.to_string()]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use serde_json::json;

    #[test]
    fn macro_names_wrap_and_strip() {
        assert_eq!(wrap_macro_name("SNMP_COMMUNITY"), "{$SNMP_COMMUNITY}");
        assert_eq!(strip_macro_name("{$SNMP_COMMUNITY}").unwrap(), "SNMP_COMMUNITY");
    }

    #[test]
    fn malformed_macro_names_are_fatal() {
        for raw in ["SNMP_COMMUNITY", "{SNMP}", "{$SNMP", "{$}", "{$A}B}"] {
            let err = strip_macro_name(raw).unwrap_err();
            assert!(
                matches!(err, ProviderError::MacroFormat(_)),
                "{:?} should be rejected",
                raw
            );
        }
    }

    #[tokio::test]
    async fn create_resolves_groups_and_wraps_macros() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect(
                    "hostgroup.get",
                    json!([{"groupid": "2", "name": "Templates"}]),
                )
                .expect("template.create", json!({"templateids": ["10093"]}))
                .expect(
                    "template.get",
                    json!([{
                        "templateid": "10093",
                        "host": "template-app-mysql",
                        "name": "template-app-mysql",
                        "macros": [{"macro": "{$MYSQL_PORT}", "value": "3306"}],
                    }]),
                )
                .expect(
                    "hostgroup.get",
                    json!([{"groupid": "2", "name": "Templates"}]),
                ),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let state = create(
            &client,
            json!({
                "host": "template-app-mysql",
                "groups": ["Templates"],
                "macro": {"MYSQL_PORT": "3306"},
            }),
        )
        .await
        .unwrap();

        let create_params = &transport.calls()[1].1;
        assert_eq!(create_params[0]["groups"], json!([{"groupid": "2"}]));
        assert_eq!(
            create_params[0]["macros"],
            json!([{"macro": "{$MYSQL_PORT}", "value": "3306"}])
        );

        assert_eq!(state["id"], "10093");
        assert_eq!(state["macro"]["MYSQL_PORT"], "3306");
        // Visible name mirrors the technical name: not surfaced.
        assert!(state.get("name").is_none() || state["name"].is_null());
    }

    #[tokio::test]
    async fn read_rejects_malformed_remote_macro() {
        let transport = MockTransport::new().expect(
            "template.get",
            json!([{
                "templateid": "10093",
                "host": "template-app-mysql",
                "macros": [{"macro": "MYSQL_PORT", "value": "3306"}],
            }]),
        );
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = read(
            &client,
            json!({"id": "10093", "host": "template-app-mysql", "groups": ["Templates"]}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::MacroFormat(_)));
    }

    #[tokio::test]
    async fn update_clears_unlinked_templates() {
        let transport = std::sync::Arc::new(
            MockTransport::new()
                .expect(
                    "hostgroup.get",
                    json!([{"groupid": "2", "name": "Templates"}]),
                )
                .expect("template.update", json!({"templateids": ["10093"]}))
                .expect(
                    "template.get",
                    json!([{
                        "templateid": "10093",
                        "host": "template-app-mysql",
                        "parentTemplates": [{"templateid": "10100"}],
                    }]),
                )
                .expect(
                    "hostgroup.get",
                    json!([{"groupid": "2", "name": "Templates"}]),
                ),
        );
        let client = ZabbixClient::with_transport(Box::new(std::sync::Arc::clone(&transport)));

        let prior = json!({
            "id": "10093",
            "host": "template-app-mysql",
            "groups": ["Templates"],
            "linked_template": ["10100", "10101"],
        });
        let planned = json!({
            "id": "10093",
            "host": "template-app-mysql",
            "groups": ["Templates"],
            "linked_template": ["10100"],
        });

        let state = update(&client, prior, planned).await.unwrap();

        let update_params = &transport.calls()[1].1;
        assert_eq!(
            update_params[0]["templates_clear"],
            json!([{"templateid": "10101"}])
        );
        assert_eq!(state["linked_template"], json!(["10100"]));
    }
}
