//! Typed representations of Zabbix API objects.
//!
//! The Zabbix API (3.x line) returns every scalar as a JSON string
//! (`"status": "0"`), so numeric fields here use the tolerant
//! [`string_int`] codec: deserialize from either form, serialize back as a
//! string, which every supported server version accepts.
//!
//! Fields the server computes (ids, `hosts` expansions from `select*`
//! query options) are skipped on serialization where sending them back
//! would be rejected or meaningless.

use serde::{Deserialize, Serialize};

/// (De)serialize an integer that the server represents as a string.
pub mod string_int {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize the integer as its decimal string form.
    pub fn serialize<S: Serializer>(v: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&v.to_string())
    }

    /// Deserialize from a JSON number or a decimal string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| D::Error::custom(format!("not an integer: {}", n))),
            serde_json::Value::String(s) => s
                .parse::<i64>()
                .map_err(|_| D::Error::custom(format!("not an integer: {:?}", s))),
            other => Err(D::Error::custom(format!("expected integer, got {}", other))),
        }
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

/// A reference to a host, as returned by `selectHosts` expansions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRef {
    /// Server-assigned host id.
    #[serde(rename = "hostid", default)]
    pub host_id: String,
    /// Technical host name.
    #[serde(default)]
    pub host: String,
}

/// A reference to a host group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroupRef {
    /// Server-assigned group id.
    #[serde(rename = "groupid")]
    pub group_id: String,
}

/// A reference to a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    /// Server-assigned template id.
    #[serde(rename = "templateid")]
    pub template_id: String,
}

/// A reference to a trigger, used for dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRef {
    /// Server-assigned trigger id.
    #[serde(rename = "triggerid")]
    pub trigger_id: String,
}

/// A host group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    /// Server-assigned group id.
    #[serde(rename = "groupid", default, skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    /// Group name.
    pub name: String,
}

/// A host interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInterface {
    /// Server-assigned interface id.
    #[serde(
        rename = "interfaceid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub interface_id: String,
    /// Whether this is the default interface of its type (0/1).
    #[serde(with = "string_int", default)]
    pub main: i64,
    /// Interface type (1 agent, 2 SNMP, 3 IPMI, 4 JMX).
    #[serde(rename = "type", with = "string_int", default)]
    pub interface_type: i64,
    /// Connect via IP instead of DNS (0/1).
    #[serde(rename = "useip", with = "string_int", default)]
    pub use_ip: i64,
    /// IP address, may be empty when connecting via DNS.
    #[serde(default)]
    pub ip: String,
    /// DNS name, may be empty when connecting via IP.
    #[serde(default)]
    pub dns: String,
    /// Port the agent listens on.
    #[serde(default)]
    pub port: String,
}

/// A host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Server-assigned host id.
    #[serde(rename = "hostid", default, skip_serializing_if = "String::is_empty")]
    pub host_id: String,
    /// Technical host name.
    pub host: String,
    /// Visible host name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Monitoring status (0 monitored, 1 unmonitored).
    #[serde(with = "string_int", default)]
    pub status: i64,
    /// Host interfaces.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<HostInterface>,
    /// Host groups the host belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<HostGroupRef>,
    /// Templates to link on create/update.
    #[serde(rename = "templates", default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateRef>,
    /// Templates currently linked, from `selectParentTemplates`.
    #[serde(rename = "parentTemplates", default, skip_serializing)]
    pub parent_templates: Vec<TemplateRef>,
}

/// A monitored item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Server-assigned item id.
    #[serde(rename = "itemid", default, skip_serializing_if = "String::is_empty")]
    pub item_id: String,
    /// Update interval in seconds.
    #[serde(with = "string_int", default)]
    pub delay: i64,
    /// Id of the host or template the item belongs to.
    #[serde(rename = "hostid", default, skip_serializing_if = "String::is_empty")]
    pub host_id: String,
    /// Id of the host interface used, "0" for none.
    #[serde(
        rename = "interfaceid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub interface_id: String,
    /// Item key.
    #[serde(rename = "key_")]
    pub key: String,
    /// Item name.
    pub name: String,
    /// Item type (0 Zabbix agent, 2 trapper, 7 active agent, ...).
    #[serde(rename = "type", with = "string_int", default)]
    pub item_type: i64,
    /// Type of stored values (0 float, 1 character, 3 unsigned, 4 text).
    #[serde(with = "string_int", default)]
    pub value_type: i64,
    /// Data type of the item (removed in server 3.4).
    #[serde(with = "string_int", default, skip_serializing_if = "is_zero")]
    pub data_type: i64,
    /// Delta processing of received values (removed in server 3.4).
    #[serde(with = "string_int", default, skip_serializing_if = "is_zero")]
    pub delta: i64,
    /// Item description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// History retention.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub history: String,
    /// Trends retention.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trends: String,
    /// Allowed hosts, used only by trapper items.
    #[serde(
        rename = "trapper_hosts",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub trapper_hosts: String,
    /// Hosts the item belongs to, from `selectHosts`.
    #[serde(rename = "hosts", default, skip_serializing)]
    pub parent_hosts: Vec<HostRef>,
}

/// An item prototype under a low-level discovery rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrototype {
    /// Server-assigned item prototype id.
    #[serde(rename = "itemid", default, skip_serializing_if = "String::is_empty")]
    pub item_id: String,
    /// Id of the discovery rule the prototype belongs to.
    #[serde(rename = "ruleid", default, skip_serializing_if = "String::is_empty")]
    pub rule_id: String,
    /// Update interval; prototypes accept suffixed forms like "1m".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub delay: String,
    /// Id of the host or template the prototype belongs to.
    #[serde(rename = "hostid", default, skip_serializing_if = "String::is_empty")]
    pub host_id: String,
    /// Id of the host interface used, "0" for none.
    #[serde(
        rename = "interfaceid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub interface_id: String,
    /// Item key.
    #[serde(rename = "key_")]
    pub key: String,
    /// Item name.
    pub name: String,
    /// Item type.
    #[serde(rename = "type", with = "string_int", default)]
    pub item_type: i64,
    /// Type of stored values.
    #[serde(with = "string_int", default)]
    pub value_type: i64,
    /// Data type of the item (removed in server 3.4).
    #[serde(with = "string_int", default, skip_serializing_if = "is_zero")]
    pub data_type: i64,
    /// Delta processing of received values (removed in server 3.4).
    #[serde(with = "string_int", default, skip_serializing_if = "is_zero")]
    pub delta: i64,
    /// Prototype description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// History retention.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub history: String,
    /// Trends retention.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trends: String,
    /// Allowed hosts, used only by trapper items.
    #[serde(
        rename = "trapper_hosts",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub trapper_hosts: String,
    /// Status of the prototype (0 enabled, 1 disabled).
    #[serde(with = "string_int", default)]
    pub status: i64,
    /// Hosts the prototype belongs to, from `selectHosts`.
    #[serde(rename = "hosts", default, skip_serializing)]
    pub parent_hosts: Vec<HostRef>,
}

/// A trigger function reference, from `selectFunctions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerFunction {
    /// Server-assigned function id, referenced in raw expressions.
    #[serde(rename = "functionid")]
    pub function_id: String,
    /// Id of the item the function operates on.
    #[serde(rename = "itemid")]
    pub item_id: String,
    /// Function name (last, avg, max, ...).
    pub function: String,
    /// Function parameter string.
    pub parameter: String,
}

/// A trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Server-assigned trigger id.
    #[serde(
        rename = "triggerid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub trigger_id: String,
    /// Trigger name.
    pub description: String,
    /// Trigger expression.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
    /// Additional comments.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comments: String,
    /// Severity (0 not classified .. 5 disaster).
    #[serde(with = "string_int", default)]
    pub priority: i64,
    /// Status (0 enabled, 1 disabled).
    #[serde(with = "string_int", default)]
    pub status: i64,
    /// Triggers this trigger depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TriggerRef>,
    /// Expression functions, from `selectFunctions`.
    #[serde(default, skip_serializing)]
    pub functions: Vec<TriggerFunction>,
    /// Hosts the trigger belongs to, from `selectHosts`.
    #[serde(rename = "hosts", default, skip_serializing)]
    pub parent_hosts: Vec<HostRef>,
}

/// A user macro, stored remotely with a `{$NAME}` wrapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    /// Wrapped macro name, e.g. `{$SNMP_COMMUNITY}`.
    #[serde(rename = "macro")]
    pub name: String,
    /// Macro value.
    pub value: String,
}

/// A template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Server-assigned template id.
    #[serde(
        rename = "templateid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub template_id: String,
    /// Technical name of the template.
    pub host: String,
    /// Visible name of the template.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Template description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Host groups the template belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<HostGroupRef>,
    /// User macros; always sent, so that clearing the last macro works.
    #[serde(rename = "macros", default)]
    pub user_macros: Vec<Macro>,
    /// Templates to link on create/update.
    #[serde(rename = "templates", default, skip_serializing_if = "Vec::is_empty")]
    pub linked_templates: Vec<TemplateRef>,
    /// Templates to unlink *and clear* on update.
    #[serde(
        rename = "templates_clear",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub templates_clear: Vec<TemplateRef>,
    /// Templates currently linked, from `selectParentTemplates`.
    #[serde(rename = "parentTemplates", default, skip_serializing)]
    pub parent_templates: Vec<TemplateRef>,
    /// Hosts linked to this template, from `selectHosts`.
    #[serde(rename = "hosts", default, skip_serializing)]
    pub linked_hosts: Vec<HostRef>,
}

/// A single low-level discovery filter condition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldCondition {
    /// LLD macro the condition matches on, e.g. `{#FSTYPE}`.
    #[serde(rename = "macro")]
    pub macro_name: String,
    /// Regular expression to match against.
    pub value: String,
    /// Condition operator (8 matches regex).
    #[serde(with = "string_int", default)]
    pub operator: i64,
}

/// A low-level discovery filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldFilter {
    /// Evaluation method (0 and/or, 1 and, 2 or, 3 custom).
    #[serde(rename = "evaltype", with = "string_int", default)]
    pub eval_type: i64,
    /// Custom evaluation formula, only used with eval type 3.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub formula: String,
    /// Filter conditions.
    #[serde(default)]
    pub conditions: Vec<LldCondition>,
}

impl LldFilter {
    /// Whether no filter was configured at all.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.formula.is_empty() && self.eval_type == 0
    }
}

/// A low-level discovery rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldRule {
    /// Server-assigned rule id (discovery rules share the item id space).
    #[serde(rename = "itemid", default, skip_serializing_if = "String::is_empty")]
    pub item_id: String,
    /// Update interval in seconds.
    #[serde(with = "string_int", default)]
    pub delay: i64,
    /// Id of the host or template the rule belongs to.
    #[serde(rename = "hostid", default, skip_serializing_if = "String::is_empty")]
    pub host_id: String,
    /// Id of the host interface used.
    #[serde(
        rename = "interfaceid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub interface_id: String,
    /// Rule key.
    #[serde(rename = "key_")]
    pub key: String,
    /// Rule name.
    pub name: String,
    /// Rule type (same value space as item types).
    #[serde(rename = "type", with = "string_int", default)]
    pub rule_type: i64,
    /// Discovery filter.
    #[serde(default, skip_serializing_if = "LldFilter::is_empty")]
    pub filter: LldFilter,
}

/// A trigger prototype under a low-level discovery rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPrototype {
    /// Server-assigned trigger prototype id.
    #[serde(
        rename = "triggerid",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub trigger_id: String,
    /// Trigger name.
    pub description: String,
    /// Trigger expression.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expression: String,
    /// Severity (0 not classified .. 5 disaster).
    #[serde(with = "string_int", default)]
    pub priority: i64,
    /// Status (0 enabled, 1 disabled).
    #[serde(with = "string_int", default)]
    pub status: i64,
    /// Trigger prototypes this prototype depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TriggerRef>,
    /// Expression functions, from `selectFunctions`.
    #[serde(default, skip_serializing)]
    pub functions: Vec<TriggerFunction>,
    /// Hosts the prototype belongs to, from `selectHosts`.
    #[serde(rename = "hosts", default, skip_serializing)]
    pub parent_hosts: Vec<HostRef>,
}
