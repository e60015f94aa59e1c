//! JSON-RPC client for the Zabbix API.
//!
//! One HTTP POST per call, `{"jsonrpc": "2.0", method, params, id, auth}`
//! against a single endpoint. The session token is obtained once by
//! [`ZabbixClient::login`] and reused read-only for the lifetime of the
//! client; concurrent calls are safe because every call is an independent
//! request.
//!
//! The [`Transport`] trait is the only seam: production uses
//! [`HttpTransport`] (reqwest), tests script a
//! [`MockTransport`](crate::testing::MockTransport).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::api::types::{
    Host, HostGroup, Item, ItemPrototype, LldRule, Template, Trigger, TriggerPrototype,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Transport over which JSON-RPC calls are issued.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform one call and return the `result` member of the response.
    ///
    /// A JSON-RPC error object must be surfaced as
    /// [`ProviderError::Api`].
    async fn call(
        &self,
        method: &str,
        params: &Value,
        auth: Option<&str>,
    ) -> Result<Value, ProviderError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a Value,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<&'a str>,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: String,
}

/// HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Build a transport for the given endpoint.
    ///
    /// With `tls_insecure` the server certificate is not verified.
    pub fn new(url: impl Into<String>, tls_insecure: bool) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(tls_insecure)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        method: &str,
        params: &Value,
        auth: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            auth,
        };

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(ProviderError::Api {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        response.result.ok_or_else(|| ProviderError::Api {
            code: 0,
            message: "response carried neither result nor error".to_string(),
            data: String::new(),
        })
    }
}

/// Client for the Zabbix management API.
pub struct ZabbixClient {
    transport: Box<dyn Transport>,
    auth: OnceLock<String>,
}

impl ZabbixClient {
    /// Build a client from provider configuration.
    pub fn connect(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self::with_transport(Box::new(HttpTransport::new(
            config.server_url.clone(),
            config.tls_insecure,
        )?)))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            auth: OnceLock::new(),
        }
    }

    /// Issue a raw API call.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        // user.login and apiinfo.version are the two unauthenticated calls;
        // the server rejects them when an auth member is present.
        let auth = if matches!(method, "user.login" | "apiinfo.version") {
            None
        } else {
            self.auth.get().map(String::as_str)
        };
        debug!(method, "calling Zabbix API");
        trace!(method, %params, "request params");
        self.transport.call(method, &params, auth).await
    }

    /// Authenticate and store the session token for all further calls.
    pub async fn login(&self, user: &str, password: &str) -> Result<(), ProviderError> {
        let result = self
            .request("user.login", json!({"user": user, "password": password}))
            .await?;
        let token = result
            .as_str()
            .ok_or_else(|| ProviderError::Configuration("login returned no session token".into()))?;
        // Set-once: the token is never rotated in-process.
        let _ = self.auth.set(token.to_string());
        Ok(())
    }

    /// Fetch the server version string, e.g. `"3.4.15"`.
    pub async fn server_version(&self) -> Result<String, ProviderError> {
        let result = self.request("apiinfo.version", json!([])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Configuration("apiinfo.version returned no string".into()))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Vec<T>, ProviderError> {
        let result = self.request(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Run a create/update/delete call and pull the affected ids out of the
    /// response object (`{"itemids": ["23296", ...]}`).
    async fn mutate(
        &self,
        method: &str,
        params: Value,
        ids_key: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let result = self.request(method, params).await?;
        let ids = result
            .get(ids_key)
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Api {
                code: 0,
                message: format!("{} response carried no {}", method, ids_key),
                data: String::new(),
            })?;
        Ok(ids
            .iter()
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect())
    }

    fn exactly_one<T>(
        objects: Vec<T>,
        kind: &'static str,
        id: &str,
    ) -> Result<T, ProviderError> {
        let mut objects = objects;
        match objects.len() {
            1 => Ok(objects.remove(0)),
            0 => Err(ProviderError::NotFound(format!("{} {}", kind, id))),
            got => Err(ProviderError::AmbiguousResult {
                kind,
                id: id.to_string(),
                got,
            }),
        }
    }

    // =========================================================================
    // Host groups
    // =========================================================================

    /// `hostgroup.get`.
    pub async fn host_groups_get(&self, params: Value) -> Result<Vec<HostGroup>, ProviderError> {
        self.fetch("hostgroup.get", params).await
    }

    /// Fetch one host group by id.
    pub async fn host_group_by_id(&self, id: &str) -> Result<HostGroup, ProviderError> {
        let groups = self
            .host_groups_get(json!({"output": "extend", "groupids": [id]}))
            .await?;
        Self::exactly_one(groups, "host group", id)
    }

    /// `hostgroup.create`.
    pub async fn host_groups_create(
        &self,
        groups: &[HostGroup],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate("hostgroup.create", serde_json::to_value(groups)?, "groupids")
            .await
    }

    /// `hostgroup.update`.
    pub async fn host_groups_update(
        &self,
        groups: &[HostGroup],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate("hostgroup.update", serde_json::to_value(groups)?, "groupids")
            .await
    }

    /// `hostgroup.delete`.
    pub async fn host_groups_delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate("hostgroup.delete", serde_json::to_value(ids)?, "groupids")
            .await
    }

    // =========================================================================
    // Hosts
    // =========================================================================

    /// `host.get`.
    pub async fn hosts_get(&self, params: Value) -> Result<Vec<Host>, ProviderError> {
        self.fetch("host.get", params).await
    }

    /// Fetch one host by id, with interfaces, groups, and linked templates.
    pub async fn host_by_id(&self, id: &str) -> Result<Host, ProviderError> {
        let hosts = self
            .hosts_get(json!({
                "output": "extend",
                "hostids": [id],
                "selectInterfaces": "extend",
                "selectGroups": "extend",
                "selectParentTemplates": "extend",
            }))
            .await?;
        Self::exactly_one(hosts, "host", id)
    }

    /// `host.create`.
    pub async fn hosts_create(&self, hosts: &[Host]) -> Result<Vec<String>, ProviderError> {
        self.mutate("host.create", serde_json::to_value(hosts)?, "hostids")
            .await
    }

    /// `host.update`.
    pub async fn hosts_update(&self, hosts: &[Host]) -> Result<Vec<String>, ProviderError> {
        self.mutate("host.update", serde_json::to_value(hosts)?, "hostids")
            .await
    }

    /// `host.delete`.
    pub async fn hosts_delete_by_ids(&self, ids: &[String]) -> Result<Vec<String>, ProviderError> {
        self.mutate("host.delete", serde_json::to_value(ids)?, "hostids")
            .await
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// `item.get`.
    pub async fn items_get(&self, params: Value) -> Result<Vec<Item>, ProviderError> {
        self.fetch("item.get", params).await
    }

    /// Fetch one item by id, with its parent hosts.
    pub async fn item_by_id(&self, id: &str) -> Result<Item, ProviderError> {
        let items = self
            .items_get(json!({
                "output": "extend",
                "itemids": [id],
                "selectHosts": "extend",
            }))
            .await?;
        Self::exactly_one(items, "item", id)
    }

    /// `item.create`.
    pub async fn items_create(&self, items: &[Item]) -> Result<Vec<String>, ProviderError> {
        self.mutate("item.create", serde_json::to_value(items)?, "itemids")
            .await
    }

    /// `item.update`.
    pub async fn items_update(&self, items: &[Item]) -> Result<Vec<String>, ProviderError> {
        self.mutate("item.update", serde_json::to_value(items)?, "itemids")
            .await
    }

    /// `item.delete`.
    pub async fn items_delete_by_ids(&self, ids: &[String]) -> Result<Vec<String>, ProviderError> {
        self.mutate("item.delete", serde_json::to_value(ids)?, "itemids")
            .await
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// `trigger.get`.
    pub async fn triggers_get(&self, params: Value) -> Result<Vec<Trigger>, ProviderError> {
        self.fetch("trigger.get", params).await
    }

    /// Fetch one trigger by id, with dependencies, functions, and hosts.
    pub async fn trigger_by_id(&self, id: &str) -> Result<Trigger, ProviderError> {
        let triggers = self
            .triggers_get(json!({
                "output": "extend",
                "triggerids": [id],
                "selectDependencies": "extend",
                "selectFunctions": "extend",
                "selectHosts": "extend",
            }))
            .await?;
        Self::exactly_one(triggers, "trigger", id)
    }

    /// `trigger.create`.
    pub async fn triggers_create(&self, triggers: &[Trigger]) -> Result<Vec<String>, ProviderError> {
        self.mutate("trigger.create", serde_json::to_value(triggers)?, "triggerids")
            .await
    }

    /// `trigger.update`.
    pub async fn triggers_update(&self, triggers: &[Trigger]) -> Result<Vec<String>, ProviderError> {
        self.mutate("trigger.update", serde_json::to_value(triggers)?, "triggerids")
            .await
    }

    /// `trigger.delete`.
    pub async fn triggers_delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate("trigger.delete", serde_json::to_value(ids)?, "triggerids")
            .await
    }

    // =========================================================================
    // Templates
    // =========================================================================

    /// `template.get`.
    pub async fn templates_get(&self, params: Value) -> Result<Vec<Template>, ProviderError> {
        self.fetch("template.get", params).await
    }

    /// Fetch one template by id, with macros and linked templates.
    pub async fn template_by_id(&self, id: &str) -> Result<Template, ProviderError> {
        let templates = self
            .templates_get(json!({
                "output": "extend",
                "templateids": [id],
                "selectMacros": "extend",
                "selectParentTemplates": "extend",
            }))
            .await?;
        Self::exactly_one(templates, "template", id)
    }

    /// `template.create`.
    pub async fn templates_create(
        &self,
        templates: &[Template],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "template.create",
            serde_json::to_value(templates)?,
            "templateids",
        )
        .await
    }

    /// `template.update`.
    pub async fn templates_update(
        &self,
        templates: &[Template],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "template.update",
            serde_json::to_value(templates)?,
            "templateids",
        )
        .await
    }

    /// `template.delete`.
    pub async fn templates_delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate("template.delete", serde_json::to_value(ids)?, "templateids")
            .await
    }

    // =========================================================================
    // Low-level discovery rules
    // =========================================================================

    /// `discoveryrule.get`.
    pub async fn lld_rules_get(&self, params: Value) -> Result<Vec<LldRule>, ProviderError> {
        self.fetch("discoveryrule.get", params).await
    }

    /// Fetch one discovery rule by id, with its filter.
    pub async fn lld_rule_by_id(&self, id: &str) -> Result<LldRule, ProviderError> {
        let rules = self
            .lld_rules_get(json!({
                "output": "extend",
                "itemids": [id],
                "selectFilter": "extend",
            }))
            .await?;
        Self::exactly_one(rules, "discovery rule", id)
    }

    /// `discoveryrule.create`.
    pub async fn lld_rules_create(&self, rules: &[LldRule]) -> Result<Vec<String>, ProviderError> {
        self.mutate("discoveryrule.create", serde_json::to_value(rules)?, "itemids")
            .await
    }

    /// `discoveryrule.update`.
    pub async fn lld_rules_update(&self, rules: &[LldRule]) -> Result<Vec<String>, ProviderError> {
        self.mutate("discoveryrule.update", serde_json::to_value(rules)?, "itemids")
            .await
    }

    /// `discoveryrule.delete`.
    pub async fn lld_rules_delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate("discoveryrule.delete", serde_json::to_value(ids)?, "ruleids")
            .await
    }

    // =========================================================================
    // Item prototypes
    // =========================================================================

    /// `itemprototype.get`.
    pub async fn item_prototypes_get(
        &self,
        params: Value,
    ) -> Result<Vec<ItemPrototype>, ProviderError> {
        self.fetch("itemprototype.get", params).await
    }

    /// Fetch one item prototype by id, with its parent hosts.
    pub async fn item_prototype_by_id(&self, id: &str) -> Result<ItemPrototype, ProviderError> {
        let prototypes = self
            .item_prototypes_get(json!({
                "output": "extend",
                "itemids": [id],
                "selectHosts": "extend",
            }))
            .await?;
        Self::exactly_one(prototypes, "item prototype", id)
    }

    /// `itemprototype.create`.
    pub async fn item_prototypes_create(
        &self,
        prototypes: &[ItemPrototype],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "itemprototype.create",
            serde_json::to_value(prototypes)?,
            "itemids",
        )
        .await
    }

    /// `itemprototype.update`.
    pub async fn item_prototypes_update(
        &self,
        prototypes: &[ItemPrototype],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "itemprototype.update",
            serde_json::to_value(prototypes)?,
            "itemids",
        )
        .await
    }

    /// `itemprototype.delete`.
    pub async fn item_prototypes_delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "itemprototype.delete",
            serde_json::to_value(ids)?,
            "prototypeids",
        )
        .await
    }

    // =========================================================================
    // Trigger prototypes
    // =========================================================================

    /// `triggerprototype.get`.
    pub async fn trigger_prototypes_get(
        &self,
        params: Value,
    ) -> Result<Vec<TriggerPrototype>, ProviderError> {
        self.fetch("triggerprototype.get", params).await
    }

    /// Fetch one trigger prototype by id, with dependencies and functions.
    pub async fn trigger_prototype_by_id(
        &self,
        id: &str,
    ) -> Result<TriggerPrototype, ProviderError> {
        let prototypes = self
            .trigger_prototypes_get(json!({
                "output": "extend",
                "triggerids": [id],
                "selectDependencies": "extend",
                "selectFunctions": "extend",
                "selectHosts": "extend",
            }))
            .await?;
        Self::exactly_one(prototypes, "trigger prototype", id)
    }

    /// `triggerprototype.create`.
    pub async fn trigger_prototypes_create(
        &self,
        prototypes: &[TriggerPrototype],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "triggerprototype.create",
            serde_json::to_value(prototypes)?,
            "triggerids",
        )
        .await
    }

    /// `triggerprototype.update`.
    pub async fn trigger_prototypes_update(
        &self,
        prototypes: &[TriggerPrototype],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "triggerprototype.update",
            serde_json::to_value(prototypes)?,
            "triggerids",
        )
        .await
    }

    /// `triggerprototype.delete`.
    pub async fn trigger_prototypes_delete_by_ids(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, ProviderError> {
        self.mutate(
            "triggerprototype.delete",
            serde_json::to_value(ids)?,
            "triggerids",
        )
        .await
    }
}
