//! Test utilities for exercising reconcilers without a live server.
//!
//! [`MockTransport`] implements [`Transport`](crate::api::Transport) with a
//! scripted queue of expectations: each expected call names the API method
//! and the canned result (or error) to return. Calls are matched in order;
//! an unexpected method fails the call with a descriptive error so the test
//! sees exactly where the conversation diverged.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_zabbix::api::ZabbixClient;
//! use hemmer_provider_zabbix::testing::MockTransport;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let transport = MockTransport::new()
//!     .expect("hostgroup.get", json!([{"groupid": "2", "name": "Linux servers"}]));
//! let client = ZabbixClient::with_transport(Box::new(transport));
//!
//! let groups = client
//!     .host_groups_get(json!({"output": "extend"}))
//!     .await
//!     .unwrap();
//! assert_eq!(groups[0].name, "Linux servers");
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use crate::api::Transport;
use crate::error::ProviderError;

enum Reply {
    Result(Value),
    Error { code: i64, message: String, data: String },
}

struct Expectation {
    method: String,
    reply: Reply,
}

/// A scripted transport standing in for the Zabbix server.
#[derive(Default)]
pub struct MockTransport {
    expectations: Mutex<VecDeque<Expectation>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    /// Create an empty transport; every call fails until expectations are
    /// queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a call to `method` and answer it with `result`.
    pub fn expect(self, method: impl Into<String>, result: Value) -> Self {
        self.push(method.into(), Reply::Result(result));
        self
    }

    /// Expect a call to `method` and answer it with a JSON-RPC error.
    pub fn expect_error(
        self,
        method: impl Into<String>,
        code: i64,
        message: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        self.push(
            method.into(),
            Reply::Error {
                code,
                message: message.into(),
                data: data.into(),
            },
        );
        self
    }

    /// Expect a call to `method` and answer it with a transient backend
    /// failure (a retryable SQL-execution error).
    pub fn expect_transient(self, method: impl Into<String>) -> Self {
        self.expect_error(
            method,
            -32500,
            "Application error.",
            "SQL statement execution has failed \"INSERT INTO ...\"",
        )
    }

    fn push(&self, method: String, reply: Reply) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(Expectation { method, reply });
    }

    /// The `(method, params)` pairs observed so far, in call order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether every queued expectation has been consumed.
    pub fn exhausted(&self) -> bool {
        self.expectations.lock().unwrap().is_empty()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn call(
        &self,
        method: &str,
        params: &Value,
        _auth: Option<&str>,
    ) -> Result<Value, ProviderError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        let expectation = self.expectations.lock().unwrap().pop_front();
        let expectation = match expectation {
            Some(e) => e,
            None => {
                return Err(ProviderError::Validation(format!(
                    "unexpected API call {} (no expectations left)",
                    method
                )))
            }
        };

        if expectation.method != method {
            return Err(ProviderError::Validation(format!(
                "unexpected API call {}, expected {}",
                method, expectation.method
            )));
        }

        match expectation.reply {
            Reply::Result(value) => Ok(value),
            Reply::Error { code, message, data } => Err(ProviderError::Api { code, message, data }),
        }
    }
}

// Tests often need to keep a handle on the transport after handing it to a
// client, so Arc<MockTransport> is a transport too.
#[async_trait::async_trait]
impl Transport for std::sync::Arc<MockTransport> {
    async fn call(
        &self,
        method: &str,
        params: &Value,
        auth: Option<&str>,
    ) -> Result<Value, ProviderError> {
        Transport::call(&**self, method, params, auth).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expectations_are_consumed_in_order() {
        tokio_test::block_on(async {
            let transport = MockTransport::new()
                .expect("item.get", json!([]))
                .expect("trigger.get", json!([]));

            assert_eq!(
                transport.call("item.get", &json!({}), None).await.unwrap(),
                json!([])
            );
            assert!(!transport.exhausted());
            transport.call("trigger.get", &json!({}), None).await.unwrap();
            assert!(transport.exhausted());
        });
    }

    #[test]
    fn wrong_method_is_rejected() {
        tokio_test::block_on(async {
            let transport = MockTransport::new().expect("item.get", json!([]));
            let err = transport
                .call("trigger.get", &json!({}), None)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("expected item.get"));
        });
    }

    #[test]
    fn transient_error_is_classified() {
        tokio_test::block_on(async {
            let transport = MockTransport::new().expect_transient("item.create");
            let err = transport
                .call("item.create", &json!([]), None)
                .await
                .unwrap_err();
            assert!(err.is_transient());
        });
    }

    #[test]
    fn calls_are_recorded() {
        tokio_test::block_on(async {
            let transport = MockTransport::new().expect("item.get", json!([]));
            transport
                .call("item.get", &json!({"itemids": ["1"]}), None)
                .await
                .unwrap();

            let calls = transport.calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].0, "item.get");
            assert_eq!(calls[0].1["itemids"], json!(["1"]));
        });
    }
}
