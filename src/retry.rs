//! Retry handling for mutating API calls.
//!
//! The Zabbix backend occasionally rejects concurrent writes with a
//! transient SQL-execution error (see
//! [`ProviderError::is_transient`](crate::error::ProviderError::is_transient)).
//! The helpers here repeat such an operation within a fixed time budget,
//! pausing between attempts; any non-transient failure stops immediately.
//!
//! Deletes get an extra safety net: before each attempt the expected
//! cascade size is computed from the inheritance graph (the object itself,
//! plus one per inheriting template, plus one per host linked to those
//! templates), and a delete that removes a different number of objects is a
//! fatal [`CascadeMismatch`](crate::error::ProviderError::CascadeMismatch)
//! even though the server reported success.
//!
//! Known limitation: a create retried after an ambiguous failure can leave
//! a duplicate object behind, since the API has no idempotency token.

use std::future::Future;

use serde_json::json;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, warn};

use crate::api::types::Template;
use crate::api::ZabbixClient;
use crate::error::ProviderError;

/// Total time budget for one retried operation.
pub const RETRY_BUDGET: Duration = Duration::from_secs(60);

/// Pause between attempts.
const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Run `op` until it succeeds, fails non-transiently, or the budget
/// elapses. Returns the id produced by the successful attempt.
pub async fn retry_create<F, Fut>(mut op: F) -> Result<String, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ProviderError>>,
{
    let deadline = Instant::now() + RETRY_BUDGET;
    loop {
        match op().await {
            Ok(id) => return Ok(id),
            Err(err) if err.is_transient() => backoff(deadline, err).await?,
            Err(err) => return Err(err),
        }
    }
}

/// Delete `id` with cascade verification.
///
/// Per attempt:
/// 1. `parent_of` resolves the host/template the object lives on.
/// 2. The templates inheriting from that parent (with their linked hosts)
///    determine the expected cascade count.
/// 3. `delete` runs the batch delete; the returned ids must number exactly
///    the expected count, otherwise the cascade is inconsistent and the
///    error is fatal.
///
/// Transient failures in any step schedule another attempt within the
/// budget.
pub async fn retry_delete<P, PFut, D, DFut>(
    client: &ZabbixClient,
    id: &str,
    mut parent_of: P,
    mut delete: D,
) -> Result<(), ProviderError>
where
    P: FnMut() -> PFut,
    PFut: Future<Output = Result<String, ProviderError>>,
    D: FnMut() -> DFut,
    DFut: Future<Output = Result<Vec<String>, ProviderError>>,
{
    let deadline = Instant::now() + RETRY_BUDGET;
    loop {
        let parent_id = match parent_of().await {
            Ok(parent_id) => parent_id,
            Err(err) if err.is_transient() => {
                backoff(deadline, err).await?;
                continue;
            }
            Err(err) => return Err(err),
        };

        let templates = match client
            .templates_get(json!({
                "output": "extend",
                "selectHosts": "extend",
                "parentTemplateids": parent_id,
            }))
            .await
        {
            Ok(templates) => templates,
            Err(err) if err.is_transient() => {
                backoff(deadline, err).await?;
                continue;
            }
            Err(err) => return Err(err),
        };
        let expected = expected_cascade_count(&templates);

        match delete().await {
            Ok(deleted) => {
                if deleted.len() != expected {
                    return Err(ProviderError::CascadeMismatch {
                        expected,
                        actual: deleted.len(),
                    });
                }
                return Ok(());
            }
            Err(err) if err.is_transient() => {
                debug!(id, error = %err, "deletion failed, scheduling retry");
                backoff(deadline, err).await?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// How many objects a cascade delete is expected to remove: the object
/// itself, plus a copy on each inheriting template, plus a copy on each
/// host linked to those templates.
pub fn expected_cascade_count(templates: &[Template]) -> usize {
    1 + templates
        .iter()
        .map(|t| t.linked_hosts.len() + 1)
        .sum::<usize>()
}

async fn backoff(deadline: Instant, last_err: ProviderError) -> Result<(), ProviderError> {
    if Instant::now() + RETRY_PAUSE > deadline {
        warn!(error = %last_err, "retry budget exhausted");
        return Err(ProviderError::RetryExhausted(last_err.to_string()));
    }
    sleep(RETRY_PAUSE).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::HostRef;
    use crate::testing::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transient() -> ProviderError {
        ProviderError::Api {
            code: -32500,
            message: "Application error.".to_string(),
            data: "SQL statement execution has failed".to_string(),
        }
    }

    fn fatal() -> ProviderError {
        ProviderError::Api {
            code: -32602,
            message: "Invalid params.".to_string(),
            data: "Item key already exists.".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn create_retries_transient_then_succeeds() {
        let attempts = AtomicUsize::new(0);
        let id = retry_create(|| {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(transient())
                } else {
                    Ok("23296".to_string())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(id, "23296");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn create_does_not_retry_fatal_errors() {
        let attempts = AtomicUsize::new(0);
        let err = retry_create(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(fatal()) }
        })
        .await
        .unwrap_err();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Item key already exists."));
    }

    #[tokio::test(start_paused = true)]
    async fn create_reports_exhausted_budget() {
        let err = retry_create(|| async { Err::<String, _>(transient()) })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RetryExhausted(_)));
    }

    #[test]
    fn cascade_count_models_inheritance() {
        // Two templates inherit the item; each also pushes it to one host.
        let templates = vec![
            Template {
                linked_hosts: vec![HostRef::default()],
                ..Default::default()
            },
            Template {
                linked_hosts: vec![HostRef::default()],
                ..Default::default()
            },
        ];
        assert_eq!(expected_cascade_count(&templates), 5);
        assert_eq!(expected_cascade_count(&[]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_verifies_cascade_count() {
        // No inheriting templates: expected count is exactly 1, but the
        // scripted server claims two objects were removed.
        let transport = MockTransport::new().expect("template.get", serde_json::json!([]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = retry_delete(
            &client,
            "23296",
            || async { Ok("10084".to_string()) },
            || async { Ok(vec!["23296".to_string(), "23297".to_string()]) },
        )
        .await
        .unwrap_err();

        match err {
            ProviderError::CascadeMismatch { expected, actual } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected CascadeMismatch, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delete_retries_transient_delete_failures() {
        let transport = MockTransport::new()
            .expect("template.get", serde_json::json!([]))
            .expect("template.get", serde_json::json!([]));
        let client = ZabbixClient::with_transport(Box::new(transport));

        let attempts = AtomicUsize::new(0);
        retry_delete(
            &client,
            "23296",
            || async { Ok("10084".to_string()) },
            || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(transient())
                    } else {
                        Ok(vec!["23296".to_string()])
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_stops_on_fatal_parent_resolution() {
        let transport = MockTransport::new();
        let client = ZabbixClient::with_transport(Box::new(transport));

        let err = retry_delete(
            &client,
            "23296",
            || async { Err(ProviderError::NotFound("item 23296".to_string())) },
            || async { Ok(vec![]) },
        )
        .await
        .unwrap_err();

        assert!(err.is_not_found());
    }
}
