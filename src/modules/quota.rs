use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::models::QuotaSnapshot;
use crate::modules::api::client::QuotaClient;
use crate::modules::auth::store::CredentialStore;

/// Outcome of one account's quota fetch. A failure is carried inline
/// so one bad account never hides the others.
#[derive(Debug, Clone, Serialize)]
pub struct AccountQuotaResult {
    pub email: String,
    pub snapshot: Option<QuotaSnapshot>,
    pub error: Option<String>,
}

impl AccountQuotaResult {
    pub fn is_ok(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Fans the per-account fetch out over one spawned worker task per
/// email and returns one entry per account, sorted by email. A worker
/// that panics costs only its own account's entry.
///
/// Cancellation wins the race outright: in-flight workers are aborted
/// and `None` means the round was abandoned with no partial results.
pub async fn fetch_all_with<F, Fut>(
    emails: Vec<String>,
    cancel: &CancellationToken,
    fetch: F,
) -> Option<Vec<AccountQuotaResult>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = AppResult<QuotaSnapshot>> + Send + 'static,
{
    let mut handles = Vec::with_capacity(emails.len());
    for email in emails {
        let handle = tokio::spawn(fetch(email.clone()));
        handles.push((email, handle));
    }
    let aborts: Vec<_> = handles.iter().map(|(_, h)| h.abort_handle()).collect();

    let joined = join_all(
        handles
            .into_iter()
            .map(|(email, handle)| async move { (email, handle.await) }),
    );

    let outcomes = tokio::select! {
        outcomes = joined => outcomes,
        _ = cancel.cancelled() => {
            tracing::info!("quota fetch round cancelled");
            for abort in aborts {
                abort.abort();
            }
            return None;
        }
    };

    let mut results: Vec<AccountQuotaResult> = outcomes
        .into_iter()
        .map(|(email, joined)| match joined {
            Ok(Ok(snapshot)) => AccountQuotaResult {
                email,
                snapshot: Some(snapshot),
                error: None,
            },
            Ok(Err(e)) => {
                tracing::warn!("quota fetch failed for {}: {}", email, e);
                AccountQuotaResult {
                    email,
                    snapshot: None,
                    error: Some(e.to_string()),
                }
            }
            Err(e) => {
                tracing::error!("quota fetch task for {} did not complete: {}", email, e);
                AccountQuotaResult {
                    email,
                    snapshot: None,
                    error: Some(format!("fetch task failed: {}", e)),
                }
            }
        })
        .collect();

    results.sort_by(|a, b| a.email.cmp(&b.email));
    Some(results)
}

/// Production fan-out: each account gets its own client since identity
/// state is per account.
pub async fn fetch_all(
    store: Arc<CredentialStore>,
    emails: Vec<String>,
    cancel: &CancellationToken,
) -> Option<Vec<AccountQuotaResult>> {
    fetch_all_with(emails, cancel, |email| {
        let store = store.clone();
        async move {
            let mut client = QuotaClient::new();
            client.get_quota(&store, &email).await
        }
    })
    .await
}
