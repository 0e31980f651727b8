//! Routes fire-and-forget responses back to the call that issued them.
//!
//! The network layer reports a response only with the URL that was
//! requested; no request id travels with it. Callers register the URL they
//! are about to fetch and get back a [`PendingResponse`] that resolves at
//! most once. Registrations are removed when they resolve, when they time
//! out, when the fetch fails, or when the waiter is dropped.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

use crate::utils::parsing::normalize_json_body;
use crate::RemoteError;

struct Registration<T> {
    token: Uuid,
    sender: oneshot::Sender<T>,
}

type PendingTable<T> = Arc<Mutex<HashMap<String, Registration<T>>>>;

fn lock<T>(table: &PendingTable<T>) -> MutexGuard<'_, HashMap<String, Registration<T>>> {
    // The table holds no invariants a panicking holder could break
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Keyed table of single-use completion handlers.
pub struct ResponseCorrelator<T> {
    name: &'static str,
    pending: PendingTable<T>,
}

impl<T> Clone for ResponseCorrelator<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            pending: self.pending.clone(),
        }
    }
}

impl<T: Send + 'static> ResponseCorrelator<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register interest in the next response for `key`. A previous
    /// registration for the same key is replaced and its waiter abandoned.
    pub fn register(&self, key: &str) -> PendingResponse<T> {
        let token = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        let replaced = lock(&self.pending).insert(key.to_string(), Registration { token, sender });
        if replaced.is_some() {
            warn!(
                correlator = self.name,
                key, "Replacing a pending registration for the same key"
            );
        }
        trace!(correlator = self.name, key, "Registered pending response");
        PendingResponse {
            key: key.to_string(),
            token,
            receiver: Some(receiver),
            pending: self.pending.clone(),
        }
    }

    /// Hand `value` to the registration for `key`, removing it. Returns false
    /// when nothing was waiting; the value is dropped.
    pub fn resolve(&self, key: &str, value: T) -> bool {
        let registration = lock(&self.pending).remove(key);
        match registration {
            Some(registration) => {
                let delivered = registration.sender.send(value).is_ok();
                debug!(correlator = self.name, key, delivered, "Resolved pending response");
                delivered
            }
            None => {
                warn!(correlator = self.name, key, "Response matched no pending registration, dropping");
                false
            }
        }
    }

    /// Remove the registration for `key` without a value.
    pub fn abandon(&self, key: &str) -> bool {
        lock(&self.pending).remove(key).is_some()
    }

    /// Drop every registration, e.g. on teardown.
    pub fn clear(&self) {
        let mut table = lock(&self.pending);
        if !table.is_empty() {
            debug!(correlator = self.name, count = table.len(), "Clearing pending registrations");
        }
        table.clear();
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// Waiter half of a registration.
pub struct PendingResponse<T> {
    key: String,
    token: Uuid,
    receiver: Option<oneshot::Receiver<T>>,
    pending: PendingTable<T>,
}

impl<T> PendingResponse<T> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait up to `deadline` for the response.
    pub async fn wait(mut self, deadline: Duration) -> Result<T, RemoteError> {
        let receiver = match self.receiver.take() {
            Some(receiver) => receiver,
            None => return Err(RemoteError::ResponseAbandoned(self.key.clone())),
        };
        match timeout(deadline, receiver).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(RemoteError::ResponseAbandoned(self.key.clone())),
            Err(_) => {
                warn!(key = %self.key, ?deadline, "Pending response timed out");
                Err(RemoteError::ResponseTimeout(self.key.clone()))
            }
        }
        // Drop removes a registration that is still ours
    }
}

impl<T> Drop for PendingResponse<T> {
    fn drop(&mut self) {
        let mut table = lock(&self.pending);
        if table.get(&self.key).map(|r| r.token) == Some(self.token) {
            table.remove(&self.key);
        }
    }
}

/// The two response families the network layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFamily {
    /// Catalog API calls answering JSON
    Catalog,
    /// Raw landing pages answering HTML
    Page,
}

/// Entry point for completed fetches: normalises and routes each response
/// to its family's correlator.
#[derive(Clone)]
pub struct ResponseRouter {
    pub catalog: ResponseCorrelator<Value>,
    pub pages: ResponseCorrelator<String>,
}

impl Default for ResponseRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self {
            catalog: ResponseCorrelator::new("catalog"),
            pages: ResponseCorrelator::new("pages"),
        }
    }

    /// A response for `url` arrived. Returns true if a handler received it.
    pub fn on_response(&self, family: ResponseFamily, url: &str, body: String) -> bool {
        if body.is_empty() {
            debug!(url, "Empty response body");
            self.on_failure(family, url);
            return false;
        }
        match family {
            ResponseFamily::Catalog => match normalize_json_body(&body) {
                Ok(document) => self.catalog.resolve(url, document),
                Err(e) => {
                    error!(error = %e, url, "JSON error in catalog response");
                    self.catalog.abandon(url);
                    false
                }
            },
            ResponseFamily::Page => self.pages.resolve(url, body),
        }
    }

    /// The fetch for `url` failed in transport; release its waiter.
    pub fn on_failure(&self, family: ResponseFamily, url: &str) -> bool {
        match family {
            ResponseFamily::Catalog => self.catalog.abandon(url),
            ResponseFamily::Page => self.pages.abandon(url),
        }
    }

    pub fn clear(&self) {
        self.catalog.clear();
        self.pages.clear();
    }
}
