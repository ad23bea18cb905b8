//! Capability definitions, fetched once per `(id, version)` and kept for
//! the lifetime of the adapter.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::client::{CapabilityRef, SmartThingsClient};

/// Capabilities that never map to useful parameters or transitions.
pub const SKIPPED_CAPABILITIES: [&str; 4] =
    ["ocf", "custom.disabledCapabilities", "execute", "healthCheck"];

/// The only component that is analyzed.
pub const MAIN_COMPONENT: &str = "main";

#[must_use]
pub fn is_skipped(id: &str) -> bool {
    SKIPPED_CAPABILITIES.contains(&id)
}

/// Only `live` and `proposed` definitions are used.
#[must_use]
pub fn is_usable(definition: &Value) -> bool {
    matches!(
        definition.get("status").and_then(Value::as_str),
        Some("live" | "proposed")
    )
}

/// Process-wide cache of capability definitions. Never invalidated.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    entries: Mutex<HashMap<CapabilityRef, Arc<Value>>>,
}

impl CapabilityCache {
    fn cached(&self, cap: &CapabilityRef) -> Option<Arc<Value>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(cap)
            .cloned()
    }

    /// Definition of `cap`, or `None` when it is skipped, unusable or
    /// cannot be fetched. Fetch failures are not cached.
    pub async fn resolve(
        &self,
        client: &SmartThingsClient,
        cap: &CapabilityRef,
    ) -> Option<Arc<Value>> {
        if is_skipped(&cap.id) {
            return None;
        }
        let definition = match self.cached(cap) {
            Some(definition) => definition,
            None => match client.capability(cap).await {
                Ok(fetched) => {
                    let fetched = Arc::new(fetched);
                    self.entries
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(cap.clone(), Arc::clone(&fetched));
                    fetched
                }
                Err(err) => {
                    tracing::warn!(capability = %cap.id, version = cap.version, error = %err, "capability fetch failed");
                    return None;
                }
            },
        };
        if !is_usable(&definition) {
            tracing::debug!(capability = %cap.id, "capability not live");
            return None;
        }
        Some(definition)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cap(id: &str) -> CapabilityRef {
        CapabilityRef {
            id: id.to_string(),
            version: 1,
        }
    }

    #[test]
    fn should_skip_known_noise_capabilities() {
        assert!(is_skipped("healthCheck"));
        assert!(is_skipped("custom.disabledCapabilities"));
        assert!(!is_skipped("switch"));
    }

    #[test]
    fn should_accept_live_and_proposed_only() {
        assert!(is_usable(&json!({"status": "live"})));
        assert!(is_usable(&json!({"status": "proposed"})));
        assert!(!is_usable(&json!({"status": "deprecated"})));
        assert!(!is_usable(&json!({})));
    }

    #[tokio::test]
    async fn should_fetch_each_capability_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/capabilities/switch/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "switch", "status": "live"})))
            .expect(1)
            .mount(&server)
            .await;
        let client = SmartThingsClient::new(reqwest::Client::new(), &server.uri(), "t").unwrap();
        let cache = CapabilityCache::default();

        assert!(cache.resolve(&client, &cap("switch")).await.is_some());
        assert!(cache.resolve(&client, &cap("switch")).await.is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn should_cache_but_reject_dead_capability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/capabilities/legacy/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "legacy", "status": "dead"})))
            .expect(1)
            .mount(&server)
            .await;
        let client = SmartThingsClient::new(reqwest::Client::new(), &server.uri(), "t").unwrap();
        let cache = CapabilityCache::default();

        assert!(cache.resolve(&client, &cap("legacy")).await.is_none());
        assert!(cache.resolve(&client, &cap("legacy")).await.is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn should_not_fetch_skipped_capability() {
        let server = MockServer::start().await;
        let client = SmartThingsClient::new(reqwest::Client::new(), &server.uri(), "t").unwrap();
        let cache = CapabilityCache::default();

        assert!(cache.resolve(&client, &cap("healthCheck")).await.is_none());
        assert!(cache.is_empty());
    }
}
