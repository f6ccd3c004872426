// Provider Registry
//
// Maps catalog names to adapter instances. Built once at startup, read-only
// afterwards; enabling/disabling providers is a restart-time decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::traits::MusicApi;

/// Registry of enabled catalog adapters, keyed by their display name.
#[derive(Default)]
pub struct ApiRegistry {
    apis: BTreeMap<String, Arc<dyn MusicApi>>,
}

impl ApiRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            apis: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, api: Arc<dyn MusicApi>) {
        self.apis.insert(api.name().to_string(), api);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn MusicApi>> {
        self.apis.get(name).cloned()
    }

    /// Enabled catalog names, stable order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.apis.keys().cloned().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MockApi(&'static str);

    #[async_trait]
    impl MusicApi for MockApi {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    #[test]
    fn test_registry_lookup_and_names() {
        let mut registry = ApiRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(MockApi("QQMusic")));
        registry.register(Arc::new(MockApi("Netease")));

        let api = registry.get("QQMusic").expect("registered");
        assert_eq!(api.name(), "QQMusic");
        assert!(registry.get("Spotify").is_none());
        assert_eq!(registry.names(), vec!["Netease", "QQMusic"]);
    }
}
