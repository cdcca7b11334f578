//! Test doubles shared across the workspace
//!
//! An in-memory `StorageBridge` and a minimal `CurriculumRegistry`, used by
//! every downstream crate's test suite instead of standing up a real
//! filesystem or network double. Kept here rather than behind
//! `#[cfg(test)]` so other crates can depend on it as a dev-dependency.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::Sink;
use crate::ports::curriculum_registry::ComponentProgressValidator;
use crate::ports::{CurriculumRegistry, StorageBridge, StorageError};

/// An in-memory `StorageBridge` backed by a `HashMap`, with simple glob
/// matching (`*` wildcards, no escaping) and optional failure injection for
/// exercising error paths.
#[derive(Default)]
pub struct InMemoryStorageBridge {
    local: Mutex<HashMap<String, String>>,
    pod: Mutex<HashMap<String, String>>,
    fail_next_save: Mutex<Option<Sink>>,
    fail_all_saves_on: Mutex<Option<Sink>>,
}

impl InMemoryStorageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self, sink: Sink) -> &Mutex<HashMap<String, String>> {
        match sink {
            Sink::Local => &self.local,
            Sink::Pod => &self.pod,
        }
    }

    /// Causes the next `save` call against `sink` to fail with a storage error.
    pub fn fail_next_save_on(&self, sink: Sink) {
        *self.fail_next_save.lock().unwrap() = Some(sink);
    }

    /// Causes every subsequent `save` call against `sink` to fail, until
    /// cleared. Used where a one-shot failure can't pin down which of a
    /// parallel primary/duplicate pair it lands on.
    pub fn fail_all_saves_on(&self, sink: Sink) {
        *self.fail_all_saves_on.lock().unwrap() = Some(sink);
    }

    pub fn contains(&self, sink: Sink, key: &str) -> bool {
        self.store(sink).lock().unwrap().contains_key(key)
    }

    pub fn key_count(&self, sink: Sink) -> usize {
        self.store(sink).lock().unwrap().len()
    }
}

/// Matches `candidate` against `pattern`, where `*` matches any run of
/// characters (including none). Supports any number of wildcards, since
/// backup globs like `mera.*.*.*.sp.*.json` carry several.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == candidate;
    }

    let mut rest = candidate;
    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            if !rest.starts_with(segment) {
                return false;
            }
            rest = &rest[segment.len()..];
        } else if i == segments.len() - 1 {
            return rest.ends_with(segment);
        } else if let Some(pos) = rest.find(segment) {
            rest = &rest[pos + segment.len()..];
        } else {
            return false;
        }
    }
    true
}

#[async_trait]
impl StorageBridge for InMemoryStorageBridge {
    async fn save(&self, sink: Sink, key: &str, contents: String) -> Result<(), StorageError> {
        if *self.fail_all_saves_on.lock().unwrap() == Some(sink) {
            return Err(StorageError::Storage {
                sink,
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        let mut guard = self.fail_next_save.lock().unwrap();
        if *guard == Some(sink) {
            *guard = None;
            return Err(StorageError::Storage {
                sink,
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        drop(guard);
        self.store(sink).lock().unwrap().insert(key.to_string(), contents);
        Ok(())
    }

    async fn load(&self, sink: Sink, key: &str) -> Result<String, StorageError> {
        self.store(sink)
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                sink,
                key: key.to_string(),
            })
    }

    async fn delete(&self, sink: Sink, key: &str) -> Result<(), StorageError> {
        self.store(sink).lock().unwrap().remove(key);
        Ok(())
    }

    async fn list(&self, sink: Sink, glob: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .store(sink)
            .lock()
            .unwrap()
            .keys()
            .filter(|key| glob_match(glob, key))
            .cloned()
            .collect())
    }
}

/// A minimal in-memory `CurriculumRegistry` for tests.
#[derive(Default)]
pub struct TestCurriculumRegistry {
    pub lessons: Vec<String>,
    pub domains: Vec<String>,
    pub entities: HashMap<String, u32>,
    pub components: HashMap<String, String>,
}

impl CurriculumRegistry for TestCurriculumRegistry {
    fn has_lesson(&self, id: &str) -> bool {
        self.lessons.iter().any(|l| l == id)
    }

    fn has_domain(&self, id: &str) -> bool {
        self.domains.iter().any(|d| d == id)
    }

    fn has_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    fn get_entity_page_count(&self, id: &str) -> Option<u32> {
        self.entities.get(id).copied()
    }

    fn has_component(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    fn get_component_type(&self, id: &str) -> Option<String> {
        self.components.get(id).cloned()
    }

    fn get_lesson_id_for_component(&self, _id: &str) -> Option<String> {
        None
    }

    fn get_all_component_ids(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    fn get_all_lesson_ids(&self) -> Vec<String> {
        self.lessons.clone()
    }

    fn get_all_domain_ids(&self) -> Vec<String> {
        self.domains.clone()
    }

    fn component_validator(&self, _component_type: &str) -> Option<&dyn ComponentProgressValidator> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_bridge_save_load_round_trip() {
        let bridge = InMemoryStorageBridge::new();
        bridge
            .save(Sink::Local, "mera.1.0.0.lofp.100.json", "hello".to_string())
            .await
            .unwrap();
        let loaded = bridge.load(Sink::Local, "mera.1.0.0.lofp.100.json").await.unwrap();
        assert_eq!(loaded, "hello");
    }

    #[tokio::test]
    async fn test_in_memory_bridge_not_found() {
        let bridge = InMemoryStorageBridge::new();
        let err = bridge.load(Sink::Pod, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_in_memory_bridge_glob_list() {
        let bridge = InMemoryStorageBridge::new();
        bridge.save(Sink::Pod, "mera.1.0.0.sp.1.json", "a".to_string()).await.unwrap();
        bridge.save(Sink::Pod, "mera.1.0.0.sd.2.json", "b".to_string()).await.unwrap();
        let sp = bridge.list(Sink::Pod, "mera.*.sp.*.json").await.unwrap();
        assert_eq!(sp.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_bridge_injected_failure() {
        let bridge = InMemoryStorageBridge::new();
        bridge.fail_next_save_on(Sink::Pod);
        let result = bridge.save(Sink::Pod, "key", "value".to_string()).await;
        assert!(result.is_err());
        // the injected failure is one-shot
        bridge.save(Sink::Pod, "key", "value".to_string()).await.unwrap();
    }

    #[test]
    fn test_glob_match_with_several_wildcards() {
        assert!(glob_match("mera.*.*.*.sp.*.json", "mera.1.0.0.sp.100.json"));
        assert!(!glob_match("mera.*.*.*.sp.*.json", "mera.1.0.0.sd.100.json"));
        assert!(glob_match("mera.*.*.*.sp.*.json", "mera.12.34.56.sp.999999.json"));
    }

    #[tokio::test]
    async fn test_in_memory_bridge_glob_any_version_list() {
        let bridge = InMemoryStorageBridge::new();
        bridge.save(Sink::Pod, "mera.1.0.0.sp.1.json", "a".to_string()).await.unwrap();
        bridge.save(Sink::Pod, "mera.2.1.0.sp.2.json", "b".to_string()).await.unwrap();
        bridge.save(Sink::Pod, "mera.1.0.0.sd.3.json", "c".to_string()).await.unwrap();
        let found = bridge.list(Sink::Pod, "mera.*.*.*.sp.*.json").await.unwrap();
        assert_eq!(found.len(), 2);
    }
}
