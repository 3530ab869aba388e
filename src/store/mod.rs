//! Flow registry and progress store
//!
//! Owns the registered flow definitions, one progress record per flow and
//! the append-only analytics log. Every mutation writes through to storage
//! synchronously; both persisted records are read back once at
//! construction.
//!
//! Lookup misses are not errors: updates against an unknown flow are no-ops.
//! Storage problems never reach callers either. A missing backend means
//! nothing is persisted, corrupt data is logged and replaced by an empty
//! state, and failed writes are logged. The one construction-time error is
//! a pair of storage keys that would overwrite each other.

pub mod snapshot;
pub mod storage;

pub use storage::{open_storage, FileStorage, MemoryStorage, Storage};

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::analytics::{self, AbTestResults, AnalyticsBus, AnalyticsEvent, EventKind, FlowSummary};
use crate::clock;
use crate::config::{validate_keys, EngineConfig, DEFAULT_ANALYTICS_KEY, DEFAULT_PROGRESS_KEY};
use crate::error::ConfigError;
use crate::flow::{FlowDefinition, ProgressRecord, ProgressUpdate};
use crate::variant::Variant;

#[derive(Debug, Default)]
struct StoreState {
    progress: BTreeMap<String, ProgressRecord>,
    analytics: Vec<AnalyticsEvent>,
}

pub struct FlowStore {
    flows: RwLock<HashMap<String, Arc<FlowDefinition>>>,
    state: RwLock<StoreState>,
    storage: Option<Arc<dyn Storage>>,
    progress_key: String,
    analytics_key: String,
    bus: AnalyticsBus,
}

impl FlowStore {
    /// Open the store with the backend and keys named in `config`
    pub fn open(config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(
            open_storage(config),
            config.progress_key.clone(),
            config.analytics_key.clone(),
        ))
    }

    /// Store backed by `storage` under the default keys
    pub fn new(storage: Option<Arc<dyn Storage>>) -> Self {
        Self::build(storage, DEFAULT_PROGRESS_KEY.to_string(), DEFAULT_ANALYTICS_KEY.to_string())
    }

    /// Store with nothing persisted
    pub fn ephemeral() -> Self {
        Self::new(None)
    }

    /// Store backed by `storage` under custom keys.
    ///
    /// Fails if either key is blank or both are the same.
    pub fn with_storage(
        storage: Option<Arc<dyn Storage>>,
        progress_key: impl Into<String>,
        analytics_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let progress_key = progress_key.into();
        let analytics_key = analytics_key.into();
        validate_keys(&progress_key, &analytics_key)?;

        Ok(Self::build(storage, progress_key, analytics_key))
    }

    fn build(storage: Option<Arc<dyn Storage>>, progress_key: String, analytics_key: String) -> Self {
        let state = match &storage {
            Some(storage) => StoreState {
                progress: load_or_default(storage.as_ref(), &progress_key, snapshot::decode_progress),
                analytics: load_or_default(storage.as_ref(), &analytics_key, snapshot::decode_analytics),
            },
            None => {
                tracing::debug!("No storage backend, flow progress is session-only");
                StoreState::default()
            }
        };

        Self {
            flows: RwLock::new(HashMap::new()),
            state: RwLock::new(state),
            storage,
            progress_key,
            analytics_key,
            bus: AnalyticsBus::new(),
        }
    }

    // ---- registry ----

    /// Register a flow; an existing flow with the same id is replaced
    pub fn register_flow(&self, definition: FlowDefinition) {
        let id = definition.id.clone();
        let replaced = self
            .flows
            .write()
            .insert(id.clone(), Arc::new(definition))
            .is_some();

        if replaced {
            tracing::debug!("Replaced flow definition: {}", id);
        } else {
            tracing::debug!("Registered flow: {}", id);
        }
    }

    pub fn flow(&self, flow_id: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.read().get(flow_id).cloned()
    }

    /// Ids of all registered flows, sorted
    pub fn flow_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.flows.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // ---- progress ----

    pub fn progress(&self, flow_id: &str) -> Option<ProgressRecord> {
        self.state.read().progress.get(flow_id).cloned()
    }

    /// All progress records, keyed by flow id
    pub fn all_progress(&self) -> BTreeMap<String, ProgressRecord> {
        self.state.read().progress.clone()
    }

    /// Resume the flow's unfinished record, or create a fresh one.
    ///
    /// A record that is not `completed` is returned unchanged, skipped ones
    /// included. A completed record is replaced.
    pub fn initialize_progress(&self, flow_id: &str, variant: Option<Variant>) -> ProgressRecord {
        let mut state = self.state.write();

        if let Some(existing) = state.progress.get(flow_id) {
            if !existing.completed {
                tracing::debug!("Resuming progress for {}", flow_id);
                return existing.clone();
            }
        }

        let record = ProgressRecord::new(flow_id, variant, clock::now());
        state.progress.insert(flow_id.to_string(), record.clone());
        self.persist_progress(&state);

        tracing::debug!("Created progress for {}", flow_id);
        record
    }

    /// Merge `update` into the flow's record; no-op if there is none
    pub fn update_progress(&self, flow_id: &str, update: ProgressUpdate) {
        let mut state = self.state.write();
        let Some(record) = state.progress.get_mut(flow_id) else {
            tracing::debug!("No progress for {}, update ignored", flow_id);
            return;
        };

        record.apply(update);
        self.persist_progress(&state);
    }

    /// Mark `step_id` completed and record a `complete` event.
    ///
    /// The set insert is idempotent, the event is not: every call with an
    /// existing record appends one. Without a record nothing happens.
    pub fn complete_step(&self, flow_id: &str, step_id: &str) {
        let variant = {
            let mut state = self.state.write();
            let Some(record) = state.progress.get_mut(flow_id) else {
                return;
            };

            let inserted = record.completed_steps.insert(step_id.to_string());
            let variant = record.variant;
            if inserted {
                self.persist_progress(&state);
            }
            variant
        };

        self.track_event(AnalyticsEvent::new(flow_id, step_id, EventKind::Complete).with_variant(variant));
    }

    /// Delete the flow's record; the stored key goes once no records remain
    pub fn reset_progress(&self, flow_id: &str) {
        let mut state = self.state.write();
        if state.progress.remove(flow_id).is_some() {
            tracing::debug!("Reset progress for {}", flow_id);
        }

        if !state.progress.is_empty() {
            self.persist_progress(&state);
            return;
        }
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.remove(&self.progress_key) {
                tracing::warn!("Failed to clear flow progress: {}", e);
            }
        }
    }

    // ---- analytics ----

    /// Append an event to the log and publish it to subscribers
    pub fn track_event(&self, event: AnalyticsEvent) {
        {
            let mut state = self.state.write();
            state.analytics.push(event.clone());
            self.persist_analytics(&state);
        }

        tracing::debug!("{}", event.description());
        self.bus.publish(&event);
    }

    /// Full log, or one flow's events, in insertion order
    pub fn analytics(&self, flow_id: Option<&str>) -> Vec<AnalyticsEvent> {
        let state = self.state.read();
        match flow_id {
            Some(id) => state
                .analytics
                .iter()
                .filter(|e| e.flow_id == id)
                .cloned()
                .collect(),
            None => state.analytics.clone(),
        }
    }

    pub fn completion_rate(&self, flow_id: &str) -> f64 {
        analytics::completion_rate(&self.analytics(Some(flow_id)))
    }

    pub fn ab_test_results(&self, flow_id: &str) -> AbTestResults {
        analytics::ab_test_results(&self.analytics(Some(flow_id)))
    }

    pub fn summary(&self, flow_id: &str) -> FlowSummary {
        FlowSummary::from_events(flow_id, &self.analytics(Some(flow_id)))
    }

    /// Bus carrying every tracked event
    pub fn bus(&self) -> &AnalyticsBus {
        &self.bus
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    /// Write both records one last time and drop all subscribers.
    ///
    /// The store stays usable; later mutations keep writing through.
    pub fn close(&self) {
        {
            let state = self.state.read();
            self.persist_progress(&state);
            self.persist_analytics(&state);
        }

        self.bus.clear();
        tracing::debug!("Flow store closed");
    }

    fn persist_progress(&self, state: &StoreState) {
        let Some(storage) = &self.storage else {
            return;
        };

        let result = snapshot::encode_progress(&state.progress)
            .map_err(Into::into)
            .and_then(|json| storage.set(&self.progress_key, &json));
        if let Err(e) = result {
            tracing::warn!("Failed to persist flow progress: {}", e);
        }
    }

    fn persist_analytics(&self, state: &StoreState) {
        let Some(storage) = &self.storage else {
            return;
        };

        let result = snapshot::encode_analytics(&state.analytics)
            .map_err(Into::into)
            .and_then(|json| storage.set(&self.analytics_key, &json));
        if let Err(e) = result {
            tracing::warn!("Failed to persist analytics: {}", e);
        }
    }
}

impl Default for FlowStore {
    fn default() -> Self {
        Self::ephemeral()
    }
}

fn load_or_default<T: Default>(
    storage: &dyn Storage,
    key: &str,
    decode: impl FnOnce(&str) -> serde_json::Result<T>,
) -> T {
    let stored = match storage.get(key) {
        Ok(Some(stored)) => stored,
        Ok(None) => {
            tracing::debug!("Nothing stored under {}, starting fresh", key);
            return T::default();
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", key, e);
            return T::default();
        }
    };

    match decode(&stored) {
        Ok(value) => {
            tracing::debug!("Loaded {} from storage", key);
            value
        }
        Err(e) => {
            tracing::error!("Failed to load {}, discarding stored data: {}", key, e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{StepDefinition, StepKind};

    fn tour() -> FlowDefinition {
        FlowDefinition::new("tour", "Tour")
            .step(StepDefinition::new("a", StepKind::Modal, "A", "first"))
            .step(StepDefinition::new("b", StepKind::Tooltip, "B", "second"))
            .step(StepDefinition::new("c", StepKind::Spotlight, "C", "third"))
    }

    fn memory_store() -> (FlowStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = FlowStore::new(Some(storage.clone() as Arc<dyn Storage>));
        (store, storage)
    }

    #[test]
    fn test_register_flow_last_write_wins() {
        let store = FlowStore::ephemeral();
        store.register_flow(tour());
        store.register_flow(FlowDefinition::new("tour", "Replacement"));

        let flow = store.flow("tour").unwrap();
        assert_eq!(flow.name, "Replacement");
        assert_eq!(flow.step_count(), 0);
        assert!(store.flow("missing").is_none());
        assert_eq!(store.flow_ids(), vec!["tour".to_string()]);
    }

    #[test]
    fn test_initialize_progress_resumes_unfinished() {
        let store = FlowStore::ephemeral();
        let first = store.initialize_progress("tour", Some(Variant::A));
        store.complete_step("tour", "a");

        let second = store.initialize_progress("tour", Some(Variant::B));
        assert_eq!(second.started_at, first.started_at);
        assert_eq!(second.variant, Some(Variant::A));
        assert!(second.is_step_completed("a"));
    }

    #[test]
    fn test_initialize_progress_resumes_skipped() {
        let store = FlowStore::ephemeral();
        store.initialize_progress("tour", None);
        store.update_progress("tour", ProgressUpdate::new().skipped(true));

        let record = store.initialize_progress("tour", None);
        assert!(record.skipped);
    }

    #[test]
    fn test_initialize_progress_replaces_completed() {
        let store = FlowStore::ephemeral();
        store.initialize_progress("tour", Some(Variant::A));
        store.complete_step("tour", "a");
        store.update_progress("tour", ProgressUpdate::new().completed(true).completed_at(clock::now()));

        let fresh = store.initialize_progress("tour", Some(Variant::B));
        assert!(!fresh.completed);
        assert_eq!(fresh.completed_count(), 0);
        assert_eq!(fresh.completed_at, None);
        assert_eq!(fresh.variant, Some(Variant::B));
    }

    #[test]
    fn test_update_progress_without_record_is_noop() {
        let (store, storage) = memory_store();
        store.update_progress("tour", ProgressUpdate::new().completed(true));
        assert!(store.progress("tour").is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_complete_step_is_idempotent_but_events_are_not() {
        let store = FlowStore::ephemeral();
        store.initialize_progress("tour", Some(Variant::B));

        store.complete_step("tour", "a");
        store.complete_step("tour", "a");

        let record = store.progress("tour").unwrap();
        assert_eq!(record.completed_count(), 1);

        let events = store.analytics(Some("tour"));
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::Complete && e.step_id == "a"));
        assert!(events.iter().all(|e| e.variant == Some(Variant::B)));
    }

    #[test]
    fn test_complete_step_without_record() {
        let store = FlowStore::ephemeral();
        store.complete_step("tour", "a");
        assert!(store.analytics(None).is_empty());
    }

    #[test]
    fn test_analytics_filter_and_order() {
        let store = FlowStore::ephemeral();
        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Start));
        store.track_event(AnalyticsEvent::new("other", "x", EventKind::Start));
        store.track_event(AnalyticsEvent::new("tour", "b", EventKind::Next));

        let kinds: Vec<EventKind> = store.analytics(Some("tour")).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Start, EventKind::Next]);
        assert_eq!(store.analytics(None).len(), 3);
        assert!(store.analytics(Some("none")).is_empty());
    }

    #[test]
    fn test_completion_rate_and_ab_results() {
        let store = FlowStore::ephemeral();
        assert_eq!(store.completion_rate("tour"), 0.0);

        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Start).with_variant(Some(Variant::A)));
        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Complete).with_variant(Some(Variant::A)));
        assert_eq!(store.completion_rate("tour"), 100.0);

        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Start).with_variant(Some(Variant::B)));
        assert_eq!(store.completion_rate("tour"), 50.0);
        assert_eq!(store.ab_test_results("tour"), AbTestResults { a: 1, b: 0 });
        assert_eq!(store.summary("tour").starts, 2);
    }

    #[test]
    fn test_reset_progress() {
        let store = FlowStore::ephemeral();
        store.initialize_progress("tour", None);
        store.reset_progress("tour");
        assert!(store.progress("tour").is_none());

        store.reset_progress("never-started");
    }

    #[test]
    fn test_reset_last_record_clears_stored_key() {
        let (store, storage) = memory_store();
        store.initialize_progress("tour", None);
        store.initialize_progress("other", None);

        store.reset_progress("tour");
        assert!(storage.get(DEFAULT_PROGRESS_KEY).unwrap().is_some());

        store.reset_progress("other");
        assert!(storage.get(DEFAULT_PROGRESS_KEY).unwrap().is_none());
        assert!(storage.get(DEFAULT_ANALYTICS_KEY).unwrap().is_none());

        let reopened = FlowStore::new(Some(storage as Arc<dyn Storage>));
        assert!(reopened.all_progress().is_empty());
    }

    #[test]
    fn test_write_through_and_reload() {
        let (store, storage) = memory_store();
        store.initialize_progress("tour", Some(Variant::A));
        store.complete_step("tour", "a");

        let expected = store.all_progress();
        assert!(storage.get(DEFAULT_PROGRESS_KEY).unwrap().is_some());
        assert!(storage.get(DEFAULT_ANALYTICS_KEY).unwrap().is_some());

        let reopened = FlowStore::new(Some(storage as Arc<dyn Storage>));
        assert_eq!(reopened.all_progress(), expected);
        assert_eq!(reopened.analytics(Some("tour")).len(), 1);
    }

    #[test]
    fn test_corrupt_storage_falls_back_to_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(DEFAULT_PROGRESS_KEY, "{definitely not json").unwrap();
        storage.set(DEFAULT_ANALYTICS_KEY, "[{\"flowId\":1}]").unwrap();

        let store = FlowStore::new(Some(storage as Arc<dyn Storage>));
        assert!(store.all_progress().is_empty());
        assert!(store.analytics(None).is_empty());

        store.initialize_progress("tour", None);
        assert!(store.progress("tour").is_some());
    }

    #[test]
    fn test_no_storage_backend() {
        let store = FlowStore::ephemeral();
        assert!(!store.is_persistent());

        store.initialize_progress("tour", None);
        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Start));
        assert!(store.progress("tour").is_some());
        assert_eq!(store.analytics(None).len(), 1);
    }

    #[test]
    fn test_tracked_events_are_published() {
        let store = FlowStore::ephemeral();
        let (rx, _id) = store.bus().subscribe();

        store.initialize_progress("tour", None);
        store.complete_step("tour", "a");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Complete);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_close_disconnects_subscribers() {
        let store = FlowStore::ephemeral();
        let (rx, _id) = store.bus().subscribe();
        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Start));

        store.close();
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Start);
        assert!(rx.recv().is_err());

        store.track_event(AnalyticsEvent::new("tour", "a", EventKind::Next));
        assert_eq!(store.analytics(None).len(), 2);
        assert_eq!(store.bus().subscriber_count(), 0);
    }

    #[test]
    fn test_close_through_shared_handle() {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(FlowStore::new(Some(storage.clone() as Arc<dyn Storage>)));
        let other = Arc::clone(&store);
        other.initialize_progress("tour", None);

        store.close();
        assert!(storage.get(DEFAULT_PROGRESS_KEY).unwrap().is_some());
        assert!(storage.get(DEFAULT_ANALYTICS_KEY).unwrap().is_some());
    }

    #[test]
    fn test_shared_storage_key_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let result = FlowStore::with_storage(Some(storage.clone() as Arc<dyn Storage>), "k", "k");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = FlowStore::with_storage(Some(storage as Arc<dyn Storage>), " ", "events");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = EngineConfig {
            analytics_key: DEFAULT_PROGRESS_KEY.to_string(),
            ..EngineConfig::in_memory()
        };
        assert!(matches!(FlowStore::open(&config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_custom_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let store = FlowStore::with_storage(
            Some(storage.clone() as Arc<dyn Storage>),
            "progress_v2",
            "events_v2",
        )
        .unwrap();
        store.initialize_progress("tour", None);
        store.close();

        assert!(storage.get("progress_v2").unwrap().is_some());
        assert!(storage.get("events_v2").unwrap().is_some());
        assert!(storage.get(DEFAULT_PROGRESS_KEY).unwrap().is_none());
    }
}
