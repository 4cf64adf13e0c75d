//! Answer key store with a lazily built lookup cache.
//!
//! The store owns one [`AnswerSet`] per stage. Scoring never walks the raw
//! answer list; it asks for an [`AnswerLookup`] (question → correct response)
//! which is built on first use and cached.
//!
//! # Stale lookups
//!
//! Reloading a stage replaces its [`AnswerSet`] but does **not** drop a lookup
//! that was already built for it. Answer keys are treated as immutable once
//! scoring has started; a process that needs a fresh key for a stage it has
//! already scored must be restarted. Stages that were still unknown when they
//! were first looked up are not cached, so their first load is always seen.

use super::entities::AnswerSet;
use crate::core::error::DomainError;
use crate::core::ids::StageId;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

/// Question index → correct response index for one stage.
pub type AnswerLookup = HashMap<i32, i32>;

static EMPTY_LOOKUP: LazyLock<AnswerLookup> = LazyLock::new(HashMap::new);

/// In-memory answer keys for every known stage.
///
/// One instance lives for the whole process and is handed to whoever needs
/// it; there is no global accessor.
#[derive(Debug, Default)]
pub struct AnswerStore {
    answers: BTreeMap<StageId, AnswerSet>,
    lookups: HashMap<StageId, AnswerLookup>,
}

impl AnswerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite answer sets by stage. Returns how many sets were
    /// applied.
    ///
    /// Overwriting replaces the whole set (no merge) and leaves any cached
    /// lookup for that stage in place.
    pub fn load(&mut self, sets: impl IntoIterator<Item = AnswerSet>) -> usize {
        let mut loaded = 0;
        for set in sets {
            self.answers.insert(set.stage, set);
            loaded += 1;
        }
        loaded
    }

    /// Parse a payload produced by [`serialize_subset`](Self::serialize_subset)
    /// or [`save_all`](Self::save_all) and load it.
    ///
    /// The payload is parsed completely before the store is touched.
    pub fn load_payload(&mut self, payload: &str) -> Result<usize, DomainError> {
        let sets = AnswerSet::parse_list(payload)?;
        Ok(self.load(sets))
    }

    /// Serialize the answer sets for the requested stages.
    ///
    /// Output follows store order (ascending stage id), lists each stage at
    /// most once, and silently skips stages that have no answer set.
    pub fn serialize_subset(&self, stages: &[StageId]) -> Result<String, DomainError> {
        let wanted: BTreeSet<StageId> = stages.iter().copied().collect();
        let subset: Vec<&AnswerSet> = self
            .answers
            .values()
            .filter(|set| wanted.contains(&set.stage))
            .collect();
        serde_json::to_string(&subset).map_err(|e| DomainError::Serialization(e.to_string()))
    }

    /// Serialize every stored answer set in ascending stage order.
    pub fn save_all(&self) -> Result<String, DomainError> {
        let all: Vec<&AnswerSet> = self.answers.values().collect();
        serde_json::to_string(&all).map_err(|e| DomainError::Serialization(e.to_string()))
    }

    /// Get the question → response lookup for a stage, building and caching
    /// it on first use.
    ///
    /// Unknown stages yield an empty lookup.
    pub fn get_lookup(&mut self, stage: StageId) -> &AnswerLookup {
        if self.lookups.contains_key(&stage) {
            return &self.lookups[&stage];
        }
        let Some(set) = self.answers.get(&stage) else {
            return &EMPTY_LOOKUP;
        };
        let lookup: AnswerLookup = set
            .answers
            .iter()
            .map(|answer| (answer.question, answer.response))
            .collect();
        self.lookups.entry(stage).or_insert(lookup)
    }

    /// Get the stored answer set for a stage
    pub fn get(&self, stage: StageId) -> Option<&AnswerSet> {
        self.answers.get(&stage)
    }

    /// Stored stages in ascending order
    pub fn stages(&self) -> impl Iterator<Item = StageId> + '_ {
        self.answers.keys().copied()
    }

    /// Number of stored stages
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::entities::Answer;

    fn stage(id: i32) -> StageId {
        StageId::new(id)
    }

    fn sample_store() -> AnswerStore {
        let mut store = AnswerStore::new();
        store.load(vec![
            AnswerSet::new(2, vec![Answer::new(1, 4)]),
            AnswerSet::new(1, vec![Answer::new(1, 2), Answer::new(2, 1)]),
            AnswerSet::new(3, vec![Answer::new(5, 0)]),
        ]);
        store
    }

    #[test]
    fn test_lookup_after_load() {
        let mut store = sample_store();
        let lookup = store.get_lookup(stage(1));
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.get(&1), Some(&2));
        assert_eq!(lookup.get(&2), Some(&1));
    }

    #[test]
    fn test_lookup_later_duplicates_override() {
        let mut store = AnswerStore::new();
        store.load(vec![AnswerSet::new(
            1,
            vec![Answer::new(1, 2), Answer::new(1, 3), Answer::new(2, 0)],
        )]);
        let lookup = store.get_lookup(stage(1));
        assert_eq!(lookup.get(&1), Some(&3));
        assert_eq!(lookup.len(), 2);
    }

    #[test]
    fn test_unknown_stage_yields_empty_lookup() {
        let mut store = sample_store();
        assert!(store.get_lookup(stage(42)).is_empty());
    }

    #[test]
    fn test_unknown_stage_is_not_cached() {
        let mut store = AnswerStore::new();
        assert!(store.get_lookup(stage(1)).is_empty());

        store.load(vec![AnswerSet::new(1, vec![Answer::new(1, 2)])]);
        assert_eq!(store.get_lookup(stage(1)).get(&1), Some(&2));
    }

    #[test]
    fn test_reload_keeps_stale_cached_lookup() {
        let mut store = AnswerStore::new();
        store.load(vec![AnswerSet::new(1, vec![Answer::new(1, 2)])]);
        assert_eq!(store.get_lookup(stage(1)).get(&1), Some(&2));

        store.load(vec![AnswerSet::new(1, vec![Answer::new(1, 9)])]);

        // The stored set is replaced...
        assert_eq!(store.get(stage(1)).unwrap().answers, vec![Answer::new(1, 9)]);
        // ...but the lookup built before the reload keeps serving.
        assert_eq!(store.get_lookup(stage(1)).get(&1), Some(&2));
    }

    #[test]
    fn test_reload_overwrites_without_merge() {
        let mut store = AnswerStore::new();
        store.load(vec![AnswerSet::new(
            1,
            vec![Answer::new(1, 2), Answer::new(2, 1)],
        )]);
        store.load(vec![AnswerSet::new(1, vec![Answer::new(3, 3)])]);
        assert_eq!(store.get(stage(1)).unwrap().answers, vec![Answer::new(3, 3)]);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_serialize_subset_store_order_and_skips_unknown() {
        let store = sample_store();
        let payload = store
            .serialize_subset(&[stage(3), stage(99), stage(1), stage(3)])
            .unwrap();
        let sets = AnswerSet::parse_list(&payload).unwrap();
        let stages: Vec<StageId> = sets.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![stage(1), stage(3)]);
    }

    #[test]
    fn test_serialize_subset_of_nothing_is_empty_array() {
        let store = sample_store();
        assert_eq!(store.serialize_subset(&[]).unwrap(), "[]");
        assert_eq!(store.serialize_subset(&[stage(77)]).unwrap(), "[]");
    }

    #[test]
    fn test_subset_round_trip_reproduces_lookups() {
        let mut source = sample_store();
        let payload = source.serialize_subset(&[stage(1), stage(2)]).unwrap();

        let mut replica = AnswerStore::new();
        assert_eq!(replica.load_payload(&payload).unwrap(), 2);

        for s in [stage(1), stage(2)] {
            assert_eq!(replica.get_lookup(s), source.get_lookup(s));
        }
        assert!(replica.get_lookup(stage(3)).is_empty());
    }

    #[test]
    fn test_save_all_ascending_stage_order() {
        let store = sample_store();
        let sets = AnswerSet::parse_list(&store.save_all().unwrap()).unwrap();
        let stages: Vec<i32> = sets.iter().map(|s| s.stage.get()).collect();
        assert_eq!(stages, vec![1, 2, 3]);
    }

    #[test]
    fn test_save_all_empty_store() {
        assert_eq!(AnswerStore::new().save_all().unwrap(), "[]");
    }

    #[test]
    fn test_load_payload_malformed_leaves_store_untouched() {
        let mut store = sample_store();
        let err = store
            .load_payload(r#"[{"stage": 9, "answers": []}, {"stage": "x"}]"#)
            .unwrap_err();
        assert!(err.is_payload_error());
        assert_eq!(store.len(), 3);
        assert!(store.get(stage(9)).is_none());
    }

    #[test]
    fn test_stages_iterates_ascending() {
        let store = sample_store();
        let stages: Vec<StageId> = store.stages().collect();
        assert_eq!(stages, vec![stage(1), stage(2), stage(3)]);
    }
}
