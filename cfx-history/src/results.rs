//! Aggregation results

use crate::types::Timestamp;
use crate::vocabulary::State;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Per-state counts at one sampled timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneTimestampResult {
    pub timestamp: Timestamp,
    pub count_by_state: BTreeMap<State, usize>,
}

impl OneTimestampResult {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            count_by_state: BTreeMap::new(),
        }
    }

    pub fn add_one_result_for_state(&mut self, state: State) {
        *self.count_by_state.entry(state).or_insert(0) += 1;
    }

    /// Count for `state`, zero when absent
    pub fn count(&self, state: State) -> usize {
        self.count_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Number of entities counted at this timestamp
    pub fn total(&self) -> usize {
        self.count_by_state.values().sum()
    }
}

/// Output of one aggregation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct AllResultsPerDates {
    timestamp_results: Vec<OneTimestampResult>,
    present_states: BTreeSet<State>,
    matched_ids: BTreeSet<String>,
    at_least_one_match: bool,
}

impl AllResultsPerDates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `id` matched a filter at some sampled date
    pub(crate) fn add_matched_id(&mut self, id: &str) {
        if !self.matched_ids.contains(id) {
            self.matched_ids.insert(id.to_string());
        }
    }

    pub(crate) fn mark_match_found(&mut self) {
        self.at_least_one_match = true;
    }

    /// Keep a per-timestamp result and fold its states into the present set
    pub(crate) fn push(&mut self, result: OneTimestampResult) {
        self.present_states
            .extend(result.count_by_state.keys().copied());
        self.timestamp_results.push(result);
    }

    pub fn timestamp_results(&self) -> &[OneTimestampResult] {
        &self.timestamp_results
    }

    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.timestamp_results
            .iter()
            .map(|result| result.timestamp)
            .collect()
    }

    /// Distinct states observed during the run, in declaration order
    pub fn present_states_ordered(&self) -> Vec<State> {
        self.present_states.iter().copied().collect()
    }

    pub fn state_counts_per_timestamp(&self) -> Vec<&BTreeMap<State, usize>> {
        self.timestamp_results
            .iter()
            .map(|result| &result.count_by_state)
            .collect()
    }

    /// One series per present state: its count at each retained timestamp
    pub fn cumulative_counts(&self) -> BTreeMap<State, Vec<usize>> {
        self.present_states
            .iter()
            .map(|&state| {
                let series = self
                    .timestamp_results
                    .iter()
                    .map(|result| result.count(state))
                    .collect();
                (state, series)
            })
            .collect()
    }

    pub fn matched_ids(&self) -> &BTreeSet<String> {
        &self.matched_ids
    }

    pub fn at_least_one_match(&self) -> bool {
        self.at_least_one_match
    }

    /// True when no entity matched at any sampled date
    pub fn is_empty(&self) -> bool {
        self.matched_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2022, 3, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_cumulative_counts_fill_zeros() {
        let mut results = AllResultsPerDates::new();
        assert!(results.is_empty());

        let mut first = OneTimestampResult::new(at(1));
        first.add_one_result_for_state(State::Submitted);
        first.add_one_result_for_state(State::Submitted);
        results.push(first);

        let mut second = OneTimestampResult::new(at(2));
        second.add_one_result_for_state(State::Closed);
        second.add_one_result_for_state(State::Submitted);
        results.push(second);
        results.add_matched_id("CFX1");
        results.mark_match_found();

        assert_eq!(results.timestamps(), vec![at(1), at(2)]);
        assert_eq!(
            results.present_states_ordered(),
            vec![State::Submitted, State::Closed]
        );
        let cumulative = results.cumulative_counts();
        assert_eq!(cumulative[&State::Submitted], vec![2, 1]);
        assert_eq!(cumulative[&State::Closed], vec![0, 1]);
        assert_eq!(results.timestamp_results()[1].total(), 2);
        assert!(!results.is_empty());
        assert!(results.at_least_one_match());
    }

    #[test]
    fn test_json_shape() {
        let mut result = OneTimestampResult::new(at(1));
        result.add_one_result_for_state(State::Analysed);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["count_by_state"]["ANALYSED"], 1);
        assert_eq!(json["timestamp"], "2022-03-01T00:00:00");
    }
}
