//! Step segmentation
//!
//! An action cell often packs several sub-steps ("1. Open app 2. Login").
//! [`StepSegmenter`] cuts each cell into atomic steps, numbers them with one
//! counter per test case, and attaches the test data whose key appears in
//! the step text.

use std::collections::HashSet;

use casepilot_common::{Step, TestDataItem};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::test_data::match_key;

/// Enumeration markers ("1.", "2)", "a.", "b)") and plain separators
static STEP_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b\d+[.)]\s*|\b[a-zA-Z][.)]\s*|[,\n;])").expect("valid step separator")
});

/// Split one action cell into trimmed, non-empty fragments
pub fn split_actions(text: &str) -> Vec<String> {
    STEP_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accumulates the steps of a single test case
pub struct StepSegmenter<'a> {
    pool: &'a [TestDataItem],
    keys: Vec<String>,
    used: Vec<bool>,
    next_number: u32,
    seen: HashSet<(u32, String)>,
    steps: Vec<Step>,
}

impl<'a> StepSegmenter<'a> {
    /// `pool` is the case's normalized test data; items are matched against
    /// every step and may attach to more than one.
    pub fn new(pool: &'a [TestDataItem]) -> Self {
        Self {
            pool,
            keys: pool.iter().map(|item| match_key(item)).collect(),
            used: vec![false; pool.len()],
            next_number: 1,
            seen: HashSet::new(),
            steps: Vec::new(),
        }
    }

    /// Segment one action cell. The expected result goes on the last
    /// fragment of the cell only.
    pub fn push_cell(&mut self, action: &str, expected_result: &str) {
        let fragments = split_actions(action);
        let last = fragments.len().saturating_sub(1);

        for (i, fragment) in fragments.into_iter().enumerate() {
            let key = (self.next_number, fragment.clone());
            if self.seen.contains(&key) {
                continue;
            }

            let matched_test_data = self.match_test_data(&fragment);
            self.steps.push(Step {
                number: self.next_number,
                action: fragment,
                expected_result: if i == last {
                    expected_result.to_string()
                } else {
                    String::new()
                },
                matched_test_data,
            });
            self.seen.insert(key);
            self.next_number += 1;
        }
    }

    fn match_test_data(&mut self, fragment: &str) -> Vec<TestDataItem> {
        let text = fragment.to_lowercase();
        let mut matched = Vec::new();
        for (i, key) in self.keys.iter().enumerate() {
            if text.contains(key.as_str()) {
                matched.push(self.pool[i].clone());
                self.used[i] = true;
            }
        }
        matched
    }

    /// Finished steps, plus the pool items no step matched
    pub fn finish(self) -> (Vec<Step>, Vec<TestDataItem>) {
        let unused = self
            .pool
            .iter()
            .zip(&self.used)
            .filter(|(_, used)| !**used)
            .map(|(item, _)| item.clone())
            .collect();
        (self.steps, unused)
    }
}
