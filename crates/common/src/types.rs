//! Core test case model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical test case attribute that spreadsheet headers are resolved onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    TestCaseID,
    Title,
    Description,
    Prerequisite,
    TestData,
    StepNo,
    Action,
    ExpectedResult,
}

impl CanonicalField {
    /// Every canonical field, in resolution order
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::TestCaseID,
        CanonicalField::Title,
        CanonicalField::Description,
        CanonicalField::Prerequisite,
        CanonicalField::TestData,
        CanonicalField::StepNo,
        CanonicalField::Action,
        CanonicalField::ExpectedResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::TestCaseID => "TestCaseID",
            CanonicalField::Title => "Title",
            CanonicalField::Description => "Description",
            CanonicalField::Prerequisite => "Prerequisite",
            CanonicalField::TestData => "TestData",
            CanonicalField::StepNo => "StepNo",
            CanonicalField::Action => "Action",
            CanonicalField::ExpectedResult => "ExpectedResult",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spreadsheet column a canonical field was resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedColumn {
    /// Header text as it appears in the sheet
    pub header: String,
    /// Zero-based column position
    pub index: usize,
}

/// Association from canonical field to the actual spreadsheet column.
///
/// Fields absent from the map are unmapped. Computed once per file and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    columns: BTreeMap<CanonicalField, ResolvedColumn>,
}

impl ColumnMapping {
    pub fn new(columns: BTreeMap<CanonicalField, ResolvedColumn>) -> Self {
        Self { columns }
    }

    pub fn get(&self, field: CanonicalField) -> Option<&ResolvedColumn> {
        self.columns.get(&field)
    }

    /// Column index for a field, if mapped
    pub fn index(&self, field: CanonicalField) -> Option<usize> {
        self.columns.get(&field).map(|c| c.index)
    }

    pub fn is_mapped(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn unmapped(&self) -> Vec<CanonicalField> {
        CanonicalField::ALL
            .into_iter()
            .filter(|f| !self.is_mapped(*f))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalField, &ResolvedColumn)> {
        self.columns.iter()
    }
}

/// A normalized test data string: a bare token, a `key: value` pair or a URL
pub type TestDataItem = String;

/// One atomic action inside a test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "StepNo")]
    pub number: u32,
    #[serde(rename = "Action")]
    pub action: String,
    /// Only set on the last step cut from a given action cell
    #[serde(rename = "ExpectedResult")]
    pub expected_result: String,
    #[serde(rename = "TestData")]
    pub matched_test_data: Vec<TestDataItem>,
}

/// A single scenario to automate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(rename = "TestCaseID")]
    pub id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Prerequisite")]
    pub prerequisite: String,
    #[serde(rename = "Steps")]
    pub steps: Vec<Step>,
    #[serde(rename = "Summary")]
    pub summary: String,
    /// Test data not matched to any step
    #[serde(rename = "TestData", default, skip_serializing_if = "Vec::is_empty")]
    pub case_level_test_data: Vec<TestDataItem>,
}

impl TestCase {
    /// One-line summary derived from a description
    pub fn summarize(description: &str) -> String {
        format!(
            "This test case verifies: {}.",
            description.trim().to_lowercase()
        )
    }
}
