//! Column resolution
//!
//! Maps the headers found in a sheet onto canonical fields. For each field
//! the aliases are tried in three tiers, first match wins:
//!
//! 1. exact string match
//! 2. case-insensitive match
//! 3. fuzzy match (normalized Levenshtein similarity >= [`SIMILARITY_THRESHOLD`])
//!
//! A field no tier resolves is left unmapped.

use std::collections::BTreeMap;

use casepilot_common::{CanonicalField, ColumnMapping, ResolvedColumn};
use tracing::debug;

/// Minimum similarity for a fuzzy header match
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Accepted header aliases for a canonical field, most specific first
pub fn aliases(field: CanonicalField) -> &'static [&'static str] {
    match field {
        CanonicalField::TestCaseID => &[
            "Test Case ID", "ID", "Case ID", "Scenario ID", "TestCaseID", "TC ID", "Test ID",
            "TestCase", "TCID", "Test Case Number", "Test Number", "TestCase No", "TC Number",
            "Test Identifier", "Case Number",
        ],
        CanonicalField::Title => &[
            "Feature", "Module Name", "Title", "Module", "Scenario Name", "Test Name",
            "Test Title", "Functionality", "Test Module", "Feature Name", "Test Case Name",
            "Module Title", "Test Function",
        ],
        CanonicalField::Description => &[
            "Test Case Description", "Scenario Description", "Test Case", "Scenario",
            "Test Case Title", "Test Objective", "Purpose", "Test Scenario", "Test Goal",
            "Description", "Test Purpose", "Test Summary", "Objective", "Test Details",
        ],
        CanonicalField::Prerequisite => &[
            "Pre-requisites", "Precondition", "Prerequisite ID", "Pre-conditions", "Requisite",
            "Pre-Rules", "Setup", "Requirements", "Pre-Req", "Conditions", "Pre-Requirement",
            "Test Setup", "Precondition(s)", "Setup Conditions", "Initial Conditions",
            "Test Prerequisites",
        ],
        CanonicalField::TestData => &[
            "Test Data", "argument", "Data", "Input", "Inputs", "Test Input", "Data Set",
            "Input Data", "Test Dataset", "Test Parameters", "Data Inputs",
        ],
        CanonicalField::StepNo => &[
            "Step No.", "Step Number", "No", "Step ID", "Sequence", "Step", "Sequence No",
            "Order", "Step Seq", "Test Step No", "Step Order",
        ],
        CanonicalField::Action => &[
            "Test Step", "Step", "Action", "Test Steps", "Test Action", "Procedure",
            "Test Procedure", "Step Description", "Action Step", "Test Activity", "Step Action",
            "Execution Step",
        ],
        CanonicalField::ExpectedResult => &[
            "Expected Result", "Result", "Expected", "Expected Outcome", "Outcome",
            "Verification", "Expected Behavior", "Test Result", "Expected Output",
            "Test Outcome", "Verification Result", "Expected Response",
        ],
    }
}

/// Resolve every canonical field against the sheet headers
pub fn resolve_columns(headers: &[String]) -> ColumnMapping {
    let mut columns = BTreeMap::new();

    for field in CanonicalField::ALL {
        match find_column(headers, aliases(field)) {
            Some(index) => {
                debug!("Column {} -> '{}'", field, headers[index]);
                columns.insert(
                    field,
                    ResolvedColumn {
                        header: headers[index].clone(),
                        index,
                    },
                );
            }
            None => debug!("Column {} unmapped", field),
        }
    }

    ColumnMapping::new(columns)
}

/// Index of the first header matching one of `candidates`, or `None`
pub fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    exact_match(headers, candidates)
        .or_else(|| case_insensitive_match(headers, candidates))
        .or_else(|| fuzzy_match(headers, candidates))
}

fn exact_match(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
}

fn case_insensitive_match(headers: &[String], candidates: &[&str]) -> Option<usize> {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    candidates.iter().find_map(|name| {
        let name = name.to_lowercase();
        lowered.iter().position(|h| *h == name)
    })
}

/// Best-scoring header for the first alias that has any header above the
/// threshold. Ties keep the leftmost header.
fn fuzzy_match(headers: &[String], candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|name| {
        let mut best: Option<(usize, f64)> = None;
        for (index, header) in headers.iter().enumerate() {
            let score = strsim::normalized_levenshtein(name, header);
            if score < SIMILARITY_THRESHOLD {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    })
}
