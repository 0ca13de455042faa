//! Test case extraction
//!
//! Groups sheet rows into test cases. Spreadsheets describing one case over
//! several rows usually leave the identifying cells blank after the first
//! row, so those columns are forward-filled before grouping.

use std::collections::HashMap;

use casepilot_common::{CanonicalField, ColumnMapping, Error, Result, TestCase};
use tracing::{debug, info};

use crate::columns::resolve_columns;
use crate::sheet::SheetTable;
use crate::steps::StepSegmenter;
use crate::test_data::normalize_test_data;

/// Columns carried down over blank cells before grouping
const FORWARD_FILLED: [CanonicalField; 4] = [
    CanonicalField::TestCaseID,
    CanonicalField::Title,
    CanonicalField::Description,
    CanonicalField::Prerequisite,
];

/// Extracts the canonical test case sequence from one sheet
pub struct Extractor<'a> {
    table: &'a SheetTable,
    mapping: ColumnMapping,
}

impl<'a> Extractor<'a> {
    /// Create an extractor, resolving columns from the sheet headers
    pub fn new(table: &'a SheetTable) -> Self {
        Self::with_mapping(table, resolve_columns(table.headers()))
    }

    pub fn with_mapping(table: &'a SheetTable, mapping: ColumnMapping) -> Self {
        Self { table, mapping }
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Build every test case, in order of first appearance
    pub fn extract(&self) -> Result<Vec<TestCase>> {
        let by_id = self.mapping.is_mapped(CanonicalField::TestCaseID);
        if !by_id
            && !self.mapping.is_mapped(CanonicalField::Title)
            && !self.mapping.is_mapped(CanonicalField::Description)
        {
            return Err(Error::MissingColumns(
                "no test case ID, title or description column found".to_string(),
            ));
        }

        let rows = self.forward_filled_rows();
        let groups = self.group_rows(&rows, by_id);

        let mut cases = Vec::with_capacity(groups.len());
        for (ordinal, (key, members)) in groups.into_iter().enumerate() {
            let id = if by_id {
                key
            } else {
                format!("TC{:03}", ordinal + 1)
            };
            cases.push(self.build_case(id, &rows, &members));
        }

        info!(
            "Extracted {} test case(s) from {} row(s)",
            cases.len(),
            self.table.row_count()
        );
        Ok(cases)
    }

    /// Rows with the identifying columns carried down over blank cells
    fn forward_filled_rows(&self) -> Vec<Vec<String>> {
        let mut rows = self.table.rows().to_vec();

        for field in FORWARD_FILLED {
            let Some(column) = self.mapping.index(field) else {
                continue;
            };
            let mut last = String::new();
            for row in rows.iter_mut() {
                let Some(cell) = row.get_mut(column) else {
                    continue;
                };
                if cell.trim().is_empty() {
                    cell.clone_from(&last);
                } else {
                    last.clone_from(cell);
                }
            }
        }

        rows
    }

    /// Row indices per grouping key, keys in first-encounter order. Rows
    /// whose key is entirely blank are dropped.
    fn group_rows(&self, rows: &[Vec<String>], by_id: bool) -> Vec<(String, Vec<usize>)> {
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        let mut positions: HashMap<(String, String), usize> = HashMap::new();

        for (index, row) in rows.iter().enumerate() {
            let key = if by_id {
                (cell(row, self.mapping.index(CanonicalField::TestCaseID)).to_string(), String::new())
            } else {
                (
                    cell(row, self.mapping.index(CanonicalField::Title)).to_string(),
                    cell(row, self.mapping.index(CanonicalField::Description)).to_string(),
                )
            };

            if key.0.trim().is_empty() && key.1.trim().is_empty() {
                debug!("Skipping row {} with blank grouping key", index + 2);
                continue;
            }

            match positions.get(&key) {
                Some(&slot) => groups[slot].1.push(index),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push((key.0, vec![index]));
                }
            }
        }

        groups
    }

    fn build_case(&self, id: String, rows: &[Vec<String>], members: &[usize]) -> TestCase {
        let field = |row: usize, f: CanonicalField| cell(&rows[row], self.mapping.index(f)).to_string();
        let first = members[0];

        let pool = normalize_test_data(
            members
                .iter()
                .map(|&row| cell(&rows[row], self.mapping.index(CanonicalField::TestData))),
        );

        let mut segmenter = StepSegmenter::new(&pool);
        for &row in members {
            let action = field(row, CanonicalField::Action);
            if action.trim().is_empty() {
                continue;
            }
            segmenter.push_cell(&action, &field(row, CanonicalField::ExpectedResult));
        }
        let (steps, case_level_test_data) = segmenter.finish();

        let description = field(first, CanonicalField::Description);
        debug!("Test case {}: {} step(s), {} data item(s)", id, steps.len(), pool.len());

        TestCase {
            summary: TestCase::summarize(&description),
            id,
            title: field(first, CanonicalField::Title),
            description,
            prerequisite: field(first, CanonicalField::Prerequisite),
            steps,
            case_level_test_data,
        }
    }
}

fn cell(row: &[String], column: Option<usize>) -> &str {
    column
        .and_then(|c| row.get(c))
        .map(String::as_str)
        .unwrap_or("")
}

/// Resolve columns and extract in one call
pub fn extract_test_cases(table: &SheetTable) -> Result<Vec<TestCase>> {
    Extractor::new(table).extract()
}
