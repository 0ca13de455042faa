//! Casepilot spreadsheet extraction
//!
//! Converts loosely structured, merged-cell spreadsheets of manual test cases
//! into the canonical [`TestCase`](casepilot_common::TestCase) sequence.
//!
//! ```text
//! workbook ──► SheetTable ──► resolve_columns ──► Extractor
//!                                                   ├── forward fill + grouping
//!                                                   ├── normalize_test_data
//!                                                   └── StepSegmenter
//! ```

pub mod columns;
pub mod extractor;
pub mod sheet;
pub mod steps;
pub mod test_data;

pub use columns::{find_column, resolve_columns};
pub use extractor::{extract_test_cases, Extractor};
pub use sheet::SheetTable;
pub use steps::{split_actions, StepSegmenter};
pub use test_data::normalize_test_data;
