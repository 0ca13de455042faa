//! CLI Commands

pub mod columns;
pub mod extract;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use casepilot_extract::SheetTable;
use tracing::debug;

/// Read the first worksheet of `path`
pub(crate) fn load_table(path: &Path) -> Result<SheetTable> {
    let table = SheetTable::open(path)
        .with_context(|| format!("Failed to read test cases from {}", path.display()))?;
    debug!(
        "Loaded {} row(s) under {} header(s)",
        table.row_count(),
        table.headers().len()
    );
    Ok(table)
}
