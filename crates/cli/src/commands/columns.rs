//! Column mapping inspection

use std::path::PathBuf;

use anyhow::Result;
use casepilot_common::{CanonicalField, ColumnMapping};
use casepilot_extract::resolve_columns;
use clap::Args;
use serde::Serialize;

use crate::output::{print_list, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ColumnsArgs {
    /// Spreadsheet to inspect
    pub file: PathBuf,
}

/// One canonical field and where it was found
#[derive(Serialize)]
pub struct ColumnDisplay {
    pub field: CanonicalField,
    pub header: Option<String>,
    pub column: Option<usize>,
}

impl ColumnDisplay {
    fn from_mapping(mapping: &ColumnMapping) -> Vec<Self> {
        CanonicalField::ALL
            .iter()
            .map(|&field| {
                let resolved = mapping.get(field);
                Self {
                    field,
                    header: resolved.map(|c| c.header.clone()),
                    column: resolved.map(|c| c.index),
                }
            })
            .collect()
    }
}

impl TableDisplay for ColumnDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Field", "Header", "Column"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.field.to_string(),
            self.header.clone().unwrap_or_else(|| "-".to_string()),
            self.column
                .map(|index| (index + 1).to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub fn execute(args: ColumnsArgs, format: OutputFormat) -> Result<()> {
    let table = super::load_table(&args.file)?;
    let mapping = resolve_columns(table.headers());

    print_list(&ColumnDisplay::from_mapping(&mapping), format);

    let unmapped = mapping.unmapped();
    if !unmapped.is_empty() && !format.is_structured() {
        let names: Vec<_> = unmapped.iter().map(|f| f.as_str()).collect();
        print_warning(&format!("Unmapped fields: {}", names.join(", ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use casepilot_common::ResolvedColumn;
    use std::collections::BTreeMap;

    #[test]
    fn test_every_field_is_listed() {
        let mut columns = BTreeMap::new();
        columns.insert(
            CanonicalField::Title,
            ResolvedColumn {
                header: "Scenario".to_string(),
                index: 2,
            },
        );
        let rows = ColumnDisplay::from_mapping(&ColumnMapping::new(columns));

        assert_eq!(rows.len(), CanonicalField::ALL.len());
        let title = rows.iter().find(|r| r.field == CanonicalField::Title).unwrap();
        assert_eq!(title.row(), vec!["Title", "Scenario", "3"]);
        let id = rows.iter().find(|r| r.field == CanonicalField::TestCaseID).unwrap();
        assert_eq!(id.row(), vec!["TestCaseID", "-", "-"]);
    }
}
