//! Test case extraction

use std::path::PathBuf;

use anyhow::{bail, Result};
use casepilot_common::{Step, TestCase};
use casepilot_extract::extract_test_cases;
use clap::Args;

use crate::output::{print_document, print_info, print_list, truncate, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ExtractArgs {
    /// Spreadsheet to extract test cases from
    pub file: PathBuf,

    /// Show the steps of a single test case
    #[arg(long)]
    pub id: Option<String>,
}

impl TableDisplay for TestCase {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Title", "Steps", "Test Data", "Summary"]
    }

    fn row(&self) -> Vec<String> {
        let data_items: usize = self
            .steps
            .iter()
            .map(|s| s.matched_test_data.len())
            .sum::<usize>()
            + self.case_level_test_data.len();

        vec![
            self.id.clone(),
            truncate(&self.title, 40),
            self.steps.len().to_string(),
            data_items.to_string(),
            truncate(&self.summary, 60),
        ]
    }
}

impl TableDisplay for Step {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Action", "Expected Result", "Test Data"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.number.to_string(),
            self.action.clone(),
            self.expected_result.clone(),
            self.matched_test_data.join(", "),
        ]
    }
}

pub fn execute(args: ExtractArgs, format: OutputFormat) -> Result<()> {
    let table = super::load_table(&args.file)?;
    let cases = extract_test_cases(&table)?;

    let Some(id) = args.id else {
        print_list(&cases, format);
        return Ok(());
    };

    let Some(case) = cases.iter().find(|c| c.id == id) else {
        bail!("No test case '{}' in {}", id, args.file.display());
    };

    if format.is_structured() {
        print_document(case, format);
        return Ok(());
    }

    print_info(&format!("{}: {}", case.id, case.title));
    if !case.prerequisite.is_empty() {
        println!("Prerequisite: {}", case.prerequisite);
    }
    print_list(&case.steps, format);
    if !case.case_level_test_data.is_empty() {
        println!("Unassigned test data: {}", case.case_level_test_data.join(", "));
    }
    Ok(())
}
