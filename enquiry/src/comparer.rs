//! Row-by-row comparison of a scraped table against a template.

use crate::errors::EnquiryError;
use crate::table::Table;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const STATUS: &str = "STATUS";
pub const STATUS_MSG: &str = "STATUSMSG";
pub const START_TIME: &str = "STARTTIME";
pub const END_TIME: &str = "ENDTIME";
pub const SCRAPING_STATUS: &str = "SCRAPINGSTATUS";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Match,
    Mismatch,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Match => f.write_str("MATCH"),
            MatchStatus::Mismatch => f.write_str("MISMATCH"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowStatus {
    pub status: MatchStatus,
    pub message: String,
}

impl RowStatus {
    fn matched() -> Self {
        Self {
            status: MatchStatus::Match,
            message: "OK".to_string(),
        }
    }

    fn mismatch(message: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::Mismatch,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Comparison {
    pub rows: Vec<RowStatus>,
}

impl Comparison {
    pub fn mismatches(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == MatchStatus::Mismatch)
            .count()
    }

    /// One `Row N: STATUS - MSG` line per compared row.
    pub fn log_text(&self) -> String {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| format!("Row {}: {} - {}", i + 1, row.status, row.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Compares `scraped` against `template` on the template's columns.
pub fn compare_tables(template: &Table, scraped: &Table) -> Result<Comparison, EnquiryError> {
    let columns = template
        .headers
        .iter()
        .enumerate()
        .map(|(t, name)| {
            scraped
                .column_index(name)
                .map(|s| (name.as_str(), t, s))
                .ok_or_else(|| {
                    EnquiryError::Comparison(format!("column '{name}' not found in scraped file"))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut comparison = Comparison::default();
    for i in 0..template.len() {
        if i >= scraped.len() {
            comparison
                .rows
                .push(RowStatus::mismatch("Row missing in scraped file"));
            continue;
        }
        let diffs: Vec<String> = columns
            .iter()
            .filter_map(|&(name, t, s)| {
                let expected = template.cell(i, t);
                let found = scraped.cell(i, s);
                (expected != found).then(|| format!("{name}: expected '{expected}', found '{found}'"))
            })
            .collect();
        comparison.rows.push(if diffs.is_empty() {
            RowStatus::matched()
        } else {
            RowStatus::mismatch(diffs.join(", "))
        });
    }
    for _ in template.len()..scraped.len() {
        comparison
            .rows
            .push(RowStatus::mismatch("Row not present in template"));
    }
    Ok(comparison)
}

/// Compares two spreadsheet files and records the outcome as columns on `target`.
///
/// Returns the result path (the target itself) and the per-row log.
pub fn compare_excel_files(
    reference: impl AsRef<Path>,
    target: impl AsRef<Path>,
    save_result: bool,
) -> Result<(PathBuf, String), EnquiryError> {
    let (reference, target) = (reference.as_ref(), target.as_ref());
    let template = Table::read(reference)?;
    let mut scraped = Table::read(target)?;
    let start_time = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();

    let comparison = compare_tables(&template, &scraped)?;

    let n = scraped.len();
    let statuses: Vec<String> = comparison.rows.iter().map(|r| r.status.to_string()).collect();
    let messages: Vec<String> = comparison.rows.iter().map(|r| r.message.clone()).collect();
    let end_time = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
    scraped.set_column(STATUS, &statuses);
    scraped.set_column(STATUS_MSG, &messages);
    scraped.set_column(START_TIME, &vec![start_time; n]);
    scraped.set_column(END_TIME, &vec![end_time; n]);
    scraped.set_column(SCRAPING_STATUS, &vec!["PROCESSED".to_string(); n]);

    if save_result {
        scraped.write(target)?;
        info!(
            rows = comparison.rows.len(),
            mismatches = comparison.mismatches(),
            "Comparison result saved to {}",
            target.display()
        );
    }
    Ok((target.to_path_buf(), comparison.log_text()))
}
