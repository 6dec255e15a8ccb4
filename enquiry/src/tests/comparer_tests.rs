use crate::comparer::{SCRAPING_STATUS, STATUS, STATUS_MSG};
use crate::{compare_excel_files, compare_tables, EnquiryError, MatchStatus, Table};

fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
    Table {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

#[test]
fn test_matching_rows() {
    let template = table(&["Name", "CIF"], &[&["Budi", "001"], &["Sari", ""]]);
    let scraped = table(
        &["CIF", "Name", "Extra"],
        &[&["001", "Budi", "x"], &["", "Sari", "y"]],
    );
    let comparison = compare_tables(&template, &scraped).unwrap();
    assert_eq!(comparison.mismatches(), 0);
    assert_eq!(comparison.log_text(), "Row 1: MATCH - OK\nRow 2: MATCH - OK");
}

#[test]
fn test_mismatch_messages() {
    let template = table(&["Name", "CIF"], &[&["Budi", "001"], &["Sari", "002"]]);
    let scraped = table(&["Name", "CIF"], &[&["Budi", "009"], &["Sri", ""]]);
    let comparison = compare_tables(&template, &scraped).unwrap();
    assert_eq!(comparison.rows[0].status, MatchStatus::Mismatch);
    assert_eq!(comparison.rows[0].message, "CIF: expected '001', found '009'");
    assert_eq!(
        comparison.rows[1].message,
        "Name: expected 'Sari', found 'Sri', CIF: expected '002', found ''"
    );
}

#[test]
fn test_row_count_differences() {
    let template = table(&["Name"], &[&["Budi"], &["Sari"]]);
    let shorter = table(&["Name"], &[&["Budi"]]);
    let comparison = compare_tables(&template, &shorter).unwrap();
    assert_eq!(comparison.rows[1].message, "Row missing in scraped file");

    let longer = table(&["Name"], &[&["Budi"], &["Sari"], &["Tono"]]);
    let comparison = compare_tables(&template, &longer).unwrap();
    assert_eq!(comparison.rows.len(), 3);
    assert_eq!(comparison.rows[2].status, MatchStatus::Mismatch);
    assert_eq!(comparison.rows[2].message, "Row not present in template");
}

#[test]
fn test_missing_column_fails() {
    let template = table(&["Name", "Branch"], &[&["Budi", "JKT"]]);
    let scraped = table(&["Name"], &[&["Budi"]]);
    let err = compare_tables(&template, &scraped).unwrap_err();
    assert!(matches!(err, EnquiryError::Comparison(_)));
    assert_eq!(
        err.to_string(),
        "Comparison failed: column 'Branch' not found in scraped file"
    );
}

#[test]
fn test_compare_files_writes_status_columns() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("template.xlsx");
    let target = dir.path().join("scraped.xlsx");
    table(&["Name", "CIF"], &[&["Budi", "001"], &["Sari", "002"]])
        .write(&reference)
        .unwrap();
    table(&["Name", "CIF"], &[&["Budi", "001"], &["Sari", "003"]])
        .write(&target)
        .unwrap();

    let (output, log) = compare_excel_files(&reference, &target, true).unwrap();
    assert_eq!(output, target);
    assert_eq!(
        log,
        "Row 1: MATCH - OK\nRow 2: MISMATCH - CIF: expected '002', found '003'"
    );

    let result = Table::read(&target).unwrap();
    let status = result.column_index(STATUS).unwrap();
    let msg = result.column_index(STATUS_MSG).unwrap();
    let scraping = result.column_index(SCRAPING_STATUS).unwrap();
    assert_eq!(result.cell(0, status), "MATCH");
    assert_eq!(result.cell(1, status), "MISMATCH");
    assert_eq!(result.cell(0, msg), "OK");
    assert_eq!(result.cell(1, scraping), "PROCESSED");
    assert_eq!(result.headers.len(), 7);

    // A second run replaces the status columns instead of duplicating them.
    compare_excel_files(&reference, &target, true).unwrap();
    assert_eq!(Table::read(&target).unwrap().headers.len(), 7);
}

#[test]
fn test_compare_files_without_saving() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("template.csv");
    let target = dir.path().join("scraped.csv");
    std::fs::write(&reference, "Name\nBudi\n").unwrap();
    std::fs::write(&target, "Name\nBudi\n").unwrap();

    let (_, log) = compare_excel_files(&reference, &target, false).unwrap();
    assert_eq!(log, "Row 1: MATCH - OK");
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "Name\nBudi\n");
}
