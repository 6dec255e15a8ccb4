use crate::{EnquiryError, Table};
use indexmap::IndexMap;

fn record(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn sample() -> Table {
    Table {
        headers: vec!["Name".to_string(), "CIF".to_string()],
        rows: vec![
            vec!["Budi".to_string(), "001".to_string()],
            vec!["Sari".to_string(), String::new()],
        ],
    }
}

#[test]
fn test_csv_round_trip_drops_blank_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rows.csv");
    std::fs::write(&path, "Name,CIF,Branch\nBudi,001\n,,\nSari,002,Jakarta\n").unwrap();

    let table = Table::read(&path).unwrap();
    assert_eq!(table.headers, vec!["Name", "CIF", "Branch"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0], vec!["Budi", "001", ""]);
    assert_eq!(table.cell(1, 2), "Jakarta");
    assert_eq!(table.cell(5, 0), "");
}

#[test]
fn test_xlsx_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("rows.xlsx");
    sample().write(&path).unwrap();

    let table = Table::read(&path).unwrap();
    assert_eq!(table, sample());
}

#[test]
fn test_unsupported_extension() {
    let err = Table::read("notes.txt").unwrap_err();
    assert!(err.to_string().contains("Unsupported file type"));
}

#[test]
fn test_set_column_replaces_or_appends() {
    let mut table = sample();
    table.set_column("CIF", &["100".to_string(), "200".to_string()]);
    assert_eq!(table.cell(1, 1), "200");

    table.set_column("STATUS", &["MATCH".to_string()]);
    assert_eq!(table.headers.len(), 3);
    assert_eq!(table.column_index("STATUS"), Some(2));
    assert_eq!(table.cell(0, 2), "MATCH");
    assert_eq!(table.cell(1, 2), "");
}

#[test]
fn test_append_record_adds_columns() {
    let mut table = sample();
    table.append_record(&record(&[("CIF", "003"), ("Balance", "5.000")]));
    assert_eq!(table.headers, vec!["Name", "CIF", "Balance"]);
    assert_eq!(table.rows[2], vec!["", "003", "5.000"]);
    assert_eq!(table.records()[0]["Balance"], "");
}

#[test]
fn test_append_to_file_creates_then_extends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scraped.xlsx");

    Table::append_to_file(&path, &record(&[("name", "Budi"), ("cif", "001")])).unwrap();
    let table =
        Table::append_to_file(&path, &record(&[("name", "Sari"), ("cif", "002")])).unwrap();
    assert_eq!(table.len(), 2);

    let reread = Table::read(&path).unwrap();
    assert_eq!(reread.headers, vec!["name", "cif"]);
    assert_eq!(reread.rows[1], vec!["Sari", "002"]);
}

#[test]
fn test_read_only_workbook_formats_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["out.xls", "out.ods", "out.xlsm", "out.xlsb"] {
        let path = dir.path().join(name);
        let err = Table::append_to_file(&path, &record(&[("name", "Budi")])).unwrap_err();
        assert!(matches!(err, EnquiryError::Spreadsheet(_)));
        assert!(err.to_string().contains("use .xlsx or .csv"));
        assert!(!path.exists());
    }
}
