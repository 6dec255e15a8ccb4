//! A table of string cells read from and written to `.xlsx`/`.csv` files.

use crate::errors::EnquiryError;
use calamine::Reader;
use indexmap::IndexMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    /// Any workbook calamine can read
    Workbook,
    /// The only workbook format that can be written
    Xlsx,
    Csv,
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn format_of(path: &Path) -> Result<Format, EnquiryError> {
    match extension(path).as_str() {
        "xlsx" => Ok(Format::Xlsx),
        "xlsm" | "xls" | "xlsb" | "ods" => Ok(Format::Workbook),
        "csv" => Ok(Format::Csv),
        _ => Err(EnquiryError::Spreadsheet(format!(
            "Unsupported file type for {}; use .xlsx or .csv",
            path.display()
        ))),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Reads the first sheet (or the CSV file); the first row holds the headers.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, EnquiryError> {
        let path = path.as_ref();
        let mut lines = match format_of(path)? {
            Format::Workbook | Format::Xlsx => read_workbook(path)?,
            Format::Csv => read_csv(path)?,
        }
        .into_iter();

        let headers: Vec<String> = lines
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();
        let width = headers.len();
        let rows = lines
            .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
            .map(|mut row| {
                row.resize(width.max(row.len()), String::new());
                row
            })
            .collect::<Vec<_>>();
        debug!(path = %path.display(), columns = width, rows = rows.len(), "Read table");
        Ok(Self { headers, rows })
    }

    /// Writes `.xlsx` or `.csv`. Other workbook formats are read-only and are
    /// rejected before anything on disk is touched.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), EnquiryError> {
        let path = path.as_ref();
        let format = format_of(path)?;
        if format == Format::Workbook {
            return Err(EnquiryError::Spreadsheet(format!(
                "Cannot write .{} files ({}); use .xlsx or .csv",
                extension(path),
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match format {
            Format::Csv => self.write_csv(path),
            _ => self.write_xlsx(path),
        }
    }

    fn write_xlsx(&self, path: &Path) -> Result<(), EnquiryError> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, header) in self.headers.iter().enumerate() {
            sheet.write_string(0, column(c)?, header)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            let r = u32::try_from(r + 1)
                .map_err(|_| EnquiryError::Spreadsheet("Too many rows".to_string()))?;
            for (c, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    sheet.write_string(r, column(c)?, cell)?;
                }
            }
        }
        workbook.save(path)?;
        Ok(())
    }

    fn write_csv(&self, path: &Path) -> Result<(), EnquiryError> {
        let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `row`/`col`, empty when the row is shorter.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Replaces the column called `name`, appending it when absent.
    ///
    /// Missing values are written as empty cells.
    pub fn set_column(&mut self, name: &str, values: &[String]) {
        let col = match self.column_index(name) {
            Some(col) => col,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };
        for (i, row) in self.rows.iter_mut().enumerate() {
            if row.len() <= col {
                row.resize(col + 1, String::new());
            }
            row[col] = values.get(i).cloned().unwrap_or_default();
        }
    }

    /// Appends a row, adding a column for every unknown key.
    pub fn append_record(&mut self, record: &IndexMap<String, String>) {
        for key in record.keys() {
            if self.column_index(key).is_none() {
                self.headers.push(key.clone());
            }
        }
        let row = self
            .headers
            .iter()
            .map(|h| record.get(h).cloned().unwrap_or_default())
            .collect();
        self.rows.push(row);
    }

    /// Rows as header-to-value maps.
    pub fn records(&self) -> Vec<IndexMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .enumerate()
                    .map(|(i, h)| (h.clone(), row.get(i).cloned().unwrap_or_default()))
                    .collect()
            })
            .collect()
    }

    /// Adds `record` as the last row of the file at `path`, creating the file if needed.
    pub fn append_to_file(
        path: impl AsRef<Path>,
        record: &IndexMap<String, String>,
    ) -> Result<Table, EnquiryError> {
        let path = path.as_ref();
        let mut table = if path.exists() {
            Table::read(path)?
        } else {
            Table::default()
        };
        table.append_record(record);
        table.write(path)?;
        Ok(table)
    }
}

fn column(c: usize) -> Result<u16, EnquiryError> {
    u16::try_from(c).map_err(|_| EnquiryError::Spreadsheet("Too many columns".to_string()))
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>, EnquiryError> {
    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            EnquiryError::Spreadsheet(format!("{} contains no worksheet", path.display()))
        })??;
    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect())
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>, EnquiryError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut lines = Vec::new();
    for record in reader.records() {
        lines.push(record?.iter().map(str::to_string).collect());
    }
    Ok(lines)
}
