//! xlsx store adapter
//!
//! The store is a workbook with one ledger sheet. Rows are only ever
//! appended. Each new cell takes the style of the same column in the last
//! pre-existing row (or the header row), and the identifier and phone
//! columns are always written as text with the `@` number format.
//!
//! Writes go to a temporary file in the target directory which is then
//! renamed over the store, so a failed save leaves the previous file intact.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use umya_spreadsheet::{NumberingFormat, Spreadsheet, Style, Worksheet};

use crate::error::{Error, Result};
use crate::models::{TransactionRecord, COLUMNS, ID_COLUMN, PHONE_COLUMN, SHEET_NAME};

/// A single cell value as written to the store
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Empty,
}

/// Cell values of a record in [`COLUMNS`] order
pub fn record_cells(record: &TransactionRecord) -> [CellValue; 8] {
    let number = |v: Option<f64>| v.map(CellValue::Number).unwrap_or(CellValue::Empty);
    [
        CellValue::Text(record.merchant.clone()),
        CellValue::Text(record.show_date.to_string()),
        number(record.face_price),
        CellValue::Text(record.buyer_name.clone()),
        CellValue::Text(record.buyer_id.clone()),
        CellValue::Text(record.buyer_phone.clone()),
        CellValue::Number(f64::from(record.quantity)),
        number(record.sell_price),
    ]
}

fn is_text_column(col: u32) -> bool {
    col == ID_COLUMN || col == PHONE_COLUMN
}

fn write_cell(sheet: &mut Worksheet, col: u32, row: u32, value: &CellValue, style: Option<Style>) {
    let cell = sheet.get_cell_mut((col, row));
    match value {
        CellValue::Text(s) => {
            cell.set_value_string(s.clone());
        }
        CellValue::Number(n) => {
            cell.set_value_number(*n);
        }
        CellValue::Empty => {}
    }

    let mut style = style.unwrap_or_default();
    if is_text_column(col) {
        style
            .get_number_format_mut()
            .set_format_code(NumberingFormat::FORMAT_TEXT);
    }
    cell.set_style(style);
}

fn write_header(sheet: &mut Worksheet, columns: &[&str]) {
    for (i, name) in columns.iter().enumerate() {
        sheet
            .get_cell_mut((i as u32 + 1, 1))
            .set_value_string(name.to_string());
    }
}

/// Append-only xlsx ledger
#[derive(Debug, Clone)]
pub struct XlsxStore {
    path: PathBuf,
    sheet: String,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: SHEET_NAME.to_string(),
        }
    }

    pub fn with_sheet(path: impl Into<PathBuf>, sheet: &str) -> Self {
        Self {
            path: path.into(),
            sheet: sheet.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append records in order under the canonical header
    pub fn append(&self, records: &[TransactionRecord]) -> Result<usize> {
        self.append_with_columns(records, &COLUMNS)
    }

    /// Append records, using `columns` as the header when the sheet has to be
    /// created. Returns the number of rows written.
    pub fn append_with_columns(
        &self,
        records: &[TransactionRecord],
        columns: &[&str],
    ) -> Result<usize> {
        if records.is_empty() {
            debug!(path = %self.path.display(), "Nothing to append");
            return Ok(0);
        }

        let book = if self.exists() {
            self.append_to_existing(records, columns)?
        } else {
            self.create_new(records, columns)?
        };
        self.commit(&book)?;

        info!(
            path = %self.path.display(),
            rows = records.len(),
            "Appended rows to store"
        );
        Ok(records.len())
    }

    fn create_new(&self, records: &[TransactionRecord], columns: &[&str]) -> Result<Spreadsheet> {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        let sheet = book
            .new_sheet(self.sheet.as_str())
            .map_err(|e| Error::StoreWrite(format!("Failed to create sheet: {}", e)))?;

        write_header(sheet, columns);
        for (offset, record) in records.iter().enumerate() {
            let row = offset as u32 + 2;
            for (i, value) in record_cells(record).iter().enumerate() {
                write_cell(sheet, i as u32 + 1, row, value, None);
            }
        }

        debug!(path = %self.path.display(), "Created new store");
        Ok(book)
    }

    fn append_to_existing(
        &self,
        records: &[TransactionRecord],
        columns: &[&str],
    ) -> Result<Spreadsheet> {
        let mut book = umya_spreadsheet::reader::xlsx::read(&self.path).map_err(|e| {
            Error::StoreWrite(format!("Failed to open {}: {}", self.path.display(), e))
        })?;

        if book.get_sheet_by_name(&self.sheet).is_none() {
            let sheet = book
                .new_sheet(self.sheet.as_str())
                .map_err(|e| Error::StoreWrite(format!("Failed to create sheet: {}", e)))?;
            write_header(sheet, columns);
        }
        let sheet = book.get_sheet_by_name_mut(&self.sheet).ok_or_else(|| {
            Error::StoreWrite(format!("Sheet '{}' missing after creation", self.sheet))
        })?;

        let last_row = sheet.get_highest_row().max(1);
        let template_row = if last_row >= 2 { last_row } else { 1 };
        let templates: Vec<Option<Style>> = (1..=columns.len() as u32)
            .map(|col| sheet.get_cell((col, template_row)).map(|c| c.get_style().clone()))
            .collect();

        for (offset, record) in records.iter().enumerate() {
            let row = last_row + 1 + offset as u32;
            for (i, value) in record_cells(record).iter().enumerate() {
                let template = templates.get(i).cloned().flatten();
                write_cell(sheet, i as u32 + 1, row, value, template);
            }
        }

        debug!(
            template_row,
            first_new_row = last_row + 1,
            "Appending to existing store"
        );
        Ok(book)
    }

    /// Serialize to a sibling temp file and rename it over the store
    fn commit(&self, book: &Spreadsheet) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(".resale-")
            .suffix(".xlsx")
            .tempfile_in(&dir)
            .map_err(|e| Error::StoreWrite(format!("Failed to create temp file: {}", e)))?;

        umya_spreadsheet::writer::xlsx::write(book, tmp.path())
            .map_err(|e| Error::StoreWrite(format!("Failed to serialize workbook: {}", e)))?;

        tmp.persist(&self.path).map_err(|e| {
            Error::StoreWrite(format!(
                "Failed to replace {} (is it open elsewhere?): {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}
