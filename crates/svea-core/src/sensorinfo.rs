use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{Result, SveaError};
use crate::spreadsheet::{CellRef, SpreadsheetStore, Worksheet};

pub const SENSORINFO_SHEET: &str = "Sensorinfo";

/// Rows occupied by the header block of the Sensorinfo sheet.
pub const HEADER_ROWS: u32 = 2;
/// Column `B`; column `A` carries row labels in the template.
pub const FIRST_VALUE_COLUMN: u32 = 2;

/// Sensor rows keyed by the cell they occupy in the Sensorinfo sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorInfo {
    cells: BTreeMap<CellRef, String>,
}

impl SensorInfo {
    pub fn load_txt(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| SveaError::io(path, err))?;
        let info = Self::from_txt_bytes(&bytes)?;
        debug!(cells = info.len(), "sensor info loaded from {}", path.display());
        Ok(info)
    }

    /// Tab-separated rows without a header line. Field `c` of line `r`
    /// (0-based) lands in column `B + c`, row `r + 3`. A blank line still
    /// occupies its row and clears column `B` there.
    pub fn from_txt_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(bytes);

        let mut cells = BTreeMap::new();
        let mut next_line: u64 = 1;
        for record in reader.byte_records() {
            let record = record?;
            let line = source_line(bytes, record.position(), next_line);
            for blank in next_line..line {
                let cell = CellRef::new(FIRST_VALUE_COLUMN, row_for_line(blank));
                cells.insert(cell, String::new());
            }
            next_line = line + 1;

            let row = row_for_line(line);
            for (column_index, field) in record.iter().enumerate() {
                let cell = CellRef::new(FIRST_VALUE_COLUMN + column_index as u32, row);
                cells.insert(cell, String::from_utf8_lossy(field).into_owned());
            }
        }
        Ok(Self { cells })
    }

    pub fn load_sheet(store: &dyn SpreadsheetStore, path: &Path, sheet_name: &str) -> Result<Self> {
        let workbook = store
            .load(path)
            .map_err(|err| SveaError::collaborator("spreadsheet store", err))?;
        let Some(sheet) = workbook.sheet(sheet_name) else {
            return Err(SveaError::path(format!(
                "No worksheet named {sheet_name} in file {}",
                path.display()
            )));
        };
        let info = Self::from_worksheet(sheet);
        debug!(
            cells = info.len(),
            "sensor info loaded from sheet {sheet_name} in {}",
            path.display()
        );
        Ok(info)
    }

    /// Every cell of the used range below the header and right of column
    /// `A`. Empty cells come through as empty strings so they clear the
    /// target.
    pub fn from_worksheet(sheet: &Worksheet) -> Self {
        let mut cells = BTreeMap::new();
        let Some((last_row, last_column)) = sheet.extent() else {
            return Self { cells };
        };
        for row in HEADER_ROWS + 1..=last_row {
            for column in FIRST_VALUE_COLUMN..=last_column {
                let cell = CellRef::new(column, row);
                let value = sheet.get(cell).unwrap_or_default();
                cells.insert(cell, value.to_string());
            }
        }
        Self { cells }
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &str)> {
        self.cells.iter().map(|(cell, value)| (*cell, value.as_str()))
    }

    pub fn get(&self, cell: CellRef) -> Option<&str> {
        self.cells.get(&cell).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn write_into(&self, sheet: &mut Worksheet) {
        for (cell, value) in &self.cells {
            sheet.set(*cell, value.clone());
        }
    }
}

/// 1-based line of a record. The reader skips empty lines silently and
/// reports where its scan began, so the line terminators at that offset are
/// the skipped lines.
fn source_line(bytes: &[u8], position: Option<&csv::Position>, fallback: u64) -> u64 {
    let Some(position) = position else {
        return fallback;
    };
    let start = usize::try_from(position.byte()).unwrap_or(usize::MAX);
    let skipped = bytes
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|byte| matches!(byte, b'\r' | b'\n'))
        .filter(|byte| **byte == b'\n')
        .count() as u64;
    position.line() + skipped
}

fn row_for_line(line: u64) -> u32 {
    HEADER_ROWS + line as u32
}
