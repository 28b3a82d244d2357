use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::anyhow;

use crate::error::SveaError;

/// Spreadsheet-style cell coordinate (`B3` is column 2, row 3; both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    row: u32,
    column: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        debug_assert!(column >= 1 && row >= 1, "cell coordinates are 1-based");
        Self { row, column }
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn row(&self) -> u32 {
        self.row
    }

    pub fn column_letters(&self) -> String {
        let mut letters = Vec::new();
        let mut remaining = self.column;
        while remaining > 0 {
            let offset = ((remaining - 1) % 26) as u8;
            letters.push((b'A' + offset) as char);
            remaining = (remaining - 1) / 26;
        }
        letters.iter().rev().collect()
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letters(), self.row)
    }
}

impl FromStr for CellRef {
    type Err = SveaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let split = text
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(text.len());
        let (letters, digits) = text.split_at(split);
        if letters.is_empty()
            || letters.len() > 3
            || !letters.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(SveaError::dtype(format!("invalid cell reference '{text}'")));
        }
        let row: u32 = digits
            .parse()
            .map_err(|_| SveaError::dtype(format!("invalid cell reference '{text}'")))?;
        if row == 0 {
            return Err(SveaError::dtype(format!("invalid cell reference '{text}'")));
        }
        let column = letters
            .to_ascii_uppercase()
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b - b'A' + 1));
        Ok(Self::new(column, row))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Worksheet {
    cells: BTreeMap<CellRef, String>,
}

impl Worksheet {
    pub fn get(&self, cell: CellRef) -> Option<&str> {
        self.cells.get(&cell).map(String::as_str)
    }

    pub fn set(&mut self, cell: CellRef, value: impl Into<String>) {
        self.cells.insert(cell, value.into());
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &str)> {
        self.cells.iter().map(|(cell, value)| (*cell, value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Last used row and last used column, or `None` for an empty sheet.
    pub fn extent(&self) -> Option<(u32, u32)> {
        let last_row = self.cells.keys().map(CellRef::row).max()?;
        let last_column = self.cells.keys().map(CellRef::column).max()?;
        Some((last_row, last_column))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    sheets: Vec<(String, Worksheet)>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet(mut self, name: &str, sheet: Worksheet) -> Self {
        *self.add_sheet(name) = sheet;
        self
    }

    /// Returns the named sheet, appending an empty one if needed.
    pub fn add_sheet(&mut self, name: &str) -> &mut Worksheet {
        let index = match self.sheets.iter().position(|(existing, _)| existing == name) {
            Some(index) => index,
            None => {
                self.sheets.push((name.to_string(), Worksheet::default()));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index].1
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Worksheet> {
        self.sheets
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, sheet)| sheet)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Worksheet> {
        self.sheets
            .iter_mut()
            .find(|(existing, _)| existing == name)
            .map(|(_, sheet)| sheet)
    }
}

/// Reads and writes workbooks by path. The file encoding lives behind this
/// trait.
pub trait SpreadsheetStore {
    fn load(&self, path: &Path) -> anyhow::Result<Workbook>;
    fn save(&self, path: &Path, workbook: &Workbook) -> anyhow::Result<()>;
}

/// Workbooks keyed by path, held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySpreadsheetStore {
    books: Arc<Mutex<HashMap<PathBuf, Workbook>>>,
}

impl MemorySpreadsheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, workbook: Workbook) {
        self.books().insert(path.into(), workbook);
    }

    pub fn get(&self, path: &Path) -> Option<Workbook> {
        self.books().get(path).cloned()
    }

    fn books(&self) -> MutexGuard<'_, HashMap<PathBuf, Workbook>> {
        self.books.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SpreadsheetStore for MemorySpreadsheetStore {
    fn load(&self, path: &Path) -> anyhow::Result<Workbook> {
        self.get(path)
            .ok_or_else(|| anyhow!("no workbook stored at {}", path.display()))
    }

    fn save(&self, path: &Path, workbook: &Workbook) -> anyhow::Result<()> {
        self.insert(path, workbook.clone());
        Ok(())
    }
}
