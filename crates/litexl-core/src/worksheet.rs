//! Worksheet type

use std::collections::BTreeMap;

use crate::cell::{CellAddress, CellValue};
use crate::error::Result;

static EMPTY: CellValue = CellValue::Empty;

/// Cells of one row, keyed by 1-based column number
pub type RowCells = BTreeMap<u32, CellValue>;

/// A worksheet (single sheet in a database)
///
/// Storage is sparse and row-major: `BTreeMap<row, BTreeMap<col, CellValue>>`,
/// so iteration always yields rows and columns in ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Row number -> column map
    rows: BTreeMap<u32, RowCells>,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get a cell value by 1-based row and column
    ///
    /// Cells that were never set read as [`CellValue::Empty`].
    pub fn cell(&self, row: u32, col: u32) -> &CellValue {
        self.rows
            .get(&row)
            .and_then(|cells| cells.get(&col))
            .unwrap_or(&EMPTY)
    }

    /// Get a cell value by address string (e.g., "A1")
    pub fn get_value(&self, address: &str) -> Result<&CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cell(addr.row, addr.col))
    }

    // === Cell Modification ===

    /// Set a cell value by 1-based row and column
    ///
    /// Setting [`CellValue::Empty`] removes the cell. An empty string is kept
    /// as a sentinel: it counts towards [`Worksheet::size`] but is never written.
    pub fn set_cell<V: Into<CellValue>>(&mut self, row: u32, col: u32, value: V) -> Result<()> {
        CellAddress::new(row, col)?;
        let value = value.into();

        if value.is_empty() {
            if let Some(cells) = self.rows.get_mut(&row) {
                cells.remove(&col);
                if cells.is_empty() {
                    self.rows.remove(&row);
                }
            }
        } else {
            self.rows.entry(row).or_default().insert(col, value);
        }
        Ok(())
    }

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell(addr.row, addr.col, value)
    }

    /// Remove every cell
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    // === Extent & Iteration ===

    /// Current extent as (max row, max column); `(0, 0)` for an empty sheet
    pub fn size(&self) -> (u32, u32) {
        let max_row = self.rows.keys().next_back().copied().unwrap_or(0);
        let max_col = self
            .rows
            .values()
            .filter_map(|cells| cells.keys().next_back().copied())
            .max()
            .unwrap_or(0);
        (max_row, max_col)
    }

    /// Number of stored cells (including empty-string sentinels)
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|cells| cells.len()).sum()
    }

    /// Check if no cell is stored
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over populated rows in ascending row order
    pub fn iter_rows(&self) -> impl Iterator<Item = (u32, &RowCells)> {
        self.rows.iter().map(|(row, cells)| (*row, cells))
    }

    /// Iterate over stored cells in row-major order as (row, col, value)
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u32, &CellValue)> {
        self.rows
            .iter()
            .flat_map(|(row, cells)| cells.iter().map(move |(col, value)| (*row, *col, value)))
    }

    /// Dense copy of one row, from column 1 to the sheet's max column
    pub fn row(&self, row: u32) -> Vec<CellValue> {
        let (_, max_col) = self.size();
        (1..=max_col).map(|col| self.cell(row, col).clone()).collect()
    }

    /// Dense copy of one column, from row 1 to the sheet's max row
    pub fn col(&self, col: u32) -> Vec<CellValue> {
        let (max_row, _) = self.size();
        (1..=max_row).map(|row| self.cell(row, col).clone()).collect()
    }

    /// Compare the written content of two sheets, ignoring names and blank cells
    pub fn has_same_content(&self, other: &Worksheet) -> bool {
        let mine = self.iter_cells().filter(|(_, _, v)| !v.is_blank());
        let theirs = other.iter_cells().filter(|(_, _, v)| !v.is_blank());
        mine.eq(theirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_cell(1, 1, "hello").unwrap();
        sheet.set_cell_value("B3", 42.0).unwrap();

        assert_eq!(sheet.cell(1, 1).as_str(), Some("hello"));
        assert_eq!(sheet.get_value("B3").unwrap().as_number(), Some(42.0));
        assert!(sheet.cell(9, 9).is_empty());
        assert_eq!(sheet.name(), "Data");
    }

    #[test]
    fn test_rejects_zero_based_positions() {
        let mut sheet = Worksheet::new("Data");
        assert!(sheet.set_cell(0, 1, 1.0).is_err());
        assert!(sheet.set_cell(1, 0, 1.0).is_err());
        assert!(sheet.set_cell_value("A0", 1.0).is_err());
    }

    #[test]
    fn test_size() {
        let mut sheet = Worksheet::new("Data");
        assert_eq!(sheet.size(), (0, 0));

        sheet.set_cell(1, 1, 1.0).unwrap();
        assert_eq!(sheet.size(), (1, 1));

        sheet.set_cell(3, 2, 1.0).unwrap();
        sheet.set_cell(2, 5, "x").unwrap();
        assert_eq!(sheet.size(), (3, 5));
    }

    #[test]
    fn test_empty_string_counts_towards_size() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_cell(4, 4, "").unwrap();
        assert_eq!(sheet.size(), (4, 4));
        assert_eq!(sheet.cell_count(), 1);
    }

    #[test]
    fn test_setting_empty_removes() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_cell(2, 2, 5.0).unwrap();
        sheet.set_cell(2, 2, CellValue::Empty).unwrap();
        assert!(sheet.is_empty());
        assert_eq!(sheet.size(), (0, 0));
    }

    #[test]
    fn test_iteration_is_row_major() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_cell(2, 3, "c").unwrap();
        sheet.set_cell(1, 2, "b").unwrap();
        sheet.set_cell(2, 1, "a").unwrap();

        let cells: Vec<_> = sheet.iter_cells().map(|(r, c, _)| (r, c)).collect();
        assert_eq!(cells, vec![(1, 2), (2, 1), (2, 3)]);

        let rows: Vec<_> = sheet.iter_rows().map(|(r, cells)| (r, cells.len())).collect();
        assert_eq!(rows, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn test_dense_row_and_col() {
        let mut sheet = Worksheet::new("Data");
        sheet.set_cell(1, 1, 1.0).unwrap();
        sheet.set_cell(2, 3, "x").unwrap();

        assert_eq!(
            sheet.row(2),
            vec![CellValue::Empty, CellValue::Empty, CellValue::string("x")]
        );
        assert_eq!(sheet.col(1), vec![CellValue::Number(1.0), CellValue::Empty]);
    }

    #[test]
    fn test_same_content_ignores_blanks_and_names() {
        let mut a = Worksheet::new("A");
        a.set_cell(1, 1, "x").unwrap();
        a.set_cell(5, 5, "").unwrap();

        let mut b = Worksheet::new("B");
        b.set_cell(1, 1, "x").unwrap();

        assert!(a.has_same_content(&b));

        b.set_cell(1, 2, 2.0).unwrap();
        assert!(!a.has_same_content(&b));
    }
}
