//! # litexl
//!
//! Write a small in-memory database of sheets, rows and cells to XLSX.
//!
//! - New paths get a complete, minimal package
//! - Existing packages are patched in place: sheets whose data did not
//!   change keep their parts (and formatting) untouched
//! - Strings are de-duplicated through a shared-string table
//! - Strings starting with `=` are written as formulas
//!
//! ## Example
//!
//! ```rust,no_run
//! use litexl::prelude::*;
//!
//! let mut db = Database::new();
//! let sheet = db.add_sheet("Sheet1").unwrap();
//! sheet.set_cell_value("A1", "hello").unwrap();
//! sheet.set_cell_value("B1", 42.0).unwrap();
//! sheet.set_cell_value("C1", "=B1*2").unwrap();
//!
//! db.save("output.xlsx").unwrap();
//! ```

pub mod prelude;

// Re-export core types
pub use litexl_core::{
    address_to_index, index_to_address, CellAddress, CellRange, CellValue, Database, Error,
    Result, RowCells, Worksheet, MAX_COLS, MAX_ROWS, MAX_SHEET_NAME_LEN,
};

// Re-export I/O types
pub use litexl_xlsx::{
    parts, Compression, ExistingSheetPolicy, PatchSummary, SharedStringTable, SpansMode,
    WriteOptions, WriteStrategy, XlsxError, XlsxPatcher, XlsxReader, XlsxResult, XlsxWriter,
    DEFAULT_FORMULA_PLACEHOLDER,
};

use std::path::Path;

/// Write `db` to `path`, patching the file when it already exists
pub fn write_xlsx<P: AsRef<Path>>(db: &Database, path: P) -> XlsxResult<()> {
    XlsxWriter::write_file(db, path)
}

/// Write `db` to `path` with explicit options
pub fn write_xlsx_with_options<P: AsRef<Path>>(
    db: &Database,
    path: P,
    options: &WriteOptions,
) -> XlsxResult<()> {
    XlsxWriter::write_file_with_options(db, path, options)
}

/// Read the cell data of every sheet of the package at `path`
pub fn read_xlsx<P: AsRef<Path>>(path: P) -> XlsxResult<Database> {
    XlsxReader::read_file(path)
}

/// Extension trait for Database to add file I/O
pub trait DatabaseExt {
    /// Open a database from an XLSX file
    fn open<P: AsRef<Path>>(path: P) -> Result<Database>;

    /// Save the database to an XLSX file
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => Ok(()),
        _ => Err(Error::other(format!(
            "Unsupported file format: {}",
            path.display()
        ))),
    }
}

impl DatabaseExt for Database {
    fn open<P: AsRef<Path>>(path: P) -> Result<Database> {
        let path = path.as_ref();
        check_extension(path)?;
        read_xlsx(path).map_err(|e| Error::other(e.to_string()))
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        check_extension(path)?;
        write_xlsx(self, path).map_err(|e| Error::other(e.to_string()))
    }
}
