//! # litexl-core
//!
//! In-memory table model for the litexl spreadsheet library.
//!
//! This crate provides the types the xlsx reader and writer operate on:
//! - [`Database`] - An ordered collection of named worksheets
//! - [`Worksheet`] - A sparse grid of cells addressed by 1-based (row, column)
//! - [`CellValue`] - Empty, numeric or string values (formulas are strings starting with `=`)
//! - [`CellAddress`] and [`CellRange`] - Conversion between (row, column) and "A1" notation
//!
//! ## Example
//!
//! ```rust
//! use litexl_core::{CellValue, Database};
//!
//! let mut db = Database::new();
//! let sheet = db.add_sheet("Sheet1").unwrap();
//!
//! // Using string addresses
//! sheet.set_cell_value("A1", "Hello").unwrap();
//! sheet.set_cell_value("B1", 42.0).unwrap();
//!
//! // Or using 1-based row/column indices
//! sheet.set_cell(2, 1, CellValue::formula("B1*2")).unwrap();
//!
//! assert_eq!(sheet.size(), (2, 2));
//! ```

pub mod cell;
pub mod database;
pub mod error;
pub mod worksheet;

pub use cell::{address_to_index, index_to_address, CellAddress, CellRange, CellValue};
pub use database::Database;
pub use error::{Error, Result};
pub use worksheet::{RowCells, Worksheet};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u32 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
