//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The value stored in a cell
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")

mod address;
mod value;

pub use address::{address_to_index, index_to_address, CellAddress, CellRange};
pub use value::CellValue;
