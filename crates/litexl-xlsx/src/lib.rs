//! # litexl-xlsx
//!
//! XLSX (Office Open XML) writer, in-place patcher and reader for litexl.
//!
//! Writing to a path that does not exist yet produces a fresh package.
//! Writing to an existing package patches it: untouched worksheet parts are
//! kept byte for byte, new sheets get new parts, and the workbook-level parts
//! are rewritten to match the database's sheet list.

pub mod error;
mod escape;
pub mod options;
pub mod patcher;
pub mod reader;
pub mod shared_strings;
pub mod writer;

pub use error::{XlsxError, XlsxResult};
pub use options::{
    Compression, ExistingSheetPolicy, SpansMode, WriteOptions, WriteStrategy,
    DEFAULT_FORMULA_PLACEHOLDER,
};
pub use patcher::{PatchSummary, XlsxPatcher};
pub use reader::{SheetKind, SheetRef, SheetRefMap, XlsxReader};
pub use shared_strings::SharedStringTable;
pub use writer::{parts, XlsxWriter};
