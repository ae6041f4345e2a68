//! Prelude module - common imports for litexl users
//!
//! ```rust
//! use litexl::prelude::*;
//! ```

pub use crate::{
    CellAddress,
    CellRange,
    CellValue,
    Database,
    // Extension traits
    DatabaseExt,
    Error,
    Result,
    WriteOptions,
    WriteStrategy,
    Worksheet,
    XlsxError,
    // I/O types
    XlsxReader,
    XlsxWriter,
};
