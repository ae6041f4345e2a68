//! Write options

/// Default `<v>` payload of formula cells. The formula result is never
/// computed here, so the opening application has to recalculate it.
pub const DEFAULT_FORMULA_PLACEHOLDER: &str =
    "litexl - open the workbook and save it to calculate formulas";

/// Options for writing XLSX packages
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// How to treat an existing file at the target path
    pub strategy: WriteStrategy,
    /// Compression used for newly written entries
    pub compression: Compression,
    /// How the `spans` attribute of `<row>` is computed
    pub spans: SpansMode,
    /// What the patcher does with existing sheets whose data changed
    pub existing_sheets: ExistingSheetPolicy,
    /// Value written in place of a formula's result
    pub formula_placeholder: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            strategy: WriteStrategy::Auto,
            compression: Compression::Deflated,
            spans: SpansMode::CellCount,
            existing_sheets: ExistingSheetPolicy::Regenerate,
            formula_placeholder: DEFAULT_FORMULA_PLACEHOLDER.to_string(),
        }
    }
}

impl WriteOptions {
    /// Set the write strategy
    pub fn strategy(mut self, strategy: WriteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the entry compression
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the row `spans` mode
    pub fn spans(mut self, spans: SpansMode) -> Self {
        self.spans = spans;
        self
    }

    /// Set the policy for edited existing sheets
    pub fn existing_sheets(mut self, policy: ExistingSheetPolicy) -> Self {
        self.existing_sheets = policy;
        self
    }

    /// Set the formula result placeholder
    pub fn formula_placeholder<S: Into<String>>(mut self, placeholder: S) -> Self {
        self.formula_placeholder = placeholder.into();
        self
    }

    pub(crate) fn file_options(&self) -> zip::write::SimpleFileOptions {
        let method = match self.compression {
            Compression::Stored => zip::CompressionMethod::Stored,
            Compression::Deflated => zip::CompressionMethod::Deflated,
        };
        zip::write::SimpleFileOptions::default().compression_method(method)
    }
}

/// Choice between creating a fresh package and patching an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// Patch when the target exists, create otherwise
    Auto,
    /// Always write a fresh package, replacing any existing file
    Create,
    /// Patch the existing file; fails if there is none
    Patch,
}

/// ZIP entry compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression
    Stored,
    /// Deflate
    Deflated,
}

/// How `<row spans="...">` is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpansMode {
    /// `1:<number of written cells>` (historic litexl output)
    CellCount,
    /// `<first column>:<last column>` of the written cells
    ColumnRange,
}

/// What the patcher does with a sheet that exists in both the package and
/// the database but whose cell data differs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingSheetPolicy {
    /// Re-render the worksheet part from the database (formatting is lost)
    Regenerate,
    /// Fail with [`crate::XlsxError::Unsupported`]
    Reject,
}
