//! XLSX error types

use thiserror::Error;

/// Result type for XLSX operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur during XLSX reading, writing and patching
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// An existing package whose parts do not reference each other consistently
    #[error("Malformed package: {0}")]
    MalformedPackage(String),

    /// A patch scenario this crate refuses to perform
    #[error("Unsupported patch: {0}")]
    Unsupported(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] litexl_core::Error),
}

impl From<quick_xml::events::attributes::AttrError> for XlsxError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        XlsxError::Xml(quick_xml::Error::InvalidAttr(e))
    }
}

impl From<std::string::FromUtf8Error> for XlsxError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        XlsxError::Parse(format!("part is not valid UTF-8: {}", e))
    }
}
