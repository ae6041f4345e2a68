//! XLSX writer

pub mod parts;
mod worksheet;
pub(crate) mod xml;

use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use litexl_core::Database;

use crate::error::{XlsxError, XlsxResult};
use crate::options::{WriteOptions, WriteStrategy};
use crate::patcher::XlsxPatcher;
pub use parts::PackageParts;
pub use worksheet::{dimension_ref, worksheet_xml};

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a database to a file path.
    ///
    /// An existing file is patched in place; otherwise a fresh package is created.
    pub fn write_file<P: AsRef<Path>>(db: &Database, path: P) -> XlsxResult<()> {
        Self::write_file_with_options(db, path, &WriteOptions::default())
    }

    /// Write a database to a file path with explicit options
    pub fn write_file_with_options<P: AsRef<Path>>(
        db: &Database,
        path: P,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        let path = path.as_ref();
        let exists = path.exists();

        match (options.strategy, exists) {
            (WriteStrategy::Auto, true) | (WriteStrategy::Patch, true) => {
                log::info!("patching existing workbook {}", path.display());
                XlsxPatcher::patch(db, path, options).map(|_| ())
            }
            (WriteStrategy::Patch, false) => Err(XlsxError::MissingPart(format!(
                "cannot patch {}: file does not exist",
                path.display()
            ))),
            (WriteStrategy::Auto, false) | (WriteStrategy::Create, _) => {
                log::debug!("creating new workbook {}", path.display());
                let parts = PackageParts::render(db, options)?;
                let file = File::create(path)?;
                Self::write_parts(&parts, file, options)
            }
        }
    }

    /// Write a fresh package to a writer
    pub fn write<W: Write + Seek>(db: &Database, writer: W) -> XlsxResult<()> {
        Self::write_with_options(db, writer, &WriteOptions::default())
    }

    /// Write a fresh package to a writer with explicit options
    pub fn write_with_options<W: Write + Seek>(
        db: &Database,
        writer: W,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        // Render everything before touching the sink
        let parts = PackageParts::render(db, options)?;
        Self::write_parts(&parts, writer, options)
    }

    fn write_parts<W: Write + Seek>(
        parts: &PackageParts,
        writer: W,
        options: &WriteOptions,
    ) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);
        let file_options = options.file_options();
        for (name, content) in &parts.entries {
            zip.start_file(name.as_str(), file_options)?;
            zip.write_all(content.as_bytes())?;
        }
        zip.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Compression;
    use std::io::{Cursor, Read};

    fn sample() -> Database {
        let mut db = Database::new();
        let sheet = db.add_sheet("Sheet1").unwrap();
        sheet.set_cell(1, 1, "hello").unwrap();
        sheet.set_cell(2, 1, 3.5).unwrap();
        db
    }

    fn entry_names(bytes: Vec<u8>) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_write_entry_order() {
        let mut buffer = Cursor::new(Vec::new());
        XlsxWriter::write(&sample(), &mut buffer).unwrap();

        assert_eq!(
            entry_names(buffer.into_inner()),
            vec![
                "_rels/.rels",
                "docProps/app.xml",
                "docProps/core.xml",
                "xl/workbook.xml",
                "xl/worksheets/sheet1.xml",
                "xl/sharedStrings.xml",
                "xl/_rels/workbook.xml.rels",
                "[Content_Types].xml",
            ]
        );
    }

    #[test]
    fn test_write_stored_entries() {
        let mut buffer = Cursor::new(Vec::new());
        let options = WriteOptions::default().compression(Compression::Stored);
        XlsxWriter::write_with_options(&sample(), &mut buffer, &options).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(buffer.into_inner())).unwrap();
        let mut entry = archive.by_name("xl/sharedStrings.xml").unwrap();
        assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert!(content.contains("<si><t>hello</t></si>"));
    }

    #[test]
    fn test_write_empty_database_fails() {
        let mut buffer = Cursor::new(Vec::new());
        let result = XlsxWriter::write(&Database::new(), &mut buffer);
        assert!(matches!(result, Err(XlsxError::InvalidFormat(_))));
        assert!(buffer.into_inner().is_empty());
    }

    #[test]
    fn test_patch_strategy_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.xlsx");
        let options = WriteOptions::default().strategy(WriteStrategy::Patch);

        let result = XlsxWriter::write_file_with_options(&sample(), &path, &options);
        assert!(matches!(result, Err(XlsxError::MissingPart(_))));
        assert!(!path.exists());
    }

    #[test]
    fn test_create_strategy_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();

        let options = WriteOptions::default().strategy(WriteStrategy::Create);
        XlsxWriter::write_file_with_options(&sample(), &path, &options).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(entry_names(bytes).contains(&"xl/workbook.xml".to_string()));
    }
}
