//! In-memory working set of package entries

use std::io::{Read, Seek, Write};

use crate::error::{XlsxError, XlsxResult};
use crate::options::WriteOptions;

/// Every entry of a package, decompressed, in archive order
#[derive(Debug, Default)]
pub(crate) struct Package {
    entries: Vec<(String, Vec<u8>)>,
}

impl Package {
    /// Load every entry of an archive
    pub(crate) fn load<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            entries.push((name, bytes));
        }
        Ok(Self { entries })
    }

    pub(crate) fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub(crate) fn require(&self, name: &str) -> XlsxResult<&[u8]> {
        self.get(name)
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Replace an entry in place, or append it when new
    pub(crate) fn set<B: Into<Vec<u8>>>(&mut self, name: &str, bytes: B) {
        let bytes = bytes.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = bytes,
            None => self.entries.push((name.to_string(), bytes)),
        }
    }

    /// Remove an entry, returning whether it existed
    pub(crate) fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    /// Serialize every entry into a new archive
    pub(crate) fn write<W: Write + Seek>(&self, writer: W, options: &WriteOptions) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);
        let file_options = options.file_options();
        for (name, bytes) in &self.entries {
            zip.start_file(name.as_str(), file_options)?;
            zip.write_all(bytes)?;
        }
        zip.finish()?;
        Ok(())
    }
}

/// `dir/_rels/file.rels` for a part `dir/file`
pub(crate) fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_set_replaces_in_place() {
        let mut package = Package::default();
        package.set("a.xml", "1");
        package.set("b.xml", "2");
        package.set("a.xml", "3");

        assert_eq!(package.get("a.xml"), Some(&b"3"[..]));
        let names: Vec<&str> = package.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.xml", "b.xml"]);

        assert!(package.remove("a.xml"));
        assert!(!package.remove("a.xml"));
        assert!(!package.contains("a.xml"));
        assert!(matches!(package.require("a.xml"), Err(XlsxError::MissingPart(_))));
    }

    #[test]
    fn test_write_and_load_keep_order() {
        let mut package = Package::default();
        package.set("z.xml", "last letter");
        package.set("a.xml", "first letter");

        let mut buffer = Cursor::new(Vec::new());
        package.write(&mut buffer, &WriteOptions::default()).unwrap();

        let loaded = Package::load(Cursor::new(buffer.into_inner())).unwrap();
        let names: Vec<&str> = loaded.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["z.xml", "a.xml"]);
        assert_eq!(loaded.get("a.xml"), Some(&b"first letter"[..]));
    }

    #[test]
    fn test_rels_part_for() {
        assert_eq!(
            rels_part_for("xl/worksheets/sheet3.xml"),
            "xl/worksheets/_rels/sheet3.xml.rels"
        );
        assert_eq!(rels_part_for("book.xml"), "_rels/book.xml.rels");
    }
}
