//! End-to-end tests for patching existing XLSX files in place

use litexl::prelude::*;
use litexl::{ExistingSheetPolicy, XlsxPatcher};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Every entry of a package, decompressed
fn entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let bytes = std::fs::read(path).unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut map = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        map.insert(entry.name().to_string(), content);
    }
    map
}

fn text(entries: &BTreeMap<String, Vec<u8>>, name: &str) -> String {
    String::from_utf8(entries[name].clone()).unwrap()
}

fn sample() -> Database {
    let mut db = Database::new();
    let sheet = db.add_sheet("Data").unwrap();
    sheet.set_cell_value("A1", "id").unwrap();
    sheet.set_cell_value("B1", "label").unwrap();
    sheet.set_cell_value("A2", 1.0).unwrap();
    sheet.set_cell_value("B2", "first").unwrap();
    db
}

/// Adding a sheet writes exactly one new worksheet part and leaves existing parts alone
#[test]
fn test_patch_adds_sheet_and_keeps_existing_parts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");

    let mut db = sample();
    db.save(&path).unwrap();
    let before = entries(&path);

    let extra = db.add_sheet("Extra").unwrap();
    extra.set_cell_value("A1", "label").unwrap();
    extra.set_cell_value("A2", "second").unwrap();
    db.save(&path).unwrap();
    let after = entries(&path);

    let new_parts: Vec<&String> = after.keys().filter(|k| !before.contains_key(*k)).collect();
    assert_eq!(new_parts, vec!["xl/worksheets/sheet2.xml"]);
    assert_eq!(before["xl/worksheets/sheet1.xml"], after["xl/worksheets/sheet1.xml"]);
    assert_eq!(before["docProps/core.xml"], after["docProps/core.xml"]);
    assert_eq!(before["_rels/.rels"], after["_rels/.rels"]);

    // Existing indices are kept, only the new string is appended
    let sst = text(&after, "xl/sharedStrings.xml");
    assert!(sst.contains(concat!(
        "<si><t>id</t></si><si><t>label</t></si><si><t>first</t></si>",
        "<si><t>second</t></si></sst>"
    )));
    let sheet2 = text(&after, "xl/worksheets/sheet2.xml");
    assert!(sheet2.contains("<c r=\"A1\" t=\"s\"><v>1</v></c>"));
    assert!(sheet2.contains("<c r=\"A2\" t=\"s\"><v>3</v></c>"));

    assert_eq!(Database::open(&path).unwrap(), db);
}

/// With `Reject`, editing an existing sheet fails and leaves the file untouched
#[test]
fn test_patch_reject_leaves_target_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");

    let mut db = sample();
    db.save(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    db.sheet_mut("Data")
        .unwrap()
        .set_cell_value("B2", "changed")
        .unwrap();
    let options = WriteOptions::default().existing_sheets(ExistingSheetPolicy::Reject);
    let result = litexl::write_xlsx_with_options(&db, &path, &options);

    assert!(matches!(result, Err(XlsxError::Unsupported(_))));
    assert_eq!(std::fs::read(&path).unwrap(), before);
    // No temporary file is left behind
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

/// The default policy regenerates an edited sheet in place
#[test]
fn test_patch_regenerates_edited_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");

    let mut db = sample();
    db.add_sheet("Other").unwrap().set_cell(1, 1, 5.0).unwrap();
    db.save(&path).unwrap();
    let before = entries(&path);

    db.sheet_mut("Data")
        .unwrap()
        .set_cell_value("C3", "=A2*2")
        .unwrap();
    let summary = XlsxPatcher::patch(&db, &path, &WriteOptions::default()).unwrap();

    assert_eq!(summary.regenerated, vec!["Data"]);
    assert_eq!(summary.kept, vec!["Other"]);
    let after = entries(&path);
    assert_eq!(before["xl/worksheets/sheet2.xml"], after["xl/worksheets/sheet2.xml"]);
    assert!(text(&after, "xl/worksheets/sheet1.xml").contains("<f>A2*2</f>"));
    assert_eq!(Database::open(&path).unwrap(), db);
}

/// Sheets missing from the database are dropped from the package
#[test]
fn test_patch_removes_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");

    let mut db = sample();
    db.add_sheet("Scratch").unwrap().set_cell(1, 1, 1.0).unwrap();
    db.save(&path).unwrap();

    db.remove_sheet("Scratch").unwrap();
    db.save(&path).unwrap();

    let after = entries(&path);
    assert!(!after.contains_key("xl/worksheets/sheet2.xml"));
    assert!(!text(&after, "[Content_Types].xml").contains("sheet2.xml"));
    assert!(text(&after, "docProps/app.xml").contains("<vt:i4>1</vt:i4>"));
    assert_eq!(Database::open(&path).unwrap().sheet_names(), vec!["Data"]);
}

/// An unchanged database does not rewrite the file
#[test]
fn test_patch_without_changes_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.xlsx");

    let db = sample();
    db.save(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let summary = XlsxPatcher::patch(&db, &path, &WriteOptions::default()).unwrap();
    assert!(!summary.changed);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

const FOREIGN_CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    r#"<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
    r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#,
    r#"</Types>"#
);

const FOREIGN_WORKBOOK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<sheets><sheet name="Styled" sheetId="7" r:id="rId5"/></sheets><calcPr calcId="191029"/></workbook>"#
);

const FOREIGN_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    r#"<Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>"#,
    r#"<Relationship Id="rId6" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/>"#,
    r#"</Relationships>"#
);

const FOREIGN_SHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<sheetData><row r="1"><c r="A1" s="1"><v>12</v></c><c r="B1" s="1"><f>A1*2</f><v>24</v></c></row></sheetData>"#,
    r#"</worksheet>"#
);

const FOREIGN_STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"/></styleSheet>"#
);

fn write_foreign_package(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", FOREIGN_CONTENT_TYPES),
        ("xl/workbook.xml", FOREIGN_WORKBOOK),
        ("xl/_rels/workbook.xml.rels", FOREIGN_RELS),
        ("xl/worksheets/sheet1.xml", FOREIGN_SHEET),
        ("xl/styles.xml", FOREIGN_STYLES),
        ("xl/calcChain.xml", r#"<calcChain><c r="B1" i="7"/></calcChain>"#),
    ] {
        zip.start_file(name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Parts the database does not model survive a patch; the calculation chain is dropped
#[test]
fn test_patch_keeps_foreign_parts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.xlsx");
    write_foreign_package(&path);

    let mut db = Database::open(&path).unwrap();
    assert_eq!(
        db.sheet("Styled").unwrap().get_value("B1").unwrap(),
        &CellValue::String("=A1*2".into())
    );
    db.add_sheet("Notes").unwrap().set_cell_value("A1", "note").unwrap();
    db.save(&path).unwrap();

    let after = entries(&path);
    assert_eq!(text(&after, "xl/worksheets/sheet1.xml"), FOREIGN_SHEET);
    assert_eq!(text(&after, "xl/styles.xml"), FOREIGN_STYLES);
    assert!(!after.contains_key("xl/calcChain.xml"));
    assert!(after.contains_key("xl/worksheets/sheet2.xml"));

    let workbook = text(&after, "xl/workbook.xml");
    assert!(workbook.contains(concat!(
        r#"<sheets><sheet name="Styled" sheetId="7" r:id="rId1"/>"#,
        r#"<sheet name="Notes" sheetId="8" r:id="rId2"/></sheets>"#
    )));

    let rels = text(&after, "xl/_rels/workbook.xml.rels");
    assert!(rels.contains(r#"Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml""#));
    assert!(rels.contains(r#"Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml""#));
    assert!(rels.contains(r#"Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml""#));
    assert!(!rels.contains("calcChain"));

    let content_types = text(&after, "[Content_Types].xml");
    assert!(!content_types.contains("calcChain"));
    assert!(content_types.contains(r#"<Override PartName="/xl/worksheets/sheet2.xml""#));
    assert!(content_types.contains(r#"<Override PartName="/xl/sharedStrings.xml""#));
    assert!(content_types.contains(r#"<Override PartName="/xl/styles.xml""#));

    assert_eq!(Database::open(&path).unwrap(), db);
}

/// A target that is not a ZIP archive is reported and left as is
#[test]
fn test_patch_rejects_non_package() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"plain text").unwrap();

    let result = litexl::write_xlsx(&sample(), &path);
    assert!(matches!(result, Err(XlsxError::Zip(_))));
    assert_eq!(std::fs::read(&path).unwrap(), b"plain text");
}
