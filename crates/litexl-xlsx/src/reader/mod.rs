//! XLSX reader

mod sheet_refs;

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::decode_excel_escapes;
use crate::writer::parts::part_name;
use litexl_core::{CellAddress, CellValue, Database, Worksheet};

pub use sheet_refs::{
    parse_relationships, parse_workbook_sheets, Relationship, SheetKind, SheetRef, SheetRefMap,
};
pub(crate) use sheet_refs::{attributes_of, resolve_target};

/// Read a whole entry into memory, `None` when the archive lacks it
pub(crate) fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> XlsxResult<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

fn require_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> XlsxResult<Vec<u8>> {
    read_entry(archive, name)?.ok_or_else(|| XlsxError::MissingPart(name.to_string()))
}

/// XLSX file reader
pub struct XlsxReader;

impl XlsxReader {
    /// Read a database from a file path
    pub fn read_file<P: AsRef<Path>>(path: P) -> XlsxResult<Database> {
        let file = File::open(path)?;
        Self::read(file)
    }

    /// Read a database from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Database> {
        let mut archive = zip::ZipArchive::new(reader)?;

        // Verify this is an XLSX file
        if archive.by_name(part_name::CONTENT_TYPES).is_err() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }

        let refs = Self::read_sheet_refs(&mut archive)?;
        let shared_strings = match read_entry(&mut archive, &refs.shared_strings_part())? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };

        let mut db = Database::new();
        for sheet_ref in refs.iter() {
            if !sheet_ref.kind.is_worksheet() {
                log::debug!("skipping {:?} '{}'", sheet_ref.kind, sheet_ref.name);
                continue;
            }
            let xml = require_entry(&mut archive, &sheet_ref.part)?;
            let sheet = parse_worksheet(&sheet_ref.name, &xml, &shared_strings)?;
            db.add_existing_sheet(sheet)?;
        }

        log::debug!(
            "read {} sheets and {} shared strings",
            db.sheet_count(),
            shared_strings.len()
        );
        Ok(db)
    }

    /// Read the shared strings table; an absent part is an empty table.
    ///
    /// The part is located through the workbook relationships, falling back
    /// to `xl/sharedStrings.xml`.
    pub fn read_shared_strings<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<Vec<String>> {
        let part = match read_entry(archive, part_name::WORKBOOK_RELS)? {
            Some(rels) => parse_relationships(&rels)?
                .iter()
                .find(|r| r.is_shared_strings())
                .map(|r| r.part_name()),
            None => None,
        }
        .unwrap_or_else(|| part_name::SHARED_STRINGS.to_string());

        match read_entry(archive, &part)? {
            Some(xml) => parse_shared_strings(&xml),
            None => Ok(Vec::new()),
        }
    }

    /// Read the sheet declarations of `xl/workbook.xml` and resolve their parts
    pub fn read_sheet_refs<R: Read + Seek>(
        archive: &mut zip::ZipArchive<R>,
    ) -> XlsxResult<SheetRefMap> {
        let workbook = require_entry(archive, part_name::WORKBOOK)?;
        let rels = require_entry(archive, part_name::WORKBOOK_RELS)?;
        SheetRefMap::from_parts(&workbook, &rels)
    }
}

/// Text of every `<si>` entry of a shared-strings part.
///
/// Rich-text runs are concatenated; phonetic runs (`<rPh>`) are skipped.
pub fn parse_shared_strings(xml: &[u8]) -> XlsxResult<Vec<String>> {
    let mut reader = Reader::from_reader(xml);

    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => {
                    strings.push(decode_excel_escapes(&current));
                    current.clear();
                    in_si = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(e) if in_t => current.push_str(&e.unescape()?),
            Event::CData(e) if in_t => {
                let text =
                    std::str::from_utf8(&e).map_err(|err| XlsxError::Parse(err.to_string()))?;
                current.push_str(text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Cell being assembled while its children are read
#[derive(Default)]
struct PendingCell {
    address: Option<String>,
    cell_type: Option<String>,
    value: String,
    formula: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum CellText {
    None,
    Value,
    Formula,
    Inline,
}

/// Parse the `<sheetData>` of a worksheet part into a [`Worksheet`]
pub fn parse_worksheet(name: &str, xml: &[u8], shared_strings: &[String]) -> XlsxResult<Worksheet> {
    let mut reader = Reader::from_reader(xml);

    let mut sheet = Worksheet::new(name);
    let mut buf = Vec::new();
    let mut current_row: u32 = 0;
    let mut last_col: u32 = 0;
    let mut cell: Option<PendingCell> = None;
    let mut text = CellText::None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                current_row += 1;
                last_col = 0;
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"r" {
                        current_row = attr.unescape_value()?.parse().map_err(|_| {
                            XlsxError::Parse(format!("invalid row number in sheet '{}'", name))
                        })?;
                    }
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let mut pending = PendingCell::default();
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.as_ref() {
                        b"r" => pending.address = Some(attr.unescape_value()?.into_owned()),
                        b"t" => pending.cell_type = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
                cell = Some(pending);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                // Styled but valueless cell; it still occupies its column
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"r" {
                        last_col = CellAddress::parse(&attr.unescape_value()?)?.col;
                    }
                }
            }
            Event::Start(e) if cell.is_some() => {
                text = match e.local_name().as_ref() {
                    b"v" => CellText::Value,
                    b"f" => {
                        if let Some(pending) = cell.as_mut() {
                            pending.formula.get_or_insert_with(String::new);
                        }
                        CellText::Formula
                    }
                    b"t" => CellText::Inline,
                    _ => text,
                };
            }
            Event::Text(e) if text != CellText::None => {
                if let Some(pending) = cell.as_mut() {
                    let unescaped = e.unescape()?;
                    match text {
                        CellText::Value | CellText::Inline => pending.value.push_str(&unescaped),
                        CellText::Formula => {
                            if let Some(f) = pending.formula.as_mut() {
                                f.push_str(&unescaped);
                            }
                        }
                        CellText::None => {}
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"f" | b"t" => text = CellText::None,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let (row, col) = match pending.address.as_deref() {
                            Some(address) => {
                                let addr = CellAddress::parse(address)?;
                                (addr.row, addr.col)
                            }
                            None => (current_row, last_col + 1),
                        };
                        last_col = col;
                        let value = cell_value(pending, shared_strings)?;
                        if !value.is_blank() {
                            sheet.set_cell(row, col, value)?;
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheet)
}

fn cell_value(pending: PendingCell, shared_strings: &[String]) -> XlsxResult<CellValue> {
    if let Some(formula) = pending.formula {
        if !formula.is_empty() {
            return Ok(CellValue::formula(decode_excel_escapes(&formula)));
        }
    }

    let raw = pending.value;
    let value = match pending.cell_type.as_deref() {
        Some("s") => {
            let idx: usize = raw.trim().parse().map_err(|_| {
                XlsxError::Parse(format!("invalid shared string index '{}'", raw))
            })?;
            let s = shared_strings.get(idx).ok_or_else(|| {
                XlsxError::Parse(format!(
                    "shared string index {} out of range ({} entries)",
                    idx,
                    shared_strings.len()
                ))
            })?;
            CellValue::String(s.clone())
        }
        Some("str") | Some("inlineStr") => CellValue::String(decode_excel_escapes(&raw)),
        Some("b") => CellValue::Number(if raw.trim() == "1" { 1.0 } else { 0.0 }),
        Some("e") => CellValue::String(raw),
        _ if raw.is_empty() => CellValue::Empty,
        _ => match raw.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::String(raw),
        },
    };
    Ok(value)
}
