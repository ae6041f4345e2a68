//! Cross references between `xl/workbook.xml` and its relationships part

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::writer::parts::part_name;

/// One `<Relationship>` of a relationships part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// `Id`
    pub id: String,
    /// `Type` URI
    pub rel_type: String,
    /// `Target` as written in the part
    pub target: String,
    /// Every attribute in document order, `Id` included
    pub attributes: Vec<(String, String)>,
}

impl Relationship {
    /// Whether this relationship points at a worksheet
    pub fn is_worksheet(&self) -> bool {
        self.rel_type.ends_with("/worksheet")
    }

    /// Whether this relationship points at the shared-strings part
    pub fn is_shared_strings(&self) -> bool {
        self.rel_type.ends_with("/sharedStrings")
    }

    /// Whether this relationship points at the calculation chain
    pub fn is_calc_chain(&self) -> bool {
        self.rel_type.ends_with("/calcChain")
    }

    /// Kind of sheet this relationship backs, `None` for non-sheet parts
    pub fn sheet_kind(&self) -> Option<SheetKind> {
        let suffix = self.rel_type.rsplit('/').next().unwrap_or_default();
        match suffix {
            "worksheet" => Some(SheetKind::Worksheet),
            "chartsheet" => Some(SheetKind::Chartsheet),
            "dialogsheet" => Some(SheetKind::Dialogsheet),
            "xlMacrosheet" | "xlIntlMacrosheet" => Some(SheetKind::Macrosheet),
            _ => None,
        }
    }

    /// Package part name of an internal target, resolved against `xl/`
    pub fn part_name(&self) -> String {
        resolve_target(&self.target)
    }

    /// Attributes with `Id` replaced by `new_id`
    pub fn attributes_with_id(&self, new_id: &str) -> Vec<(String, String)> {
        self.attributes
            .iter()
            .map(|(k, v)| {
                if k == "Id" {
                    (k.clone(), new_id.to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }
}

/// Resolve a workbook relationship target to a package part name
pub(crate) fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// What a `<sheet>` entry of the workbook is backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    /// Cell grid (`/worksheet`)
    Worksheet,
    /// Full-page chart (`/chartsheet`)
    Chartsheet,
    /// Excel 5 dialog sheet
    Dialogsheet,
    /// Excel 4 macro sheet, international or not
    Macrosheet,
}

impl SheetKind {
    /// Whether cells of this sheet can be read and written
    pub fn is_worksheet(self) -> bool {
        self == SheetKind::Worksheet
    }
}

/// A sheet as the package declares it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    /// Sheet name from `<sheet name>`
    pub name: String,
    /// Kind of the backing part; only worksheets carry database cells
    pub kind: SheetKind,
    /// `sheetId`
    pub sheet_id: u32,
    /// `r:id`
    pub r_id: String,
    /// Backing part, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
    /// Every attribute of the `<sheet>` element in document order
    pub attributes: Vec<(String, String)>,
}

/// Map from sheet names to their relationship ids and backing parts
#[derive(Debug, Clone, Default)]
pub struct SheetRefMap {
    sheets: Vec<SheetRef>,
    relationships: Vec<Relationship>,
}

impl SheetRefMap {
    /// Build the map from the raw workbook and workbook-relationships parts.
    ///
    /// Chart, dialog and macro sheets are kept with their [`SheetKind`].
    /// Fails with [`XlsxError::MalformedPackage`] when a sheet points at a
    /// missing or non-sheet relationship, or when names or parts repeat.
    pub fn from_parts(workbook_xml: &[u8], rels_xml: &[u8]) -> XlsxResult<Self> {
        let relationships = parse_relationships(rels_xml)?;
        let declared = parse_workbook_sheets(workbook_xml)?;

        let mut names = HashSet::new();
        let mut parts = HashSet::new();
        let mut sheets = Vec::with_capacity(declared.len());

        for attributes in declared {
            let get = |key: &str| {
                attributes
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            };
            let name = get("name").ok_or_else(|| {
                XlsxError::MalformedPackage("<sheet> without a name".into())
            })?;
            let r_id = get("r:id").ok_or_else(|| {
                XlsxError::MalformedPackage(format!("sheet '{}' has no r:id", name))
            })?;
            let sheet_id = get("sheetId")
                .and_then(|v| v.parse::<u32>().ok())
                .ok_or_else(|| {
                    XlsxError::MalformedPackage(format!("sheet '{}' has no valid sheetId", name))
                })?;

            let rel = relationships
                .iter()
                .find(|r| r.id == r_id)
                .ok_or_else(|| {
                    XlsxError::MalformedPackage(format!(
                        "sheet '{}' refers to unknown relationship {}",
                        name, r_id
                    ))
                })?;
            let kind = rel.sheet_kind().ok_or_else(|| {
                XlsxError::MalformedPackage(format!(
                    "relationship {} of sheet '{}' is not a sheet",
                    r_id, name
                ))
            })?;

            let part = rel.part_name();
            if !names.insert(name.to_lowercase()) {
                return Err(XlsxError::MalformedPackage(format!(
                    "sheet name '{}' is declared twice",
                    name
                )));
            }
            if !parts.insert(part.clone()) {
                return Err(XlsxError::MalformedPackage(format!(
                    "part {} backs more than one sheet",
                    part
                )));
            }

            sheets.push(SheetRef {
                name,
                kind,
                sheet_id,
                r_id,
                part,
                attributes,
            });
        }

        Ok(Self {
            sheets,
            relationships,
        })
    }

    /// Sheet by exact name
    pub fn get(&self, name: &str) -> Option<&SheetRef> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Sheets in workbook order
    pub fn iter(&self) -> impl Iterator<Item = &SheetRef> {
        self.sheets.iter()
    }

    /// Number of declared sheets
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Check if no sheet is declared
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Every relationship of the workbook part, in document order
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationship by id
    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// Number of declared worksheets
    pub fn worksheet_count(&self) -> usize {
        self.sheets.iter().filter(|s| s.kind.is_worksheet()).count()
    }

    /// Part name of the shared-strings table, `xl/sharedStrings.xml` unless
    /// the relationships say otherwise
    pub fn shared_strings_part(&self) -> String {
        self.relationships
            .iter()
            .find(|r| r.is_shared_strings())
            .map(|r| r.part_name())
            .unwrap_or_else(|| part_name::SHARED_STRINGS.to_string())
    }

    /// Highest `sheetId` in use, 0 without sheets
    pub fn max_sheet_id(&self) -> u32 {
        self.sheets.iter().map(|s| s.sheet_id).max().unwrap_or(0)
    }
}

pub(crate) fn attributes_of(e: &BytesStart<'_>) -> XlsxResult<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())?;
        let value = attr.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Every `<Relationship>` of a relationships part
pub fn parse_relationships(xml: &[u8]) -> XlsxResult<Vec<Relationship>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut rels = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) | Event::Start(e) if e.local_name().as_ref() == b"Relationship" => {
                let attributes = attributes_of(&e)?;
                let get = |key: &str| {
                    attributes
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.clone())
                };
                match (get("Id"), get("Type"), get("Target")) {
                    (Some(id), Some(rel_type), Some(target)) => rels.push(Relationship {
                        id,
                        rel_type,
                        target,
                        attributes,
                    }),
                    _ => {
                        return Err(XlsxError::MalformedPackage(
                            "relationship without Id, Type or Target".into(),
                        ))
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Attributes of every `<sheet>` inside `<sheets>` of a workbook part
pub fn parse_workbook_sheets(xml: &[u8]) -> XlsxResult<Vec<Vec<(String, String)>>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut in_sheets = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"sheets" => in_sheets = true,
            Event::End(e) if e.local_name().as_ref() == b"sheets" => in_sheets = false,
            Event::Empty(e) | Event::Start(e)
                if in_sheets && e.local_name().as_ref() == b"sheet" =>
            {
                sheets.push(attributes_of(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}
