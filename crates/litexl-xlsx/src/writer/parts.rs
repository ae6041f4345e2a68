//! Package-level part generators and the rendering pipeline.
//!
//! Each generator is a pure function of the sheet names (plus, for the
//! relationship and content-type parts, whether any shared string exists).
//! [`PackageParts::render`] fixes the order in which they run: every
//! worksheet first, since worksheets are the only producer of shared strings.

use litexl_core::Database;

use super::worksheet::worksheet_xml;
use super::xml::XmlBuilder;
use crate::error::{XlsxError, XlsxResult};
use crate::escape::encode_excel_escapes;
use crate::options::WriteOptions;
use crate::shared_strings::SharedStringTable;

/// Namespace URIs
pub(crate) mod ns {
    pub const MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    pub const OFFICE_REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    pub const PACKAGE_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
    pub const CONTENT_TYPES: &str =
        "http://schemas.openxmlformats.org/package/2006/content-types";
    pub const MARKUP_COMPAT: &str =
        "http://schemas.openxmlformats.org/markup-compatibility/2006";
    pub const X14AC: &str = "http://schemas.microsoft.com/office/spreadsheetml/2009/9/ac";
    pub const X15: &str = "http://schemas.microsoft.com/office/spreadsheetml/2010/11/main";
    pub const XR: &str = "http://schemas.microsoft.com/office/spreadsheetml/2014/revision";
    pub const XR2: &str = "http://schemas.microsoft.com/office/spreadsheetml/2015/revision2";
    pub const XR3: &str = "http://schemas.microsoft.com/office/spreadsheetml/2016/revision3";
    pub const XR6: &str = "http://schemas.microsoft.com/office/spreadsheetml/2016/revision6";
    pub const XR10: &str = "http://schemas.microsoft.com/office/spreadsheetml/2016/revision10";
    pub const EXTENDED_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties";
    pub const DOC_PROPS_VTYPES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";
    pub const CORE_PROPS: &str =
        "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";
    pub const DCTERMS: &str = "http://purl.org/dc/terms/";
    pub const DCMITYPE: &str = "http://purl.org/dc/dcmitype/";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
}

/// Relationship type URIs
pub(crate) mod rel_type {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const EXTENDED_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    pub const SHARED_STRINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
}

/// Content type strings
pub(crate) mod content_type {
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const XML: &str = "application/xml";
    pub const WORKBOOK: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";
    pub const WORKSHEET: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
    pub const SHARED_STRINGS: &str =
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
    pub const CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
    pub const EXTENDED_PROPERTIES: &str =
        "application/vnd.openxmlformats-officedocument.extended-properties+xml";
}

/// Part names inside the package
pub mod part_name {
    pub const CONTENT_TYPES: &str = "[Content_Types].xml";
    pub const ROOT_RELS: &str = "_rels/.rels";
    pub const APP: &str = "docProps/app.xml";
    pub const CORE: &str = "docProps/core.xml";
    pub const WORKBOOK: &str = "xl/workbook.xml";
    pub const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
    pub const SHARED_STRINGS: &str = "xl/sharedStrings.xml";
    pub const CALC_CHAIN: &str = "xl/calcChain.xml";

    /// `xl/worksheets/sheet<n>.xml`
    pub fn worksheet(n: usize) -> String {
        format!("xl/worksheets/sheet{}.xml", n)
    }
}

const AUTHOR: &str = "litexl";
const CREATED: &str = "2019-12-27T01:35:28Z";
const MODIFIED: &str = "2019-12-27T01:35:39Z";

/// `_rels/.rels`
pub fn root_rels_xml() -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;
    xml.start("Relationships", &[("xmlns", ns::PACKAGE_REL)])?;
    xml.empty(
        "Relationship",
        &[
            ("Id", "rId3"),
            ("Type", rel_type::EXTENDED_PROPERTIES),
            ("Target", part_name::APP),
        ],
    )?;
    xml.empty(
        "Relationship",
        &[
            ("Id", "rId2"),
            ("Type", rel_type::CORE_PROPERTIES),
            ("Target", part_name::CORE),
        ],
    )?;
    xml.empty(
        "Relationship",
        &[
            ("Id", "rId1"),
            ("Type", rel_type::OFFICE_DOCUMENT),
            ("Target", part_name::WORKBOOK),
        ],
    )?;
    xml.end("Relationships")?;
    xml.finish()
}

/// `docProps/app.xml`: sheet count and sheet names
pub fn app_xml(sheet_names: &[&str]) -> XlsxResult<String> {
    let count = sheet_names.len().to_string();
    let mut xml = XmlBuilder::new()?;
    xml.start(
        "Properties",
        &[
            ("xmlns", ns::EXTENDED_PROPS),
            ("xmlns:vt", ns::DOC_PROPS_VTYPES),
        ],
    )?;
    xml.text_element("Application", &[], "Microsoft Excel")?;
    xml.text_element("DocSecurity", &[], "0")?;
    xml.text_element("ScaleCrop", &[], "false")?;

    xml.start("HeadingPairs", &[])?;
    xml.start("vt:vector", &[("baseType", "variant"), ("size", "2")])?;
    xml.start("vt:variant", &[])?;
    xml.text_element("vt:lpstr", &[], "Worksheets")?;
    xml.end("vt:variant")?;
    xml.start("vt:variant", &[])?;
    xml.text_element("vt:i4", &[], &count)?;
    xml.end("vt:variant")?;
    xml.end("vt:vector")?;
    xml.end("HeadingPairs")?;

    xml.start("TitlesOfParts", &[])?;
    xml.start("vt:vector", &[("baseType", "lpstr"), ("size", count.as_str())])?;
    for name in sheet_names {
        xml.text_element("vt:lpstr", &[], name)?;
    }
    xml.end("vt:vector")?;
    xml.end("TitlesOfParts")?;

    xml.empty("Company", &[])?;
    xml.text_element("LinksUpToDate", &[], "false")?;
    xml.text_element("SharedDoc", &[], "false")?;
    xml.text_element("HyperlinksChanged", &[], "false")?;
    xml.text_element("AppVersion", &[], "16.0300")?;
    xml.end("Properties")?;
    xml.finish()
}

/// `docProps/core.xml`: fixed authorship metadata
pub fn core_xml() -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;
    xml.start(
        "cp:coreProperties",
        &[
            ("xmlns:cp", ns::CORE_PROPS),
            ("xmlns:dc", ns::DC),
            ("xmlns:dcterms", ns::DCTERMS),
            ("xmlns:dcmitype", ns::DCMITYPE),
            ("xmlns:xsi", ns::XSI),
        ],
    )?;
    xml.text_element("dc:creator", &[], AUTHOR)?;
    xml.text_element("cp:lastModifiedBy", &[], AUTHOR)?;
    xml.text_element("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], CREATED)?;
    xml.text_element("dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], MODIFIED)?;
    xml.end("cp:coreProperties")?;
    xml.finish()
}

/// `xl/workbook.xml`: one `<sheet>` per name, sheetId and rId equal to the position
pub fn workbook_xml(sheet_names: &[&str]) -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;
    xml.start(
        "workbook",
        &[
            ("xmlns", ns::MAIN),
            ("xmlns:r", ns::OFFICE_REL),
            ("xmlns:mc", ns::MARKUP_COMPAT),
            ("mc:Ignorable", "x15 xr xr6 xr10 xr2"),
            ("xmlns:x15", ns::X15),
            ("xmlns:xr", ns::XR),
            ("xmlns:xr6", ns::XR6),
            ("xmlns:xr10", ns::XR10),
            ("xmlns:xr2", ns::XR2),
        ],
    )?;
    xml.empty(
        "fileVersion",
        &[
            ("appName", "xl"),
            ("lastEdited", "7"),
            ("lowestEdited", "7"),
            ("rupBuild", "22228"),
        ],
    )?;
    xml.empty("workbookPr", &[("defaultThemeVersion", "166925")])?;
    xml.start("sheets", &[])?;
    for (i, name) in sheet_names.iter().enumerate() {
        let sheet_id = (i + 1).to_string();
        let r_id = format!("rId{}", i + 1);
        xml.empty(
            "sheet",
            &[
                ("name", *name),
                ("sheetId", sheet_id.as_str()),
                ("r:id", r_id.as_str()),
            ],
        )?;
    }
    xml.end("sheets")?;
    xml.empty("calcPr", &[("calcId", "181029")])?;
    xml.end("workbook")?;
    xml.finish()
}

/// `xl/_rels/workbook.xml.rels`
///
/// Worksheets take `rId1..rIdN`; the shared-strings relationship, when
/// present, takes `rId<N+1>`.
pub fn workbook_rels_xml(sheet_count: usize, has_shared_strings: bool) -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;
    xml.start("Relationships", &[("xmlns", ns::PACKAGE_REL)])?;
    for n in 1..=sheet_count {
        let target = format!("worksheets/sheet{}.xml", n);
        let id = format!("rId{}", n);
        xml.empty(
            "Relationship",
            &[
                ("Target", target.as_str()),
                ("Type", rel_type::WORKSHEET),
                ("Id", id.as_str()),
            ],
        )?;
    }
    if has_shared_strings {
        let id = format!("rId{}", sheet_count + 1);
        xml.empty(
            "Relationship",
            &[
                ("Target", "sharedStrings.xml"),
                ("Type", rel_type::SHARED_STRINGS),
                ("Id", id.as_str()),
            ],
        )?;
    }
    xml.end("Relationships")?;
    xml.finish()
}

/// `[Content_Types].xml`
pub fn content_types_xml(sheet_count: usize, has_shared_strings: bool) -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;
    xml.start("Types", &[("xmlns", ns::CONTENT_TYPES)])?;
    xml.empty(
        "Default",
        &[("Extension", "rels"), ("ContentType", content_type::RELATIONSHIPS)],
    )?;
    xml.empty(
        "Default",
        &[("Extension", "xml"), ("ContentType", content_type::XML)],
    )?;
    xml.empty(
        "Override",
        &[
            ("PartName", "/xl/workbook.xml"),
            ("ContentType", content_type::WORKBOOK),
        ],
    )?;
    for n in 1..=sheet_count {
        let part = format!("/{}", part_name::worksheet(n));
        xml.empty(
            "Override",
            &[
                ("PartName", part.as_str()),
                ("ContentType", content_type::WORKSHEET),
            ],
        )?;
    }
    if has_shared_strings {
        xml.empty(
            "Override",
            &[
                ("PartName", "/xl/sharedStrings.xml"),
                ("ContentType", content_type::SHARED_STRINGS),
            ],
        )?;
    }
    xml.empty(
        "Override",
        &[
            ("PartName", "/docProps/core.xml"),
            ("ContentType", content_type::CORE_PROPERTIES),
        ],
    )?;
    xml.empty(
        "Override",
        &[
            ("PartName", "/docProps/app.xml"),
            ("ContentType", content_type::EXTENDED_PROPERTIES),
        ],
    )?;
    xml.end("Types")?;
    xml.finish()
}

/// Whether a shared string needs `xml:space="preserve"`
pub(crate) fn needs_space_preserve(s: &str) -> bool {
    let edge = |c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r';
    s.starts_with(edge) || s.ends_with(edge)
}

/// Append one `<si>` entry
pub(crate) fn write_shared_string(xml: &mut XmlBuilder, s: &str) -> XlsxResult<()> {
    let text = encode_excel_escapes(s);
    xml.start("si", &[])?;
    if needs_space_preserve(&text) {
        xml.text_element("t", &[("xml:space", "preserve")], &text)?;
    } else {
        xml.text_element("t", &[], &text)?;
    }
    xml.end("si")
}

/// `xl/sharedStrings.xml`
pub fn shared_strings_xml(sst: &SharedStringTable) -> XlsxResult<String> {
    let count = sst.len().to_string();
    let mut xml = XmlBuilder::new()?;
    xml.start(
        "sst",
        &[
            ("uniqueCount", count.as_str()),
            ("count", count.as_str()),
            ("xmlns", ns::MAIN),
        ],
    )?;
    for s in sst.iter() {
        write_shared_string(&mut xml, s)?;
    }
    xml.end("sst")?;
    xml.finish()
}

/// Every part of a fresh package, rendered in dependency order
#[derive(Debug)]
pub struct PackageParts {
    /// `(part name, xml)` in the order they go into the archive
    pub entries: Vec<(String, String)>,
    /// The shared-string table built while rendering the worksheets
    pub shared_strings: SharedStringTable,
}

impl PackageParts {
    /// Render all parts for `db`.
    ///
    /// Worksheets are rendered first so the shared-string table is complete
    /// before the shared-strings, relationship and content-type parts are built.
    pub fn render(db: &Database, options: &WriteOptions) -> XlsxResult<Self> {
        if db.is_empty() {
            return Err(XlsxError::InvalidFormat(
                "a workbook needs at least one worksheet".into(),
            ));
        }

        let names = db.sheet_names();
        let mut sst = SharedStringTable::new();

        let mut worksheets = Vec::with_capacity(names.len());
        for (i, sheet) in db.sheets().enumerate() {
            let xml = worksheet_xml(sheet, &mut sst, i == 0, options)?;
            worksheets.push((part_name::worksheet(i + 1), xml));
        }
        let has_shared_strings = !sst.is_empty();

        let mut entries = Vec::with_capacity(worksheets.len() + 7);
        entries.push((part_name::ROOT_RELS.to_string(), root_rels_xml()?));
        entries.push((part_name::APP.to_string(), app_xml(&names)?));
        entries.push((part_name::CORE.to_string(), core_xml()?));
        entries.push((part_name::WORKBOOK.to_string(), workbook_xml(&names)?));
        entries.extend(worksheets);
        if has_shared_strings {
            entries.push((
                part_name::SHARED_STRINGS.to_string(),
                shared_strings_xml(&sst)?,
            ));
        }
        entries.push((
            part_name::WORKBOOK_RELS.to_string(),
            workbook_rels_xml(names.len(), has_shared_strings)?,
        ));
        entries.push((
            part_name::CONTENT_TYPES.to_string(),
            content_types_xml(names.len(), has_shared_strings)?,
        ));

        log::debug!(
            "rendered {} parts ({} worksheets, {} shared strings)",
            entries.len(),
            names.len(),
            sst.len()
        );

        Ok(Self {
            entries,
            shared_strings: sst,
        })
    }

    /// Look up a rendered part by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, xml)| xml.as_str())
    }
}
