//! Event-level rewrites of existing package parts.
//!
//! Every function copies the events of the original part through unchanged
//! except for the elements it is responsible for, so unknown content survives.

use std::collections::{HashMap, HashSet};

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::reader::attributes_of;
use crate::writer::parts::{ns, write_shared_string};
use crate::writer::xml::XmlBuilder;

fn qualified_name(e: &BytesStart<'_>) -> XlsxResult<String> {
    Ok(String::from_utf8(e.name().as_ref().to_vec())?)
}

/// `prefix:local` using the prefix of `sibling`, if any
fn with_prefix_of(sibling: &str, local: &str) -> String {
    match sibling.split_once(':') {
        Some((prefix, _)) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

fn pairs(attrs: &[(String, String)]) -> Vec<(&str, &str)> {
    attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: String) {
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

/// A complete relationships part from attribute lists
pub(crate) fn relationships_xml(rels: &[Vec<(String, String)>]) -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;
    xml.start("Relationships", &[("xmlns", ns::PACKAGE_REL)])?;
    for attrs in rels {
        xml.empty("Relationship", &pairs(attrs))?;
    }
    xml.end("Relationships")?;
    xml.finish()
}

/// Update `docProps/app.xml` for a new list of sheet names.
///
/// The first `<vt:i4>` receives the sheet count. In `TitlesOfParts`, the
/// first `old_count` entries (the old sheet names) are replaced by `names`;
/// later entries such as named ranges are kept.
pub(crate) fn rewrite_app_xml(xml: &[u8], old_count: usize, names: &[&str]) -> XlsxResult<String> {
    let mut reader = Reader::from_reader(xml);
    let mut out = XmlBuilder::without_declaration();
    let count = names.len().to_string();

    let mut in_count = false;
    let mut count_written = false;
    let mut in_titles = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"i4" && !count_written => {
                in_count = true;
                out.event(Event::Start(e))?;
            }
            Event::Text(_) if in_count => {}
            Event::End(e) if in_count => {
                out.text(&count)?;
                out.event(Event::End(e))?;
                in_count = false;
                count_written = true;
            }
            Event::Start(e) if e.local_name().as_ref() == b"TitlesOfParts" => {
                in_titles = true;
                out.event(Event::Start(e))?;
            }
            Event::End(e) if e.local_name().as_ref() == b"TitlesOfParts" => {
                in_titles = false;
                out.event(Event::End(e))?;
            }
            Event::Start(e) if in_titles && e.local_name().as_ref() == b"vector" => {
                let name = qualified_name(&e)?;
                let attrs = attributes_of(&e)?;
                let existing = read_lpstr_entries(&mut reader, &name)?;
                write_titles(&mut out, &name, attrs, names, &existing, old_count)?;
            }
            Event::Empty(e) if in_titles && e.local_name().as_ref() == b"vector" => {
                let name = qualified_name(&e)?;
                let attrs = attributes_of(&e)?;
                write_titles(&mut out, &name, attrs, names, &[], old_count)?;
            }
            Event::Eof => break,
            event => out.event(event)?,
        }
    }

    out.finish()
}

fn read_lpstr_entries(reader: &mut Reader<&[u8]>, vector_name: &str) -> XlsxResult<Vec<String>> {
    let mut entries = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"lpstr" => current = Some(String::new()),
            Event::Empty(e) if e.local_name().as_ref() == b"lpstr" => entries.push(String::new()),
            Event::Text(e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.unescape()?);
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"lpstr" => {
                if let Some(text) = current.take() {
                    entries.push(text);
                }
            }
            Event::End(e) if e.name().as_ref() == vector_name.as_bytes() => break,
            Event::Eof => {
                return Err(XlsxError::MalformedPackage(
                    "unterminated TitlesOfParts vector in docProps/app.xml".into(),
                ))
            }
            _ => {}
        }
    }

    Ok(entries)
}

fn write_titles(
    out: &mut XmlBuilder,
    vector_name: &str,
    mut attrs: Vec<(String, String)>,
    names: &[&str],
    existing: &[String],
    old_count: usize,
) -> XlsxResult<()> {
    let kept = existing.get(old_count..).unwrap_or(&[]);
    set_attr(&mut attrs, "size", (names.len() + kept.len()).to_string());

    let lpstr = with_prefix_of(vector_name, "lpstr");
    out.start(vector_name, &pairs(&attrs))?;
    for name in names {
        out.text_element(&lpstr, &[], name)?;
    }
    for entry in kept {
        out.text_element(&lpstr, &[], entry)?;
    }
    out.end(vector_name)
}

/// Update `xl/workbook.xml`.
///
/// The content of `<sheets>` is replaced by `sheets` (attribute lists in
/// order). Any other `r:id` found in the part is mapped through `rel_ids`.
/// `activeTab`/`firstSheet` pointing past the last sheet are reset to 0.
pub(crate) fn rewrite_workbook_xml(
    xml: &[u8],
    sheets: &[Vec<(String, String)>],
    rel_ids: &HashMap<String, String>,
) -> XlsxResult<String> {
    let mut reader = Reader::from_reader(xml);
    let mut out = XmlBuilder::without_declaration();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"sheets" => {
                let name = qualified_name(&e)?;
                out.event(Event::Start(e))?;
                reader.read_to_end(QName(name.as_bytes()))?;
                write_sheets(&mut out, &name, sheets)?;
                out.end(&name)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheets" => {
                let name = qualified_name(&e)?;
                let attrs = attributes_of(&e)?;
                out.start(&name, &pairs(&attrs))?;
                write_sheets(&mut out, &name, sheets)?;
                out.end(&name)?;
            }
            Event::Start(e) => match remap_attributes(&e, rel_ids, sheets.len())? {
                Some(attrs) => out.start(&qualified_name(&e)?, &pairs(&attrs))?,
                None => out.event(Event::Start(e))?,
            },
            Event::Empty(e) => match remap_attributes(&e, rel_ids, sheets.len())? {
                Some(attrs) => out.empty(&qualified_name(&e)?, &pairs(&attrs))?,
                None => out.event(Event::Empty(e))?,
            },
            Event::Eof => break,
            event => out.event(event)?,
        }
    }

    out.finish()
}

fn write_sheets(
    out: &mut XmlBuilder,
    sheets_name: &str,
    sheets: &[Vec<(String, String)>],
) -> XlsxResult<()> {
    let sheet = with_prefix_of(sheets_name, "sheet");
    for attrs in sheets {
        out.empty(&sheet, &pairs(attrs))?;
    }
    Ok(())
}

/// New attribute list when the element needs one, `None` to copy it as is
fn remap_attributes(
    e: &BytesStart<'_>,
    rel_ids: &HashMap<String, String>,
    sheet_count: usize,
) -> XlsxResult<Option<Vec<(String, String)>>> {
    let is_view = e.local_name().as_ref() == b"workbookView";
    let mut attrs = attributes_of(e)?;
    let mut changed = false;

    for (key, value) in attrs.iter_mut() {
        if key == "r:id" {
            if let Some(new_id) = rel_ids.get(value.as_str()) {
                if new_id != value {
                    *value = new_id.clone();
                    changed = true;
                }
            }
        } else if is_view && (key == "activeTab" || key == "firstSheet") {
            let index: usize = value.parse().unwrap_or(0);
            if index >= sheet_count {
                *value = "0".to_string();
                changed = true;
            }
        }
    }

    Ok(changed.then_some(attrs))
}

/// Append entries to an existing `sharedStrings.xml`.
///
/// Existing `<si>` elements are copied verbatim; `uniqueCount` becomes
/// `unique_count` and `count` grows by the number of appended entries.
pub(crate) fn append_shared_strings(
    xml: &[u8],
    appended: &[String],
    unique_count: usize,
) -> XlsxResult<String> {
    let mut reader = Reader::from_reader(xml);
    let mut out = XmlBuilder::without_declaration();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"sst" => {
                let name = qualified_name(&e)?;
                let attrs = updated_counts(attributes_of(&e)?, appended.len(), unique_count);
                out.start(&name, &pairs(&attrs))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sst" => {
                let name = qualified_name(&e)?;
                let attrs = updated_counts(attributes_of(&e)?, appended.len(), unique_count);
                out.start(&name, &pairs(&attrs))?;
                for s in appended {
                    write_shared_string(&mut out, s)?;
                }
                out.end(&name)?;
            }
            Event::End(e) if e.local_name().as_ref() == b"sst" => {
                for s in appended {
                    write_shared_string(&mut out, s)?;
                }
                out.event(Event::End(e))?;
            }
            Event::Eof => break,
            event => out.event(event)?,
        }
    }

    out.finish()
}

fn updated_counts(
    mut attrs: Vec<(String, String)>,
    added: usize,
    unique_count: usize,
) -> Vec<(String, String)> {
    for (key, value) in attrs.iter_mut() {
        match key.as_str() {
            "count" => {
                let old: usize = value.parse().unwrap_or(0);
                *value = (old + added).to_string();
            }
            "uniqueCount" => *value = unique_count.to_string(),
            _ => {}
        }
    }
    attrs
}

/// Update `[Content_Types].xml`: drop overrides of `removed` parts and add
/// overrides for `added` `(part name, content type)` pairs not yet listed.
pub(crate) fn rewrite_content_types(
    xml: &[u8],
    removed: &HashSet<String>,
    added: &[(String, &str)],
) -> XlsxResult<String> {
    let mut reader = Reader::from_reader(xml);
    let mut out = XmlBuilder::without_declaration();
    let mut listed = HashSet::new();

    loop {
        match reader.read_event()? {
            Event::Empty(e) if e.local_name().as_ref() == b"Override" => {
                let part = attributes_of(&e)?
                    .into_iter()
                    .find(|(k, _)| k == "PartName")
                    .map(|(_, v)| v.trim_start_matches('/').to_string());
                match part {
                    Some(part) if removed.contains(&part) => {}
                    Some(part) => {
                        listed.insert(part);
                        out.event(Event::Empty(e))?;
                    }
                    None => out.event(Event::Empty(e))?,
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"Types" => {
                let name = String::from_utf8(e.name().as_ref().to_vec())?;
                let override_name = with_prefix_of(&name, "Override");
                for (part, content_type) in added {
                    if listed.contains(part) {
                        continue;
                    }
                    let part_name = format!("/{}", part);
                    out.empty(
                        &override_name,
                        &[("PartName", part_name.as_str()), ("ContentType", *content_type)],
                    )?;
                }
                out.event(Event::End(e))?;
            }
            Event::Eof => break,
            event => out.event(event)?,
        }
    }

    out.finish()
}
