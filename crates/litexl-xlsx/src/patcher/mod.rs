//! In-place patching of an existing XLSX package.
//!
//! The whole package is loaded into memory, the workbook-level parts are
//! rewritten for the database's sheet list, and the result replaces the
//! target through a temporary file in the same directory. Worksheet parts
//! whose content matches the database are never touched, so formatting,
//! drawings and other parts the database does not model survive.

mod package;
mod rewrite;

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use litexl_core::{Database, Worksheet};
use tempfile::NamedTempFile;

use crate::error::{XlsxError, XlsxResult};
use crate::options::{ExistingSheetPolicy, WriteOptions};
use crate::reader::{parse_shared_strings, parse_worksheet, SheetRef, SheetRefMap};
use crate::shared_strings::SharedStringTable;
use crate::writer::parts::{content_type, part_name, rel_type, shared_strings_xml};
use crate::writer::worksheet_xml;
use package::{rels_part_for, Package};
use rewrite::{
    append_shared_strings, relationships_xml, rewrite_app_xml, rewrite_content_types,
    rewrite_workbook_xml,
};

/// What a patch did to each sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    /// Sheets whose parts were left untouched
    pub kept: Vec<String>,
    /// Existing sheets re-rendered from the database
    pub regenerated: Vec<String>,
    /// Sheets written to new parts
    pub added: Vec<String>,
    /// Package sheets absent from the database
    pub removed: Vec<String>,
    /// Whether any workbook-level part had to change
    pub changed: bool,
}

/// Where a sheet of the patched workbook comes from
enum Placement<'a> {
    /// Existing part left untouched
    Kept(&'a SheetRef),
    /// Existing part re-rendered from the database
    Regenerated(&'a Worksheet, &'a SheetRef),
    /// New part for a database sheet
    Added(&'a Worksheet, String),
    /// Chart, dialog or macro sheet carried over as is
    Foreign(&'a SheetRef),
}

impl<'a> Placement<'a> {
    fn existing(&self) -> Option<&'a SheetRef> {
        match self {
            Placement::Kept(r) | Placement::Regenerated(_, r) | Placement::Foreign(r) => Some(*r),
            Placement::Added(..) => None,
        }
    }
}

/// Whether a sheet part selects its own tab
fn is_tab_selected(xml: &[u8]) -> bool {
    [&b"tabSelected=\"1\""[..], &b"tabSelected=\"true\""[..]]
        .iter()
        .any(|pattern| xml.windows(pattern.len()).any(|w| w == *pattern))
}

/// XLSX in-place patcher
pub struct XlsxPatcher;

impl XlsxPatcher {
    /// Patch the package at `path` so its sheet list and data match `db`.
    ///
    /// The target is replaced atomically; on any error it is left untouched.
    pub fn patch<P: AsRef<Path>>(
        db: &Database,
        path: P,
        options: &WriteOptions,
    ) -> XlsxResult<PatchSummary> {
        let path = path.as_ref();
        let mut package = Package::load(File::open(path)?)?;
        let summary = Self::apply(db, &mut package, options)?;

        if !summary.changed {
            log::info!("{} already matches the database", path.display());
            return Ok(summary);
        }

        Self::persist(&package, path, options)?;
        log::info!(
            "patched {}: {} kept, {} regenerated, {} added, {} removed",
            path.display(),
            summary.kept.len(),
            summary.regenerated.len(),
            summary.added.len(),
            summary.removed.len()
        );
        Ok(summary)
    }

    /// Patch a package read from `reader` and write the result to `writer`
    pub fn patch_stream<R: Read + Seek, W: Write + Seek>(
        db: &Database,
        reader: R,
        writer: W,
        options: &WriteOptions,
    ) -> XlsxResult<PatchSummary> {
        let mut package = Package::load(reader)?;
        let summary = Self::apply(db, &mut package, options)?;
        package.write(writer, options)?;
        Ok(summary)
    }

    fn persist(package: &Package, path: &Path, options: &WriteOptions) -> XlsxResult<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let permissions = std::fs::metadata(path)?.permissions();

        let mut tmp = NamedTempFile::new_in(dir)?;
        package.write(tmp.as_file_mut(), options)?;
        tmp.as_file().sync_all()?;
        tmp.as_file().set_permissions(permissions)?;
        tmp.persist(path).map_err(|e| XlsxError::Io(e.error))?;
        Ok(())
    }

    fn apply(
        db: &Database,
        package: &mut Package,
        options: &WriteOptions,
    ) -> XlsxResult<PatchSummary> {
        if db.is_empty() {
            return Err(XlsxError::InvalidFormat(
                "a workbook needs at least one worksheet".into(),
            ));
        }

        let refs = SheetRefMap::from_parts(
            package.require(part_name::WORKBOOK)?,
            package.require(part_name::WORKBOOK_RELS)?,
        )?;

        let sst_part = refs.shared_strings_part();
        let existing_strings = match package.get(&sst_part) {
            Some(xml) => parse_shared_strings(xml)?,
            None => Vec::new(),
        };
        let had_sst_part = package.contains(&sst_part);
        let mut sst = SharedStringTable::from_strings(existing_strings.iter().cloned());
        let loaded_strings = sst.len();

        let mut summary = PatchSummary::default();
        let mut placements = Vec::with_capacity(db.sheet_count() + refs.len());
        let mut reserved = HashSet::new();

        for sheet in db.sheets() {
            let name = sheet.name().to_string();
            let lower = name.to_lowercase();
            if let Some(foreign) = refs
                .iter()
                .find(|r| !r.kind.is_worksheet() && r.name.to_lowercase() == lower)
            {
                return Err(XlsxError::Unsupported(format!(
                    "sheet '{}' is a {:?} in the package and cannot hold cells",
                    name, foreign.kind
                )));
            }

            match refs.get(sheet.name()) {
                Some(sheet_ref) => {
                    let current = parse_worksheet(
                        &sheet_ref.name,
                        package.require(&sheet_ref.part)?,
                        &existing_strings,
                    )?;
                    if current.has_same_content(sheet) {
                        log::debug!("sheet '{}' unchanged, keeping {}", name, sheet_ref.part);
                        summary.kept.push(name);
                        placements.push(Placement::Kept(sheet_ref));
                        continue;
                    }
                    match options.existing_sheets {
                        ExistingSheetPolicy::Reject => {
                            return Err(XlsxError::Unsupported(format!(
                                "sheet '{}' differs from {} and editing existing sheets is disabled",
                                name, sheet_ref.part
                            )));
                        }
                        ExistingSheetPolicy::Regenerate => {
                            log::warn!(
                                "regenerating sheet '{}' into {}; its formatting is lost",
                                name,
                                sheet_ref.part
                            );
                            summary.regenerated.push(name);
                            placements.push(Placement::Regenerated(sheet, sheet_ref));
                        }
                    }
                }
                None => {
                    let mut k = 1;
                    while package.contains(&part_name::worksheet(k))
                        || reserved.contains(&part_name::worksheet(k))
                    {
                        k += 1;
                    }
                    let part = part_name::worksheet(k);
                    log::debug!("adding sheet '{}' as {}", name, part);
                    reserved.insert(part.clone());
                    summary.added.push(name);
                    placements.push(Placement::Added(sheet, part));
                }
            }
        }

        // Chart, dialog and macro sheets keep their position in the sheet list
        for (index, sheet_ref) in refs.iter().enumerate() {
            if !sheet_ref.kind.is_worksheet() {
                log::debug!("keeping {:?} '{}'", sheet_ref.kind, sheet_ref.name);
                let at = index.min(placements.len());
                placements.insert(at, Placement::Foreign(sheet_ref));
            }
        }

        // Package worksheets the database no longer has
        let mut removed_parts = HashSet::new();
        for sheet_ref in refs
            .iter()
            .filter(|r| r.kind.is_worksheet() && db.sheet(&r.name).is_none())
        {
            log::info!("removing sheet '{}' ({})", sheet_ref.name, sheet_ref.part);
            package.remove(&sheet_ref.part);
            package.remove(&rels_part_for(&sheet_ref.part));
            removed_parts.insert(sheet_ref.part.clone());
            summary.removed.push(sheet_ref.name.clone());
        }

        let parts_changed = !(summary.regenerated.is_empty()
            && summary.added.is_empty()
            && summary.removed.is_empty());
        let original_order: Vec<&str> = refs
            .iter()
            .filter(|r| !r.kind.is_worksheet() || db.sheet(&r.name).is_some())
            .map(|r| r.name.as_str())
            .collect();
        let kept_order: Vec<&str> = placements
            .iter()
            .filter_map(|p| p.existing())
            .map(|r| r.name.as_str())
            .collect();
        summary.changed = parts_changed || original_order != kept_order;
        if !summary.changed {
            return Ok(summary);
        }

        // Only one tab may be selected; an untouched part may already hold it
        let selected_elsewhere = placements.iter().any(|p| match p {
            Placement::Kept(r) | Placement::Foreign(r) => {
                package.get(&r.part).map_or(false, is_tab_selected)
            }
            _ => false,
        });
        for (position, placement) in placements.iter().enumerate() {
            let tab_selected = position == 0 && !selected_elsewhere;
            match placement {
                Placement::Regenerated(sheet, sheet_ref) => {
                    let xml = worksheet_xml(sheet, &mut sst, tab_selected, options)?;
                    package.set(&sheet_ref.part, xml);
                }
                Placement::Added(sheet, part) => {
                    let xml = worksheet_xml(sheet, &mut sst, tab_selected, options)?;
                    package.set(part, xml);
                }
                Placement::Kept(_) | Placement::Foreign(_) => {}
            }
        }

        // The calculation chain lists cells of specific sheets
        let calc_rel = refs.relationships().iter().find(|r| r.is_calc_chain());
        let drop_calc_chain = parts_changed;
        if drop_calc_chain {
            let calc_part = calc_rel
                .map(|r| r.part_name())
                .unwrap_or_else(|| part_name::CALC_CHAIN.to_string());
            if package.remove(&calc_part) {
                log::debug!("dropping {}", calc_part);
            }
            removed_parts.insert(calc_part);
        }

        let names = db.sheet_names();
        if let Some(app) = package.get(part_name::APP) {
            let xml = rewrite_app_xml(app, refs.worksheet_count(), &names)?;
            package.set(part_name::APP, xml);
        }

        // Workbook relationships: sheets first, then everything else renumbered
        let mut rels = Vec::new();
        let mut sheet_entries = Vec::with_capacity(placements.len());
        let mut next_sheet_id = refs.max_sheet_id();

        for (i, placement) in placements.iter().enumerate() {
            let r_id = format!("rId{}", i + 1);
            match placement {
                Placement::Kept(sheet_ref)
                | Placement::Regenerated(_, sheet_ref)
                | Placement::Foreign(sheet_ref) => {
                    let rel = refs.relationship(&sheet_ref.r_id).ok_or_else(|| {
                        XlsxError::MalformedPackage(format!(
                            "relationship {} disappeared",
                            sheet_ref.r_id
                        ))
                    })?;
                    rels.push(rel.attributes_with_id(&r_id));

                    let mut attrs = sheet_ref.attributes.clone();
                    for (key, value) in attrs.iter_mut() {
                        if key == "r:id" {
                            *value = r_id.clone();
                        }
                    }
                    sheet_entries.push(attrs);
                }
                Placement::Added(sheet, part) => {
                    let target = part.strip_prefix("xl/").unwrap_or(part);
                    rels.push(vec![
                        ("Id".to_string(), r_id.clone()),
                        ("Type".to_string(), rel_type::WORKSHEET.to_string()),
                        ("Target".to_string(), target.to_string()),
                    ]);

                    next_sheet_id += 1;
                    sheet_entries.push(vec![
                        ("name".to_string(), sheet.name().to_string()),
                        ("sheetId".to_string(), next_sheet_id.to_string()),
                        ("r:id".to_string(), r_id),
                    ]);
                }
            }
        }

        let sheet_rel_ids: HashSet<&str> = refs.iter().map(|r| r.r_id.as_str()).collect();
        let mut rel_ids = HashMap::new();
        let mut has_sst_rel = false;
        for rel in refs.relationships() {
            if rel.is_worksheet()
                || sheet_rel_ids.contains(rel.id.as_str())
                || (drop_calc_chain && rel.is_calc_chain())
            {
                continue;
            }
            let id = format!("rId{}", rels.len() + 1);
            has_sst_rel |= rel.is_shared_strings();
            rel_ids.insert(rel.id.clone(), id.clone());
            rels.push(rel.attributes_with_id(&id));
        }
        if !sst.is_empty() && !has_sst_rel {
            let target = sst_part.strip_prefix("xl/").unwrap_or(&sst_part);
            rels.push(vec![
                ("Id".to_string(), format!("rId{}", rels.len() + 1)),
                ("Type".to_string(), rel_type::SHARED_STRINGS.to_string()),
                ("Target".to_string(), target.to_string()),
            ]);
        }
        package.set(part_name::WORKBOOK_RELS, relationships_xml(&rels)?);

        let workbook = rewrite_workbook_xml(
            package.require(part_name::WORKBOOK)?,
            &sheet_entries,
            &rel_ids,
        )?;
        if workbook.contains("localSheetId") {
            log::warn!("defined names with localSheetId are not re-indexed after the sheet list changed");
        }
        package.set(part_name::WORKBOOK, workbook);

        let appended = sst.appended_since(loaded_strings);
        if !appended.is_empty() {
            log::debug!("adding {} shared strings", appended.len());
            let xml = if had_sst_part {
                append_shared_strings(package.require(&sst_part)?, appended, sst.len())?
            } else {
                shared_strings_xml(&sst)?
            };
            package.set(&sst_part, xml);
        }

        let mut added_types: Vec<(String, &str)> = placements
            .iter()
            .filter_map(|p| match p {
                Placement::Added(_, part) => Some((part.clone(), content_type::WORKSHEET)),
                _ => None,
            })
            .collect();
        if !sst.is_empty() {
            added_types.push((sst_part.clone(), content_type::SHARED_STRINGS));
        }
        let content_types = rewrite_content_types(
            package.require(part_name::CONTENT_TYPES)?,
            &removed_parts,
            &added_types,
        )?;
        package.set(part_name::CONTENT_TYPES, content_types);

        Ok(summary)
    }
}
