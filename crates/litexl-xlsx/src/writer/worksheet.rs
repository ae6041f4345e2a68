//! Worksheet part generator (`xl/worksheets/sheetN.xml`)

use litexl_core::{index_to_address, CellValue, RowCells, Worksheet};

use super::parts::ns;
use super::xml::XmlBuilder;
use crate::error::XlsxResult;
use crate::escape::encode_excel_escapes;
use crate::options::{SpansMode, WriteOptions};
use crate::shared_strings::SharedStringTable;

const WORKSHEET_UID: &str = "{6F3B2A51-8C1E-4D7A-9B2C-3E5F1A7D9C40}";

/// Value of the `<dimension ref>` element for a sheet extent
///
/// Extents (0,0) and (1,1) both map to `A1`; anything larger to `A1:<bottom-right>`.
pub fn dimension_ref((rows, cols): (u32, u32)) -> String {
    if (rows, cols) == (0, 0) || (rows, cols) == (1, 1) {
        "A1".to_string()
    } else {
        format!("A1:{}", index_to_address(rows.max(1), cols.max(1)))
    }
}

/// One `<c>` element, classified
enum CellXml<'a> {
    /// `t="str"` with `<f>` and the placeholder value
    Formula(&'a str),
    /// `t="s"` with the shared-string index
    Shared(usize),
    /// raw `<v>`, no type
    Number(f64),
}

/// Render one worksheet part.
///
/// String cells are interned into `sst` as they are met, in row-major order;
/// every worksheet must therefore be rendered before the shared-strings part.
pub fn worksheet_xml(
    sheet: &Worksheet,
    sst: &mut SharedStringTable,
    tab_selected: bool,
    options: &WriteOptions,
) -> XlsxResult<String> {
    let mut xml = XmlBuilder::new()?;

    xml.start(
        "worksheet",
        &[
            ("xmlns", ns::MAIN),
            ("xmlns:r", ns::OFFICE_REL),
            ("xmlns:mc", ns::MARKUP_COMPAT),
            ("mc:Ignorable", "x14ac xr xr2 xr3"),
            ("xmlns:x14ac", ns::X14AC),
            ("xmlns:xr", ns::XR),
            ("xmlns:xr2", ns::XR2),
            ("xmlns:xr3", ns::XR3),
            ("xr:uid", WORKSHEET_UID),
        ],
    )?;

    xml.empty("dimension", &[("ref", dimension_ref(sheet.size()).as_str())])?;

    xml.start("sheetViews", &[])?;
    if tab_selected {
        xml.empty("sheetView", &[("tabSelected", "1"), ("workbookViewId", "0")])?;
    } else {
        xml.empty("sheetView", &[("workbookViewId", "0")])?;
    }
    xml.end("sheetViews")?;

    xml.empty(
        "sheetFormatPr",
        &[("defaultRowHeight", "15"), ("x14ac:dyDescent", "0.25")],
    )?;

    xml.start("sheetData", &[])?;
    for (row, cells) in sheet.iter_rows() {
        write_row(&mut xml, row, cells, sst, options)?;
    }
    xml.end("sheetData")?;

    xml.empty(
        "pageMargins",
        &[
            ("left", "0.7"),
            ("right", "0.7"),
            ("top", "0.75"),
            ("bottom", "0.75"),
            ("header", "0.3"),
            ("footer", "0.3"),
        ],
    )?;

    xml.end("worksheet")?;
    xml.finish()
}

fn write_row(
    xml: &mut XmlBuilder,
    row: u32,
    cells: &RowCells,
    sst: &mut SharedStringTable,
    options: &WriteOptions,
) -> XlsxResult<()> {
    let mut emitted: Vec<(u32, CellXml<'_>)> = Vec::with_capacity(cells.len());

    for (&col, value) in cells {
        let cell = match value {
            CellValue::Empty => continue,
            CellValue::String(s) if s.is_empty() => continue,
            CellValue::String(s) => match s.strip_prefix('=') {
                Some(formula) => CellXml::Formula(formula),
                None => CellXml::Shared(sst.intern(s)),
            },
            CellValue::Number(n) => CellXml::Number(*n),
        };
        emitted.push((col, cell));
    }

    // Rows without written cells are left out entirely
    let (first_col, last_col) = match (emitted.first(), emitted.last()) {
        (Some((first, _)), Some((last, _))) => (*first, *last),
        _ => return Ok(()),
    };

    let spans = match options.spans {
        SpansMode::CellCount => format!("1:{}", emitted.len()),
        SpansMode::ColumnRange => format!("{}:{}", first_col, last_col),
    };
    let row_num = row.to_string();
    xml.start(
        "row",
        &[
            ("r", row_num.as_str()),
            ("x14ac:dyDescent", "0.25"),
            ("spans", spans.as_str()),
        ],
    )?;

    for (col, cell) in emitted {
        let address = index_to_address(row, col);
        match cell {
            CellXml::Formula(formula) => {
                xml.start("c", &[("r", address.as_str()), ("t", "str")])?;
                xml.text_element("f", &[], &encode_excel_escapes(formula))?;
                xml.text_element("v", &[], &encode_excel_escapes(&options.formula_placeholder))?;
                xml.end("c")?;
            }
            CellXml::Shared(idx) => {
                xml.start("c", &[("r", address.as_str()), ("t", "s")])?;
                xml.text_element("v", &[], &idx.to_string())?;
                xml.end("c")?;
            }
            CellXml::Number(n) if n.is_finite() => {
                xml.start("c", &[("r", address.as_str())])?;
                xml.text_element("v", &[], &n.to_string())?;
                xml.end("c")?;
            }
            CellXml::Number(n) => {
                // NaN and infinities have no OOXML representation
                log::warn!("writing non-finite number {} at {} as #NUM!", n, address);
                xml.start("c", &[("r", address.as_str()), ("t", "e")])?;
                xml.text_element("v", &[], "#NUM!")?;
                xml.end("c")?;
            }
        }
    }

    xml.end("row")
}
