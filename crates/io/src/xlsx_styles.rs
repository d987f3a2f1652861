//! Formatting recovery for xlsx archives.
//!
//! calamine only exposes values and formulas, so everything a template author
//! sees besides the text (fonts, fills, borders, number formats, alignment,
//! merged ranges, row heights, column widths) is read straight from the zip
//! parts: `xl/styles.xml` for the style table and each worksheet part for the
//! per-cell style ids and layout.

use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use std::str::FromStr;

use fillgrid_engine::cell::{
    Alignment, BorderStyle, CellBorder, CellFormat, NumberFormat, TextOverflow, VerticalAlignment,
};
use fillgrid_engine::refs::{parse_cell_ref, parse_range_ref};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

// =============================================================================
// Public types
// =============================================================================

/// Resolved `cellXfs` table: style id -> CellFormat
#[derive(Debug, Default)]
pub struct StyleTable {
    pub styles: Vec<CellFormat>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellFormat> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// Layout and style references of one worksheet part
#[derive(Debug, Default)]
pub struct SheetLayout {
    /// (row, col, style_id), style 0 omitted
    pub cell_styles: Vec<(usize, usize, usize)>,
    /// Column index -> width in character units
    pub col_widths: HashMap<usize, f64>,
    /// Row index -> height in points
    pub row_heights: HashMap<usize, f64>,
    /// (start_row, start_col, end_row, end_col), inclusive
    pub merges: Vec<(usize, usize, usize, usize)>,
}

/// Everything recovered from the archive, sheets in workbook order
#[derive(Debug, Default)]
pub struct FormattingImport {
    pub styles: StyleTable,
    pub sheets: Vec<SheetLayout>,
    pub unsupported: Vec<String>,
    /// `activeTab` of the first workbook view, 0 when absent
    pub active_sheet: usize,
}

// =============================================================================
// Attribute helpers
// =============================================================================

/// Unescape the 5 predefined XML entities
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape_xml(&String::from_utf8_lossy(&a.value)))
}

fn attr_parse<T: FromStr>(e: &BytesStart, key: &[u8]) -> Option<T> {
    attr(e, key).and_then(|v| v.trim().parse().ok())
}

/// Boolean attribute: `1`/`true` are set, anything else is not
fn attr_flag(e: &BytesStart, key: &[u8]) -> bool {
    matches!(attr(e, key).as_deref(), Some("1") | Some("true"))
}

/// Font toggles like `<b/>` are on unless `val` says otherwise
fn toggle_on(e: &BytesStart) -> bool {
    !matches!(attr(e, b"val").as_deref(), Some("0") | Some("false") | Some("none"))
}

fn note_unsupported(unsupported: &mut Vec<String>, feature: &str) {
    if !unsupported.iter().any(|s| s == feature) {
        unsupported.push(feature.to_string());
    }
}

// =============================================================================
// Colors
// =============================================================================

/// Legacy palette for `indexed` colors 8..=63 (0..=7 repeat 8..=15)
const INDEXED_PALETTE: [u32; 56] = [
    0x000000, 0xFFFFFF, 0xFF0000, 0x00FF00, 0x0000FF, 0xFFFF00, 0xFF00FF, 0x00FFFF,
    0x800000, 0x008000, 0x000080, 0x808000, 0x800080, 0x008080, 0xC0C0C0, 0x808080,
    0x9999FF, 0x993366, 0xFFFFCC, 0xCCFFFF, 0x660066, 0xFF8080, 0x0066CC, 0xCCCCFF,
    0x000080, 0xFF00FF, 0xFFFF00, 0x00FFFF, 0x800080, 0x800000, 0x008080, 0x0000FF,
    0x00CCFF, 0xCCFFFF, 0xCCFFCC, 0xFFFF99, 0x99CCFF, 0xFF99CC, 0xCC99FF, 0xFFCC99,
    0x3366FF, 0x33CCCC, 0x99CC00, 0xFFCC00, 0xFF9900, 0xFF6600, 0x666699, 0x969696,
    0x003366, 0x339966, 0x003300, 0x333300, 0x993300, 0x993333, 0x333399, 0x333333,
];

/// Office default theme, no tint math
const THEME_PALETTE: [u32; 10] = [
    0xFFFFFF, 0x000000, 0xEEECE1, 0x1F497D, 0x4F81BD, 0xC0504D, 0x9BBB59, 0x8064A2, 0x4BACC6,
    0xF79646,
];

fn rgb_to_rgba(rgb: u32) -> [u8; 4] {
    [(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255]
}

fn indexed_color(idx: usize) -> Option<[u8; 4]> {
    match idx {
        0..=7 => INDEXED_PALETTE.get(idx).copied().map(rgb_to_rgba),
        8..=63 => INDEXED_PALETTE.get(idx - 8).copied().map(rgb_to_rgba),
        // System foreground / background
        64 => Some([0, 0, 0, 255]),
        65 => Some([255, 255, 255, 255]),
        _ => None,
    }
}

/// Parse `AARRGGBB` or `RRGGBB` into RGBA
fn parse_argb_hex(hex: &str) -> Option<[u8; 4]> {
    let hex = hex.trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        8 => Some([byte(2)?, byte(4)?, byte(6)?, byte(0)?]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        _ => None,
    }
}

/// Color from a `<color>`/`<fgColor>` element: rgb, then indexed, then theme
fn parse_color(e: &BytesStart, unsupported: &mut Vec<String>) -> Option<[u8; 4]> {
    if let Some(rgb) = attr(e, b"rgb") {
        return parse_argb_hex(&rgb);
    }
    if let Some(idx) = attr_parse::<usize>(e, b"indexed") {
        return indexed_color(idx);
    }
    if let Some(idx) = attr_parse::<usize>(e, b"theme") {
        if attr(e, b"tint").is_some() {
            note_unsupported(unsupported, "theme color tints");
        }
        return THEME_PALETTE.get(idx).copied().map(rgb_to_rgba);
    }
    None
}

// =============================================================================
// Number formats
// =============================================================================

/// Format code for the built-in `numFmtId`s that carry one
fn builtin_format_code(id: u16) -> Option<&'static str> {
    Some(match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

fn resolve_number_format(id: u16, custom: &HashMap<u16, String>) -> NumberFormat {
    match custom.get(&id).map(String::as_str).or_else(|| builtin_format_code(id)) {
        Some(code) => NumberFormat::from_code(code),
        None => NumberFormat::General,
    }
}

// =============================================================================
// styles.xml
// =============================================================================

#[derive(Debug, Clone, Default)]
struct FontEntry {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    size: Option<f32>,
    color: Option<[u8; 4]>,
    family: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct BorderEntry {
    top: CellBorder,
    right: CellBorder,
    bottom: CellBorder,
    left: CellBorder,
}

impl BorderEntry {
    fn side_mut(&mut self, name: &[u8]) -> Option<&mut CellBorder> {
        match name {
            b"top" => Some(&mut self.top),
            b"right" | b"end" => Some(&mut self.right),
            b"bottom" => Some(&mut self.bottom),
            b"left" | b"start" => Some(&mut self.left),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct XfEntry {
    num_fmt_id: u16,
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    h_align: Option<String>,
    v_align: Option<String>,
    wrap_text: bool,
}

impl XfEntry {
    fn from_element(e: &BytesStart) -> Self {
        Self {
            num_fmt_id: attr_parse(e, b"numFmtId").unwrap_or(0),
            font_id: attr_parse(e, b"fontId").unwrap_or(0),
            fill_id: attr_parse(e, b"fillId").unwrap_or(0),
            border_id: attr_parse(e, b"borderId").unwrap_or(0),
            ..Default::default()
        }
    }

    fn read_alignment(&mut self, e: &BytesStart) {
        self.h_align = attr(e, b"horizontal");
        self.v_align = attr(e, b"vertical");
        self.wrap_text = attr_flag(e, b"wrapText");
    }
}

fn parse_border_style(s: &str) -> BorderStyle {
    match s {
        "thin" | "hair" | "dotted" | "dashed" | "dashDot" | "dashDotDot" => BorderStyle::Thin,
        "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" | "slantDashDot" => {
            BorderStyle::Medium
        }
        "thick" | "double" => BorderStyle::Thick,
        _ => BorderStyle::None,
    }
}

/// One `styles.xml` event, detached from the read buffer
enum Tag {
    Open(BytesStart<'static>, bool),
    Close(Vec<u8>),
    Other,
}

/// Which `styles.xml` collection the reader is inside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    NumFmts,
    Fonts,
    Fills,
    Borders,
    CellXfs,
}

/// Parse `styles.xml` into a resolved style table.
/// Returns the table and a list of formatting features that were approximated.
pub fn parse_styles_xml(xml: &str) -> (StyleTable, Vec<String>) {
    let mut unsupported = Vec::new();
    let mut num_fmts: HashMap<u16, String> = HashMap::new();
    let mut fonts: Vec<FontEntry> = Vec::new();
    let mut fills: Vec<Option<[u8; 4]>> = Vec::new();
    let mut borders: Vec<BorderEntry> = Vec::new();
    let mut xfs: Vec<XfEntry> = Vec::new();

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut section = Section::Other;
    let mut font: Option<FontEntry> = None;
    // (pattern type, fg color) of the fill being read
    let mut fill: Option<(String, Option<[u8; 4]>)> = None;
    let mut border: Option<BorderEntry> = None;
    let mut border_side: Option<Vec<u8>> = None;
    let mut xf: Option<XfEntry> = None;

    loop {
        let tag = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => Tag::Open(e.into_owned(), false),
            Ok(Event::Empty(e)) => Tag::Open(e.into_owned(), true),
            Ok(Event::End(e)) => Tag::Close(e.name().as_ref().to_vec()),
            Ok(Event::Eof) | Err(_) => break,
            _ => Tag::Other,
        };
        buf.clear();

        let (e, is_empty) = match tag {
            Tag::Open(e, is_empty) => (e, is_empty),
            Tag::Close(name) => {
                match name.as_slice() {
                    b"numFmts" | b"fonts" | b"fills" | b"borders" | b"cellXfs" => {
                        section = Section::Other
                    }
                    b"font" => fonts.extend(font.take()),
                    b"fill" => fills.extend(fill.take().map(|(_, color)| color)),
                    b"border" => borders.extend(border.take()),
                    b"left" | b"right" | b"top" | b"bottom" | b"start" | b"end" => {
                        border_side = None
                    }
                    b"xf" => xfs.extend(xf.take()),
                    _ => {}
                }
                continue;
            }
            Tag::Other => continue,
        };

        let name = e.name().as_ref().to_vec();
        match (section, name.as_slice()) {
            (_, b"numFmts") => section = Section::NumFmts,
            (_, b"fonts") => section = Section::Fonts,
            (_, b"fills") => section = Section::Fills,
            (_, b"borders") => section = Section::Borders,
            (_, b"cellXfs") => section = Section::CellXfs,
            (_, b"cellStyleXfs") | (_, b"dxfs") => section = Section::Other,

            (Section::NumFmts, b"numFmt") => {
                if let (Some(id), Some(code)) = (attr_parse(&e, b"numFmtId"), attr(&e, b"formatCode")) {
                    num_fmts.insert(id, code);
                }
            }

            (Section::Fonts, b"font") => {
                if is_empty {
                    fonts.push(FontEntry::default());
                } else {
                    font = Some(FontEntry::default());
                }
            }
            (Section::Fonts, tag) => {
                if let Some(f) = font.as_mut() {
                    match tag {
                        b"b" => f.bold = toggle_on(&e),
                        b"i" => f.italic = toggle_on(&e),
                        b"u" => f.underline = toggle_on(&e),
                        b"strike" => f.strikethrough = toggle_on(&e),
                        b"sz" => f.size = attr_parse(&e, b"val"),
                        b"color" => f.color = parse_color(&e, &mut unsupported),
                        b"name" => f.family = attr(&e, b"val"),
                        _ => {}
                    }
                }
            }

            (Section::Fills, b"fill") => {
                if is_empty {
                    fills.push(None);
                } else {
                    fill = Some((String::from("none"), None));
                }
            }
            (Section::Fills, b"patternFill") => {
                if let Some(f) = fill.as_mut() {
                    f.0 = attr(&e, b"patternType").unwrap_or_else(|| "none".to_string());
                }
            }
            (Section::Fills, b"gradientFill") => note_unsupported(&mut unsupported, "gradient fills"),
            (Section::Fills, b"fgColor") => {
                if let Some(f) = fill.as_mut() {
                    if f.0 != "none" {
                        if f.0 != "solid" {
                            note_unsupported(&mut unsupported, "pattern fills drawn as solid");
                        }
                        f.1 = parse_color(&e, &mut unsupported);
                    }
                }
            }

            (Section::Borders, b"border") => {
                if is_empty {
                    borders.push(BorderEntry::default());
                } else {
                    border = Some(BorderEntry::default());
                }
            }
            (Section::Borders, b"color") => {
                let color = parse_color(&e, &mut unsupported);
                if let (Some(b), Some(side)) = (border.as_mut(), border_side.as_deref()) {
                    if let Some(side) = b.side_mut(side) {
                        side.color = color;
                    }
                }
            }
            (Section::Borders, tag) => {
                if let Some(b) = border.as_mut() {
                    if let Some(side) = b.side_mut(tag) {
                        side.style = attr(&e, b"style")
                            .map(|s| parse_border_style(&s))
                            .unwrap_or_default();
                        if !is_empty {
                            border_side = Some(tag.to_vec());
                        }
                    } else if tag == b"diagonal" && attr(&e, b"style").is_some() {
                        note_unsupported(&mut unsupported, "diagonal borders");
                    }
                }
            }

            (Section::CellXfs, b"xf") => {
                let entry = XfEntry::from_element(&e);
                if is_empty {
                    xfs.push(entry);
                } else {
                    xf = Some(entry);
                }
            }
            (Section::CellXfs, b"alignment") => {
                if let Some(x) = xf.as_mut() {
                    x.read_alignment(&e);
                }
            }

            _ => {}
        }
    }

    let styles = xfs
        .iter()
        .map(|x| resolve_xf(x, &num_fmts, &fonts, &fills, &borders))
        .collect();
    (StyleTable { styles }, unsupported)
}

/// Resolve a `cellXfs` entry against the component tables
fn resolve_xf(
    xf: &XfEntry,
    num_fmts: &HashMap<u16, String>,
    fonts: &[FontEntry],
    fills: &[Option<[u8; 4]>],
    borders: &[BorderEntry],
) -> CellFormat {
    let mut format = CellFormat::default();

    if let Some(font) = fonts.get(xf.font_id) {
        format.bold = font.bold;
        format.italic = font.italic;
        format.underline = font.underline;
        format.strikethrough = font.strikethrough;
        format.font_size = font.size;
        format.font_color = font.color;
        format.font_family = font.family.clone();
    }

    if let Some(Some(color)) = fills.get(xf.fill_id) {
        format.background_color = Some(*color);
    }

    if let Some(border) = borders.get(xf.border_id) {
        format.border_top = border.top;
        format.border_right = border.right;
        format.border_bottom = border.bottom;
        format.border_left = border.left;
    }

    format.number_format = resolve_number_format(xf.num_fmt_id, num_fmts);

    format.alignment = match xf.h_align.as_deref() {
        Some("left") => Alignment::Left,
        Some("center") => Alignment::Center,
        Some("right") => Alignment::Right,
        Some("centerContinuous") => Alignment::CenterAcrossSelection,
        _ => Alignment::General,
    };
    format.vertical_alignment = match xf.v_align.as_deref() {
        Some("top") => VerticalAlignment::Top,
        Some("center") => VerticalAlignment::Middle,
        _ => VerticalAlignment::Bottom,
    };
    if xf.wrap_text {
        format.text_overflow = TextOverflow::Wrap;
    }

    format
}

// =============================================================================
// Worksheet parts
// =============================================================================

/// Scan a worksheet part for cell style ids, row heights, column widths and merges
pub fn parse_sheet_layout(xml: &str) -> SheetLayout {
    let mut layout = SheetLayout::default();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"row" => {
                    let row = attr_parse::<usize>(e, b"r").and_then(|r| r.checked_sub(1));
                    if let (Some(row), Some(ht)) = (row, attr_parse::<f64>(e, b"ht")) {
                        layout.row_heights.insert(row, ht);
                    }
                }
                b"c" => {
                    let style: usize = attr_parse(e, b"s").unwrap_or(0);
                    if style > 0 {
                        if let Some((row, col)) = attr(e, b"r").as_deref().and_then(parse_cell_ref) {
                            layout.cell_styles.push((row, col, style));
                        }
                    }
                }
                b"col" => {
                    let min = attr_parse::<usize>(e, b"min").and_then(|c| c.checked_sub(1));
                    let max = attr_parse::<usize>(e, b"max").and_then(|c| c.checked_sub(1));
                    let width = attr_parse::<f64>(e, b"width");
                    if let (Some(min), Some(max), Some(width)) = (min, max, width) {
                        // <col min="1" max="16384"> spans are styling, not real widths
                        if attr_flag(e, b"customWidth") && max - min < 1024 {
                            for col in min..=max {
                                layout.col_widths.insert(col, width);
                            }
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attr(e, b"ref").as_deref().and_then(parse_range_ref) {
                        layout.merges.push(range);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    layout
}

/// Map sheet names to their worksheet part paths via workbook.xml and its rels
fn resolve_worksheet_paths(workbook_xml: &str, rels_xml: &str, sheet_names: &[String]) -> Vec<Option<String>> {
    let mut name_to_rid: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"sheet" => {
                let rid = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == b"id")
                    .map(|a| String::from_utf8_lossy(&a.value).to_string());
                if let (Some(name), Some(rid)) = (attr(e, b"name"), rid) {
                    name_to_rid.insert(name, rid);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    let mut rid_to_target: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(e, b"Id"), attr(e, b"Target")) {
                    rid_to_target.insert(id, target);
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheet_names
        .iter()
        .map(|name| {
            let target = rid_to_target.get(name_to_rid.get(name)?)?;
            // Targets are relative to xl/ unless absolute within the package
            Some(match target.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => format!("xl/{}", target),
            })
        })
        .collect()
}

/// The tab selected when the workbook was saved
fn parse_active_tab(workbook_xml: &str) -> usize {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"workbookView" => {
                return attr_parse(e, b"activeTab").unwrap_or(0);
            }
            Ok(Event::Eof) | Err(_) => return 0,
            _ => {}
        }
        buf.clear();
    }
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("'{}' not found in archive: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Read the style table and per-sheet layout of an xlsx file.
/// `sheet_names` is the workbook's sheet order; the result has one layout per name.
pub fn parse_xlsx_formatting(path: &Path, sheet_names: &[String]) -> Result<FormattingImport, String> {
    let file = std::fs::File::open(path).map_err(|e| format!("Failed to open template for styles: {}", e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("Failed to read template as zip: {}", e))?;

    let mut import = FormattingImport::default();
    if let Ok(xml) = read_zip_file(&mut archive, "xl/styles.xml") {
        let (styles, unsupported) = parse_styles_xml(&xml);
        import.styles = styles;
        import.unsupported = unsupported;
    }

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    import.active_sheet = parse_active_tab(&workbook_xml);
    for part in resolve_worksheet_paths(&workbook_xml, &rels_xml, sheet_names) {
        let layout = part
            .and_then(|p| read_zip_file(&mut archive, &p).ok())
            .map(|xml| parse_sheet_layout(&xml))
            .unwrap_or_default();
        import.sheets.push(layout);
    }

    Ok(import)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="&quot;₩&quot;#,##0"/></numFmts>
  <fonts count="2">
    <font><sz val="11"/><name val="맑은 고딕"/></font>
    <font><b/><sz val="14"/><color rgb="FF1F497D"/><name val="Arial"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border><left/><right/><top/><bottom/><diagonal/></border>
    <border><left style="thin"><color indexed="64"/></left><right style="medium"/><top/><bottom style="thin"/></border>
  </borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="4">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="3" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1"/>
    <xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0">
      <alignment horizontal="center" vertical="center" wrapText="1"/>
    </xf>
    <xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0"/>
  </cellXfs>
</styleSheet>"#;

    #[test]
    fn test_parse_argb_hex() {
        assert_eq!(parse_argb_hex("FF0000FF"), Some([0, 0, 255, 255]));
        assert_eq!(parse_argb_hex("FF0000"), Some([255, 0, 0, 255]));
        assert_eq!(parse_argb_hex("80FF0000"), Some([255, 0, 0, 128]));
        assert_eq!(parse_argb_hex("XYZ"), None);
    }

    #[test]
    fn test_indexed_color() {
        assert_eq!(indexed_color(0), Some([0, 0, 0, 255]));
        assert_eq!(indexed_color(10), Some([255, 0, 0, 255]));
        assert_eq!(indexed_color(22), Some([192, 192, 192, 255]));
        assert_eq!(indexed_color(64), Some([0, 0, 0, 255]));
        assert_eq!(indexed_color(99), None);
    }

    #[test]
    fn test_styles_table_resolves_components() {
        let (table, _) = parse_styles_xml(STYLES);
        assert_eq!(table.len(), 4);

        let plain = table.get(0).unwrap();
        assert!(!plain.bold);
        assert_eq!(plain.font_family.as_deref(), Some("맑은 고딕"));
        assert_eq!(plain.background_color, None);

        let heading = table.get(1).unwrap();
        assert!(heading.bold);
        assert_eq!(heading.font_size, Some(14.0));
        assert_eq!(heading.font_color, Some([0x1F, 0x49, 0x7D, 255]));
        assert_eq!(heading.background_color, Some([255, 255, 0, 255]));
        assert_eq!(heading.border_left.style, BorderStyle::Thin);
        assert_eq!(heading.border_left.color, Some([0, 0, 0, 255]));
        assert_eq!(heading.border_right.style, BorderStyle::Medium);
        assert_eq!(heading.border_top.style, BorderStyle::None);
        assert_eq!(
            heading.number_format,
            NumberFormat::Number { decimals: 0, thousands: true }
        );

        let money = table.get(2).unwrap();
        assert_eq!(money.number_format, NumberFormat::Custom("\"₩\"#,##0".to_string()));
        assert_eq!(money.alignment, Alignment::Center);
        assert_eq!(money.vertical_alignment, VerticalAlignment::Middle);
        assert_eq!(money.text_overflow, TextOverflow::Wrap);

        let date = table.get(3).unwrap();
        assert_eq!(date.number_format, NumberFormat::Custom("mm-dd-yy".to_string()));
    }

    #[test]
    fn test_cell_style_xfs_are_not_counted() {
        let (table, _) = parse_styles_xml(STYLES);
        // cellStyleXfs holds one <xf>, cellXfs four
        assert_eq!(table.styles.len(), 4);
    }

    #[test]
    fn test_parse_sheet_layout() {
        let xml = r#"<worksheet>
  <cols><col min="1" max="2" width="12.5" customWidth="1"/><col min="3" max="16384" width="9"/></cols>
  <sheetData>
    <row r="1" ht="30" customHeight="1"><c r="A1" s="1" t="s"><v>0</v></c><c r="B1" s="0"/></row>
    <row r="9"><c r="C9" s="2"/></row>
  </sheetData>
  <mergeCells count="2"><mergeCell ref="A1:B1"/><mergeCell ref="C9:H9"/></mergeCells>
</worksheet>"#;
        let layout = parse_sheet_layout(xml);
        assert_eq!(layout.cell_styles, vec![(0, 0, 1), (8, 2, 2)]);
        assert_eq!(layout.row_heights.get(&0), Some(&30.0));
        assert_eq!(layout.row_heights.get(&8), None);
        assert_eq!(layout.col_widths.get(&1), Some(&12.5));
        assert_eq!(layout.col_widths.get(&5), None);
        assert_eq!(layout.merges, vec![(0, 0, 0, 1), (8, 2, 8, 7)]);
    }

    #[test]
    fn test_resolve_worksheet_paths() {
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Cover" sheetId="1" r:id="rId1"/><sheet name="청구서" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
        let rels = r#"<Relationships>
<Relationship Id="rId1" Type="worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="worksheet" Target="/xl/worksheets/sheet2.xml"/></Relationships>"#;
        let names = vec!["Cover".to_string(), "청구서".to_string(), "Ghost".to_string()];
        assert_eq!(
            resolve_worksheet_paths(workbook, rels, &names),
            vec![
                Some("xl/worksheets/sheet1.xml".to_string()),
                Some("xl/worksheets/sheet2.xml".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_parse_active_tab() {
        let workbook = r#"<workbook><bookViews><workbookView xWindow="0" activeTab="2"/></bookViews>
<sheets><sheet name="A" sheetId="1"/></sheets></workbook>"#;
        assert_eq!(parse_active_tab(workbook), 2);
        assert_eq!(parse_active_tab("<workbook><bookViews><workbookView/></bookViews></workbook>"), 0);
        assert_eq!(parse_active_tab(""), 0);
    }
}
