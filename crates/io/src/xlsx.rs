// Excel file import/export

use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use fillgrid_engine::cell::{
    Alignment, BorderStyle, CellFormat, CellValue, TextOverflow, VerticalAlignment,
};
use fillgrid_engine::refs::cell_address;
use fillgrid_engine::sheet::{MergedRegion, Sheet};
use fillgrid_engine::workbook::Workbook;
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatBorder, FormatUnderline, Workbook as XlsxWorkbook, Worksheet,
};
use tracing::{debug, warn};

use crate::xlsx_styles;

/// Statistics from an xlsx import
#[derive(Debug, Default, Clone)]
pub struct ImportReport {
    pub sheets_imported: usize,
    pub cells_imported: usize,
    pub formulas_imported: usize,
    pub styles_applied: usize,
    pub merges_imported: usize,
    pub merges_dropped: usize,
    /// Formatting was only recovered for xlsx/xlsm packages
    pub formatting_recovered: bool,
    pub warnings: Vec<String>,
    pub import_duration_ms: u128,
}

/// Statistics from an xlsx export
#[derive(Debug, Default, Clone)]
pub struct ExportReport {
    pub sheets_exported: usize,
    pub cells_exported: usize,
    pub formulas_exported: usize,
    pub merges_exported: usize,
    pub bytes: usize,
    pub export_duration_ms: u128,
}

/// Import a spreadsheet (xlsx, xlsm, xls, xlsb, ods).
///
/// Values and formulas come from calamine. For xlsx/xlsm packages the cell
/// styles, merged ranges, row heights and column widths are recovered from
/// the archive as well; other formats load unstyled.
pub fn import(path: &Path) -> Result<(Workbook, ImportReport), String> {
    let start_time = Instant::now();
    let mut report = ImportReport::default();

    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open template: {}", e))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err("Template contains no sheets".to_string());
    }

    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in &sheet_names {
        let mut sheet = Sheet::new(name);

        let range = workbook
            .worksheet_range(name)
            .map_err(|e| format!("Failed to read sheet '{}': {}", name, e))?;
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, data) in row.iter().enumerate() {
                let value = data_to_value(data);
                if value.is_empty() {
                    continue;
                }
                let (r, c) = (start_row as usize + row_idx, start_col as usize + col_idx);
                // No merges loaded yet, so nothing can be hidden
                sheet
                    .set_value(r, c, value)
                    .map_err(|e| format!("Sheet '{}': {}", name, e))?;
                report.cells_imported += 1;
            }
        }

        // Formula text replaces the cached value where both exist
        if let Ok(formulas) = workbook.worksheet_formula(name) {
            let (start_row, start_col) = formulas.start().unwrap_or((0, 0));
            for (row_idx, row) in formulas.rows().enumerate() {
                for (col_idx, formula) in row.iter().enumerate() {
                    if formula.is_empty() {
                        continue;
                    }
                    let (r, c) = (start_row as usize + row_idx, start_col as usize + col_idx);
                    sheet
                        .set_value(r, c, CellValue::formula(formula.as_str()))
                        .map_err(|e| format!("Sheet '{}': {}", name, e))?;
                    report.formulas_imported += 1;
                }
            }
        }

        sheets.push(sheet);
        report.sheets_imported += 1;
    }

    let mut workbook = Workbook::from_sheets(sheets, 0);

    if is_open_xml(path) {
        match xlsx_styles::parse_xlsx_formatting(path, &sheet_names) {
            Ok(formatting) => {
                apply_formatting(&mut workbook, formatting, &mut report);
                report.formatting_recovered = true;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "formatting not recovered");
                report.warnings.push(format!("Formatting not recovered: {}", e));
            }
        }
    } else {
        report
            .warnings
            .push("Formatting is only recovered from xlsx/xlsm files".to_string());
    }

    report.import_duration_ms = start_time.elapsed().as_millis();
    debug!(
        sheets = report.sheets_imported,
        cells = report.cells_imported,
        formulas = report.formulas_imported,
        merges = report.merges_imported,
        ms = report.import_duration_ms,
        "xlsx import complete"
    );
    Ok((workbook, report))
}

fn is_open_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "xlsx" | "xlsm"))
        .unwrap_or(false)
}

fn data_to_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(e.to_string()),
        // Serial number; the cell's own number format renders it as a date
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

fn apply_formatting(
    workbook: &mut Workbook,
    formatting: xlsx_styles::FormattingImport,
    report: &mut ImportReport,
) {
    let xlsx_styles::FormattingImport {
        styles,
        sheets: layouts,
        unsupported,
        active_sheet,
    } = formatting;

    if !workbook.set_active_sheet(active_sheet) {
        warn!(active_sheet, "active tab out of range, keeping the first sheet");
    }

    for feature in unsupported {
        report.warnings.push(format!("Approximated formatting: {}", feature));
    }

    for (idx, layout) in layouts.into_iter().enumerate() {
        let Some(sheet) = workbook.sheet_mut(idx) else {
            continue;
        };

        for (row, col, style_id) in layout.cell_styles {
            match styles.get(style_id) {
                Some(format) if format.is_styled() => {
                    sheet.set_format(row, col, format.clone());
                    report.styles_applied += 1;
                }
                _ => {}
            }
        }

        for (sr, sc, er, ec) in layout.merges {
            match sheet.add_merge(MergedRegion::new(sr, sc, er, ec)) {
                Ok(()) => report.merges_imported += 1,
                Err(e) => {
                    warn!(sheet = %sheet.name, error = %e, "dropping overlapping merge");
                    report.merges_dropped += 1;
                    report.warnings.push(format!("Sheet '{}': dropped {}", sheet.name, e));
                }
            }
        }

        for (row, height) in layout.row_heights {
            sheet.set_row_height(row, height);
        }
        for (col, width) in layout.col_widths {
            sheet.set_col_width(col, width);
        }
    }
}

// =============================================================================
// XLSX Export
// =============================================================================

/// Serialize the workbook to xlsx bytes.
///
/// Nothing touches the filesystem; callers write the buffer in one step so a
/// failed serialization never leaves a partial output file behind.
pub fn export_to_buffer(workbook: &Workbook) -> Result<(Vec<u8>, ExportReport), String> {
    let start_time = Instant::now();
    let mut report = ExportReport::default();
    let mut xlsx_workbook = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        // merge_range() styles every covered cell with the anchor's format and
        // blanks them; the anchor's typed value is written afterwards.
        for merge in sheet.merged_regions() {
            let (row, col) = merge.anchor();
            let format = build_excel_format(&sheet.get_format(row, col));
            worksheet
                .merge_range(
                    merge.start.0 as u32,
                    merge.start.1 as u16,
                    merge.end.0 as u32,
                    merge.end.1 as u16,
                    "",
                    &format,
                )
                .map_err(|e| format!("Failed to write merge {}: {}", merge, e))?;
            report.merges_exported += 1;
        }

        let (cells, formulas) = export_sheet_cells(sheet, worksheet)?;
        report.cells_exported += cells;
        report.formulas_exported += formulas;

        for (row, height) in sheet.row_heights() {
            worksheet
                .set_row_height(*row as u32, *height)
                .map_err(|e| format!("Failed to set row {} height: {}", row + 1, e))?;
        }
        for (col, width) in sheet.col_widths() {
            worksheet
                .set_column_width(*col as u16, *width)
                .map_err(|e| format!("Failed to set column {} width: {}", col, e))?;
        }

        report.sheets_exported += 1;
    }

    if let Ok(ws) = xlsx_workbook.worksheet_from_index(workbook.active_sheet_index()) {
        let _ = ws.set_active(true);
    }

    let buffer = xlsx_workbook
        .save_to_buffer()
        .map_err(|e| format!("Failed to serialize workbook: {}", e))?;
    report.bytes = buffer.len();
    report.export_duration_ms = start_time.elapsed().as_millis();
    Ok((buffer, report))
}

/// Serialize and write the workbook to `path` with a single write
pub fn export(workbook: &Workbook, path: &Path) -> Result<ExportReport, String> {
    let (buffer, report) = export_to_buffer(workbook)?;
    std::fs::write(path, &buffer).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
    Ok(report)
}

/// Write every visible cell. Returns (cells_exported, formulas_exported).
fn export_sheet_cells(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(usize, usize), String> {
    let mut cells = 0;
    let mut formulas = 0;

    for (row, col) in sheet.positions_row_major() {
        // Only the anchor of a merge carries content
        if sheet.is_merge_hidden(row, col) {
            continue;
        }
        let Some(cell) = sheet.get_cell(row, col) else {
            continue;
        };

        let (r, c) = (row as u32, col as u16);
        let format = build_excel_format(&cell.format);
        let at = || cell_address(row, col);

        match &cell.value {
            CellValue::Empty => {
                if cell.format.is_styled() && sheet.merge_at(row, col).is_none() {
                    worksheet
                        .write_blank(r, c, &format)
                        .map_err(|e| format!("Failed to write {}: {}", at(), e))?;
                }
                continue;
            }
            CellValue::Text(s) => {
                worksheet
                    .write_string_with_format(r, c, s, &format)
                    .map_err(|e| format!("Failed to write {}: {}", at(), e))?;
            }
            CellValue::Number(n) => {
                worksheet
                    .write_number_with_format(r, c, *n, &format)
                    .map_err(|e| format!("Failed to write {}: {}", at(), e))?;
            }
            CellValue::Bool(b) => {
                worksheet
                    .write_boolean_with_format(r, c, *b, &format)
                    .map_err(|e| format!("Failed to write {}: {}", at(), e))?;
            }
            CellValue::Formula { source } => {
                let formula = source.strip_prefix('=').unwrap_or(source);
                worksheet
                    .write_formula_with_format(r, c, formula, &format)
                    .map_err(|e| format!("Failed to write formula {}: {}", at(), e))?;
                formulas += 1;
            }
        }
        cells += 1;
    }

    Ok((cells, formulas))
}

fn rgba_to_color([r, g, b, _]: [u8; 4]) -> Color {
    Color::RGB(((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
}

fn build_excel_format(cell_format: &CellFormat) -> Format {
    let mut format = Format::new();

    if cell_format.bold {
        format = format.set_bold();
    }
    if cell_format.italic {
        format = format.set_italic();
    }
    if cell_format.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if cell_format.strikethrough {
        format = format.set_font_strikethrough();
    }
    if let Some(size) = cell_format.font_size {
        format = format.set_font_size(size as f64);
    }
    if let Some(color) = cell_format.font_color {
        format = format.set_font_color(rgba_to_color(color));
    }
    if let Some(ref family) = cell_format.font_family {
        format = format.set_font_name(family);
    }

    format = match cell_format.alignment {
        Alignment::General => format,
        Alignment::Left => format.set_align(FormatAlign::Left),
        Alignment::Center => format.set_align(FormatAlign::Center),
        Alignment::Right => format.set_align(FormatAlign::Right),
        Alignment::CenterAcrossSelection => format.set_align(FormatAlign::CenterAcross),
    };
    format = match cell_format.vertical_alignment {
        VerticalAlignment::Top => format.set_align(FormatAlign::Top),
        VerticalAlignment::Middle => format.set_align(FormatAlign::VerticalCenter),
        VerticalAlignment::Bottom => format,
    };
    if cell_format.text_overflow == TextOverflow::Wrap {
        format = format.set_text_wrap();
    }

    if let Some(color) = cell_format.background_color {
        format = format.set_background_color(rgba_to_color(color));
    }

    if cell_format.border_top.style != BorderStyle::None {
        format = format.set_border_top(border_style_to_xlsx(cell_format.border_top.style));
        if let Some(color) = cell_format.border_top.color {
            format = format.set_border_top_color(rgba_to_color(color));
        }
    }
    if cell_format.border_right.style != BorderStyle::None {
        format = format.set_border_right(border_style_to_xlsx(cell_format.border_right.style));
        if let Some(color) = cell_format.border_right.color {
            format = format.set_border_right_color(rgba_to_color(color));
        }
    }
    if cell_format.border_bottom.style != BorderStyle::None {
        format = format.set_border_bottom(border_style_to_xlsx(cell_format.border_bottom.style));
        if let Some(color) = cell_format.border_bottom.color {
            format = format.set_border_bottom_color(rgba_to_color(color));
        }
    }
    if cell_format.border_left.style != BorderStyle::None {
        format = format.set_border_left(border_style_to_xlsx(cell_format.border_left.style));
        if let Some(color) = cell_format.border_left.color {
            format = format.set_border_left_color(rgba_to_color(color));
        }
    }

    if let Some(code) = cell_format.number_format.to_code() {
        format = format.set_num_format(&code);
    }

    format
}

fn border_style_to_xlsx(style: BorderStyle) -> FormatBorder {
    match style {
        BorderStyle::None => FormatBorder::None,
        BorderStyle::Thin => FormatBorder::Thin,
        BorderStyle::Medium => FormatBorder::Medium,
        BorderStyle::Thick => FormatBorder::Thick,
    }
}
