//! Render orchestration: substitute, locate, expand, clean up, total, persist.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fillgrid_engine::cell::CellValue;
use fillgrid_engine::sheet::Sheet;
use fillgrid_engine::workbook::Workbook;
use fillgrid_io::xlsx;
use tracing::{debug, info, warn};

use crate::aggregate;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::expander::{self, DataRows};
use crate::locator::{self, RepeatBlock};
use crate::payload::Payload;
use crate::placeholder::{has_tokens, substitute_global};

/// Render lifecycle, logged at every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Loaded,
    GloballySubstituted,
    BlockLocated,
    Expanded,
    MarkersRemoved,
    AggregateSynthesized,
    Persisted,
}

impl fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenderPhase::Loaded => "loaded",
            RenderPhase::GloballySubstituted => "globally_substituted",
            RenderPhase::BlockLocated => "block_located",
            RenderPhase::Expanded => "expanded",
            RenderPhase::MarkersRemoved => "markers_removed",
            RenderPhase::AggregateSynthesized => "aggregate_synthesized",
            RenderPhase::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// What one in-memory render did to a sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub sheet: String,
    /// Cells changed by the global pass
    pub substituted_cells: usize,
    /// Block as found in the template, before expansion
    pub block: Option<RepeatBlock>,
    /// Item rows in the final sheet
    pub data_rows: Option<DataRows>,
    pub aggregate_cells: Vec<(usize, usize)>,
    /// Phases reached, in order
    pub phases: Vec<RenderPhase>,
}

impl RenderReport {
    fn enter(&mut self, phase: RenderPhase) {
        debug!(sheet = %self.sheet, %phase, "render phase");
        self.phases.push(phase);
    }
}

/// Replace every non-reserved token in text and formula cells.
/// Returns how many cells changed.
pub fn substitute_sheet(sheet: &mut Sheet, payload: &Payload, config: &RenderConfig) -> usize {
    let mut changed = 0;
    for (row, col) in sheet.positions_row_major() {
        let replacement = match sheet.get_value(row, col) {
            CellValue::Text(text) if has_tokens(text) => {
                let out = substitute_global(text, payload, config);
                if out == text.as_str() {
                    continue;
                }
                if out.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(out.into_owned())
                }
            }
            CellValue::Formula { source } if has_tokens(source) => {
                let out = substitute_global(source, payload, config);
                if out == source.as_str() {
                    continue;
                }
                CellValue::Formula { source: out.into_owned() }
            }
            _ => continue,
        };
        // Hidden cells never render, and their anchor must not be overwritten
        if sheet.is_merge_hidden(row, col) {
            debug!(row = row + 1, col = col + 1, "token in merge-hidden cell left as is");
            continue;
        }
        if let Err(e) = sheet.set_value(row, col, replacement) {
            warn!(error = %e, "global substitution skipped");
            continue;
        }
        changed += 1;
    }
    changed
}

/// Delete the scaffolding rows bottom-up and return where item data now starts.
fn remove_markers(sheet: &mut Sheet, block: RepeatBlock, count: usize, config: &RenderConfig) -> DataRows {
    // Expansion inserted count - 1 rows above the end marker
    let end_row = block.end_row + count.saturating_sub(1);
    match locator::find_end_marker(sheet, end_row, config) {
        Some(row) if row == end_row => sheet.delete_rows(end_row, 1),
        found => warn!(
            expected_row = end_row + 1,
            found_row = ?found.map(|r| r + 1),
            "end marker not where expansion left it, keeping the row"
        ),
    }
    if count == 0 {
        sheet.delete_rows(block.template_row(), 1);
    }
    sheet.delete_rows(block.start_row, 1);
    DataRows {
        first: block.start_row,
        count,
    }
}

/// Run every in-memory phase on one sheet
pub fn render_sheet(sheet: &mut Sheet, payload: &Payload, config: &RenderConfig) -> RenderReport {
    let mut report = RenderReport {
        sheet: sheet.name.clone(),
        ..Default::default()
    };

    // Markers come from the template as authored; substituted values never count
    let located = locator::locate(sheet, config);

    report.substituted_cells = substitute_sheet(sheet, payload, config);
    report.enter(RenderPhase::GloballySubstituted);

    let Some(block) = located else {
        info!(sheet = %sheet.name, "no repeat block, global substitution only");
        return report;
    };
    report.block = Some(block);
    report.enter(RenderPhase::BlockLocated);

    let items = payload.items();
    expander::expand(sheet, block.template_row(), items, config);
    report.enter(RenderPhase::Expanded);

    let data_rows = remove_markers(sheet, block, items.len(), config);
    report.data_rows = Some(data_rows);
    report.enter(RenderPhase::MarkersRemoved);

    report.aggregate_cells = aggregate::synthesize(sheet, data_rows, items, config);
    report.enter(RenderPhase::AggregateSynthesized);

    info!(
        sheet = %sheet.name,
        items = items.len(),
        first_row = data_rows.first + 1,
        aggregates = report.aggregate_cells.len(),
        "rendered repeat block"
    );
    report
}

/// One file-to-file render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub template: PathBuf,
    pub output: PathBuf,
    pub payload: Payload,
    /// Explicit worksheet name; otherwise the configured preferred names apply
    pub sheet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub output_path: PathBuf,
    pub report: RenderReport,
    pub bytes_written: usize,
    pub duration_ms: u128,
}

/// Pick the worksheet to render: the requested name, else the first preferred
/// name present, else the first sheet.
pub fn select_sheet(workbook: &Workbook, requested: Option<&str>, config: &RenderConfig) -> Result<usize, RenderError> {
    if let Some(name) = requested {
        return workbook
            .sheet_index_by_name(name)
            .ok_or_else(|| RenderError::SheetNotFound {
                name: name.to_string(),
                available: workbook.sheet_names().iter().map(|s| s.to_string()).collect(),
            });
    }
    Ok(config
        .sheet
        .preferred
        .iter()
        .find_map(|name| workbook.sheet_index_by_name(name))
        .unwrap_or(0))
}

/// Load the template, render the selected sheet and write the result.
/// The output is serialized in memory and written with a single call.
pub fn render_file(request: &RenderRequest, config: &RenderConfig) -> Result<RenderOutcome, RenderError> {
    let start = Instant::now();

    let (mut workbook, import) = xlsx::import(&request.template).map_err(|message| RenderError::Load {
        path: request.template.clone(),
        message,
    })?;
    for warning in &import.warnings {
        warn!(template = %request.template.display(), "{warning}");
    }
    info!(
        template = %request.template.display(),
        sheets = import.sheets_imported,
        cells = import.cells_imported,
        merges = import.merges_imported,
        phase = %RenderPhase::Loaded,
        "template loaded"
    );

    let index = select_sheet(&workbook, request.sheet.as_deref(), config)?;
    let sheet = workbook.sheet_mut(index).ok_or_else(|| RenderError::Load {
        path: request.template.clone(),
        message: "workbook has no worksheets".to_string(),
    })?;
    let mut report = render_sheet(sheet, &request.payload, config);
    report.phases.insert(0, RenderPhase::Loaded);

    let bytes_written = persist(&workbook, &request.output)?;
    report.enter(RenderPhase::Persisted);

    let duration_ms = start.elapsed().as_millis();
    info!(output = %request.output.display(), bytes = bytes_written, duration_ms, "render complete");
    Ok(RenderOutcome {
        output_path: request.output.clone(),
        report,
        bytes_written,
        duration_ms,
    })
}

fn persist(workbook: &Workbook, path: &Path) -> Result<usize, RenderError> {
    let persist_err = |message: String| RenderError::Persist {
        path: path.to_path_buf(),
        message,
    };
    let export = xlsx::export(workbook, path).map_err(persist_err)?;
    debug!(
        cells = export.cells_exported,
        merges = export.merges_exported,
        ms = export.export_duration_ms,
        "workbook written"
    );
    Ok(export.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillgrid_engine::sheet::MergedRegion;
    use serde_json::json;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn invoice_sheet() -> Sheet {
        let mut sheet = Sheet::new("청구서");
        sheet.set_value(0, 0, text("Client: {header.client}")).unwrap();
        sheet.set_value(1, 0, text("{#items}")).unwrap();
        sheet.set_value(2, 0, text("{item.title}")).unwrap();
        sheet.set_value(2, 4, text("{item.qty}")).unwrap();
        sheet.add_merge(MergedRegion::horizontal(2, 0, 3)).unwrap();
        sheet.set_value(3, 0, text("{/items}")).unwrap();
        sheet.set_value(4, 4, text("{TOTAL_SUM}")).unwrap();
        sheet
    }

    #[test]
    fn test_render_sheet_full_flow() {
        let mut sheet = invoice_sheet();
        let payload = Payload::from_value(json!({
            "header": {"client": "ACME"},
            "items": [{"title": "A", "qty": 1, "unit_price": 10}, {"title": "B", "qty": 2, "unit_price": 20}]
        }))
        .unwrap();
        let report = render_sheet(&mut sheet, &payload, &RenderConfig::default());

        assert_eq!(sheet.get_raw(0, 0), "Client: ACME");
        assert_eq!(sheet.get_raw(1, 0), "A");
        assert_eq!(sheet.get_raw(2, 0), "B");
        assert_eq!(sheet.get_raw(2, 4), "2");
        assert_eq!(sheet.merged_regions().len(), 2);
        // Quantities stay text, so the total falls back to the literal sum
        assert_eq!(sheet.get_value(3, 4), &CellValue::Number(50.0));
        assert_eq!(sheet.max_row(), Some(3));

        assert_eq!(report.block, Some(RepeatBlock { start_row: 1, end_row: 3 }));
        assert_eq!(report.data_rows, Some(DataRows { first: 1, count: 2 }));
        assert_eq!(report.aggregate_cells, vec![(3, 4)]);
        assert_eq!(
            report.phases,
            vec![
                RenderPhase::GloballySubstituted,
                RenderPhase::BlockLocated,
                RenderPhase::Expanded,
                RenderPhase::MarkersRemoved,
                RenderPhase::AggregateSynthesized,
            ]
        );
    }

    #[test]
    fn test_zero_items_removes_the_whole_block() {
        let mut sheet = invoice_sheet();
        let payload = Payload::from_value(json!({"header": {"client": "ACME"}, "items": []})).unwrap();
        let report = render_sheet(&mut sheet, &payload, &RenderConfig::default());
        assert_eq!(report.data_rows, Some(DataRows { first: 1, count: 0 }));
        assert_eq!(sheet.get_value(1, 4), &CellValue::Number(0.0));
        assert!(sheet.merged_regions().is_empty());
        assert_eq!(sheet.max_row(), Some(1));
    }

    #[test]
    fn test_without_block_only_global_pass_runs() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, text("{header.client}")).unwrap();
        sheet.set_value(1, 0, text("{TOTAL_SUM}")).unwrap();
        let payload = Payload::from_value(json!({"header": {"client": "ACME"}})).unwrap();
        let report = render_sheet(&mut sheet, &payload, &RenderConfig::default());
        assert_eq!(report.phases, vec![RenderPhase::GloballySubstituted]);
        assert_eq!(report.substituted_cells, 1);
        assert_eq!(sheet.get_raw(0, 0), "ACME");
        assert_eq!(sheet.get_raw(1, 0), "{TOTAL_SUM}");
    }

    #[test]
    fn test_global_pass_rewrites_formula_tokens_and_is_idempotent() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, CellValue::formula("=\"{header.client}\"&A2")).unwrap();
        sheet.set_value(1, 0, text("{header.gone}")).unwrap();
        let payload = Payload::from_value(json!({"header": {"client": "ACME"}})).unwrap();
        let config = RenderConfig::default();
        assert_eq!(substitute_sheet(&mut sheet, &payload, &config), 2);
        assert_eq!(sheet.get_raw(0, 0), "=\"ACME\"&A2");
        assert_eq!(sheet.get_value(1, 0), &CellValue::Empty);
        assert_eq!(substitute_sheet(&mut sheet, &payload, &config), 0);
    }

    #[test]
    fn test_vertical_merge_through_template_row_keeps_items_apart() {
        let mut sheet = Sheet::new("Sheet1");
        sheet.set_value(0, 0, text("{#items}")).unwrap();
        sheet.set_value(1, 2, text("{item.note}")).unwrap();
        sheet.add_merge(MergedRegion::new(1, 2, 2, 2)).unwrap();
        sheet.set_value(2, 0, text("{/items}")).unwrap();
        let payload = Payload::from_value(json!({
            "header": {},
            "items": [{"note": "n1"}, {"note": "n2"}, {"note": "n3"}]
        }))
        .unwrap();

        render_sheet(&mut sheet, &payload, &RenderConfig::default());

        assert!(sheet.merged_regions().is_empty());
        assert_eq!(sheet.get_raw(0, 2), "n1");
        assert_eq!(sheet.get_raw(1, 2), "n2");
        assert_eq!(sheet.get_raw(2, 2), "n3");
        assert_eq!(sheet.max_row(), Some(2));
    }

    #[test]
    fn test_marker_text_in_header_values_is_not_a_marker() {
        let mut sheet = invoice_sheet();
        let payload = Payload::from_value(json!({
            "header": {"client": "{#items}"},
            "items": [{"title": "A", "qty": 1, "unit_price": 10}, {"title": "B", "qty": 2, "unit_price": 20}]
        }))
        .unwrap();
        let report = render_sheet(&mut sheet, &payload, &RenderConfig::default());

        assert_eq!(report.block, Some(RepeatBlock { start_row: 1, end_row: 3 }));
        assert_eq!(sheet.get_raw(0, 0), "Client: {#items}");
        assert_eq!(sheet.get_raw(1, 0), "A");
        assert_eq!(sheet.get_raw(2, 0), "B");
        assert_eq!(sheet.get_value(3, 4), &CellValue::Number(50.0));
    }

    #[test]
    fn test_marker_text_in_item_values_does_not_end_the_block() {
        let mut sheet = invoice_sheet();
        let payload = Payload::from_value(json!({
            "header": {"client": "ACME"},
            "items": [{"title": "{/items}", "qty": 1}, {"title": "B", "qty": 2}]
        }))
        .unwrap();
        let report = render_sheet(&mut sheet, &payload, &RenderConfig::default());

        assert_eq!(report.data_rows, Some(DataRows { first: 1, count: 2 }));
        assert_eq!(sheet.get_raw(1, 0), "{/items}");
        assert_eq!(sheet.get_raw(2, 0), "B");
        assert_eq!(sheet.max_row(), Some(3));
    }

    #[test]
    fn test_select_sheet() {
        let workbook = Workbook::from_sheets(
            vec![Sheet::new("Cover"), Sheet::new("Invoice"), Sheet::new("청구서")],
            0,
        );
        let config = RenderConfig::default();
        assert_eq!(select_sheet(&workbook, None, &config).unwrap(), 2);
        assert_eq!(select_sheet(&workbook, Some("invoice"), &config).unwrap(), 1);
        assert!(matches!(
            select_sheet(&workbook, Some("Missing"), &config),
            Err(RenderError::SheetNotFound { .. })
        ));

        let plain = Workbook::from_sheets(vec![Sheet::new("Data"), Sheet::new("Other")], 1);
        assert_eq!(select_sheet(&plain, None, &config).unwrap(), 0);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(RenderPhase::GloballySubstituted.to_string(), "globally_substituted");
        assert_eq!(RenderPhase::Persisted.to_string(), "persisted");
    }
}
