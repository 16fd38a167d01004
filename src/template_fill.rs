//! Writes enriched rows into the active sheet of the order template.
use crate::error::Result;
use crate::excel::writer::{Workbook, Worksheet};
use crate::model::{CellValue, EnrichedRow};
use std::path::Path;
use tracing::debug;
const COL_INDEX: u32 = 1;
const COL_YEAR: u32 = 3;
const COL_TERM: u32 = 4;
const COL_GRADE: u32 = 5;
const COL_SUBJECT: u32 = 6;
const COL_CATEGORY: u32 = 7;
const COL_TITLE: u32 = 8;
const COL_PUBLISHER: u32 = 9;
const COL_TOTAL: u32 = 10;
const COL_PRICE: u32 = 11;
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillOptions {
    pub year: String,
    /// 1-based first data row; also the row whose formatting new rows copy.
    pub start_row: u32,
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillReport {
    pub sheet_name: String,
    pub rows_written: usize,
    pub rows_added: usize,
}
#[derive(Debug)]
pub struct RenderedTemplate {
    pub bytes: Vec<u8>,
    pub report: FillReport,
}
/// Opens `template`, fills it with `rows` and renders the package in memory.
pub fn render_template(
    template: &Path,
    rows: &[EnrichedRow],
    options: &FillOptions,
    verify: bool,
) -> Result<RenderedTemplate> {
    let mut workbook = Workbook::open(template)?;
    let report = fill_workbook(&mut workbook, rows, options)?;
    let bytes = workbook.to_bytes(verify)?;
    Ok(RenderedTemplate { bytes, report })
}
pub fn fill_workbook(
    workbook: &mut Workbook,
    rows: &[EnrichedRow],
    options: &FillOptions,
) -> Result<FillReport> {
    let sheet_name = workbook.active_sheet_name().to_string();
    let sheet = workbook.sheet_mut();
    let max_col = sheet.max_cell_col();
    let mut rows_added = 0usize;
    let mut current_row = options.start_row;
    for (idx, record) in rows.iter().enumerate() {
        if current_row > sheet.max_row_num() {
            sheet.clone_row(options.start_row, current_row, max_col);
            rows_added += 1;
        }
        write_record(sheet, current_row, idx, record, &options.year);
        current_row = current_row.saturating_add(1);
    }
    sheet.update_dimension()?;
    debug!(sheet = %sheet_name, rows = rows.len(), added = rows_added, "模板填充完成");
    Ok(FillReport {
        sheet_name,
        rows_written: rows.len(),
        rows_added,
    })
}
#[allow(
    clippy::cast_precision_loss,
    clippy::as_conversions,
    reason = "row index is far below 2^53"
)]
fn write_record(sheet: &mut Worksheet, row: u32, idx: usize, record: &EnrichedRow, year: &str) {
    sheet.set_number_at(COL_INDEX, row, (idx + 1) as f64);
    sheet.set_string_at(COL_YEAR, row, year);
    write_optional_text(sheet, COL_TERM, row, record.term.map(|t| t.label()));
    write_optional_text(sheet, COL_GRADE, row, record.grade.map(|g| g.label()));
    write_optional_text(sheet, COL_SUBJECT, row, record.subject.map(|s| s.name()));
    write_optional_text(sheet, COL_CATEGORY, row, record.category.map(|c| c.label()));
    match &record.row.title {
        CellValue::Text(text) => sheet.set_string_at(COL_TITLE, row, text),
        CellValue::Number(v) => sheet.set_number_at(COL_TITLE, row, *v),
        CellValue::Empty => sheet.clear_value_at(COL_TITLE, row),
    }
    write_optional_text(
        sheet,
        COL_PUBLISHER,
        row,
        record.row.publisher_label.as_deref(),
    );
    sheet.set_number_at(COL_TOTAL, row, f64::from(record.total_quantity()));
    sheet.set_number_at(COL_PRICE, row, record.row.unit_price);
}
fn write_optional_text(sheet: &mut Worksheet, col: u32, row: u32, value: Option<&str>) {
    match value {
        Some(text) => sheet.set_string_at(col, row, text),
        None => sheet.clear_value_at(col, row),
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::xlsx_container::{XlsxContainer, tests::minimal_package};
    use crate::extract::enrich;
    use crate::model::CanonicalRow;
    const TEMPLATE_SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:K4"/><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>教材征订单</t></is></c></row><row r="3"><c r="A3" s="2" t="inlineStr"><is><t>序号</t></is></c></row><row r="4" ht="18" customHeight="1"><c r="A4" s="3"/><c r="B4" s="4" t="inlineStr"><is><t>示例小学</t></is></c><c r="C4" s="3"/><c r="D4" s="3"/><c r="E4" s="3"><v>9</v></c><c r="F4" s="3"/><c r="G4" s="3"/><c r="H4" s="5"/><c r="I4" s="3"/><c r="J4" s="6"/><c r="K4" s="7"/></row></sheetData></worksheet>"#;
    fn record(title: CellValue, publisher: Option<&str>, paid: u32, free: u32) -> EnrichedRow {
        enrich(CanonicalRow {
            title,
            publisher_label: publisher.map(str::to_owned),
            unit_price: 12.5,
            paid_quantity: paid,
            free_quantity: free,
        })
    }
    fn sample_rows() -> Vec<EnrichedRow> {
        vec![
            record(CellValue::Text("三年级语文上册".to_owned()), Some("人教版"), 3, 4),
            record(CellValue::Text("英语练习".to_owned()), None, 1, 0),
            record(CellValue::Number(42.0), Some("粤教版"), 0, 2),
        ]
    }
    fn options() -> FillOptions {
        FillOptions {
            year: "2025".to_owned(),
            start_row: 4,
        }
    }
    #[test]
    fn new_rows_carry_start_row_style() {
        let mut workbook = Workbook::from_bytes(&minimal_package(TEMPLATE_SHEET, &[])).unwrap();
        let report = fill_workbook(&mut workbook, &sample_rows(), &options()).unwrap();
        assert_eq!(report.rows_written, 3);
        assert_eq!(report.rows_added, 2);
        assert_eq!(report.sheet_name, "订书单");
        let sheet = workbook.sheet();
        for row in 5..=6 {
            assert_eq!(sheet.cell(8, row).unwrap().style_index(), Some("5"));
            assert_eq!(sheet.cell(11, row).unwrap().style_index(), Some("7"));
            assert_eq!(sheet.cell(2, row).unwrap().raw_text().as_deref(), Some("示例小学"));
        }
        assert!(sheet.rows.get(&7).is_none());
        assert!(sheet.prefix.contains(r#"<dimension ref="A1:K6"/>"#));
    }
    #[test]
    fn columns_follow_the_order_layout() {
        let mut workbook = Workbook::from_bytes(&minimal_package(TEMPLATE_SHEET, &[])).unwrap();
        fill_workbook(&mut workbook, &sample_rows(), &options()).unwrap();
        let sheet = workbook.sheet();
        let text = |col: u32, row: u32| sheet.cell(col, row).and_then(|c| c.raw_text());
        assert_eq!(text(1, 4).as_deref(), Some("1"));
        assert_eq!(text(3, 4).as_deref(), Some("2025"));
        assert_eq!(text(4, 4).as_deref(), Some("上学期"));
        assert_eq!(text(5, 4).as_deref(), Some("三年级"));
        assert_eq!(text(6, 4).as_deref(), Some("语文"));
        assert_eq!(text(7, 4).as_deref(), Some("教材"));
        assert_eq!(text(8, 4).as_deref(), Some("三年级语文上册"));
        assert_eq!(text(9, 4).as_deref(), Some("人教版"));
        assert_eq!(text(10, 4).as_deref(), Some("7"));
        assert_eq!(text(11, 4).as_deref(), Some("12.5"));
        assert_eq!(text(2, 4).as_deref(), Some("示例小学"));
        assert_eq!(text(1, 5).as_deref(), Some("2"));
        assert_eq!(text(4, 5), None);
        assert_eq!(text(5, 5), None);
        assert_eq!(text(9, 5), None);
        assert_eq!(sheet.cell(5, 5).unwrap().style_index(), Some("3"));
        assert_eq!(text(7, 5).as_deref(), Some("教辅"));
        assert_eq!(text(8, 6).as_deref(), Some("42"));
        assert_eq!(text(7, 6), None);
        assert_eq!(text(10, 6).as_deref(), Some("2"));
        assert_eq!(text(1, 1).as_deref(), Some("教材征订单"));
    }
    #[test]
    fn rendered_package_reopens_without_calc_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.xlsx");
        std::fs::write(&path, minimal_package(TEMPLATE_SHEET, &[])).unwrap();
        let rendered = render_template(&path, &sample_rows(), &options(), true).unwrap();
        let container = XlsxContainer::from_bytes(&rendered.bytes).unwrap();
        assert!(!container.has_part("xl/calcChain.xml"));
        let reopened = Workbook::from_bytes(&rendered.bytes).unwrap();
        assert_eq!(reopened.sheet().max_row_num(), 6);
    }
    #[test]
    fn empty_input_leaves_rows_untouched() {
        let mut workbook = Workbook::from_bytes(&minimal_package(TEMPLATE_SHEET, &[])).unwrap();
        let report = fill_workbook(&mut workbook, &[], &options()).unwrap();
        assert_eq!(report.rows_written, 0);
        assert_eq!(workbook.sheet().max_row_num(), 4);
        assert_eq!(workbook.sheet().cell(5, 4).unwrap().raw_text().as_deref(), Some("9"));
    }
}
