//! Flat version/grade/book listing written next to the filled template.
use crate::error::Result;
use crate::model::{CellValue, EnrichedRow};
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet};
const HEADERS: [&str; 7] = ["版本", "年级", "书名", "单价", "数量", "类别", "科目"];
/// One output line, in header order. Absent values stay `Empty`.
fn side_row(record: &EnrichedRow) -> [CellValue; 7] {
    let text = |v: Option<&str>| v.map_or(CellValue::Empty, |s| CellValue::Text(s.to_owned()));
    [
        text(record.version.as_deref()),
        text(record.grade.map(|g| g.label())),
        record.row.title.clone(),
        CellValue::Number(record.row.unit_price),
        CellValue::Number(f64::from(record.total_quantity())),
        text(record.category.map(|c| c.label())),
        text(record.subject.map(|s| s.name())),
    ]
}
pub fn render_side_dump(rows: &[EnrichedRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let header_format = Format::new().set_bold().set_border(FormatBorder::Thin);
    for (col, header) in (0u16..).zip(HEADERS) {
        sheet.write_string_with_format(0, col, header, &header_format)?;
    }
    for (row_idx, record) in (1u32..).zip(rows) {
        for (col, value) in (0u16..).zip(side_row(record)) {
            write_value(sheet, row_idx, col, &value)?;
        }
    }
    sheet.autofit();
    Ok(workbook.save_to_buffer()?)
}
fn write_value(sheet: &mut Worksheet, row: u32, col: u16, value: &CellValue) -> Result<()> {
    match value {
        CellValue::Empty => {}
        CellValue::Text(text) => {
            sheet.write_string(row, col, text)?;
        }
        CellValue::Number(v) => {
            sheet.write_number(row, col, *v)?;
        }
    }
    Ok(())
}
