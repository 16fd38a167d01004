use crate::error::{AppError, Result};
use crate::model::CellValue;
use calamine::{Data, Range, Reader, open_workbook_auto};
use std::path::Path;
static EMPTY_CELL: CellValue = CellValue::Empty;
/// Header-less view of a worksheet, anchored at A1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    rows: Vec<Vec<CellValue>>,
    width: usize,
}
impl RawTable {
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }
    fn from_range(range: &Range<Data>) -> Self {
        let Some((start_row, start_col)) = range.start() else {
            return Self::default();
        };
        let lead_rows = usize::try_from(start_row).unwrap_or(0);
        let lead_cols = usize::try_from(start_col).unwrap_or(0);
        let mut rows = vec![Vec::new(); lead_rows];
        for data_row in range.rows() {
            let mut row = vec![CellValue::Empty; lead_cols];
            row.extend(data_row.iter().map(data_to_cell_value));
            rows.push(row);
        }
        Self::from_rows(rows)
    }
    #[cfg(test)]
    pub const fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.rows.len()
    }
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }
    pub fn top_left(&self) -> &CellValue {
        self.cell(0, 0)
    }
    /// Header names of `row`, padded to the table width.
    pub fn header_names(&self, row: usize) -> Vec<String> {
        (0..self.width)
            .map(|col| self.cell(row, col).as_string().trim().to_owned())
            .collect()
    }
    /// Rows below `header_row`, skipping rows with no populated cell.
    pub fn data_rows(&self, header_row: usize) -> impl Iterator<Item = (usize, &[CellValue])> {
        self.rows
            .iter()
            .enumerate()
            .skip(header_row.saturating_add(1))
            .filter(|(_, row)| row.iter().any(|cell| !cell.is_empty()))
            .map(|(idx, row)| (idx, row.as_slice()))
    }
}
fn data_to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(s) => {
            if s.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Float(v) => CellValue::Number(*v),
        #[allow(
            clippy::cast_precision_loss,
            clippy::as_conversions,
            reason = "spreadsheet integers fit the f64 mantissa"
        )]
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Bool(b) => CellValue::Number(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
    }
}
pub fn read_first_sheet(path: &Path) -> Result<RawTable> {
    if !path.is_file() {
        return Err(AppError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在"),
        ));
    }
    let mut workbook = open_workbook_auto(path).map_err(|source| AppError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    })?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Err(AppError::NoWorksheet {
            path: path.to_path_buf(),
        });
    };
    let range = range.map_err(|source| AppError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(RawTable::from_range(&range))
}
#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    #[test]
    fn reads_first_sheet_anchored_at_a1() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("src.xlsx");
        let mut book = Workbook::new();
        let sheet = book.add_worksheet();
        sheet.write_string(2, 1, "书名").unwrap();
        sheet.write_number(3, 1, 12.5).unwrap();
        sheet.write_boolean(3, 2, true).unwrap();
        book.save(&path).unwrap();
        let table = read_first_sheet(&path).unwrap();
        assert_eq!(table.height(), 4);
        assert_eq!(table.width(), 3);
        assert_eq!(table.top_left(), &CellValue::Empty);
        assert_eq!(table.cell(2, 1), &CellValue::Text("书名".to_owned()));
        assert_eq!(table.cell(3, 1), &CellValue::Number(12.5));
        assert_eq!(table.cell(3, 2), &CellValue::Number(1.0));
        assert_eq!(table.cell(9, 9), &CellValue::Empty);
    }
    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_first_sheet(&dir.path().join("nope.xlsx"));
        assert!(matches!(result, Err(AppError::Io { .. })));
    }
    #[test]
    fn garbage_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();
        assert!(matches!(
            read_first_sheet(&path),
            Err(AppError::Spreadsheet { .. })
        ));
    }
    #[test]
    fn data_rows_skip_blank_lines() {
        let table = RawTable::from_rows(vec![
            vec![CellValue::Text("h".to_owned())],
            vec![CellValue::Empty],
            vec![CellValue::Text("a".to_owned())],
        ]);
        let rows: Vec<usize> = table.data_rows(0).map(|(idx, _)| idx).collect();
        assert_eq!(rows, vec![2]);
    }
}
