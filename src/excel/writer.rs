use super::{
    ooxml::{SheetEntry, drop_calc_chain, load_sheet_catalog},
    xlsx_container::XlsxContainer,
    xml::{
        Attrs, attrs_to_xml, decode_xml_entities, extract_attr, extract_first_tag_text,
        find_end_tag, find_start_tag, find_tag_end, get_attr, needs_xml_space_preserve, parse_tag_attrs, remove_attr,
        replace_first_tag_text, set_attr, xml_escape_text,
    },
};
use crate::error::{AppError, Result};
use std::{collections::BTreeMap, path::Path};
/// A template workbook opened for editing its active sheet. Every other part
/// of the package is carried through untouched.
#[derive(Debug)]
pub struct Workbook {
    container: XlsxContainer,
    active: SheetEntry,
    sheet: Worksheet,
}
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub prefix: String,
    pub suffix: String,
    pub rows: BTreeMap<u32, Row>,
}
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub attrs: Attrs,
    pub cells: BTreeMap<u32, Cell>,
}
#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub attrs: Attrs,
    pub inner_xml: Option<String>,
}
impl Workbook {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_container(XlsxContainer::open(path)?)
    }
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_container(XlsxContainer::from_bytes(bytes)?)
    }
    fn from_container(container: XlsxContainer) -> Result<Self> {
        let catalog = load_sheet_catalog(&container)?;
        let active = catalog
            .active()
            .cloned()
            .ok_or_else(|| AppError::template("找不到活动工作表"))?;
        let sheet = Worksheet::parse(&container.read_text(&active.path)?)?;
        Ok(Self {
            container,
            active,
            sheet,
        })
    }
    pub fn active_sheet_name(&self) -> &str {
        &self.active.name
    }
    pub const fn sheet(&self) -> &Worksheet {
        &self.sheet
    }
    pub const fn sheet_mut(&mut self) -> &mut Worksheet {
        &mut self.sheet
    }
    /// Renders the package. The calculation chain is dropped because written
    /// values may replace formula cells. With `verify`, the rendered bytes are
    /// parsed back before they are handed out.
    pub fn to_bytes(&mut self, verify: bool) -> Result<Vec<u8>> {
        self.container
            .write_text(&self.active.path, &self.sheet.to_xml())?;
        drop_calc_chain(&mut self.container)?;
        let bytes = self.container.to_bytes()?;
        if verify {
            verify_rendered(&bytes, &self.active.name, self.sheet.max_row_num())?;
        }
        Ok(bytes)
    }
}
fn verify_rendered(bytes: &[u8], sheet_name: &str, max_row: u32) -> Result<()> {
    let reopened = Workbook::from_bytes(bytes)
        .map_err(|e| AppError::template(format!("保存校验失败: 重新打开生成的文件失败 ({e})")))?;
    if reopened.active_sheet_name() != sheet_name {
        return Err(AppError::template(format!(
            "保存校验失败: 活动工作表由 {sheet_name} 变为 {}",
            reopened.active_sheet_name()
        )));
    }
    if reopened.sheet().max_row_num() != max_row {
        return Err(AppError::template(format!(
            "保存校验失败: 行数不一致 (期望 {max_row}, 实际 {})",
            reopened.sheet().max_row_num()
        )));
    }
    Ok(())
}
impl Worksheet {
    pub fn parse(xml: &str) -> Result<Self> {
        let open = find_start_tag(xml, "sheetData", 0)
            .ok_or_else(|| AppError::template("worksheet XML 缺少 <sheetData>"))?;
        let open_end = find_tag_end(xml, open)
            .ok_or_else(|| AppError::template("worksheet XML 的 <sheetData> 起始标签损坏"))?;
        let head = xml.get(..open_end).unwrap_or_default();
        if head.ends_with('/') {
            let prefix = format!("{}>", head.trim_end_matches('/').trim_end());
            return Ok(Self {
                prefix,
                suffix: format!("</sheetData>{}", xml.get(open_end + 1..).unwrap_or_default()),
                rows: BTreeMap::new(),
            });
        }
        let body_start = open_end + 1;
        let close = find_end_tag(xml, "sheetData", body_start)
            .ok_or_else(|| AppError::template("worksheet XML 缺少 </sheetData>"))?;
        Ok(Self {
            prefix: xml.get(..body_start).unwrap_or_default().to_string(),
            suffix: xml.get(close..).unwrap_or_default().to_string(),
            rows: parse_rows(xml.get(body_start..close).unwrap_or_default())?,
        })
    }
    pub fn to_xml(&self) -> String {
        let mut out = self.prefix.clone();
        for row in self.rows.values() {
            out.push_str(&row_to_xml(row));
        }
        out.push_str(&self.suffix);
        out
    }
    #[cfg(test)]
    pub fn cell(&self, col: u32, row: u32) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cells.get(&col))
    }
    pub fn set_string_at(&mut self, col: u32, row: u32, value: &str) {
        let cell = self.get_or_create_cell_mut(col, row);
        set_attr(&mut cell.attrs, "t", "inlineStr".to_string());
        let text = xml_escape_text(value);
        cell.inner_xml = Some(if needs_xml_space_preserve(value) {
            format!("<is><t xml:space=\"preserve\">{text}</t></is>")
        } else {
            format!("<is><t>{text}</t></is>")
        });
    }
    pub fn set_number_at(&mut self, col: u32, row: u32, value: f64) {
        let cell = self.get_or_create_cell_mut(col, row);
        remove_attr(&mut cell.attrs, "t");
        cell.inner_xml = Some(format!("<v>{value}</v>"));
    }
    /// Drops the value (and any formula) of an existing cell; its style stays.
    pub fn clear_value_at(&mut self, col: u32, row: u32) {
        let Some(cell) = self.rows.get_mut(&row).and_then(|r| r.cells.get_mut(&col)) else {
            return;
        };
        remove_attr(&mut cell.attrs, "t");
        cell.inner_xml = None;
    }
    /// Copies `source_row` into `target_row`: row attributes and every cell up
    /// to `max_col`, values included. Relative row references to the source
    /// row in plain formulas move with the copy; shared and array formulas are
    /// reduced to their cached value since their master cell stays behind.
    pub fn clone_row(&mut self, source_row: u32, target_row: u32, max_col: u32) {
        let Some(mut cloned) = self.rows.get(&source_row).cloned() else {
            return;
        };
        cloned.cells.retain(|col, _| *col <= max_col);
        for cell in cloned.cells.values_mut() {
            reduce_grouped_formula(cell);
        }
        remap_row_numbers(&mut cloned, target_row, &|r| {
            if r == source_row { target_row } else { r }
        });
        for cell in cloned.cells.values_mut() {
            clear_cached_formula_value(cell);
        }
        self.rows.insert(target_row, cloned);
    }
    pub fn max_cell_col(&self) -> u32 {
        self.rows
            .values()
            .flat_map(|row| row.cells.keys().copied())
            .max()
            .unwrap_or(1)
    }
    pub fn max_row_num(&self) -> u32 {
        self.rows.keys().copied().max().unwrap_or(0)
    }
    pub fn update_dimension(&mut self) -> Result<()> {
        let end_ref = format!(
            "{}{}",
            col_to_name(self.max_cell_col()),
            self.max_row_num().max(1)
        );
        let Some(dim_pos) = find_start_tag(&self.prefix, "dimension", 0) else {
            return Ok(());
        };
        let Some(dim_end) = find_tag_end(&self.prefix, dim_pos) else {
            return Ok(());
        };
        let tag = self.prefix.get(dim_pos..=dim_end).unwrap_or_default();
        let mut attrs = parse_tag_attrs(tag)?;
        set_attr(&mut attrs, "ref", format!("A1:{end_ref}"));
        let new_tag = format!("<dimension{}/>", attrs_to_xml(&attrs));
        self.prefix.replace_range(dim_pos..=dim_end, &new_tag);
        Ok(())
    }
    pub fn get_or_create_cell_mut(&mut self, col: u32, row: u32) -> &mut Cell {
        let row_obj = self.rows.entry(row).or_insert_with(|| Row {
            attrs: vec![("r".to_string(), row.to_string())],
            cells: BTreeMap::new(),
        });
        row_obj.cells.entry(col).or_insert_with(|| Cell {
            attrs: vec![("r".to_string(), format!("{}{row}", col_to_name(col)))],
            inner_xml: None,
        })
    }
}
#[cfg(test)]
impl Cell {
    pub fn style_index(&self) -> Option<&str> {
        get_attr(&self.attrs, "s")
    }
    /// Inline string text or raw `<v>` content; shared-string cells yield their index.
    pub fn raw_text(&self) -> Option<String> {
        let inner = self.inner_xml.as_deref()?;
        if get_attr(&self.attrs, "t") == Some("inlineStr") {
            return extract_first_tag_text(inner, "t").map(|t| decode_xml_entities(&t));
        }
        extract_first_tag_text(inner, "v").map(|v| decode_xml_entities(&v))
    }
}
fn reduce_grouped_formula(cell: &mut Cell) {
    let Some(inner) = cell.inner_xml.as_mut() else {
        return;
    };
    let Some(f_start) = find_start_tag(inner, "f", 0) else {
        return;
    };
    let Some(f_tag_end) = find_tag_end(inner, f_start) else {
        return;
    };
    let f_tag = inner.get(f_start..=f_tag_end).unwrap_or_default();
    if !matches!(extract_attr(f_tag, "t").as_deref(), Some("shared" | "array")) {
        return;
    }
    let f_end = if f_tag.ends_with("/>") {
        f_tag_end + 1
    } else {
        find_end_tag(inner, "f", f_tag_end)
            .map_or(f_tag_end + 1, |close| close + "</f>".len())
    };
    inner.replace_range(f_start..f_end, "");
    if inner.is_empty() {
        cell.inner_xml = None;
        remove_attr(&mut cell.attrs, "t");
    }
}
fn clear_cached_formula_value(cell: &mut Cell) {
    let Some(inner) = cell.inner_xml.as_mut() else {
        return;
    };
    if extract_first_tag_text(inner, "f").is_some()
        && !replace_first_tag_text(inner, "v", "")
        && find_start_tag(inner, "v", 0).is_none()
    {
        inner.push_str("<v></v>");
    }
}
fn remap_row_numbers(row: &mut Row, new_row: u32, resolver: &dyn Fn(u32) -> u32) {
    set_attr(&mut row.attrs, "r", new_row.to_string());
    for (col, cell) in &mut row.cells {
        set_attr(&mut cell.attrs, "r", format!("{}{new_row}", col_to_name(*col)));
        let Some(inner) = cell.inner_xml.as_mut() else {
            continue;
        };
        if let Some(formula) = extract_first_tag_text(inner, "f") {
            let rewritten =
                rewrite_formula_rows(&decode_xml_entities(&formula), resolver);
            replace_first_tag_text(inner, "f", &xml_escape_text(&rewritten));
        }
    }
}
/// Rewrites the row part of relative A1 references through `resolver`.
/// String literals and `$`-anchored rows are left as they are.
fn rewrite_formula_rows(formula: &str, resolver: &dyn Fn(u32) -> u32) -> String {
    let chars: Vec<char> = formula.chars().collect();
    let mut out = String::with_capacity(formula.len());
    let mut i = 0usize;
    let mut in_string = false;
    while let Some(&ch) = chars.get(i) {
        if ch == '"' {
            in_string = !in_string;
            out.push(ch);
            i += 1;
            continue;
        }
        if !in_string
            && (ch == '$' || ch.is_ascii_alphabetic())
            && let Some((end, replaced)) = rewrite_cell_ref_at(&chars, i, resolver)
        {
            out.push_str(&replaced);
            i = end;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}
fn rewrite_cell_ref_at(
    chars: &[char],
    start: usize,
    resolver: &dyn Fn(u32) -> u32,
) -> Option<(usize, String)> {
    let is_ident = |ch: char| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.';
    if start
        .checked_sub(1)
        .and_then(|p| chars.get(p))
        .is_some_and(|prev| is_ident(*prev))
    {
        return None;
    }
    let mut i = start;
    let col_lock = chars.get(i) == Some(&'$');
    if col_lock {
        i += 1;
    }
    let col_start = i;
    while chars.get(i).is_some_and(char::is_ascii_alphabetic) {
        i += 1;
    }
    let col_text: String = chars.get(col_start..i)?.iter().collect();
    if col_text.is_empty() || col_text.len() > 3 {
        return None;
    }
    let row_lock = chars.get(i) == Some(&'$');
    if row_lock {
        i += 1;
    }
    let row_start = i;
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        i += 1;
    }
    let row_text: String = chars.get(row_start..i)?.iter().collect();
    if row_text.is_empty() || chars.get(i).is_some_and(|next| is_ident(*next) || *next == '(') {
        return None;
    }
    let old_row = row_text.parse::<u32>().ok()?;
    let new_row = if row_lock { old_row } else { resolver(old_row) };
    Some((
        i,
        format!(
            "{}{col_text}{}{new_row}",
            if col_lock { "$" } else { "" },
            if row_lock { "$" } else { "" },
        ),
    ))
}
pub fn col_to_name(col: u32) -> String {
    let mut rest = col.max(1);
    let mut rev = Vec::new();
    while rest > 0 {
        let rem = (rest - 1) % 26;
        rev.push(char::from_u32(u32::from('A') + rem).unwrap_or('A'));
        rest = (rest - 1) / 26;
    }
    rev.into_iter().rev().collect()
}
pub fn name_to_col(name: &str) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    name.chars().try_fold(0u32, |acc, ch| {
        let digit = ch.to_ascii_uppercase().to_digit(36)?.checked_sub(9)?;
        ch.is_ascii_alphabetic()
            .then(|| acc.saturating_mul(26).saturating_add(digit))
    })
}
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let cleaned: String = cell_ref.chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (col, row) = cleaned.split_at(split);
    Some((name_to_col(col)?, row.parse().ok()?))
}
fn parse_rows(body: &str) -> Result<BTreeMap<u32, Row>> {
    let mut rows = BTreeMap::new();
    let mut cursor = 0usize;
    while let Some(open) = find_start_tag(body, "row", cursor) {
        let tag_end = find_tag_end(body, open)
            .ok_or_else(|| AppError::template(format!("sheetData 行起始标签损坏 (offset={open})")))?;
        let tag = body.get(open..=tag_end).unwrap_or_default();
        let mut attrs = parse_tag_attrs(tag)?;
        let row_num = get_attr(&attrs, "r")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(|| rows.keys().last().map_or(1, |last: &u32| last.saturating_add(1)));
        set_attr(&mut attrs, "r", row_num.to_string());
        let mut row = Row {
            attrs,
            cells: BTreeMap::new(),
        };
        if tag.ends_with("/>") {
            cursor = tag_end + 1;
        } else {
            let row_body_start = tag_end + 1;
            let close = find_end_tag(body, "row", row_body_start).ok_or_else(|| {
                AppError::template(format!("sheetData 缺少行结束标签 (row={row_num})"))
            })?;
            parse_row_cells(body.get(row_body_start..close).unwrap_or_default(), row_num, &mut row)?;
            cursor = close + "</row>".len();
        }
        rows.insert(row_num, row);
    }
    Ok(rows)
}
fn parse_row_cells(row_body: &str, row_num: u32, row: &mut Row) -> Result<()> {
    let mut cursor = 0usize;
    let mut next_col = 1u32;
    while let Some(open) = find_start_tag(row_body, "c", cursor) {
        let tag_end = find_tag_end(row_body, open).ok_or_else(|| {
            AppError::template(format!("单元格起始标签损坏 (row={row_num}, offset={open})"))
        })?;
        let tag = row_body.get(open..=tag_end).unwrap_or_default();
        let mut attrs = parse_tag_attrs(tag)?;
        let col = get_attr(&attrs, "r")
            .and_then(|v| parse_cell_ref(v).map(|(c, _)| c))
            .unwrap_or(next_col);
        set_attr(&mut attrs, "r", format!("{}{row_num}", col_to_name(col)));
        let inner_xml = if tag.ends_with("/>") {
            cursor = tag_end + 1;
            None
        } else {
            let body_start = tag_end + 1;
            let close = find_end_tag(row_body, "c", body_start).ok_or_else(|| {
                AppError::template(format!("单元格缺少结束标签 (row={row_num}, col={col})"))
            })?;
            cursor = close + "</c>".len();
            Some(row_body.get(body_start..close).unwrap_or_default().to_string())
        };
        row.cells.insert(col, Cell { attrs, inner_xml });
        next_col = col.saturating_add(1);
    }
    Ok(())
}
fn row_to_xml(row: &Row) -> String {
    let mut out = format!("<row{}", attrs_to_xml(&sorted_attrs(&row.attrs)));
    if row.cells.is_empty() {
        out.push_str("/>");
        return out;
    }
    out.push('>');
    for cell in row.cells.values() {
        out.push_str("<c");
        out.push_str(&attrs_to_xml(&sorted_attrs(&cell.attrs)));
        match &cell.inner_xml {
            Some(inner) => {
                out.push('>');
                out.push_str(inner);
                out.push_str("</c>");
            }
            None => out.push_str("/>"),
        }
    }
    out.push_str("</row>");
    out
}
fn sorted_attrs(attrs: &[(String, String)]) -> Attrs {
    let mut sorted = attrs.to_vec();
    sorted.sort_by_key(|(name, _)| match name.as_str() {
        "r" => 0u8,
        "s" => 1,
        "t" => 2,
        _ => 3,
    });
    sorted
}
