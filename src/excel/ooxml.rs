use super::{
    xlsx_container::XlsxContainer,
    xml::{extract_attr, find_start_tag, find_tag_end, iter_start_tags},
};
use crate::error::{AppError, Result};
use std::collections::HashMap;
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    pub name: String,
    pub path: String,
}
/// Worksheets in workbook order with their package paths.
#[derive(Debug, Clone, Default)]
pub struct SheetCatalog {
    pub sheets: Vec<SheetEntry>,
    /// Index into `sheets` from `workbookView/@activeTab`, 0 when absent or out of range.
    pub active_index: usize,
}
impl SheetCatalog {
    pub fn active(&self) -> Option<&SheetEntry> {
        self.sheets.get(self.active_index)
    }
}
pub fn load_sheet_catalog(container: &XlsxContainer) -> Result<SheetCatalog> {
    let workbook_xml = container.read_text(WORKBOOK_PART)?;
    let rels_xml = container.read_text(WORKBOOK_RELS_PART)?;
    let rid_to_target = parse_relationship_targets(&rels_xml);
    let sheets: Vec<SheetEntry> = iter_start_tags(&workbook_xml, "sheet")
        .into_iter()
        .filter_map(|tag| {
            let name = extract_attr(tag, "name")?;
            let rid = extract_attr(tag, "r:id")?;
            let target = rid_to_target.get(&rid)?;
            Some(SheetEntry {
                name,
                path: resolve_ooxml_target(WORKBOOK_PART, target),
            })
        })
        .collect();
    if sheets.is_empty() {
        return Err(AppError::template("workbook 中找不到工作表信息"));
    }
    let active_index = active_tab(&workbook_xml).filter(|idx| *idx < sheets.len()).unwrap_or(0);
    Ok(SheetCatalog {
        sheets,
        active_index,
    })
}
fn active_tab(workbook_xml: &str) -> Option<usize> {
    iter_start_tags(workbook_xml, "workbookView")
        .first()
        .and_then(|tag| extract_attr(tag, "activeTab"))
        .and_then(|v| v.trim().parse::<usize>().ok())
}
fn parse_relationship_targets(rels_xml: &str) -> HashMap<String, String> {
    iter_start_tags(rels_xml, "Relationship")
        .into_iter()
        .filter_map(|tag| Some((extract_attr(tag, "Id")?, extract_attr(tag, "Target")?)))
        .collect()
}
/// Removes `xl/calcChain.xml` together with its content-type override and
/// workbook relationship. Excel rebuilds the chain on load.
pub fn drop_calc_chain(container: &mut XlsxContainer) -> Result<bool> {
    if !container.remove_part(CALC_CHAIN_PART) {
        return Ok(false);
    }
    let content_types = container.read_text(CONTENT_TYPES_PART)?;
    let content_types = remove_start_tags(&content_types, "Override", |tag| {
        extract_attr(tag, "PartName").is_some_and(|p| p == "/xl/calcChain.xml")
    });
    container.write_text(CONTENT_TYPES_PART, &content_types)?;
    let rels = container.read_text(WORKBOOK_RELS_PART)?;
    let rels = remove_start_tags(&rels, "Relationship", |tag| {
        extract_attr(tag, "Type").is_some_and(|t| t.ends_with("/calcChain"))
    });
    container.write_text(WORKBOOK_RELS_PART, &rels)?;
    Ok(true)
}
/// Drops self-closing start tags matching `pred`; the package parts touched here never nest them.
fn remove_start_tags<F: Fn(&str) -> bool>(xml: &str, tag_name: &str, pred: F) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0usize;
    while let Some(start) = find_start_tag(xml, tag_name, cursor) {
        let Some(end) = find_tag_end(xml, start) else {
            break;
        };
        let tag = xml.get(start..=end).unwrap_or_default();
        out.push_str(xml.get(cursor..start).unwrap_or_default());
        if !(tag.ends_with("/>") && pred(tag)) {
            out.push_str(tag);
        }
        cursor = end + 1;
    }
    out.push_str(xml.get(cursor..).unwrap_or_default());
    out
}
fn resolve_ooxml_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_part.split('/').collect();
    segments.pop();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}
