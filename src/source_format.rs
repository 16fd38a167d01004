//! Source layout detection and reshaping into [`CanonicalRow`]s.
//!
//! Each vendor layout is described by a [`ColumnPlan`]: where its header sits
//! and how each canonical field finds its column (by exact name, by keywords,
//! or by position from the right edge). Resolution happens once per table
//! against the header line, so the per-row code only indexes cells.
use crate::error::{AppError, Result};
use crate::excel::source_reader::RawTable;
use crate::model::{CanonicalRow, CellValue, SourceFormat};
use crate::numeric::{coerce_price, coerce_quantity};
const SHIPMENT_MARKER: &str = "发货单明细";
const SUPPLEMENT_MARKER: &str = "教辅目录";
const FREE_TEXTBOOK_MARKER: &str = "免费教材";
const FREE_FLAG_YES: &str = "是";
pub fn detect_format(top_cell: &str) -> SourceFormat {
    if top_cell.contains(SHIPMENT_MARKER) {
        SourceFormat::ShipmentDetail
    } else if top_cell.contains(SUPPLEMENT_MARKER) {
        SourceFormat::SupplementCatalog
    } else if top_cell.contains(FREE_TEXTBOOK_MARKER) {
        SourceFormat::FreeTextbookCatalog
    } else {
        SourceFormat::StandardStatistics
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locate {
    /// Header text equal to the name (after trimming).
    Name(&'static str),
    /// Header text, with ASCII and full-width spaces removed, containing every keyword.
    Keywords(&'static [&'static str]),
    /// Counted from the right edge of the table; `FromEnd(1)` is the last column.
    FromEnd(usize),
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRule {
    pub locate: Locate,
    pub required: bool,
}
impl ColumnRule {
    pub const fn required(locate: Locate) -> Self {
        Self {
            locate,
            required: true,
        }
    }
    pub const fn optional(locate: Locate) -> Self {
        Self {
            locate,
            required: false,
        }
    }
    fn describe(&self) -> String {
        match self.locate {
            Locate::Name(name) => name.to_owned(),
            Locate::Keywords(keys) => format!("包含「{}」的列", keys.concat()),
            Locate::FromEnd(n) => format!("倒数第 {n} 列"),
        }
    }
    fn resolve(&self, header: &[String], format: SourceFormat) -> Result<Option<usize>> {
        let found = match self.locate {
            Locate::Name(name) => header.iter().position(|h| h == name),
            Locate::Keywords(keys) => header.iter().position(|h| {
                let compact: String = h.chars().filter(|c| *c != ' ' && *c != '\u{3000}').collect();
                keys.iter().all(|k| compact.contains(k))
            }),
            Locate::FromEnd(n) => header.len().checked_sub(n),
        };
        if found.is_none() && self.required {
            return Err(AppError::MissingColumn {
                format,
                column: self.describe(),
            });
        }
        Ok(found)
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityRule {
    PaidAndFree { paid: ColumnRule, free: ColumnRule },
    /// One shipped quantity, assigned to free or paid by a yes/no flag column.
    FreeFlag {
        quantity: ColumnRule,
        flag: ColumnRule,
    },
    FreeOnly(ColumnRule),
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPlan {
    pub title: ColumnRule,
    pub publisher: Option<ColumnRule>,
    /// `None` means the layout carries no price and every row is priced 0.
    pub unit_price: Option<ColumnRule>,
    pub quantities: QuantityRule,
}
impl ColumnPlan {
    pub const fn for_format(format: SourceFormat) -> Self {
        use ColumnRule as C;
        use Locate::{FromEnd, Keywords, Name};
        match format {
            SourceFormat::ShipmentDetail => Self {
                title: C::optional(Name("产品名称")),
                publisher: None,
                unit_price: Some(C::optional(Name("定价"))),
                quantities: QuantityRule::FreeFlag {
                    quantity: C::optional(Name("发货数")),
                    flag: C::optional(Name("是否免费")),
                },
            },
            SourceFormat::SupplementCatalog => Self {
                title: C::required(Name("名称")),
                publisher: Some(C::required(Name("版本"))),
                unit_price: Some(C::required(Name("单价"))),
                quantities: QuantityRule::PaidAndFree {
                    paid: C::required(FromEnd(2)),
                    free: C::required(FromEnd(1)),
                },
            },
            SourceFormat::FreeTextbookCatalog => Self {
                title: C::required(Keywords(&["书", "名"])),
                publisher: Some(C::optional(Keywords(&["版"]))),
                unit_price: None,
                quantities: QuantityRule::FreeOnly(C::required(FromEnd(1))),
            },
            SourceFormat::StandardStatistics => Self {
                title: C::required(Name("书名")),
                publisher: Some(C::required(Name("版别"))),
                unit_price: Some(C::required(Name("单价"))),
                quantities: QuantityRule::PaidAndFree {
                    paid: C::required(Name("非免费订数")),
                    free: C::required(Name("免费订数")),
                },
            },
        }
    }
    fn resolve(&self, header: &[String], format: SourceFormat) -> Result<ResolvedPlan> {
        let resolve_opt = |rule: Option<ColumnRule>| -> Result<Option<usize>> {
            rule.map_or(Ok(None), |r| r.resolve(header, format))
        };
        let quantities = match self.quantities {
            QuantityRule::PaidAndFree { paid, free } => ResolvedQuantities::PaidAndFree {
                paid: paid.resolve(header, format)?,
                free: free.resolve(header, format)?,
            },
            QuantityRule::FreeFlag { quantity, flag } => ResolvedQuantities::FreeFlag {
                quantity: quantity.resolve(header, format)?,
                flag: flag.resolve(header, format)?,
            },
            QuantityRule::FreeOnly(free) => ResolvedQuantities::FreeOnly(free.resolve(header, format)?),
        };
        Ok(ResolvedPlan {
            title: self.title.resolve(header, format)?,
            publisher: resolve_opt(self.publisher)?,
            unit_price: resolve_opt(self.unit_price)?,
            has_price: self.unit_price.is_some(),
            quantities,
        })
    }
}
#[derive(Debug, Clone, Copy)]
enum ResolvedQuantities {
    PaidAndFree {
        paid: Option<usize>,
        free: Option<usize>,
    },
    FreeFlag {
        quantity: Option<usize>,
        flag: Option<usize>,
    },
    FreeOnly(Option<usize>),
}
#[derive(Debug, Clone, Copy)]
struct ResolvedPlan {
    title: Option<usize>,
    publisher: Option<usize>,
    unit_price: Option<usize>,
    has_price: bool,
    quantities: ResolvedQuantities,
}
fn pick(row: &[CellValue], col: Option<usize>) -> &CellValue {
    static EMPTY: CellValue = CellValue::Empty;
    col.and_then(|c| row.get(c)).unwrap_or(&EMPTY)
}
impl ResolvedPlan {
    fn build_row(&self, row: &[CellValue]) -> CanonicalRow {
        let publisher_label = self
            .publisher
            .map(|c| pick(row, Some(c)).as_string().trim().to_owned())
            .filter(|s| !s.is_empty());
        let unit_price = if self.has_price {
            coerce_price(pick(row, self.unit_price))
        } else {
            0.0
        };
        let (paid_quantity, free_quantity) = match self.quantities {
            ResolvedQuantities::PaidAndFree { paid, free } => (
                coerce_quantity(pick(row, paid)),
                coerce_quantity(pick(row, free)),
            ),
            ResolvedQuantities::FreeFlag { quantity, flag } => {
                let shipped = coerce_quantity(pick(row, quantity));
                if pick(row, flag).as_string().trim() == FREE_FLAG_YES {
                    (0, shipped)
                } else {
                    (shipped, 0)
                }
            }
            ResolvedQuantities::FreeOnly(free) => (0, coerce_quantity(pick(row, free))),
        };
        CanonicalRow {
            title: pick(row, self.title).clone(),
            publisher_label,
            unit_price,
            paid_quantity,
            free_quantity,
        }
    }
}
/// Reshape a raw table already classified as `format`.
pub fn adapt(table: &RawTable, format: SourceFormat) -> Result<Vec<CanonicalRow>> {
    let header_row = format.header_row();
    if table.height() <= header_row {
        return Err(AppError::MissingHeaderRow {
            format,
            row: header_row.saturating_add(1),
        });
    }
    let header = table.header_names(header_row);
    let plan = ColumnPlan::for_format(format).resolve(&header, format)?;
    Ok(table
        .data_rows(header_row)
        .map(|(_, row)| plan.build_row(row))
        .collect())
}
