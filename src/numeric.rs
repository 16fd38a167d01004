use crate::model::CellValue;
fn parse_f64_cell(cell: &CellValue) -> Option<f64> {
    let v = match cell {
        CellValue::Empty => return None,
        CellValue::Number(v) => *v,
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    v.is_finite().then_some(v)
}
/// Quantity coercion: truncates toward zero, unparsable and negative values become 0.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions,
    reason = "value is clamped into the u32 range before the cast"
)]
pub fn coerce_quantity(cell: &CellValue) -> u32 {
    const U32_MAX_F64: f64 = 4_294_967_295.0;
    parse_f64_cell(cell).map_or(0, |v| v.trunc().clamp(0.0, U32_MAX_F64) as u32)
}
pub fn coerce_price(cell: &CellValue) -> f64 {
    parse_f64_cell(cell).unwrap_or(0.0)
}
