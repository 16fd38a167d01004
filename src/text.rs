pub fn substitute_brackets(text: &str) -> String {
    text.replace('（', "(").replace('）', ")")
}
/// Canonical form used before grade/term matching. Non-text input yields "".
pub fn normalize_text(value: Option<&str>) -> String {
    value.map_or_else(String::new, |v| substitute_brackets(v).trim().to_owned())
}
