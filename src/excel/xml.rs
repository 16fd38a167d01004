use crate::error::{AppError, Result};
pub(super) type Attrs = Vec<(String, String)>;
pub(super) fn extract_attr(tag: &str, attr_name: &str) -> Option<String> {
    let pattern = format!("{attr_name}=");
    let bytes = tag.as_bytes();
    let mut cursor = 0usize;
    while let Some(rel) = tag.get(cursor..)?.find(&pattern) {
        let idx = cursor + rel;
        let boundary_ok = idx
            .checked_sub(1)
            .and_then(|p| bytes.get(p))
            .is_none_or(|prev| prev.is_ascii_whitespace() || *prev == b'<');
        let quote_idx = idx + pattern.len();
        if !boundary_ok {
            cursor = quote_idx;
            continue;
        }
        let quote = *bytes.get(quote_idx)?;
        if quote != b'"' && quote != b'\'' {
            cursor = quote_idx;
            continue;
        }
        let value_start = quote_idx + 1;
        let value_end = value_start + tag.get(value_start..)?.find(char::from(quote))?;
        return tag.get(value_start..value_end).map(decode_xml_entities);
    }
    None
}
/// Offset of the next `<name ...>` start tag at or after `from`, ignoring namespace prefixes.
pub(super) fn find_start_tag(xml: &str, tag_name: &str, from: usize) -> Option<usize> {
    let wanted = local_tag_name(tag_name);
    let mut cursor = from.min(xml.len());
    while let Some(rel) = xml.get(cursor..)?.find('<') {
        let start = cursor + rel;
        let rest = xml.get(start + 1..)?;
        cursor = start + 1;
        if rest.starts_with(['/', '!', '?']) {
            continue;
        }
        let name_len = rest
            .find(|ch: char| ch.is_ascii_whitespace() || ch == '/' || ch == '>')
            .unwrap_or(rest.len());
        let raw_name = rest.get(..name_len)?;
        if !raw_name.is_empty() && local_tag_name(raw_name) == wanted {
            return Some(start);
        }
    }
    None
}
pub(super) fn find_end_tag(xml: &str, tag_name: &str, from: usize) -> Option<usize> {
    let wanted = local_tag_name(tag_name);
    let mut cursor = from.min(xml.len());
    while let Some(rel) = xml.get(cursor..)?.find("</") {
        let start = cursor + rel;
        let rest = xml.get(start + 2..)?;
        cursor = start + 2;
        let name_len = rest
            .find(|ch: char| ch.is_ascii_whitespace() || ch == '>')
            .unwrap_or(rest.len());
        let raw_name = rest.get(..name_len)?;
        if !raw_name.is_empty() && local_tag_name(raw_name) == wanted {
            return Some(start);
        }
    }
    None
}
pub(super) fn find_tag_end(xml: &str, tag_start: usize) -> Option<usize> {
    xml.get(tag_start..)
        .and_then(|v| v.find('>'))
        .map(|rel| tag_start + rel)
}
/// Every `<name ...>` start tag in document order, as full tag slices.
pub(super) fn iter_start_tags<'a>(xml: &'a str, tag_name: &str) -> Vec<&'a str> {
    let mut out = vec![];
    let mut cursor = 0usize;
    while let Some(start) = find_start_tag(xml, tag_name, cursor) {
        let Some(end) = find_tag_end(xml, start) else {
            break;
        };
        if let Some(tag) = xml.get(start..=end) {
            out.push(tag);
        }
        cursor = end + 1;
    }
    out
}
pub(super) fn extract_first_tag_text(xml: &str, tag_name: &str) -> Option<String> {
    let (start, end) = first_tag_body(xml, tag_name)?;
    xml.get(start..end).map(ToString::to_string)
}
pub(super) fn replace_first_tag_text(xml: &mut String, tag_name: &str, new_text: &str) -> bool {
    let Some((start, end)) = first_tag_body(xml, tag_name) else {
        return false;
    };
    xml.replace_range(start..end, new_text);
    true
}
fn first_tag_body(xml: &str, tag_name: &str) -> Option<(usize, usize)> {
    let open = find_start_tag(xml, tag_name, 0)?;
    let open_end = find_tag_end(xml, open)?;
    if xml.get(..open_end)?.ends_with('/') {
        return None;
    }
    let body_start = open_end + 1;
    let close = find_end_tag(xml, tag_name, body_start)?;
    Some((body_start, close))
}
pub(super) fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(rest.get(..amp).unwrap_or_default());
        let tail = rest.get(amp..).unwrap_or_default();
        let decoded = tail.find(';').and_then(|semi| {
            let entity = tail.get(1..semi)?;
            decode_single_entity(entity).map(|ch| (ch, semi + 1))
        });
        if let Some((ch, consumed)) = decoded {
            out.push(ch);
            rest = tail.get(consumed..).unwrap_or_default();
        } else {
            out.push('&');
            rest = tail.get(1..).unwrap_or_default();
        }
    }
    out.push_str(rest);
    out
}
fn decode_single_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else {
                entity
                    .strip_prefix('#')
                    .and_then(|dec| dec.parse::<u32>().ok())
                    .and_then(char::from_u32)
            }
        }
    }
}
pub(super) fn xml_escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
pub(super) fn xml_escape_attr(s: &str) -> String {
    xml_escape_text(s)
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
pub(super) fn needs_xml_space_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) || s.contains("  ")
}
/// Attributes of a single start tag (`<c r="A1" s="3">`), entity-decoded, in source order.
pub(super) fn parse_tag_attrs(tag: &str) -> Result<Attrs> {
    let malformed = |what: &str| AppError::template(format!("XML 标签解析失败({what}): {tag}"));
    let bytes = tag.as_bytes();
    let mut i = tag.find('<').ok_or_else(|| malformed("缺少 '<'"))? + 1;
    while matches!(bytes.get(i), Some(ch) if !ch.is_ascii_whitespace() && *ch != b'>' && *ch != b'/')
    {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(malformed("标签未闭合"));
    }
    let mut out = Vec::new();
    loop {
        while matches!(bytes.get(i), Some(ch) if ch.is_ascii_whitespace()) {
            i += 1;
        }
        if matches!(bytes.get(i), None | Some(b'>' | b'/')) {
            break;
        }
        let key_start = i;
        while matches!(bytes.get(i), Some(ch) if !ch.is_ascii_whitespace() && !matches!(*ch, b'=' | b'>' | b'/'))
        {
            i += 1;
        }
        let key = tag.get(key_start..i).unwrap_or_default();
        if key.is_empty() {
            return Err(malformed("属性名为空"));
        }
        while matches!(bytes.get(i), Some(ch) if ch.is_ascii_whitespace()) {
            i += 1;
        }
        if bytes.get(i) != Some(&b'=') {
            return Err(malformed("缺少 '='"));
        }
        i += 1;
        while matches!(bytes.get(i), Some(ch) if ch.is_ascii_whitespace()) {
            i += 1;
        }
        let Some(&(quote @ (b'"' | b'\''))) = bytes.get(i) else {
            return Err(malformed("属性值缺少引号"));
        };
        let value_start = i + 1;
        let value_len = tag
            .get(value_start..)
            .and_then(|rest| rest.find(char::from(quote)))
            .ok_or_else(|| malformed("引号未闭合"))?;
        let raw_value = tag.get(value_start..value_start + value_len).unwrap_or_default();
        out.push((key.to_string(), decode_xml_entities(raw_value)));
        i = value_start + value_len + 1;
    }
    Ok(out)
}
pub(super) fn get_attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find_map(|(k, v)| (k == name).then_some(v.as_str()))
}
pub(super) fn set_attr(attrs: &mut Attrs, name: &str, value: String) {
    if let Some((_, v)) = attrs.iter_mut().find(|(k, _)| k == name) {
        *v = value;
    } else {
        attrs.push((name.to_string(), value));
    }
}
pub(super) fn remove_attr(attrs: &mut Attrs, name: &str) {
    attrs.retain(|(k, _)| k != name);
}
pub(super) fn attrs_to_xml(attrs: &[(String, String)]) -> String {
    attrs.iter().fold(String::new(), |mut out, (name, value)| {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&xml_escape_attr(value));
        out.push('"');
        out
    })
}
fn local_tag_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
