//! Small helpers over quick-xml events

use quick_xml::events::{BytesStart, BytesText};

/// Strip a namespace prefix from a qualified name (`dc:title` -> `title`)
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Unescaped value of the attribute with the given local name
pub(crate) fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| local_name(attr.key.as_ref()) == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Unescaped text content, falling back to the raw bytes on unknown entities
pub(crate) fn text(content: &BytesText<'_>) -> String {
    match content.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(content).into_owned(),
    }
}
