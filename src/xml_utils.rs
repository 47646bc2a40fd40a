//! Byte-level XML helpers that never build a document model.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::SerializationError;

type Result<T> = std::result::Result<T, SerializationError>;

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// Write buffered character data as a single text event. Blank runs are
/// indentation and get dropped.
fn flush_text(writer: &mut Writer<Vec<u8>>, pending: &mut String) -> Result<()> {
    if !is_blank(pending.as_bytes()) {
        writer.write_event(Event::Text(BytesText::from_escaped(std::mem::take(pending))))?;
    }
    pending.clear();
    Ok(())
}

/// Re-indent an XML document with two spaces per level.
///
/// Whitespace-only text between elements is dropped and regenerated; all
/// other events are copied through unchanged. Entity references stay
/// escaped.
pub fn format_xml(xml: &[u8]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new_with_indent(Vec::with_capacity(xml.len()), b' ', 2);
    let mut pending = String::new();

    loop {
        match reader.read_event()? {
            Event::Text(e) => pending.push_str(std::str::from_utf8(&e)?),
            Event::GeneralRef(e) => {
                pending.push('&');
                pending.push_str(std::str::from_utf8(&e)?);
                pending.push(';');
            }
            Event::Eof => break,
            event => {
                flush_text(&mut writer, &mut pending)?;
                writer.write_event(event)?;
            }
        }
    }

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

/// Check that `xml` is well-formed: exactly one root element, every tag
/// closed in order and no character data outside the root. No schema checks.
pub fn validate_xml(xml: &[u8]) -> Result<()> {
    let mut reader = Reader::from_reader(xml);
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut seen_root = false;

    loop {
        let event = reader.read_event()?;
        if open.is_empty() {
            match &event {
                Event::Start(e) | Event::Empty(e) if seen_root => {
                    return Err(SerializationError::ExtraContent(
                        String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ));
                }
                Event::Text(e) if !is_blank(e) => {
                    return Err(SerializationError::ExtraContent(
                        String::from_utf8_lossy(e).trim().to_string(),
                    ));
                }
                Event::CData(_) | Event::GeneralRef(_) => {
                    return Err(SerializationError::ExtraContent("character data".to_string()));
                }
                _ => {}
            }
        }
        match event {
            Event::Start(e) => {
                seen_root = true;
                open.push(e.name().as_ref().to_vec());
            }
            Event::Empty(_) => seen_root = true,
            Event::End(_) => {
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(name) = open.pop() {
        return Err(SerializationError::UnclosedElement(
            String::from_utf8_lossy(&name).into_owned(),
        ));
    }
    if !seen_root {
        return Err(SerializationError::MissingElement("root"));
    }
    Ok(())
}

/// Raw text of every outermost `name` element in `xml`, in document order.
///
/// `name` matches either the qualified name (`wpml:actionGroup`) or the
/// local name (`actionGroup`). Occurrences nested inside a match are part
/// of that match, not returned separately.
pub fn get_xml_elements(xml: &[u8], name: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut found = Vec::new();
    let mut start_pos = 0usize;
    let mut depth = 0usize;

    let is_target =
        |qname: &[u8], local: &[u8]| qname == name.as_bytes() || local == name.as_bytes();

    loop {
        let pos = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) if is_target(e.name().as_ref(), e.local_name().as_ref()) => {
                if depth == 0 {
                    start_pos = pos;
                }
                depth += 1;
            }
            Event::End(e) if depth > 0 && is_target(e.name().as_ref(), e.local_name().as_ref()) => {
                depth -= 1;
                if depth == 0 {
                    let end_pos = reader.buffer_position() as usize;
                    found.push(std::str::from_utf8(&xml[start_pos..end_pos])?.to_string());
                }
            }
            Event::Empty(e)
                if depth == 0 && is_target(e.name().as_ref(), e.local_name().as_ref()) =>
            {
                let end_pos = reader.buffer_position() as usize;
                found.push(std::str::from_utf8(&xml[pos..end_pos])?.to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}
