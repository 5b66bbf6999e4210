//! Decoding helpers over quick-xml events. Input is expected to be UTF-8.

use crate::error::{Error, Result};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesRef, BytesStart};

fn utf8(bytes: &[u8], position: u64) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|source| Error::Encoding { position, source })
}

pub(crate) fn element_name(e: &BytesStart<'_>, position: u64) -> Result<String> {
    Ok(utf8(e.name().as_ref(), position)?.to_string())
}

/// Attribute names and unescaped values, in document order.
pub(crate) fn attributes(e: &BytesStart<'_>, position: u64) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = utf8(attr.key.as_ref(), position)?.to_string();
        let raw = utf8(&attr.value, position)?;
        let value = unescape(raw).map_err(|e| Error::xml(position, e))?;
        out.push((key, value.into_owned()));
    }
    Ok(out)
}

/// Character data with escapes resolved.
pub(crate) fn text(bytes: &[u8], position: u64) -> Result<String> {
    let raw = utf8(bytes, position)?;
    Ok(unescape(raw)
        .map_err(|e| Error::xml(position, e))?
        .into_owned())
}

/// CDATA content is taken as-is.
pub(crate) fn cdata(bytes: &[u8], position: u64) -> Result<String> {
    Ok(utf8(bytes, position)?.to_string())
}

/// Resolve a character or predefined entity reference. References to
/// entities declared in a DTD are kept verbatim.
pub(crate) fn reference(r: &BytesRef<'_>, position: u64) -> Result<String> {
    let name = utf8(r, position)?;
    let literal = format!("&{name};");
    Ok(match unescape(&literal) {
        Ok(resolved) => resolved.into_owned(),
        Err(_) => literal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_are_unescaped() {
        let start = BytesStart::from_content(r#"XRef DB="A&amp;B" ID="1""#, 4);
        let attrs = attributes(&start, 0).unwrap();
        assert_eq!(
            attrs,
            vec![("DB".to_string(), "A&B".to_string()), ("ID".to_string(), "1".to_string())]
        );
        assert_eq!(element_name(&start, 0).unwrap(), "XRef");
    }

    #[test]
    fn test_text_and_cdata() {
        assert_eq!(text(b"a &lt; b", 0).unwrap(), "a < b");
        assert_eq!(cdata(b"a &lt; b", 0).unwrap(), "a &lt; b");
        assert!(matches!(text(&[0xff, 0xfe], 7), Err(Error::Encoding { position: 7, .. })));
    }

    #[test]
    fn test_reference_resolution() {
        assert_eq!(reference(&BytesRef::new("amp"), 0).unwrap(), "&");
        assert_eq!(reference(&BytesRef::new("#x41"), 0).unwrap(), "A");
        assert_eq!(reference(&BytesRef::new("custom"), 0).unwrap(), "&custom;");
    }
}
