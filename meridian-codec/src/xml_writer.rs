//! Push-style XML writer for protocol responses.
//!
//! Thin wrapper over the quick-xml event writer: open/close element
//! pairs, leaf elements with escaped text, and the XML declaration.
//! Callers build whole documents top to bottom and take the string at
//! the end.

use meridian_core::GisError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

pub struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl Default for XmlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlWriter {
    pub fn new() -> Self {
        XmlWriter {
            inner: Writer::new(Vec::new()),
        }
    }

    /// Write the `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    pub fn declaration(&mut self) -> Result<(), GisError> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(wrap)
    }

    /// Open an element with attributes.
    pub fn open(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), GisError> {
        let mut start = BytesStart::new(name);
        for (k, v) in attrs {
            start.push_attribute((*k, *v));
        }
        self.inner.write_event(Event::Start(start)).map_err(wrap)
    }

    /// Close the named element.
    pub fn close(&mut self, name: &str) -> Result<(), GisError> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(wrap)
    }

    /// Self-closing element.
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), GisError> {
        let mut start = BytesStart::new(name);
        for (k, v) in attrs {
            start.push_attribute((*k, *v));
        }
        self.inner.write_event(Event::Empty(start)).map_err(wrap)
    }

    /// Escaped text content.
    pub fn text(&mut self, text: &str) -> Result<(), GisError> {
        self.inner
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(wrap)
    }

    /// Element with attributes and text content in one call.
    pub fn leaf(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), GisError> {
        self.open(name, attrs)?;
        self.text(text)?;
        self.close(name)
    }

    /// Take the finished document.
    pub fn finish(self) -> Result<String, GisError> {
        String::from_utf8(self.inner.into_inner()).map_err(|e| GisError::Xml(e.to_string()))
    }
}

fn wrap(e: std::io::Error) -> GisError {
    GisError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_document() {
        let mut w = XmlWriter::new();
        w.open("a", &[("id", "1")]).unwrap();
        w.leaf("b", &[], "text").unwrap();
        w.empty("c", &[("x", "y")]).unwrap();
        w.close("a").unwrap();
        assert_eq!(w.finish().unwrap(), r#"<a id="1"><b>text</b><c x="y"/></a>"#);
    }

    #[test]
    fn text_is_escaped() {
        let mut w = XmlWriter::new();
        w.leaf("v", &[], "a < b & c").unwrap();
        assert_eq!(w.finish().unwrap(), "<v>a &lt; b &amp; c</v>");
    }

    #[test]
    fn declaration_comes_first() {
        let mut w = XmlWriter::new();
        w.declaration().unwrap();
        w.empty("root", &[]).unwrap();
        let doc = w.finish().unwrap();
        assert!(doc.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }
}
