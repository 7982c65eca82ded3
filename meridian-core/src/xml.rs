//! Namespace-stripping XML element tree.
//!
//! OGC clients are inconsistent about namespace prefixes (`ogc:Filter`
//! vs `Filter`, `gml:id` vs `fid`), so every lookup here is by local
//! name. The tree is built once per request from quick-xml reader
//! events; documents are small (filter expressions and transaction
//! bodies), so a materialized tree is fine.

use crate::error::GisError;
use quick_xml::events::Event;
use quick_xml::Reader;

/// One parsed element: local name, attributes (local-name keys kept
/// alongside their original qualified form), text content, children.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Parse an XML document into an element tree.
    pub fn parse(input: &str) -> Result<XmlElement, GisError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    stack.push(element_from_start(e)?);
                }
                Ok(Event::Empty(ref e)) => {
                    let elem = element_from_start(e)?;
                    attach(&mut stack, &mut root, elem)?;
                }
                Ok(Event::Text(ref e)) => {
                    if let Some(top) = stack.last_mut() {
                        if let Ok(unescaped) = e.unescape() {
                            top.text.push_str(&unescaped);
                        }
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::End(_)) => {
                    let elem = stack
                        .pop()
                        .ok_or_else(|| GisError::Xml("unbalanced end tag".into()))?;
                    attach(&mut stack, &mut root, elem)?;
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(GisError::Xml(e.to_string())),
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(GisError::Xml("unclosed element".into()));
        }
        root.ok_or_else(|| GisError::Xml("empty document".into()))
    }

    /// Trimmed text content of this element.
    pub fn text_trimmed(&self) -> &str {
        self.text.trim()
    }

    /// Attribute value by local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| local_name(k) == local)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == local)
    }

    /// First descendant (depth-first, excluding self) with the given
    /// local name.
    pub fn descendant(&self, local: &str) -> Option<&XmlElement> {
        for c in &self.children {
            if c.name == local {
                return Some(c);
            }
            if let Some(found) = c.descendant(local) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants (depth-first, excluding self) with the given
    /// local name.
    pub fn descendants<'a>(&'a self, local: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_descendants(local, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, local: &str, out: &mut Vec<&'a XmlElement>) {
        for c in &self.children {
            if c.name == local {
                out.push(c);
            }
            c.collect_descendants(local, out);
        }
    }
}

fn element_from_start(e: &quick_xml::events::BytesStart) -> Result<XmlElement, GisError> {
    let qname = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| GisError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.0).to_string();
        // xmlns declarations are noise once prefixes are stripped
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| GisError::Xml(e.to_string()))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        name: local_name(&qname).to_string(),
        attrs,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    elem: XmlElement,
) -> Result<(), GisError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(elem);
        Ok(())
    } else if root.is_none() {
        *root = Some(elem);
        Ok(())
    } else {
        Err(GisError::Xml("multiple root elements".into()))
    }
}

/// Local part of a possibly-prefixed XML name.
pub fn local_name(qname: &str) -> &str {
    match qname.rsplit_once(':') {
        Some((_, local)) => local,
        None => qname,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_document() {
        let xml = r#"<ogc:Filter xmlns:ogc="http://www.opengis.net/ogc">
            <ogc:PropertyIsEqualTo matchCase="false">
                <ogc:PropertyName>status</ogc:PropertyName>
                <ogc:Literal>active</ogc:Literal>
            </ogc:PropertyIsEqualTo>
        </ogc:Filter>"#;

        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.name, "Filter");
        let cmp = root.child("PropertyIsEqualTo").unwrap();
        assert_eq!(cmp.attr("matchCase"), Some("false"));
        assert_eq!(
            cmp.descendant("PropertyName").unwrap().text_trimmed(),
            "status"
        );
        assert_eq!(cmp.descendant("Literal").unwrap().text_trimmed(), "active");
    }

    #[test]
    fn descendant_search_is_deep() {
        let xml = "<a><b><c><d>x</d></c></b></a>";
        let root = XmlElement::parse(xml).unwrap();
        assert_eq!(root.descendant("d").unwrap().text_trimmed(), "x");
        assert!(root.descendant("e").is_none());
    }

    #[test]
    fn self_closing_and_attributes() {
        let xml = r#"<Filter><FeatureId fid="gis:abc.42"/></Filter>"#;
        let root = XmlElement::parse(xml).unwrap();
        let fid = root.child("FeatureId").unwrap();
        assert_eq!(fid.attr("fid"), Some("gis:abc.42"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("not xml at all").is_err());
        assert!(XmlElement::parse("").is_err());
    }
}
