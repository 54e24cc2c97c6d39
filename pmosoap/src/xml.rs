//! Namespace-aware element scanner over an in-memory XML document.
//!
//! The envelope decoder walks the document element by element and only
//! ever needs byte ranges back: the caller content and the fault detail
//! are handed out as raw fragments, everything else is plain text.

use crate::envelope::SOAP_ENV_NS;
use crate::error::{Error, Result, SyntaxError};
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use std::fmt::Display;
use std::ops::Range;

/// A start tag seen by the scanner
#[derive(Debug, Clone)]
pub(crate) struct Element {
    /// Element name is bound to the SOAP envelope namespace
    pub in_envelope_ns: bool,
    pub local: String,
    pub qualified: String,
    /// Offset of the opening `<`
    start: usize,
    /// Offset right after the start tag's `>`
    content_start: usize,
    empty: bool,
}

impl Element {
    pub fn is_envelope(&self, local: &str) -> bool {
        self.in_envelope_ns && self.local == local
    }

    pub fn is_empty(&self) -> bool {
        self.empty
    }
}

pub(crate) struct Scanner<'i> {
    reader: NsReader<&'i [u8]>,
    input: &'i [u8],
}

impl<'i> Scanner<'i> {
    pub fn new(input: &'i [u8]) -> Self {
        Self {
            reader: NsReader::from_reader(input),
            input,
        }
    }

    fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }

    pub fn syntax_error(&self, message: impl Display) -> Error {
        SyntaxError::at(self.input, self.position(), message).into()
    }

    fn read(&mut self) -> Result<(bool, Event<'i>)> {
        match self.reader.read_resolved_event() {
            Ok((ns, event)) => {
                let in_envelope_ns =
                    matches!(ns, ResolveResult::Bound(Namespace(uri)) if uri == SOAP_ENV_NS.as_bytes());
                Ok((in_envelope_ns, event))
            }
            Err(err) => Err(self.syntax_error(err)),
        }
    }

    fn check_attributes(&self, start: &BytesStart<'_>) -> Result<()> {
        for attr in start.attributes() {
            attr.map_err(|err| self.syntax_error(err))?;
        }
        Ok(())
    }

    fn element(&self, in_envelope_ns: bool, start: &BytesStart<'_>, offset: usize, empty: bool) -> Result<Element> {
        self.check_attributes(start)?;
        Ok(Element {
            in_envelope_ns,
            local: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            qualified: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            start: offset,
            content_start: self.position(),
            empty,
        })
    }

    /// Next child element of the current parent.
    ///
    /// Returns `None` once the parent's end tag (or, at the top level, the
    /// end of the document) is consumed.
    pub fn next_child(&mut self) -> Result<Option<Element>> {
        loop {
            let offset = self.position();
            let (in_envelope_ns, event) = self.read()?;
            match event {
                Event::Start(start) => {
                    return self.element(in_envelope_ns, &start, offset, false).map(Some);
                }
                Event::Empty(start) => {
                    return self.element(in_envelope_ns, &start, offset, true).map(Some);
                }
                Event::End(_) | Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    /// Consumes `element` up to its end tag and returns the byte range of
    /// its inner markup.
    pub fn inner(&mut self, element: &Element) -> Result<Range<usize>> {
        if element.empty {
            return Ok(element.content_start..element.content_start);
        }
        let mut depth = 0usize;
        loop {
            let offset = self.position();
            let (_, event) = self.read()?;
            match event {
                Event::Start(start) => {
                    self.check_attributes(&start)?;
                    depth += 1;
                }
                Event::Empty(start) => self.check_attributes(&start)?,
                Event::End(_) if depth == 0 => return Ok(element.content_start..offset),
                Event::End(_) => depth -= 1,
                Event::Eof => {
                    return Err(self.syntax_error(format!(
                        "unexpected end of document inside <{}>",
                        element.qualified
                    )));
                }
                _ => {}
            }
        }
    }

    /// Consumes `element` and returns the byte range of the whole element.
    pub fn outer(&mut self, element: &Element) -> Result<Range<usize>> {
        if element.empty {
            return Ok(element.start..element.content_start);
        }
        self.inner(element)?;
        Ok(element.start..self.position())
    }

    pub fn skip(&mut self, element: &Element) -> Result<()> {
        self.inner(element).map(|_| ())
    }

    /// Consumes `element` and returns its character data.
    ///
    /// Text is unescaped, CDATA sections are taken verbatim, comments and
    /// nested elements are dropped.
    pub fn text(&mut self, element: &Element) -> Result<String> {
        let mut text = String::new();
        if element.empty {
            return Ok(text);
        }
        loop {
            let offset = self.position();
            let (_, event) = self.read()?;
            let raw = self.slice(offset..self.position())?;
            match event {
                Event::End(_) => return Ok(text),
                Event::Eof => {
                    return Err(self.syntax_error(format!(
                        "unexpected end of document inside <{}>",
                        element.qualified
                    )));
                }
                Event::CData(_) => {
                    let data = raw
                        .strip_prefix("<![CDATA[")
                        .and_then(|data| data.strip_suffix("]]>"))
                        .unwrap_or(raw);
                    text.push_str(data);
                }
                Event::Start(start) => {
                    let child = self.element(false, &start, offset, false)?;
                    self.skip(&child)?;
                }
                Event::Empty(_)
                | Event::Comment(_)
                | Event::PI(_)
                | Event::Decl(_)
                | Event::DocType(_) => {}
                _ => {
                    let unescaped =
                        quick_xml::escape::unescape(raw).map_err(|err| self.syntax_error(err))?;
                    text.push_str(&unescaped);
                }
            }
        }
    }

    pub fn slice(&self, range: Range<usize>) -> Result<&'i str> {
        let input: &'i [u8] = self.input;
        std::str::from_utf8(&input[range]).map_err(|err| self.syntax_error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:Ping xmlns:u="urn:test" a="1"><v>1 &amp; 2</v></u:Ping></s:Body></s:Envelope>"#;

    #[test]
    fn test_namespace_resolution() {
        let mut scanner = Scanner::new(DOC.as_bytes());
        let envelope = scanner.next_child().unwrap().unwrap();
        assert!(envelope.is_envelope("Envelope"));
        let body = scanner.next_child().unwrap().unwrap();
        assert!(body.is_envelope("Body"));
        let ping = scanner.next_child().unwrap().unwrap();
        assert!(!ping.in_envelope_ns);
        assert_eq!(ping.local, "Ping");
        assert_eq!(ping.qualified, "u:Ping");
    }

    #[test]
    fn test_outer_and_text() {
        let mut scanner = Scanner::new(DOC.as_bytes());
        scanner.next_child().unwrap();
        scanner.next_child().unwrap();
        let ping = scanner.next_child().unwrap().unwrap();
        let range = scanner.outer(&ping).unwrap();
        assert_eq!(
            scanner.slice(range).unwrap(),
            r#"<u:Ping xmlns:u="urn:test" a="1"><v>1 &amp; 2</v></u:Ping>"#
        );

        let mut scanner = Scanner::new(DOC.as_bytes());
        scanner.next_child().unwrap();
        scanner.next_child().unwrap();
        scanner.next_child().unwrap();
        let v = scanner.next_child().unwrap().unwrap();
        assert_eq!(scanner.text(&v).unwrap(), "1 & 2");
    }

    #[test]
    fn test_empty_element_ranges() {
        let doc = r#"<root><leaf attr="x"/></root>"#;
        let mut scanner = Scanner::new(doc.as_bytes());
        scanner.next_child().unwrap();
        let leaf = scanner.next_child().unwrap().unwrap();
        assert!(leaf.is_empty());
        let range = scanner.outer(&leaf).unwrap();
        assert_eq!(scanner.slice(range).unwrap(), r#"<leaf attr="x"/>"#);
        assert!(scanner.next_child().unwrap().is_none());
    }

    #[test]
    fn test_unterminated_element() {
        let doc = "<root>\n<child>text";
        let mut scanner = Scanner::new(doc.as_bytes());
        scanner.next_child().unwrap();
        let child = scanner.next_child().unwrap().unwrap();
        assert!(matches!(scanner.skip(&child), Err(Error::Syntax(_))));
    }

    #[test]
    fn test_text_with_cdata() {
        let doc = "<root><v>a &lt; <![CDATA[b < c & d]]><!-- note --> e</v></root>";
        let mut scanner = Scanner::new(doc.as_bytes());
        scanner.next_child().unwrap();
        let v = scanner.next_child().unwrap().unwrap();
        assert_eq!(scanner.text(&v).unwrap(), "a < b < c & d e");
        assert!(scanner.next_child().unwrap().is_none());
    }
}
