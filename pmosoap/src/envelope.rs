//! SOAP envelope codec
//!
//! The outbound [`Envelope`] wraps a serialized caller payload (and the
//! header elements contributed by [`HeaderBuilder`](crate::HeaderBuilder)s)
//! into `Envelope/Header?/Body`. The inbound [`ResponseEnvelope`] decodes a
//! response document whose Body carries either caller-defined content or a
//! SOAP Fault:
//!
//! - the Body's first child is inspected once; if it is `{SOAP-ENV}Fault`
//!   the fault is decoded and its `detail` captured verbatim,
//! - otherwise the child is handed as a raw fragment to the [`ContentSlot`]
//!   bound at construction time.

use crate::error::{Error, Result};
use crate::fault::Fault;
use crate::header::{Header, HeaderElement};
use crate::xml::{Element, Scanner};
use serde::Serialize;
use serde::de::{self, DeserializeOwned};
use tracing::trace;

/// SOAP 1.1 envelope namespace
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Prefix bound to [`SOAP_ENV_NS`] on encoded envelopes
pub const SOAP_ENV_PREFIX: &str = "soapenv";

/// Outbound SOAP envelope
#[derive(Debug, Clone)]
pub struct Envelope {
    header: Option<Header>,
    content: String,
}

impl Envelope {
    /// Serializes `content` as the Body's single child.
    ///
    /// The element name, namespace and attributes of the content come from
    /// its own serde shape (`#[serde(rename = "ns:Name")]`, `@xmlns:ns`
    /// attributes, ...).
    pub fn new<T: Serialize + ?Sized>(content: &T) -> Result<Self> {
        Ok(Self {
            header: None,
            content: quick_xml::se::to_string(content)?,
        })
    }

    /// Serialized Body content
    pub fn content_xml(&self) -> &str {
        &self.content
    }

    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Appends header elements; the Header stays absent while empty.
    pub fn add_headers(&mut self, elements: impl IntoIterator<Item = HeaderElement>) {
        let mut elements = elements.into_iter().peekable();
        if elements.peek().is_none() {
            return;
        }
        self.header.get_or_insert_with(Header::default).extend(elements);
    }

    /// Renders the envelope document.
    pub fn encode(&self) -> String {
        let p = SOAP_ENV_PREFIX;
        let mut xml = format!(r#"<{p}:Envelope xmlns:{p}="{SOAP_ENV_NS}">"#);
        if let Some(header) = self.header.as_ref().filter(|h| !h.is_empty()) {
            xml.push_str(&format!("<{p}:Header>"));
            for element in header.elements() {
                xml.push_str(element.as_str());
            }
            xml.push_str(&format!("</{p}:Header>"));
        }
        xml.push_str(&format!("<{p}:Body>"));
        xml.push_str(&self.content);
        xml.push_str(&format!("</{p}:Body></{p}:Envelope>"));
        xml
    }
}

/// Type-erased decode target for the Body content.
///
/// Implemented for `Option<T>` of any deserializable `T`: a successful
/// decode stores `Some(value)` in place.
pub trait ContentSlot: Send {
    /// Decodes `fragment`, a standalone XML element named `local_name`
    /// (without prefix), into `self`.
    fn decode_content(&mut self, local_name: &str, fragment: &str) -> Result<()>;
}

impl<T: DeserializeOwned + Send> ContentSlot for Option<T> {
    fn decode_content(&mut self, local_name: &str, fragment: &str) -> Result<()> {
        // quick-xml does not look at the root element name
        if let Some(name) = struct_name::<T>() {
            let expected = name.rsplit(':').next().unwrap_or(name);
            if expected != local_name {
                return Err(Error::UnexpectedElement {
                    expected: expected.to_string(),
                    found: local_name.to_string(),
                });
            }
        }
        *self = Some(quick_xml::de::from_str(fragment)?);
        Ok(())
    }
}

/// Serde container name of `T`, when `T` deserializes as a struct.
fn struct_name<T: DeserializeOwned>() -> Option<&'static str> {
    let mut name = None;
    let _ = T::deserialize(NameTracer(&mut name));
    name
}

/// Deserializer that fails on first use, recording the struct name asked for.
struct NameTracer<'a>(&'a mut Option<&'static str>);

impl<'de> de::Deserializer<'de> for NameTracer<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: de::Visitor<'de>>(
        self,
        _visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: de::Visitor<'de>>(
        self,
        name: &'static str,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        *self.0 = Some(name);
        Err(de::Error::custom("struct name traced"))
    }

    fn deserialize_unit_struct<V: de::Visitor<'de>>(
        self,
        name: &'static str,
        _visitor: V,
    ) -> std::result::Result<V::Value, Self::Error> {
        *self.0 = Some(name);
        Err(de::Error::custom("struct name traced"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit newtype_struct seq tuple tuple_struct map
        enum identifier ignored_any
    }
}

/// Outcome of a decoded Body
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// The bound content target was populated
    Content,
    /// The server answered with a SOAP Fault
    Fault(Fault),
}

/// Inbound SOAP envelope bound to a caller-owned content target
pub struct ResponseEnvelope<'a> {
    content: Option<&'a mut dyn ContentSlot>,
    header: Option<Header>,
    body: Option<Body>,
}

impl<'a> ResponseEnvelope<'a> {
    /// Binds `content` as the expected shape of a successful Body.
    ///
    /// With `None`, only fault bodies decode; anything else, an empty Body
    /// included, fails with [`Error::EnvelopeMisconfigured`].
    pub fn new(content: Option<&'a mut dyn ContentSlot>) -> Self {
        Self {
            content,
            header: None,
            body: None,
        }
    }

    /// Header elements of the decoded response, verbatim
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn fault(&self) -> Option<&Fault> {
        match &self.body {
            Some(Body::Fault(fault)) => Some(fault),
            _ => None,
        }
    }

    pub fn into_body(self) -> Option<Body> {
        self.body
    }

    /// Decodes a response document.
    pub fn decode(&mut self, xml: &[u8]) -> Result<()> {
        let mut scanner = Scanner::new(xml);
        let root = match scanner.next_child()? {
            Some(root) => root,
            None => return Err(scanner.syntax_error("no root element")),
        };
        expect_envelope_element(&root, "Envelope")?;
        if root.is_empty() {
            return Err(Error::MissingBody);
        }

        let mut header = None;
        let mut body = None;
        while let Some(child) = scanner.next_child()? {
            if body.is_none() && header.is_none() && child.is_envelope("Header") {
                header = decode_header(&mut scanner, &child)?;
            } else if body.is_none() && child.is_envelope("Body") {
                body = Some(self.decode_body(&mut scanner, &child)?);
            } else {
                scanner.skip(&child)?;
            }
        }

        let body = body.ok_or(Error::MissingBody)?;
        trace!(fault = matches!(body, Body::Fault(_)), "decoded SOAP envelope");
        self.header = header;
        self.body = Some(body);
        Ok(())
    }

    fn decode_body(&mut self, scanner: &mut Scanner<'_>, element: &Element) -> Result<Body> {
        let first = if element.is_empty() {
            None
        } else {
            scanner.next_child()?
        };
        let Some(first) = first else {
            return match self.content {
                Some(_) => Err(Error::EmptyBody),
                None => Err(Error::EnvelopeMisconfigured),
            };
        };

        let body = if first.is_envelope("Fault") {
            Body::Fault(Fault::decode(scanner, &first)?)
        } else {
            let slot = self.content.as_mut().ok_or(Error::EnvelopeMisconfigured)?;
            let range = scanner.outer(&first)?;
            slot.decode_content(&first.local, scanner.slice(range)?)?;
            Body::Content
        };

        while let Some(extra) = scanner.next_child()? {
            scanner.skip(&extra)?;
        }
        Ok(body)
    }
}

fn expect_envelope_element(element: &Element, local: &str) -> Result<()> {
    if element.is_envelope(local) {
        Ok(())
    } else {
        Err(Error::UnexpectedElement {
            expected: format!("{{{SOAP_ENV_NS}}}{local}"),
            found: element.qualified.clone(),
        })
    }
}

fn decode_header(scanner: &mut Scanner<'_>, element: &Element) -> Result<Option<Header>> {
    let mut header = Header::default();
    if !element.is_empty() {
        while let Some(child) = scanner.next_child()? {
            let range = scanner.outer(&child)?;
            header.push(HeaderElement::raw(scanner.slice(range)?));
        }
    }
    Ok((!header.is_empty()).then_some(header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn default_ns() -> String {
        "ns".to_string()
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename = "ns:HeaderExample")]
    struct HeaderExample {
        #[serde(rename = "@xmlns:ns")]
        xmlns: String,
        #[serde(rename = "@attr1")]
        attr1: i32,
        #[serde(rename = "$text")]
        value: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ContentField {
        #[serde(rename = "@attr1")]
        attr1: String,
        #[serde(rename = "@attr2")]
        attr2: i32,
        #[serde(rename = "$text")]
        value: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename = "ns:ContentExample")]
    struct ContentExample {
        #[serde(rename = "@xmlns:ns", skip_deserializing, default = "default_ns")]
        xmlns: String,
        #[serde(rename = "@attr1")]
        attr1: i32,
        #[serde(rename = "ns:ContentField", alias = "ContentField")]
        field1: ContentField,
    }

    fn content() -> ContentExample {
        ContentExample {
            xmlns: default_ns(),
            attr1: 10,
            field1: ContentField {
                attr1: "test attr".to_string(),
                attr2: 11,
                value: "This is a test string".to_string(),
            },
        }
    }

    #[derive(Debug, Deserialize)]
    struct DetailExample {
        #[serde(rename = "@attr1")]
        attr1: String,
        #[serde(rename = "DetailField")]
        field: ContentField,
    }

    #[test]
    fn test_encode_without_header() {
        let envelope = Envelope::new(&content()).unwrap();
        assert!(envelope.header().is_none());
        assert_eq!(
            envelope.encode(),
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Body><ns:ContentExample xmlns:ns="ns" attr1="10"><ns:ContentField attr1="test attr" attr2="11">This is a test string</ns:ContentField></ns:ContentExample></soapenv:Body></soapenv:Envelope>"#
        );
    }

    #[test]
    fn test_encode_with_header() {
        let mut envelope = Envelope::new(&content()).unwrap();
        let header = HeaderExample {
            xmlns: default_ns(),
            attr1: 15,
            value: "test header value".to_string(),
        };
        envelope.add_headers(vec![HeaderElement::serialize(&header).unwrap()]);
        assert_eq!(
            envelope.encode(),
            r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"><soapenv:Header><ns:HeaderExample xmlns:ns="ns" attr1="15">test header value</ns:HeaderExample></soapenv:Header><soapenv:Body><ns:ContentExample xmlns:ns="ns" attr1="10"><ns:ContentField attr1="test attr" attr2="11">This is a test string</ns:ContentField></ns:ContentExample></soapenv:Body></soapenv:Envelope>"#
        );
    }

    #[test]
    fn test_add_no_headers_keeps_header_absent() {
        let mut envelope = Envelope::new(&content()).unwrap();
        envelope.add_headers(Vec::new());
        assert!(envelope.header().is_none());
        assert!(!envelope.encode().contains("Header"));
    }

    #[test]
    fn test_round_trip() {
        let original = content();
        let xml = Envelope::new(&original).unwrap().encode();

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        envelope.decode(xml.as_bytes()).unwrap();
        assert_eq!(envelope.body(), Some(&Body::Content));
        drop(envelope);
        assert_eq!(decoded, Some(original));
    }

    #[test]
    fn test_decode_content() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<ContentExample xmlns="ns" attr1="10">
						<ContentField attr1="test attr" attr2="11">This is a test content string</ContentField>
					</ContentExample>
				</soap:Body>
			</soap:Envelope>"#;

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        envelope.decode(xml.as_bytes()).unwrap();
        assert!(envelope.fault().is_none());
        assert!(envelope.header().is_none());
        drop(envelope);

        let decoded = decoded.unwrap();
        assert_eq!(decoded.attr1, 10);
        assert_eq!(decoded.field1.attr1, "test attr");
        assert_eq!(decoded.field1.attr2, 11);
        assert_eq!(decoded.field1.value, "This is a test content string");
    }

    #[test]
    fn test_decode_fault_with_detail() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<soap:Fault>
						<faultcode>FaultCodeValue</faultcode>
						<faultstring>FaultStringValue</faultstring>
						<faultactor>FaultActorValue</faultactor>
						<detail>
							<DetailExample attr1="10">
								<DetailField attr1="test" attr2="11">This is a test string</DetailField>
							</DetailExample>
						</detail>
					</soap:Fault>
				</soap:Body>
			</soap:Envelope>"#;

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        envelope.decode(xml.as_bytes()).unwrap();
        let fault = envelope.fault().cloned().unwrap();
        drop(envelope);
        assert!(decoded.is_none());

        assert_eq!(fault.code, "FaultCodeValue");
        assert_eq!(fault.string, "FaultStringValue");
        assert_eq!(fault.actor.as_deref(), Some("FaultActorValue"));

        let raw = fault.detail_raw().unwrap();
        assert!(raw.starts_with("\n\t\t\t\t\t\t\t<DetailExample attr1=\"10\">"));
        assert!(raw.ends_with("</DetailExample>\n\t\t\t\t\t\t"));

        let detail: DetailExample = fault.decode_detail().unwrap().unwrap();
        assert_eq!(detail.attr1, "10");
        assert_eq!(detail.field.attr2, 11);
        assert_eq!(detail.field.value, "This is a test string");
    }

    #[test]
    fn test_decode_fault_without_detail() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<soap:Fault>
						<faultcode>FaultCodeValue</faultcode>
						<faultstring>FaultStringValue</faultstring>
					</soap:Fault>
				</soap:Body>
			</soap:Envelope>"#;

        let mut envelope = ResponseEnvelope::new(None);
        envelope.decode(xml.as_bytes()).unwrap();
        let fault = envelope.fault().unwrap();
        assert_eq!(fault.code, "FaultCodeValue");
        assert_eq!(fault.string, "FaultStringValue");
        assert_eq!(fault.actor, None);
        assert_eq!(fault.detail_raw(), None);
        assert!(fault.decode_detail::<DetailExample>().unwrap().is_none());
    }

    #[test]
    fn test_decode_mismatched_end_tag() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<ContentExample xmlns="ns" attr1="10">
						<ContentField attr1="test attr" attr2="11">This is a test content string</ContentField>
				</soap:Body>
					</ContentExample>
			</soap:Envelope>"#;

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        match envelope.decode(xml.as_bytes()) {
            Err(Error::Syntax(err)) => assert_eq!(err.line, 6),
            other => panic!("expected syntax error, got {other:?}"),
        }
        drop(envelope);
        assert!(decoded.is_none());
    }

    #[test]
    fn test_decode_bad_attribute() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<ContentExample xmlns="ns" attr1="10">
						<ContentField attr1="test attr", attr2="11">This is a test content string</ContentField>
					</ContentExample>
				</soap:Body>
			</soap:Envelope>"#;

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        match envelope.decode(xml.as_bytes()) {
            Err(Error::Syntax(err)) => assert_eq!(err.line, 5),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_malformed_fault_code() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<soap:Fault>
						<faultcode>FaultCodeValue</faultcode
						<faultstring>FaultStringValue</faultstring>
					</soap:Fault>
				</soap:Body>
			</soap:Envelope>"#;

        let mut envelope = ResponseEnvelope::new(None);
        match envelope.decode(xml.as_bytes()) {
            Err(Error::Syntax(err)) => assert_eq!(err.line, 6),
            other => panic!("expected syntax error, got {other:?}"),
        }
        assert!(envelope.body().is_none());
    }

    #[test]
    fn test_decode_without_content_target() {
        let xml = r#"<?xml version="1.0"?>
			<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
				<soap:Body>
					<ContentExample xmlns="ns" attr1="10">
						<ContentField attr1="test attr", attr2="11">This is a test content string</ContentField>
					</ContentExample>
				</soap:Body>
			</soap:Envelope>"#;

        let mut envelope = ResponseEnvelope::new(None);
        assert!(matches!(
            envelope.decode(xml.as_bytes()),
            Err(Error::EnvelopeMisconfigured)
        ));
    }

    #[test]
    fn test_decode_unqualified_fault_is_content() {
        let xml = r#"<Envelope xmlns="http://schemas.xmlsoap.org/soap/envelope/"><Body><Fault xmlns=""><faultcode>x</faultcode></Fault></Body></Envelope>"#;

        let mut envelope = ResponseEnvelope::new(None);
        assert!(matches!(
            envelope.decode(xml.as_bytes()),
            Err(Error::EnvelopeMisconfigured)
        ));
    }

    #[test]
    fn test_decode_response_header() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Header><t:Session xmlns:t="urn:t">42</t:Session><t:Trace xmlns:t="urn:t"/></s:Header><s:Body><s:Fault><faultcode>s:Server</faultcode><faultstring>busy</faultstring></s:Fault></s:Body></s:Envelope>"#;

        let mut envelope = ResponseEnvelope::new(None);
        envelope.decode(xml.as_bytes()).unwrap();
        let header = envelope.header().unwrap();
        assert_eq!(header.len(), 2);
        let raw: Vec<&str> = header.elements().iter().map(|e| e.as_str()).collect();
        assert_eq!(
            raw,
            vec![
                r#"<t:Session xmlns:t="urn:t">42</t:Session>"#,
                r#"<t:Trace xmlns:t="urn:t"/>"#,
            ]
        );
        assert_eq!(envelope.fault().map(|f| f.string.as_str()), Some("busy"));
    }

    #[test]
    fn test_decode_empty_body_without_target() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body/></s:Envelope>"#;

        let mut envelope = ResponseEnvelope::new(None);
        assert!(matches!(
            envelope.decode(xml.as_bytes()),
            Err(Error::EnvelopeMisconfigured)
        ));
        assert!(envelope.body().is_none());
    }

    #[test]
    fn test_decode_other_operation_is_rejected() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><ns:SomethingElse xmlns:ns="ns" attr1="10"><ContentField attr1="a" attr2="1">x</ContentField></ns:SomethingElse></s:Body></s:Envelope>"#;

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        match envelope.decode(xml.as_bytes()) {
            Err(Error::UnexpectedElement { expected, found }) => {
                assert_eq!(expected, "ContentExample");
                assert_eq!(found, "SomethingElse");
            }
            other => panic!("expected unexpected element, got {other:?}"),
        }
        drop(envelope);
        assert!(decoded.is_none());
    }

    #[test]
    fn test_struct_name() {
        assert_eq!(struct_name::<ContentExample>(), Some("ns:ContentExample"));
        assert_eq!(struct_name::<String>(), None);
    }

    #[test]
    fn test_decode_empty_body_with_target() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body></s:Body></s:Envelope>"#;

        let mut decoded: Option<ContentExample> = None;
        let mut envelope = ResponseEnvelope::new(Some(&mut decoded));
        assert!(matches!(envelope.decode(xml.as_bytes()), Err(Error::EmptyBody)));
    }

    #[test]
    fn test_decode_wrong_root() {
        let xml = r#"<html><body>Bad gateway</body></html>"#;
        let mut envelope = ResponseEnvelope::new(None);
        match envelope.decode(xml.as_bytes()) {
            Err(Error::UnexpectedElement { found, .. }) => assert_eq!(found, "html"),
            other => panic!("expected unexpected element, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_body() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Header/></s:Envelope>"#;
        let mut envelope = ResponseEnvelope::new(None);
        assert!(matches!(envelope.decode(xml.as_bytes()), Err(Error::MissingBody)));
    }
}
