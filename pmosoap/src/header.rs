//! SOAP header contributions
//!
//! A [`HeaderBuilder`] is asked for header elements every time a request
//! envelope is built. Builders run in registration order and each may
//! append any number of sibling elements to the `Header`; WS-Security
//! timestamps or tokens plug in here.

use crate::error::Result;
use serde::Serialize;

/// A single header element, kept as serialized XML
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderElement(String);

impl HeaderElement {
    /// Wraps already serialized XML, which must be a single element.
    pub fn raw(xml: impl Into<String>) -> Self {
        Self(xml.into())
    }

    /// Serializes `value` with its own serde shape.
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(quick_xml::se::to_string(value)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordered header elements of an envelope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    elements: Vec<HeaderElement>,
}

impl Header {
    pub fn elements(&self) -> &[HeaderElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub(crate) fn push(&mut self, element: HeaderElement) {
        self.elements.push(element);
    }

    pub(crate) fn extend(&mut self, elements: impl IntoIterator<Item = HeaderElement>) {
        self.elements.extend(elements);
    }
}

/// What a [`HeaderBuilder`] can see of the request being built
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub action: &'a str,
    pub endpoint: &'a str,
    /// Serialized Body content, e.g. for signing
    pub content: &'a str,
}

/// Contributes header elements to outgoing envelopes.
///
/// Implementations may hold their own configuration or secrets but are
/// shared between concurrent calls, hence `&self`.
pub trait HeaderBuilder: Send + Sync {
    fn build_headers(&self, request: &RequestInfo<'_>) -> Result<Vec<HeaderElement>>;
}

impl<F> HeaderBuilder for F
where
    F: Fn(&RequestInfo<'_>) -> Result<Vec<HeaderElement>> + Send + Sync,
{
    fn build_headers(&self, request: &RequestInfo<'_>) -> Result<Vec<HeaderElement>> {
        self(request)
    }
}

/// Adds the same elements to every request
#[derive(Debug, Clone, Default)]
pub struct StaticHeaders {
    elements: Vec<HeaderElement>,
}

impl StaticHeaders {
    pub fn new(elements: Vec<HeaderElement>) -> Self {
        Self { elements }
    }

    pub fn with(mut self, element: HeaderElement) -> Self {
        self.elements.push(element);
        self
    }
}

impl HeaderBuilder for StaticHeaders {
    fn build_headers(&self, _request: &RequestInfo<'_>) -> Result<Vec<HeaderElement>> {
        Ok(self.elements.clone())
    }
}
