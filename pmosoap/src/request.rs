//! SOAP request builder

use crate::envelope::{Body, ContentSlot, Envelope, ResponseEnvelope};
use crate::error::{Error, Result};
use crate::fault::{Fault, FaultError, convert_fault};
use crate::header::{HeaderBuilder, RequestInfo};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Name of the SOAP 1.1 action header
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// How the SOAP action travels over HTTP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionConvention {
    /// `SOAPAction: "<action>"` with `text/xml` (SOAP 1.1)
    #[default]
    SoapActionHeader,
    /// `application/soap+xml; action="<action>"` (SOAP 1.2 binding)
    ContentTypeParameter,
}

impl ActionConvention {
    fn content_type(self, action: &str) -> String {
        match self {
            Self::SoapActionHeader => r#"text/xml; charset="utf-8""#.to_string(),
            Self::ContentTypeParameter => {
                format!(r#"application/soap+xml; charset=utf-8; action="{action}""#)
            }
        }
    }
}

/// A SOAP call waiting to be sent.
///
/// Binds the outbound payload, the target the response content decodes
/// into, and the [`FaultError`] type faults are converted through.
pub struct Request<'a, T: ?Sized> {
    action: String,
    endpoint: String,
    content: &'a T,
    response: Option<&'a mut dyn ContentSlot>,
    fault: fn(Fault) -> Error,
    headers: Vec<Arc<dyn HeaderBuilder>>,
    convention: ActionConvention,
}

impl<'a, T: Serialize + ?Sized> Request<'a, T> {
    /// Faults are reported as plain [`Fault`]s until [`Request::with_fault`]
    /// names a detail type.
    pub fn new(
        action: impl Into<String>,
        endpoint: impl Into<String>,
        content: &'a T,
        response: Option<&'a mut dyn ContentSlot>,
    ) -> Self {
        Self {
            action: action.into(),
            endpoint: endpoint.into(),
            content,
            response,
            fault: convert_fault::<Fault>,
            headers: Vec::new(),
            convention: ActionConvention::default(),
        }
    }

    /// Converts faults through `F`
    pub fn with_fault<F: FaultError>(mut self) -> Self {
        self.fault = convert_fault::<F>;
        self
    }

    pub fn with_action_convention(mut self, convention: ActionConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Appends header builders after the ones already registered.
    pub fn add_header(&mut self, builders: impl IntoIterator<Item = Arc<dyn HeaderBuilder>>) {
        self.headers.extend(builders);
    }

    pub(crate) fn prepend_headers(&mut self, builders: &[Arc<dyn HeaderBuilder>]) {
        self.headers.splice(0..0, builders.iter().cloned());
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the outbound envelope, running every header builder in order.
    pub fn envelope(&self) -> Result<Envelope> {
        let mut envelope = Envelope::new(self.content)?;
        for builder in &self.headers {
            let info = RequestInfo {
                action: &self.action,
                endpoint: &self.endpoint,
                content: envelope.content_xml(),
            };
            let elements = builder.build_headers(&info)?;
            envelope.add_headers(elements);
        }
        Ok(envelope)
    }

    /// Builds the HTTP POST carrying the encoded envelope.
    pub fn http_request(&self, client: &reqwest::Client) -> Result<reqwest::Request> {
        let url = Url::parse(&self.endpoint)?;
        let body = self.envelope()?.encode();

        let mut builder = client
            .post(url)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_str(&self.convention.content_type(&self.action))?,
            )
            .body(body);
        if self.convention == ActionConvention::SoapActionHeader {
            builder = builder.header(
                SOAP_ACTION_HEADER,
                HeaderValue::from_str(&format!(r#""{}""#, self.action))?,
            );
        }
        Ok(builder.build()?)
    }

    /// Decodes a response document into the bound target.
    ///
    /// A decoded fault comes back as `Ok(Some(error))`, already converted
    /// through the request's [`FaultError`].
    pub(crate) fn decode_response(&mut self, xml: &[u8]) -> Result<Option<Error>> {
        let content: Option<&mut dyn ContentSlot> = match &mut self.response {
            Some(slot) => Some(&mut **slot),
            None => None,
        };
        let mut envelope = ResponseEnvelope::new(content);
        envelope.decode(xml)?;
        Ok(match envelope.into_body() {
            Some(Body::Fault(fault)) => Some((self.fault)(fault)),
            _ => None,
        })
    }
}
