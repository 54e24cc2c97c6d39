//! Error types for the SOAP client

use crate::fault::FaultError;
use quick_xml::errors::serialize::{DeError, SeError};

/// Result type alias for SOAP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed XML, located by line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("XML syntax error on line {line}: {message}")]
pub struct SyntaxError {
    /// 1-based line at which the tokenizer stopped
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    /// Locates `message` at byte `offset` of `input`.
    pub(crate) fn at(input: &[u8], offset: usize, message: impl ToString) -> Self {
        let end = offset.min(input.len());
        let line = input[..end].iter().filter(|b| **b == b'\n').count() + 1;
        Self {
            line,
            message: message.to_string(),
        }
    }
}

/// Errors that can occur when calling a SOAP service
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP round trip failed (connection, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The caller cancelled the call while it was in flight
    #[error("SOAP call cancelled")]
    Cancelled,

    /// Malformed XML in the response or in a fault detail
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The envelope was decoded without a content target for a non-fault body
    #[error("envelope misconfigured: no content target bound for a non-fault body")]
    EnvelopeMisconfigured,

    /// Fault-class HTTP status whose body is not a SOAP envelope
    #[error("HTTP status {status} without a SOAP envelope ({} bytes)", .body.len())]
    HttpStatus { status: u16, body: Vec<u8> },

    /// A SOAP Fault converted through [`FaultError`]
    #[error("SOAP fault: {0}")]
    Fault(Box<dyn std::error::Error + Send + Sync>),

    /// The response is not XML (proxy page, HTML error, ...)
    #[error("unsupported content-type in response: {0}")]
    UnsupportedContentType(String),

    /// Envelope structure does not match the SOAP schema
    #[error("expected element <{expected}> but found <{found}>")]
    UnexpectedElement { expected: String, found: String },

    /// No Body element in the envelope
    #[error("missing SOAP Body")]
    MissingBody,

    /// A content target was bound but the Body has no child element
    #[error("SOAP Body has no content element")]
    EmptyBody,

    /// Caller payload could not be serialized
    #[error("XML serialization failed: {0}")]
    Serialize(#[from] SeError),

    /// Caller payload or fault detail could not be deserialized
    #[error("XML deserialization failed: {0}")]
    Deserialize(#[from] DeError),

    /// Invalid endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Action or content type not representable as an HTTP header
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Wraps a domain fault error
    pub fn fault(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fault(Box::new(err))
    }

    /// Returns the domain fault error if this is a SOAP fault of type `F`
    pub fn as_fault<F: FaultError>(&self) -> Option<&F> {
        match self {
            Self::Fault(err) => err.downcast_ref::<F>(),
            _ => None,
        }
    }

    /// Returns true if the server answered with a SOAP fault
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}
