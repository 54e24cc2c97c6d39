//! SOAP Faults
//!
//! A [`Fault`] keeps its `detail` element as raw XML: the detail schema is
//! vendor specific and only known once the caller names a target type,
//! either through [`Fault::decode_detail`] or through a [`FaultError`]
//! implementation handed to the client.

use crate::envelope::{SOAP_ENV_NS, SOAP_ENV_PREFIX};
use crate::error::{Error, Result};
use crate::xml::{Element, Scanner};
use quick_xml::escape::escape;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SOAP Fault (`{SOAP-ENV}Fault`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fault {
    /// `faultcode` (ex: "s:Client")
    pub code: String,

    /// `faultstring`, human readable
    pub string: String,

    /// `faultactor`, absent on most responses
    pub actor: Option<String>,

    detail: Option<String>,
}

impl Fault {
    pub fn new(code: impl Into<String>, string: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            string: string.into(),
            ..Self::default()
        }
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Sets the raw inner XML of `detail`.
    pub fn with_detail_raw(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Serializes `detail` as the single child of `detail`.
    pub fn with_detail<D: Serialize + ?Sized>(self, detail: &D) -> Result<Self> {
        Ok(self.with_detail_raw(quick_xml::se::to_string(detail)?))
    }

    /// Inner XML of the `detail` element, verbatim; `None` without `detail`.
    pub fn detail_raw(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Decodes the captured detail into `D`.
    ///
    /// Returns `Ok(None)` when the fault has no (or an empty) `detail`.
    pub fn decode_detail<D: DeserializeOwned>(&self) -> Result<Option<D>> {
        match self.detail.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(quick_xml::de::from_str(raw)?)),
        }
    }

    /// Renders a complete fault response envelope.
    pub fn to_envelope(&self) -> String {
        let p = SOAP_ENV_PREFIX;
        let mut xml = format!(r#"<{p}:Envelope xmlns:{p}="{SOAP_ENV_NS}"><{p}:Body><{p}:Fault>"#);
        xml.push_str(&format!("<faultcode>{}</faultcode>", escape(&self.code)));
        xml.push_str(&format!("<faultstring>{}</faultstring>", escape(&self.string)));
        if let Some(actor) = &self.actor {
            xml.push_str(&format!("<faultactor>{}</faultactor>", escape(actor)));
        }
        if let Some(detail) = &self.detail {
            xml.push_str(&format!("<detail>{detail}</detail>"));
        }
        xml.push_str(&format!("</{p}:Fault></{p}:Body></{p}:Envelope>"));
        xml
    }

    pub(crate) fn decode(scanner: &mut Scanner<'_>, element: &Element) -> Result<Self> {
        let mut fault = Self::default();
        if element.is_empty() {
            return Ok(fault);
        }
        while let Some(child) = scanner.next_child()? {
            match child.local.as_str() {
                "faultcode" => fault.code = scanner.text(&child)?,
                "faultstring" => fault.string = scanner.text(&child)?,
                "faultactor" => fault.actor = Some(scanner.text(&child)?),
                "detail" => {
                    let range = scanner.inner(&child)?;
                    fault.detail = Some(scanner.slice(range)?.to_owned());
                }
                _ => scanner.skip(&child)?,
            }
        }
        Ok(fault)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.string)?;
        if let Some(actor) = &self.actor {
            write!(f, " (actor {actor})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}

/// Turns a decoded [`Fault`] into a domain error.
///
/// Implementations decode the raw detail into their own schema and keep
/// code, string and actor alongside it. The client boxes the result into
/// [`Error::Fault`]; [`Error::as_fault`] gets it back.
pub trait FaultError: std::error::Error + Send + Sync + Sized + 'static {
    fn from_fault(fault: Fault) -> Result<Self>;
}

impl FaultError for Fault {
    fn from_fault(fault: Fault) -> Result<Self> {
        Ok(fault)
    }
}

/// Converts `fault` through `F`, a failing detail decode wins.
pub(crate) fn convert_fault<F: FaultError>(fault: Fault) -> Error {
    match F::from_fault(fault) {
        Ok(err) => Error::fault(err),
        Err(err) => err,
    }
}

/// Fault with a typed detail
#[derive(Debug, Clone, PartialEq)]
pub struct SoapFaultError<D> {
    pub code: String,
    pub string: String,
    pub actor: Option<String>,
    pub detail: Option<D>,
}

impl<D: fmt::Debug> fmt::Display for SoapFaultError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.string)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail:?})")?;
        }
        Ok(())
    }
}

impl<D: fmt::Debug> std::error::Error for SoapFaultError<D> {}

impl<D> FaultError for SoapFaultError<D>
where
    D: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    fn from_fault(fault: Fault) -> Result<Self> {
        let detail = fault.decode_detail()?;
        Ok(Self {
            code: fault.code,
            string: fault.string,
            actor: fault.actor,
            detail,
        })
    }
}

/// UPnP control namespace of `UPnPError`
pub const UPNP_CONTROL_NS: &str = "urn:schemas-upnp-org:control-1-0";

/// Standard UPnP action error codes
pub mod upnp_error_codes {
    /// Action invalide
    pub const INVALID_ACTION: u32 = 401;

    /// Arguments invalides
    pub const INVALID_ARGS: u32 = 402;

    /// Action échouée
    pub const ACTION_FAILED: u32 = 501;

    /// Valeur d'argument invalide
    pub const ARGUMENT_VALUE_INVALID: u32 = 600;

    /// Argument hors limites
    pub const ARGUMENT_VALUE_OUT_OF_RANGE: u32 = 601;

    /// Action optionnelle non implémentée
    pub const OPTIONAL_ACTION_NOT_IMPLEMENTED: u32 = 602;

    /// Mémoire insuffisante
    pub const OUT_OF_MEMORY: u32 = 603;

    /// Intervention humaine requise
    pub const HUMAN_INTERVENTION_REQUIRED: u32 = 604;

    /// Argument sous forme de chaîne trop long
    pub const STRING_ARGUMENT_TOO_LONG: u32 = 605;
}

fn upnp_control_ns() -> String {
    UPNP_CONTROL_NS.to_string()
}

/// UPnP fault detail (`<UPnPError>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "UPnPError")]
pub struct UpnpError {
    #[serde(rename = "@xmlns", skip_deserializing, default = "upnp_control_ns")]
    xmlns: String,

    #[serde(rename = "errorCode")]
    pub error_code: u32,

    #[serde(rename = "errorDescription", default)]
    pub error_description: String,
}

impl UpnpError {
    pub fn new(error_code: u32, error_description: impl Into<String>) -> Self {
        Self {
            xmlns: upnp_control_ns(),
            error_code,
            error_description: error_description.into(),
        }
    }
}

/// Fault raised by UPnP control points
pub type UpnpFaultError = SoapFaultError<UpnpError>;
