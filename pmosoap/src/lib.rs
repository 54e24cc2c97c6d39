//! # pmosoap - SOAP client for PMOMusic
//!
//! This crate builds SOAP 1.1 request envelopes, sends them over HTTP and
//! decodes the response envelope into caller types, telling a successful
//! reply apart from a SOAP Fault.
//!
//! ## Features
//!
//! - **Envelope codec**: caller payloads are plain serde types, their
//!   element names and namespaces come from their own serde shape
//! - **Faults**: `faultcode`/`faultstring`/`faultactor` are decoded eagerly,
//!   the vendor specific `detail` is kept raw and decoded on demand
//! - **Header builders**: pluggable contributors to the SOAP `Header`
//!   (WS-Addressing, WS-Security, ...)
//! - **Client**: cancellable calls, raw body kept for non-SOAP HTTP 500s
//! - **Configuration**: YAML + environment overrides
//!
//! ## Architecture
//!
//! - [`Envelope`] / [`ResponseEnvelope`] : encode and decode
//! - [`Fault`], [`FaultError`], [`SoapFaultError`] : fault model
//! - [`HeaderBuilder`] : header contributions
//! - [`Request`] : one call, bound to its response target
//! - [`Client`] : transport and call orchestration
//!
//! ## Example
//!
//! ```no_run
//! use pmosoap::{Client, Fault};
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize)]
//! #[serde(rename = "u:Play")]
//! struct Play {
//!     #[serde(rename = "@xmlns:u")]
//!     xmlns: &'static str,
//!     #[serde(rename = "InstanceID")]
//!     instance_id: u32,
//!     #[serde(rename = "Speed")]
//!     speed: &'static str,
//! }
//!
//! #[derive(Deserialize)]
//! struct PlayResponse {}
//!
//! # async fn run() -> pmosoap::Result<()> {
//! const AVTRANSPORT: &str = "urn:schemas-upnp-org:service:AVTransport:1";
//! let client = Client::new("http://192.168.1.10:1400/MediaRenderer/AVTransport/Control")?;
//! let play = Play { xmlns: AVTRANSPORT, instance_id: 0, speed: "1" };
//!
//! let _: PlayResponse = client
//!     .call::<_, _, Fault>(&CancellationToken::new(), &format!("{AVTRANSPORT}#Play"), &play)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod fault;
pub mod header;
pub mod request;

mod xml;

// Re-exports
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use envelope::{
    Body, ContentSlot, Envelope, ResponseEnvelope, SOAP_ENV_NS, SOAP_ENV_PREFIX,
};
pub use error::{Error, Result, SyntaxError};
pub use fault::{
    Fault, FaultError, SoapFaultError, UPNP_CONTROL_NS, UpnpError, UpnpFaultError,
    upnp_error_codes,
};
pub use header::{Header, HeaderBuilder, HeaderElement, RequestInfo, StaticHeaders};
pub use request::{ActionConvention, Request, SOAP_ACTION_HEADER};
