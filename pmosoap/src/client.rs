//! HTTP client for SOAP services
//!
//! # Example
//!
//! ```no_run
//! use pmosoap::{Client, UpnpFaultError};
//! use serde::{Deserialize, Serialize};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize)]
//! #[serde(rename = "u:GetVolume")]
//! struct GetVolume {
//!     #[serde(rename = "@xmlns:u")]
//!     xmlns: &'static str,
//!     #[serde(rename = "InstanceID")]
//!     instance_id: u32,
//!     #[serde(rename = "Channel")]
//!     channel: &'static str,
//! }
//!
//! #[derive(Deserialize)]
//! struct GetVolumeResponse {
//!     #[serde(rename = "CurrentVolume")]
//!     current_volume: u16,
//! }
//!
//! # async fn run() -> pmosoap::Result<()> {
//! const SERVICE: &str = "urn:schemas-upnp-org:service:RenderingControl:1";
//! let client = Client::new("http://192.168.1.10:1400/MediaRenderer/RenderingControl/Control")?;
//! let request = GetVolume { xmlns: SERVICE, instance_id: 0, channel: "Master" };
//!
//! let response: GetVolumeResponse = client
//!     .call::<_, _, UpnpFaultError>(
//!         &CancellationToken::new(),
//!         &format!("{SERVICE}#GetVolume"),
//!         &request,
//!     )
//!     .await?;
//! println!("volume: {}", response.current_volume);
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::envelope::ContentSlot;
use crate::error::{Error, Result};
use crate::fault::FaultError;
use crate::header::HeaderBuilder;
use crate::request::{ActionConvention, Request};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("pmosoap/", env!("CARGO_PKG_VERSION"));

/// SOAP client bound to one service endpoint.
///
/// The client holds the HTTP transport and the header builders applied to
/// every call. Both are read-only during a call, so a client can be shared
/// (`Arc<Client>` or `&Client`) between concurrent calls.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
    headers: Vec<Arc<dyn HeaderBuilder>>,
    convention: ActionConvention,
}

impl Client {
    /// Create a client with default transport settings
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::builder(endpoint).build()
    }

    pub fn builder(endpoint: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Create a client from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::builder(config.endpoint.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .action_convention(config.action_convention)
            .build()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the internal HTTP client
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    /// Replace the HTTP transport (timeouts, proxies, TLS, ...)
    pub fn set_http_client(&mut self, http: reqwest::Client) {
        self.http = http;
    }

    /// Registers header builders applied to every call, before per-call ones.
    pub fn add_header(&mut self, builder: Arc<dyn HeaderBuilder>) {
        self.headers.push(builder);
    }

    /// Starts a request against this client's endpoint.
    pub fn request<'a, T: Serialize + ?Sized>(
        &self,
        action: impl Into<String>,
        content: &'a T,
        response: Option<&'a mut dyn ContentSlot>,
    ) -> Request<'a, T> {
        Request::new(action, self.endpoint.clone(), content, response)
            .with_action_convention(self.convention)
    }

    /// Sends `request` and decodes the response into its bound target.
    ///
    /// - transport failures and cancellation are returned as is,
    /// - a 500 whose body is not a SOAP envelope gives [`Error::HttpStatus`]
    ///   with the raw body,
    /// - a SOAP Fault is converted through the request's [`FaultError`],
    /// - otherwise the bound target is populated and `Ok(())` returned.
    pub async fn do_request<T>(
        &self,
        mut request: Request<'_, T>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        request.prepend_headers(&self.headers);
        let http_request = request.http_request(&self.http)?;
        debug!(
            action = request.action(),
            endpoint = request.endpoint(),
            "sending SOAP request"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.http.execute(http_request) => response?,
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        debug!(
            status = status.as_u16(),
            content_type = ?content_type,
            "SOAP response received"
        );

        let fault_status = status == StatusCode::INTERNAL_SERVER_ERROR;
        if !fault_status {
            if let Some(content_type) = content_type.filter(|ct| !is_xml_content_type(ct)) {
                return Err(Error::UnsupportedContentType(content_type));
            }
        }

        let body = read_body(response, cancel).await?;
        let outcome = if fault_status {
            match request.decode_response(&body) {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(error = %err, "HTTP 500 response is not a SOAP envelope");
                    return Err(Error::HttpStatus {
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        } else {
            request.decode_response(&body)?
        };

        match outcome {
            Some(fault) => {
                debug!(error = %fault, "SOAP fault received");
                Err(fault)
            }
            None => Ok(()),
        }
    }

    /// Calls `action` and returns the decoded response.
    ///
    /// Faults are converted through `F`; use [`Fault`](crate::Fault) when the
    /// detail is not needed.
    pub async fn call<Req, Resp, F>(
        &self,
        cancel: &CancellationToken,
        action: &str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned + Send,
        F: FaultError,
    {
        let mut response: Option<Resp> = None;
        let soap_request = self
            .request(action, request, Some(&mut response))
            .with_fault::<F>();
        self.do_request(soap_request, cancel).await?;
        response.ok_or(Error::EmptyBody)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers.len())
            .field("convention", &self.convention)
            .finish()
    }
}

/// Reads the response body chunk by chunk, checking `cancel` between chunks.
async fn read_body(mut response: reqwest::Response, cancel: &CancellationToken) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = response.chunk() => chunk?,
        };
        match chunk {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => return Ok(body),
        }
    }
}

/// `text/xml`, `application/xml`, `application/soap+xml`, ...
fn is_xml_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.ends_with("/xml") || essence.ends_with("+xml")
}

/// Builder for [`Client`]
pub struct ClientBuilder {
    endpoint: String,
    timeout: Duration,
    user_agent: String,
    http: Option<reqwest::Client>,
    headers: Vec<Arc<dyn HeaderBuilder>>,
    convention: ActionConvention,
}

impl ClientBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http: None,
            headers: Vec::new(),
            convention: ActionConvention::default(),
        }
    }

    /// Request timeout, ignored when a custom HTTP client is set
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// User-Agent, ignored when a custom HTTP client is set
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Use a preconfigured HTTP client
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn header(mut self, builder: impl HeaderBuilder + 'static) -> Self {
        self.headers.push(Arc::new(builder));
        self
    }

    pub fn action_convention(mut self, convention: ActionConvention) -> Self {
        self.convention = convention;
        self
    }

    pub fn build(self) -> Result<Client> {
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .timeout(self.timeout)
                .user_agent(self.user_agent)
                .build()?,
        };
        Ok(Client {
            http,
            endpoint: self.endpoint,
            headers: self.headers,
            convention: self.convention,
        })
    }
}
