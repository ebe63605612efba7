use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crux_http::{Http, RequestBuilder};

use crate::event::ZoomDirection;

pub const MAX_URL_LENGTH: usize = 2048;

/// Header asking the device for a high-precision location fix.
pub const PRECISION_HEADER: (&str, &str) = ("GPS-mode", "fine");

/// The device rejects control bodies with any other content type.
pub const CONTROL_CONTENT_TYPE: &str = "text/plain";

// --- Device resources ---

/// JSON resources the device serves for polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// Stream connections and location.
    Status,
    /// Battery and torch.
    Sensors,
}

impl Resource {
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Status => "status",
            Resource::Sensors => "sensors",
        }
    }
}

/// Fire-and-forget commands posted to the device's control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    TorchToggle,
    AutofocusStart,
    Zoom { direction: ZoomDirection, step: u8 },
}

impl ControlCommand {
    pub fn body(&self) -> String {
        match self {
            ControlCommand::TorchToggle => "torch=toggle".to_string(),
            ControlCommand::AutofocusStart => "autofocus=start".to_string(),
            ControlCommand::Zoom {
                direction: ZoomDirection::In,
                step,
            } => format!("zoom=+{step}"),
            ControlCommand::Zoom {
                direction: ZoomDirection::Out,
                step,
            } => format!("zoom=-{step}"),
        }
    }
}

/// Validated base URL of the camera device. Builds the crux_http requests for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoint {
    base: Url,
}

impl DeviceEndpoint {
    pub fn new(url: impl AsRef<str>) -> Result<Self, HttpError> {
        let raw = url.as_ref().trim();
        if raw.is_empty() {
            return Err(HttpError::InvalidUrl {
                url: String::new(),
                reason: "URL cannot be empty".to_string(),
            });
        }
        if raw.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: format!("URL exceeds maximum length of {} bytes", MAX_URL_LENGTH),
            });
        }

        let mut base = Url::parse(raw).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(raw),
            reason: e.to_string(),
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: format!("scheme '{}' not allowed", base.scheme()),
            });
        }
        if base.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: "missing host".to_string(),
            });
        }
        if !base.username().is_empty() || base.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: "credentials in URL not allowed".to_string(),
            });
        }

        base.set_query(None);
        base.set_fragment(None);
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base })
    }

    pub fn as_str(&self) -> &str {
        self.base.as_str()
    }

    pub fn host(&self) -> &str {
        self.base.host_str().unwrap_or_default()
    }

    pub fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        self.base.join(path).map_err(|e| HttpError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// RTSP address of the H.264 stream on the same host.
    pub fn h264_url(&self) -> String {
        let host = self.host();
        match self.base.port() {
            Some(port) => format!("rtsp://{host}:{port}/video/h264"),
            None => format!("rtsp://{host}/video/h264"),
        }
    }

    /// `GET` of a status resource, with the precision hint when asked for.
    pub fn status_request<Ev>(
        &self,
        http: &Http<Ev>,
        resource: Resource,
        precise_location: bool,
    ) -> Result<RequestBuilder<Ev>, HttpError>
    where
        Ev: 'static,
    {
        let url = self.resolve(resource.path())?;
        let builder = http.get(url.as_str()).header("Accept", "application/json");
        Ok(if precise_location {
            builder.header(PRECISION_HEADER.0, PRECISION_HEADER.1)
        } else {
            builder
        })
    }

    pub fn control_request<Ev>(
        &self,
        http: &Http<Ev>,
        command: ControlCommand,
    ) -> Result<RequestBuilder<Ev>, HttpError>
    where
        Ev: 'static,
    {
        let url = self.resolve("control")?;
        Ok(http
            .post(url.as_str())
            .header("Content-Type", CONTROL_CONTENT_TYPE)
            .body_string(command.body()))
    }

    fn truncate_url(url: &str) -> String {
        if url.len() > 100 {
            url.chars().take(100).collect::<String>() + "..."
        } else {
            url.to_string()
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no device endpoint configured")]
    NotConfigured,

    #[error("request to {host} failed: {message}")]
    ConnectionError { host: String, message: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String, request_id: String },
}

/// What the core keeps of a device response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
    request_id: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>, request_id: String) -> Self {
        Self {
            status,
            body,
            request_id,
        }
    }

    /// Settles a crux_http result into the core's result type.
    pub fn from_shell(
        result: crux_http::Result<crux_http::Response<Vec<u8>>>,
        host: &str,
        request_id: String,
    ) -> HttpResult {
        match result {
            Ok(mut response) => {
                let status: u16 = response.status().into();
                let body = response.take_body().unwrap_or_default();
                Ok(Self::new(status, body, request_id))
            }
            Err(e) => Err(HttpError::ConnectionError {
                host: host.to_string(),
                message: e.to_string(),
            }),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {}", e),
            request_id: self.request_id.clone(),
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;
