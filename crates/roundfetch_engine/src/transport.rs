use std::error::Error as StdError;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::sink::{too_large, BodySink};
use crate::{FetchError, Transfer, TransportError, TransportErrorKind};

/// Transport baseline shared by every transfer of one downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Hard cap on a response body; `None` means unbounded.
    pub max_bytes: Option<u64>,
    /// Bytes buffered in memory before a body spills to a temp file.
    pub spill_threshold: usize,
    /// Applied when the request options carry no user agent of their own.
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    /// PEM bundle of extra trusted roots.
    pub ca_bundle: Option<PathBuf>,
    pub cookie_store: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            redirect_limit: 10,
            max_bytes: None,
            spill_threshold: 512 * 1024,
            user_agent: None,
            proxy: None,
            ca_bundle: None,
            cookie_store: true,
        }
    }
}

/// Caller-supplied per-request configuration.
///
/// Options cannot change the baseline timeouts of [`FetchSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub user_agent: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Fills in `default` unless a user agent is already configured, either
    /// directly or as an explicit header.
    pub fn with_default_user_agent(mut self, default: Option<&str>) -> Self {
        let has_header = self
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(USER_AGENT.as_str()));
        if self.user_agent.is_none() && !has_header {
            self.user_agent = default.map(ToOwned::to_owned);
        }
        self
    }

    /// Builds the header map; later entries replace earlier ones, the
    /// dedicated user agent replaces any header of the same name.
    pub fn header_map(&self) -> Result<HeaderMap, String> {
        let mut map = HeaderMap::with_capacity(self.headers.len() + 1);
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| format!("invalid header name {name:?}: {err}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| format!("invalid value for header {name}: {err}"))?;
            map.insert(name, value);
        }
        if let Some(agent) = &self.user_agent {
            let value = HeaderValue::from_str(agent)
                .map_err(|err| format!("invalid user agent {agent:?}: {err}"))?;
            map.insert(USER_AGENT, value);
        }
        Ok(map)
    }
}

/// One transfer attempt. Retrying is the reactor's business, not the transport's.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn transfer(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<Transfer, TransportError>;
}

/// Production transport backed by one shared `reqwest::Client`.
///
/// The client is the session cache: pooled connections, cookies, resolved
/// hosts and resumable TLS sessions are reused by every transfer.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl ReqwestTransport {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = build_client(&settings)?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }
}

fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
        .gzip(true)
        .cookie_store(settings.cookie_store);

    if let Some(proxy) = &settings.proxy {
        let proxy = reqwest::Proxy::all(proxy.as_str())
            .map_err(|err| FetchError::Client(format!("invalid proxy {proxy}: {err}")))?;
        builder = builder.proxy(proxy);
    }

    if let Some(path) = &settings.ca_bundle {
        let pem = std::fs::read(path)
            .map_err(|err| FetchError::Client(format!("cannot read {}: {err}", path.display())))?;
        let certs = reqwest::Certificate::from_pem_bundle(&pem)
            .map_err(|err| FetchError::Client(format!("invalid CA bundle: {err}")))?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }

    builder
        .build()
        .map_err(|err| FetchError::Client(err.to_string()))
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn transfer(
        &self,
        url: &Url,
        options: &RequestOptions,
    ) -> Result<Transfer, TransportError> {
        let headers = options
            .header_map()
            .map_err(|message| TransportError::new(TransportErrorKind::Request, message))?;

        // Caller headers first, then the baseline timeout so options cannot loosen it.
        let response = self
            .client
            .get(url.clone())
            .headers(headers)
            .timeout(self.settings.request_timeout)
            .send()
            .await
            .map_err(|err| map_reqwest_error(&err))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let (Some(max), Some(len)) = (self.settings.max_bytes, response.content_length()) {
            if len > max {
                return Err(too_large(max, len));
            }
        }

        let mut sink = BodySink::new(self.settings.spill_threshold, self.settings.max_bytes);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_reqwest_error(&err))?;
            sink.write_chunk(&chunk)?;
        }
        if sink.is_spilled() {
            engine_logging::engine_trace!("body of {} spilled to disk", url);
        }

        Ok(Transfer {
            status,
            body: sink.finish()?,
            content_type,
        })
    }
}

/// Flags read off a transport error, independent of the HTTP client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorFlags {
    pub connect: bool,
    pub timeout: bool,
    pub redirect: bool,
    pub body: bool,
}

/// Maps error flags plus the full error-chain text to a transport error kind.
///
/// A connect timeout is reported as a connect failure.
pub fn classify_transport_error(flags: ErrorFlags, chain: &str) -> TransportErrorKind {
    let text = chain.to_ascii_lowercase();
    if flags.connect {
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return TransportErrorKind::Dns;
        }
        if text.contains("tls") || text.contains("handshake") || text.contains("certificate") {
            return TransportErrorKind::Tls;
        }
        return TransportErrorKind::Connect;
    }
    if flags.timeout {
        return TransportErrorKind::Timeout;
    }
    if flags.redirect {
        return TransportErrorKind::Redirect;
    }
    if text.contains("http2") || text.contains("h2 protocol") || text.contains("stream error") {
        return TransportErrorKind::Http2;
    }
    if flags.body {
        return TransportErrorKind::Body;
    }
    TransportErrorKind::Request
}

fn map_reqwest_error(err: &reqwest::Error) -> TransportError {
    // reqwest's own message embeds the request URL; classify on the causes only.
    let causes = err.source().map(error_chain).unwrap_or_default();
    let flags = ErrorFlags {
        connect: err.is_connect(),
        timeout: err.is_timeout(),
        redirect: err.is_redirect(),
        body: err.is_body() || err.is_decode(),
    };
    TransportError::new(classify_transport_error(flags, &causes), error_chain(err))
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
