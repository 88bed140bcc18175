use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Url;

use crate::config::FetchConfig;
use crate::foundation::error::{ReelError, ReelResult};

/// Where an image or audio track comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Remote resource fetched over HTTP(S).
    Url(Url),
    /// Local file.
    File(PathBuf),
    /// Caller-supplied bytes, e.g. an uploaded file.
    Blob {
        /// Name shown in logs and notices.
        label: String,
        /// Raw encoded bytes.
        bytes: Bytes,
    },
}

impl SourceRef {
    pub fn blob(label: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self::Blob {
            label: label.into(),
            bytes: bytes.into(),
        }
    }

    /// `http(s)://` becomes a URL, `file://` and anything else a local path.
    pub fn parse(s: &str) -> ReelResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ReelError::validation("source reference must be non-empty"));
        }
        let lower = s.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(s)
                .map_err(|e| ReelError::validation(format!("invalid url '{s}': {e}")))?;
            return Ok(Self::Url(url));
        }
        if let Some(rest) = s.strip_prefix("file://") {
            return Ok(Self::File(PathBuf::from(rest)));
        }
        Ok(Self::File(PathBuf::from(s)))
    }
}

impl FromStr for SourceRef {
    type Err = ReelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(u) => write!(f, "{u}"),
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Blob { label, .. } => write!(f, "blob:{label}"),
        }
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(u) => f.debug_tuple("Url").field(&u.as_str()).finish(),
            Self::File(p) => f.debug_tuple("File").field(p).finish(),
            Self::Blob { label, bytes } => f
                .debug_struct("Blob")
                .field("label", label)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Why a single retrieval failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid proxy url: {0}")]
    ProxyUrl(String),
}

impl FetchError {
    /// Whether the origin refused us, in which case a retry through the proxy may succeed.
    pub fn is_refused(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 401 | 403 | 407 | 429 | 451),
            Self::Transport(e) => !e.is_timeout(),
            Self::Io { .. } | Self::ProxyUrl(_) => false,
        }
    }
}

/// Retrieves raw bytes for a [`SourceRef`].
///
/// Remote resources are always fetched as opaque bytes and decoded locally. When the origin
/// refuses a direct request, one retry goes through the configured proxy endpoint.
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
    proxy_endpoint: Option<String>,
    proxy_query_param: String,
}

impl Fetcher {
    pub fn new(cfg: &FetchConfig) -> ReelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .user_agent(cfg.user_agent.clone())
            .build()
            .map_err(|e| ReelError::validation(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            proxy_endpoint: cfg.proxy_endpoint.clone(),
            proxy_query_param: cfg.proxy_query_param.clone(),
        })
    }

    pub async fn fetch(&self, source: &SourceRef) -> Result<Bytes, FetchError> {
        match source {
            SourceRef::Blob { bytes, .. } => Ok(bytes.clone()),
            SourceRef::File(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|source| FetchError::Io {
                    path: path.clone(),
                    source,
                }),
            SourceRef::Url(url) => self.fetch_url(url).await,
        }
    }

    async fn fetch_url(&self, url: &Url) -> Result<Bytes, FetchError> {
        let direct = self.get(url.clone()).await;
        let err = match direct {
            Ok(bytes) => return Ok(bytes),
            Err(e) => e,
        };
        if !err.is_refused() || self.proxy_endpoint.is_none() {
            return Err(err);
        }

        let proxied = self.proxy_url(url)?;
        tracing::warn!(url = %url, error = %err, "direct fetch refused, retrying through proxy");
        self.get(proxied).await
    }

    async fn get(&self, url: Url) -> Result<Bytes, FetchError> {
        tracing::debug!(url = %url, "fetch");
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.bytes().await?)
    }

    pub(crate) fn proxy_url(&self, url: &Url) -> Result<Url, FetchError> {
        let Some(endpoint) = self.proxy_endpoint.as_deref() else {
            return Err(FetchError::ProxyUrl("no proxy endpoint configured".to_owned()));
        };
        Url::parse_with_params(endpoint, &[(self.proxy_query_param.as_str(), url.as_str())])
            .map_err(|e| FetchError::ProxyUrl(format!("'{endpoint}': {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
