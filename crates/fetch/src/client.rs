//! Thin reqwest wrapper that knows the headers the remote site expects.

use std::time::Duration;

use exn::ResultExt;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use tracing::{instrument, trace};

use crate::error::{ErrorKind, Result};

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; WOW64) AppleWebKit/535.1 (KHTML, like Gecko) Chrome/13.0.782.112 Safari/535.1";
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";
pub const DEFAULT_REFERER: &str = "https://www.webtoons.com/fr/";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub user_agent: String,
    pub mobile_user_agent: String,
    /// Sent with image downloads that don't come with their own referer.
    pub referer: String,
    /// Hard limit on a whole request, body included.
    pub timeout: Duration,
}
impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: DESKTOP_USER_AGENT.to_string(),
            mobile_user_agent: MOBILE_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// HTTP client for pages and images.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    mobile_user_agent: HeaderValue,
    referer: String,
}

impl HttpClient {
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&options.user_agent).or_raise(|| ErrorKind::Misconfigured)?,
        );
        let inner = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .or_raise(|| ErrorKind::Misconfigured)?;
        Ok(Self {
            inner,
            mobile_user_agent: HeaderValue::from_str(&options.mobile_user_agent).or_raise(|| ErrorKind::Misconfigured)?,
            referer: options.referer.clone(),
        })
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<reqwest::Response> {
        let response = request.send().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        let status = response.status();
        trace!(%status, "Response received");
        if !status.is_success() {
            exn::bail!(ErrorKind::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Desktop HTML page.
    #[instrument(level = "debug", skip(self))]
    pub async fn page(&self, url: &str) -> Result<String> {
        let response = self.send(self.inner.get(url), url).await?;
        response.text().await.or_raise(|| ErrorKind::Network(url.to_string()))
    }

    /// Same as [`page`](Self::page), presenting as a phone.
    #[instrument(level = "debug", skip(self))]
    pub async fn mobile_page(&self, url: &str) -> Result<String> {
        let request = self.inner.get(url).header(USER_AGENT, self.mobile_user_agent.clone());
        let response = self.send(request, url).await?;
        response.text().await.or_raise(|| ErrorKind::Network(url.to_string()))
    }

    /// Raw image bytes. The CDN refuses hotlinking without a referer.
    #[instrument(level = "debug", skip(self))]
    pub async fn image(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        let request = self.inner.get(url).header(REFERER, referer.unwrap_or(&self.referer));
        let response = self.send(request, url).await?;
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Network(url.to_string()))?;
        Ok(bytes.to_vec())
    }
}
