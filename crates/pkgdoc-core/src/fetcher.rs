//! HTTP fetching with conditional request support and parallel file retrieval.
//!
//! Every request is raced against the caller's [`FetchContext`], so a
//! cancelled or expired request returns [`Error::Cancelled`] or
//! [`Error::Timeout`] instead of a partial result. Response classification:
//!
//! | status        | `get`              | `get_conditional`        |
//! |---------------|--------------------|--------------------------|
//! | 200           | body               | `Modified { body, etag }`|
//! | 304           | transport error    | `NotModified`            |
//! | 404           | `PackageNotFound`  | `PackageNotFound`        |
//! | anything else | transport error    | transport error          |

use crate::config::HttpConfig;
use crate::source::SourceFile;
use crate::{Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{ETAG, HeaderMap, HeaderValue, IF_NONE_MATCH};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cancellation signal and optional deadline shared by all requests of one
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl FetchContext {
    /// Context with no deadline and a fresh cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Cancel every request using this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut`, aborting it if the context is cancelled or the deadline passes.
    pub async fn guard<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            () = deadline => Err(Error::Timeout(format!("deadline exceeded for {what}"))),
            result = fut => result,
        }
    }
}

/// Result of a conditional GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conditional {
    /// The resource changed (or was fetched for the first time).
    Modified {
        /// Response body.
        body: Vec<u8>,
        /// New version token, quote-stripped or content hash.
        etag: String,
    },
    /// The resource matches the saved version token.
    NotModified,
}

/// HTTP client shared by all service adapters.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Creates a fetcher from the HTTP settings.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetches `url`. A 404 maps to [`Error::PackageNotFound`].
    pub async fn get(&self, ctx: &FetchContext, url: &str) -> Result<Vec<u8>> {
        self.get_with_headers(ctx, url, &HeaderMap::new()).await
    }

    /// Fetches `url` with extra request headers.
    pub async fn get_with_headers(
        &self,
        ctx: &FetchContext,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<Vec<u8>> {
        let request = self.client.get(url).headers(headers.clone());
        ctx.guard(url, async {
            let response = send(request, url).await?;
            match response.status() {
                StatusCode::OK => read_body(response, url).await,
                StatusCode::NOT_FOUND => Err(Error::PackageNotFound),
                status => Err(Error::transport(url, format!("get {url} -> {status}"))),
            }
        })
        .await
    }

    /// Conditionally fetches `url`, sending `saved_etag` as `If-None-Match`.
    ///
    /// When the server omits an `ETag`, a content hash is used instead and
    /// compared against `saved_etag` locally.
    pub async fn get_conditional(
        &self,
        ctx: &FetchContext,
        url: &str,
        saved_etag: &str,
    ) -> Result<Conditional> {
        let mut request = self.client.get(url);
        if !saved_etag.is_empty() {
            let value = HeaderValue::from_str(&format!("\"{saved_etag}\""))
                .map_err(|e| Error::Other(format!("invalid etag {saved_etag:?}: {e}")))?;
            request = request.header(IF_NONE_MATCH, value);
        }

        ctx.guard(url, async {
            let response = send(request, url).await?;
            match response.status() {
                StatusCode::NOT_MODIFIED => {
                    info!("Resource not modified (304) for {}", url);
                    Ok(Conditional::NotModified)
                },
                StatusCode::NOT_FOUND => Err(Error::PackageNotFound),
                StatusCode::OK => {
                    let server_etag = response
                        .headers()
                        .get(ETAG)
                        .and_then(|v| v.to_str().ok())
                        .and_then(strip_quotes)
                        .map(str::to_string);
                    let body = read_body(response, url).await?;
                    match server_etag {
                        Some(etag) => Ok(Conditional::Modified { body, etag }),
                        None => Ok(compare_content(body, saved_etag)),
                    }
                },
                status => Err(Error::transport(url, format!("get {url} -> {status}"))),
            }
        })
        .await
    }

    /// Fetches `url` and compares the content hash against `saved_etag`.
    ///
    /// For services that return no usable `ETag` (directory listings, tarballs).
    pub async fn get_compare(
        &self,
        ctx: &FetchContext,
        url: &str,
        saved_etag: &str,
    ) -> Result<Conditional> {
        let body = self.get(ctx, url).await?;
        Ok(compare_content(body, saved_etag))
    }

    /// Fetches the body of every file that has a `raw_url` but no data yet.
    ///
    /// One task per file; the first failure aborts the remaining tasks and is
    /// returned. File data is only filled in once every request succeeded.
    pub async fn fetch_files(
        &self,
        ctx: &FetchContext,
        files: &mut [SourceFile],
        headers: &HeaderMap,
    ) -> Result<()> {
        let mut tasks = JoinSet::new();
        for (index, file) in files.iter().enumerate() {
            if file.data.is_some() {
                continue;
            }
            let Some(url) = file.raw_url.clone() else {
                continue;
            };
            let fetcher = self.clone();
            let ctx = ctx.clone();
            let headers = headers.clone();
            tasks.spawn(async move {
                let data = fetcher.get_raw(&ctx, &url, &headers).await?;
                Ok::<_, Error>((index, data))
            });
        }

        debug!("Fetching {} files", tasks.len());
        let mut fetched = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, data) = joined.map_err(|e| Error::Other(format!("fetch task failed: {e}")))??;
            fetched.push((index, data));
        }

        for (index, data) in fetched {
            files[index].data = Some(data);
        }
        Ok(())
    }

    // Raw file bodies treat every non-200 status, including 404, as a transport error.
    async fn get_raw(&self, ctx: &FetchContext, url: &str, headers: &HeaderMap) -> Result<Vec<u8>> {
        let request = self.client.get(url).headers(headers.clone());
        ctx.guard(url, async {
            let response = send(request, url).await?;
            match response.status() {
                StatusCode::OK => read_body(response, url).await,
                status => Err(Error::transport(url, format!("get {url} -> {status}"))),
            }
        })
        .await
    }
}

async fn send(request: RequestBuilder, url: &str) -> Result<Response> {
    debug!("GET {}", url);
    request
        .send()
        .await
        .map_err(|e| Error::transport(url, e.to_string()))
}

async fn read_body(response: Response, url: &str) -> Result<Vec<u8>> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::transport(url, e.to_string()))?;
    Ok(bytes.to_vec())
}

fn compare_content(body: Vec<u8>, saved_etag: &str) -> Conditional {
    let etag = content_hash(&body);
    if etag == saved_etag {
        Conditional::NotModified
    } else {
        Conditional::Modified { body, etag }
    }
}

fn strip_quotes(value: &str) -> Option<&str> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .filter(|v| !v.is_empty())
}

/// Version token derived from content: base64 SHA-256.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    STANDARD.encode(hasher.finalize())
}
