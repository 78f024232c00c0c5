//! Rate-limit aware request queue
//!
//! Each bucket owns a worker task fed by an unbounded channel, so requests on
//! one bucket run strictly in order with one in flight while different
//! buckets proceed in parallel. Every request passes the global limiter first.
//!
//! A 429 is the only failure that is retried; the request stays at the head
//! of its bucket until it goes through. Successful responses are merged into
//! the cache on the worker before the caller is answered, so the merge
//! happens even when the caller has gone away.

mod request;
mod transport;

pub use request::{ResponseMerge, RestRequest};
pub use transport::{HttpRequest, HttpTransport, ReqwestTransport, RestResponse};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use hearth_cache::EntityCache;
use hearth_common::{RestConfig, Token};

use crate::error::{RestError, RestResult};
use crate::ratelimit::headers::parse_seconds;
use crate::ratelimit::{GlobalLimiter, RateLimitBucket, RateLimitHeaders};
use crate::routing::BucketKey;

const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Fallback wait when a 429 carries no usable retry hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

type Responder = oneshot::Sender<RestResult<RestResponse>>;

struct Queued {
    request: RestRequest,
    respond: Responder,
}

/// State shared by every bucket worker
struct Shared {
    transport: Arc<dyn HttpTransport>,
    api_base: String,
    authorization: String,
    global: GlobalLimiter,
    cache: Option<EntityCache>,
}

/// Handle to the request queue; clones share the same buckets
#[derive(Clone)]
pub struct RestQueue {
    shared: Arc<Shared>,
    workers: Arc<DashMap<BucketKey, mpsc::UnboundedSender<Queued>>>,
}

impl std::fmt::Debug for RestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestQueue")
            .field("api_base", &self.shared.api_base)
            .field("buckets", &self.workers.len())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct RateLimitedBody {
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

impl RestQueue {
    pub fn new(config: &RestConfig, token: &Token, transport: Arc<dyn HttpTransport>) -> Self {
        Self::build(config, token, transport, None)
    }

    /// Queue whose successful responses are merged into `cache`
    pub fn with_cache(
        config: &RestConfig,
        token: &Token,
        transport: Arc<dyn HttpTransport>,
        cache: EntityCache,
    ) -> Self {
        Self::build(config, token, transport, Some(cache))
    }

    fn build(
        config: &RestConfig,
        token: &Token,
        transport: Arc<dyn HttpTransport>,
        cache: Option<EntityCache>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                authorization: token.authorization_header(),
                global: GlobalLimiter::new(config.global_per_second),
                cache,
            }),
            workers: Arc::new(DashMap::new()),
        }
    }

    pub fn cache(&self) -> Option<&EntityCache> {
        self.shared.cache.as_ref()
    }

    /// Number of buckets that have seen traffic
    pub fn bucket_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a request and wait for its response
    pub async fn enqueue(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.submit(request)?
            .await
            .map_err(|_| RestError::QueueClosed)?
    }

    /// Queue a request without waiting.
    ///
    /// Dropping the receiver does not cancel the request; it still runs and
    /// its response is still merged into the cache.
    pub fn submit(
        &self,
        request: RestRequest,
    ) -> RestResult<oneshot::Receiver<RestResult<RestResponse>>> {
        let key = request.route.bucket_key();
        let (respond, receiver) = oneshot::channel();
        let Err(mpsc::error::SendError(queued)) =
            self.sender_for(key.clone()).send(Queued { request, respond })
        else {
            return Ok(receiver);
        };

        // The worker stopped between lookup and send
        tracing::warn!(bucket = %key, "Bucket worker stopped unexpectedly, restarting");
        self.sender_for(key)
            .send(queued)
            .map_err(|_| RestError::QueueClosed)?;
        Ok(receiver)
    }

    /// Sender of the bucket's worker, starting a new worker if there is none
    /// or the previous one has stopped
    fn sender_for(&self, key: BucketKey) -> mpsc::UnboundedSender<Queued> {
        if let Some(sender) = self.workers.get(&key) {
            if !sender.is_closed() {
                return sender.clone();
            }
        }
        match self.workers.entry(key.clone()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            entry => {
                let (tx, rx) = mpsc::unbounded_channel();
                tracing::debug!(bucket = %key, "Starting bucket worker");
                tokio::spawn(run_bucket(Arc::clone(&self.shared), key, rx));
                entry.insert(tx.clone());
                tx
            }
        }
    }
}

/// Drain one bucket until every queue handle is gone
async fn run_bucket(shared: Arc<Shared>, key: BucketKey, mut rx: mpsc::UnboundedReceiver<Queued>) {
    let mut bucket = RateLimitBucket::new();

    while let Some(Queued { request, respond }) = rx.recv().await {
        let result = shared.execute(&key, &mut bucket, &request).await;

        if let (Ok(response), Some(cache)) = (&result, &shared.cache) {
            if let Err(err) = request.merge.apply(cache, &response.body) {
                tracing::warn!(bucket = %key, error = %err, "Response could not be merged into cache");
            }
        }

        if respond.send(result).is_err() {
            tracing::trace!(bucket = %key, "Caller went away before the response");
        }
    }

    tracing::debug!(bucket = %key, "Bucket worker stopped");
}

impl Shared {
    fn http_request(&self, request: &RestRequest) -> HttpRequest {
        let mut headers = HeaderMap::new();
        if request.auth {
            match HeaderValue::from_str(&self.authorization) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Authorization header is not valid ASCII"),
            }
        }
        if request.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(reason) = &request.reason {
            match HeaderValue::from_str(reason) {
                Ok(value) => {
                    headers.insert(AUDIT_LOG_REASON, value);
                }
                Err(_) => tracing::warn!("Dropping audit log reason with invalid characters"),
            }
        }

        HttpRequest {
            method: request.route.method(),
            url: format!("{}{}", self.api_base, request.route.path()),
            headers,
            body: request.body.clone(),
        }
    }

    async fn execute(
        &self,
        key: &BucketKey,
        bucket: &mut RateLimitBucket,
        request: &RestRequest,
    ) -> RestResult<RestResponse> {
        let http = self.http_request(request);

        loop {
            self.global.acquire().await;
            if let Some(wait) = bucket.wait_time(Instant::now()) {
                tracing::debug!(bucket = %key, wait_ms = wait.as_millis() as u64, "Bucket exhausted, waiting for reset");
                tokio::time::sleep(wait).await;
                continue;
            }

            let response = self.transport.execute(http.clone()).await?;
            let now = Instant::now();
            let headers = RateLimitHeaders::parse(&response.headers);
            bucket.update(&headers, now);

            if response.status == 429 {
                let body: Option<RateLimitedBody> = serde_json::from_slice(&response.body).ok();
                let retry_after = body
                    .as_ref()
                    .and_then(|b| b.retry_after)
                    .and_then(parse_seconds)
                    .or(headers.reset_after)
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                let global = headers.global || body.is_some_and(|b| b.global);

                tracing::warn!(
                    bucket = %key,
                    retry_after_ms = retry_after.as_millis() as u64,
                    global,
                    "Rate limited, retrying"
                );
                if global {
                    self.global.block_for(retry_after);
                } else {
                    bucket.block_for(retry_after, now);
                }
                continue;
            }

            if !response.is_success() {
                tracing::debug!(bucket = %key, status = response.status, "Request failed");
                return Err(RestError::from_status(response.status, &response.body));
            }

            tracing::trace!(bucket = %key, status = response.status, remaining = ?bucket.remaining(), "Request completed");
            return Ok(response);
        }
    }
}
