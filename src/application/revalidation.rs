//! On-demand revalidation of CDN-cached site paths.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use futures::stream::{self, StreamExt};
use metrics::counter;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};
use uidir_api_types::{PathOutcome, RevalidateRequest, RevalidateResponse};

const SUCCESS_MESSAGE: &str = "Revalidation triggered successfully";
/// Purge requests in flight at once for a single trigger.
const PURGE_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("purge request failed: {0}")]
    Request(String),
    #[error("purge endpoint responded with status {status}")]
    Status { status: u16 },
}

/// Hosting-platform endpoint that drops or rebuilds one cached path.
#[async_trait]
pub trait CachePurger: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn purge(&self, path: &str) -> Result<(), PurgeError>;
}

/// In-process caches that hold data rendered under a site path.
pub trait LocalCache: Send + Sync {
    fn invalidate_path(&self, path: &str) -> usize;
}

impl LocalCache for crate::application::directory::DirectoryService {
    fn invalidate_path(&self, path: &str) -> usize {
        crate::application::directory::DirectoryService::invalidate_path(self, path)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevalidationError {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("revalidation secret is not configured")]
    SecretMissing,
    #[error("unauthorized")]
    Unauthorized,
    #[error("invalid or missing paths")]
    InvalidPaths,
    #[error("purge backend is not configured")]
    PurgerMissing,
}

pub struct RevalidationService {
    secret_digest: Option<Vec<u8>>,
    purger: Option<Arc<dyn CachePurger>>,
    local: Option<Arc<dyn LocalCache>>,
}

impl RevalidationService {
    pub fn new(
        secret: Option<&str>,
        purger: Option<Arc<dyn CachePurger>>,
        local: Option<Arc<dyn LocalCache>>,
    ) -> Self {
        Self {
            secret_digest: secret.filter(|value| !value.is_empty()).map(digest),
            purger,
            local,
        }
    }

    /// Validate the request in order (method, secret, token, body, backend)
    /// and purge every path, collecting one outcome per path.
    pub async fn trigger(
        &self,
        method: &Method,
        bearer: Option<&str>,
        body: &[u8],
    ) -> Result<RevalidateResponse, RevalidationError> {
        if *method != Method::POST {
            return Err(RevalidationError::MethodNotAllowed);
        }
        self.authorize(bearer)?;
        let paths = parse_paths(body)?;
        let purger = self
            .purger
            .as_ref()
            .ok_or(RevalidationError::PurgerMissing)?;

        let purges: Vec<_> = paths
            .iter()
            .map(|path| self.purge_one(purger.as_ref(), path))
            .collect();
        let results: Vec<PathOutcome> = stream::iter(purges)
            .buffered(PURGE_CONCURRENCY)
            .collect()
            .await;

        let failed = results.iter().filter(|outcome| !outcome.success).count();
        info!(
            target = "uidir::revalidate",
            backend = purger.backend(),
            paths = results.len(),
            failed,
            "revalidation finished"
        );

        let message = if failed == 0 {
            SUCCESS_MESSAGE.to_string()
        } else {
            format!("Revalidation completed with {failed} failed path(s)")
        };
        Ok(RevalidateResponse { message, results })
    }

    fn authorize(&self, bearer: Option<&str>) -> Result<(), RevalidationError> {
        let expected = self
            .secret_digest
            .as_ref()
            .ok_or(RevalidationError::SecretMissing)?;
        let presented = bearer
            .filter(|token| !token.is_empty())
            .ok_or(RevalidationError::Unauthorized)?;

        if expected.ct_eq(&digest(presented)).unwrap_u8() == 0 {
            return Err(RevalidationError::Unauthorized);
        }
        Ok(())
    }

    async fn purge_one(&self, purger: &dyn CachePurger, path: &str) -> PathOutcome {
        if let Some(local) = &self.local {
            local.invalidate_path(path);
        }

        match purger.purge(path).await {
            Ok(()) => {
                counter!("uidir_revalidate_path_total", "outcome" => "success").increment(1);
                PathOutcome {
                    path: path.to_string(),
                    success: true,
                    error: None,
                }
            }
            Err(err) => {
                warn!(
                    target = "uidir::revalidate",
                    backend = purger.backend(),
                    path,
                    error = %err,
                    "path purge failed"
                );
                counter!("uidir_revalidate_path_total", "outcome" => "failure").increment(1);
                PathOutcome {
                    path: path.to_string(),
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

fn digest(secret: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.finalize().to_vec()
}

fn parse_paths(body: &[u8]) -> Result<Vec<String>, RevalidationError> {
    let request: RevalidateRequest =
        serde_json::from_slice(body).map_err(|_| RevalidationError::InvalidPaths)?;
    if request.paths.is_empty() {
        return Err(RevalidationError::InvalidPaths);
    }
    Ok(request.paths.iter().map(|path| normalize_path(path)).collect())
}

/// Site paths always start with `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct RecordingPurger {
        purged: Mutex<Vec<String>>,
        failing: Vec<&'static str>,
    }

    #[async_trait]
    impl CachePurger for RecordingPurger {
        fn backend(&self) -> &'static str {
            "recording"
        }

        async fn purge(&self, path: &str) -> Result<(), PurgeError> {
            self.purged
                .lock()
                .expect("purged lock")
                .push(path.to_string());
            if self.failing.iter().any(|failing| *failing == path) {
                return Err(PurgeError::Status { status: 502 });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingCache {
        paths: Mutex<Vec<String>>,
    }

    impl LocalCache for RecordingCache {
        fn invalidate_path(&self, path: &str) -> usize {
            self.paths.lock().expect("paths lock").push(path.to_string());
            1
        }
    }

    fn service(purger: Arc<RecordingPurger>) -> RevalidationService {
        RevalidationService::new(Some("s3cret"), Some(purger), None)
    }

    const BODY: &[u8] = br#"{"paths":["a","/b"]}"#;

    #[tokio::test]
    async fn non_post_is_rejected_before_anything_else() {
        let unconfigured = RevalidationService::new(None, None, None);
        let err = unconfigured
            .trigger(&Method::GET, None, b"not json")
            .await
            .expect_err("405");
        assert_eq!(err, RevalidationError::MethodNotAllowed);
    }

    #[tokio::test]
    async fn missing_secret_is_a_configuration_error() {
        let unconfigured = RevalidationService::new(Some(""), None, None);
        let err = unconfigured
            .trigger(&Method::POST, Some("anything"), BODY)
            .await
            .expect_err("500");
        assert_eq!(err, RevalidationError::SecretMissing);
    }

    #[tokio::test]
    async fn wrong_or_absent_token_is_unauthorized() {
        let revalidation = service(Arc::new(RecordingPurger::default()));
        for bearer in [None, Some(""), Some("s3cret "), Some("guess")] {
            let err = revalidation
                .trigger(&Method::POST, bearer, BODY)
                .await
                .expect_err("401");
            assert_eq!(err, RevalidationError::Unauthorized);
        }
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        let revalidation = service(Arc::new(RecordingPurger::default()));
        let bodies: [&[u8]; 5] = [
            b"{}",
            br#"{"paths":[]}"#,
            br#"{"paths":"/a"}"#,
            br#"{"paths":[1,2]}"#,
            b"garbage",
        ];
        for body in bodies {
            let err = revalidation
                .trigger(&Method::POST, Some("s3cret"), body)
                .await
                .expect_err("400");
            assert_eq!(err, RevalidationError::InvalidPaths);
        }
    }

    #[tokio::test]
    async fn missing_purger_fails_after_validation() {
        let revalidation = RevalidationService::new(Some("s3cret"), None, None);
        let err = revalidation
            .trigger(&Method::POST, Some("s3cret"), BODY)
            .await
            .expect_err("500");
        assert_eq!(err, RevalidationError::PurgerMissing);
    }

    #[tokio::test]
    async fn every_path_is_attempted_despite_failures() {
        let purger = Arc::new(RecordingPurger {
            failing: vec!["/a"],
            ..Default::default()
        });
        let local = Arc::new(RecordingCache::default());
        let revalidation =
            RevalidationService::new(Some("s3cret"), Some(purger.clone()), Some(local.clone()));

        let response = revalidation
            .trigger(&Method::POST, Some("s3cret"), BODY)
            .await
            .expect("partial success");

        let attempted = purger.purged.lock().expect("purged lock").clone();
        assert_eq!(attempted, vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(response.results.len(), 2);
        assert!(!response.results[0].success);
        assert!(response.results[0].error.is_some());
        assert!(response.results[1].success);
        assert_eq!(response.failed().count(), 1);
        assert_eq!(
            *local.paths.lock().expect("paths lock"),
            vec!["/a".to_string(), "/b".to_string()]
        );
    }

    #[tokio::test]
    async fn full_success_reports_fixed_message() {
        let revalidation = service(Arc::new(RecordingPurger::default()));
        let response = revalidation
            .trigger(&Method::POST, Some("s3cret"), BODY)
            .await
            .expect("success");
        assert_eq!(response.message, SUCCESS_MESSAGE);
    }

    #[derive(Default)]
    struct SlowPurger {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CachePurger for SlowPurger {
        fn backend(&self) -> &'static str {
            "slow"
        }

        async fn purge(&self, _path: &str) -> Result<(), PurgeError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn purges_run_with_bounded_concurrency_in_request_order() {
        let purger = Arc::new(SlowPurger::default());
        let revalidation = RevalidationService::new(Some("s3cret"), Some(purger.clone()), None);
        let paths: Vec<String> = (0..12).map(|index| format!("/p{index}")).collect();
        let body = serde_json::to_vec(&serde_json::json!({ "paths": paths })).expect("body");

        let response = revalidation
            .trigger(&Method::POST, Some("s3cret"), &body)
            .await
            .expect("success");

        let reported: Vec<_> = response
            .results
            .iter()
            .map(|outcome| outcome.path.clone())
            .collect();
        assert_eq!(reported, paths);
        let peak = purger.peak.load(Ordering::SeqCst);
        assert!(peak > 1 && peak <= PURGE_CONCURRENCY, "peak {peak}");
    }

    #[test]
    fn paths_gain_leading_slash() {
        assert_eq!(normalize_path("libraries"), "/libraries");
        assert_eq!(normalize_path("/frameworks/react"), "/frameworks/react");
        assert_eq!(normalize_path(""), "/");
    }
}
