use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::Value;
use time::macros::{date, datetime};
use tower::ServiceExt;
use uidir::application::directory::DirectoryService;
use uidir::application::repos::{
    FrameworksRepo, LibrariesRepo, LibraryPage, LibraryQueryFilter, PageRange, RepoError,
};
use uidir::application::retry::{RetryExecutor, RetryPolicy};
use uidir::application::revalidation::RevalidationService;
use uidir::application::stats::{PackageRegistry, SourceError, StatsConfig, StatsService};
use uidir::cache::CacheConfig;
use uidir::domain::entities::{FrameworkRecord, FrameworkRef, LibraryRecord, LibrarySummary};
use uidir::domain::types::{PackageName, SortSpec};
use uidir::infra::http::{
    ApiState, DatabaseHealth, HttpState, NO_STORE, PUBLIC_CACHE_CONTROL, RouterState, build_app,
};
use uidir_api_types::{DailyDownloads, PackageDetails};

fn library(id: i64, slug: &str) -> LibraryRecord {
    LibraryRecord {
        id,
        slug: slug.to_string(),
        name: slug.to_string(),
        title: format!("{slug} UI"),
        description: Some("Accessible components".into()),
        meta_title: None,
        meta_description: None,
        icon_url: None,
        website_url: None,
        github_url: None,
        npm_url: None,
        npm_package_name: Some(slug.to_string()),
        github_stars: Some(1_000 * id),
        github_forks: None,
        npm_downloads: Some(50_000),
        latest_version: None,
        last_update: None,
        pricing: Some("free".into()),
        styling: None,
        customization: None,
        installation_command: None,
        total_components: Some(40),
        gallery_images: Vec::new(),
        created_at: datetime!(2025-01-01 0:00 UTC),
        updated_at: datetime!(2025-01-01 0:00 UTC),
    }
}

fn framework(id: i64, slug: &str) -> FrameworkRecord {
    FrameworkRecord {
        id,
        slug: slug.to_string(),
        name: slug.to_string(),
        title: slug.to_string(),
        description: None,
        meta_title: None,
        meta_description: None,
        icon_url: None,
        website_url: None,
        docs_url: None,
        github_url: None,
        npm_url: None,
        npm_package_name: Some(slug.to_string()),
        installation_command: None,
        github_stars: None,
        github_forks: None,
        npm_downloads: None,
        latest_version: None,
        last_update: None,
        kind: Some("library".into()),
        rendering_type: None,
        language: Some("javascript".into()),
        created_at: datetime!(2025-01-01 0:00 UTC),
        updated_at: datetime!(2025-01-01 0:00 UTC),
    }
}

#[derive(Default)]
struct MemoryRepo {
    list_calls: AtomicUsize,
    fail_transient: AtomicBool,
}

#[async_trait]
impl LibrariesRepo for MemoryRepo {
    async fn list_libraries(
        &self,
        _sort: SortSpec,
        filter: &LibraryQueryFilter,
        range: PageRange,
    ) -> Result<LibraryPage, RepoError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_transient.load(Ordering::SeqCst) {
            return Err(RepoError::transient("connection refused"));
        }
        let all = vec![
            LibrarySummary {
                library: library(1, "shadcn-ui"),
                frameworks: vec![FrameworkRef {
                    id: 1,
                    slug: "react".into(),
                    name: "React".into(),
                    icon_url: None,
                    is_primary: true,
                }],
            },
            LibrarySummary {
                library: library(2, "vuetify"),
                frameworks: Vec::new(),
            },
        ];
        let matching: Vec<_> = all
            .into_iter()
            .filter(|summary| {
                filter
                    .framework
                    .as_deref()
                    .is_none_or(|slug| summary.supports_framework(slug))
            })
            .collect();
        let total = matching.len() as u64;
        let libraries = matching
            .into_iter()
            .skip(range.start as usize)
            .take(range.limit() as usize)
            .collect();
        Ok(LibraryPage { libraries, total })
    }

    async fn find_library_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<LibrarySummary>, RepoError> {
        Ok((slug == "shadcn-ui").then(|| LibrarySummary {
            library: library(1, slug),
            frameworks: Vec::new(),
        }))
    }

    async fn list_libraries_for_framework(
        &self,
        framework_id: i64,
    ) -> Result<Vec<LibraryRecord>, RepoError> {
        Ok(vec![library(framework_id, "shadcn-ui")])
    }
}

#[async_trait]
impl FrameworksRepo for MemoryRepo {
    async fn list_frameworks(
        &self,
        _sort: SortSpec,
        _range: PageRange,
    ) -> Result<(Vec<FrameworkRecord>, u64), RepoError> {
        Ok((vec![framework(1, "react"), framework(2, "vue")], 2))
    }

    async fn find_framework_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<FrameworkRecord>, RepoError> {
        Ok((slug == "react").then(|| framework(1, slug)))
    }
}

struct FixedRegistry;

#[async_trait]
impl PackageRegistry for FixedRegistry {
    async fn download_series(
        &self,
        _package: &PackageName,
        _window_days: u32,
    ) -> Result<Vec<DailyDownloads>, SourceError> {
        let first = date!(2025 - 03 - 01);
        Ok((0..10)
            .map(|offset| DailyDownloads {
                day: first + time::Duration::days(offset),
                downloads: 1_000,
            })
            .collect())
    }

    async fn package_details(&self, package: &PackageName) -> Result<PackageDetails, SourceError> {
        Ok(PackageDetails {
            version: "1.0.0".into(),
            last_update: None,
            license: "MIT".into(),
            install_command: format!("npm install {package}"),
        })
    }
}

struct FakeDatabase {
    healthy: bool,
}

#[async_trait]
impl DatabaseHealth for FakeDatabase {
    async fn check(&self) -> Result<(), sqlx::Error> {
        if self.healthy {
            Ok(())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

fn app_with(repo: Arc<MemoryRepo>, healthy: bool) -> Router {
    let cache = CacheConfig::default();
    let stats = Arc::new(StatsService::new(
        Arc::new(FixedRegistry),
        None,
        StatsConfig::default(),
        &cache,
    ));
    let directory = Arc::new(DirectoryService::new(
        repo.clone(),
        repo,
        stats,
        Arc::new(RetryExecutor::new(RetryPolicy {
            max_retries: 0,
            delay: std::time::Duration::ZERO,
        })),
        &cache,
    ));
    let revalidation = Arc::new(RevalidationService::new(None, None, None));

    build_app(RouterState {
        http: HttpState {
            db: Arc::new(FakeDatabase { healthy }),
            environment: Arc::from("test"),
        },
        api: ApiState {
            directory,
            revalidation,
        },
    })
}

fn app() -> Router {
    app_with(Arc::new(MemoryRepo::default()), true)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("router should respond");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be json")
    };
    (status, headers, body)
}

#[tokio::test]
async fn library_listing_is_cacheable_and_paginated() {
    let app = app();
    let (status, headers, body) = get(&app, "/api/libraries?start=0&end=0&sortBy=latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], PUBLIC_CACHE_CONTROL);
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body["total"], 2);
    assert_eq!(body["libraries"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["libraries"][0]["slug"], "shadcn-ui");
    assert_eq!(body["libraries"][0]["frameworks"][0]["slug"], "react");
}

#[tokio::test]
async fn framework_filter_narrows_listing() {
    let app = app();
    let (status, _, body) = get(&app, "/api/libraries?framework=react").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn bad_ranges_and_numbers_are_rejected() {
    let app = app();

    let (status, headers, body) = get(&app, "/api/libraries?start=10&end=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_range");
    assert_eq!(headers[header::CACHE_CONTROL], NO_STORE);

    let (status, _, body) = get(&app, "/api/libraries?start=0&end=4294967295").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_range");

    let (status, _, body) = get(&app, "/api/libraries?minComponents=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _, _) = get(&app, "/api/libraries/shadcn-ui?window=7").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_slugs_are_json_404s() {
    let app = app();

    let (status, headers, body) = get(&app, "/api/libraries/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert_eq!(body["error"]["message"], "Library not found");
    assert_eq!(headers[header::CACHE_CONTROL], NO_STORE);

    let (status, _, body) = get(&app, "/api/frameworks/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Framework not found");

    let (status, _, _) = get(&app, "/no/such/route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn library_detail_carries_stats_panel() {
    let app = app();
    let (status, _, body) = get(&app, "/api/libraries/shadcn-ui?window=30").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["library"]["slug"], "shadcn-ui");
    assert_eq!(body["stats"]["window_days"], 30);
    assert_eq!(body["stats"]["total_downloads"], 7_000);
    assert_eq!(body["stats"]["total_display"], "7.0k");
    assert_eq!(body["stats"]["details"]["version"], "1.0.0");
}

#[tokio::test]
async fn framework_endpoints() {
    let app = app();

    let (status, _, body) = get(&app, "/api/frameworks?sortBy=components").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["frameworks"][0]["type"], "library");

    let (status, _, body) = get(&app, "/api/frameworks/react").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["framework"]["slug"], "react");
    assert_eq!(body["libraries"][0]["slug"], "shadcn-ui");
    assert_eq!(body["stats"]["window_days"], 14);
}

#[tokio::test]
async fn package_stats_accepts_scoped_names() {
    let app = app();

    let (status, _, body) = get(&app, "/api/stats/@radix-ui/react-dialog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["package"], "@radix-ui/react-dialog");
    assert_eq!(
        body["details"]["install_command"],
        "npm install @radix-ui/react-dialog"
    );

    let (status, _, body) = get(&app, "/api/stats/Not%20Valid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_package");
}

#[tokio::test]
async fn transient_repo_failures_are_503_and_not_cached() {
    let repo = Arc::new(MemoryRepo::default());
    repo.fail_transient.store(true, Ordering::SeqCst);
    let app = app_with(repo.clone(), true);

    let (status, headers, body) = get(&app, "/api/libraries").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "unavailable");
    assert!(body["error"].get("hint").is_none());
    assert_eq!(headers[header::CACHE_CONTROL], NO_STORE);

    repo.fail_transient.store(false, Ordering::SeqCst);
    let (status, _, _) = get(&app, "/api/libraries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(repo.list_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn health_and_timestamp_probes() {
    let (status, headers, _) = get(&app(), "/_health/db").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(headers[header::CACHE_CONTROL], NO_STORE);

    let unhealthy = app_with(Arc::new(MemoryRepo::default()), false);
    let (status, _, _) = get(&unhealthy, "/_health/db").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, headers, body) = get(&app(), "/api/timestamp").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CACHE_CONTROL], NO_STORE);
    assert_eq!(body["environment"], "test");
    assert!(body["timestamp"].as_str().is_some());
}
