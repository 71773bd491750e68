use std::time::Duration;

use httpmock::MockServer;
use serde_json::json;
use uidir::application::stats::PackageRegistry;
use uidir::config::RegistrySettings;
use uidir::domain::stats::DownloadWindow;
use uidir::domain::types::PackageName;
use uidir::infra::registry::{RegistryClient, RegistryError};
use url::Url;

fn client(server: &MockServer) -> RegistryClient {
    let settings = RegistrySettings {
        downloads_base_url: Url::parse(&server.url("/downloads-api")).expect("downloads url"),
        registry_base_url: Url::parse(&server.url("/registry")).expect("registry url"),
        timeout: Duration::from_secs(5),
        user_agent: "uidir-tests".to_string(),
    };
    RegistryClient::new(&settings).expect("registry client")
}

fn package(name: &str) -> PackageName {
    PackageName::parse(name).expect("valid package name")
}

#[tokio::test]
async fn download_series_requests_trailing_window() {
    let server = MockServer::start_async().await;
    let window = DownloadWindow::current(14);
    let path = format!("/downloads-api/downloads/range/{}/react", window.range_segment());
    let mock = server
        .mock_async(|when, then| {
            when.method("GET").path(path.as_str());
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "start": "2025-01-01",
                    "end": "2025-01-02",
                    "package": "react",
                    "downloads": [
                        { "day": "2025-01-01", "downloads": 120 },
                        { "day": "2025-01-02", "downloads": 80 }
                    ]
                }));
        })
        .await;

    let series = client(&server)
        .fetch_download_series(&package("react"), 14)
        .await
        .expect("series");
    mock.assert_async().await;
    assert_eq!(series.len(), 2);
    assert_eq!(series.iter().map(|day| day.downloads).sum::<u64>(), 200);
}

#[tokio::test]
async fn failures_degrade_to_empty_values() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET");
            then.status(500).body("boom");
        })
        .await;

    let registry = client(&server);
    assert!(
        registry
            .get_download_series(&package("react"), 30)
            .await
            .is_empty()
    );
    assert!(registry.get_package_details(&package("react")).await.is_none());
    mock.assert_hits_async(2).await;

    let err = registry
        .fetch_package_details(&package("react"))
        .await
        .expect_err("status error");
    assert!(matches!(err, RegistryError::Status { .. }));
}

#[tokio::test]
async fn package_details_come_from_latest_dist_tag() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/registry/radix-ui");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "name": "radix-ui",
                    "dist-tags": { "latest": "1.4.2", "next": "2.0.0-beta.1" },
                    "time": {
                        "1.4.2": "2025-05-20T08:30:00.000Z",
                        "2.0.0-beta.1": "2025-06-01T08:30:00.000Z"
                    },
                    "versions": {
                        "1.4.2": { "license": "MIT" },
                        "2.0.0-beta.1": { "license": "Apache-2.0" }
                    }
                }));
        })
        .await;

    let details = client(&server)
        .package_details(&package("radix-ui"))
        .await
        .expect("details");
    assert_eq!(details.version, "1.4.2");
    assert_eq!(details.license, "MIT");
    assert_eq!(details.install_command, "npm install radix-ui");
    assert!(details.last_update.is_some());
}
