use std::str::FromStr;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::header::{ALLOW, AUTHORIZATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::directory::DirectoryError;
use crate::application::repos::{LibraryQueryFilter, PageRange, RepoError};
use crate::application::revalidation::RevalidationError;
use crate::domain::types::{PackageName, SortBy, StatsWindow};

use super::error::{ApiError, codes};
use super::models::*;
use super::state::ApiState;

pub async fn list_libraries(
    State(state): State<ApiState>,
    Query(query): Query<LibraryListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = parse_range(query.start.as_deref(), query.end.as_deref())?;
    let sort = SortBy::parse_or_default(query.sort_by.as_deref());
    let filter = LibraryQueryFilter {
        min_components: parse_number("minComponents", query.min_components.as_deref())?,
        min_downloads: parse_number("minDownloads", query.min_downloads.as_deref())?,
        updated_within_days: parse_number("updatedWithin", query.updated_within.as_deref())?,
        framework: non_empty(query.framework),
        search: non_empty(query.search),
    };

    let page = state
        .directory
        .list_libraries(sort, &filter, range)
        .await
        .map_err(directory_to_api)?;

    Ok(Json(LibraryListResponse {
        libraries: page.libraries,
        total: page.total,
    }))
}

pub async fn get_library(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = parse_window(&state, query.window.as_deref())?;
    let detail = state
        .directory
        .library_detail(&slug, window)
        .await
        .map_err(directory_to_api)?;
    Ok(Json(detail))
}

pub async fn list_frameworks(
    State(state): State<ApiState>,
    Query(query): Query<FrameworkListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = parse_range(query.start.as_deref(), query.end.as_deref())?;
    let sort = SortBy::parse_or_default(query.sort_by.as_deref());
    let page = state
        .directory
        .list_frameworks(sort, range)
        .await
        .map_err(directory_to_api)?;
    Ok(Json(page))
}

pub async fn get_framework(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = parse_window(&state, query.window.as_deref())?;
    let detail = state
        .directory
        .framework_detail(&slug, window)
        .await
        .map_err(directory_to_api)?;
    Ok(Json(detail))
}

pub async fn package_stats(
    State(state): State<ApiState>,
    Path(package): Path<String>,
    Query(query): Query<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let window = parse_window(&state, query.window.as_deref())?;
    let package = PackageName::parse(&package).map_err(|err| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_PACKAGE,
            "Invalid package name",
            Some(err.to_string()),
        )
    })?;
    let panel = state.directory.stats().panel(&package, window).await;
    Ok(Json(panel))
}

pub async fn revalidate(
    State(state): State<ApiState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match state.revalidation.trigger(&method, bearer, &body).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(RevalidationError::MethodNotAllowed) => {
            let mut response = ApiError::new(
                StatusCode::METHOD_NOT_ALLOWED,
                codes::METHOD_NOT_ALLOWED,
                "Method not allowed",
                Some(format!("{method} is not supported; use POST")),
            )
            .into_response();
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("POST"));
            response
        }
        Err(err) => revalidation_to_api(err).into_response(),
    }
}

fn revalidation_to_api(err: RevalidationError) -> ApiError {
    match err {
        RevalidationError::MethodNotAllowed => ApiError::new(
            StatusCode::METHOD_NOT_ALLOWED,
            codes::METHOD_NOT_ALLOWED,
            "Method not allowed",
            None,
        ),
        RevalidationError::SecretMissing => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::CONFIGURATION,
            "Revalidation secret not configured",
            None,
        ),
        RevalidationError::Unauthorized => ApiError::unauthorized(),
        RevalidationError::InvalidPaths => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_PATHS,
            "Invalid or missing paths",
            Some("expected a JSON body of the form {\"paths\": [\"/path\"]}".to_string()),
        ),
        RevalidationError::PurgerMissing => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::CONFIGURATION,
            "Purge backend not configured",
            None,
        ),
    }
}

fn directory_to_api(err: DirectoryError) -> ApiError {
    match err {
        DirectoryError::NotFound { entity, slug } => {
            let message = if entity == "library" {
                "Library not found"
            } else {
                "Framework not found"
            };
            ApiError::not_found(message, Some(slug))
        }
        DirectoryError::Repo(repo) => repo_to_api(repo),
    }
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("Resource not found", None),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        err if err.is_transient() => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::UNAVAILABLE,
            "Data store unavailable",
            None,
        )
        .with_detail(err.to_string()),
        err => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            None,
        )
        .with_detail(err.to_string()),
    }
}

fn parse_range(start: Option<&str>, end: Option<&str>) -> Result<PageRange, ApiError> {
    let start = parse_number::<u32>("start", start)?.unwrap_or(0);
    let end = parse_number::<u32>("end", end)?
        .unwrap_or_else(|| start.saturating_add(PageRange::DEFAULT_END));
    PageRange::new(start, end).map_err(|err| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_RANGE,
            "Invalid range",
            Some(err.to_string()),
        )
    })
}

fn parse_window(state: &ApiState, raw: Option<&str>) -> Result<StatsWindow, ApiError> {
    match parse_number::<u32>("window", raw)? {
        Some(days) => StatsWindow::try_from(days)
            .map_err(|err| ApiError::bad_request("Invalid window", Some(err.to_string()))),
        None => Ok(state.directory.stats().default_window()),
    }
}

fn parse_number<T: FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<T>().map(Some).map_err(|_| {
        ApiError::bad_request(
            "Invalid query parameter",
            Some(format!("`{name}` must be a non-negative integer, got `{raw}`")),
        )
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_defaults_to_first_page() {
        assert_eq!(parse_range(None, None).expect("range"), PageRange::default());
        let shifted = parse_range(Some("40"), None).expect("range");
        assert_eq!((shifted.start, shifted.end), (40, 59));
    }

    #[test]
    fn malformed_ranges_are_bad_requests() {
        for (start, end) in [(Some("5"), Some("4")), (Some("0"), Some("100")), (Some("-1"), None)] {
            let err = parse_range(start, end).expect_err("rejected");
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn transient_repo_errors_are_unavailable() {
        assert_eq!(
            repo_to_api(RepoError::transient("connection reset")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            repo_to_api(RepoError::from_persistence("syntax error")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            directory_to_api(DirectoryError::NotFound {
                entity: "framework",
                slug: "solid".into(),
            })
            .status(),
            StatusCode::NOT_FOUND
        );
    }
}
