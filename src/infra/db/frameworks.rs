use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{FrameworksRepo, PageRange, RepoError},
    domain::entities::FrameworkRecord,
    domain::types::SortSpec,
};

use super::{PostgresRepositories, map_sqlx_error};

const FRAMEWORK_COLUMNS: &str = "id, slug, name, title, description, meta_title, \
    meta_description, icon_url, website_url, docs_url, github_url, npm_url, npm_package_name, \
    installation_command, github_stars, github_forks, npm_downloads, latest_version, last_update, \
    type AS kind, rendering_type, language, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct FrameworkRow {
    id: i64,
    slug: String,
    name: String,
    title: String,
    description: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    icon_url: Option<String>,
    website_url: Option<String>,
    docs_url: Option<String>,
    github_url: Option<String>,
    npm_url: Option<String>,
    npm_package_name: Option<String>,
    installation_command: Option<String>,
    github_stars: Option<i64>,
    github_forks: Option<i64>,
    npm_downloads: Option<i64>,
    latest_version: Option<String>,
    last_update: Option<OffsetDateTime>,
    kind: Option<String>,
    rendering_type: Option<String>,
    language: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<FrameworkRow> for FrameworkRecord {
    fn from(row: FrameworkRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            name: row.name,
            title: row.title,
            description: row.description,
            meta_title: row.meta_title,
            meta_description: row.meta_description,
            icon_url: row.icon_url,
            website_url: row.website_url,
            docs_url: row.docs_url,
            github_url: row.github_url,
            npm_url: row.npm_url,
            npm_package_name: row.npm_package_name,
            installation_command: row.installation_command,
            github_stars: row.github_stars,
            github_forks: row.github_forks,
            npm_downloads: row.npm_downloads,
            latest_version: row.latest_version,
            last_update: row.last_update,
            kind: row.kind,
            rendering_type: row.rendering_type,
            language: row.language,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl FrameworksRepo for PostgresRepositories {
    async fn list_frameworks(
        &self,
        sort: SortSpec,
        range: PageRange,
    ) -> Result<(Vec<FrameworkRecord>, u64), RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM frameworks")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {FRAMEWORK_COLUMNS} FROM frameworks \
             ORDER BY {} {} NULLS LAST, id ASC \
             LIMIT $1 OFFSET $2",
            sort.column.as_sql(),
            sort.direction.as_sql()
        );
        let rows = sqlx::query_as::<_, FrameworkRow>(&sql)
            .bind(range.limit())
            .bind(range.offset())
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok((
            rows.into_iter().map(FrameworkRecord::from).collect(),
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn find_framework_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<FrameworkRecord>, RepoError> {
        let sql = format!("SELECT {FRAMEWORK_COLUMNS} FROM frameworks WHERE slug = $1");
        let row = sqlx::query_as::<_, FrameworkRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(FrameworkRecord::from))
    }
}
