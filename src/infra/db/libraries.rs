use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::{LibrariesRepo, LibraryPage, LibraryQueryFilter, PageRange, RepoError},
    domain::entities::{FrameworkRef, LibraryRecord, LibrarySummary},
    domain::types::SortSpec,
};

use super::{PostgresRepositories, map_sqlx_error};

const LIBRARY_COLUMNS: &str = "l.id, l.slug, l.name, l.title, l.description, l.meta_title, \
    l.meta_description, l.icon_url, l.website_url, l.github_url, l.npm_url, l.npm_package_name, \
    l.github_stars, l.github_forks, l.npm_downloads, l.latest_version, l.last_update, l.pricing, \
    l.styling, l.customization, l.installation_command, l.total_components, l.gallery_images, \
    l.created_at, l.updated_at";

#[derive(sqlx::FromRow)]
struct LibraryRow {
    id: i64,
    slug: String,
    name: String,
    title: String,
    description: Option<String>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    icon_url: Option<String>,
    website_url: Option<String>,
    github_url: Option<String>,
    npm_url: Option<String>,
    npm_package_name: Option<String>,
    github_stars: Option<i64>,
    github_forks: Option<i64>,
    npm_downloads: Option<i64>,
    latest_version: Option<String>,
    last_update: Option<OffsetDateTime>,
    pricing: Option<String>,
    styling: Option<String>,
    customization: Option<String>,
    installation_command: Option<String>,
    total_components: Option<i32>,
    gallery_images: Vec<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<LibraryRow> for LibraryRecord {
    fn from(row: LibraryRow) -> Self {
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
            github_url: row.github_url,
            npm_url: row.npm_url,
            npm_package_name: row.npm_package_name,
            github_stars: row.github_stars,
            github_forks: row.github_forks,
            npm_downloads: row.npm_downloads,
            latest_version: row.latest_version,
            last_update: row.last_update,
            pricing: row.pricing,
            styling: row.styling,
            customization: row.customization,
            installation_command: row.installation_command,
            total_components: row.total_components,
            gallery_images: row.gallery_images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FrameworkRefRow {
    library_id: i64,
    id: i64,
    slug: String,
    name: String,
    icon_url: Option<String>,
    is_primary: bool,
}

impl PostgresRepositories {
    async fn frameworks_for(
        &self,
        library_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<FrameworkRef>>, RepoError> {
        if library_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, FrameworkRefRow>(
            r#"
            SELECT lf.library_id, f.id, f.slug, f.name, f.icon_url, lf.is_primary
            FROM library_frameworks lf
            INNER JOIN frameworks f ON f.id = lf.framework_id
            WHERE lf.library_id = ANY($1)
            ORDER BY lf.is_primary DESC, f.name ASC
            "#,
        )
        .bind(library_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut grouped: HashMap<i64, Vec<FrameworkRef>> = HashMap::new();
        for row in rows {
            grouped.entry(row.library_id).or_default().push(FrameworkRef {
                id: row.id,
                slug: row.slug,
                name: row.name,
                icon_url: row.icon_url,
                is_primary: row.is_primary,
            });
        }
        Ok(grouped)
    }

    async fn summarize(&self, rows: Vec<LibraryRow>) -> Result<Vec<LibrarySummary>, RepoError> {
        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut frameworks = self.frameworks_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let frameworks = frameworks.remove(&row.id).unwrap_or_default();
                LibrarySummary {
                    library: LibraryRecord::from(row),
                    frameworks,
                }
            })
            .collect())
    }
}

#[async_trait]
impl LibrariesRepo for PostgresRepositories {
    async fn list_libraries(
        &self,
        sort: SortSpec,
        filter: &LibraryQueryFilter,
        range: PageRange,
    ) -> Result<LibraryPage, RepoError> {
        let mut count_qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM libraries l WHERE TRUE");
        Self::apply_library_filter(&mut count_qb, filter);
        let total = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(LIBRARY_COLUMNS);
        qb.push(" FROM libraries l WHERE TRUE");
        Self::apply_library_filter(&mut qb, filter);
        qb.push(format!(
            " ORDER BY l.{} {} NULLS LAST, l.id ASC",
            sort.column.as_sql(),
            sort.direction.as_sql()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(range.limit());
        qb.push(" OFFSET ");
        qb.push_bind(range.offset());

        let rows = qb
            .build_query_as::<LibraryRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(LibraryPage {
            libraries: self.summarize(rows).await?,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn find_library_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<LibrarySummary>, RepoError> {
        let sql = format!("SELECT {LIBRARY_COLUMNS} FROM libraries l WHERE l.slug = $1");
        let row = sqlx::query_as::<_, LibraryRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(self.summarize(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn list_libraries_for_framework(
        &self,
        framework_id: i64,
    ) -> Result<Vec<LibraryRecord>, RepoError> {
        let sql = format!(
            "SELECT {LIBRARY_COLUMNS} FROM libraries l \
             INNER JOIN library_frameworks lf ON lf.library_id = l.id \
             WHERE lf.framework_id = $1 \
             ORDER BY l.github_stars DESC NULLS LAST, l.id ASC"
        );
        let rows = sqlx::query_as::<_, LibraryRow>(&sql)
            .bind(framework_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(LibraryRecord::from).collect())
    }
}
