use async_trait::async_trait;
use sqlx::types::Json;
use time::OffsetDateTime;
use uidir_api_types::DailyDownloads;

use crate::application::repos::{RepoError, StatsCacheEntry, StatsCacheRepo};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct StatsCacheRow {
    package_name: String,
    stats_data: Json<Vec<DailyDownloads>>,
    last_updated: OffsetDateTime,
}

#[async_trait]
impl StatsCacheRepo for PostgresRepositories {
    async fn load_series(
        &self,
        package_name: &str,
    ) -> Result<Option<StatsCacheEntry>, RepoError> {
        let row = sqlx::query_as::<_, StatsCacheRow>(
            r#"
            SELECT package_name, stats_data, last_updated
            FROM package_stats_cache
            WHERE package_name = $1
            "#,
        )
        .bind(package_name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(|row| StatsCacheEntry {
            package_name: row.package_name,
            series: row.stats_data.0,
            last_updated: row.last_updated,
        }))
    }

    async fn store_series(
        &self,
        package_name: &str,
        series: &[DailyDownloads],
        updated_at: OffsetDateTime,
    ) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO package_stats_cache (package_name, stats_data, last_updated)
            VALUES ($1, $2, $3)
            ON CONFLICT (package_name)
            DO UPDATE SET stats_data = EXCLUDED.stats_data, last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(package_name)
        .bind(Json(series))
        .bind(updated_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
