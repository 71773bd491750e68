//! Postgres-backed repository implementations.

mod frameworks;
mod libraries;
mod stats_cache;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::LibraryQueryFilter;

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    fn apply_library_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &LibraryQueryFilter) {
        if let Some(min) = filter.min_components {
            qb.push(" AND l.total_components >= ");
            qb.push_bind(i32::try_from(min).unwrap_or(i32::MAX));
        }

        if let Some(min) = filter.min_downloads {
            qb.push(" AND l.npm_downloads >= ");
            qb.push_bind(i64::try_from(min).unwrap_or(i64::MAX));
        }

        if let Some(days) = filter.updated_within_days {
            qb.push(" AND l.last_update >= now() - make_interval(days => ");
            qb.push_bind(i32::try_from(days).unwrap_or(i32::MAX));
            qb.push(")");
        }

        if let Some(framework) = filter.framework.as_ref() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM library_frameworks lf \
                 INNER JOIN frameworks f ON f.id = lf.framework_id \
                 WHERE lf.library_id = l.id AND f.slug = ",
            );
            qb.push_bind(framework.clone());
            qb.push(")");
        }

        if let Some(search) = filter.search.as_ref() {
            let pattern = format!("%{}%", escape_like(search));
            qb.push(" AND (l.name ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR l.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR l.description ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
