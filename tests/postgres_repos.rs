use sqlx::PgPool;
use time::macros::date;
use time::{Duration, OffsetDateTime};
use uidir::application::repos::{
    FrameworksRepo, LibrariesRepo, LibraryQueryFilter, PageRange, StatsCacheRepo,
};
use uidir::domain::types::{SortBy, SortSpec};
use uidir::infra::db::PostgresRepositories;
use uidir_api_types::DailyDownloads;

async fn seed(pool: &PgPool) {
    sqlx::query(
        "INSERT INTO frameworks (slug, name, title, npm_package_name, github_stars, type) VALUES \
         ('react', 'React', 'React', 'react', 220000, 'library'), \
         ('vue', 'Vue', 'Vue.js', 'vue', 45000, 'framework')",
    )
    .execute(pool)
    .await
    .expect("seed frameworks");

    sqlx::query(
        "INSERT INTO libraries \
         (slug, name, title, description, github_stars, npm_downloads, total_components, last_update) VALUES \
         ('shadcn-ui', 'shadcn/ui', 'shadcn/ui', 'Copy-paste components', 80000, 900000, 50, now() - interval '2 days'), \
         ('vuetify', 'Vuetify', 'Vuetify', 'Material 100% in Vue', 39000, 600000, 80, now() - interval '40 days'), \
         ('tiny_kit', 'Tiny Kit', 'Tiny Kit', NULL, NULL, NULL, 5, NULL)",
    )
    .execute(pool)
    .await
    .expect("seed libraries");

    sqlx::query(
        "INSERT INTO library_frameworks (library_id, framework_id, is_primary) \
         SELECT l.id, f.id, TRUE FROM libraries l, frameworks f \
         WHERE (l.slug = 'shadcn-ui' AND f.slug = 'react') OR (l.slug = 'vuetify' AND f.slug = 'vue')",
    )
    .execute(pool)
    .await
    .expect("seed bindings");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn popular_listing_orders_by_stars_with_nulls_last(pool: PgPool) {
    seed(&pool).await;
    let repos = PostgresRepositories::new(pool);

    let page = repos
        .list_libraries(
            SortSpec::from(SortBy::Popular),
            &LibraryQueryFilter::default(),
            PageRange::default(),
        )
        .await
        .expect("page");

    assert_eq!(page.total, 3);
    let slugs: Vec<_> = page
        .libraries
        .iter()
        .map(|summary| summary.library.slug.as_str())
        .collect();
    assert_eq!(slugs, ["shadcn-ui", "vuetify", "tiny_kit"]);
    assert_eq!(page.libraries[0].frameworks[0].slug, "react");
    assert!(page.libraries[0].frameworks[0].is_primary);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn filters_compose_and_total_ignores_range(pool: PgPool) {
    seed(&pool).await;
    let repos = PostgresRepositories::new(pool);

    let recent = LibraryQueryFilter {
        updated_within_days: Some(7),
        ..Default::default()
    };
    let page = repos
        .list_libraries(SortSpec::from(SortBy::Latest), &recent, PageRange::default())
        .await
        .expect("recent");
    assert_eq!(page.total, 1);

    let vue = LibraryQueryFilter {
        framework: Some("vue".into()),
        min_components: Some(10),
        ..Default::default()
    };
    let page = repos
        .list_libraries(SortSpec::from(SortBy::Name), &vue, PageRange::default())
        .await
        .expect("vue");
    assert_eq!(page.libraries.len(), 1);
    assert_eq!(page.libraries[0].library.slug, "vuetify");

    // Literal LIKE metacharacters in the search term.
    let search = LibraryQueryFilter {
        search: Some("100%".into()),
        ..Default::default()
    };
    let page = repos
        .list_libraries(SortSpec::from(SortBy::Popular), &search, PageRange::default())
        .await
        .expect("search");
    assert_eq!(page.total, 1);

    let narrow = repos
        .list_libraries(
            SortSpec::from(SortBy::Popular),
            &LibraryQueryFilter::default(),
            PageRange::new(1, 1).expect("range"),
        )
        .await
        .expect("narrow");
    assert_eq!(narrow.total, 3);
    assert_eq!(narrow.libraries.len(), 1);
    assert_eq!(narrow.libraries[0].library.slug, "vuetify");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn framework_lookup_and_bound_libraries(pool: PgPool) {
    seed(&pool).await;
    let repos = PostgresRepositories::new(pool);

    let (frameworks, total) = repos
        .list_frameworks(SortSpec::from(SortBy::Popular), PageRange::default())
        .await
        .expect("frameworks");
    assert_eq!(total, 2);
    assert_eq!(frameworks[0].slug, "react");
    assert_eq!(frameworks[0].kind.as_deref(), Some("library"));

    let vue = repos
        .find_framework_by_slug("vue")
        .await
        .expect("lookup")
        .expect("vue exists");
    let bound = repos
        .list_libraries_for_framework(vue.id)
        .await
        .expect("bound");
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].slug, "vuetify");

    assert!(
        repos
            .find_library_by_slug("missing")
            .await
            .expect("lookup")
            .is_none()
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stats_cache_upserts_by_package(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    assert!(repos.load_series("react").await.expect("load").is_none());

    let series = vec![
        DailyDownloads {
            day: date!(2025 - 04 - 01),
            downloads: 10,
        },
        DailyDownloads {
            day: date!(2025 - 04 - 02),
            downloads: 20,
        },
    ];
    let earlier = OffsetDateTime::now_utc() - Duration::hours(2);
    repos
        .store_series("react", &series[..1], earlier)
        .await
        .expect("first store");
    let now = OffsetDateTime::now_utc();
    repos
        .store_series("react", &series, now)
        .await
        .expect("upsert");

    let entry = repos
        .load_series("react")
        .await
        .expect("load")
        .expect("entry");
    assert_eq!(entry.package_name, "react");
    assert_eq!(entry.series, series);
    assert!(entry.last_updated > earlier);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn health_check_reaches_the_database(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    repos.health_check().await.expect("healthy");
}
