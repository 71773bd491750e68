use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        logging: LoggingOverrides {
            log_level: Some("debug".to_string()),
            log_json: None,
        },
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_are_complete() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.environment, "production");
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(
        settings.registry.downloads_base_url.as_str(),
        "https://api.npmjs.org/"
    );
    assert_eq!(settings.registry.timeout, Duration::from_secs(10));
    assert!(settings.registry.user_agent.starts_with("uidir/"));
    assert!(settings.cache.enabled);
    assert_eq!(settings.cache.max_entries.get(), 512);
    assert_eq!(settings.cache.list_ttl, Duration::from_secs(60));
    assert_eq!(settings.cache.stats_ttl, Duration::from_secs(3600));
    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.retry.delay, Duration::from_millis(1000));
    assert!(settings.stats.durable_enabled);
    assert_eq!(settings.stats.durable_ttl, Duration::from_secs(24 * 3600));
    assert_eq!(settings.stats.default_window, StatsWindow::TwoWeeks);
    assert_eq!(settings.revalidation.backend, PurgeBackend::Auto);
    assert!(settings.revalidation.token.is_none());
}

#[test]
fn blank_secrets_count_as_missing() {
    let mut raw = RawSettings::default();
    raw.revalidation.token = Some("   ".to_string());
    raw.database.url = Some(String::new());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.revalidation.token.is_none());
    assert!(settings.database.url.is_none());
}

#[test]
fn invalid_values_name_their_key() {
    let mut raw = RawSettings::default();
    raw.stats.default_window = Some(7);
    let err = Settings::from_raw(raw).expect_err("window rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "stats.default_window",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.cache.max_entries = Some(0);
    let err = Settings::from_raw(raw).expect_err("capacity rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.max_entries",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.registry.registry_base_url = Some("not a url".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn explicit_backends_require_their_settings() {
    let mut raw = RawSettings::default();
    raw.revalidation.backend = Some("build_hook".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.revalidation.backend = Some("purge-api".to_string());
    raw.revalidation.api_token = Some("token".to_string());
    raw.revalidation.site_id = Some("site".to_string());
    let settings = Settings::from_raw(raw).expect("purge api configured");
    assert_eq!(settings.revalidation.backend, PurgeBackend::PurgeApi);

    let mut raw = RawSettings::default();
    raw.revalidation.backend = Some("carrier-pigeon".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_logging_overrides(&LoggingOverrides {
        log_level: None,
        log_json: Some(true),
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["uidir"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "uidir",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enabled",
        "false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enabled, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_revalidate_arguments() {
    let args = CliArgs::parse_from([
        "uidir",
        "revalidate",
        "--site",
        "https://ui.example.test",
        "--path",
        "/libraries",
        "--path",
        "/frameworks/react",
        "--token",
        "s3cret",
    ]);

    match args.command.expect("revalidate command") {
        Command::Revalidate(revalidate) => {
            assert_eq!(revalidate.site, "https://ui.example.test");
            assert_eq!(revalidate.paths, vec!["/libraries", "/frameworks/react"]);
            assert_eq!(revalidate.token.as_deref(), Some("s3cret"));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_stats_arguments_and_apply_window() {
    let args = CliArgs::parse_from(["uidir", "stats", "@radix-ui/react-select", "--window", "30"]);

    let Some(Command::Stats(stats)) = args.command else {
        panic!("wrong command parsed");
    };
    assert_eq!(stats.package, "@radix-ui/react-select");

    let mut raw = RawSettings::default();
    raw.apply_stats_overrides(&stats);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.stats.default_window, StatsWindow::Month);
}
