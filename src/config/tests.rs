use secrecy::ExposeSecret;

use super::*;

fn with_backend() -> RawSettings {
    let mut raw = RawSettings::default();
    raw.backend.url = Some("https://project.example.co".to_string());
    raw.backend.anon_key = Some("anon".to_string());
    raw.backend.service_key = Some("service-secret".to_string());
    raw
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = with_backend();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_match_the_reference_deployment() {
    let settings = Settings::from_raw(with_backend()).expect("valid settings");

    assert_eq!(settings.site.home_page_size.get(), 9);
    assert_eq!(settings.site.admin_page_size.get(), 10);
    assert_eq!(settings.site.search_debounce, Duration::from_millis(500));
    assert_eq!(settings.storage.bucket, "images");
    assert_eq!(settings.storage.prefix, "posts");
    assert_eq!(settings.auth.provider, "google");
    assert_eq!(settings.site.public_url.as_str(), "http://127.0.0.1:3000/");
    assert!(settings.cache.enabled);
    assert!(settings.mail.is_none());
    assert_eq!(settings.backend.service_key.expose_secret(), "service-secret");
}

#[test]
fn backend_credentials_are_required() {
    let mut raw = with_backend();
    raw.backend.service_key = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("missing key");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "backend.service_key",
            ..
        }
    ));
}

#[test]
fn mail_is_enabled_only_when_fully_configured() {
    let mut raw = with_backend();
    raw.mail.service_id = Some("service_abc".to_string());
    raw.mail.template_id = Some("template_xyz".to_string());
    assert!(Settings::from_raw(raw.clone()).expect("valid").mail.is_none());

    raw.mail.public_key = Some("pk_live".to_string());
    let mail = Settings::from_raw(raw).expect("valid").mail.expect("mail");
    assert_eq!(
        mail.endpoint.as_str(),
        "https://api.emailjs.com/api/v1.0/email/send"
    );
    assert!(mail.private_key.is_none());
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = with_backend();
    raw.site.home_page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("invalid");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "site.home_page_size",
            ..
        }
    ));
}

#[test]
fn non_http_public_url_is_rejected() {
    let mut raw = with_backend();
    raw.site.public_url = Some("ftp://blog.example.com".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = with_backend();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["blogdeck"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "blogdeck",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--site-home-page-size",
        "12",
        "--cache-enabled",
        "false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.site_home_page_size, Some(12));
            assert_eq!(serve.overrides.cache_enabled, Some(false));
        }
    }
}
