use limbo_server::config::{AppConfig, load_config};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn defaults_serve_localhost_with_a_day_of_retention() {
    let cfg = AppConfig::default();
    assert_eq!(cfg.server.address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.storage.directory, PathBuf::from("./storage"));
    assert_eq!(cfg.storage.max_age(), Duration::from_secs(86_400));
    assert!(!cfg.storage.disabled);
    assert_eq!(cfg.storage.url_base(), "/files/");
    assert_eq!(cfg.logging.level, "info");
}

#[test]
fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[server]
port = 9000

[storage]
directory = "/srv/limbo"
max_storage_seconds = 3600
web_url_base = "https://files.example.com/"

[logging]
level = "debug"
"#
    )
    .unwrap();

    let cfg: AppConfig = load_config(Some(file.path())).unwrap();
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(cfg.storage.directory, PathBuf::from("/srv/limbo"));
    assert_eq!(cfg.storage.max_age(), Duration::from_secs(3600));
    assert_eq!(cfg.storage.url_base(), "https://files.example.com/");
    assert_eq!(cfg.logging.level, "debug");
    assert!(cfg.logging.directory.is_none());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let err = load_config::<AppConfig>(Some(&missing)).unwrap_err();
    assert_eq!(err.kind(), "Config");
}
