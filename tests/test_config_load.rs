mod common;
use common::*;

use clap::Parser;
use std::io::Write;

const NO_PLUGINS: &str = r#"
logger:
  host: 192.168.1.10
  serial: 602123456
plugins:
  enabled: []
"#;

fn config_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn plugin_override_fills_empty_list() {
    let file = config_file(NO_PLUGINS);
    let path = file.path().to_string_lossy().to_string();
    let options = Options::parse_from(["omnik-export", "-c", &path, "-p", "console"]);

    let config = omnik_export::load_config(&options).unwrap();

    assert_eq!(config.plugins.enabled(), ["console".to_string()]);
}

#[test]
fn empty_list_without_override_is_rejected() {
    let file = config_file(NO_PLUGINS);
    let path = file.path().to_string_lossy().to_string();
    let options = Options::parse_from(["omnik-export", "-c", &path]);

    let err = omnik_export::load_config(&options).unwrap_err();

    assert!(err.to_string().contains("plugins.enabled"), "{:#}", err);
}

#[test]
fn serial_and_loglevel_overrides() {
    let file = config_file(&NO_PLUGINS.replace("[]", "[console]"));
    let path = file.path().to_string_lossy().to_string();
    let options = Options::parse_from(["omnik-export", "-c", &path, "-s", "602123457", "-l", "debug"]);

    let config = omnik_export::load_config(&options).unwrap();

    assert_eq!(config.logger.serial(), 602123457);
    assert_eq!(config.loglevel, "debug");
}
