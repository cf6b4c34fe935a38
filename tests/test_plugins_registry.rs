mod common;
use common::*;

fn plugins_config(datalog: Option<&str>) -> config::Plugins {
    config::Plugins {
        enabled: vec![],
        datalog: datalog.map(|path| config::Datalog {
            path: path.to_string(),
        }),
        mqtt: Some(config::Mqtt {
            host: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            namespace: "omnik".to_string(),
            retain: false,
        }),
        influx: None,
        database: None,
        pvoutput: None,
    }
}

fn lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn registers_in_configured_order() {
    let registry = Registry::register(
        &["mqtt", " Console ", "datalog"],
        &plugins_config(Some("/tmp/omnik.json")),
    )
    .unwrap();

    assert_eq!(registry.names(), vec!["mqtt", "console", "datalog"]);
    assert_eq!(registry.len(), 3);
}

#[test]
fn unknown_plugin_fails_registration() {
    let err = Registry::register(&["console", "nonexistent"], &plugins_config(None)).unwrap_err();

    assert_eq!(
        taxonomy(&err),
        Some(&Error::PluginLoad("nonexistent".to_string()))
    );
    assert_eq!(Error::exit_code_for(&err), 3);
}

#[test]
fn missing_section_fails_registration() {
    let err = Registry::register(&["datalog"], &plugins_config(None)).unwrap_err();

    assert_eq!(taxonomy(&err), Some(&Error::PluginLoad("datalog".to_string())));
}

#[test]
fn empty_registry() {
    let registry = Registry::register::<&str>(&[], &plugins_config(None)).unwrap();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn broadcast_isolates_failures() {
    common_setup();

    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.json");
    let third = dir.path().join("third.json");

    // a directory cannot be opened for append
    let registry = Registry::from_plugins(vec![
        Factory::datalog(&first),
        Factory::datalog(dir.path()),
        Factory::datalog(&third),
    ]);

    let reading = Factory::reading();
    let report = registry.broadcast(&reading).await;

    assert_eq!(report.invoked(), 3);
    assert_eq!(report.succeeded, vec!["datalog", "datalog"]);
    assert_eq!(report.failed.len(), 1);
    assert!(!report.is_clean());

    for path in [&first, &third] {
        let lines = lines(path);
        assert_eq!(lines.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(json["id"], "NLDN402013212035");
        assert_eq!(json["p_ac"], 8850);
    }
}

#[tokio::test]
async fn broadcast_appends_one_line_per_reading() {
    common_setup();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/log.json");
    let registry = Registry::from_plugins(vec![Factory::datalog(&path)]);

    let reading = Factory::reading();
    assert!(registry.broadcast(&reading).await.is_clean());
    assert!(registry.broadcast(&reading).await.is_clean());

    assert_eq!(lines(&path).len(), 2);
}
