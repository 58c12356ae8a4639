//! Integration tests for the alias store and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use shellhop::backend::ssh::HostKeyPolicy;
use shellhop::config::env::EnvConfig;
use shellhop::config::file::load_store;
use shellhop::config::{AuthKind, Credential};
use shellhop::session::KeepaliveConfig;
use shellhop::ErrorKind;

const STORE: &str = r#"{
    "global": {"server_alive_interval": 10},
    "servers": {
        "web": {"host": "web.example.com", "user": "deploy", "password": "s3cret"},
        "db": {"host": "10.0.0.5", "user": "postgres", "port": 2222,
               "key": "~/.ssh/db_ed25519", "proxy": "socks5://127.0.0.1:1080"},
        "pinned": {"host": "bastion", "user": "ops", "port": -1,
                   "host_key": "SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8"},
        "broken": {"host": "", "user": "nobody"},
        "badauth": {"host": "h", "user": "u", "auth_method": "password"}
    }
}"#;

fn write_store() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssh_config.json");
    std::fs::write(&path, STORE).unwrap();
    (dir, path)
}

#[test]
fn store_profiles_validate_with_defaults() {
    let (_dir, path) = write_store();
    let store = load_store(&path).unwrap();

    let web = store.get("web").unwrap().validate().unwrap();
    assert_eq!(web.port, 22);
    assert_eq!(web.auth_kind(), AuthKind::Password);
    assert!(web.proxy.is_none());

    let db = store.get("db").unwrap().validate().unwrap();
    assert_eq!(db.port, 2222);
    assert_eq!(
        db.credential,
        Credential::Key {
            path: "~/.ssh/db_ed25519".into(),
            passphrase: None,
        }
    );
    assert_eq!(db.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));

    let pinned = store.get("pinned").unwrap().validate().unwrap();
    assert_eq!(pinned.port, 22);
    assert_eq!(
        pinned.host_key.as_deref(),
        Some("SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8")
    );
}

#[test]
fn invalid_records_are_rejected() {
    let (_dir, path) = write_store();
    let store = load_store(&path).unwrap();

    for alias in ["broken", "badauth"] {
        let err = store.get(alias).unwrap().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid, "{alias}");
        assert!(err.is_config());
    }
}

#[test]
fn listing_filters_and_hides_secrets() {
    let (_dir, path) = write_store();
    let store = load_store(&path).unwrap();

    let all: Vec<_> = store.matching("").map(|(alias, _)| alias).collect();
    assert_eq!(all, ["badauth", "broken", "db", "pinned", "web"]);

    let lines: Vec<_> = store
        .matching("EXAMPLE")
        .map(|(alias, server)| format!("[{alias}] {}", server.summary()))
        .collect();
    assert_eq!(lines, ["[web] deploy@web.example.com"]);
    assert!(!lines[0].contains("s3cret"));

    let db = store.get("db").unwrap().summary();
    assert_eq!(db, "postgres@10.0.0.5:2222, proxy: socks5://127.0.0.1:1080");
}

#[test]
fn global_interval_drives_keepalive() {
    let (_dir, path) = write_store();
    let store = load_store(&path).unwrap();

    let keepalive = KeepaliveConfig::from_global(store.global.as_ref());
    assert_eq!(keepalive.interval, Some(Duration::from_secs(10)));
}

#[test]
fn env_points_at_store() {
    let (_dir, path) = write_store();
    let env = EnvConfig::new("SHELLHOP_IT").with_var("SHELLHOP_IT_CONFIG", path.to_string_lossy());
    assert_eq!(env.store_path().map(PathBuf::from), Some(path));
}

#[test]
fn env_selects_pinned_policy_per_alias() {
    let (_dir, path) = write_store();
    let store = load_store(&path).unwrap();
    let profile = store.get("pinned").unwrap().validate().unwrap();

    let options = EnvConfig::new("SHELLHOP_IT")
        .with_var("SHELLHOP_IT_HOST_KEY", "strict")
        .session_options()
        .unwrap();
    assert_eq!(options.host_key_policy, HostKeyPolicy::KnownHosts);
    assert_eq!(
        HostKeyPolicy::for_profile(&options.host_key_policy, &profile),
        HostKeyPolicy::Pinned("SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8".into())
    );
}
