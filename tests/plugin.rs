mod common;

use common::{LogCapture, ScriptedDriver};
use serde_json::json;
use std::collections::HashMap;
use voldriver::api::{ErrorResponse, MountResponse, TlsConfig};
use voldriver::driver::Driver;
use voldriver::env::Env;
use voldriver::invoker::TransportError;
use voldriver::plugin::{DockerDriverPlugin, Plugin, PluginError, PluginSpec, PluginTlsConfig};

fn spec(address: &str, tls_config: Option<PluginTlsConfig>) -> PluginSpec {
    PluginSpec {
        name: "nfs".into(),
        address: address.into(),
        tls_config,
    }
}

#[tokio::test]
async fn mount_creates_before_mounting() {
    let driver = ScriptedDriver::mounting_at("/var/vcap/data/volumes/v1");
    let calls = driver.calls.clone();
    let created = driver.created.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let opts = HashMap::from([("size".to_string(), json!(10))]);
    let response = plugin
        .mount(&Env::background(), "nfs", "v1", opts.clone())
        .await
        .unwrap();

    assert_eq!(response.path, "/var/vcap/data/volumes/v1");
    assert_eq!(*calls.lock().unwrap(), vec!["create", "mount"]);

    let created = created.lock().unwrap();
    assert_eq!(created[0].name, "v1");
    assert_eq!(created[0].opts, opts);
}

#[tokio::test]
async fn create_failure_skips_mount() {
    let driver = ScriptedDriver {
        create: ErrorResponse::failed("quota exceeded"),
        ..ScriptedDriver::mounting_at("/var/vcap/data/v1")
    };
    let calls = driver.calls.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let err = plugin
        .mount(&Env::background(), "nfs", "v1", HashMap::new())
        .await
        .unwrap_err();

    assert!(matches!(&err, PluginError::Driver(msg) if msg == "quota exceeded"));
    assert_eq!(*calls.lock().unwrap(), vec!["create"]);
}

#[tokio::test]
async fn create_transport_failure_is_not_a_driver_error() {
    let driver = ScriptedDriver {
        create_fault: Some(|| TransportError::Status { status: 502 }),
        ..ScriptedDriver::mounting_at("/var/vcap/data/v1")
    };
    let calls = driver.calls.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let err = plugin
        .mount(&Env::background(), "nfs", "v1", HashMap::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PluginError::Transport(TransportError::Status { status: 502 })
    ));
    assert_eq!(*calls.lock().unwrap(), vec!["create"]);
}

#[tokio::test]
async fn mount_failure_is_reported_verbatim() {
    let driver = ScriptedDriver {
        mount: MountResponse {
            err: "mount: permission denied".into(),
            mountpoint: String::new(),
        },
        ..Default::default()
    };
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let err = plugin
        .mount(&Env::background(), "nfs", "v1", HashMap::new())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "mount: permission denied");
}

#[tokio::test]
async fn mount_outside_data_dir_still_succeeds() {
    let logs = LogCapture::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());
    let plugin = DockerDriverPlugin::new(Box::new(ScriptedDriver::mounting_at("/tmp/evil")));

    let response = plugin
        .mount(&Env::background(), "nfs", "v1", HashMap::new())
        .await
        .unwrap();

    assert_eq!(response.path, "/tmp/evil");
    let logs = logs.contents();
    assert!(logs.contains("WARN"));
    assert!(logs.contains("invalid-mountpath"));
    assert!(logs.contains("mountpoint=/tmp/evil"));
}

#[tokio::test]
async fn custom_data_dir_is_honored() {
    let logs = LogCapture::default();
    let _guard = tracing::subscriber::set_default(logs.subscriber());
    let plugin = DockerDriverPlugin::new(Box::new(ScriptedDriver::mounting_at("/mnt/vols/v1")))
        .with_data_dir("/mnt/vols");

    assert_eq!(plugin.data_dir(), std::path::Path::new("/mnt/vols"));
    let response = plugin
        .mount(&Env::background(), "nfs", "v1", HashMap::new())
        .await
        .unwrap();
    assert_eq!(response.path, "/mnt/vols/v1");
    assert!(!logs.contents().contains("invalid-mountpath"));
}

#[tokio::test]
async fn unmount_failure_is_reported_verbatim() {
    let driver = ScriptedDriver {
        unmount: ErrorResponse::failed("volume busy"),
        ..Default::default()
    };
    let calls = driver.calls.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let err = plugin
        .unmount(&Env::background(), "nfs", "v1")
        .await
        .unwrap_err();

    assert!(matches!(&err, PluginError::Driver(msg) if msg == "volume busy"));
    assert_eq!(*calls.lock().unwrap(), vec!["unmount"]);
}

#[tokio::test]
async fn unmount_transport_failure_is_not_a_driver_error() {
    let driver = ScriptedDriver {
        unmount_fault: Some(|| TransportError::Cancelled),
        ..Default::default()
    };
    let calls = driver.calls.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let err = plugin
        .unmount(&Env::background(), "nfs", "v1")
        .await
        .unwrap_err();

    assert!(matches!(err, PluginError::Transport(TransportError::Cancelled)));
    assert_eq!(*calls.lock().unwrap(), vec!["unmount"]);
}

#[tokio::test]
async fn unmount_success() {
    let plugin = DockerDriverPlugin::new(Box::new(ScriptedDriver::default()));
    plugin
        .unmount(&Env::background(), "nfs", "v1")
        .await
        .unwrap();
}

#[test]
fn non_matchable_driver_never_matches() {
    let logs = LogCapture::default();
    let plugin = DockerDriverPlugin::new(Box::new(ScriptedDriver::default()));

    tracing::subscriber::with_default(logs.subscriber(), || {
        assert!(!plugin.matches(&Env::background(), &spec("/run/docker/plugins/nfs.sock", None)));
        assert!(!plugin.matches(&Env::background(), &spec("", None)));
    });

    let logs = logs.contents();
    assert!(logs.contains("is_matchable=false"));
    assert!(logs.contains("matches=false"));
}

#[test]
fn matchable_driver_decides() {
    let driver = ScriptedDriver {
        matchable_address: Some("/run/docker/plugins/nfs.sock".into()),
        ..Default::default()
    };
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    assert!(plugin.matches(&Env::background(), &spec("/run/docker/plugins/nfs.sock", None)));
    assert!(!plugin.matches(&Env::background(), &spec("/run/docker/plugins/other.sock", None)));
}

#[test]
fn absent_tls_stays_absent() {
    let driver = ScriptedDriver {
        matchable_address: Some("10.0.0.1:7589".into()),
        ..Default::default()
    };
    let seen = driver.matched_tls.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    plugin.matches(&Env::background(), &spec("10.0.0.1:7589", None));
    plugin.matches(
        &Env::background(),
        &spec(
            "10.0.0.1:7589",
            Some(PluginTlsConfig {
                insecure_skip_verify: true,
                ca_file: "/certs/ca.crt".into(),
                ..Default::default()
            }),
        ),
    );

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0], None);
    assert_eq!(
        seen[1],
        Some(TlsConfig {
            insecure_skip_verify: true,
            ca_file: "/certs/ca.crt".into(),
            cert_file: String::new(),
            key_file: String::new(),
        })
    );
}

#[tokio::test]
async fn driver_accessor_exposes_wrapped_driver() {
    let driver = ScriptedDriver::default();
    let calls = driver.calls.clone();
    let plugin = DockerDriverPlugin::new(Box::new(driver));

    let response = plugin.driver().activate(&Env::background()).await.unwrap();
    assert!(response.implements_volume_driver());
    assert_eq!(*calls.lock().unwrap(), vec!["activate"]);
}
