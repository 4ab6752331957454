//! Uniform plugin surface consumed by the volume-management host.
//!
//! [`DockerDriverPlugin`] wraps any [`Driver`] and turns the protocol's
//! errors-as-data into ordinary `Result`s. Transport failures and driver
//! reported failures stay distinguishable through [`PluginError`].
use crate::api::{CreateRequest, Envelope, MountRequest, TlsConfig, UnmountRequest};
use crate::driver::Driver;
use crate::env::Env;
use crate::invoker::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{Instrument, debug, error, info, warn};

/// Directory under which mount points are expected to live.
pub const DEFAULT_DATA_DIR: &str = "/var/vcap/data";

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Message reported by the driver in its `Err` field, verbatim
    #[error("{0}")]
    Driver(String),
}

/// TLS settings of a plugin as known to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTlsConfig {
    pub insecure_skip_verify: bool,
    pub ca_file: String,
    pub cert_file: String,
    pub key_file: String,
}

impl From<&PluginTlsConfig> for TlsConfig {
    fn from(tls: &PluginTlsConfig) -> Self {
        TlsConfig {
            insecure_skip_verify: tls.insecure_skip_verify,
            ca_file: tls.ca_file.clone(),
            cert_file: tls.cert_file.clone(),
            key_file: tls.key_file.clone(),
        }
    }
}

/// Host-side description of a discovered plugin endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    pub address: String,
    pub tls_config: Option<PluginTlsConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMountResponse {
    pub path: String,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Creates the volume if needed and mounts it, returning the mount path.
    async fn mount(
        &self,
        env: &Env,
        plugin_id: &str,
        volume_id: &str,
        opts: HashMap<String, Value>,
    ) -> Result<PluginMountResponse, PluginError>;

    async fn unmount(&self, env: &Env, plugin_id: &str, volume_id: &str)
    -> Result<(), PluginError>;

    /// Whether `spec` identifies the driver behind this plugin.
    ///
    /// Drivers without the matchable capability never match.
    fn matches(&self, env: &Env, spec: &PluginSpec) -> bool;

    fn driver(&self) -> &dyn Driver;
}

pub struct DockerDriverPlugin {
    driver: Box<dyn Driver>,
    data_dir: PathBuf,
}

impl DockerDriverPlugin {
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            driver,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn create_and_mount(
        &self,
        env: &Env,
        plugin_id: &str,
        volume_id: &str,
        opts: HashMap<String, Value>,
    ) -> Result<PluginMountResponse, PluginError> {
        debug!(volume_id, plugin_id, "creating-volume");
        let request = CreateRequest {
            name: volume_id.to_string(),
            opts,
        };
        self.driver
            .create(env, request)
            .await?
            .into_result()
            .map_err(PluginError::Driver)?;

        let request = MountRequest::new(volume_id);
        debug!(plugin_id, ?request, "calling-driver-with-mount-request");
        let response = self.driver.mount(env, request).await?;
        debug!(?response, "response-from-driver");

        // Advisory only: the mount still succeeds.
        if !is_sanctioned(&self.data_dir, &response.mountpoint) {
            warn!(
                mountpoint = %response.mountpoint,
                data_dir = %self.data_dir.display(),
                "invalid-mountpath: mount path lies outside of the data directory"
            );
        }

        let response = response.into_result().map_err(PluginError::Driver)?;
        Ok(PluginMountResponse {
            path: response.mountpoint,
        })
    }

    async fn unmount_volume(
        &self,
        env: &Env,
        plugin_id: &str,
        volume_id: &str,
    ) -> Result<(), PluginError> {
        debug!(volume_id, plugin_id, "unmounting-volume");
        let response = self
            .driver
            .unmount(env, UnmountRequest::new(volume_id))
            .await?;

        if let Err(msg) = response.into_result() {
            error!(volume_id, error = %msg, "unmount-failed");
            return Err(PluginError::Driver(msg));
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for DockerDriverPlugin {
    async fn mount(
        &self,
        env: &Env,
        plugin_id: &str,
        volume_id: &str,
        opts: HashMap<String, Value>,
    ) -> Result<PluginMountResponse, PluginError> {
        let env = env.session("mount");
        let span = env.span().clone();
        async {
            debug!("start");
            let result = self.create_and_mount(&env, plugin_id, volume_id, opts).await;
            debug!("end");
            result
        }
        .instrument(span)
        .await
    }

    async fn unmount(
        &self,
        env: &Env,
        plugin_id: &str,
        volume_id: &str,
    ) -> Result<(), PluginError> {
        let env = env.session("unmount");
        let span = env.span().clone();
        async {
            debug!("start");
            let result = self.unmount_volume(&env, plugin_id, volume_id).await;
            debug!("end");
            result
        }
        .instrument(span)
        .await
    }

    fn matches(&self, env: &Env, spec: &PluginSpec) -> bool {
        let env = env.session("matches");
        let _entered = env.span().enter();
        debug!("start");

        let matches = match self.driver.as_matchable() {
            Some(driver) => {
                info!(is_matchable = true, "matches");
                let tls_config = spec.tls_config.as_ref().map(TlsConfig::from);
                driver.matches(&env, &spec.address, tls_config.as_ref())
            }
            None => {
                info!(is_matchable = false, "matches");
                false
            }
        };

        info!(matches, "matches");
        debug!("end");
        matches
    }

    fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }
}

fn is_sanctioned(data_dir: &Path, mountpoint: &str) -> bool {
    Path::new(mountpoint).starts_with(data_dir)
}
