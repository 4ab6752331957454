use crate::api::{DriverSpec, TlsConfig};
use crate::config::{ConfigError, Overlay, Timeout};
use crate::plugin::DEFAULT_DATA_DIR;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SOCKET: &str = "/run/docker/plugins/voldriver.sock";
pub const DEFAULT_ROOT_DIR: &str = "/var/vcap/data/voldriver";
pub const DEFAULT_STATE_DIR: &str = "/var/lib/voldriver";

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub socket: PathBuf,
    pub root_dir: PathBuf,
    pub state_dir: PathBuf,
}

#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServeArgs {
    /// Path to the listening socket.
    #[arg(long, env = "VOLDRIVER_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Directory holding one directory per volume.
    ///
    /// Volumes are mounted from here, so it should live under the data
    /// directory hosts expect mount points in.
    #[arg(long, env = "VOLDRIVER_ROOT_DIR")]
    pub root_dir: Option<PathBuf>,

    /// Directory where volume metadata is persisted across restarts.
    #[arg(long, env = "VOLDRIVER_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl Overlay for ServeArgs {
    fn overlay(self, over: Self) -> Self {
        Self {
            socket: self.socket.overlay(over.socket),
            root_dir: self.root_dir.overlay(over.root_dir),
            state_dir: self.state_dir.overlay(over.state_dir),
        }
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = ConfigError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let config = ServeConfig {
            socket: args.socket.unwrap_or_else(|| DEFAULT_SOCKET.into()),
            root_dir: args.root_dir.unwrap_or_else(|| DEFAULT_ROOT_DIR.into()),
            state_dir: args.state_dir.unwrap_or_else(|| DEFAULT_STATE_DIR.into()),
        };

        for (name, path) in [
            ("socket", &config.socket),
            ("root-dir", &config.root_dir),
            ("state-dir", &config.state_dir),
        ] {
            if !path.is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "{} must be an absolute path, got {:?}",
                    name, path
                )));
            }
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub tls_config: Option<TlsConfig>,
    pub timeout: Duration,
    pub data_dir: PathBuf,
}

impl ClientConfig {
    pub fn driver_spec(&self) -> DriverSpec {
        DriverSpec {
            name: String::new(),
            address: self.address.clone(),
            tls_config: self.tls_config.clone(),
        }
    }
}

#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ClientArgs {
    /// Plugin address: `unix:///path.sock`, `/path.sock`, `host:port` or an http(s) URL
    #[arg(long, env = "VOLDRIVER_ADDRESS")]
    pub address: Option<String>,

    #[command(flatten)]
    #[serde(flatten)]
    pub tls: TlsArgs,

    /// Timeout for a single plugin request
    #[arg(long, env = "VOLDRIVER_TIMEOUT")]
    pub timeout: Option<Timeout>,

    /// Directory under which mount points are expected
    #[arg(long, env = "VOLDRIVER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

impl Overlay for ClientArgs {
    fn overlay(self, over: Self) -> Self {
        Self {
            address: self.address.overlay(over.address),
            tls: self.tls.overlay(over.tls),
            timeout: self.timeout.overlay(over.timeout),
            data_dir: self.data_dir.overlay(over.data_dir),
        }
    }
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = ConfigError;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        let address = args.address.filter(|a| !a.is_empty()).ok_or_else(|| {
            ConfigError::Validation(
                "missing plugin address (use --address or VOLDRIVER_ADDRESS)".into(),
            )
        })?;

        Ok(ClientConfig {
            address,
            tls_config: args.tls.into_tls_config(),
            timeout: args.timeout.unwrap_or_default().into(),
            data_dir: args.data_dir.unwrap_or_else(|| DEFAULT_DATA_DIR.into()),
        })
    }
}

/// TLS settings for reaching a plugin over TCP.
///
/// Setting any of these requests TLS. Leaving all of them unset means the
/// plugin is reached without TLS.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsArgs {
    /// CA certificate used to verify the plugin
    #[arg(long = "tls-ca-file", env = "VOLDRIVER_TLS_CA_FILE")]
    #[serde(rename = "tls-ca-file")]
    pub ca_file: Option<String>,

    /// Client certificate presented to the plugin
    #[arg(long = "tls-cert-file", env = "VOLDRIVER_TLS_CERT_FILE")]
    #[serde(rename = "tls-cert-file")]
    pub cert_file: Option<String>,

    /// Key of the client certificate
    #[arg(long = "tls-key-file", env = "VOLDRIVER_TLS_KEY_FILE")]
    #[serde(rename = "tls-key-file")]
    pub key_file: Option<String>,

    /// Skip verification of the plugin certificate
    #[arg(
        long = "tls-insecure-skip-verify",
        env = "VOLDRIVER_TLS_INSECURE_SKIP_VERIFY",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    #[serde(rename = "tls-insecure-skip-verify")]
    pub insecure_skip_verify: Option<bool>,
}

impl Overlay for TlsArgs {
    fn overlay(self, over: Self) -> Self {
        Self {
            ca_file: self.ca_file.overlay(over.ca_file),
            cert_file: self.cert_file.overlay(over.cert_file),
            key_file: self.key_file.overlay(over.key_file),
            insecure_skip_verify: self.insecure_skip_verify.overlay(over.insecure_skip_verify),
        }
    }
}

impl TlsArgs {
    pub fn into_tls_config(self) -> Option<TlsConfig> {
        if self == TlsArgs::default() {
            return None;
        }
        Some(TlsConfig {
            insecure_skip_verify: self.insecure_skip_verify.unwrap_or(false),
            ca_file: self.ca_file.unwrap_or_default(),
            cert_file: self.cert_file.unwrap_or_default(),
            key_file: self.key_file.unwrap_or_default(),
        })
    }
}
