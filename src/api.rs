//! Request and response envelopes of the volume plugin protocol.
//!
//! Plugins report failures as data: a response that decodes fine may still
//! carry a non-empty `Err` field, which is then the authoritative error
//! message. These types keep that field as plain text. Turning it into a
//! Rust error happens in the plugin adapter, never at decode time.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Capability a plugin advertises from `/Plugin.Activate` to be used as a volume driver.
pub const VOLUME_DRIVER_IMPLEMENTS: &str = "VolumeDriver";

/// Implemented by every response envelope that carries an `Err` field.
pub trait Envelope: Sized {
    fn err(&self) -> &str;

    fn is_err(&self) -> bool {
        !self.err().is_empty()
    }

    /// Splits the envelope on its `Err` field.
    ///
    /// An empty `Err` yields the envelope back, anything else yields the
    /// message verbatim.
    fn into_result(self) -> Result<Self, String> {
        if self.err().is_empty() {
            Ok(self)
        } else {
            Err(self.err().to_string())
        }
    }
}

macro_rules! impl_envelope {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Envelope for $ty {
                fn err(&self) -> &str {
                    &self.err
                }
            }
        )+
    };
}

impl_envelope!(
    ActivateResponse,
    ErrorResponse,
    GetResponse,
    ListResponse,
    MountResponse,
    PathResponse,
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub implements: Vec<String>,
}

impl ActivateResponse {
    pub fn volume_driver() -> Self {
        Self {
            err: String::new(),
            implements: vec![VOLUME_DRIVER_IMPLEMENTS.to_string()],
        }
    }

    pub fn implements_volume_driver(&self) -> bool {
        self.implements.iter().any(|i| i == VOLUME_DRIVER_IMPLEMENTS)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub opts: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountRequest {
    pub name: String,
    /// Caller-chosen mount identifier. Docker sends one, most hosts do not.
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl MountRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MountResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
    #[serde(default)]
    pub mountpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub volumes: Vec<VolumeInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
    #[serde(default)]
    pub mountpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnmountRequest {
    pub name: String,
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl UnmountRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoveRequest {
    pub name: String,
}

/// Response of operations that only report success or failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

impl ErrorResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(err: impl Into<String>) -> Self {
        Self { err: err.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetResponse {
    #[serde(default)]
    pub volume: VolumeInfo,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub err: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilitiesResponse {
    #[serde(default)]
    pub capabilities: CapabilityInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mountpoint: String,
    /// Reference count kept by the driver. Opaque to this crate.
    #[serde(default)]
    pub mount_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CapabilityInfo {
    #[serde(default)]
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(rename = "InsecureSkipVerify", default)]
    pub insecure_skip_verify: bool,
    #[serde(rename = "CAFile", default)]
    pub ca_file: String,
    #[serde(rename = "CertFile", default)]
    pub cert_file: String,
    #[serde(rename = "KeyFile", default)]
    pub key_file: String,
}

/// Identifies a plugin endpoint.
///
/// A missing `TLSConfig` means the endpoint does not use TLS at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSpec {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Addr")]
    pub address: String,
    #[serde(rename = "TLSConfig", default)]
    pub tls_config: Option<TlsConfig>,
}

// Drivers written against loosely typed runtimes send `null` for empty maps and lists.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
