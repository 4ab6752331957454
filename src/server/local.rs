//! Directory-backed volume driver.
//!
//! Each volume is a directory under the root directory. Volume metadata is
//! persisted so volumes survive a restart; mount counts are not, since
//! nothing is mounted after a restart.
use crate::api::{
    ActivateResponse, CapabilitiesResponse, CapabilityInfo, CreateRequest, ErrorResponse,
    GetRequest, GetResponse, ListResponse, MountRequest, MountResponse, PathRequest, PathResponse,
    RemoveRequest, UnmountRequest, VolumeInfo,
};
use crate::driver::{Driver, Provisioner};
use crate::env::Env;
use crate::invoker::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const SCOPE_LOCAL: &str = "local";

const NOT_FOUND: &str = "volume not found";
const IN_USE: &str = "volume in use";
const NOT_MOUNTED: &str = "volume not mounted";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VolumeMetadata {
    name: String,
    #[serde(default)]
    opts: HashMap<String, Value>,
}

#[derive(Debug)]
struct VolumeEntry {
    meta: VolumeMetadata,
    mount_count: i64,
}

impl VolumeEntry {
    fn to_info(&self, root_dir: &Path) -> VolumeInfo {
        VolumeInfo {
            name: self.meta.name.clone(),
            mountpoint: mountpoint(root_dir, &self.meta.name),
            mount_count: self.mount_count,
        }
    }
}

pub struct LocalDriver {
    root_dir: PathBuf,
    state_file: PathBuf,
    entries: RwLock<HashMap<String, VolumeEntry>>,
}

impl LocalDriver {
    pub async fn new(
        root_dir: impl Into<PathBuf>,
        state_dir: impl Into<PathBuf>,
    ) -> std::io::Result<Self> {
        let root_dir = root_dir.into();
        let state_dir = state_dir.into();

        tokio::fs::create_dir_all(&root_dir).await?;
        tokio::fs::create_dir_all(&state_dir).await?;

        let driver = Self {
            root_dir,
            state_file: state_dir.join("state.json"),
            entries: RwLock::new(HashMap::new()),
        };

        driver.load().await;
        Ok(driver)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    async fn load(&self) {
        if !self.state_file.exists() {
            return;
        }

        match tokio::fs::read_to_string(&self.state_file).await {
            Ok(data) => match serde_json::from_str::<Vec<VolumeMetadata>>(&data) {
                Ok(list) => {
                    let mut lock = self.entries.write().await;
                    for meta in list {
                        if let Err(e) = validate_name(&meta.name) {
                            warn!("Skipping persisted volume: {}", e);
                            continue;
                        }
                        lock.insert(
                            meta.name.clone(),
                            VolumeEntry {
                                meta,
                                mount_count: 0,
                            },
                        );
                    }
                    info!("Loaded {} volumes from state", lock.len());
                }
                Err(e) => warn!("State file corruption: {}", e),
            },
            Err(e) => warn!("Failed to read state file: {}", e),
        }
    }

    /// Writes the metadata of `entries` to the state file.
    ///
    /// Callers hold the table's write guard across the call, so snapshots
    /// and renames of concurrent writers never interleave.
    async fn persist(&self, entries: &HashMap<String, VolumeEntry>) -> std::io::Result<()> {
        let mut list: Vec<&VolumeMetadata> = entries.values().map(|v| &v.meta).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        let json = serde_json::to_string_pretty(&list)?;

        let tmp = self.state_file.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.state_file).await
    }
}

#[async_trait]
impl Provisioner for LocalDriver {
    async fn create(
        &self,
        _env: &Env,
        request: CreateRequest,
    ) -> Result<ErrorResponse, TransportError> {
        if let Err(e) = validate_name(&request.name) {
            return Ok(ErrorResponse::failed(e));
        }

        let mut lock = self.entries.write().await;
        if lock.contains_key(&request.name) {
            return Ok(ErrorResponse::ok());
        }
        lock.insert(
            request.name.clone(),
            VolumeEntry {
                meta: VolumeMetadata {
                    name: request.name.clone(),
                    opts: request.opts,
                },
                mount_count: 0,
            },
        );

        // An Err envelope leaves the table as it was.
        if let Err(e) = self.persist(&lock).await {
            lock.remove(&request.name);
            warn!(volume = %request.name, error = %e, "create rolled back");
            return Ok(ErrorResponse::failed(format!("failed to persist state: {}", e)));
        }

        info!(volume = %request.name, "created volume");
        Ok(ErrorResponse::ok())
    }

    async fn remove(
        &self,
        _env: &Env,
        request: RemoveRequest,
    ) -> Result<ErrorResponse, TransportError> {
        let mut lock = self.entries.write().await;
        match lock.get(&request.name) {
            None => return Ok(ErrorResponse::failed(NOT_FOUND)),
            Some(entry) if entry.mount_count > 0 => {
                return Ok(ErrorResponse::failed(IN_USE));
            }
            Some(_) => {}
        }

        let Some(entry) = lock.remove(&request.name) else {
            return Ok(ErrorResponse::failed(NOT_FOUND));
        };
        if let Err(e) = self.persist(&lock).await {
            lock.insert(request.name.clone(), entry);
            warn!(volume = %request.name, error = %e, "remove rolled back");
            return Ok(ErrorResponse::failed(format!("failed to persist state: {}", e)));
        }

        let dir = self.root_dir.join(&request.name);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove volume dir {:?}: {}", dir, e);
        }

        info!(volume = %request.name, "removed volume");
        Ok(ErrorResponse::ok())
    }
}

#[async_trait]
impl Driver for LocalDriver {
    async fn activate(&self, _env: &Env) -> Result<ActivateResponse, TransportError> {
        Ok(ActivateResponse::volume_driver())
    }

    async fn get(&self, _env: &Env, request: GetRequest) -> Result<GetResponse, TransportError> {
        let lock = self.entries.read().await;
        Ok(match lock.get(&request.name) {
            Some(entry) => GetResponse {
                volume: entry.to_info(&self.root_dir),
                err: String::new(),
            },
            None => GetResponse {
                err: NOT_FOUND.into(),
                ..Default::default()
            },
        })
    }

    async fn list(&self, _env: &Env) -> Result<ListResponse, TransportError> {
        let lock = self.entries.read().await;
        let mut volumes: Vec<VolumeInfo> =
            lock.values().map(|e| e.to_info(&self.root_dir)).collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(ListResponse {
            volumes,
            err: String::new(),
        })
    }

    async fn mount(
        &self,
        _env: &Env,
        request: MountRequest,
    ) -> Result<MountResponse, TransportError> {
        let mut lock = self.entries.write().await;
        let Some(entry) = lock.get_mut(&request.name) else {
            return Ok(MountResponse {
                err: NOT_FOUND.into(),
                ..Default::default()
            });
        };

        let dir = self.root_dir.join(&request.name);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            return Ok(MountResponse {
                err: format!("failed to create mount directory: {}", e),
                ..Default::default()
            });
        }

        entry.mount_count += 1;
        info!(volume = %request.name, mounts = entry.mount_count, "mounted volume");
        Ok(MountResponse {
            err: String::new(),
            mountpoint: mountpoint(&self.root_dir, &request.name),
        })
    }

    async fn path(&self, _env: &Env, request: PathRequest) -> Result<PathResponse, TransportError> {
        let lock = self.entries.read().await;
        Ok(match lock.get(&request.name) {
            Some(entry) => PathResponse {
                err: String::new(),
                mountpoint: entry.to_info(&self.root_dir).mountpoint,
            },
            None => PathResponse {
                err: NOT_FOUND.into(),
                ..Default::default()
            },
        })
    }

    async fn unmount(
        &self,
        _env: &Env,
        request: UnmountRequest,
    ) -> Result<ErrorResponse, TransportError> {
        let mut lock = self.entries.write().await;
        let Some(entry) = lock.get_mut(&request.name) else {
            return Ok(ErrorResponse::failed(NOT_FOUND));
        };
        if entry.mount_count == 0 {
            return Ok(ErrorResponse::failed(NOT_MOUNTED));
        }

        entry.mount_count -= 1;
        info!(volume = %request.name, mounts = entry.mount_count, "unmounted volume");
        Ok(ErrorResponse::ok())
    }

    async fn capabilities(&self, _env: &Env) -> Result<CapabilitiesResponse, TransportError> {
        Ok(CapabilitiesResponse {
            capabilities: CapabilityInfo {
                scope: SCOPE_LOCAL.into(),
            },
        })
    }
}

fn mountpoint(root_dir: &Path, name: &str) -> String {
    root_dir.join(name).to_string_lossy().to_string()
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("volume name cannot be empty".into());
    }
    if name == "." || name == ".." {
        return Err(format!("invalid volume name: '{}'", name));
    }
    if name.contains('/') {
        return Err(format!("volume name cannot contain slashes: '{}'", name));
    }
    if name.contains('\0') {
        return Err("volume name cannot contain null bytes".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn names_are_validated() {
        assert!(validate_name("data-1").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\0b").is_err());
    }

    #[tokio::test]
    async fn mount_counts_are_reference_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = LocalDriver::new(tmp.path().join("root"), tmp.path().join("state"))
            .await
            .unwrap();
        let env = Env::background();

        let resp = driver
            .create(
                &env,
                CreateRequest {
                    name: "v1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(resp, ErrorResponse::ok());

        for _ in 0..2 {
            let resp = driver.mount(&env, MountRequest::new("v1")).await.unwrap();
            assert_eq!(resp.err, "");
        }

        let info = driver
            .get(&env, GetRequest { name: "v1".into() })
            .await
            .unwrap()
            .volume;
        assert_eq!(info.mount_count, 2);
        assert!(Path::new(&info.mountpoint).is_dir());

        let resp = driver
            .remove(&env, RemoveRequest { name: "v1".into() })
            .await
            .unwrap();
        assert_eq!(resp.err, IN_USE);

        driver.unmount(&env, UnmountRequest::new("v1")).await.unwrap();
        driver.unmount(&env, UnmountRequest::new("v1")).await.unwrap();
        let resp = driver.unmount(&env, UnmountRequest::new("v1")).await.unwrap();
        assert_eq!(resp.err, NOT_MOUNTED);

        let resp = driver
            .remove(&env, RemoveRequest { name: "v1".into() })
            .await
            .unwrap();
        assert_eq!(resp, ErrorResponse::ok());
        assert!(!Path::new(&info.mountpoint).exists());
    }

    #[tokio::test]
    async fn unknown_volumes_report_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = LocalDriver::new(tmp.path().join("root"), tmp.path().join("state"))
            .await
            .unwrap();
        let env = Env::background();

        assert_eq!(
            driver.mount(&env, MountRequest::new("ghost")).await.unwrap().err,
            NOT_FOUND
        );
        assert_eq!(
            driver
                .path(&env, PathRequest { name: "ghost".into() })
                .await
                .unwrap()
                .err,
            NOT_FOUND
        );
        assert_eq!(
            driver
                .remove(&env, RemoveRequest { name: "ghost".into() })
                .await
                .unwrap()
                .err,
            NOT_FOUND
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_all_persist() {
        let tmp = tempfile::tempdir().unwrap();
        let driver = Arc::new(
            LocalDriver::new(tmp.path().join("root"), tmp.path().join("state"))
                .await
                .unwrap(),
        );

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let driver = driver.clone();
                tokio::spawn(async move {
                    let request = CreateRequest {
                        name: format!("v{}", i),
                        ..Default::default()
                    };
                    driver.create(&Env::background(), request).await.unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), ErrorResponse::ok());
        }

        let state = std::fs::read_to_string(tmp.path().join("state").join("state.json")).unwrap();
        let persisted: Vec<VolumeMetadata> = serde_json::from_str(&state).unwrap();
        assert_eq!(persisted.len(), 64);
        assert!(!tmp.path().join("state").join("state.tmp").exists());
    }

    #[tokio::test]
    async fn failed_persist_leaves_table_unchanged() {
        let tmp = tempfile::tempdir().unwrap();
        let state_dir = tmp.path().join("state");
        let driver = LocalDriver::new(tmp.path().join("root"), &state_dir)
            .await
            .unwrap();
        let env = Env::background();
        let create = |name: &str| CreateRequest {
            name: name.into(),
            ..Default::default()
        };

        driver.create(&env, create("kept")).await.unwrap();
        std::fs::remove_dir_all(&state_dir).unwrap();

        let resp = driver.create(&env, create("lost")).await.unwrap();
        assert!(resp.err.starts_with("failed to persist state"));
        let resp = driver
            .get(&env, GetRequest { name: "lost".into() })
            .await
            .unwrap();
        assert_eq!(resp.err, NOT_FOUND);

        let resp = driver
            .remove(&env, RemoveRequest { name: "kept".into() })
            .await
            .unwrap();
        assert!(resp.err.starts_with("failed to persist state"));
        let resp = driver
            .get(&env, GetRequest { name: "kept".into() })
            .await
            .unwrap();
        assert_eq!(resp.err, "");

        // A retry after recovery is persisted rather than short-circuited.
        std::fs::create_dir_all(&state_dir).unwrap();
        assert_eq!(
            driver.create(&env, create("lost")).await.unwrap(),
            ErrorResponse::ok()
        );
        let state = std::fs::read_to_string(state_dir.join("state.json")).unwrap();
        assert!(state.contains("\"lost\""));
        assert!(state.contains("\"kept\""));
    }
}
