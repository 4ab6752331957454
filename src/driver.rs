//! The capability set a volume driver exposes.
//!
//! Every operation returns its response envelope as-is. A populated `Err`
//! field is still `Ok(envelope)` at this level; only infrastructure
//! failures surface as [`TransportError`].
use crate::api::{
    ActivateResponse, CapabilitiesResponse, CreateRequest, ErrorResponse, GetRequest, GetResponse,
    ListResponse, MountRequest, MountResponse, PathRequest, PathResponse, RemoveRequest, TlsConfig,
    UnmountRequest,
};
use crate::env::Env;
use crate::invoker::TransportError;
use async_trait::async_trait;

/// Volume lifecycle operations.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn create(
        &self,
        env: &Env,
        request: CreateRequest,
    ) -> Result<ErrorResponse, TransportError>;

    async fn remove(
        &self,
        env: &Env,
        request: RemoveRequest,
    ) -> Result<ErrorResponse, TransportError>;
}

#[async_trait]
pub trait Driver: Provisioner {
    async fn activate(&self, env: &Env) -> Result<ActivateResponse, TransportError>;

    async fn get(&self, env: &Env, request: GetRequest) -> Result<GetResponse, TransportError>;

    async fn list(&self, env: &Env) -> Result<ListResponse, TransportError>;

    async fn mount(&self, env: &Env, request: MountRequest)
    -> Result<MountResponse, TransportError>;

    async fn path(&self, env: &Env, request: PathRequest) -> Result<PathResponse, TransportError>;

    async fn unmount(
        &self,
        env: &Env,
        request: UnmountRequest,
    ) -> Result<ErrorResponse, TransportError>;

    async fn capabilities(&self, env: &Env) -> Result<CapabilitiesResponse, TransportError>;

    /// Runtime check for the optional [`MatchableDriver`] capability.
    ///
    /// Drivers that can tell whether an endpoint refers to themselves
    /// override this to return `Some(self)`.
    fn as_matchable(&self) -> Option<&dyn MatchableDriver> {
        None
    }
}

/// A driver that can recognise the endpoint it is reached through.
///
/// Hosts use this to deduplicate plugins discovered more than once. A
/// `None` TLS configuration means the candidate endpoint uses no TLS, which
/// is not the same as a TLS configuration with every field left empty.
pub trait MatchableDriver: Driver {
    fn matches(&self, env: &Env, address: &str, tls_config: Option<&TlsConfig>) -> bool;
}
