//! Driver implementation that talks to a remote plugin.
use crate::api::{
    ActivateResponse, CapabilitiesResponse, CreateRequest, DriverSpec, ErrorResponse, GetRequest,
    GetResponse, ListResponse, MountRequest, MountResponse, PathRequest, PathResponse,
    RemoveRequest, TlsConfig, UnmountRequest,
};
use crate::driver::{Driver, MatchableDriver, Provisioner};
use crate::env::Env;
use crate::invoker::{HttpInvoker, Invoker, TransportError};
use crate::routes::Route;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct EmptyRequest {}

/// Encodes typed requests, hands them to an [`Invoker`] and decodes the
/// typed response.
///
/// Each operation performs exactly one invocation and never retries. The
/// decoded envelope is returned even when its `Err` field is set.
pub struct DriverClient {
    invoker: Arc<dyn Invoker>,
    address: String,
    tls_config: Option<TlsConfig>,
}

impl DriverClient {
    pub fn new(
        invoker: Arc<dyn Invoker>,
        address: impl Into<String>,
        tls_config: Option<TlsConfig>,
    ) -> Self {
        Self {
            invoker,
            address: address.into(),
            tls_config,
        }
    }

    /// Builds a client reaching the plugin described by `spec` over HTTP.
    pub fn connect(spec: &DriverSpec, timeout: Duration) -> Result<Self, TransportError> {
        let invoker = HttpInvoker::new(&spec.address, spec.tls_config.as_ref(), timeout)?;
        Ok(Self::new(
            Arc::new(invoker),
            spec.address.clone(),
            spec.tls_config.clone(),
        ))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn tls_config(&self) -> Option<&TlsConfig> {
        self.tls_config.as_ref()
    }

    async fn call<Req, Resp>(
        &self,
        env: &Env,
        route: Route,
        request: &Req,
    ) -> Result<Resp, TransportError>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request).map_err(TransportError::Encode)?;
        debug!(%route, address = %self.address, "request");

        let bytes = self.invoker.invoke(env, route, body).await?;
        debug!(%route, bytes = bytes.len(), "response");

        serde_json::from_slice(&bytes).map_err(TransportError::Decode)
    }
}

#[async_trait]
impl Provisioner for DriverClient {
    async fn create(
        &self,
        env: &Env,
        request: CreateRequest,
    ) -> Result<ErrorResponse, TransportError> {
        self.call(env, Route::Create, &request).await
    }

    async fn remove(
        &self,
        env: &Env,
        request: RemoveRequest,
    ) -> Result<ErrorResponse, TransportError> {
        self.call(env, Route::Remove, &request).await
    }
}

#[async_trait]
impl Driver for DriverClient {
    async fn activate(&self, env: &Env) -> Result<ActivateResponse, TransportError> {
        self.call(env, Route::Activate, &EmptyRequest {}).await
    }

    async fn get(&self, env: &Env, request: GetRequest) -> Result<GetResponse, TransportError> {
        self.call(env, Route::Get, &request).await
    }

    async fn list(&self, env: &Env) -> Result<ListResponse, TransportError> {
        self.call(env, Route::List, &EmptyRequest {}).await
    }

    async fn mount(
        &self,
        env: &Env,
        request: MountRequest,
    ) -> Result<MountResponse, TransportError> {
        self.call(env, Route::Mount, &request).await
    }

    async fn path(&self, env: &Env, request: PathRequest) -> Result<PathResponse, TransportError> {
        self.call(env, Route::Path, &request).await
    }

    async fn unmount(
        &self,
        env: &Env,
        request: UnmountRequest,
    ) -> Result<ErrorResponse, TransportError> {
        self.call(env, Route::Unmount, &request).await
    }

    async fn capabilities(&self, env: &Env) -> Result<CapabilitiesResponse, TransportError> {
        self.call(env, Route::Capabilities, &EmptyRequest {}).await
    }

    fn as_matchable(&self) -> Option<&dyn MatchableDriver> {
        Some(self)
    }
}

impl MatchableDriver for DriverClient {
    /// The client is the endpoint it was built for: same address and the
    /// same TLS setting, where "no TLS" only matches "no TLS".
    fn matches(&self, _env: &Env, address: &str, tls_config: Option<&TlsConfig>) -> bool {
        self.address == address && self.tls_config.as_ref() == tls_config
    }
}
