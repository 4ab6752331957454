#![allow(dead_code)]

use async_trait::async_trait;
use hyper::body::Bytes;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use voldriver::api::{
    ActivateResponse, CapabilitiesResponse, CreateRequest, ErrorResponse, GetRequest, GetResponse,
    ListResponse, MountRequest, MountResponse, PathRequest, PathResponse, RemoveRequest, TlsConfig,
    UnmountRequest,
};
use voldriver::driver::{Driver, MatchableDriver, Provisioner};
use voldriver::env::Env;
use voldriver::invoker::{Invoker, TransportError};
use voldriver::routes::Route;

type Responder = Box<dyn Fn(Route) -> Result<Bytes, TransportError> + Send + Sync>;

/// Invoker that records every exchange and answers from a closure.
pub struct RecordingInvoker {
    pub calls: Mutex<Vec<(Route, Vec<u8>)>>,
    respond: Responder,
}

impl RecordingInvoker {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(Route) -> Result<Bytes, TransportError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn replying(body: &'static str) -> Self {
        Self::new(move |_| Ok(Bytes::from_static(body.as_bytes())))
    }

    pub fn routes(&self) -> Vec<Route> {
        self.calls.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }

    pub fn last_body(&self) -> serde_json::Value {
        let calls = self.calls.lock().unwrap();
        let (_, body) = calls.last().expect("no invocation recorded");
        serde_json::from_slice(body).unwrap()
    }
}

#[async_trait]
impl Invoker for RecordingInvoker {
    async fn invoke(
        &self,
        _env: &Env,
        route: Route,
        body: Vec<u8>,
    ) -> Result<Bytes, TransportError> {
        self.calls.lock().unwrap().push((route, body));
        (self.respond)(route)
    }
}

/// Driver answering with canned envelopes and recording the operations it saw.
///
/// The recorders are shared so they stay readable once the driver is boxed.
#[derive(Default)]
pub struct ScriptedDriver {
    pub create: ErrorResponse,
    pub mount: MountResponse,
    pub unmount: ErrorResponse,
    /// Fail create with a transport error instead of answering
    pub create_fault: Option<fn() -> TransportError>,
    /// Fail unmount with a transport error instead of answering
    pub unmount_fault: Option<fn() -> TransportError>,
    /// Address the driver recognises as itself; `None` leaves it non-matchable
    pub matchable_address: Option<String>,

    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub created: Arc<Mutex<Vec<CreateRequest>>>,
    pub matched_tls: Arc<Mutex<Vec<Option<TlsConfig>>>>,
}

impl ScriptedDriver {
    pub fn mounting_at(mountpoint: &str) -> Self {
        Self {
            mount: MountResponse {
                mountpoint: mountpoint.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
    }
}

#[async_trait]
impl Provisioner for ScriptedDriver {
    async fn create(
        &self,
        _env: &Env,
        request: CreateRequest,
    ) -> Result<ErrorResponse, TransportError> {
        self.record("create");
        if let Some(fault) = self.create_fault {
            return Err(fault());
        }
        self.created.lock().unwrap().push(request);
        Ok(self.create.clone())
    }

    async fn remove(
        &self,
        _env: &Env,
        _request: RemoveRequest,
    ) -> Result<ErrorResponse, TransportError> {
        self.record("remove");
        Ok(ErrorResponse::ok())
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn activate(&self, _env: &Env) -> Result<ActivateResponse, TransportError> {
        self.record("activate");
        Ok(ActivateResponse::volume_driver())
    }

    async fn get(&self, _env: &Env, _request: GetRequest) -> Result<GetResponse, TransportError> {
        self.record("get");
        Ok(GetResponse::default())
    }

    async fn list(&self, _env: &Env) -> Result<ListResponse, TransportError> {
        self.record("list");
        Ok(ListResponse::default())
    }

    async fn mount(
        &self,
        _env: &Env,
        _request: MountRequest,
    ) -> Result<MountResponse, TransportError> {
        self.record("mount");
        Ok(self.mount.clone())
    }

    async fn path(&self, _env: &Env, _request: PathRequest) -> Result<PathResponse, TransportError> {
        self.record("path");
        Ok(PathResponse::default())
    }

    async fn unmount(
        &self,
        _env: &Env,
        _request: UnmountRequest,
    ) -> Result<ErrorResponse, TransportError> {
        self.record("unmount");
        if let Some(fault) = self.unmount_fault {
            return Err(fault());
        }
        Ok(self.unmount.clone())
    }

    async fn capabilities(&self, _env: &Env) -> Result<CapabilitiesResponse, TransportError> {
        self.record("capabilities");
        Ok(CapabilitiesResponse::default())
    }

    fn as_matchable(&self) -> Option<&dyn MatchableDriver> {
        match self.matchable_address {
            Some(_) => Some(self),
            None => None,
        }
    }
}

impl MatchableDriver for ScriptedDriver {
    fn matches(&self, _env: &Env, address: &str, tls_config: Option<&TlsConfig>) -> bool {
        self.matched_tls.lock().unwrap().push(tls_config.cloned());
        self.matchable_address.as_deref() == Some(address)
    }
}

/// Collects formatted log output of a scoped subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync + 'static {
        tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter(self.0.clone())
    }
}

pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
