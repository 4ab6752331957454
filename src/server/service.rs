use crate::api::{
    CreateRequest, ErrorResponse, GetRequest, MountRequest, PathRequest, RemoveRequest,
    UnmountRequest,
};
use crate::driver::Driver;
use crate::env::Env;
use crate::invoker::TransportError;
use crate::routes::Route;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read request body: {0}")]
    Body(#[from] hyper::Error),

    #[error(transparent)]
    Driver(#[from] TransportError),
}

impl ServiceError {
    /// Errors are reported in the `Err` field of a 200 response, like any
    /// other driver failure.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let err_msg = self.to_string();
        error!(error = %err_msg, "plugin request failed");

        let json = serde_json::to_vec(&ErrorResponse::failed(err_msg))
            .unwrap_or_else(|_| b"{\"Err\":\"internal serialization error\"}".to_vec());
        json_response(StatusCode::OK, json)
    }
}

/// Serves the plugin protocol for any [`Driver`].
///
/// This is the serving counterpart of the [`DriverClient`](crate::client::DriverClient):
/// both sides agree on the [`Route`] table.
#[derive(Clone)]
pub struct DriverService {
    driver: Arc<dyn Driver>,
}

impl DriverService {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Runs one protocol operation against the driver and returns the
    /// encoded response envelope.
    pub async fn dispatch(&self, route: Route, body: &[u8]) -> Result<Vec<u8>, ServiceError> {
        let env = Env::background().session(route.name());
        let driver = self.driver.as_ref();

        match route {
            Route::Activate => encode(&driver.activate(&env).await?),
            Route::Capabilities => encode(&driver.capabilities(&env).await?),
            Route::List => encode(&driver.list(&env).await?),
            Route::Create => {
                let req: CreateRequest = decode(body)?;
                info!(volume = %req.name, "creating volume");
                encode(&driver.create(&env, req).await?)
            }
            Route::Remove => {
                let req: RemoveRequest = decode(body)?;
                info!(volume = %req.name, "removing volume");
                encode(&driver.remove(&env, req).await?)
            }
            Route::Mount => {
                let req: MountRequest = decode(body)?;
                info!(volume = %req.name, id = %req.id, "mounting volume");
                encode(&driver.mount(&env, req).await?)
            }
            Route::Unmount => {
                let req: UnmountRequest = decode(body)?;
                info!(volume = %req.name, id = %req.id, "unmounting volume");
                encode(&driver.unmount(&env, req).await?)
            }
            Route::Path => {
                let req: PathRequest = decode(body)?;
                encode(&driver.path(&env, req).await?)
            }
            Route::Get => {
                let req: GetRequest = decode(body)?;
                encode(&driver.get(&env, req).await?)
            }
        }
    }

    async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, ServiceError> {
        let path = req.uri().path();
        info!(method = ?req.method(), path = path, "received request");

        let route = match Route::from_path(path) {
            Some(r) => r,
            None => return Ok(empty_response(StatusCode::NOT_FOUND)),
        };
        if req.method() != route.method() {
            return Ok(empty_response(StatusCode::METHOD_NOT_ALLOWED));
        }

        let body = req.into_body().collect().await?.to_bytes();
        let span = info_span!("request", route = route.name());
        let json = self.dispatch(route, &body).instrument(span).await?;
        Ok(json_response(StatusCode::OK, json))
    }
}

impl Service<Request<Incoming>> for DriverService {
    type Response = Response<Full<Bytes>>;
    type Error = hyper::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let svc = self.clone();
        Box::pin(async move {
            match svc.handle(req).await {
                Ok(resp) => Ok(resp),
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, ServiceError> {
    Ok(serde_json::to_vec(data)?)
}

fn json_response(status: StatusCode, json: Vec<u8>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::default());
    *response.status_mut() = status;
    response
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    Ok(serde_json::from_slice(body)?)
}
