use super::{Invoker, TransportError};
use crate::api::TlsConfig;
use crate::env::Env;
use crate::routes::Route;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{CONTENT_TYPE, HOST};
use hyper_util::rt::TokioIo;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{Instrument, debug, warn};
#[cfg(feature = "tcp")]
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
enum Endpoint {
    Unix(PathBuf),
    #[cfg(feature = "tcp")]
    Tcp { base: Url, client: reqwest::Client },
}

impl Endpoint {
    fn parse(address: &str, tls_config: Option<&TlsConfig>) -> Result<Self, TransportError> {
        let socket = address
            .strip_prefix("unix://")
            .or_else(|| address.starts_with('/').then_some(address));

        if let Some(path) = socket {
            if path.is_empty() {
                return Err(TransportError::Address(address.to_string()));
            }
            if tls_config.is_some() {
                warn!(address, "tls configuration is ignored for unix socket plugins");
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }

        Self::tcp(address, tls_config)
    }

    #[cfg(feature = "tcp")]
    fn tcp(address: &str, tls_config: Option<&TlsConfig>) -> Result<Self, TransportError> {
        let with_scheme = if address.contains("://") {
            address.to_string()
        } else if tls_config.is_some() {
            format!("https://{}", address)
        } else {
            format!("http://{}", address)
        };

        let base = Url::parse(&with_scheme)
            .map_err(|e| TransportError::Address(format!("{}: {}", address, e)))?;

        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(TransportError::Address(address.to_string()));
        }

        Ok(Self::Tcp {
            base,
            client: build_client(tls_config)?,
        })
    }

    #[cfg(not(feature = "tcp"))]
    fn tcp(address: &str, _tls_config: Option<&TlsConfig>) -> Result<Self, TransportError> {
        Err(TransportError::Address(format!(
            "{}: tcp transport is not enabled",
            address
        )))
    }
}

/// Speaks the plugin protocol over HTTP/1.
///
/// Addresses of the form `unix:///path/to.sock` or `/path/to.sock` are
/// reached over a unix socket. Anything else is treated as a TCP endpoint
/// (`http://`, `https://` or a bare `host:port`, which defaults to https
/// when a TLS configuration is present).
///
/// The response body is handed back whatever the HTTP status, since plugins
/// report failures in the body. Only a non-success status with nothing to
/// decode is a transport error.
#[derive(Debug)]
pub struct HttpInvoker {
    address: String,
    endpoint: Endpoint,
    timeout: Duration,
}

impl HttpInvoker {
    pub fn new(
        address: &str,
        tls_config: Option<&TlsConfig>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            address: address.to_string(),
            endpoint: Endpoint::parse(address, tls_config)?,
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn exchange(&self, route: Route, body: Vec<u8>) -> Result<Bytes, TransportError> {
        match &self.endpoint {
            Endpoint::Unix(path) => send_unix(path, route, body).await,
            #[cfg(feature = "tcp")]
            Endpoint::Tcp { base, client } => send_tcp(client, base, route, body).await,
        }
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        env: &Env,
        route: Route,
        body: Vec<u8>,
    ) -> Result<Bytes, TransportError> {
        debug!(address = %self.address, %route, "invoking plugin");

        let exchange =
            tokio::time::timeout(self.timeout, self.exchange(route, body)).instrument(env.span().clone());

        tokio::select! {
            biased;

            _ = env.cancellation().cancelled() => Err(TransportError::Cancelled),
            result = exchange => match result {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.timeout)),
            },
        }
    }
}

async fn send_unix(path: &Path, route: Route, body: Vec<u8>) -> Result<Bytes, TransportError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Connect {
            address: path.display().to_string(),
            source,
        })?;

    let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(TransportError::http)?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("plugin connection closed: {}", e);
        }
    });

    let request = Request::builder()
        .method(route.method())
        .uri(route.path())
        .header(HOST, "plugin")
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .map_err(TransportError::http)?;

    let response = sender
        .send_request(request)
        .await
        .map_err(TransportError::http)?;

    let status = response.status().as_u16();
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(TransportError::http)?
        .to_bytes();

    check_status(status, bytes)
}

#[cfg(feature = "tcp")]
async fn send_tcp(
    client: &reqwest::Client,
    base: &Url,
    route: Route,
    body: Vec<u8>,
) -> Result<Bytes, TransportError> {
    let url = format!("{}{}", base.as_str().trim_end_matches('/'), route.path());

    let response = client
        .request(route.method(), url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(TransportError::http)?;

    let status = response.status().as_u16();
    let bytes = response.bytes().await.map_err(TransportError::http)?;

    check_status(status, bytes)
}

fn check_status(status: u16, bytes: Bytes) -> Result<Bytes, TransportError> {
    if !(200..300).contains(&status) && bytes.is_empty() {
        return Err(TransportError::Status { status });
    }
    Ok(bytes)
}

#[cfg(feature = "tcp")]
fn build_client(tls_config: Option<&TlsConfig>) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder();

    if let Some(tls) = tls_config {
        if !tls.ca_file.is_empty() {
            let pem = read_pem(&tls.ca_file)?;
            let ca = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::Tls(format!("{}: {}", tls.ca_file, e)))?;
            builder = builder.add_root_certificate(ca);
        }

        match (tls.cert_file.is_empty(), tls.key_file.is_empty()) {
            (true, true) => {}
            (false, false) => {
                let mut pem = read_pem(&tls.cert_file)?;
                pem.push(b'\n');
                pem.extend(read_pem(&tls.key_file)?);
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| TransportError::Tls(format!("client identity: {}", e)))?;
                builder = builder.identity(identity);
            }
            _ => {
                return Err(TransportError::Tls(
                    "client certificate and key must be provided together".into(),
                ));
            }
        }

        builder = builder.danger_accept_invalid_certs(tls.insecure_skip_verify);
    }

    builder
        .build()
        .map_err(|e| TransportError::Tls(e.to_string()))
}

#[cfg(feature = "tcp")]
fn read_pem(path: &str) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|e| TransportError::Tls(format!("{}: {}", path, e)))
}
