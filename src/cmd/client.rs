use super::config::{ClientArgs, ClientConfig};
use super::{CreateArgs, VolumeArgs};
use crate::api::{CreateRequest, Envelope, GetRequest, PathRequest, RemoveRequest};
use crate::client::DriverClient;
use crate::config::LayeredArgs;
use crate::driver::{Driver, Provisioner};
use crate::env::Env;
use crate::error::VolDriverError;
use crate::plugin::{DockerDriverPlugin, Plugin, PluginError, PluginSpec, PluginTlsConfig};
use crate::signal::recv_shutdown;
use clap::Args;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Args, Debug)]
pub struct MatchesArgs {
    /// Address of the endpoint to compare against the configured plugin
    pub candidate: String,

    #[command(flatten)]
    pub candidate_tls: CandidateTlsArgs,

    #[command(flatten)]
    pub client: LayeredArgs<ClientArgs>,
}

/// TLS settings of the candidate endpoint.
#[derive(Args, Debug, Clone, Default)]
pub struct CandidateTlsArgs {
    /// Candidate endpoint uses TLS
    #[arg(long)]
    pub candidate_tls: bool,

    #[arg(long)]
    pub candidate_ca_file: Option<String>,

    #[arg(long)]
    pub candidate_cert_file: Option<String>,

    #[arg(long)]
    pub candidate_key_file: Option<String>,

    #[arg(long)]
    pub candidate_insecure_skip_verify: bool,
}

impl CandidateTlsArgs {
    fn into_plugin_tls(self) -> Option<PluginTlsConfig> {
        let requested = self.candidate_tls
            || self.candidate_insecure_skip_verify
            || self.candidate_ca_file.is_some()
            || self.candidate_cert_file.is_some()
            || self.candidate_key_file.is_some();
        if !requested {
            return None;
        }
        Some(PluginTlsConfig {
            insecure_skip_verify: self.candidate_insecure_skip_verify,
            ca_file: self.candidate_ca_file.unwrap_or_default(),
            cert_file: self.candidate_cert_file.unwrap_or_default(),
            key_file: self.candidate_key_file.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct MatchesOutput<'a> {
    address: &'a str,
    matches: bool,
}

pub async fn activate(args: LayeredArgs<ClientArgs>) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args)?;
    let response = driver.activate(&interruptible_env()).await?;
    print_envelope(&response)
}

pub async fn capabilities(args: LayeredArgs<ClientArgs>) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args)?;
    let response = driver.capabilities(&interruptible_env()).await?;
    print_json(&response)
}

pub async fn list(args: LayeredArgs<ClientArgs>) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args)?;
    let response = driver.list(&interruptible_env()).await?;
    print_envelope(&response)
}

pub async fn get(args: VolumeArgs) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args.client)?;
    let request = GetRequest { name: args.name };
    let response = driver.get(&interruptible_env(), request).await?;
    print_envelope(&response)
}

pub async fn path(args: VolumeArgs) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args.client)?;
    let request = PathRequest { name: args.name };
    let response = driver.path(&interruptible_env(), request).await?;
    print_envelope(&response)
}

pub async fn create(args: CreateArgs) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args.client)?;
    let request = CreateRequest {
        name: args.name,
        opts: args.opts.into_iter().collect(),
    };
    let response = driver.create(&interruptible_env(), request).await?;
    print_envelope(&response)
}

pub async fn remove(args: VolumeArgs) -> Result<(), VolDriverError> {
    let (driver, _) = connect(args.client)?;
    let request = RemoveRequest { name: args.name };
    let response = driver.remove(&interruptible_env(), request).await?;
    print_envelope(&response)
}

pub async fn mount(args: CreateArgs) -> Result<(), VolDriverError> {
    let (driver, config) = connect(args.client)?;
    let plugin = DockerDriverPlugin::new(Box::new(driver)).with_data_dir(config.data_dir);

    let opts = args.opts.into_iter().collect();
    let response = plugin
        .mount(&interruptible_env(), &config.address, &args.name, opts)
        .await?;
    print_json(&response)
}

pub async fn unmount(args: VolumeArgs) -> Result<(), VolDriverError> {
    let (driver, config) = connect(args.client)?;
    let plugin = DockerDriverPlugin::new(Box::new(driver)).with_data_dir(config.data_dir);

    plugin
        .unmount(&interruptible_env(), &config.address, &args.name)
        .await?;
    Ok(())
}

pub async fn matches(args: MatchesArgs) -> Result<(), VolDriverError> {
    let (driver, config) = connect(args.client)?;
    let plugin = DockerDriverPlugin::new(Box::new(driver)).with_data_dir(config.data_dir);

    let spec = PluginSpec {
        name: String::new(),
        address: args.candidate,
        tls_config: args.candidate_tls.into_plugin_tls(),
    };
    let matches = plugin.matches(&Env::background(), &spec);
    print_json(&MatchesOutput {
        address: &spec.address,
        matches,
    })
}

fn connect(args: LayeredArgs<ClientArgs>) -> Result<(DriverClient, ClientConfig), VolDriverError> {
    let config: ClientConfig = args.load()?;
    debug!(address = %config.address, tls = config.tls_config.is_some(), "connecting to plugin");
    let client = DriverClient::connect(&config.driver_spec(), config.timeout)?;
    Ok((client, config))
}

/// Env whose token is cancelled on SIGINT or SIGTERM, aborting the request in flight.
fn interruptible_env() -> Env {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if recv_shutdown().await.is_ok() {
            cancel.cancel();
        }
    });
    Env::background().with_cancellation(token)
}

/// Prints the envelope and turns a driver reported error into a failure.
fn print_envelope<E>(response: &E) -> Result<(), VolDriverError>
where
    E: Envelope + Serialize,
{
    print_json(response)?;
    if response.is_err() {
        return Err(PluginError::Driver(response.err().to_string()).into());
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), VolDriverError> {
    let out = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{}", out);
    Ok(())
}
