use crate::config::LayeredArgs;
use crate::error::VolDriverError;
use crate::logging::Logger;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

pub mod client;
pub mod config;
#[cfg(feature = "server")]
pub mod serve;

use config::ClientArgs;
#[cfg(feature = "server")]
use config::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "voldriver")]
#[command(version, about = "Serve and drive Docker volume plugins", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,

    /// Logging configuration
    #[command(flatten)]
    pub logger: Logger,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a directory-backed volume driver on a unix socket
    #[cfg(feature = "server")]
    Serve(LayeredArgs<ServeArgs>),

    /// Activate the plugin and print what it implements
    Activate(LayeredArgs<ClientArgs>),

    /// Print the scope reported by the driver
    Capabilities(LayeredArgs<ClientArgs>),

    /// List volumes known to the driver
    List(LayeredArgs<ClientArgs>),

    /// Show a single volume
    Get(VolumeArgs),

    /// Print the mount path of a volume
    Path(VolumeArgs),

    /// Create a volume
    Create(CreateArgs),

    /// Remove a volume
    Remove(VolumeArgs),

    /// Create and mount a volume, printing the mount path
    Mount(CreateArgs),

    /// Unmount a volume
    Unmount(VolumeArgs),

    /// Check whether an endpoint identifies the configured plugin
    Matches(client::MatchesArgs),
}

#[derive(Args, Debug)]
pub struct VolumeArgs {
    /// Volume name
    pub name: String,

    #[command(flatten)]
    pub client: LayeredArgs<ClientArgs>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Volume name
    pub name: String,

    /// Driver option as KEY=VALUE. Values that parse as JSON are sent as JSON, others as strings.
    #[arg(short = 'o', long = "opt", value_name = "KEY=VALUE", value_parser = parse_opt)]
    pub opts: Vec<(String, Value)>,

    #[command(flatten)]
    pub client: LayeredArgs<ClientArgs>,
}

pub async fn run(cmd: Command) -> Result<(), VolDriverError> {
    match cmd {
        #[cfg(feature = "server")]
        Command::Serve(args) => serve::serve(args).await,
        Command::Activate(args) => client::activate(args).await,
        Command::Capabilities(args) => client::capabilities(args).await,
        Command::List(args) => client::list(args).await,
        Command::Get(args) => client::get(args).await,
        Command::Path(args) => client::path(args).await,
        Command::Create(args) => client::create(args).await,
        Command::Remove(args) => client::remove(args).await,
        Command::Mount(args) => client::mount(args).await,
        Command::Unmount(args) => client::unmount(args).await,
        Command::Matches(args) => client::matches(args).await,
    }
}

fn parse_opt(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty option key in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
