//! # voldriver
//!
//! `voldriver` adapts volume drivers speaking the Docker Volume Plugin
//! protocol to a host that mounts volumes for containers. It provides the
//! protocol's route table and envelopes, a client reaching remote plugins
//! through a pluggable [`Invoker`](invoker::Invoker), and the
//! [`DockerDriverPlugin`](plugin::DockerDriverPlugin) adapter exposing any
//! driver through a uniform mount/unmount/matches surface.
//!
//! ## Feature Flags
//!
//! * `server`: Serving side of the protocol, with a directory-backed driver.
//! * `tcp`: Reaching plugins over TCP, optionally with TLS.
pub mod api;
pub mod client;
pub mod cmd;
pub mod config;
pub mod driver;
pub mod env;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod plugin;
pub mod routes;
#[cfg(feature = "server")]
pub mod server;
pub mod signal;
