use crate::config::ConfigError;
use crate::invoker::TransportError;
use crate::plugin::PluginError;
use sysexits::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolDriverError {
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl std::process::Termination for VolDriverError {
    fn report(self) -> std::process::ExitCode {
        let code = self.exit_code();
        tracing::error!(exit_code = code, "{}", self);
        std::process::ExitCode::from(code)
    }
}

impl VolDriverError {
    pub fn exit_code(&self) -> u8 {
        match self {
            VolDriverError::Plugin(e) => match e {
                PluginError::Transport(t) => Self::transport_exit_code(t),
                PluginError::Driver(_) => ExitCode::Software.into(),
            },
            VolDriverError::Transport(e) => Self::transport_exit_code(e),
            VolDriverError::Config(e) => match e {
                ConfigError::Io { .. } => ExitCode::NoInput.into(),
                ConfigError::Parse(_) => ExitCode::Config.into(),
                ConfigError::Validation(_) => ExitCode::Usage.into(),
            },
            VolDriverError::Io(_) => ExitCode::IoErr.into(),
            VolDriverError::Anyhow(_) => ExitCode::Software.into(),
        }
    }

    fn transport_exit_code(e: &TransportError) -> u8 {
        match e {
            TransportError::Address(_) | TransportError::Tls(_) => ExitCode::Config.into(),
            TransportError::Decode(_) | TransportError::Encode(_) => ExitCode::Protocol.into(),
            TransportError::Timeout(_) => ExitCode::TempFail.into(),
            TransportError::Cancelled => ExitCode::Ok.into(),
            TransportError::Io(_) => ExitCode::IoErr.into(),
            TransportError::Connect { .. }
            | TransportError::Http(_)
            | TransportError::Status { .. } => ExitCode::Unavailable.into(),
        }
    }
}
