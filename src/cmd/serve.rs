use super::config::{ServeArgs, ServeConfig};
use crate::config::LayeredArgs;
use crate::error::VolDriverError;
use crate::server::{DriverService, LocalDriver, VolumeServer};
use std::sync::Arc;
use tracing::info;

pub async fn serve(args: LayeredArgs<ServeArgs>) -> Result<(), VolDriverError> {
    let config: ServeConfig = args.load()?;
    info!("Starting volume plugin with config: {:#?}", config);

    let driver = LocalDriver::new(config.root_dir.clone(), config.state_dir.clone()).await?;
    let service = DriverService::new(Arc::new(driver));
    VolumeServer::new(config.socket, service).run().await?;

    info!("Volume plugin exited successfully");
    Ok(())
}
