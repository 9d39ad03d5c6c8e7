//! Destroy the fleet.

use anyhow::{Context, Result};
use bgpmesh_fleet::{Config, FleetContext, Pipeline};

/// Invoke the provisioning tool's destroy. Nothing else runs.
pub async fn run(config: Config) -> Result<()> {
    let pipeline = Pipeline::new(FleetContext::from_config(config).await);
    pipeline.teardown().await.context("Teardown failed")?;
    println!("Fleet destroyed.");
    Ok(())
}
