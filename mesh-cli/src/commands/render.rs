//! Write generated configurations to disk.

use anyhow::{Context, Result};
use bgpmesh_fleet::{Config, FleetContext, Pipeline};
use std::path::Path;

/// Discover the fleet and write `bgp-router-{id}.conf` per router into `out`.
pub async fn run(config: Config, out: &Path) -> Result<()> {
    let mut pipeline = Pipeline::new(FleetContext::from_config(config).await);
    pipeline.discover().await.context("Discovery failed")?;

    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let configs = pipeline.render_configs();
    for router in pipeline.inventory().routers() {
        let Some(text) = configs.get(&router.id) else {
            continue;
        };
        let path = out.join(format!("{}.conf", router.hostname()));
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
    }
    tracing::info!(routers = configs.len(), dir = %out.display(), "configurations rendered");
    Ok(())
}
