use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::app::App;
use crate::config::ChaosConfig;
use crate::status::ExperimentDetail;

pub async fn run_upload_template(
    config: ChaosConfig,
    file: &Path,
    name: Option<String>,
    replace: bool,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cannot derive a template name from {}", file.display()))?,
    };
    let body = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let app = App::new(config).await?;
    let meta = app.upload_template(&name, body, replace).await?;
    println!("Stored {} ({} bytes, version {})", meta.key, meta.size, meta.version);
    Ok(())
}

pub async fn run_import_experiment(config: ChaosConfig, file: &Path) -> Result<()> {
    let content = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let detail: ExperimentDetail = serde_json::from_slice(&content)
        .with_context(|| format!("{} is not an experiment record", file.display()))?;

    let app = App::new(config).await?;
    app.import_experiment(&detail.record, &detail.logs).await?;
    println!(
        "Imported experiment {} ({}, {} log entries)",
        detail.record.id,
        detail.record.state.status,
        detail.logs.len()
    );
    Ok(())
}
