use anyhow::Result;
use std::net::SocketAddr;
use tracing::info;

use crate::app::App;
use crate::config::ChaosConfig;
use crate::status;

pub async fn run_serve(config: ChaosConfig, bind: Option<SocketAddr>) -> Result<()> {
    let addr = bind.unwrap_or(config.status.bind);
    let app = App::new(config).await?;
    status::serve(app.status_service(), addr, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down status API");
    })
    .await
}
