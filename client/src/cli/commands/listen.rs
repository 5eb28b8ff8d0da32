use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use smartroom_client_rs::{LightSnapshot, StatusUpdate, SyncObserver};
use tokio::signal;

use crate::{Params, utils::create_controller};

struct Printer;

#[async_trait]
impl StatusUpdate for Printer {
    async fn status_update(&self, snapshot: &LightSnapshot) {
        let link = if snapshot.connected { "ONLINE" } else { "OFFLINE" };
        let light = if !snapshot.initial_load_complete {
            "unknown"
        } else if snapshot.power {
            "on"
        } else {
            "off"
        };
        println!("{} | light {}", link, light);
    }

    async fn write_failed(&self, message: &str) {
        println!("{}", message);
    }
}

pub async fn listen(params: Params) -> Result<()> {
    let interval = Duration::from_millis(params.interval_ms);
    let controller = create_controller(&params, Some(Arc::new(Printer) as SyncObserver))?;
    controller.start_polling(interval);
    println!(
        "Watching the light every {:?}, press Ctrl+C to stop",
        interval
    );

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    println!("Exiting...");
    controller.stop_polling();
    Ok(())
}
