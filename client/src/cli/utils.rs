use anyhow::Result;
use smartroom_client_rs::{StoreClient, StoreOptions, SyncController, SyncObserver};
use std::sync::Arc;

use crate::Params;

pub fn create_controller(
    params: &Params,
    observer: Option<SyncObserver>,
) -> Result<SyncController> {
    let options = StoreOptions::builder()
        .base_url(params.db_url.clone())
        .secret(params.db_secret.clone())
        .document_path(params.path.clone())
        .build()?;
    let client = StoreClient::new(options)?;
    Ok(SyncController::new(Arc::new(client), observer))
}
