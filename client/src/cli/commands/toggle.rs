use anyhow::{Result, bail};
use smartroom_client_rs::{CommitOutcome, WRITE_FAILED_ALERT};

use crate::{Params, utils::create_controller};

pub async fn toggle(params: Params) -> Result<()> {
    let controller = create_controller(&params, None)?;
    // The new value is the opposite of whatever the store holds now.
    controller.poll_once().await;
    if !controller.snapshot().connected {
        bail!("store unreachable, not sending the command");
    }
    match controller.toggle().await {
        CommitOutcome::Confirmed { power } => {
            println!("Light turned {}", if power { "on" } else { "off" });
            Ok(())
        }
        CommitOutcome::Reverted { error, .. } => {
            println!("{}", WRITE_FAILED_ALERT);
            bail!("write rejected: {}", error)
        }
    }
}
