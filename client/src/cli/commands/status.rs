use anyhow::{Result, bail};

use crate::{Params, utils::create_controller};

pub async fn status(params: Params, json: bool) -> Result<()> {
    let controller = create_controller(&params, None)?;
    controller.poll_once().await;
    let snapshot = controller.snapshot();
    if !snapshot.connected {
        println!("OFFLINE");
        match &snapshot.last_error {
            Some(error) => bail!("store unreachable: {}", error),
            None => bail!("store unreachable"),
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!(
            "ONLINE | light {}",
            if snapshot.power { "on" } else { "off" }
        );
    }
    Ok(())
}
