//! List command implementation

use anyhow::{bail, Context, Result};

use crate::client::{self, ClientOptions};
use crate::output::format_devices;
use mcc_protocol::Device;

/// Execute the list command
pub async fn list_command(
    opts: &ClientOptions,
    filter: Option<&str>,
    long: bool,
) -> Result<()> {
    let mut connected = client::connect(opts).await?;

    let directory = connected.channel.directory();
    let outcome = client::drive(&mut connected.channel, directory.get_devices()).await;
    connected.channel.stop().await;

    let devices = match outcome? {
        Some(devices) => devices.context("Failed to list nodes")?,
        None => bail!("Interrupted"),
    };

    let devices = select_devices(devices, filter);
    println!("{}", format_devices(&devices, long));
    Ok(())
}

/// Apply the name/id/address filter and sort by name
fn select_devices(devices: Vec<Device>, filter: Option<&str>) -> Vec<Device> {
    let mut devices: Vec<Device> = match filter {
        Some(filter) => {
            let needle = filter.to_lowercase();
            devices
                .into_iter()
                .filter(|d| {
                    d.name.to_lowercase().contains(&needle)
                        || d.id.to_lowercase().contains(&needle)
                        || d.ip.contains(&needle)
                })
                .collect()
        }
        None => devices,
    };

    devices.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    devices
}
