//! ATP Runner - run one step of a plugin from the command line
//!
//! This binary:
//! - Loads configuration from `atp.toml` (or the path given as first argument)
//! - Spawns the plugin and reads its schema
//! - Executes the configured step, logging the signals it emits
//! - Prints the step output as JSON

mod config;

use anyhow::{bail, Context, Result};
use atp_client::{ClientConfig, Input, PluginConfig, PluginProcess};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigStore, StepConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "atp.toml".to_string());
    let store = ConfigStore::from_file(&path)?;

    let client_config: ClientConfig = store.get()?;
    let plugin_config: PluginConfig = store.get()?;
    let step_config: StepConfig = store.get()?;

    if plugin_config.command.is_empty() {
        bail!("No plugin command configured in the [plugin] section of {}", path);
    }

    info!("Starting plugin: {} {}", plugin_config.command, plugin_config.args.join(" "));
    let mut process = PluginProcess::spawn(&plugin_config)
        .with_context(|| format!("Failed to spawn plugin '{}'", plugin_config.command))?;
    let mut client = process.client(client_config)?;

    let schema = client.read_schema().await?;
    info!(
        "Plugin speaks protocol version {:?} and offers steps: {}",
        client.negotiated_version(),
        schema.steps().keys().cloned().collect::<Vec<_>>().join(", ")
    );

    let step_id = match &step_config.id {
        Some(id) => id.clone(),
        None => match schema.steps().keys().collect::<Vec<_>>().as_slice() {
            [only] => (*only).clone(),
            _ => bail!("The plugin offers several steps, set one with `id` in the [step] section"),
        },
    };

    let (emitted_tx, mut emitted_rx) = client.signal_channel();
    let signal_logger = tokio::spawn(async move {
        while let Some(signal) = emitted_rx.recv().await {
            info!("Plugin emitted signal {}: {}", signal.id, signal.data);
        }
    });

    let input = Input::new(step_id.clone(), step_config.input_value()?);
    let (output_id, output_data) = client
        .execute(input, None, Some(emitted_tx))
        .await
        .with_context(|| format!("Step {} failed", step_id))?;
    signal_logger.await?;

    let is_error = schema
        .step(&step_id)
        .ok()
        .and_then(|step| step.output(&output_id))
        .is_some_and(|output| output.error);
    if is_error {
        warn!("Step {} finished with error output '{}'", step_id, output_id);
    }

    client.close().await?;
    process.wait().await?;

    let output = serde_json::json!({
        "output_id": output_id,
        "output_data": output_data,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
