//! Configuration for the client and the plugin process

use std::collections::HashMap;

use atp_protocol::DEFAULT_MAX_MESSAGE_BYTES;
use serde::Deserialize;

/// Client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Upper bound for a single message read from the plugin
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Capacity of the queues made by [`Client::signal_channel`](crate::Client::signal_channel)
    #[serde(default = "default_signal_queue_capacity")]
    pub signal_queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: default_max_message_bytes(),
            signal_queue_capacity: default_signal_queue_capacity(),
        }
    }
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

fn default_signal_queue_capacity() -> usize {
    32
}

/// Configuration for a plugin process
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PluginConfig {
    /// Command to run (e.g., "python", "./plugin")
    pub command: String,

    /// Arguments to pass to the command
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the plugin
    #[serde(default)]
    pub cwd: Option<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config: ClientConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
        assert_eq!(config.signal_queue_capacity, 32);

        let plugin: PluginConfig =
            serde_json::from_value(serde_json::json!({"command": "python"})).unwrap();
        assert_eq!(plugin.command, "python");
        assert!(plugin.args.is_empty() && plugin.cwd.is_none() && plugin.env.is_empty());
    }
}
