//! ATP Client
//!
//! Drives an out-of-process plugin: reads its schema, runs its steps and
//! exchanges signals with them while they run.
//!
//! # Example
//!
//! ```no_run
//! use atp_client::{ClientConfig, Input, PluginConfig, PluginProcess};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut process = PluginProcess::spawn(&PluginConfig {
//!     command: "python".to_string(),
//!     args: vec!["plugin.py".to_string()],
//!     ..Default::default()
//! })?;
//! let mut client = process.client(ClientConfig::default())?;
//!
//! let schema = client.read_schema().await?;
//! let (output_id, output_data) = client
//!     .execute(Input::new("hello", serde_json::json!({"name": "Ada"})), None, None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod process;
mod signal;
mod version;

pub use client::{Client, ClientState};
pub use config::{ClientConfig, PluginConfig};
pub use error::{ClientError, Result};
pub use process::PluginProcess;
pub use signal::Input;
pub use version::ProtocolVersion;
