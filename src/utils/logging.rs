//! Logging setup
//!
//! Installs a `tracing-subscriber` stack built from [`LoggingConfig`]:
//! console and/or file output, compact or JSON formatting, and an
//! `EnvFilter` that honours `RUST_LOG` before falling back to the configured
//! level.

use crate::config::LoggingConfig;
use crate::error::{DispatchError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Install the global subscriber.
///
/// Returns `Ok(false)` when a global subscriber was already installed, so
/// tests and embedding applications can call this more than once.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()));

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.log_to_console {
        layers.push(output_layer(config.json_format, std::io::stderr));
    }
    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            DispatchError::ConfigError(
                "log_file_path must be specified when log_to_file is true".to_string(),
            )
        })?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        layers.push(output_layer(config.json_format, Mutex::new(file)));
    }

    Ok(tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .is_ok())
}

fn output_layer<W>(json: bool, writer: W) -> BoxedLayer
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let layer = fmt::layer().with_writer(writer).with_target(true);
    if json {
        layer.json().boxed()
    } else {
        layer.compact().boxed()
    }
}
