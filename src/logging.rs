use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directive used when neither RUST_LOG nor the config says otherwise.
/// Request spans from tower-http are noisy, keep them one notch down.
fn default_directives(level: &str) -> String {
    format!("{level},tower_http=warn")
}

/// Initialize structured logging. `RUST_LOG` wins over the configured level.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .with_context(|| format!("invalid log level {level:?}"))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    // Webhook traffic goes to a file as well when configured
    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_writer(file).with_ansi(false).with_target(true))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_parse() {
        assert!(EnvFilter::try_new(default_directives("debug")).is_ok());
    }
}
