//! Subscriber setup. Logs go to stderr; stdout is reserved for command output.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CRATES: [&str; 4] = ["bridgeform", "bridgeform_wiki", "bridgeform_synapse", "bridgeform_aws"];

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|krate| format!("{krate}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// `RUST_LOG` wins when set; otherwise our crates log at info (debug with `--verbose`).
pub fn init(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_our_crates_only() {
        assert_eq!(
            default_directives(true),
            "warn,bridgeform=debug,bridgeform_wiki=debug,bridgeform_synapse=debug,bridgeform_aws=debug"
        );
        assert!(default_directives(false).starts_with("warn,bridgeform=info"));
    }
}
