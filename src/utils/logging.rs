//! Structured logging setup.
//!
//! The subscriber is built once, at node startup, from an injected
//! [`LoggingConfig`]. Target exclusions are ordinary filter directives
//! owned by that config; there is no process-global toggle to flip at
//! runtime.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Build the filter described by `config`: a default level plus an
/// `off` directive per excluded target.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::new(config.log_level.to_string().to_lowercase());
    for target in &config.excludes {
        let directive = format!("{target}=off")
            .parse()
            .map_err(|e| ProtocolError::Config(format!("bad exclude target {target:?}: {e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Install the global tracing subscriber.
///
/// Fails if a subscriber is already installed or an exclude target does
/// not parse as a filter directive.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| ProtocolError::Config(format!("failed to install subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_filter_includes_excludes() {
        let config = LoggingConfig {
            excludes: vec!["peerwire::routing".to_string()],
            ..LoggingConfig::default()
        };
        let filter = build_filter(&config).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("peerwire::routing=off"));
    }

    #[test]
    fn test_bad_exclude_target_is_rejected() {
        let config = LoggingConfig {
            excludes: vec!["not a target".to_string()],
            ..LoggingConfig::default()
        };
        assert!(build_filter(&config).is_err());
    }
}
