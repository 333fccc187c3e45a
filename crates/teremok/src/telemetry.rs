use crate::config::TelemetryConfig;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::EnvFilter;

/// Transport crates are capped at this level unless the filter names them.
const QUIET_DEPENDENCIES: [&str; 2] = ["hyper=warn", "tower=warn"];

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log filter '{value}' is not a valid tracing directive list")]
    Filter { value: String, source: ParseError },
    #[error("tracing subscriber already installed: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global fmt subscriber; `RUST_LOG` overrides `APP_LOG_LEVEL`.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let directives = std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_level.clone());

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(&directives)?)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

fn build_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    let invalid = |source| TelemetryError::Filter {
        value: directives.to_string(),
        source,
    };

    let mut filter = EnvFilter::try_new(directives).map_err(invalid)?;
    for quiet in QUIET_DEPENDENCIES {
        let crate_name = quiet.split('=').next().unwrap_or(quiet);
        if !directives.contains(crate_name) {
            filter = filter.add_directive(quiet.parse::<Directive>().map_err(invalid)?);
        }
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_filter() {
        let err = build_filter("teremok=verbose").expect_err("filter should fail");
        assert!(err.to_string().contains("teremok=verbose"));
    }

    #[test]
    fn accepts_directive_lists() {
        let filter = build_filter("info,teremok=debug").expect("valid directives");
        assert!(filter.to_string().contains("hyper=warn"));
    }

    #[test]
    fn explicit_dependency_level_is_kept() {
        let filter = build_filter("info,hyper=trace").expect("valid directives");
        let rendered = filter.to_string();
        assert!(rendered.contains("hyper=trace"));
        assert!(!rendered.contains("hyper=warn"));
        assert!(rendered.contains("tower=warn"));
    }
}
