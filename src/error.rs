//! Error types for the protocol renderer

use thiserror::Error;

use crate::quality::Quality;

/// Result type alias for renderer operations
pub type Result<T> = std::result::Result<T, Error>;

/// One quality tier's failure, recorded by the coordinator while it walks
/// the fallback chain.
#[derive(Debug, Clone)]
pub struct TierFailure {
    /// The tier that was attempted
    pub quality: Quality,
    /// The failure reason, as reported by the render session
    pub reason: String,
}

impl std::fmt::Display for TierFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.quality, self.reason)
    }
}

/// Errors that can occur while rendering a protocol PDF
#[derive(Error, Debug)]
pub enum Error {
    /// The browser process could not be started or prepared
    #[error("Browser launch failed: {0}")]
    Launch(String),

    /// Navigation to the printable page failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The printable page never reported readiness within the bound
    #[error("Page not ready after {waited_ms}ms; page text: {snippet:?}")]
    RenderTimeout { waited_ms: u64, snippet: String },

    /// Photo elements did not finish loading within the bound
    #[error("Photos still loading after {waited_ms}ms")]
    ImageWaitTimeout { waited_ms: u64 },

    /// In-page script evaluation failed
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Every print parameter set failed
    #[error("PDF export failed: {0}")]
    Export(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Every quality tier failed
    #[error("All quality tiers failed: {}", format_failures(.failures))]
    AllTiersFailed { failures: Vec<TierFailure> },

    /// The background render worker vanished before reporting a result
    #[error("Render worker failed: {0}")]
    Worker(String),
}

fn format_failures(failures: &[TierFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Script(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_failures_are_concatenated_in_order() {
        let err = Error::AllTiersFailed {
            failures: vec![
                TierFailure {
                    quality: Quality::High,
                    reason: "PDF export failed: oversized page".to_string(),
                },
                TierFailure {
                    quality: Quality::Normal,
                    reason: "Navigation failed: connection refused".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("All quality tiers failed: "));
        let high = msg.find("high:").unwrap();
        let normal = msg.find("normal:").unwrap();
        assert!(high < normal);
        assert!(msg.contains("oversized page"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn render_timeout_carries_snippet_and_elapsed() {
        let err = Error::RenderTimeout {
            waited_ms: 120_000,
            snippet: "Loading protocol…".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("120000ms"));
        assert!(msg.contains("Loading protocol"));
    }
}
