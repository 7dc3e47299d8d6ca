//! Quality-tier fallback coordination.
//!
//! Rendering cost is the dominant failure mode on photo-heavy protocols:
//! the browser runs out of memory or time before it runs out of anything
//! else. So failure handling is not retry-same but retry-cheaper, walking
//! the tier chain from the requested quality down. Attempts are strictly
//! sequential, one browser process alive at a time.

use log::{info, warn};

use crate::error::{Error, Result, TierFailure};
use crate::quality::{fallback_order, Quality, QualityPreset};
use crate::session::RenderSession;
use crate::{RenderConfig, RenderRequest, RenderedPdf};

/// One render attempt at a fixed quality tier.
///
/// The production backend launches a browser per call; tests substitute
/// deterministic implementations so the tier policy can be exercised
/// without Chrome.
pub trait RenderBackend: Send + Sync {
    fn render_tier(&self, request: &RenderRequest, preset: &QualityPreset) -> Result<Vec<u8>>;
}

/// Backend that drives headless Chrome through a fresh [`RenderSession`]
/// per call.
pub struct ChromeBackend {
    config: RenderConfig,
}

impl ChromeBackend {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl RenderBackend for ChromeBackend {
    fn render_tier(&self, request: &RenderRequest, preset: &QualityPreset) -> Result<Vec<u8>> {
        RenderSession::new(&self.config, preset).run(request)
    }
}

/// Runs the fallback chain for render requests.
pub struct RenderCoordinator {
    backend: Box<dyn RenderBackend>,
}

impl RenderCoordinator {
    /// Coordinator over the production Chrome backend.
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend: Box::new(ChromeBackend::new(config)),
        })
    }

    /// Coordinator over a custom backend.
    pub fn with_backend(backend: Box<dyn RenderBackend>) -> Self {
        Self { backend }
    }

    /// Render one protocol, falling back through cheaper tiers on failure.
    ///
    /// Each tier in the chain is attempted exactly once; the first PDF wins
    /// and is returned together with the tier that produced it. When every
    /// tier fails, the per-tier reasons are aggregated into
    /// [`Error::AllTiersFailed`] in attempt order.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderedPdf> {
        let requested = Quality::resolve(request.quality.as_deref());
        let chain = fallback_order(requested);
        let mut failures: Vec<TierFailure> = Vec::with_capacity(chain.len());

        for quality in chain {
            let preset = QualityPreset::for_quality(quality);
            info!(
                "rendering checklist {} at {} quality",
                request.checklist_id, quality
            );
            match self.backend.render_tier(request, &preset) {
                Ok(bytes) => {
                    info!(
                        "checklist {} rendered at {} quality ({} bytes)",
                        request.checklist_id,
                        quality,
                        bytes.len()
                    );
                    return Ok(RenderedPdf {
                        bytes,
                        quality_used: quality,
                    });
                }
                Err(e) => {
                    warn!(
                        "{} tier failed for checklist {}: {}",
                        quality, request.checklist_id, e
                    );
                    failures.push(TierFailure {
                        quality,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(Error::AllTiersFailed { failures })
    }
}
