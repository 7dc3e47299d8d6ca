//! Quality tiers and the parameters bound to each of them.
//!
//! A tier is the unit of fallback: when an attempt at one tier fails, the
//! coordinator retries the whole capture at the next, cheaper tier. Every
//! knob that affects rendering cost lives in [`QualityPreset`] so a tier
//! switch changes all of them together.

use std::fmt;
use std::time::Duration;

/// A named rendering quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    High,
    Normal,
    Economy,
}

impl Quality {
    /// Resolve a caller-supplied tier name.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown or missing names resolve to `Normal` so a stale or mistyped
    /// query parameter can never fail a render.
    pub fn resolve(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Quality::High,
            Some("economy") => Quality::Economy,
            _ => Quality::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Normal => "normal",
            Quality::Economy => "economy",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete rendering parameters for one quality tier.
#[derive(Debug, Clone)]
pub struct QualityPreset {
    pub quality: Quality,
    /// Device scale factor for the browser, i.e. raster resolution
    pub viewport_scale: f64,
    /// Print scale for the primary parameter set
    pub pdf_scale: f64,
    /// Print scale for the fallback parameter set
    pub fallback_pdf_scale: f64,
    /// Pause between readiness and capture, letting deferred paint settle
    pub render_settle_delay: Duration,
    /// Longest edge photos are downsampled to before capture
    pub image_max_edge_px: u32,
    /// JPEG re-encode quality in `0.0..=1.0`
    pub image_quality: f64,
}

impl QualityPreset {
    /// The parameters for a tier. Values step down monotonically from
    /// `High` to `Economy`; `Economy` must stay cheap enough to succeed on
    /// photo-heavy protocols where the larger tiers run out of memory.
    pub fn for_quality(quality: Quality) -> Self {
        match quality {
            Quality::High => QualityPreset {
                quality,
                viewport_scale: 2.0,
                pdf_scale: 1.0,
                fallback_pdf_scale: 0.9,
                render_settle_delay: Duration::from_millis(1000),
                image_max_edge_px: 1800,
                image_quality: 0.9,
            },
            Quality::Normal => QualityPreset {
                quality,
                viewport_scale: 1.5,
                pdf_scale: 1.0,
                fallback_pdf_scale: 0.85,
                render_settle_delay: Duration::from_millis(750),
                image_max_edge_px: 1400,
                image_quality: 0.8,
            },
            Quality::Economy => QualityPreset {
                quality,
                viewport_scale: 1.0,
                pdf_scale: 0.9,
                fallback_pdf_scale: 0.8,
                render_settle_delay: Duration::from_millis(500),
                image_max_edge_px: 1000,
                image_quality: 0.65,
            },
        }
    }

    /// Resolve a caller-supplied tier name straight to its preset.
    pub fn resolve(name: Option<&str>) -> Self {
        Self::for_quality(Quality::resolve(name))
    }
}

/// The ordered tier chain for one request: the requested tier first, then
/// `normal` and `economy`, with later duplicates dropped. Each tier appears
/// at most once, so even an `economy` request gets a second, different tier.
pub fn fallback_order(requested: Quality) -> Vec<Quality> {
    let mut chain = Vec::with_capacity(3);
    for quality in [requested, Quality::Normal, Quality::Economy] {
        if !chain.contains(&quality) {
            chain.push(quality);
        }
    }
    chain
}
