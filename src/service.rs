//! Async facade over the synchronous render pipeline.
//!
//! The CDP stack underneath is blocking, so async callers must not run it on
//! a runtime worker. The facade executes each render on a dedicated thread
//! and reports back through a oneshot channel; callers get a plain `async`
//! method without the pipeline becoming async itself.

use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use crate::coordinator::RenderCoordinator;
use crate::error::{Error, Result};
use crate::{RenderConfig, RenderRequest, RenderedPdf};

/// Cloneable async handle over one [`RenderCoordinator`].
///
/// Requests are independent: each spawns its own thread, drives its own
/// browser processes and succeeds or fails alone. Nothing here pools or
/// queues; concurrency limiting belongs to the caller.
#[derive(Clone)]
pub struct RenderService {
    coordinator: Arc<RenderCoordinator>,
}

impl RenderService {
    pub fn new(config: RenderConfig) -> Result<Self> {
        Ok(Self {
            coordinator: Arc::new(RenderCoordinator::new(config)?),
        })
    }

    /// Facade over an existing coordinator, e.g. one with a custom backend.
    pub fn with_coordinator(coordinator: RenderCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
        }
    }

    /// Render one protocol PDF without blocking the async runtime.
    pub async fn render(&self, request: RenderRequest) -> Result<RenderedPdf> {
        let coordinator = Arc::clone(&self.coordinator);
        let (tx, rx) = oneshot::channel();

        thread::spawn(move || {
            let _ = tx.send(coordinator.render(&request));
        });

        rx.await
            .map_err(|e| Error::Worker(format!("Render canceled: {}", e)))?
    }
}

/// Deterministic attachment filename for a rendered protocol, derived from
/// the order number or checklist id. Anything outside `[A-Za-z0-9._-]` is
/// replaced so the name survives Content-Disposition headers and every
/// filesystem the archive touches.
pub fn attachment_filename(stem: &str) -> String {
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "protocol.pdf".to_string()
    } else {
        format!("protocol-{}.pdf", sanitized)
    }
}
