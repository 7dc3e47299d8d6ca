//! One browser process per render attempt.
//!
//! A session owns the full capture sequence for a single quality tier:
//! launch, credential injection, navigation, the readiness gates, photo
//! recompression, the print-media switch and the PDF export. Nothing is
//! shared between attempts; a crashed or wedged browser can only ever take
//! its own attempt down, and the process is released on every exit path.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::Tab;
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::protocol::cdp::Emulation;
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{ContinueRequest, HeaderEntry};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::exporter;
use crate::headers::{merge_headers, HeaderInjectionPolicy};
use crate::optimizer::{self, js_string};
use crate::quality::QualityPreset;
use crate::{PrintTarget, RenderConfig, RenderRequest};

/// Diagnostics cap for page-text excerpts carried in timeout errors.
const SNIPPET_LIMIT: usize = 240;

/// Back-to-back evaluation failures a readiness wait tolerates before the
/// browser is declared unresponsive.
const POLL_ERROR_LIMIT: u32 = 5;

/// Readiness predicate: the marker element exists and the loading text is
/// gone from the visible page.
const READY_TEMPLATE: &str = r#"(function () {
    if (!document.querySelector({{MARKER}})) { return false; }
    var text = document.body ? document.body.innerText : '';
    return text.indexOf({{LOADING}}) === -1;
})()"#;

/// Photo predicate: every element matched by the photo selector has
/// finished loading with real pixel data.
const PHOTOS_TEMPLATE: &str = r#"(function () {
    var imgs = document.querySelectorAll({{SELECTOR}});
    for (var i = 0; i < imgs.length; i++) {
        var img = imgs[i];
        if (!img.complete || !img.naturalWidth || !img.naturalHeight) { return false; }
    }
    return true;
})()"#;

/// Force-decode every loaded image so the capture cannot race lazy decode.
/// Rejections are swallowed per image.
const DECODE_SCRIPT: &str = r#"(async function () {
    var imgs = Array.prototype.slice.call(document.images).filter(function (i) { return i.complete; });
    await Promise.all(imgs.map(function (i) { return i.decode().catch(function () {}); }));
    return imgs.length;
})()"#;

const SNIPPET_SCRIPT: &str =
    "(function () { return document.body ? document.body.innerText.slice(0, 240) : ''; })()";

/// Drives one headless Chrome process through a complete capture attempt.
pub struct RenderSession<'a> {
    config: &'a RenderConfig,
    preset: &'a QualityPreset,
}

impl<'a> RenderSession<'a> {
    pub fn new(config: &'a RenderConfig, preset: &'a QualityPreset) -> Self {
        Self { config, preset }
    }

    /// Run the attempt to completion.
    ///
    /// The browser started here is dropped before this returns, on success
    /// and on every failure path alike; dropping kills the child process, so
    /// close problems cannot mask the attempt outcome.
    pub fn run(&self, request: &RenderRequest) -> Result<Vec<u8>> {
        let browser = self.launch()?;
        let outcome = self.drive(&browser, request);
        drop(browser);
        outcome
    }

    fn launch(&self) -> Result<Browser> {
        let scale_arg = format!(
            "--force-device-scale-factor={}",
            self.preset.viewport_scale
        );
        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-gpu"),
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--force-color-profile=srgb"),
            OsStr::new(scale_arg.as_str()),
        ];

        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.config.sandbox)
            .window_size(Some((self.config.viewport.width, self.config.viewport.height)))
            .path(self.config.browser_path.clone())
            .args(args)
            .idle_browser_timeout(self.attempt_budget())
            .build()
            .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))?;

        Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))
    }

    fn drive(&self, browser: &Browser, request: &RenderRequest) -> Result<Vec<u8>> {
        let tab = browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(self.config.nav_timeout);

        self.install_auth_headers(&tab, request)?;

        let url = print_url(&self.config.target, &request.checklist_id)?;
        debug!("navigating to {}", url);
        tab.navigate_to(url.as_str())
            .map_err(|e| Error::Navigation(format!("{}: {}", url, e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::Navigation(format!("{}: {}", url, e)))?;

        self.await_content_ready(&tab)?;

        // Missing photos degrade the document; they must not lose it.
        if let Err(e) = self.await_photos_complete(&tab) {
            warn!("continuing without complete photos: {}", e);
        }
        self.decode_images(&tab);
        self.optimize_photos(&tab);

        std::thread::sleep(self.preset.render_settle_delay);

        self.emulate_print_media(&tab)?;

        exporter::export_pdf(&tab, self.preset)
    }

    /// Install the interception rule that stamps the caller's credential
    /// onto same-origin data-proxy requests. Must run before navigation so
    /// the page's very first fetches already carry it.
    fn install_auth_headers(&self, tab: &Tab, request: &RenderRequest) -> Result<()> {
        let policy = HeaderInjectionPolicy::bearer(
            &self.config.target.site_url,
            &self.config.proxy_path_prefixes,
            &request.bearer_token,
        )?;
        tab.enable_fetch(None, Some(false))
            .map_err(|e| Error::Launch(format!("Failed to enable fetch domain: {}", e)))?;
        tab.enable_request_interception(make_interceptor(policy))
            .map_err(|e| Error::Launch(format!("Failed to enable request interception: {}", e)))?;
        Ok(())
    }

    fn await_content_ready(&self, tab: &Tab) -> Result<()> {
        let contract = &self.config.target.readiness;
        let script = READY_TEMPLATE
            .replace("{{MARKER}}", &js_string(&contract.marker_selector))
            .replace("{{LOADING}}", &js_string(&contract.loading_text));

        self.poll_until(tab, &script, self.config.content_ready_timeout)
            .map_err(|failure| match failure {
                WaitFailure::Expired { waited_ms } => Error::RenderTimeout {
                    waited_ms,
                    snippet: self.page_snippet(tab),
                },
                WaitFailure::Unresponsive { waited_ms, last_error } => Error::Script(format!(
                    "browser stopped answering readiness polls after {} ms: {}",
                    waited_ms, last_error
                )),
            })
    }

    fn await_photos_complete(&self, tab: &Tab) -> Result<()> {
        let contract = &self.config.target.readiness;
        let script =
            PHOTOS_TEMPLATE.replace("{{SELECTOR}}", &js_string(&contract.photo_selector));

        self.poll_until(tab, &script, self.config.images_ready_timeout)
            .map_err(|failure| match failure {
                WaitFailure::Expired { waited_ms } => Error::ImageWaitTimeout { waited_ms },
                WaitFailure::Unresponsive { waited_ms, last_error } => Error::Script(format!(
                    "browser stopped answering photo polls after {} ms: {}",
                    waited_ms, last_error
                )),
            })
    }

    /// Run an in-page boolean predicate through [`poll_predicate`] at the
    /// configured interval.
    fn poll_until(
        &self,
        tab: &Tab,
        script: &str,
        timeout: Duration,
    ) -> std::result::Result<(), WaitFailure> {
        poll_predicate(
            || {
                let eval = tab.evaluate(script, false)?;
                Ok(eval.value.and_then(|v| v.as_bool()).unwrap_or(false))
            },
            timeout,
            self.config.poll_interval,
        )
    }

    /// Best-effort page-text excerpt for timeout diagnostics.
    fn page_snippet(&self, tab: &Tab) -> String {
        snippet_from(tab.evaluate(SNIPPET_SCRIPT, false).map(|eval| eval.value))
    }

    fn decode_images(&self, tab: &Tab) {
        if let Err(e) = tab.evaluate(DECODE_SCRIPT, true) {
            warn!("image decode pass failed: {}", e);
        }
    }

    fn optimize_photos(&self, tab: &Tab) {
        let script = optimizer::build_optimize_script(
            &self.config.target.readiness.photo_selector,
            self.preset.image_max_edge_px,
            self.preset.image_quality,
        );
        match tab.evaluate(&script, true) {
            Ok(eval) => match eval.value.as_ref().and_then(optimizer::parse_summary) {
                Some(s) => debug!(
                    "photo recompression: {} resized, {} skipped, {} failed of {}",
                    s.resized, s.skipped, s.failed, s.total
                ),
                None => warn!("photo recompression returned no summary"),
            },
            Err(e) => warn!("photo recompression failed, printing originals: {}", e),
        }
    }

    fn emulate_print_media(&self, tab: &Tab) -> Result<()> {
        tab.call_method(Emulation::SetEmulatedMedia {
            media: Some("print".to_string()),
            features: None,
        })
        .map_err(|e| Error::Script(format!("Print media emulation failed: {}", e)))?;
        Ok(())
    }

    /// Upper bound on one attempt's wall time, used as the browser's idle
    /// watchdog so a wedged tab cannot hold the process forever.
    fn attempt_budget(&self) -> Duration {
        self.config.nav_timeout
            + self.config.content_ready_timeout
            + self.config.images_ready_timeout
            + self.preset.render_settle_delay
            + Duration::from_secs(60)
    }
}

/// How a readiness wait ended when the predicate never held.
#[derive(Debug)]
enum WaitFailure {
    /// The deadline passed while the page kept answering polls.
    Expired { waited_ms: u64 },
    /// The page stopped answering polls altogether.
    Unresponsive { waited_ms: u64, last_error: String },
}

/// Poll a boolean predicate until it holds or the deadline passes. A lone
/// evaluation error counts as "not ready yet", but [`POLL_ERROR_LIMIT`]
/// errors in a row end the wait early; a dead browser fails every poll
/// and would otherwise consume the entire deadline. Generic over the
/// predicate so the loop can be exercised without a browser.
fn poll_predicate<F>(
    mut predicate: F,
    timeout: Duration,
    interval: Duration,
) -> std::result::Result<(), WaitFailure>
where
    F: FnMut() -> anyhow::Result<bool>,
{
    let started = Instant::now();
    let mut consecutive_errors = 0u32;
    loop {
        match predicate() {
            Ok(true) => return Ok(()),
            Ok(false) => consecutive_errors = 0,
            Err(e) => {
                debug!("readiness poll failed, retrying: {}", e);
                consecutive_errors += 1;
                if consecutive_errors >= POLL_ERROR_LIMIT {
                    return Err(WaitFailure::Unresponsive {
                        waited_ms: started.elapsed().as_millis() as u64,
                        last_error: e.to_string(),
                    });
                }
            }
        }
        if started.elapsed() >= timeout {
            return Err(WaitFailure::Expired {
                waited_ms: started.elapsed().as_millis() as u64,
            });
        }
        std::thread::sleep(interval);
    }
}

/// Interceptor that attaches the policy's headers to matching requests and
/// lets everything else continue untouched.
fn make_interceptor(policy: HeaderInjectionPolicy) -> Arc<dyn RequestInterceptor + Send + Sync> {
    Arc::new(
        move |_transport, _session_id, event: RequestPausedEvent| {
            let request = &event.params.request;
            let injected = match policy.headers_for(&request.url) {
                Some(set) => set,
                None => return RequestPausedDecision::Continue(None),
            };
            let merged = merge_headers(&header_pairs(&request.headers), injected)
                .into_iter()
                .map(|(name, value)| HeaderEntry { name, value })
                .collect();
            RequestPausedDecision::Continue(Some(ContinueRequest {
                request_id: event.params.request_id.clone(),
                url: None,
                method: None,
                post_data: None,
                headers: Some(merged),
                intercept_response: None,
            }))
        },
    )
}

/// Flatten a CDP header object into name/value pairs. Non-string values
/// (the protocol allows them) are carried as their JSON rendering.
fn header_pairs<H: Serialize>(headers: &H) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(headers) {
        for (name, value) in map {
            match value {
                serde_json::Value::String(s) => pairs.push((name, s)),
                other => pairs.push((name, other.to_string())),
            }
        }
    }
    pairs
}

/// The printable page URL: `{site}{print_path}?checklistId=...`, escaped.
pub(crate) fn print_url(target: &PrintTarget, checklist_id: &str) -> Result<Url> {
    let mut url = Url::parse(&target.site_url)
        .map_err(|e| Error::Config(format!("invalid site URL {:?}: {}", target.site_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!(
            "site URL {:?} cannot carry a path",
            target.site_url
        )));
    }
    url.set_path(&target.print_path);
    url.query_pairs_mut()
        .clear()
        .append_pair("checklistId", checklist_id);
    Ok(url)
}

/// Reduce a snippet evaluation to clamped diagnostics text. The failure
/// placeholder runs through the same clamp; CDP error strings can be
/// arbitrarily long.
fn snippet_from(eval: anyhow::Result<Option<serde_json::Value>>) -> String {
    match eval {
        Ok(Some(serde_json::Value::String(text))) => truncate_snippet(&text),
        Ok(Some(other)) => truncate_snippet(&other.to_string()),
        Ok(None) => String::new(),
        Err(e) => truncate_snippet(&format!("<page text unavailable: {}>", e)),
    }
}

/// Clamp diagnostics text to [`SNIPPET_LIMIT`] characters, collapsing
/// whitespace runs so multi-line spinners read as one line.
fn truncate_snippet(text: &str) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match cleaned.char_indices().nth(SNIPPET_LIMIT) {
        Some((idx, _)) => cleaned[..idx].to_string(),
        None => cleaned,
    }
}
