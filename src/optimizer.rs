//! In-page photo recompression ahead of PDF capture.
//!
//! Protocol photos arrive from phone cameras at full sensor resolution and
//! would otherwise be embedded into the PDF as-is, producing exports in the
//! tens of megabytes. Before printing, a script runs inside the page that
//! downsamples each oversized photo onto a canvas and swaps the element's
//! source for a JPEG data URL. The DOM keeps its layout because only `src`
//! changes; the capture that follows sees the recompressed pixels.
//!
//! The whole pass is best effort. A photo that cannot be re-encoded, for
//! instance because a cross-origin response tainted the canvas, is left
//! untouched and counted in the summary; the export still proceeds.

use serde::Deserialize;

/// Upper bound on waiting for any single image to finish loading before the
/// pass moves on, in milliseconds.
pub const PER_IMAGE_WAIT_MS: u64 = 10_000;

/// Outcome counters reported by the in-page script.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct OptimizeSummary {
    /// Candidate images after deduplication and exclusions
    pub total: usize,
    /// Images downsampled and swapped to a JPEG data URL
    pub resized: usize,
    /// Images already within bounds, or without usable pixel data
    pub skipped: usize,
    /// Images whose re-encode threw and were left untouched
    pub failed: usize,
}

/// The recompression script. Placeholders are substituted by
/// [`build_optimize_script`]; `{{SELECTOR}}` receives a quoted JS string,
/// the rest receive bare numbers.
const OPTIMIZE_TEMPLATE: &str = r#"
(async function () {
    var maxEdge = {{MAX_EDGE}};
    var quality = {{QUALITY}};
    var waitMs = {{WAIT_MS}};

    var seen = new Set();
    var targets = [];
    document.querySelectorAll({{SELECTOR}}).forEach(function (img) {
        if (seen.has(img)) { return; }
        seen.add(img);
        var src = img.currentSrc || img.src || '';
        if (!src) { return; }
        if (src.indexOf('.svg') !== -1 || src.indexOf('data:image/svg') === 0) { return; }
        if (img.hasAttribute('data-keep-original')) { return; }
        targets.push(img);
    });

    var summary = { total: targets.length, resized: 0, skipped: 0, failed: 0 };

    function settled(img) {
        return new Promise(function (resolve) {
            if (img.complete) { resolve(); return; }
            var timer = setTimeout(resolve, waitMs);
            function done() { clearTimeout(timer); resolve(); }
            img.addEventListener('load', done, { once: true });
            img.addEventListener('error', done, { once: true });
        });
    }

    for (var i = 0; i < targets.length; i++) {
        var img = targets[i];
        try {
            await settled(img);
            var w = img.naturalWidth;
            var h = img.naturalHeight;
            if (!w || !h) { summary.skipped += 1; continue; }
            var ratio = Math.min(1, maxEdge / Math.max(w, h));
            if (ratio >= 1) { summary.skipped += 1; continue; }

            var canvas = document.createElement('canvas');
            canvas.width = Math.max(1, Math.round(w * ratio));
            canvas.height = Math.max(1, Math.round(h * ratio));
            var ctx = canvas.getContext('2d');
            ctx.fillStyle = '#ffffff';
            ctx.fillRect(0, 0, canvas.width, canvas.height);
            ctx.drawImage(img, 0, 0, canvas.width, canvas.height);
            var jpeg = canvas.toDataURL('image/jpeg', quality);

            await new Promise(function (resolve) {
                img.addEventListener('load', resolve, { once: true });
                img.addEventListener('error', resolve, { once: true });
                if (img.srcset) { img.srcset = ''; }
                img.src = jpeg;
            });
            canvas.width = 0;
            canvas.height = 0;
            summary.resized += 1;
        } catch (e) {
            summary.failed += 1;
        }
    }

    return JSON.stringify(summary);
})()
"#;

/// Build the recompression script for one capture.
///
/// `photo_selector` is quoted into the script as a JS string literal, so
/// selector syntax cannot break out of the template.
pub fn build_optimize_script(photo_selector: &str, max_edge_px: u32, jpeg_quality: f64) -> String {
    OPTIMIZE_TEMPLATE
        .replace("{{SELECTOR}}", &js_string(photo_selector))
        .replace("{{MAX_EDGE}}", &max_edge_px.to_string())
        .replace("{{QUALITY}}", &jpeg_quality.to_string())
        .replace("{{WAIT_MS}}", &PER_IMAGE_WAIT_MS.to_string())
}

/// Parse the summary the script resolves with. The script returns a JSON
/// string rather than an object so the value survives the protocol's
/// by-value result channel.
pub fn parse_summary(value: &serde_json::Value) -> Option<OptimizeSummary> {
    let text = value.as_str()?;
    serde_json::from_str(text).ok()
}

/// Quote a string as a JavaScript string literal. JSON string syntax is a
/// subset of JS, so serde's encoder does the escaping.
pub(crate) fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
