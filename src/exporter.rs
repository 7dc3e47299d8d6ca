//! Print parameter sets and the first-success export loop.
//!
//! Chrome's print pipeline occasionally rejects CSS-driven page sizing on
//! unusual content heights, so the exporter carries an ordered list of
//! parameter sets: the CSS-faithful one first, then a fixed A4 sheet with a
//! small inset and a slightly reduced scale. The first set that yields a
//! well-formed PDF buffer wins; if all fail, the last failure is reported.

use headless_chrome::browser::tab::Tab;
use headless_chrome::types::PrintToPdfOptions;

use crate::error::{Error, Result};
use crate::pdf_probe;
use crate::quality::QualityPreset;

/// A4 sheet in inches, the unit the print protocol uses.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;
/// Inset for the fallback sheet, roughly 10mm.
const FALLBACK_MARGIN_IN: f64 = 0.4;

/// One print parameter set tried by the exporter.
#[derive(Debug)]
pub struct ExportPlan {
    /// Short label used in logs and failure reasons
    pub label: &'static str,
    pub options: PrintToPdfOptions,
}

/// The ordered parameter sets for a preset.
pub fn export_plans(preset: &QualityPreset) -> Vec<ExportPlan> {
    vec![
        ExportPlan {
            label: "css-page-size",
            options: PrintToPdfOptions {
                prefer_css_page_size: Some(true),
                print_background: Some(true),
                display_header_footer: Some(false),
                landscape: Some(false),
                scale: Some(preset.pdf_scale),
                margin_top: Some(0.0),
                margin_bottom: Some(0.0),
                margin_left: Some(0.0),
                margin_right: Some(0.0),
                ..Default::default()
            },
        },
        ExportPlan {
            label: "a4-margins",
            options: PrintToPdfOptions {
                prefer_css_page_size: Some(false),
                print_background: Some(true),
                display_header_footer: Some(false),
                landscape: Some(false),
                scale: Some(preset.fallback_pdf_scale),
                paper_width: Some(A4_WIDTH_IN),
                paper_height: Some(A4_HEIGHT_IN),
                margin_top: Some(FALLBACK_MARGIN_IN),
                margin_bottom: Some(FALLBACK_MARGIN_IN),
                margin_left: Some(FALLBACK_MARGIN_IN),
                margin_right: Some(FALLBACK_MARGIN_IN),
                ..Default::default()
            },
        },
    ]
}

/// Export the tab's current rendering as a PDF, trying each parameter set
/// in order.
pub fn export_pdf(tab: &Tab, preset: &QualityPreset) -> Result<Vec<u8>> {
    export_with(export_plans(preset), |plan| tab.print_to_pdf(Some(plan.options)))
}

/// First-success loop over the plans. `print` performs the actual printing
/// call and consumes each plan it is handed; the loop is generic over it so
/// the policy can be exercised without a browser. A buffer that comes back
/// without PDF structure counts as a plan failure, the same as an error.
pub fn export_with<F>(plans: Vec<ExportPlan>, mut print: F) -> Result<Vec<u8>>
where
    F: FnMut(ExportPlan) -> anyhow::Result<Vec<u8>>,
{
    let mut last_failure = String::from("no print parameter sets configured");
    for plan in plans {
        let label = plan.label;
        match print(plan) {
            Ok(bytes) if pdf_probe::is_pdf(&bytes) => {
                log::debug!("print plan {} produced {} bytes", label, bytes.len());
                return Ok(bytes);
            }
            Ok(bytes) => {
                log::warn!(
                    "print plan {} returned a malformed buffer ({} bytes)",
                    label,
                    bytes.len()
                );
                last_failure = format!("{}: malformed PDF buffer ({} bytes)", label, bytes.len());
            }
            Err(e) => {
                log::warn!("print plan {} failed: {}", label, e);
                last_failure = format!("{}: {}", label, e);
            }
        }
    }
    Err(Error::Export(last_failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Quality;

    const GOOD_PDF: &[u8] = b"%PDF-1.4\n<< /Type /Page >>\n%%EOF";

    fn preset() -> QualityPreset {
        QualityPreset::for_quality(Quality::High)
    }

    #[test]
    fn primary_plan_honors_css_paging_with_zero_margins() {
        let plans = export_plans(&preset());
        assert_eq!(plans.len(), 2);
        let primary = &plans[0];
        assert_eq!(primary.label, "css-page-size");
        assert_eq!(primary.options.prefer_css_page_size, Some(true));
        assert_eq!(primary.options.scale, Some(1.0));
        assert_eq!(primary.options.margin_top, Some(0.0));
        assert_eq!(primary.options.paper_width, None);
        assert_eq!(primary.options.print_background, Some(true));
    }

    #[test]
    fn fallback_plan_pins_a4_with_inset_and_reduced_scale() {
        let plans = export_plans(&preset());
        let fallback = &plans[1];
        assert_eq!(fallback.label, "a4-margins");
        assert_eq!(fallback.options.prefer_css_page_size, Some(false));
        assert_eq!(fallback.options.paper_width, Some(A4_WIDTH_IN));
        assert_eq!(fallback.options.paper_height, Some(A4_HEIGHT_IN));
        assert_eq!(fallback.options.margin_left, Some(FALLBACK_MARGIN_IN));
        assert_eq!(fallback.options.scale, Some(0.9));
    }

    #[test]
    fn first_success_short_circuits() {
        let mut calls = Vec::new();
        let bytes = export_with(export_plans(&preset()), |plan| {
            calls.push(plan.label);
            Ok(GOOD_PDF.to_vec())
        })
        .unwrap();
        assert_eq!(bytes, GOOD_PDF);
        assert_eq!(calls, vec!["css-page-size"]);
    }

    #[test]
    fn falls_through_to_second_plan() {
        let mut calls = Vec::new();
        let bytes = export_with(export_plans(&preset()), |plan| {
            calls.push(plan.label);
            if plan.label == "css-page-size" {
                anyhow::bail!("content exceeds printable area");
            }
            Ok(GOOD_PDF.to_vec())
        })
        .unwrap();
        assert_eq!(bytes, GOOD_PDF);
        assert_eq!(calls, vec!["css-page-size", "a4-margins"]);
    }

    #[test]
    fn print_call_takes_ownership_of_the_plan() {
        let mut taken = Vec::new();
        let bytes = export_with(export_plans(&preset()), |plan| {
            taken.push((plan.label, plan.options));
            Ok(GOOD_PDF.to_vec())
        })
        .unwrap();
        assert_eq!(bytes, GOOD_PDF);
        let (label, options) = &taken[0];
        assert_eq!(*label, "css-page-size");
        assert_eq!(options.prefer_css_page_size, Some(true));
    }

    #[test]
    fn malformed_buffer_counts_as_failure() {
        let err = export_with(export_plans(&preset()), |plan| {
            if plan.label == "css-page-size" {
                Ok(b"<html>printer error</html>".to_vec())
            } else {
                anyhow::bail!("spool exhausted")
            }
        })
        .unwrap_err();
        match err {
            Error::Export(reason) => {
                // The last plan's failure is the one reported.
                assert!(reason.contains("a4-margins"), "got: {reason}");
                assert!(reason.contains("spool exhausted"));
            }
            other => panic!("expected Export, got {other:?}"),
        }
    }

    #[test]
    fn all_plans_failing_reports_last_error() {
        let err = export_with(export_plans(&preset()), |_| {
            anyhow::bail!("target crashed")
        })
        .unwrap_err();
        assert!(err.to_string().contains("target crashed"));
    }
}
