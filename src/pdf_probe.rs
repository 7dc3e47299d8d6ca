//! Byte-level checks over produced PDF buffers.
//!
//! Chrome's PDF output is not byte-stable across runs, so repeatability
//! assertions work on structure instead: the file magic, the number of page
//! objects, the number of embedded images. Skia writes its object
//! dictionaries in plain text, which keeps these scans cheap and free of a
//! PDF parser dependency.

/// Whether the buffer looks like a complete PDF: starts with the `%PDF-`
/// magic and carries an end-of-file marker.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-") && contains(bytes, b"%%EOF")
}

/// Number of page objects in the buffer.
///
/// `/Type /Pages` (the page tree) also matches the `/Type /Page` needle, so
/// the tree nodes are counted separately and subtracted.
pub fn page_count(bytes: &[u8]) -> usize {
    let spaced = count(bytes, b"/Type /Page").saturating_sub(count(bytes, b"/Type /Pages"));
    let tight = count(bytes, b"/Type/Page").saturating_sub(count(bytes, b"/Type/Pages"));
    spaced + tight
}

/// Number of embedded image XObjects in the buffer.
pub fn image_object_count(bytes: &[u8]) -> usize {
    count(bytes, b"/Subtype /Image") + count(bytes, b"/Subtype/Image")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}
