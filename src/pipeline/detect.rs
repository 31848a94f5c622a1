//! Binary/oversize detection for text conversion candidates.
//!
//! The pre-check runs at task execution time and applies even to files
//! with textual extensions — export trees routinely contain `.htm` files
//! that are actually packed media or generated blobs. Classification reads
//! only a bounded prefix so a pathological file cannot stall the executor.
//!
//! A file is treated as binary when any of these hold:
//! 1. it exceeds [`MAX_TEXT_SIZE`] (checked on metadata, content unread);
//! 2. the prefix contains an embedded multimedia data marker;
//! 3. the prefix contains a base64 payload run longer than
//!    [`MAX_BASE64_RUN`] characters;
//! 4. more than 10% of sampled prefix bytes are non-printable, where tab,
//!    newline, carriage return, and form feed count as printable.

/// Files larger than this are classified binary without reading content.
pub const MAX_TEXT_SIZE: u64 = 5 * 1024 * 1024;

/// How much of the file the classifier samples.
pub const CLASSIFY_PREFIX_LEN: usize = 64 * 1024;

/// Longest tolerated run of base64 alphabet characters.
pub const MAX_BASE64_RUN: usize = 10_000;

/// Inline multimedia payload markers.
const MULTIMEDIA_MARKERS: &[&str] = &["data:image/", "data:video/", "data:audio/"];

/// Classify a sampled prefix. Returns a human-readable detail when the
/// content is binary, `None` when it looks like text.
pub fn classify_binary(prefix: &[u8]) -> Option<String> {
    if prefix.is_empty() {
        return None;
    }

    let text = String::from_utf8_lossy(prefix);
    for marker in MULTIMEDIA_MARKERS {
        if text.contains(marker) {
            return Some(format!("embedded multimedia data ({marker}…)"));
        }
    }

    if let Some(run) = longest_base64_run(prefix) {
        return Some(format!("base64 payload of {run} characters"));
    }

    let non_printable = prefix
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C))
        .count();
    let ratio = non_printable as f64 / prefix.len() as f64;
    if ratio > 0.10 {
        return Some(format!(
            "{:.0}% non-printable characters in sampled prefix",
            ratio * 100.0
        ));
    }

    None
}

/// Length of the longest run of base64 alphabet characters, if it exceeds
/// [`MAX_BASE64_RUN`].
fn longest_base64_run(bytes: &[u8]) -> Option<usize> {
    let mut longest = 0usize;
    let mut current = 0usize;
    for &b in bytes {
        if b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=') {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (longest > MAX_BASE64_RUN).then_some(longest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_html_is_text() {
        let html = b"<html><head><title>T</title></head><body><h1>Hi</h1></body></html>";
        assert!(classify_binary(html).is_none());
    }

    #[test]
    fn multimedia_marker_is_binary() {
        let content = br#"<img src="data:image/png;base64,iVBOR"/>"#;
        let detail = classify_binary(content).unwrap();
        assert!(detail.contains("multimedia"));
    }

    #[test]
    fn long_base64_run_is_binary() {
        let mut content = b"<p>".to_vec();
        content.extend(std::iter::repeat(b'A').take(MAX_BASE64_RUN + 1));
        content.extend_from_slice(b"</p>");
        let detail = classify_binary(&content).unwrap();
        assert!(detail.contains("base64"));
    }

    #[test]
    fn base64_run_at_threshold_is_text() {
        let content: Vec<u8> = std::iter::repeat(b'A').take(MAX_BASE64_RUN).collect();
        // exactly at the threshold — not over it, and harmless whitespace
        // breaks would reset the run anyway
        assert!(classify_binary(&content).is_none());
    }

    #[test]
    fn control_character_soup_is_binary() {
        let mut content = vec![0u8; 200];
        content.extend_from_slice(b"some text");
        let detail = classify_binary(&content).unwrap();
        assert!(detail.contains("non-printable"));
    }

    #[test]
    fn tabs_and_newlines_are_printable() {
        let content = b"line one\n\tline two\r\nline three\x0C".repeat(50);
        assert!(classify_binary(&content).is_none());
    }

    #[test]
    fn empty_prefix_is_text() {
        assert!(classify_binary(b"").is_none());
    }
}
