//! Parser for fetcher output

use crate::error::IngestError;
use crate::types::FetchResult;

/// Build the text carried by `FetchFailed`: stdout followed by stderr
pub fn combined_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
    }
}

/// Parse the structured result from `--print-json` output.
///
/// The fetcher may print warnings before the JSON object even in quiet mode;
/// the last line that looks like an object is the result.
pub fn parse_fetch_output(stdout: &[u8], stderr: &[u8]) -> Result<FetchResult, IngestError> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .map(str::trim)
        .rfind(|line| line.starts_with('{'))
        .ok_or_else(|| IngestError::FetchFailed {
            reason: "fetcher printed no JSON result".into(),
            output: combined_output(stdout, stderr),
        })?;

    let result: FetchResult = serde_json::from_str(line).map_err(|e| IngestError::FetchFailed {
        reason: format!("unparsable fetcher result: {e}"),
        output: combined_output(stdout, stderr),
    })?;
    check_media_id(&result)?;
    Ok(result)
}

/// Reject ids that cannot name a file inside the work directory.
///
/// The id becomes both a local file name and an object key.
pub fn check_media_id(result: &FetchResult) -> Result<(), IngestError> {
    let id = result.id.as_str();
    let unsafe_id = id.is_empty()
        || id == "."
        || id.contains("..")
        || id.contains(['/', '\\', '\0']);
    if unsafe_id {
        return Err(IngestError::FetchFailed {
            reason: format!("fetcher reported an unusable media id {id:?}"),
            output: String::new(),
        });
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_result_after_warning_lines() {
        let stdout = b"WARNING: falling back to generic extractor\n\
            {\"id\":\"abc123\",\"title\":\"Ep 1\",\"description\":\"d\",\"duration\":120,\"thumbnail\":\"abc123.webp\"}\n";
        let result = parse_fetch_output(stdout, b"").unwrap();
        assert_eq!(result.id, "abc123");
        assert_eq!(result.duration, 120);
    }

    #[test]
    fn empty_stdout_is_fetch_failed_with_stderr() {
        let err = parse_fetch_output(b"", b"ERROR: Video unavailable").unwrap_err();
        match err {
            IngestError::FetchFailed { output, .. } => {
                assert_eq!(output, "ERROR: Video unavailable");
            }
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_fetch_failed() {
        let err = parse_fetch_output(b"{\"id\": 5", b"").unwrap_err();
        assert_eq!(err.kind(), "fetch_failed");
    }

    #[test]
    fn missing_required_field_is_fetch_failed() {
        let err = parse_fetch_output(b"{\"title\":\"no id\"}", b"").unwrap_err();
        assert!(err.to_string().contains("unparsable"));
    }

    #[test]
    fn path_like_ids_are_fetch_failed() {
        for id in ["../victim", "a/b", "", "..", "a\\b"] {
            let stdout = format!("{{\"id\":{id:?},\"title\":\"t\",\"duration\":1}}");
            let err = parse_fetch_output(stdout.as_bytes(), b"").unwrap_err();
            assert_eq!(err.kind(), "fetch_failed", "id {id:?}");
        }
        let ok = parse_fetch_output(br#"{"id":"a-b_c.1","title":"t","duration":1}"#, b"").unwrap();
        assert_eq!(ok.id, "a-b_c.1");
    }

    #[test]
    fn combined_output_joins_both_streams() {
        assert_eq!(combined_output(b"out\n", b"err\n"), "out\nerr");
        assert_eq!(combined_output(b"", b""), "");
    }
}
