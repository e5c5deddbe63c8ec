//! RTSP mount points: maps an RTSP request URI onto a media path the
//! element graph's [`ElementMapper`](crate::element::ElementMapper) can
//! resolve.

/// Extract the media path from a request URI, stripping the
/// `rtsp://host[:port]/` prefix and any `?trackID=N`/query suffix.
pub fn extract_mount_path(uri: &str) -> String {
    let without_scheme = uri.strip_prefix("rtsp://").unwrap_or(uri);
    let without_host = match without_scheme.find('/') {
        Some(idx) => &without_scheme[idx + 1..],
        None => "",
    };
    let without_query = without_host.split('?').next().unwrap_or("");
    without_query.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_host_and_query() {
        assert_eq!(extract_mount_path("rtsp://example.com:554/live/cam1?trackID=0"), "live/cam1");
    }

    #[test]
    fn handles_bare_path() {
        assert_eq!(extract_mount_path("live/cam1"), "cam1");
    }
}
