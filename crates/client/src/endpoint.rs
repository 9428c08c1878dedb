//! Endpoint derivation from a server base URL.

const KNOWN_SUFFIXES: &[&str] = &["/message", "/sse", "/mcp"];
const CANDIDATE_PATHS: &[&str] = &["/message", "/mcp/message", "/mcp", "", "/api/mcp", "/v1/mcp"];

/// Strip trailing slashes.
pub fn normalize_base(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Ordered, de-duplicated list of JSON-RPC endpoints to try.
pub fn candidate_endpoints(base: &str) -> Vec<String> {
    let base = normalize_base(base);
    let mut candidates = Vec::with_capacity(CANDIDATE_PATHS.len() + 1);

    if KNOWN_SUFFIXES.iter().any(|s| base.ends_with(s)) {
        candidates.push(base.clone());
    }

    for path in CANDIDATE_PATHS {
        let candidate = format!("{}{}", base, path);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Endpoint of the server push stream.
pub fn sse_endpoint(base: &str) -> String {
    let base = normalize_base(base);
    if base.ends_with("/sse") {
        base
    } else if let Some(root) = base.strip_suffix("/message") {
        format!("{}/sse", root)
    } else {
        format!("{}/sse", base)
    }
}

/// Endpoint of the liveness check.
pub fn health_endpoint(base: &str) -> String {
    let base = normalize_base(base);
    let root = base
        .strip_suffix("/message")
        .or_else(|| base.strip_suffix("/sse"))
        .unwrap_or(&base);
    format!("{}/health", root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_base_yields_six_candidates() {
        let candidates = candidate_endpoints("http://localhost:8080/");
        assert_eq!(
            candidates,
            vec![
                "http://localhost:8080/message",
                "http://localhost:8080/mcp/message",
                "http://localhost:8080/mcp",
                "http://localhost:8080",
                "http://localhost:8080/api/mcp",
                "http://localhost:8080/v1/mcp",
            ]
        );
    }

    #[test]
    fn test_known_suffix_tried_first_without_duplicates() {
        let candidates = candidate_endpoints("http://host/mcp");
        assert_eq!(candidates[0], "http://host/mcp");
        assert_eq!(candidates[1], "http://host/mcp/message");

        let mut unique = candidates.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), candidates.len());
    }

    #[test]
    fn test_message_suffix() {
        let candidates = candidate_endpoints("http://host/message");
        assert_eq!(candidates[0], "http://host/message");
        assert_eq!(candidates[1], "http://host/message/message");
    }

    #[test]
    fn test_sse_endpoint() {
        assert_eq!(sse_endpoint("http://host/sse"), "http://host/sse");
        assert_eq!(sse_endpoint("http://host/message"), "http://host/sse");
        assert_eq!(sse_endpoint("http://host/mcp/"), "http://host/mcp/sse");
        assert_eq!(sse_endpoint("http://host"), "http://host/sse");
    }

    #[test]
    fn test_health_endpoint() {
        assert_eq!(health_endpoint("http://host/message"), "http://host/health");
        assert_eq!(health_endpoint("http://host/sse"), "http://host/health");
        assert_eq!(health_endpoint("http://host"), "http://host/health");
        assert_eq!(health_endpoint("http://host/mcp"), "http://host/mcp/health");
    }
}
