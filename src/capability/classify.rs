//! Failure classification for subprocess and HTTP error text

use serde::{Deserialize, Serialize};

use super::FailureClass;

/// A family of failure messages that are worth retrying.
///
/// Configured as a list under `deploy.transient_matchers`, e.g.
/// `["throttling", { regex = "UPDATE_IN_PROGRESS" }]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientPattern {
    Network,
    Timeout,
    /// 5xx responses relayed by the deploy tool
    Unavailable,
    Throttling,
    /// Case-sensitive regular expression; an invalid one never matches
    Regex(String),
}

impl TransientPattern {
    pub fn defaults() -> Vec<TransientPattern> {
        use TransientPattern::*;
        vec![Network, Timeout, Unavailable, Throttling]
    }

    /// Lowercase fragments any of which identifies a built-in family
    fn fragments(&self) -> &'static [&'static str] {
        match self {
            TransientPattern::Network => &["network", "connection", "econnreset", "unreachable"],
            TransientPattern::Timeout => &["timeout", "timed out"],
            TransientPattern::Unavailable => &[
                "500 internal",
                "502",
                "503",
                "504",
                "service unavailable",
                "internal failure",
            ],
            TransientPattern::Throttling => &[
                "throttl",
                "rate exceeded",
                "rate limit",
                "429",
                "too many requests",
            ],
            TransientPattern::Regex(_) => &[],
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        if let TransientPattern::Regex(pattern) = self {
            return regex::Regex::new(pattern).is_ok_and(|re| re.is_match(text));
        }
        let lowered = text.to_lowercase();
        self.fragments().iter().any(|f| lowered.contains(f))
    }

    /// Category recorded in the execution's error context
    pub fn category(&self) -> &'static str {
        match self {
            TransientPattern::Network => "network",
            TransientPattern::Timeout => "timeout",
            TransientPattern::Unavailable => "service_unavailable",
            TransientPattern::Throttling => "throttled",
            TransientPattern::Regex(_) => "transient",
        }
    }
}

/// First matching pattern wins; no match is a permanent "failed"
pub fn classify(patterns: &[TransientPattern], text: &str) -> (FailureClass, &'static str) {
    match patterns.iter().find(|p| p.matches(text)) {
        Some(pattern) => (FailureClass::Transient, pattern.category()),
        None => (FailureClass::Permanent, "failed"),
    }
}

/// Classify an HTTP status code returned by a capability endpoint
pub fn classify_status(status: u16) -> (FailureClass, &'static str) {
    match status {
        429 => (FailureClass::Transient, "throttled"),
        408 => (FailureClass::Transient, "timeout"),
        500..=599 => (FailureClass::Transient, "service_unavailable"),
        401 | 403 => (FailureClass::Permanent, "unauthorized"),
        _ => (FailureClass::Permanent, "rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_families() {
        assert!(TransientPattern::Network.matches("read ECONNRESET"));
        assert!(TransientPattern::Throttling.matches("Throttling: Rate exceeded"));
        assert!(TransientPattern::Throttling.matches("HTTP 429 Too Many Requests"));
        assert!(TransientPattern::Unavailable.matches("503 Service Unavailable"));
        assert!(!TransientPattern::Throttling.matches("ValidationError"));
    }

    #[test]
    fn test_regex_pattern() {
        let pattern = TransientPattern::Regex("UPDATE_IN_PROGRESS".to_string());
        assert!(pattern.matches("stack is in UPDATE_IN_PROGRESS state"));
        assert!(!pattern.matches("update_in_progress"));
        assert!(!TransientPattern::Regex("[".to_string()).matches("["));
    }

    #[test]
    fn test_patterns_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Section {
            transient_matchers: Vec<TransientPattern>,
        }
        let section: Section =
            toml::from_str(r#"transient_matchers = ["throttling", { regex = "IN_PROGRESS" }]"#)
                .unwrap();
        assert_eq!(
            section.transient_matchers,
            vec![
                TransientPattern::Throttling,
                TransientPattern::Regex("IN_PROGRESS".to_string())
            ]
        );
    }

    #[test]
    fn test_classify_output() {
        let patterns = TransientPattern::defaults();
        assert_eq!(
            classify(&patterns, "read ECONNRESET: connection reset"),
            (FailureClass::Transient, "network")
        );
        assert_eq!(
            classify(&patterns, "Template format error: unresolved resource"),
            (FailureClass::Permanent, "failed")
        );
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(429).0, FailureClass::Transient);
        assert_eq!(classify_status(503).0, FailureClass::Transient);
        assert_eq!(classify_status(400).0, FailureClass::Permanent);
        assert_eq!(classify_status(403).1, "unauthorized");
    }
}
