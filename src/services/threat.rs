//! Heuristic request threat classification.
//!
//! Three independent checks each may record a finding and cast a severity vote:
//! - Body size: canonical JSON length over the configured limit → Medium
//! - Suspicious headers: client-address spoofing headers → Medium, or High above 2
//! - Suspicious path: traversal / command-execution fragments → High
//!
//! The verdict's level is the highest vote cast.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::models::security::{
    FindingCategory, FindingDetail, RequestDescriptor, ThreatLevel, ThreatVerdict,
};

/// Headers that let a caller claim an arbitrary client address.
pub const SUSPICIOUS_HEADERS: [&str; 5] = [
    "x-forwarded-for",
    "x-real-ip",
    "x-remote-addr",
    "x-originating-ip",
    "x-remote-ip",
];

/// Path fragments matched against the lower-cased request path.
pub const SUSPICIOUS_PATH_PATTERNS: [&str; 8] = [
    "../",
    "..\\",
    "exec",
    "eval",
    "system",
    "/etc/",
    "cmd",
    "powershell",
];

const SUSPICIOUS_HEADER_MESSAGE: &str = "Potentially dangerous header detected";

/// Matches above this count escalate the header finding to High.
const HEADER_ESCALATION_THRESHOLD: usize = 2;

/// Classify a request descriptor.
pub fn classify(req: &RequestDescriptor, max_body_size_kb: u64) -> ThreatVerdict {
    let mut details = BTreeMap::new();
    let mut level = ThreatLevel::Low;

    if let Some(body) = &req.body {
        let size = canonical_body_len(body);
        if size > max_body_size_kb {
            details.insert(
                FindingCategory::BodySize,
                FindingDetail::Message(format!(
                    "Body size {size} exceeds limit of {max_body_size_kb}"
                )),
            );
            level = level.max(ThreatLevel::Medium);
        }
    }

    let headers = suspicious_headers(&req.headers);
    if !headers.is_empty() {
        let vote = if headers.len() > HEADER_ESCALATION_THRESHOLD {
            ThreatLevel::High
        } else {
            ThreatLevel::Medium
        };
        details.insert(FindingCategory::SuspiciousHeaders, FindingDetail::Headers(headers));
        level = level.max(vote);
    }

    if is_suspicious_path(&req.path) {
        details.insert(
            FindingCategory::SuspiciousPath,
            FindingDetail::Message(format!(
                "Suspicious path pattern detected: {}",
                req.path
            )),
        );
        level = level.max(ThreatLevel::High);
    }

    if details.is_empty() {
        return ThreatVerdict::clean();
    }

    let recommendations = details
        .keys()
        .map(|category| {
            (
                category.recommendation_key().to_string(),
                category.recommendation().to_string(),
            )
        })
        .collect();

    ThreatVerdict {
        is_threat: true,
        threat_level: level,
        details,
        recommendations,
    }
}

/// Length of the body's canonical rendering, in Unicode scalar values.
pub fn canonical_body_len(body: &Map<String, Value>) -> u64 {
    canonical_json(body).chars().count() as u64
}

/// Minified JSON with object keys sorted at every depth.
///
/// Independent of serde_json's `preserve_order` feature.
pub fn canonical_json(body: &Map<String, Value>) -> String {
    let sorted: BTreeMap<&String, Canonical<'_>> =
        body.iter().map(|(k, v)| (k, Canonical(v))).collect();
    // Serializing string keys and JSON values cannot fail.
    serde_json::to_string(&sorted).unwrap_or_default()
}

struct Canonical<'a>(&'a Value);

impl Serialize for Canonical<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Canonical<'_>> =
                    map.iter().map(|(k, v)| (k, Canonical(v))).collect();
                sorted.serialize(serializer)
            }
            Value::Array(items) => {
                let items: Vec<Canonical<'_>> = items.iter().map(Canonical).collect();
                items.serialize(serializer)
            }
            other => other.serialize(serializer),
        }
    }
}

/// Deny-listed headers present in `headers`, keyed by their lower-case name.
fn suspicious_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    SUSPICIOUS_HEADERS
        .iter()
        .filter(|name| headers.keys().any(|key| key.eq_ignore_ascii_case(name)))
        .map(|name| (name.to_string(), SUSPICIOUS_HEADER_MESSAGE.to_string()))
        .collect()
}

fn is_suspicious_path(path: &str) -> bool {
    let lowered = path.to_lowercase();
    SUSPICIOUS_PATH_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(path: &str, headers: &[(&str, &str)], body: Option<Value>) -> RequestDescriptor {
        RequestDescriptor {
            method: "GET".to_string(),
            path: path.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.map(|b| match b {
                Value::Object(map) => map,
                other => panic!("body must be an object, got {other}"),
            }),
        }
    }

    #[test]
    fn clean_request_is_low() {
        let verdict = classify(&descriptor("/api/data", &[], None), 100);
        assert_eq!(verdict, ThreatVerdict::clean());
        assert!(!verdict.is_threat);
        assert_eq!(verdict.threat_level, ThreatLevel::Low);
        assert!(verdict.details.is_empty());
        assert!(verdict.recommendations.is_empty());
    }

    #[test]
    fn single_forwarded_header_is_medium() {
        let verdict = classify(
            &descriptor("/api/data", &[("x-forwarded-for", "1.2.3.4")], None),
            100,
        );
        assert!(verdict.is_threat);
        assert_eq!(verdict.threat_level, ThreatLevel::Medium);
        match &verdict.details[&FindingCategory::SuspiciousHeaders] {
            FindingDetail::Headers(found) => {
                assert_eq!(found.len(), 1);
                assert_eq!(found["x-forwarded-for"], SUSPICIOUS_HEADER_MESSAGE);
            }
            other => panic!("unexpected detail {other:?}"),
        }
        assert_eq!(
            verdict.recommendations["headers"],
            FindingCategory::SuspiciousHeaders.recommendation()
        );
    }

    #[test]
    fn two_headers_stay_medium() {
        let verdict = classify(
            &descriptor(
                "/",
                &[("x-real-ip", "10.0.0.1"), ("x-remote-ip", "10.0.0.2")],
                None,
            ),
            100,
        );
        assert_eq!(verdict.threat_level, ThreatLevel::Medium);
    }

    #[test]
    fn three_headers_escalate_to_high() {
        let verdict = classify(
            &descriptor(
                "/",
                &[
                    ("X-Forwarded-For", "1.1.1.1"),
                    ("x-real-ip", "2.2.2.2"),
                    ("X-ORIGINATING-IP", "3.3.3.3"),
                    ("accept", "*/*"),
                ],
                None,
            ),
            100,
        );
        assert_eq!(verdict.threat_level, ThreatLevel::High);
        match &verdict.details[&FindingCategory::SuspiciousHeaders] {
            FindingDetail::Headers(found) => {
                assert_eq!(found.len(), 3);
                assert!(found.contains_key("x-originating-ip"));
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn benign_headers_produce_no_header_finding() {
        let verdict = classify(
            &descriptor(
                "/api",
                &[("user-agent", "curl"), ("x-forwarded-proto", "https")],
                None,
            ),
            100,
        );
        assert!(!verdict
            .details
            .contains_key(&FindingCategory::SuspiciousHeaders));
    }

    #[test]
    fn traversal_path_is_high() {
        let verdict = classify(&descriptor("/../etc/passwd", &[], None), 100);
        assert_eq!(verdict.threat_level, ThreatLevel::High);
        assert_eq!(
            verdict.details[&FindingCategory::SuspiciousPath],
            FindingDetail::Message(
                "Suspicious path pattern detected: /../etc/passwd".to_string()
            )
        );
        assert!(verdict.recommendations.contains_key("path"));
    }

    #[test]
    fn path_patterns_match_case_insensitively() {
        for path in ["/A/../B", "/run/PowerShell", "/EXEC", "/static/..\\win.ini"] {
            let verdict = classify(&descriptor(path, &[], None), 100);
            assert_eq!(verdict.threat_level, ThreatLevel::High, "path {path}");
        }
    }

    #[test]
    fn path_message_keeps_original_case() {
        let verdict = classify(&descriptor("/Api/CMD", &[], None), 100);
        assert_eq!(
            verdict.details[&FindingCategory::SuspiciousPath],
            FindingDetail::Message("Suspicious path pattern detected: /Api/CMD".to_string())
        );
    }

    #[test]
    fn oversized_body_is_medium() {
        let body = json!({ "payload": "x".repeat(200) });
        let verdict = classify(&descriptor("/upload", &[], Some(body.clone())), 100);
        let expected_len = canonical_body_len(body.as_object().unwrap());

        assert_eq!(verdict.threat_level, ThreatLevel::Medium);
        assert_eq!(
            verdict.details[&FindingCategory::BodySize],
            FindingDetail::Message(format!(
                "Body size {expected_len} exceeds limit of 100"
            ))
        );
        assert!(verdict.recommendations.contains_key("body_size"));
    }

    #[test]
    fn body_at_limit_is_not_flagged() {
        // {"a":"bcd"} renders to 11 characters
        let body = json!({ "a": "bcd" });
        assert_eq!(canonical_body_len(body.as_object().unwrap()), 11);

        let at_limit = classify(&descriptor("/", &[], Some(body.clone())), 11);
        assert!(!at_limit.is_threat);

        let over_limit = classify(&descriptor("/", &[], Some(body)), 10);
        assert!(over_limit.is_threat);
    }

    #[test]
    fn canonical_rendering_sorts_nested_keys() {
        let a: Map<String, Value> =
            serde_json::from_str(r#"{"zeta":1,"alpha":{"y":2,"b":3}}"#).unwrap();
        assert_eq!(canonical_json(&a), r#"{"alpha":{"b":3,"y":2},"zeta":1}"#);
        assert_eq!(canonical_body_len(&a), 32);
    }

    #[test]
    fn canonical_length_counts_characters_not_bytes() {
        let body = json!({ "k": "ééé" });
        // {"k":"ééé"} is 11 characters but 14 bytes
        assert_eq!(canonical_body_len(body.as_object().unwrap()), 11);
    }

    #[test]
    fn empty_body_still_measured() {
        let verdict = classify(&descriptor("/", &[], Some(json!({}))), 1);
        assert!(verdict.is_threat);
        assert_eq!(
            verdict.details[&FindingCategory::BodySize],
            FindingDetail::Message("Body size 2 exceeds limit of 1".to_string())
        );
    }

    #[test]
    fn highest_vote_wins() {
        let body = json!({ "data": "y".repeat(500) });
        let verdict = classify(
            &descriptor("/bin/eval", &[("x-real-ip", "1.2.3.4")], Some(body)),
            100,
        );
        assert_eq!(verdict.threat_level, ThreatLevel::High);
        assert_eq!(verdict.details.len(), 3);
        assert_eq!(verdict.recommendations.len(), 3);
    }

    #[test]
    fn classification_is_deterministic() {
        let req = descriptor(
            "/x/../y",
            &[("x-forwarded-for", "1.2.3.4"), ("x-real-ip", "5.6.7.8")],
            Some(json!({ "b": [1, 2, 3], "a": null })),
        );
        assert_eq!(classify(&req, 5), classify(&req, 5));
    }
}
