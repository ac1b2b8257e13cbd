//! Request descriptor and threat verdict DTOs for the security check endpoint.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

/// Normalized description of a request the Express server wants analyzed.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequestDescriptor {
    #[validate(length(min = 1, message = "method must not be empty"))]
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Map<String, Value>>,
}

/// Ordinal severity of a verdict: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ThreatLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// The fixed set of checks that can contribute a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    BodySize,
    SuspiciousHeaders,
    SuspiciousPath,
}

impl FindingCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BodySize => "body_size",
            Self::SuspiciousHeaders => "suspicious_headers",
            Self::SuspiciousPath => "suspicious_path",
        }
    }

    /// Key under which this category's remediation hint is reported.
    pub fn recommendation_key(self) -> &'static str {
        match self {
            Self::BodySize => "body_size",
            Self::SuspiciousHeaders => "headers",
            Self::SuspiciousPath => "path",
        }
    }

    /// Static remediation hint for this category.
    pub fn recommendation(self) -> &'static str {
        match self {
            Self::BodySize => {
                "Consider implementing request size limits at the reverse proxy level"
            }
            Self::SuspiciousHeaders => {
                "Review and sanitize incoming headers, consider implementing a whitelist"
            }
            Self::SuspiciousPath => {
                "Implement strict path validation and consider using a web application firewall"
            }
        }
    }
}

/// Detail recorded for one finding.
///
/// Header findings list every matched header; the other categories carry a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindingDetail {
    Message(String),
    Headers(BTreeMap<String, String>),
}

/// Result of classifying a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatVerdict {
    pub is_threat: bool,
    pub threat_level: ThreatLevel,
    pub details: BTreeMap<FindingCategory, FindingDetail>,
    pub recommendations: BTreeMap<String, String>,
}

impl ThreatVerdict {
    /// Verdict for a request with no findings.
    pub fn clean() -> Self {
        Self {
            is_threat: false,
            threat_level: ThreatLevel::Low,
            details: BTreeMap::new(),
            recommendations: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn threat_level_ordering() {
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::Medium < ThreatLevel::High);
        assert_eq!(ThreatLevel::default(), ThreatLevel::Low);
    }

    #[test]
    fn verdict_serializes_with_snake_case_categories() {
        let mut verdict = ThreatVerdict::clean();
        verdict.is_threat = true;
        verdict.threat_level = ThreatLevel::High;
        verdict.details.insert(
            FindingCategory::SuspiciousPath,
            FindingDetail::Message("Suspicious path pattern detected: /cmd".into()),
        );
        verdict.details.insert(
            FindingCategory::SuspiciousHeaders,
            FindingDetail::Headers(BTreeMap::from([(
                "x-real-ip".to_string(),
                "Potentially dangerous header detected".to_string(),
            )])),
        );

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["threat_level"], "High");
        assert_eq!(
            json["details"]["suspicious_path"],
            "Suspicious path pattern detected: /cmd"
        );
        assert_eq!(
            json["details"]["suspicious_headers"]["x-real-ip"],
            "Potentially dangerous header detected"
        );
    }

    #[test]
    fn descriptor_requires_headers_and_path() {
        let missing_headers = json!({ "method": "GET", "path": "/" });
        assert!(serde_json::from_value::<RequestDescriptor>(missing_headers).is_err());

        let missing_path = json!({ "method": "GET", "headers": {} });
        assert!(serde_json::from_value::<RequestDescriptor>(missing_path).is_err());
    }

    #[test]
    fn descriptor_body_defaults_to_none() {
        let req: RequestDescriptor =
            serde_json::from_value(json!({ "method": "GET", "path": "/", "headers": {} }))
                .unwrap();
        assert!(req.body.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn descriptor_accepts_empty_path() {
        let req: RequestDescriptor =
            serde_json::from_value(json!({ "method": "GET", "path": "", "headers": {} }))
                .unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn descriptor_rejects_empty_method() {
        let req: RequestDescriptor =
            serde_json::from_value(json!({ "method": "", "path": "/", "headers": {} }))
                .unwrap();
        assert!(req.validate().is_err());
    }
}
