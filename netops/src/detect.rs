use serde::Serialize;

use crate::model::Vendor;
use crate::parser::parser_for;

/// Order in which dialects are sniffed; the first match wins.
pub const DETECTION_ORDER: [Vendor; 3] = [Vendor::Mikrotik, Vendor::Fortigate, Vendor::Cisco];

/// Detected dialect with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialectDetection {
    pub vendor: Option<Vendor>,
    /// Every dialect whose markers matched, in detection order.
    pub candidates: Vec<Vendor>,
    pub confidence: String,
}

/// Return the first dialect whose markers match.
pub fn detect_vendor(raw: &str) -> Option<Vendor> {
    DETECTION_ORDER
        .into_iter()
        .find(|vendor| parser_for(*vendor).can_parse(raw))
}

/// Detect the dialect, reporting ambiguity when more than one matches.
pub fn detect_dialect(raw: &str) -> DialectDetection {
    let candidates: Vec<Vendor> = DETECTION_ORDER
        .into_iter()
        .filter(|vendor| parser_for(*vendor).can_parse(raw))
        .collect();
    let confidence = match candidates.len() {
        0 => "none",
        1 => "high",
        _ => "low",
    }
    .to_string();
    DialectDetection {
        vendor: candidates.first().copied(),
        candidates,
        confidence,
    }
}
