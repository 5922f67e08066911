//! Vendor configuration parsers.
//!
//! Each parser turns raw configuration text into a [`CanonicalConfig`]. Parsing
//! is total: malformed lines become [`ParseError`]s and the parse carries on,
//! so callers always get a (possibly partial) normalized config back.

pub mod cisco;
pub(crate) mod common;
pub mod fortigate;
pub mod mikrotik;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{CanonicalConfig, Vendor};

pub use cisco::CiscoParser;
pub use fortigate::FortigateParser;
pub use mikrotik::MikrotikParser;

/// A line-level problem found while parsing. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub normalized: CanonicalConfig,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<String>,
    pub raw_line_count: usize,
}

/// Input did not look like the requested dialect at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input does not look like a {vendor} configuration")]
pub struct UnsupportedDialect {
    pub vendor: Vendor,
}

/// One implementation per supported operating system.
pub trait VendorParser: Send + Sync {
    fn vendor(&self) -> Vendor;

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Cheap sniff for dialect markers; does not parse.
    fn can_parse(&self, raw: &str) -> bool;

    /// Parse `raw` into canonical form. Never fails; problems are reported
    /// in [`ParseResult::errors`].
    fn parse(&self, raw: &str) -> ParseResult;
}

static MIKROTIK: MikrotikParser = MikrotikParser;
static CISCO: CiscoParser = CiscoParser;
static FORTIGATE: FortigateParser = FortigateParser;

pub fn parser_for(vendor: Vendor) -> &'static dyn VendorParser {
    match vendor {
        Vendor::Mikrotik => &MIKROTIK,
        Vendor::Cisco => &CISCO,
        Vendor::Fortigate => &FORTIGATE,
    }
}

/// Parse text as `vendor`, refusing input that carries none of its markers.
pub fn parse_config(vendor: Vendor, raw: &str) -> Result<ParseResult, UnsupportedDialect> {
    let parser = parser_for(vendor);
    if !parser.can_parse(raw) {
        return Err(UnsupportedDialect { vendor });
    }
    let result = parser.parse(raw);
    debug!(
        vendor = %vendor,
        lines = result.raw_line_count,
        errors = result.errors.len(),
        interfaces = result.normalized.interfaces.len(),
        "parsed configuration"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GARBAGE: &[&str] = &[
        "",
        "\n\n\n",
        "\u{0}\u{1}\u{2}binary\u{7f}",
        "/ip address\nadd\nadd address=\nadd interface=\n/interface vlan add vlan-id=99999",
        "interface\n ip address\n ip address 1.2.3.4\nvlan\nvlan abc\n name\nrouter ospf\n network",
        "config\nedit\nset\nnext\nend\nend\nend",
        "config system interface\n    edit \"port1\"\n        set ip 300.1.1.1 255.255.255.0\n",
        "/system identity set name=\"unterminated\n/ip route add dst-address=10.0.0.0/99",
        "ñ/ü ✓ [[[ ]]] \"\"\" === \\",
    ];

    #[test]
    fn every_parser_is_total_over_garbage() {
        for vendor in Vendor::ALL {
            let parser = parser_for(vendor);
            for input in GARBAGE {
                let result = parser.parse(input);
                assert_eq!(result.normalized.device.vendor, vendor);
                assert_eq!(result.raw_line_count, input.lines().count());
                assert_eq!(result.normalized.metadata.raw_line_count, result.raw_line_count);
            }
        }
    }

    #[test]
    fn parse_config_rejects_foreign_dialect() {
        let err = parse_config(Vendor::Fortigate, "/system identity\nset name=r1\n")
            .expect_err("mikrotik text is not fortigate");
        assert_eq!(err.vendor, Vendor::Fortigate);
    }

    #[test]
    fn reparsing_serialized_output_is_stable() {
        let inputs = [
            (Vendor::Mikrotik, include_str!("../../../fixtures/mikrotik-edge.rsc")),
            (Vendor::Cisco, include_str!("../../../fixtures/cisco-core.cfg")),
            (Vendor::Fortigate, include_str!("../../../fixtures/fortigate-fw.conf")),
        ];
        for (vendor, raw) in inputs {
            let first = parse_config(vendor, raw).expect("parse");
            let second = parse_config(vendor, raw).expect("parse again");
            assert_eq!(
                serde_json::to_string(&first.normalized).expect("json"),
                serde_json::to_string(&second.normalized).expect("json")
            );
            assert!(first.errors.is_empty(), "{vendor}: {:?}", first.errors);
        }
    }
}
