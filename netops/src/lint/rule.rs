use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Vendor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Exists,
    NotExists,
    NotEmpty,
    Equals,
    NotEquals,
    GreaterThan,
    Contains,
    NotContains,
    Matches,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleCheck {
    Match {
        path: String,
        condition: Condition,
    },
    Custom {
        #[serde(rename = "customPredicate")]
        custom_predicate: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Empty means every vendor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_scope: Vec<Vendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    #[serde(flatten)]
    pub check: RuleCheck,
}

fn default_enabled() -> bool {
    true
}

impl LintRule {
    pub fn applies_to(&self, vendor: Vendor) -> bool {
        self.vendor_scope.is_empty() || self.vendor_scope.contains(&vendor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn match_rule_deserializes_from_json() {
        let rule: LintRule = serde_json::from_value(json!({
            "id": "ssh-v2",
            "name": "SSH version 2",
            "severity": "high",
            "type": "match",
            "path": "$.mgmt.ssh.version",
            "condition": { "operator": "equals", "value": 2 }
        }))
        .expect("rule");
        assert!(rule.enabled);
        assert_eq!(
            rule.check,
            RuleCheck::Match {
                path: "$.mgmt.ssh.version".to_string(),
                condition: Condition {
                    operator: Operator::Equals,
                    value: Some(json!(2)),
                },
            }
        );
    }

    #[test]
    fn custom_rule_deserializes_from_toml() {
        let rule: LintRule = toml::from_str(
            r#"
id = "ntp"
name = "Redundant NTP"
severity = "low"
enabled = false
vendorScope = ["cisco"]
type = "custom"
customPredicate = "multipleNtpServers"
"#,
        )
        .expect("rule");
        assert!(!rule.enabled);
        assert!(rule.applies_to(Vendor::Cisco));
        assert!(!rule.applies_to(Vendor::Mikrotik));
        assert_eq!(
            rule.check,
            RuleCheck::Custom {
                custom_predicate: "multipleNtpServers".to_string()
            }
        );
    }
}
