//! Named predicates for `custom` lint rules.
//!
//! Predicates are registered at compile time with [`inventory::submit!`] and
//! looked up by name. An unknown name is reported by the engine as a failed
//! finding, never a panic.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde_json::{json, Value};

use crate::model::{AclAction, AclOrigin, CanonicalConfig, NatKind, NatRule, PolicyAction, SnmpVersion, Vendor};

/// Outcome of one predicate check.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredicateOutcome {
    pub passed: bool,
    pub message: Option<String>,
    pub path: Option<String>,
    pub value: Option<Value>,
}

impl PredicateOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    fn at(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Pass when `violations` is empty, otherwise fail listing them.
    fn from_violations(violations: Vec<String>, path: &str) -> Self {
        if violations.is_empty() {
            return Self::pass();
        }
        Self::fail(violations.join("; "))
            .at(path)
            .with_value(json!(violations))
    }
}

pub struct CustomPredicate {
    pub name: &'static str,
    pub description: &'static str,
    pub check: fn(&CanonicalConfig) -> PredicateOutcome,
}

impl CustomPredicate {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        check: fn(&CanonicalConfig) -> PredicateOutcome,
    ) -> Self {
        Self {
            name,
            description,
            check,
        }
    }
}

inventory::collect!(CustomPredicate);

static REGISTRY: LazyLock<BTreeMap<&'static str, &'static CustomPredicate>> = LazyLock::new(|| {
    inventory::iter::<CustomPredicate>
        .into_iter()
        .map(|p| (p.name, p))
        .collect()
});

pub fn lookup(name: &str) -> Option<&'static CustomPredicate> {
    REGISTRY.get(name).copied()
}

/// Every registered predicate, sorted by name.
pub fn registered() -> impl Iterator<Item = &'static CustomPredicate> {
    REGISTRY.values().copied()
}

fn is_any_token(value: &str) -> bool {
    matches!(
        value.trim().trim_matches('"').to_ascii_lowercase().as_str(),
        "any" | "all" | "0.0.0.0/0" | "::/0"
    )
}

/// An explicit wildcard selector. Absent selectors are not treated as any.
fn is_any(selector: Option<&str>) -> bool {
    selector.is_some_and(|s| s.split_whitespace().any(is_any_token))
}

fn any_any_policies(config: &CanonicalConfig) -> impl Iterator<Item = &crate::model::FirewallPolicy> {
    config.security.firewall_policies.iter().filter(|p| {
        p.enabled
            && is_any(p.src_addr.as_deref())
            && is_any(p.dst_addr.as_deref())
            && is_any(p.service.as_deref())
    })
}

fn no_vlan1_traffic(config: &CanonicalConfig) -> PredicateOutcome {
    let offenders: Vec<String> = config
        .interfaces
        .iter()
        .filter(|i| i.vlan_id == Some(1) || i.access_vlan == Some(1))
        .map(|i| format!("Interface {} uses VLAN 1", i.name))
        .collect();
    PredicateOutcome::from_violations(offenders, "$.interfaces")
}

fn ssh_enabled(config: &CanonicalConfig) -> PredicateOutcome {
    if config.mgmt.ssh.enabled {
        PredicateOutcome::pass()
    } else {
        PredicateOutcome::fail("SSH not enabled")
            .at("$.mgmt.ssh.enabled")
            .with_value(json!(false))
    }
}

fn ssh_version2(config: &CanonicalConfig) -> PredicateOutcome {
    let ssh = &config.mgmt.ssh;
    match ssh.version {
        _ if !ssh.enabled => PredicateOutcome::pass(),
        Some(2) => PredicateOutcome::pass(),
        other => PredicateOutcome::fail("SSH version 2 not enforced")
            .at("$.mgmt.ssh.version")
            .with_value(json!(other)),
    }
}

fn telnet_disabled(config: &CanonicalConfig) -> PredicateOutcome {
    if config.mgmt.telnet.enabled {
        PredicateOutcome::fail("Telnet is enabled")
            .at("$.mgmt.telnet.enabled")
            .with_value(json!(true))
    } else {
        PredicateOutcome::pass()
    }
}

fn snmp_v3_only(config: &CanonicalConfig) -> PredicateOutcome {
    let snmp = &config.mgmt.snmp;
    if !snmp.enabled || (snmp.version == Some(SnmpVersion::V3) && snmp.community_count == 0) {
        return PredicateOutcome::pass();
    }
    PredicateOutcome::fail("SNMP not v3 only")
        .at("$.mgmt.snmp.version")
        .with_value(json!(snmp.version))
}

fn snmp_community_not_default(config: &CanonicalConfig) -> PredicateOutcome {
    let snmp = &config.mgmt.snmp;
    if !snmp.enabled || !snmp.default_community {
        return PredicateOutcome::pass();
    }
    PredicateOutcome::fail("SNMP uses a default community string")
        .at("$.mgmt.snmp.defaultCommunity")
        .with_value(json!(true))
}

fn multiple_ntp_servers(config: &CanonicalConfig) -> PredicateOutcome {
    let count = config.mgmt.ntp.servers.len();
    if count >= 2 {
        PredicateOutcome::pass()
    } else {
        PredicateOutcome::fail(format!("NTP servers: {count}"))
            .at("$.mgmt.ntp.servers.length")
            .with_value(json!(count))
    }
}

fn syslog_configured(config: &CanonicalConfig) -> PredicateOutcome {
    if config.mgmt.syslog.servers.is_empty() {
        PredicateOutcome::fail("No remote syslog server")
            .at("$.mgmt.syslog.servers")
            .with_value(json!([]))
    } else {
        PredicateOutcome::pass()
    }
}

fn acl_has_explicit_deny(config: &CanonicalConfig) -> PredicateOutcome {
    let missing: Vec<String> = config
        .security
        .acls
        .iter()
        .filter(|acl| acl.origin != AclOrigin::Nat)
        .filter(|acl| acl.entries.last().map(|e| e.action) != Some(AclAction::Deny))
        .map(|acl| format!("ACL {} missing explicit deny", acl.name))
        .collect();
    PredicateOutcome::from_violations(missing, "$.security.acls")
}

fn any_any_policy_has_logging(config: &CanonicalConfig) -> PredicateOutcome {
    let violations = any_any_policies(config)
        .filter(|p| !p.log)
        .map(|p| format!("Policy {}: any-any without logging", p.id))
        .collect();
    PredicateOutcome::from_violations(violations, "$.security.firewallPolicies")
}

fn accept_all_restricted(config: &CanonicalConfig) -> PredicateOutcome {
    let violations = any_any_policies(config)
        .filter(|p| p.action == PolicyAction::Accept)
        .map(|p| format!("Policy {}: accept policy is overly permissive", p.id))
        .collect();
    PredicateOutcome::from_violations(violations, "$.security.firewallPolicies")
}

fn nat_overlaps(a: &NatRule, b: &NatRule) -> bool {
    if a.kind != b.kind || !a.enabled || !b.enabled {
        return false;
    }
    match a.kind {
        NatKind::Dnat => a.dst_addr == b.dst_addr && a.dst_port == b.dst_port,
        NatKind::Snat => a.src_addr == b.src_addr && a.translated_addr == b.translated_addr,
        NatKind::Masquerade => false,
    }
}

fn nat_no_overlap(config: &CanonicalConfig) -> PredicateOutcome {
    let rules = &config.security.nat_rules;
    let mut violations = Vec::new();
    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            if nat_overlaps(a, b) {
                violations.push(format!("NAT rules {} and {} may overlap", a.id, b.id));
            }
        }
    }
    PredicateOutcome::from_violations(violations, "$.security.natRules")
}

const WEAK_CRYPTO: [&str; 3] = ["des", "3des", "md5"];

fn vpn_strong_crypto(config: &CanonicalConfig) -> PredicateOutcome {
    let weak = |algo: &str| {
        let lower = algo.to_ascii_lowercase();
        WEAK_CRYPTO.iter().any(|w| lower.contains(w))
    };
    let mut violations = Vec::new();
    for tunnel in &config.security.vpn_tunnels {
        for enc in tunnel.proposal.encryption.iter().filter(|e| weak(e)) {
            violations.push(format!("VPN {}: weak encryption {enc}", tunnel.name));
        }
        for hash in tunnel.proposal.hash.iter().filter(|h| weak(h)) {
            violations.push(format!("VPN {}: weak hash {hash}", tunnel.name));
        }
    }
    PredicateOutcome::from_violations(violations, "$.security.vpnTunnels")
}

fn fortigate_only(
    config: &CanonicalConfig,
    check: fn(&CanonicalConfig) -> PredicateOutcome,
) -> PredicateOutcome {
    if config.device.vendor == Vendor::Fortigate {
        check(config)
    } else {
        PredicateOutcome::pass()
    }
}

fn fortigate_any_any_has_logging(config: &CanonicalConfig) -> PredicateOutcome {
    fortigate_only(config, any_any_policy_has_logging)
}

fn fortigate_accept_all_restricted(config: &CanonicalConfig) -> PredicateOutcome {
    fortigate_only(config, accept_all_restricted)
}

inventory::submit! {
    CustomPredicate::new("noVlan1Traffic", "No interface carries untagged traffic on VLAN 1", no_vlan1_traffic)
}
inventory::submit! {
    CustomPredicate::new("sshEnabled", "SSH management access is enabled", ssh_enabled)
}
inventory::submit! {
    CustomPredicate::new("sshVersion2", "SSH is restricted to protocol version 2", ssh_version2)
}
inventory::submit! {
    CustomPredicate::new("telnetDisabled", "Telnet management access is disabled", telnet_disabled)
}
inventory::submit! {
    CustomPredicate::new("snmpV3Only", "SNMP, when enabled, uses v3 without communities", snmp_v3_only)
}
inventory::submit! {
    CustomPredicate::new(
        "snmp_community_not_default",
        "No SNMP community is named public or private",
        snmp_community_not_default
    )
}
inventory::submit! {
    CustomPredicate::new("multipleNtpServers", "At least two NTP servers are configured", multiple_ntp_servers)
}
inventory::submit! {
    CustomPredicate::new("syslogConfigured", "A remote syslog server is configured", syslog_configured)
}
inventory::submit! {
    CustomPredicate::new(
        "aclHasExplicitDeny",
        "Every native and firewall-derived ACL ends with a deny",
        acl_has_explicit_deny
    )
}
inventory::submit! {
    CustomPredicate::new(
        "anyAnyPolicyHasLogging",
        "Any-to-any firewall policies have logging enabled",
        any_any_policy_has_logging
    )
}
inventory::submit! {
    CustomPredicate::new(
        "acceptAllRestricted",
        "No policy accepts any source to any destination on any service",
        accept_all_restricted
    )
}
inventory::submit! {
    CustomPredicate::new("natNoOverlap", "NAT rules of the same type do not overlap", nat_no_overlap)
}
inventory::submit! {
    CustomPredicate::new("vpnStrongCrypto", "VPN phase 1 avoids DES, 3DES and MD5", vpn_strong_crypto)
}
inventory::submit! {
    CustomPredicate::new(
        "fortigate_any_any_has_logging",
        "FortiGate only: any-to-any policies log",
        fortigate_any_any_has_logging
    )
}
inventory::submit! {
    CustomPredicate::new(
        "fortigate_accept_all_restricted",
        "FortiGate only: no accept-all policies",
        fortigate_accept_all_restricted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parser_for, VendorParser};

    fn parse(vendor: Vendor, raw: &str) -> CanonicalConfig {
        parser_for(vendor).parse(raw).normalized
    }

    fn check(name: &str, config: &CanonicalConfig) -> PredicateOutcome {
        (lookup(name).expect("registered").check)(config)
    }

    #[test]
    fn registry_holds_builtins() {
        let names: Vec<&str> = registered().map(|p| p.name).collect();
        for expected in [
            "noVlan1Traffic",
            "sshEnabled",
            "snmpV3Only",
            "multipleNtpServers",
            "aclHasExplicitDeny",
            "natNoOverlap",
            "vpnStrongCrypto",
            "fortigate_accept_all_restricted",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(lookup("doesNotExist").is_none());
    }

    #[test]
    fn vlan1_access_port_fails() {
        let config = parse(
            Vendor::Cisco,
            "hostname sw\ninterface GigabitEthernet0/1\n switchport mode access\n switchport access vlan 1\n",
        );
        let outcome = check("noVlan1Traffic", &config);
        assert!(!outcome.passed);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Interface GigabitEthernet0/1 uses VLAN 1")
        );
    }

    #[test]
    fn snmp_predicates_pass_when_snmp_disabled() {
        let config = parse(Vendor::Cisco, "hostname sw\ninterface GigabitEthernet0/1\n");
        assert!(check("snmpV3Only", &config).passed);
        assert!(check("snmp_community_not_default", &config).passed);
    }

    #[test]
    fn public_community_is_flagged() {
        let config = parse(
            Vendor::Cisco,
            "hostname sw\ninterface GigabitEthernet0/1\nsnmp-server community public RO\n",
        );
        assert!(!check("snmp_community_not_default", &config).passed);
        assert!(!check("snmpV3Only", &config).passed);
    }

    #[test]
    fn nat_acl_is_not_held_to_explicit_deny() {
        let config = parse(
            Vendor::Mikrotik,
            "/ip firewall nat\nadd action=masquerade chain=srcnat out-interface=ether1\n\
             /ip firewall filter\nadd action=accept chain=input protocol=icmp\nadd action=drop chain=input\n",
        );
        assert!(check("aclHasExplicitDeny", &config).passed);
    }

    #[test]
    fn fortigate_accept_all_detected_and_scoped() {
        let raw = "config firewall policy\n    edit 7\n        set srcaddr \"all\"\n        set dstaddr \"all\"\n        set service \"ALL\"\n        set action accept\n    next\nend\n";
        let config = parse(Vendor::Fortigate, raw);
        let outcome = check("fortigate_accept_all_restricted", &config);
        assert!(!outcome.passed);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Policy 7: accept policy is overly permissive")
        );
        assert!(!check("anyAnyPolicyHasLogging", &config).passed);

        let mikrotik = parse(Vendor::Mikrotik, "/ip firewall filter\nadd action=accept chain=input src-address=0.0.0.0/0\n");
        assert!(check("fortigate_accept_all_restricted", &mikrotik).passed);
    }

    #[test]
    fn overlapping_dnat_rules_fail() {
        let raw = "/ip firewall nat\n\
                   add action=dst-nat chain=dstnat dst-address=203.0.113.1 dst-port=443 protocol=tcp to-addresses=10.0.0.10\n\
                   add action=dst-nat chain=dstnat dst-address=203.0.113.1 dst-port=443 protocol=tcp to-addresses=10.0.0.11\n";
        let outcome = check("natNoOverlap", &parse(Vendor::Mikrotik, raw));
        assert!(!outcome.passed);
        assert_eq!(outcome.message.as_deref(), Some("NAT rules nat-1 and nat-2 may overlap"));
    }
}
