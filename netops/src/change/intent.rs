use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::model::{IpFamily, NatKind, PolicyAction};
use crate::parser::common::{parse_cidr, MAX_VLAN_ID};
use crate::settings::WorkflowSettings;

/// The declarative delta a change request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    AddVlan {
        id: u16,
        #[serde(default)]
        name: Option<String>,
        /// Gateway address in CIDR form, bound to the new VLAN interface.
        #[serde(default)]
        gateway: Option<String>,
        #[serde(default)]
        parent_interface: Option<String>,
    },
    RemoveVlan {
        id: u16,
    },
    AddStaticRoute {
        destination: String,
        next_hop: String,
    },
    RemoveStaticRoute {
        destination: String,
        #[serde(default)]
        next_hop: Option<String>,
    },
    AddFirewallRule {
        action: PolicyAction,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        destination: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        comment: Option<String>,
    },
    AddNatRule {
        kind: NatKind,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        destination: Option<String>,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        out_interface: Option<String>,
        #[serde(default)]
        translated_address: Option<String>,
        #[serde(default)]
        translated_port: Option<u16>,
    },
    ShutdownInterface {
        interface: String,
    },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::AddVlan { .. } => "addVlan",
            Intent::RemoveVlan { .. } => "removeVlan",
            Intent::AddStaticRoute { .. } => "addStaticRoute",
            Intent::RemoveStaticRoute { .. } => "removeStaticRoute",
            Intent::AddFirewallRule { .. } => "addFirewallRule",
            Intent::AddNatRule { .. } => "addNatRule",
            Intent::ShutdownInterface { .. } => "shutdownInterface",
        }
    }

    /// Risk of the intent itself, before scope is considered.
    pub fn base_risk(&self) -> RiskTier {
        match self {
            Intent::AddVlan { .. }
            | Intent::RemoveVlan { .. }
            | Intent::AddStaticRoute { .. }
            | Intent::RemoveStaticRoute { .. } => RiskTier::Low,
            Intent::AddFirewallRule { .. } | Intent::AddNatRule { .. } => RiskTier::Medium,
            Intent::ShutdownInterface { .. } => RiskTier::High,
        }
    }

    /// Check parameters that do not depend on any device.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Intent::AddVlan { id, name, gateway, .. } => {
                check_vlan_id(*id)?;
                if let Some(name) = name {
                    check_token("name", name)?;
                }
                if let Some(gateway) = gateway {
                    let binding = ipv4_cidr("gateway", gateway)?;
                    if !gateway.contains('/') || binding.prefix >= 31 {
                        return Err(format!("gateway '{gateway}' must carry a subnet prefix below /31"));
                    }
                }
                Ok(())
            }
            Intent::RemoveVlan { id } => check_vlan_id(*id),
            Intent::AddStaticRoute {
                destination,
                next_hop,
            } => {
                ipv4_cidr("destination", destination)?;
                ipv4_host("nextHop", next_hop)
            }
            Intent::RemoveStaticRoute {
                destination,
                next_hop,
            } => {
                ipv4_cidr("destination", destination)?;
                next_hop
                    .as_deref()
                    .map_or(Ok(()), |nh| ipv4_host("nextHop", nh))
            }
            Intent::AddFirewallRule {
                source,
                destination,
                protocol,
                port,
                comment,
                ..
            } => {
                optional_cidr("source", source.as_deref())?;
                optional_cidr("destination", destination.as_deref())?;
                if let Some(protocol) = protocol {
                    check_protocol(protocol)?;
                }
                if port.is_some() && !matches!(protocol.as_deref(), Some("tcp" | "udp")) {
                    return Err("port requires protocol tcp or udp".to_string());
                }
                if let Some(comment) = comment {
                    check_token("comment", comment)?;
                }
                Ok(())
            }
            Intent::AddNatRule {
                kind,
                source,
                destination,
                protocol,
                port,
                translated_address,
                ..
            } => {
                optional_cidr("source", source.as_deref())?;
                if let Some(protocol) = protocol {
                    check_protocol(protocol)?;
                }
                if let Some(addr) = translated_address {
                    ipv4_host("translatedAddress", addr)?;
                }
                match kind {
                    NatKind::Dnat => {
                        ipv4_host("destination", destination.as_deref().unwrap_or_default())?;
                        if translated_address.is_none() {
                            return Err("dnat requires translatedAddress".to_string());
                        }
                        if port.is_none() {
                            return Err("dnat requires port".to_string());
                        }
                        Ok(())
                    }
                    NatKind::Snat if translated_address.is_none() => {
                        Err("snat requires translatedAddress".to_string())
                    }
                    NatKind::Snat if source.is_none() => Err("snat requires source".to_string()),
                    _ => Ok(()),
                }
            }
            Intent::ShutdownInterface { interface } => check_token("interface", interface),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::AddVlan { id, .. } => write!(f, "add VLAN {id}"),
            Intent::RemoveVlan { id } => write!(f, "remove VLAN {id}"),
            Intent::AddStaticRoute {
                destination,
                next_hop,
            } => write!(f, "add route {destination} via {next_hop}"),
            Intent::RemoveStaticRoute { destination, .. } => write!(f, "remove route {destination}"),
            Intent::AddFirewallRule { action, .. } => write!(f, "add firewall rule ({action:?})"),
            Intent::AddNatRule { kind, .. } => write!(f, "add {kind} rule"),
            Intent::ShutdownInterface { interface } => write!(f, "shut down {interface}"),
        }
    }
}

fn check_vlan_id(id: u16) -> Result<(), String> {
    if (1..=MAX_VLAN_ID).contains(&id) {
        Ok(())
    } else {
        Err(format!("VLAN id {id} outside 1-{MAX_VLAN_ID}"))
    }
}

/// Values are spliced into vendor command lines, so quoting characters and
/// line breaks are refused.
fn check_token(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if value.chars().any(|c| matches!(c, '"' | '\'' | '\n' | '\r' | '[' | ']' | ';')) {
        return Err(format!("{field} '{value}' contains characters that cannot be rendered"));
    }
    Ok(())
}

fn check_protocol(protocol: &str) -> Result<(), String> {
    match protocol {
        "tcp" | "udp" | "icmp" | "ip" => Ok(()),
        other => Err(format!("unsupported protocol '{other}'")),
    }
}

fn ipv4_cidr(field: &str, value: &str) -> Result<crate::model::IpBinding, String> {
    match parse_cidr(value) {
        Some(binding) if binding.family == IpFamily::Ipv4 => Ok(binding),
        _ => Err(format!("{field} '{value}' is not an IPv4 address or CIDR")),
    }
}

fn optional_cidr(field: &str, value: Option<&str>) -> Result<(), String> {
    value.map_or(Ok(()), |v| ipv4_cidr(field, v).map(|_| ()))
}

fn ipv4_host(field: &str, value: &str) -> Result<(), String> {
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| format!("{field} '{value}' is not an IPv4 address"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        })
    }
}

/// Risk from intent type, escalated to high for bulk scopes.
pub fn assess_risk(intent: &Intent, scope_len: usize, settings: &WorkflowSettings) -> RiskTier {
    if scope_len > settings.bulk_device_threshold {
        RiskTier::High
    } else {
        intent.base_risk()
    }
}

pub fn required_approvals(tier: RiskTier, settings: &WorkflowSettings) -> u32 {
    match tier {
        RiskTier::Low => 1,
        RiskTier::Medium => settings.medium_risk_approvals.max(2),
        RiskTier::High => settings.high_risk_approvals.max(2),
    }
}
