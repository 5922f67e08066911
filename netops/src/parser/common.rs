//! Helpers shared by the vendor parsers: address math, VLAN ranges,
//! key/value tokenizing and the post-parse normalization pass.

use std::net::{IpAddr, Ipv4Addr};

use crate::model::{
    Acl, AclEntry, AclKind, AclOrigin, AclAction, CanonicalConfig, IpBinding, IpFamily, NatKind,
    Vendor,
};
use crate::parser::{ParseError, ParseResult};

pub const MAX_VLAN_ID: u16 = 4094;

/// Accumulates parser output. Errors never stop a parse.
pub(crate) struct ParseState {
    pub config: CanonicalConfig,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<String>,
}

impl ParseState {
    pub fn new(vendor: Vendor, parser_version: &str) -> Self {
        Self {
            config: CanonicalConfig::new(vendor, parser_version),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn error(&mut self, line: usize, message: impl Into<String>) {
        self.errors.push(ParseError {
            line,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Run the shared normalization pass and package the result.
    pub fn finish(mut self, raw: &str) -> ParseResult {
        let raw_line_count = raw.lines().count();
        link_vlan_gateways(&mut self.config);
        synthesize_acls(&mut self.config);
        self.config.metadata.raw_line_count = raw_line_count;
        self.config.metadata.warnings = self.warnings.clone();
        ParseResult {
            normalized: self.config,
            errors: self.errors,
            warnings: self.warnings,
            raw_line_count,
        }
    }
}

/// Parse `addr/prefix` (or a bare host address) into a binding.
pub fn parse_cidr(value: &str) -> Option<IpBinding> {
    let value = value.trim().trim_matches('"');
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };
    let ip: IpAddr = addr.parse().ok()?;
    let (family, max) = match ip {
        IpAddr::V4(_) => (IpFamily::Ipv4, 32u8),
        IpAddr::V6(_) => (IpFamily::Ipv6, 128u8),
    };
    let prefix = match prefix {
        Some(p) => p.parse::<u8>().ok().filter(|p| *p <= max)?,
        None => max,
    };
    Some(IpBinding {
        address: ip.to_string(),
        prefix,
        family,
        secondary: false,
    })
}

/// Convert a dotted netmask (`255.255.255.0`) to a prefix length.
pub fn mask_to_prefix(mask: &str) -> Option<u8> {
    let mask: Ipv4Addr = mask.trim().parse().ok()?;
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    // Non-contiguous masks are rejected.
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return None;
    }
    u8::try_from(ones).ok()
}

/// Convert a wildcard mask (`0.0.0.255`) to a prefix length.
pub fn wildcard_to_prefix(wildcard: &str) -> Option<u8> {
    let wildcard: Ipv4Addr = wildcard.trim().parse().ok()?;
    mask_to_prefix(&Ipv4Addr::from(!u32::from(wildcard)).to_string())
}

pub fn prefix_to_mask(prefix: u8) -> String {
    let bits = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix.min(32)))
    };
    Ipv4Addr::from(bits).to_string()
}

pub fn prefix_to_wildcard(prefix: u8) -> String {
    let mask: Ipv4Addr = prefix_to_mask(prefix)
        .parse()
        .unwrap_or(Ipv4Addr::UNSPECIFIED);
    Ipv4Addr::from(!u32::from(mask)).to_string()
}

/// Network address of `addr/prefix` for IPv4, or `None` for anything else.
pub fn network_of(addr: &str, prefix: u8) -> Option<Ipv4Addr> {
    let ip: Ipv4Addr = addr.parse().ok()?;
    let mask: Ipv4Addr = prefix_to_mask(prefix).parse().ok()?;
    Some(Ipv4Addr::from(u32::from(ip) & u32::from(mask)))
}

/// Whether `addr` falls inside `network/prefix` (IPv4 only).
pub fn ipv4_in_subnet(addr: &str, network: &str, prefix: u8) -> bool {
    match (network_of(addr, prefix), network_of(network, prefix)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn parse_vlan_id(value: &str) -> Result<u16, String> {
    let id: u16 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid VLAN id '{}'", value.trim()))?;
    if (1..=MAX_VLAN_ID).contains(&id) {
        Ok(id)
    } else {
        Err(format!("VLAN id {id} outside 1-{MAX_VLAN_ID}"))
    }
}

/// Expand a list such as `10,20-22` into individual ids.
pub fn expand_vlan_range(value: &str) -> Result<Vec<u16>, String> {
    let mut ids = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                let start = parse_vlan_id(start)?;
                let end = parse_vlan_id(end)?;
                if start > end {
                    return Err(format!("descending VLAN range '{part}'"));
                }
                ids.extend(start..=end);
            }
            None => ids.push(parse_vlan_id(part)?),
        }
    }
    if ids.is_empty() {
        return Err(format!("empty VLAN list '{value}'"));
    }
    Ok(ids)
}

/// Split a line into whitespace-separated words, keeping double-quoted
/// runs (including `key="a b"`) and bracket groups intact.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0usize;
    let mut escaped = false;
    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            ']' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// A RouterOS-style command: `verb [find k=v] positional k=v ...`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KvCommand {
    pub verb: Option<String>,
    pub find: Vec<(String, String)>,
    pub positional: Vec<String>,
    pub pairs: Vec<(String, String)>,
}

impl KvCommand {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn find_value(&self, key: &str) -> Option<&str> {
        self.find
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_yes(&self, key: &str) -> bool {
        matches!(self.get(key), Some("yes" | "true"))
    }
}

pub fn parse_kv_command(body: &str) -> KvCommand {
    let mut command = KvCommand::default();
    for (idx, word) in split_words(body).into_iter().enumerate() {
        if let Some(inner) = word.strip_prefix('[') {
            let inner = inner.strip_suffix(']').unwrap_or(inner);
            for token in split_words(inner) {
                if let Some((k, v)) = token.split_once('=') {
                    command.find.push((k.to_string(), v.to_string()));
                }
            }
        } else if let Some((k, v)) = word.split_once('=') {
            command.pairs.push((k.to_string(), v.to_string()));
        } else if idx == 0 {
            command.verb = Some(word.to_ascii_lowercase());
        } else {
            command.positional.push(word);
        }
    }
    command
}

/// Attach VLAN sub-interface addresses as gateways of their VLAN.
fn link_vlan_gateways(config: &mut CanonicalConfig) {
    let links: Vec<(u16, String)> = config
        .interfaces
        .iter()
        .filter_map(|iface| iface.vlan_id.map(|id| (id, iface)))
        .flat_map(|(id, iface)| iface.ips.iter().map(move |ip| (id, ip.address.clone())))
        .collect();
    for (id, gateway) in links {
        config.upsert_vlan(id, None, Some(&gateway));
    }
}

/// Derive ACL views from firewall policies and NAT rules so ACL-oriented
/// checks see every vendor the same way.
fn synthesize_acls(config: &mut CanonicalConfig) {
    let vendor = config.device.vendor;
    if !config.security.firewall_policies.is_empty() {
        let name = match vendor {
            Vendor::Mikrotik => "filter-input",
            _ => "firewall-policy",
        };
        let entries = config
            .security
            .firewall_policies
            .iter()
            .filter(|p| p.enabled)
            .map(|p| AclEntry {
                action: p.action.acl_action(),
                source: p.src_addr.clone().unwrap_or_else(|| "any".to_string()),
                destination: p.dst_addr.clone().unwrap_or_else(|| "any".to_string()),
                protocol: p.service.clone(),
                port: None,
                log: p.log,
            })
            .collect();
        config.security.acls.push(Acl {
            name: name.to_string(),
            kind: AclKind::Named,
            origin: AclOrigin::Firewall,
            entries,
        });
    }
    if !config.security.nat_rules.is_empty() {
        let entries = config
            .security
            .nat_rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| AclEntry {
                action: AclAction::Permit,
                source: r.src_addr.clone().unwrap_or_else(|| "any".to_string()),
                destination: match r.kind {
                    NatKind::Dnat => r.dst_addr.clone().unwrap_or_else(|| "any".to_string()),
                    _ => r.translated_addr.clone().unwrap_or_else(|| "any".to_string()),
                },
                protocol: None,
                port: r.dst_port.clone(),
                log: false,
            })
            .collect();
        config.security.acls.push(Acl {
            name: "nat-srcnat".to_string(),
            kind: AclKind::Named,
            origin: AclOrigin::Nat,
            entries,
        });
    }
}
