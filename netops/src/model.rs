//! Canonical, vendor-neutral configuration model.
//!
//! Every parser produces a [`CanonicalConfig`]; the lint engine and the change
//! workflow only ever look at this shape. Collections are plain vectors kept
//! in source order, so the same input always serializes to the same JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Supported device operating systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Mikrotik,
    Cisco,
    Fortigate,
}

impl Vendor {
    pub const ALL: [Vendor; 3] = [Vendor::Mikrotik, Vendor::Cisco, Vendor::Fortigate];

    pub fn as_str(self) -> &'static str {
        match self {
            Vendor::Mikrotik => "mikrotik",
            Vendor::Cisco => "cisco",
            Vendor::Fortigate => "fortigate",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vendor '{0}' (expected mikrotik, cisco or fortigate)")]
pub struct UnknownVendor(pub String);

impl FromStr for Vendor {
    type Err = UnknownVendor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mikrotik" | "routeros" => Ok(Vendor::Mikrotik),
            "cisco" | "ios" | "cisco-ios" => Ok(Vendor::Cisco),
            "fortigate" | "fortios" | "fortinet" => Ok(Vendor::Fortigate),
            _ => Err(UnknownVendor(s.to_string())),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Root of the normalized configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct CanonicalConfig {
    pub schema_version: String,
    pub device: DeviceInfo,
    pub interfaces: Vec<Interface>,
    pub vlans: Vec<Vlan>,
    pub routing: Routing,
    pub security: Security,
    pub mgmt: Management,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub vendor: Vendor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Physical,
    Bridge,
    Vlan,
    Aggregate,
    Loopback,
    Tunnel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    Ipv4,
    Ipv6,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpBinding {
    pub address: String,
    pub prefix: u8,
    pub family: IpFamily,
    #[serde(default, skip_serializing_if = "is_false")]
    pub secondary: bool,
}

impl IpBinding {
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchportMode {
    Access,
    Trunk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InterfaceKind,
    pub admin_up: bool,
    #[serde(default)]
    pub ips: Vec<IpBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<u16>,
    /// Parent interface for VLAN sub-interfaces and bridge members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_mode: Option<SwitchportMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_vlan: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trunk_vlans: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native_vlan: Option<u16>,
}

impl Interface {
    pub fn new(name: impl Into<String>, kind: InterfaceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            admin_up: true,
            ips: Vec::new(),
            vlan_id: None,
            parent: None,
            description: None,
            vlan_mode: None,
            access_vlan: None,
            trunk_vlans: Vec::new(),
            native_vlan: None,
        }
    }

    /// Add an address unless the same address/prefix is already bound.
    pub fn bind(&mut self, binding: IpBinding) {
        if !self
            .ips
            .iter()
            .any(|b| b.address == binding.address && b.prefix == binding.prefix)
        {
            self.ips.push(binding);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vlan {
    pub id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    #[serde(default)]
    pub static_routes: Vec<StaticRoute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ospf: Option<OspfConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bgp: Option<BgpConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rip: Option<RipConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticRoute {
    pub destination: String,
    pub prefix: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<u32>,
}

impl StaticRoute {
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.destination, self.prefix)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OspfConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    #[serde(default)]
    pub areas: Vec<OspfArea>,
}

impl OspfConfig {
    pub fn area_mut(&mut self, area_id: &str) -> &mut OspfArea {
        match self.areas.iter().position(|a| a.area_id == area_id) {
            Some(idx) => &mut self.areas[idx],
            None => {
                self.areas.push(OspfArea {
                    area_id: area_id.to_string(),
                    networks: Vec::new(),
                });
                let last = self.areas.len() - 1;
                &mut self.areas[last]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OspfArea {
    pub area_id: String,
    #[serde(default)]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BgpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_as: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_id: Option<String>,
    #[serde(default)]
    pub neighbors: Vec<BgpNeighbor>,
    #[serde(default)]
    pub networks: Vec<String>,
}

impl BgpConfig {
    pub fn neighbor_mut(&mut self, address: &str) -> &mut BgpNeighbor {
        match self.neighbors.iter().position(|n| n.address == address) {
            Some(idx) => &mut self.neighbors[idx],
            None => {
                self.neighbors.push(BgpNeighbor {
                    address: address.to_string(),
                    remote_as: None,
                    description: None,
                });
                let last = self.neighbors.len() - 1;
                &mut self.neighbors[last]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BgpNeighbor {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_as: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RipConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(default)]
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    #[serde(default)]
    pub firewall_policies: Vec<FirewallPolicy>,
    #[serde(default)]
    pub nat_rules: Vec<NatRule>,
    #[serde(default)]
    pub acls: Vec<Acl>,
    #[serde(default)]
    pub users: Vec<UserAccount>,
    #[serde(default)]
    pub vpn_tunnels: Vec<VpnTunnel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Accept,
    Drop,
    Reject,
    Deny,
}

impl PolicyAction {
    /// Map a vendor action keyword; anything unknown is treated as a deny.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "accept" | "allow" | "permit" | "fasttrack-connection" | "passthrough" => {
                PolicyAction::Accept
            }
            "drop" => PolicyAction::Drop,
            "reject" | "tarpit" => PolicyAction::Reject,
            _ => PolicyAction::Deny,
        }
    }

    pub fn acl_action(self) -> AclAction {
        match self {
            PolicyAction::Accept => AclAction::Permit,
            _ => AclAction::Deny,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallPolicy {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub action: PolicyAction,
    pub enabled: bool,
    pub log: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub nat: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl FirewallPolicy {
    pub fn new(id: impl Into<String>, action: PolicyAction) -> Self {
        Self {
            id: id.into(),
            name: None,
            src_zone: None,
            dst_zone: None,
            src_addr: None,
            dst_addr: None,
            service: None,
            action,
            enabled: true,
            log: false,
            nat: false,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatKind {
    Snat,
    Dnat,
    Masquerade,
}

impl fmt::Display for NatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NatKind::Snat => "snat",
            NatKind::Dnat => "dnat",
            NatKind::Masquerade => "masquerade",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NatRule {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: NatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_port: Option<String>,
    pub enabled: bool,
}

impl NatRule {
    pub fn new(id: impl Into<String>, kind: NatKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind,
            src_addr: None,
            dst_addr: None,
            dst_port: None,
            out_interface: None,
            translated_addr: None,
            translated_port: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclKind {
    Standard,
    Extended,
    Named,
}

/// Where an ACL came from: declared natively or synthesized from policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclOrigin {
    Native,
    Firewall,
    Nat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclAction {
    Permit,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AclKind,
    pub origin: AclOrigin,
    #[serde(default)]
    pub entries: Vec<AclEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclEntry {
    pub action: AclAction,
    pub source: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub log: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privilege: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Proposal {
    #[serde(default)]
    pub encryption: Vec<String>,
    #[serde(default)]
    pub hash: Vec<String>,
    #[serde(default)]
    pub dh_groups: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpnTunnel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_gateway: Option<String>,
    #[serde(default)]
    pub proposal: Phase1Proposal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshService {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelnetService {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SnmpVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v2c")]
    V2c,
    #[serde(rename = "v3")]
    V3,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnmpService {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<SnmpVersion>,
    /// Number of community strings configured. Community values are never kept.
    #[serde(default)]
    pub community_count: usize,
    /// A well-known community (`public`, `private`) was configured.
    #[serde(default, skip_serializing_if = "is_false")]
    pub default_community: bool,
}

impl SnmpService {
    /// Count a community without keeping its value.
    pub fn add_community(&mut self, name: &str) {
        self.community_count += 1;
        let name = name.trim().trim_matches('"');
        if name.eq_ignore_ascii_case("public") || name.eq_ignore_ascii_case("private") {
            self.default_community = true;
        }
    }

    /// Record a protocol version; v3 is never downgraded by a later community line.
    pub fn observe(&mut self, version: SnmpVersion) {
        self.enabled = true;
        self.version = Some(match self.version {
            Some(current) if current > version => current,
            _ => version,
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerList {
    pub enabled: bool,
    #[serde(default)]
    pub servers: Vec<String>,
}

impl ServerList {
    pub fn add(&mut self, server: &str) {
        let server = server.trim().trim_matches('"');
        if server.is_empty() {
            return;
        }
        self.enabled = true;
        if !self.servers.iter().any(|s| s == server) {
            self.servers.push(server.to_string());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Management {
    pub ssh: SshService,
    pub telnet: TelnetService,
    pub snmp: SnmpService,
    pub ntp: ServerList,
    pub syslog: ServerList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub raw_line_count: usize,
    pub parser_version: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl CanonicalConfig {
    pub(crate) fn new(vendor: Vendor, parser_version: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            device: DeviceInfo {
                hostname: None,
                vendor,
                model: None,
                os_version: None,
                domain: None,
            },
            interfaces: Vec::new(),
            vlans: Vec::new(),
            routing: Routing::default(),
            security: Security::default(),
            mgmt: Management::default(),
            metadata: Metadata {
                raw_line_count: 0,
                parser_version: parser_version.to_string(),
                warnings: Vec::new(),
            },
        }
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn vlan(&self, id: u16) -> Option<&Vlan> {
        self.vlans.iter().find(|v| v.id == id)
    }

    /// Fetch an interface by name, creating it with `kind` when absent.
    /// An existing interface keeps its kind.
    pub(crate) fn interface_entry(&mut self, name: &str, kind: InterfaceKind) -> &mut Interface {
        match self.interfaces.iter().position(|i| i.name == name) {
            Some(idx) => &mut self.interfaces[idx],
            None => {
                self.interfaces.push(Interface::new(name, kind));
                let last = self.interfaces.len() - 1;
                &mut self.interfaces[last]
            }
        }
    }

    /// Rename an interface, merging into an existing interface of the new name.
    pub(crate) fn rename_interface(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let Some(idx) = self.interfaces.iter().position(|i| i.name == from) else {
            return;
        };
        let mut moved = self.interfaces.remove(idx);
        moved.name = to.to_string();
        match self.interfaces.iter_mut().find(|i| i.name == to) {
            Some(existing) => {
                for ip in moved.ips {
                    existing.bind(ip);
                }
                existing.description = existing.description.take().or(moved.description);
                existing.vlan_id = existing.vlan_id.or(moved.vlan_id);
                existing.parent = existing.parent.take().or(moved.parent);
            }
            None => self.interfaces.insert(idx, moved),
        }
    }

    /// Insert or merge a VLAN. The first name seen wins; gateways accumulate.
    pub(crate) fn upsert_vlan(&mut self, id: u16, name: Option<&str>, gateway: Option<&str>) {
        let vlan = match self.vlans.iter().position(|v| v.id == id) {
            Some(idx) => &mut self.vlans[idx],
            None => {
                self.vlans.push(Vlan {
                    id,
                    name: None,
                    gateways: Vec::new(),
                });
                let last = self.vlans.len() - 1;
                &mut self.vlans[last]
            }
        };
        if vlan.name.is_none() {
            vlan.name = name.map(str::to_string);
        }
        if let Some(gateway) = gateway {
            if !vlan.gateways.iter().any(|g| g == gateway) {
                vlan.gateways.push(gateway.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_parses_aliases() {
        assert_eq!("RouterOS".parse::<Vendor>(), Ok(Vendor::Mikrotik));
        assert_eq!("ios".parse::<Vendor>(), Ok(Vendor::Cisco));
        assert_eq!("fortios".parse::<Vendor>(), Ok(Vendor::Fortigate));
        assert!("junos".parse::<Vendor>().is_err());
    }

    #[test]
    fn upsert_vlan_keeps_first_name_and_unions_gateways() {
        let mut config = CanonicalConfig::new(Vendor::Cisco, "test");
        config.upsert_vlan(10, Some("users"), None);
        config.upsert_vlan(10, Some("other"), Some("10.0.10.1"));
        config.upsert_vlan(10, None, Some("10.0.10.1"));
        assert_eq!(config.vlans.len(), 1);
        assert_eq!(config.vlans[0].name.as_deref(), Some("users"));
        assert_eq!(config.vlans[0].gateways, vec!["10.0.10.1"]);
    }

    #[test]
    fn rename_merges_into_existing_interface() {
        let mut config = CanonicalConfig::new(Vendor::Mikrotik, "test");
        config
            .interface_entry("ether1", InterfaceKind::Physical)
            .description = Some("uplink".to_string());
        config.interface_entry("wan", InterfaceKind::Physical).bind(IpBinding {
            address: "192.0.2.2".to_string(),
            prefix: 30,
            family: IpFamily::Ipv4,
            secondary: false,
        });
        config.rename_interface("ether1", "wan");
        assert_eq!(config.interfaces.len(), 1);
        let wan = config.interface("wan").expect("wan");
        assert_eq!(wan.description.as_deref(), Some("uplink"));
        assert_eq!(wan.ips.len(), 1);
    }

    #[test]
    fn snmp_observe_never_downgrades() {
        let mut snmp = SnmpService::default();
        snmp.observe(SnmpVersion::V3);
        snmp.observe(SnmpVersion::V2c);
        assert_eq!(snmp.version, Some(SnmpVersion::V3));
        assert!(snmp.enabled);
    }

    #[test]
    fn serialization_uses_camel_case_and_skips_absent_fields() {
        let config = CanonicalConfig::new(Vendor::Mikrotik, "1.0.0");
        let json = serde_json::to_value(&config).expect("json");
        assert_eq!(json["schemaVersion"], "1.0.0");
        assert_eq!(json["device"]["vendor"], "mikrotik");
        assert!(json["device"].get("hostname").is_none());
        assert_eq!(json["mgmt"]["ssh"]["enabled"], false);
        assert!(json["mgmt"]["ssh"].get("version").is_none());
    }
}
