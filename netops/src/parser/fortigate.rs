//! FortiGate (FortiOS) `show full-configuration` parser.
//!
//! FortiOS nests `config <path>` / `edit <name>` / `set <key> <values>` /
//! `next` / `end` blocks. Each completed block (an `edit` closed by `next`,
//! or the settings of a `config` closed by `end`) is handed to
//! [`apply_block`] with its full section path.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    FirewallPolicy, InterfaceKind, NatKind, NatRule, Phase1Proposal, PolicyAction, SnmpVersion,
    StaticRoute, UserAccount, Vendor, VpnTunnel,
};
use crate::parser::common::{mask_to_prefix, parse_cidr, parse_vlan_id, split_words, ParseState};
use crate::parser::{ParseResult, VendorParser};

static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(config\s+(system|firewall|router|vpn|user|log)\s+\S+|#config-version=FG)")
        .expect("fortigate marker regex")
});

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#config-version=(\w+)-(\d+(?:\.\d+)*)").expect("fortigate version regex")
});

pub struct FortigateParser;

/// A completed `edit` (or section-level settings) block.
#[derive(Debug, Default)]
pub(crate) struct Block {
    pub section: String,
    pub edit: Option<String>,
    pub line: usize,
    pub values: BTreeMap<String, Vec<String>>,
}

impl Block {
    pub fn one(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn joined(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.join(" "))
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.values.get(key).cloned().unwrap_or_default()
    }

    pub fn enabled(&self, key: &str) -> Option<bool> {
        self.one(key).map(|v| v == "enable")
    }
}

struct Frame {
    path: String,
    block: Block,
}

impl Frame {
    fn flush(&mut self) -> Option<Block> {
        if self.block.edit.is_none() && self.block.values.is_empty() {
            return None;
        }
        let section = self.path.clone();
        let line = self.block.line;
        Some(std::mem::replace(
            &mut self.block,
            Block {
                section,
                line,
                ..Block::default()
            },
        ))
    }
}

impl VendorParser for FortigateParser {
    fn vendor(&self) -> Vendor {
        Vendor::Fortigate
    }

    fn can_parse(&self, raw: &str) -> bool {
        MARKERS.is_match(raw)
    }

    fn parse(&self, raw: &str) -> ParseResult {
        let mut state = ParseState::new(Vendor::Fortigate, self.version());
        if let Some(caps) = VERSION.captures(raw) {
            state.config.device.model = Some(caps[1].to_string());
            state.config.device.os_version = Some(caps[2].to_string());
        }

        let mut stack: Vec<Frame> = Vec::new();
        let mut policy_count = 0usize;
        for (idx, line) in raw.lines().enumerate() {
            let line_no = idx + 1;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let words = split_words(text);
            let Some(keyword) = words.first().map(String::as_str) else {
                continue;
            };
            match keyword {
                "config" => {
                    if words.len() < 2 {
                        state.error(line_no, "config without section name");
                        continue;
                    }
                    let name = words[1..].join(" ");
                    let path = match stack.last() {
                        Some(parent) => format!("{} {}", parent.path, name),
                        None => name,
                    };
                    stack.push(Frame {
                        block: Block {
                            section: path.clone(),
                            line: line_no,
                            ..Block::default()
                        },
                        path,
                    });
                }
                "edit" => match stack.last_mut() {
                    Some(frame) => {
                        if let Some(block) = frame.flush() {
                            apply_block(&mut state, &block, &mut policy_count);
                        }
                        frame.block.edit = Some(words[1..].join(" "));
                        frame.block.line = line_no;
                    }
                    None => state.error(line_no, "edit outside of a config block"),
                },
                "set" | "append" => {
                    let Some(frame) = stack.last_mut() else {
                        state.error(line_no, format!("{keyword} outside of a config block"));
                        continue;
                    };
                    if words.len() < 3 {
                        state.error(line_no, format!("{keyword} without a value"));
                        continue;
                    }
                    let entry = frame.block.values.entry(words[1].clone()).or_default();
                    if keyword == "set" {
                        entry.clear();
                    }
                    entry.extend(words[2..].iter().cloned());
                }
                "unset" => {
                    if let (Some(frame), Some(key)) = (stack.last_mut(), words.get(1)) {
                        frame.block.values.remove(key);
                    }
                }
                "next" => match stack.last_mut() {
                    Some(frame) => {
                        if let Some(block) = frame.flush() {
                            apply_block(&mut state, &block, &mut policy_count);
                        }
                    }
                    None => state.error(line_no, "next outside of a config block"),
                },
                "end" => match stack.pop() {
                    Some(mut frame) => {
                        if let Some(block) = frame.flush() {
                            apply_block(&mut state, &block, &mut policy_count);
                        }
                    }
                    None => state.error(line_no, "end without matching config"),
                },
                _ => {}
            }
        }
        while let Some(mut frame) = stack.pop() {
            state.warn(format!("config {} is not terminated by end", frame.path));
            if let Some(block) = frame.flush() {
                apply_block(&mut state, &block, &mut policy_count);
            }
        }
        state.finish(raw)
    }
}

fn apply_block(state: &mut ParseState, block: &Block, policy_count: &mut usize) {
    match block.section.as_str() {
        "system global" => {
            if let Some(hostname) = block.one("hostname") {
                state.config.device.hostname = Some(hostname.to_string());
            }
            if let Some(port) = block.one("admin-ssh-port").and_then(|p| p.parse().ok()) {
                state.config.mgmt.ssh.port = Some(port);
            }
            if block.enabled("admin-telnet") == Some(true) {
                state.config.mgmt.telnet.enabled = true;
            }
        }
        "system interface" => interface(state, block),
        "system dns" => {
            if let Some(domain) = block.one("domain") {
                state.config.device.domain = Some(domain.to_string());
            }
        }
        "firewall policy" => {
            *policy_count += 1;
            policy(state, block, *policy_count);
        }
        "firewall vip" => {
            let Some(name) = block.edit.clone() else {
                return;
            };
            let mut rule = NatRule::new(format!("vip-{name}"), NatKind::Dnat);
            rule.name = Some(name);
            rule.dst_addr = block.one("extip").map(str::to_string);
            rule.dst_port = block.one("extport").map(str::to_string);
            rule.out_interface = block.one("extintf").map(str::to_string);
            rule.translated_addr = block.joined("mappedip");
            rule.translated_port = block.one("mappedport").map(str::to_string);
            state.config.security.nat_rules.push(rule);
        }
        "firewall ippool" => {
            let Some(name) = block.edit.clone() else {
                return;
            };
            let kind = match block.one("type") {
                Some("one-to-one") | Some("fixed-port-range") => NatKind::Snat,
                _ => NatKind::Masquerade,
            };
            let mut rule = NatRule::new(format!("ippool-{name}"), kind);
            rule.name = Some(name);
            rule.translated_addr = match (block.one("startip"), block.one("endip")) {
                (Some(start), Some(end)) if start != end => Some(format!("{start}-{end}")),
                (Some(start), _) => Some(start.to_string()),
                _ => None,
            };
            state.config.security.nat_rules.push(rule);
        }
        "router static" => static_route(state, block),
        "vpn ipsec phase1-interface" => {
            let Some(name) = block.edit.clone() else {
                return;
            };
            let proposal = Phase1Proposal {
                encryption: block
                    .list("proposal")
                    .iter()
                    .map(|p| p.split('-').next().unwrap_or(p).to_string())
                    .collect(),
                hash: block
                    .list("proposal")
                    .iter()
                    .filter_map(|p| p.split_once('-').map(|(_, h)| h.to_string()))
                    .collect(),
                dh_groups: block
                    .list("dhgrp")
                    .iter()
                    .filter_map(|g| g.parse().ok())
                    .collect(),
            };
            state.config.security.vpn_tunnels.push(VpnTunnel {
                name,
                interface: block.one("interface").map(str::to_string),
                remote_gateway: block.one("remote-gw").map(str::to_string),
                proposal,
            });
        }
        "system admin" => {
            if let Some(name) = block.edit.clone() {
                state.config.security.users.push(UserAccount {
                    name,
                    privilege: None,
                    role: block.one("accprofile").map(str::to_string),
                });
            }
        }
        "system snmp sysinfo" => {
            if block.enabled("status") == Some(true) {
                state.config.mgmt.snmp.enabled = true;
            }
        }
        "system snmp community" => {
            if block.edit.is_some() && block.enabled("status") != Some(false) {
                let name = block.one("name").or(block.edit.as_deref()).unwrap_or_default();
                state.config.mgmt.snmp.add_community(name);
                state.config.mgmt.snmp.observe(SnmpVersion::V2c);
            }
        }
        "system snmp user" => {
            if block.edit.is_some() && block.enabled("status") != Some(false) {
                state.config.mgmt.snmp.observe(SnmpVersion::V3);
            }
        }
        "system ntp" => {
            if block.enabled("ntpsync") == Some(true) {
                state.config.mgmt.ntp.enabled = true;
            }
            if let Some(server) = block.one("server") {
                state.config.mgmt.ntp.add(server);
            }
        }
        "system ntp ntpserver" => {
            if let Some(server) = block.one("server") {
                state.config.mgmt.ntp.add(server);
            }
        }
        "log syslogd setting" | "log syslogd2 setting" | "log syslogd3 setting" => {
            if block.enabled("status") == Some(true) {
                if let Some(server) = block.one("server") {
                    state.config.mgmt.syslog.add(server);
                }
            }
        }
        "router ospf" => {
            let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
            if let Some(id) = block.one("router-id") {
                ospf.router_id = Some(id.to_string());
            }
        }
        "router ospf area" => {
            if let Some(area) = block.edit.as_deref() {
                let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
                ospf.area_mut(area);
            }
        }
        "router ospf network" => {
            let Some(prefix) = block.values.get("prefix") else {
                return;
            };
            let network = match prefix.as_slice() {
                [addr, mask] => match mask_to_prefix(mask) {
                    Some(p) => format!("{addr}/{p}"),
                    None => {
                        state.error(block.line, format!("invalid OSPF network mask '{mask}'"));
                        return;
                    }
                },
                _ => prefix.join(" "),
            };
            let area = block.one("area").unwrap_or("0.0.0.0");
            let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
            ospf.area_mut(area).networks.push(network);
        }
        "router bgp" => {
            let bgp = state.config.routing.bgp.get_or_insert_with(Default::default);
            bgp.local_as = block.one("as").and_then(|a| a.parse().ok()).or(bgp.local_as);
            if let Some(id) = block.one("router-id") {
                bgp.router_id = Some(id.to_string());
            }
        }
        "router bgp neighbor" => {
            if let Some(addr) = block.edit.as_deref() {
                let bgp = state.config.routing.bgp.get_or_insert_with(Default::default);
                let neighbor = bgp.neighbor_mut(addr);
                neighbor.remote_as = block.one("remote-as").and_then(|a| a.parse().ok());
                neighbor.description = block.one("description").map(str::to_string);
            }
        }
        _ => {}
    }
}

fn interface(state: &mut ParseState, block: &Block) {
    let Some(name) = block.edit.as_deref() else {
        return;
    };
    let vlan_id = match block.one("vlanid").map(parse_vlan_id) {
        Some(Ok(id)) => Some(id),
        Some(Err(message)) => {
            state.error(block.line, message);
            None
        }
        None => None,
    };
    let kind = match (block.one("type"), vlan_id) {
        (_, Some(_)) => InterfaceKind::Vlan,
        (Some("aggregate"), _) => InterfaceKind::Aggregate,
        (Some("loopback"), _) => InterfaceKind::Loopback,
        (Some("tunnel"), _) => InterfaceKind::Tunnel,
        (Some("switch" | "hard-switch"), _) => InterfaceKind::Bridge,
        _ => InterfaceKind::Physical,
    };
    let binding = match block.values.get("ip").map(Vec::as_slice) {
        Some([addr, mask]) => match (parse_cidr(addr), mask_to_prefix(mask)) {
            (Some(mut binding), Some(prefix)) => {
                binding.prefix = prefix;
                Some(binding)
            }
            _ => {
                state.error(block.line, format!("invalid ip '{addr} {mask}' on {name}"));
                None
            }
        },
        Some([cidr]) => match parse_cidr(cidr) {
            Some(binding) => Some(binding),
            None => {
                state.error(block.line, format!("invalid ip '{cidr}' on {name}"));
                None
            }
        },
        Some(other) => {
            state.error(block.line, format!("invalid ip '{}' on {name}", other.join(" ")));
            None
        }
        None => None,
    };

    let access = block.list("allowaccess");
    if access.iter().any(|a| a == "ssh") {
        state.config.mgmt.ssh.enabled = true;
        state.config.mgmt.ssh.version = Some(2);
    }
    if access.iter().any(|a| a == "telnet") {
        state.config.mgmt.telnet.enabled = true;
    }
    if access.iter().any(|a| a == "snmp") {
        state.config.mgmt.snmp.enabled = true;
    }

    let iface = state.config.interface_entry(name, kind);
    if block.values.contains_key("type") || vlan_id.is_some() {
        iface.kind = kind;
    }
    if let Some(binding) = binding.filter(|b| !(b.address == "0.0.0.0" && b.prefix == 0)) {
        iface.bind(binding);
    }
    if let Some(status) = block.one("status") {
        iface.admin_up = status != "down";
    }
    if let Some(alias) = block.one("alias").or_else(|| block.one("description")) {
        iface.description = Some(alias.to_string());
    }
    if let Some(parent) = block.one("interface") {
        iface.parent = Some(parent.to_string());
    }
    if let Some(id) = vlan_id {
        iface.vlan_id = Some(id);
        let vlan_name = name.to_string();
        state.config.upsert_vlan(id, Some(&vlan_name), None);
    }
}

fn policy(state: &mut ParseState, block: &Block, index: usize) {
    let id = block
        .edit
        .clone()
        .unwrap_or_else(|| format!("policy-{index}"));
    let mut policy = FirewallPolicy::new(
        id,
        PolicyAction::from_keyword(block.one("action").unwrap_or("deny")),
    );
    policy.name = block.one("name").map(str::to_string);
    policy.src_zone = block.joined("srcintf");
    policy.dst_zone = block.joined("dstintf");
    policy.src_addr = block.joined("srcaddr");
    policy.dst_addr = block.joined("dstaddr");
    policy.service = block.joined("service");
    policy.enabled = block.one("status") != Some("disable");
    policy.log = matches!(block.one("logtraffic"), Some("all" | "utm"));
    policy.nat = block.enabled("nat") == Some(true);
    policy.comment = block.one("comments").map(str::to_string);
    state.config.security.firewall_policies.push(policy);
}

fn static_route(state: &mut ParseState, block: &Block) {
    let (destination, prefix) = match block.values.get("dst").map(Vec::as_slice) {
        None => ("0.0.0.0".to_string(), 0),
        Some([addr, mask]) => match (parse_cidr(addr), mask_to_prefix(mask)) {
            (Some(binding), Some(prefix)) => (binding.address, prefix),
            _ => {
                state.error(block.line, format!("invalid route destination '{addr} {mask}'"));
                return;
            }
        },
        Some([cidr]) => match parse_cidr(cidr) {
            Some(binding) => (binding.address, binding.prefix),
            None => {
                state.error(block.line, format!("invalid route destination '{cidr}'"));
                return;
            }
        },
        Some(other) => {
            state.error(
                block.line,
                format!("invalid route destination '{}'", other.join(" ")),
            );
            return;
        }
    };
    state.config.routing.static_routes.push(StaticRoute {
        destination,
        prefix,
        next_hop: block.one("gateway").map(str::to_string),
        interface: block.one("device").map(str::to_string),
        metric: block.one("distance").and_then(|d| d.parse().ok()),
    });
}

/// Edit ids in `section`, in source order, with the 1-based line range of
/// each `edit ... next` block.
pub(crate) fn edit_spans(raw: &str, section: &str) -> Vec<(String, usize, usize)> {
    let mut spans = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut open: Option<(String, usize)> = None;
    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        let words = split_words(line.trim());
        match words.first().map(String::as_str) {
            Some("config") => path.push(words[1..].join(" ")),
            Some("edit") if path.join(" ") == section && path.len() == 1 => {
                open = Some((words[1..].join(" "), line_no));
            }
            Some("next") => {
                if let Some((id, start)) = open.take() {
                    spans.push((id, start, line_no));
                }
            }
            Some("end") => {
                path.pop();
            }
            _ => {}
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"#config-version=FGT60F-7.2.5-FW-build1517-230606:opmode=0:vdom=0
config system global
    set hostname "fw-branch-1"
    set admin-ssh-port 2222
end
config system interface
    edit "port1"
        set ip 198.51.100.2 255.255.255.248
        set allowaccess ping https ssh
        set alias "wan"
    next
    edit "lan-vlan20"
        set vdom "root"
        set ip 10.0.20.1 255.255.255.0
        set interface "port2"
        set vlanid 20
    next
end
config firewall policy
    edit 1
        set name "lan-out"
        set srcintf "lan-vlan20"
        set dstintf "port1"
        set srcaddr "all"
        set dstaddr "all"
        set action accept
        set service "HTTP" "HTTPS"
        set logtraffic all
        set nat enable
    next
end
config router static
    edit 1
        set gateway 198.51.100.1
        set device "port1"
    next
end
config system ntp
    set ntpsync enable
    config ntpserver
        edit 1
            set server "10.0.0.1"
        next
    end
end
"#;

    #[test]
    fn parses_branch_firewall() {
        let result = FortigateParser.parse(CONFIG);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        let config = result.normalized;
        assert_eq!(config.device.hostname.as_deref(), Some("fw-branch-1"));
        assert_eq!(config.device.model.as_deref(), Some("FGT60F"));
        assert_eq!(config.device.os_version.as_deref(), Some("7.2.5"));
        assert_eq!(config.mgmt.ssh.port, Some(2222));
        assert!(config.mgmt.ssh.enabled);

        let vlan = config.interface("lan-vlan20").expect("vlan iface");
        assert_eq!(vlan.kind, InterfaceKind::Vlan);
        assert_eq!(vlan.parent.as_deref(), Some("port2"));
        assert_eq!(
            config.vlan(20).map(|v| v.gateways.clone()),
            Some(vec!["10.0.20.1".to_string()])
        );

        let policy = &config.security.firewall_policies[0];
        assert_eq!(policy.id, "1");
        assert_eq!(policy.action, PolicyAction::Accept);
        assert_eq!(policy.service.as_deref(), Some("HTTP HTTPS"));
        assert!(policy.log && policy.nat);

        let route = &config.routing.static_routes[0];
        assert_eq!((route.destination.as_str(), route.prefix), ("0.0.0.0", 0));
        assert_eq!(route.next_hop.as_deref(), Some("198.51.100.1"));

        assert!(config.mgmt.ntp.enabled);
        assert_eq!(config.mgmt.ntp.servers, vec!["10.0.0.1"]);
        assert!(config.security.acls.iter().any(|a| a.name == "firewall-policy"));
    }

    #[test]
    fn unbalanced_blocks_are_reported_not_fatal() {
        let raw = "config system interface\n    edit \"port1\"\n        set ip 10.0.0.1 255.255.255.0\n    next\nend\nend\nset hostname x\n";
        let result = FortigateParser.parse(raw);
        let lines: Vec<usize> = result.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![6, 7]);
        assert_eq!(result.normalized.interfaces.len(), 1);
    }

    #[test]
    fn unterminated_config_still_applies_pending_block() {
        let raw = "config system global\n    set hostname \"fw2\"\n";
        let result = FortigateParser.parse(raw);
        assert_eq!(result.normalized.device.hostname.as_deref(), Some("fw2"));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn edit_spans_cover_blocks() {
        let spans = edit_spans(CONFIG, "router static");
        assert_eq!(spans, vec![("1".to_string(), 33, 36)]);
    }
}
