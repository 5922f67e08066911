//! Cisco IOS / IOS-XE running-config parser.
//!
//! IOS nests sub-commands under a mode line by indentation. A line starting
//! in column zero always leaves the current mode.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    Acl, AclAction, AclEntry, AclKind, AclOrigin, InterfaceKind, IpFamily, NatKind, NatRule,
    SnmpVersion, StaticRoute, SwitchportMode, UserAccount, Vendor,
};
use crate::parser::common::{
    expand_vlan_range, mask_to_prefix, parse_cidr, parse_vlan_id, wildcard_to_prefix, ParseState,
};
use crate::parser::{ParseResult, VendorParser};

static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^(hostname\s+\S+|version\s+\d+\.\d+|interface\s+(Ethernet|FastEthernet|GigabitEthernet|TenGigabitEthernet|Vlan|Loopback|Port-channel|Tunnel)\S*|enable\s+(secret|password)|line\s+(vty|con)\s)",
    )
    .expect("cisco marker regex")
});

pub struct CiscoParser;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Global,
    Interface(String),
    Vlan(Vec<u16>),
    Acl(usize),
    Ospf,
    Bgp,
    Rip,
    Line { vty: bool },
    Other,
}

impl VendorParser for CiscoParser {
    fn vendor(&self) -> Vendor {
        Vendor::Cisco
    }

    fn can_parse(&self, raw: &str) -> bool {
        MARKERS.is_match(raw)
    }

    fn parse(&self, raw: &str) -> ParseResult {
        let mut state = ParseState::new(Vendor::Cisco, self.version());
        let mut mode = Mode::Global;
        for (idx, line) in raw.lines().enumerate() {
            let line_no = idx + 1;
            let text = line.trim();
            if text.is_empty() || text.starts_with('!') {
                continue;
            }
            let indented = line.starts_with(char::is_whitespace);
            if indented && mode != Mode::Global {
                if text == "exit" || text == "exit-address-family" {
                    continue;
                }
                sub_command(&mut state, &mode, text, line_no);
            } else {
                mode = global(&mut state, text, line_no);
            }
        }
        state.finish(raw)
    }
}

fn words(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

fn interface_kind(name: &str) -> (InterfaceKind, Option<u16>) {
    let lower = name.to_ascii_lowercase();
    if let Some(id) = lower.strip_prefix("vlan") {
        return (InterfaceKind::Vlan, parse_vlan_id(id).ok());
    }
    if lower.starts_with("loopback") {
        (InterfaceKind::Loopback, None)
    } else if lower.starts_with("tunnel") {
        (InterfaceKind::Tunnel, None)
    } else if lower.starts_with("port-channel") {
        (InterfaceKind::Aggregate, None)
    } else {
        (InterfaceKind::Physical, None)
    }
}

fn global(state: &mut ParseState, text: &str, line: usize) -> Mode {
    let w = words(text);
    match w.as_slice() {
        ["hostname", name, ..] => {
            state.config.device.hostname = Some(name.to_string());
            Mode::Global
        }
        ["version", version, ..] => {
            state.config.device.os_version = Some(version.to_string());
            Mode::Global
        }
        ["ip", "domain-name", domain] | ["ip", "domain", "name", domain] => {
            state.config.device.domain = Some(domain.to_string());
            Mode::Global
        }
        ["interface", name] => {
            let (kind, vlan_id) = interface_kind(name);
            let iface = state.config.interface_entry(name, kind);
            if vlan_id.is_some() {
                iface.vlan_id = vlan_id;
            }
            if let Some(id) = vlan_id {
                state.config.upsert_vlan(id, None, None);
            }
            Mode::Interface(name.to_string())
        }
        ["vlan", ids] => match expand_vlan_range(ids) {
            Ok(ids) => {
                for id in &ids {
                    state.config.upsert_vlan(*id, None, None);
                }
                Mode::Vlan(ids)
            }
            Err(message) => {
                state.error(line, message);
                Mode::Other
            }
        },
        ["ip", "route", rest @ ..] => {
            static_route(state, rest, line);
            Mode::Global
        }
        ["ip", "access-list", kind @ ("standard" | "extended"), name] => {
            let kind = if *kind == "standard" {
                AclKind::Standard
            } else {
                AclKind::Extended
            };
            Mode::Acl(acl_index(state, name, kind))
        }
        ["access-list", number, action @ ("permit" | "deny"), rest @ ..] => {
            let kind = match number.parse::<u16>() {
                Ok(n) if (100..200).contains(&n) || (2000..2700).contains(&n) => AclKind::Extended,
                _ => AclKind::Standard,
            };
            let idx = acl_index(state, number, kind);
            acl_entry(state, idx, action, rest, line);
            Mode::Global
        }
        ["ip", "nat", "inside", "source", rest @ ..] => {
            nat_rule(state, rest, line);
            Mode::Global
        }
        ["username", name, rest @ ..] => {
            let privilege = rest
                .windows(2)
                .find(|pair| pair[0] == "privilege")
                .and_then(|pair| pair[1].parse().ok());
            state.config.security.users.push(UserAccount {
                name: name.to_string(),
                privilege,
                role: None,
            });
            Mode::Global
        }
        ["ip", "ssh", "version", version] => {
            match version.parse::<u8>() {
                Ok(v) => {
                    state.config.mgmt.ssh.enabled = true;
                    state.config.mgmt.ssh.version = Some(v);
                }
                Err(_) => state.error(line, format!("invalid ssh version '{version}'")),
            }
            Mode::Global
        }
        ["ip", "ssh", "port", port, ..] => {
            state.config.mgmt.ssh.port = port.parse().ok();
            Mode::Global
        }
        ["line", "vty", ..] => Mode::Line { vty: true },
        ["line", ..] => Mode::Line { vty: false },
        ["snmp-server", "community", name, ..] => {
            let snmp = &mut state.config.mgmt.snmp;
            snmp.add_community(name);
            snmp.observe(SnmpVersion::V2c);
            Mode::Global
        }
        ["snmp-server", "group", _, "v3", ..] | ["snmp-server", "user", _, _, "v3", ..] => {
            state.config.mgmt.snmp.observe(SnmpVersion::V3);
            Mode::Global
        }
        ["logging", "host", host, ..] | ["logging", "server", host, ..] => {
            state.config.mgmt.syslog.add(host);
            Mode::Global
        }
        ["logging", host] if parse_cidr(host).is_some() => {
            state.config.mgmt.syslog.add(host);
            Mode::Global
        }
        ["ntp", "server", "vrf", _, server, ..] | ["ntp", "server", server, ..] => {
            state.config.mgmt.ntp.add(server);
            Mode::Global
        }
        ["router", "ospf", process, ..] => {
            let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
            ospf.process_id = Some(process.to_string());
            Mode::Ospf
        }
        ["router", "bgp", asn] => match asn.parse::<u32>() {
            Ok(asn) => {
                let bgp = state.config.routing.bgp.get_or_insert_with(Default::default);
                bgp.local_as = Some(asn);
                Mode::Bgp
            }
            Err(_) => {
                state.error(line, format!("invalid BGP AS number '{asn}'"));
                Mode::Other
            }
        },
        ["router", "rip"] => {
            state.config.routing.rip.get_or_insert_with(Default::default);
            Mode::Rip
        }
        _ => Mode::Other,
    }
}

fn sub_command(state: &mut ParseState, mode: &Mode, text: &str, line: usize) {
    match mode {
        Mode::Interface(name) => interface_line(state, name, text, line),
        Mode::Vlan(ids) => {
            if let ["name", name] = words(text).as_slice() {
                for id in ids {
                    state.config.upsert_vlan(*id, Some(*name), None);
                }
            }
        }
        Mode::Acl(idx) => {
            let mut w = words(text);
            if w.first().is_some_and(|seq| seq.parse::<u32>().is_ok()) {
                w.remove(0);
            }
            if let [action @ ("permit" | "deny"), rest @ ..] = w.as_slice() {
                acl_entry(state, *idx, action, rest, line);
            }
        }
        Mode::Ospf => ospf_line(state, text, line),
        Mode::Bgp => bgp_line(state, text),
        Mode::Rip => {
            let rip = state.config.routing.rip.get_or_insert_with(Default::default);
            match words(text).as_slice() {
                ["version", v] => rip.version = v.parse().ok(),
                ["network", net] => rip.networks.push(net.to_string()),
                _ => {}
            }
        }
        Mode::Line { vty: true } => {
            if let ["transport", "input", protocols @ ..] = words(text).as_slice() {
                let all = protocols.contains(&"all");
                let ssh = all || protocols.contains(&"ssh");
                let telnet = all || protocols.contains(&"telnet");
                state.config.mgmt.ssh.enabled |= ssh;
                state.config.mgmt.telnet.enabled = telnet;
            }
        }
        Mode::Line { vty: false } | Mode::Global | Mode::Other => {}
    }
}

fn interface_line(state: &mut ParseState, name: &str, text: &str, line: usize) {
    let w = words(text);
    match w.as_slice() {
        ["ip", "address", addr, mask, rest @ ..] => {
            let Some(prefix) = mask_to_prefix(mask) else {
                state.error(line, format!("invalid netmask '{mask}' on {name}"));
                return;
            };
            let Some(mut binding) = parse_cidr(addr) else {
                state.error(line, format!("invalid address '{addr}' on {name}"));
                return;
            };
            if binding.family != IpFamily::Ipv4 {
                state.error(line, format!("invalid address '{addr}' on {name}"));
                return;
            }
            binding.prefix = prefix;
            binding.secondary = rest.contains(&"secondary");
            state
                .config
                .interface_entry(name, InterfaceKind::Physical)
                .bind(binding);
        }
        ["ip", "address", "dhcp", ..] | ["ip", "address", "negotiated"] => {}
        ["ip", "address", ..] => state.error(line, format!("incomplete ip address on {name}")),
        ["ipv6", "address", cidr, ..] if cidr.contains('/') => match parse_cidr(cidr) {
            Some(binding) => state
                .config
                .interface_entry(name, InterfaceKind::Physical)
                .bind(binding),
            None => state.error(line, format!("invalid IPv6 address '{cidr}' on {name}")),
        },
        ["description", ..] => {
            let description = text["description".len()..].trim().to_string();
            state
                .config
                .interface_entry(name, InterfaceKind::Physical)
                .description = Some(description);
        }
        ["shutdown"] => {
            state
                .config
                .interface_entry(name, InterfaceKind::Physical)
                .admin_up = false;
        }
        ["no", "shutdown"] => {
            state
                .config
                .interface_entry(name, InterfaceKind::Physical)
                .admin_up = true;
        }
        ["switchport", "mode", mode] => {
            let mode = match *mode {
                "access" => Some(SwitchportMode::Access),
                "trunk" => Some(SwitchportMode::Trunk),
                _ => None,
            };
            state
                .config
                .interface_entry(name, InterfaceKind::Physical)
                .vlan_mode = mode;
        }
        ["switchport", "access", "vlan", id] => match parse_vlan_id(id) {
            Ok(id) => {
                state
                    .config
                    .interface_entry(name, InterfaceKind::Physical)
                    .access_vlan = Some(id);
                state.config.upsert_vlan(id, None, None);
            }
            Err(message) => state.error(line, message),
        },
        ["switchport", "trunk", "native", "vlan", id] => match parse_vlan_id(id) {
            Ok(id) => {
                state
                    .config
                    .interface_entry(name, InterfaceKind::Physical)
                    .native_vlan = Some(id)
            }
            Err(message) => state.error(line, message),
        },
        ["switchport", "trunk", "allowed", "vlan", rest @ ..] => {
            let (replace, list) = match rest {
                ["add", list] => (false, *list),
                [list] => (true, *list),
                _ => return,
            };
            if list == "all" || list == "none" {
                return;
            }
            match expand_vlan_range(list) {
                Ok(ids) => {
                    let iface = state.config.interface_entry(name, InterfaceKind::Physical);
                    if replace {
                        iface.trunk_vlans.clear();
                    }
                    for id in ids {
                        if !iface.trunk_vlans.contains(&id) {
                            iface.trunk_vlans.push(id);
                        }
                    }
                }
                Err(message) => state.error(line, message),
            }
        }
        ["encapsulation", encap, id, ..] if encap.eq_ignore_ascii_case("dot1q") => {
            match parse_vlan_id(id) {
                Ok(id) => {
                    let iface = state.config.interface_entry(name, InterfaceKind::Physical);
                    iface.vlan_id = Some(id);
                    if let Some((parent, _)) = name.split_once('.') {
                        iface.parent = Some(parent.to_string());
                    }
                    state.config.upsert_vlan(id, None, None);
                }
                Err(message) => state.error(line, message),
            }
        }
        _ => {}
    }
}

fn static_route(state: &mut ParseState, rest: &[&str], line: usize) {
    if rest.first() == Some(&"vrf") {
        return;
    }
    let [dest, mask, target, tail @ ..] = rest else {
        state.error(line, "incomplete ip route");
        return;
    };
    let (Some(dest), Some(prefix)) = (parse_cidr(dest), mask_to_prefix(mask)) else {
        state.error(line, format!("invalid route destination '{dest} {mask}'"));
        return;
    };
    let (next_hop, interface) = match parse_cidr(target) {
        Some(hop) => (Some(hop.address), None),
        None => {
            let hop = tail.first().and_then(|t| parse_cidr(t)).map(|b| b.address);
            (hop, Some(target.to_string()))
        }
    };
    let metric = tail
        .iter()
        .rev()
        .find_map(|t| t.parse::<u32>().ok());
    state.config.routing.static_routes.push(StaticRoute {
        destination: dest.address,
        prefix,
        next_hop,
        interface,
        metric,
    });
}

fn acl_index(state: &mut ParseState, name: &str, kind: AclKind) -> usize {
    let acls = &mut state.config.security.acls;
    match acls.iter().position(|a| a.name == name) {
        Some(idx) => idx,
        None => {
            acls.push(Acl {
                name: name.to_string(),
                kind,
                origin: AclOrigin::Native,
                entries: Vec::new(),
            });
            acls.len() - 1
        }
    }
}

/// Consume one address spec (`any`, `host A`, `A WILDCARD`, `object-group N`).
fn address_spec<'a>(tokens: &'a [&'a str]) -> Option<(String, &'a [&'a str])> {
    match tokens {
        ["any", rest @ ..] => Some(("any".to_string(), rest)),
        ["host", addr, rest @ ..] => Some((format!("{addr}/32"), rest)),
        ["object-group", name, rest @ ..] | ["addrgroup", name, rest @ ..] => {
            Some((name.to_string(), rest))
        }
        [addr, wildcard, rest @ ..] if wildcard_to_prefix(wildcard).is_some() => {
            let prefix = wildcard_to_prefix(wildcard).unwrap_or(32);
            Some((format!("{addr}/{prefix}"), rest))
        }
        [addr, rest @ ..] if parse_cidr(addr).is_some() => Some((format!("{addr}/32"), rest)),
        _ => None,
    }
}

fn port_spec(tokens: &[&str]) -> (Option<String>, usize) {
    match tokens {
        ["eq", port, ..] => (Some(port.to_string()), 2),
        ["range", lo, hi, ..] => (Some(format!("{lo}-{hi}")), 3),
        ["gt" | "lt" | "neq", port, ..] => (Some(format!("{}{port}", tokens[0])), 2),
        _ => (None, 0),
    }
}

fn acl_entry(state: &mut ParseState, idx: usize, action: &str, rest: &[&str], line: usize) {
    let action = if action == "permit" {
        AclAction::Permit
    } else {
        AclAction::Deny
    };
    let Some(acl) = state.config.security.acls.get(idx) else {
        return;
    };
    let log = rest.contains(&"log") || rest.contains(&"log-input");
    let entry = match acl.kind {
        AclKind::Standard => address_spec(rest).map(|(source, _)| AclEntry {
            action,
            source,
            destination: "any".to_string(),
            protocol: None,
            port: None,
            log,
        }),
        _ => rest.split_first().and_then(|(protocol, tail)| {
            let (source, tail) = address_spec(tail)?;
            let (_, skip) = port_spec(tail);
            let (destination, tail) = address_spec(&tail[skip..])?;
            let (port, _) = port_spec(tail);
            Some(AclEntry {
                action,
                source,
                destination,
                protocol: Some(protocol.to_string()),
                port,
                log,
            })
        }),
    };
    match entry {
        Some(entry) => state.config.security.acls[idx].entries.push(entry),
        None => state.error(line, format!("unrecognized access-list entry '{}'", rest.join(" "))),
    }
}

fn nat_rule(state: &mut ParseState, rest: &[&str], line: usize) {
    let id = format!("nat-{}", state.config.security.nat_rules.len() + 1);
    let rule = match rest {
        ["list", acl, "interface", out, ..] => {
            let mut rule = NatRule::new(id, NatKind::Masquerade);
            rule.src_addr = Some(acl.to_string());
            rule.out_interface = Some(out.to_string());
            Some(rule)
        }
        ["list", acl, "pool", pool, ..] => {
            let mut rule = NatRule::new(id, NatKind::Snat);
            rule.src_addr = Some(acl.to_string());
            rule.translated_addr = Some(pool.to_string());
            Some(rule)
        }
        ["static", proto @ ("tcp" | "udp"), local, local_port, global, global_port, ..] => {
            let mut rule = NatRule::new(id, NatKind::Dnat);
            rule.name = Some(format!("{proto}/{global_port}"));
            rule.dst_addr = Some(global.to_string());
            rule.dst_port = Some(global_port.to_string());
            rule.translated_addr = Some(local.to_string());
            rule.translated_port = Some(local_port.to_string());
            Some(rule)
        }
        ["static", local, global, ..] => {
            let mut rule = NatRule::new(id, NatKind::Snat);
            rule.src_addr = Some(local.to_string());
            rule.translated_addr = Some(global.to_string());
            Some(rule)
        }
        _ => None,
    };
    match rule {
        Some(rule) => state.config.security.nat_rules.push(rule),
        None => state.error(line, "unrecognized ip nat inside source statement"),
    }
}

fn ospf_line(state: &mut ParseState, text: &str, line: usize) {
    let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
    match words(text).as_slice() {
        ["router-id", id] => ospf.router_id = Some(id.to_string()),
        ["network", addr, wildcard, "area", area] => match wildcard_to_prefix(wildcard) {
            Some(prefix) => {
                let network = format!("{addr}/{prefix}");
                let area = ospf.area_mut(area);
                if !area.networks.contains(&network) {
                    area.networks.push(network);
                }
            }
            None => state.error(line, format!("invalid OSPF wildcard '{wildcard}'")),
        },
        _ => {}
    }
}

fn bgp_line(state: &mut ParseState, text: &str) {
    let bgp = state.config.routing.bgp.get_or_insert_with(Default::default);
    match words(text).as_slice() {
        ["bgp", "router-id", id] => bgp.router_id = Some(id.to_string()),
        ["neighbor", addr, "remote-as", asn] => {
            bgp.neighbor_mut(addr).remote_as = asn.parse().ok();
        }
        ["neighbor", addr, "description", ..] => {
            let description = text
                .split_once("description")
                .map(|(_, d)| d.trim().to_string());
            bgp.neighbor_mut(addr).description = description;
        }
        ["network", addr, "mask", mask] => {
            let prefix = mask_to_prefix(mask).unwrap_or(32);
            bgp.networks.push(format!("{addr}/{prefix}"));
        }
        ["network", addr] => bgp.networks.push(addr.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = "\
version 15.2
hostname core-sw-1
ip domain-name lab.example
!
vlan 10
 name USERS
vlan 20,30
!
interface GigabitEthernet0/1
 description Uplink to edge
 ip address 192.0.2.2 255.255.255.252
 no shutdown
!
interface GigabitEthernet0/2
 switchport mode trunk
 switchport trunk allowed vlan 10,20
 switchport trunk allowed vlan add 30
 switchport trunk native vlan 99
!
interface Vlan10
 ip address 10.0.10.1 255.255.255.0
 ip address 10.0.11.1 255.255.255.0 secondary
!
interface GigabitEthernet0/3
 shutdown
!
ip route 0.0.0.0 0.0.0.0 192.0.2.1
ip access-list extended MGMT
 10 permit tcp 10.0.0.0 0.0.0.255 any eq 22
 20 deny ip any any log
!
ip ssh version 2
line vty 0 4
 transport input ssh
!
end
";

    #[test]
    fn parses_core_switch() {
        let result = CiscoParser.parse(CONFIG);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let config = result.normalized;
        assert_eq!(config.device.hostname.as_deref(), Some("core-sw-1"));
        assert_eq!(config.device.os_version.as_deref(), Some("15.2"));
        assert_eq!(config.device.domain.as_deref(), Some("lab.example"));

        let ids: Vec<u16> = config.vlans.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(config.vlan(10).and_then(|v| v.name.as_deref()), Some("USERS"));
        assert_eq!(
            config.vlan(10).map(|v| v.gateways.clone()),
            Some(vec!["10.0.10.1".to_string(), "10.0.11.1".to_string()])
        );

        let trunk = config.interface("GigabitEthernet0/2").expect("trunk");
        assert_eq!(trunk.vlan_mode, Some(SwitchportMode::Trunk));
        assert_eq!(trunk.trunk_vlans, vec![10, 20, 30]);
        assert_eq!(trunk.native_vlan, Some(99));

        let svi = config.interface("Vlan10").expect("svi");
        assert_eq!(svi.kind, InterfaceKind::Vlan);
        assert!(svi.ips[1].secondary);

        assert!(!config.interface("GigabitEthernet0/3").expect("gi3").admin_up);
        assert_eq!(config.routing.static_routes[0].prefix, 0);
        assert_eq!(config.routing.static_routes[0].next_hop.as_deref(), Some("192.0.2.1"));

        let acl = &config.security.acls[0];
        assert_eq!(acl.name, "MGMT");
        assert_eq!(acl.entries.len(), 2);
        assert_eq!(acl.entries[0].source, "10.0.0.0/24");
        assert_eq!(acl.entries[0].port.as_deref(), Some("22"));
        assert_eq!(acl.entries[1].action, AclAction::Deny);
        assert!(acl.entries[1].log);

        assert!(config.mgmt.ssh.enabled);
        assert_eq!(config.mgmt.ssh.version, Some(2));
        assert!(!config.mgmt.telnet.enabled);
    }

    #[test]
    fn interface_blocks_declared_twice_merge() {
        let raw = "hostname r1\ninterface Gi0/1\n description a\ninterface Gi0/1\n ip address 10.0.0.1 255.255.255.0\n";
        let config = CiscoParser.parse(raw).normalized;
        assert_eq!(config.interfaces.len(), 1);
        assert_eq!(config.interfaces[0].description.as_deref(), Some("a"));
        assert_eq!(config.interfaces[0].ips.len(), 1);
    }

    #[test]
    fn bad_mask_and_vlan_are_reported() {
        let raw = "hostname r1\ninterface Gi0/1\n ip address 10.0.0.1 255.0.255.0\nvlan 5000\n";
        let result = CiscoParser.parse(raw);
        let lines: Vec<usize> = result.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn routing_protocols_and_management() {
        let raw = "\
hostname r2
router ospf 1
 router-id 1.1.1.1
 network 10.0.0.0 0.0.0.255 area 0
router bgp 65001
 neighbor 192.0.2.9 remote-as 65002
 network 10.0.0.0 mask 255.255.0.0
snmp-server community s3cret RO
snmp-server group ADMIN v3 priv
ntp server 10.0.0.1
ntp server 10.0.0.2 prefer
logging host 10.0.0.5
username admin privilege 15 secret 5 $1$abc
";
        let config = CiscoParser.parse(raw).normalized;
        let ospf = config.routing.ospf.expect("ospf");
        assert_eq!(ospf.process_id.as_deref(), Some("1"));
        assert_eq!(ospf.areas[0].networks, vec!["10.0.0.0/24"]);
        let bgp = config.routing.bgp.expect("bgp");
        assert_eq!(bgp.local_as, Some(65001));
        assert_eq!(bgp.neighbors[0].remote_as, Some(65002));
        assert_eq!(bgp.networks, vec!["10.0.0.0/16"]);
        assert_eq!(config.mgmt.snmp.version, Some(SnmpVersion::V3));
        assert_eq!(config.mgmt.snmp.community_count, 1);
        assert_eq!(config.mgmt.ntp.servers.len(), 2);
        assert_eq!(config.mgmt.syslog.servers, vec!["10.0.0.5"]);
        assert_eq!(config.security.users[0].privilege, Some(15));
    }
}
