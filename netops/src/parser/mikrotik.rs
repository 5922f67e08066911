//! MikroTik RouterOS `/export` parser.
//!
//! Exports are a sequence of menu paths (`/ip address`) followed by commands
//! (`add address=... interface=...`). A command may also follow the path on
//! the same line. Long lines are wrapped with a trailing `\`.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{
    FirewallPolicy, InterfaceKind, NatKind, NatRule, PolicyAction, SnmpVersion, StaticRoute,
    UserAccount, Vendor,
};
use crate::parser::common::{
    expand_vlan_range, parse_cidr, parse_kv_command, parse_vlan_id, KvCommand, ParseState,
};
use crate::parser::{ParseResult, VendorParser};

static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(/system identity|/interface (ethernet|bridge|vlan|bonding|list)|/ip (address|route|firewall|service|pool|dns)|/routing \w+)|by RouterOS",
    )
    .expect("mikrotik marker regex")
});

static BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"by RouterOS\s+(\d+(?:\.\d+)*)").expect("mikrotik banner regex")
});

static MODEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s*model\s*=\s*(\S+)").expect("mikrotik model regex"));

const VERBS: &[&str] = &[
    "add", "set", "remove", "print", "enable", "disable", "export", "edit", "unset", "move",
];

pub struct MikrotikParser;

/// One command after joining `\` continuations. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicalLine {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

pub(crate) fn logical_lines(raw: &str) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut pending: Option<LogicalLine> = None;
    for (idx, line) in raw.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        let mut current = pending.take().unwrap_or(LogicalLine {
            start: line_no,
            end: line_no,
            text: String::new(),
        });
        current.end = line_no;
        match trimmed.strip_suffix('\\') {
            Some(head) => {
                current.text.push_str(head);
                pending = Some(current);
            }
            None => {
                current.text.push_str(trimmed);
                out.push(current);
            }
        }
    }
    out.extend(pending);
    out
}

/// Split a `/menu path command...` line into the normalized menu path and
/// whatever command text follows it.
pub(crate) fn split_menu(line: &str) -> (String, Option<&str>) {
    let mut path = Vec::new();
    let mut rest = line;
    loop {
        let trimmed = rest.trim_start();
        let Some(token) = trimmed.split_whitespace().next() else {
            rest = "";
            break;
        };
        if VERBS.contains(&token) || token.contains('=') || token.starts_with('[') {
            rest = trimmed;
            break;
        }
        path.push(token.to_ascii_lowercase());
        rest = &trimmed[token.len()..];
    }
    let rest = rest.trim();
    (path.join(" "), (!rest.is_empty()).then_some(rest))
}

/// Walk logical lines yielding `(line, menu, command)` for every command.
pub(crate) fn commands(raw: &str) -> Vec<(LogicalLine, String, KvCommand)> {
    let mut menu = String::new();
    let mut out = Vec::new();
    for line in logical_lines(raw) {
        let text = line.text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let body = if text.starts_with('/') {
            let (path, rest) = split_menu(text);
            menu = path;
            match rest {
                Some(rest) => rest.to_string(),
                None => continue,
            }
        } else {
            text.to_string()
        };
        let command = parse_kv_command(&body);
        out.push((line, menu.clone(), command));
    }
    out
}

impl VendorParser for MikrotikParser {
    fn vendor(&self) -> Vendor {
        Vendor::Mikrotik
    }

    fn can_parse(&self, raw: &str) -> bool {
        MARKERS.is_match(raw)
    }

    fn parse(&self, raw: &str) -> ParseResult {
        let mut state = ParseState::new(Vendor::Mikrotik, self.version());
        for line in raw.lines().take_while(|l| l.trim_start().starts_with('#')) {
            if let Some(caps) = BANNER.captures(line) {
                state.config.device.os_version = Some(caps[1].to_string());
            }
            if let Some(caps) = MODEL.captures(line.trim()) {
                state.config.device.model = Some(caps[1].to_string());
            }
        }

        let mut counters = Counters::default();
        for (line, menu, command) in commands(raw) {
            apply(&mut state, &mut counters, &menu, &command, line.start);
        }
        state.finish(raw)
    }
}

#[derive(Default)]
struct Counters {
    filter: usize,
    nat: usize,
}

fn apply(state: &mut ParseState, counters: &mut Counters, menu: &str, cmd: &KvCommand, line: usize) {
    let verb = cmd.verb.as_deref().unwrap_or("");
    if !matches!(verb, "add" | "set") {
        return;
    }
    match menu {
        "/system identity" => match cmd.get("name") {
            Some(name) => state.config.device.hostname = Some(name.to_string()),
            None => state.error(line, "identity set without name="),
        },
        "/interface bridge port" => bridge_port(state, cmd, line),
        "/interface bridge vlan" => bridge_vlan(state, cmd, line),
        "/interface list" | "/interface list member" | "/interface bridge settings" => {}
        "/interface" | "/interface ethernet" | "/interface bridge" | "/interface vlan"
        | "/interface bonding" | "/interface vrrp" | "/interface eoip" | "/interface gre"
        | "/interface wireguard" => interface(state, menu, cmd, line),
        "/ip address" | "/ipv6 address" => address(state, cmd, line),
        "/ip route" => route(state, cmd, line),
        "/ip firewall filter" => {
            counters.filter += 1;
            filter_rule(state, cmd, counters.filter);
        }
        "/ip firewall nat" => {
            counters.nat += 1;
            nat_rule(state, cmd, counters.nat);
        }
        "/ip service" => service(state, cmd),
        "/ip ssh" => {
            state.config.mgmt.ssh.version = Some(2);
        }
        "/snmp" => {
            if cmd.is_yes("enabled") {
                state.config.mgmt.snmp.enabled = true;
            }
        }
        "/snmp community" => snmp_community(state, cmd),
        "/system ntp client" => {
            for key in ["servers", "server-dns-names", "primary-ntp", "secondary-ntp"] {
                if let Some(list) = cmd.get(key) {
                    list.split(',')
                        .filter(|s| *s != "0.0.0.0")
                        .for_each(|s| state.config.mgmt.ntp.add(s));
                }
            }
            if matches!(cmd.get("enabled"), Some("no")) {
                state.config.mgmt.ntp.enabled = false;
            }
        }
        "/system ntp client servers" => {
            if let Some(address) = cmd.get("address") {
                state.config.mgmt.ntp.add(address);
            }
        }
        "/system logging action" => {
            if let Some(remote) = cmd.get("remote") {
                state.config.mgmt.syslog.add(remote);
            }
        }
        "/user" => match cmd.get("name") {
            Some(name) => state.config.security.users.push(UserAccount {
                name: name.to_string(),
                privilege: None,
                role: cmd.get("group").map(str::to_string),
            }),
            None if verb == "add" => state.error(line, "user add without name="),
            None => {}
        },
        "/routing ospf instance" => {
            let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
            ospf.process_id = ospf
                .process_id
                .take()
                .or_else(|| cmd.get("name").map(str::to_string));
            if let Some(id) = cmd.get("router-id") {
                ospf.router_id = Some(id.to_string());
            }
        }
        "/routing ospf area" => {
            let area_id = cmd.get("area-id").unwrap_or("0.0.0.0").to_string();
            let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
            ospf.area_mut(&area_id);
        }
        "/routing ospf network" | "/routing ospf interface-template" => {
            let networks = cmd.get("network").or_else(|| cmd.get("networks"));
            let area = cmd.get("area").unwrap_or("backbone");
            let area_id = if area == "backbone" { "0.0.0.0" } else { area };
            let ospf = state.config.routing.ospf.get_or_insert_with(Default::default);
            let area = ospf.area_mut(area_id);
            for network in networks.into_iter().flat_map(|n| n.split(',')) {
                if !area.networks.iter().any(|n| n == network) {
                    area.networks.push(network.to_string());
                }
            }
        }
        "/routing bgp instance" | "/routing bgp template" => {
            let bgp = state.config.routing.bgp.get_or_insert_with(Default::default);
            if let Some(asn) = cmd.get("as").and_then(|v| v.parse().ok()) {
                bgp.local_as = Some(asn);
            }
            if let Some(id) = cmd.get("router-id") {
                bgp.router_id = Some(id.to_string());
            }
        }
        "/routing bgp peer" | "/routing bgp connection" => bgp_peer(state, cmd, line),
        _ => {}
    }
}

fn interface_kind(menu: &str) -> Option<InterfaceKind> {
    match menu {
        "/interface ethernet" => Some(InterfaceKind::Physical),
        "/interface bridge" => Some(InterfaceKind::Bridge),
        "/interface vlan" => Some(InterfaceKind::Vlan),
        "/interface bonding" => Some(InterfaceKind::Aggregate),
        "/interface eoip" | "/interface gre" | "/interface wireguard" => {
            Some(InterfaceKind::Tunnel)
        }
        _ => None,
    }
}

fn interface(state: &mut ParseState, menu: &str, cmd: &KvCommand, line: usize) {
    let target = cmd
        .find_value("name")
        .or_else(|| cmd.find_value("default-name"))
        .or_else(|| cmd.positional.first().map(String::as_str));
    let new_name = cmd.get("name");
    let name = match (cmd.verb.as_deref(), target, new_name) {
        (Some("set"), Some(target), Some(new_name)) => {
            state.config.rename_interface(target, new_name);
            new_name
        }
        (Some("set"), Some(target), None) => target,
        (_, _, Some(new_name)) => new_name,
        _ => {
            state.error(line, format!("{menu} command without interface name"));
            return;
        }
    }
    .to_string();

    let vlan_id = match cmd.get("vlan-id").map(parse_vlan_id) {
        Some(Ok(id)) => Some(id),
        Some(Err(message)) => {
            state.error(line, message);
            None
        }
        None => None,
    };

    let kind = interface_kind(menu).unwrap_or(InterfaceKind::Physical);
    let iface = state.config.interface_entry(&name, kind);
    if let Some(kind) = interface_kind(menu) {
        iface.kind = kind;
    }
    if let Some(disabled) = cmd.get("disabled") {
        iface.admin_up = disabled != "yes";
    }
    if let Some(comment) = cmd.get("comment") {
        iface.description = Some(comment.to_string());
    }
    if let Some(parent) = cmd.get("interface") {
        iface.parent = Some(parent.to_string());
    }
    if let Some(id) = vlan_id {
        iface.vlan_id = Some(id);
        state.config.upsert_vlan(id, Some(&name), None);
    }
}

fn bridge_port(state: &mut ParseState, cmd: &KvCommand, line: usize) {
    let Some(name) = cmd.get("interface") else {
        return;
    };
    let pvid = match cmd.get("pvid").map(parse_vlan_id) {
        Some(Ok(id)) => Some(id),
        Some(Err(message)) => {
            state.error(line, message);
            None
        }
        None => None,
    };
    let bridge = cmd.get("bridge").map(str::to_string);
    let iface = state.config.interface_entry(name, InterfaceKind::Physical);
    if iface.parent.is_none() {
        iface.parent = bridge;
    }
    if let Some(pvid) = pvid {
        iface.access_vlan = Some(pvid);
    }
}

fn bridge_vlan(state: &mut ParseState, cmd: &KvCommand, line: usize) {
    let Some(ids) = cmd.get("vlan-ids") else {
        state.error(line, "bridge vlan entry without vlan-ids=");
        return;
    };
    match expand_vlan_range(ids) {
        Ok(ids) => {
            for id in ids {
                state.config.upsert_vlan(id, None, None);
            }
        }
        Err(message) => state.error(line, message),
    }
}

fn address(state: &mut ParseState, cmd: &KvCommand, line: usize) {
    if cmd.verb.as_deref() != Some("add") {
        return;
    }
    let (Some(address), Some(name)) = (cmd.get("address"), cmd.get("interface")) else {
        state.error(line, "address add requires address= and interface=");
        return;
    };
    let Some(binding) = parse_cidr(address) else {
        state.error(line, format!("invalid address '{address}'"));
        return;
    };
    state
        .config
        .interface_entry(name, InterfaceKind::Physical)
        .bind(binding);
}

fn route(state: &mut ParseState, cmd: &KvCommand, line: usize) {
    if cmd.verb.as_deref() != Some("add") {
        return;
    }
    let dst = cmd.get("dst-address").unwrap_or("0.0.0.0/0");
    let Some(binding) = parse_cidr(dst) else {
        state.error(line, format!("invalid route destination '{dst}'"));
        return;
    };
    let gateway = cmd.get("gateway").map(str::to_string);
    let (next_hop, interface) = match gateway {
        Some(gw) if parse_cidr(&gw).is_some() => (Some(gw), None),
        Some(gw) => (None, Some(gw)),
        None => (None, None),
    };
    state.config.routing.static_routes.push(StaticRoute {
        destination: binding.address,
        prefix: binding.prefix,
        next_hop,
        interface,
        metric: cmd.get("distance").and_then(|d| d.parse().ok()),
    });
}

fn filter_rule(state: &mut ParseState, cmd: &KvCommand, index: usize) {
    if cmd.verb.as_deref() != Some("add") {
        return;
    }
    let mut policy = FirewallPolicy::new(
        format!("filter-{index}"),
        PolicyAction::from_keyword(cmd.get("action").unwrap_or("accept")),
    );
    let chain = cmd.get("chain").map(str::to_string);
    policy.src_zone = cmd
        .get("in-interface")
        .or_else(|| cmd.get("in-interface-list"))
        .map(str::to_string)
        .or_else(|| chain.clone());
    policy.dst_zone = cmd
        .get("out-interface")
        .or_else(|| cmd.get("out-interface-list"))
        .map(str::to_string)
        .or(chain);
    policy.src_addr = cmd
        .get("src-address")
        .or_else(|| cmd.get("src-address-list"))
        .map(str::to_string);
    policy.dst_addr = cmd
        .get("dst-address")
        .or_else(|| cmd.get("dst-address-list"))
        .map(str::to_string);
    policy.service = match (cmd.get("protocol"), cmd.get("dst-port")) {
        (Some(proto), Some(port)) => Some(format!("{proto}/{port}")),
        (Some(proto), None) => Some(proto.to_string()),
        (None, Some(port)) => Some(port.to_string()),
        (None, None) => None,
    };
    policy.enabled = !cmd.is_yes("disabled");
    policy.log = cmd.is_yes("log");
    policy.comment = cmd.get("comment").map(str::to_string);
    state.config.security.firewall_policies.push(policy);
}

fn nat_rule(state: &mut ParseState, cmd: &KvCommand, index: usize) {
    if cmd.verb.as_deref() != Some("add") {
        return;
    }
    let kind = match (cmd.get("action"), cmd.get("chain")) {
        (Some("masquerade"), _) => NatKind::Masquerade,
        (_, Some("dstnat")) => NatKind::Dnat,
        _ => NatKind::Snat,
    };
    let mut rule = NatRule::new(format!("nat-{index}"), kind);
    rule.name = cmd.get("comment").map(str::to_string);
    rule.src_addr = cmd.get("src-address").map(str::to_string);
    rule.dst_addr = cmd.get("dst-address").map(str::to_string);
    rule.dst_port = cmd.get("dst-port").map(str::to_string);
    rule.out_interface = cmd
        .get("out-interface")
        .or_else(|| cmd.get("out-interface-list"))
        .map(str::to_string);
    rule.translated_addr = cmd.get("to-addresses").map(str::to_string);
    rule.translated_port = cmd.get("to-ports").map(str::to_string);
    rule.enabled = !cmd.is_yes("disabled");
    state.config.security.nat_rules.push(rule);
}

fn service(state: &mut ParseState, cmd: &KvCommand) {
    let Some(name) = cmd
        .find_value("name")
        .or_else(|| cmd.positional.first().map(String::as_str))
    else {
        return;
    };
    let enabled = !cmd.is_yes("disabled");
    let port = cmd.get("port").and_then(|p| p.parse().ok());
    match name {
        "ssh" => {
            let ssh = &mut state.config.mgmt.ssh;
            ssh.enabled = enabled;
            if enabled {
                ssh.version = Some(2);
            }
            if port.is_some() {
                ssh.port = port;
            }
        }
        "telnet" => state.config.mgmt.telnet.enabled = enabled,
        _ => {}
    }
}

fn snmp_community(state: &mut ParseState, cmd: &KvCommand) {
    if cmd.verb.as_deref() != Some("add") || cmd.is_yes("disabled") {
        return;
    }
    let snmp = &mut state.config.mgmt.snmp;
    snmp.add_community(cmd.get("name").unwrap_or_default());
    let secured = matches!(cmd.get("security"), Some("authorized" | "private"));
    snmp.observe(if secured { SnmpVersion::V3 } else { SnmpVersion::V2c });
}

fn bgp_peer(state: &mut ParseState, cmd: &KvCommand, line: usize) {
    if cmd.verb.as_deref() != Some("add") {
        return;
    }
    let Some(address) = cmd
        .get("remote-address")
        .or_else(|| cmd.get("remote.address"))
    else {
        state.error(line, "bgp peer without remote address");
        return;
    };
    let address = address.split('/').next().unwrap_or(address).to_string();
    let remote_as = cmd
        .get("remote-as")
        .or_else(|| cmd.get("remote.as"))
        .and_then(|v| v.parse().ok());
    let local_as = cmd.get("as").or_else(|| cmd.get("local.as")).and_then(|v| v.parse().ok());
    let bgp = state.config.routing.bgp.get_or_insert_with(Default::default);
    if bgp.local_as.is_none() {
        bgp.local_as = local_as;
    }
    let neighbor = bgp.neighbor_mut(&address);
    neighbor.remote_as = remote_as.or(neighbor.remote_as);
    if let Some(name) = cmd.get("name") {
        neighbor.description = Some(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IpFamily;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_identity_vlan_and_address() {
        let raw = "/system identity set name=edge-rtr-1\n\
                   /interface vlan add name=vlan10 vlan-id=10 interface=bridge\n\
                   /ip address add address=10.0.10.1/24 interface=vlan10\n";
        let result = MikrotikParser.parse(raw);
        let config = &result.normalized;
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(config.device.hostname.as_deref(), Some("edge-rtr-1"));
        assert_eq!(config.vlans.len(), 1);
        assert_eq!(config.vlans[0].id, 10);
        assert_eq!(config.vlans[0].gateways, vec!["10.0.10.1"]);
        let vlan10 = config.interface("vlan10").expect("vlan10");
        assert_eq!(vlan10.kind, InterfaceKind::Vlan);
        assert_eq!(vlan10.vlan_id, Some(10));
        assert_eq!(vlan10.parent.as_deref(), Some("bridge"));
        assert_eq!(vlan10.ips.len(), 1);
        assert_eq!(vlan10.ips[0].address, "10.0.10.1");
        assert_eq!(vlan10.ips[0].prefix, 24);
        assert_eq!(vlan10.ips[0].family, IpFamily::Ipv4);
    }

    #[test]
    fn address_before_interface_declaration_merges() {
        let raw = "/ip address\n\
                   add address=192.0.2.1/30 interface=ether1\n\
                   /interface ethernet\n\
                   set [ find default-name=ether1 ] comment=uplink\n";
        let config = MikrotikParser.parse(raw).normalized;
        assert_eq!(config.interfaces.len(), 1);
        let ether1 = &config.interfaces[0];
        assert_eq!(ether1.name, "ether1");
        assert_eq!(ether1.description.as_deref(), Some("uplink"));
        assert_eq!(ether1.ips.len(), 1);
    }

    #[test]
    fn rename_keeps_addresses() {
        let raw = "/interface ethernet\n\
                   set [ find default-name=ether1 ] name=wan\n\
                   /ip address\n\
                   add address=198.51.100.2/29 interface=wan\n";
        let config = MikrotikParser.parse(raw).normalized;
        assert_eq!(config.interfaces.len(), 1);
        assert_eq!(config.interfaces[0].name, "wan");
    }

    #[test]
    fn continuation_lines_are_joined() {
        let raw = "/ip firewall filter\n\
                   add action=drop chain=input comment=\"drop all\" \\\n    log=yes\n";
        let lines = logical_lines(raw);
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[1].start, lines[1].end), (2, 3));
        let config = MikrotikParser.parse(raw).normalized;
        let policy = &config.security.firewall_policies[0];
        assert_eq!(policy.id, "filter-1");
        assert_eq!(policy.action, PolicyAction::Drop);
        assert!(policy.log);
        assert_eq!(policy.comment.as_deref(), Some("drop all"));
    }

    #[test]
    fn malformed_lines_become_errors_with_line_numbers() {
        let raw = "/ip address\n\
                   add address=10.0.0.1/24\n\
                   add address=10.0.0.300/24 interface=ether2\n\
                   /interface vlan\n\
                   add name=bad vlan-id=5000 interface=ether1\n";
        let result = MikrotikParser.parse(raw);
        let lines: Vec<usize> = result.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 5]);
        assert!(result.normalized.interface("bad").is_some());
    }

    #[test]
    fn services_snmp_ntp_and_syslog() {
        let raw = "/ip service\n\
                   set telnet disabled=yes\n\
                   set ssh port=2222\n\
                   /snmp community\n\
                   add name=monitor security=private\n\
                   /system ntp client\n\
                   set enabled=yes servers=10.0.0.1,10.0.0.2\n\
                   /system logging action\n\
                   add name=remote target=remote remote=10.0.0.5\n";
        let config = MikrotikParser.parse(raw).normalized;
        assert!(!config.mgmt.telnet.enabled);
        assert!(config.mgmt.ssh.enabled);
        assert_eq!(config.mgmt.ssh.port, Some(2222));
        assert_eq!(config.mgmt.snmp.version, Some(SnmpVersion::V3));
        assert_eq!(config.mgmt.snmp.community_count, 1);
        assert_eq!(config.mgmt.ntp.servers, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(config.mgmt.syslog.servers, vec!["10.0.0.5"]);
    }

    #[test]
    fn nat_rules_derive_acl_view() {
        let raw = "/ip firewall nat\n\
                   add action=masquerade chain=srcnat out-interface=wan\n\
                   add action=dst-nat chain=dstnat dst-port=443 protocol=tcp to-addresses=10.0.0.10\n";
        let config = MikrotikParser.parse(raw).normalized;
        let kinds: Vec<NatKind> = config.security.nat_rules.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![NatKind::Masquerade, NatKind::Dnat]);
        assert_eq!(config.security.nat_rules[1].id, "nat-2");
        let acl = config
            .security
            .acls
            .iter()
            .find(|a| a.name == "nat-srcnat")
            .expect("nat acl");
        assert_eq!(acl.entries.len(), 2);
    }

    #[test]
    fn detects_export_banner() {
        let raw = "# 2024-05-01 10:00:00 by RouterOS 7.14.2\n# model = RB5009UG+S+\n/system identity\nset name=r1\n";
        assert!(MikrotikParser.can_parse(raw));
        let config = MikrotikParser.parse(raw).normalized;
        assert_eq!(config.device.os_version.as_deref(), Some("7.14.2"));
        assert_eq!(config.device.model.as_deref(), Some("RB5009UG+S+"));
        assert!(!MikrotikParser.can_parse("hostname core1\ninterface Gi0/1\n"));
    }
}
