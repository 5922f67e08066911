use super::{drop_ranges, host, network, CommandStep, RenderedChange};
use crate::change::intent::Intent;
use crate::change::plan::matching_routes;
use crate::model::{CanonicalConfig, Interface, IpBinding, NatKind, PolicyAction};
use crate::parser::common::{mask_to_prefix, parse_cidr, prefix_to_mask, prefix_to_wildcard};

const POLICY_ACL: &str = "NETOPS-POLICY";
const NAT_ACL: &str = "NETOPS-NAT";
const NAT_POOL: &str = "NETOPS-POOL";

pub(super) fn render(intent: &Intent, config: &CanonicalConfig, raw: &str) -> Result<RenderedChange, String> {
    let mut out = RenderedChange::default();

    match intent {
        Intent::AddVlan { id, name, gateway, .. } => {
            out.prechecks = vec![format!("show vlan id {id}"), format!("show running-config interface Vlan{id}")];
            let vlan_block = match name {
                Some(name) => format!("vlan {id}\n name {name}"),
                None => format!("vlan {id}"),
            };
            out.steps.push(CommandStep::new(vlan_block, format!("no vlan {id}")));
            out.postchecks.push(format!("show vlan id {id}"));
            if let Some(gateway) = gateway {
                let gw = host(gateway)?;
                out.steps.push(CommandStep::new(
                    format!(
                        "interface Vlan{id}\n ip address {} {}\n no shutdown",
                        gw.address,
                        prefix_to_mask(gw.prefix)
                    ),
                    format!("no interface Vlan{id}"),
                ));
                out.postchecks.push(format!("show ip interface brief Vlan{id}"));
            }
            out.candidate_text = insert_before_end(raw, &out.apply_commands());
        }
        Intent::RemoveVlan { id } => {
            let svi_name = format!("Vlan{id}");
            out.prechecks = vec![format!("show vlan id {id}"), format!("show interfaces {svi_name}")];
            if let Some(svi) = config.interface(&svi_name) {
                out.steps.push(CommandStep::new(format!("no interface {svi_name}"), interface_block(svi)));
            }
            if let Some(vlan) = config.vlan(*id) {
                let restore = match &vlan.name {
                    Some(name) => format!("vlan {id}\n name {name}"),
                    None => format!("vlan {id}"),
                };
                out.steps.push(CommandStep::new(format!("no vlan {id}"), restore));
            }
            if out.steps.is_empty() {
                return Err(format!("VLAN {id} not present"));
            }
            out.postchecks.push(format!("show vlan id {id}"));
            let mut ranges = block_range(raw, &format!("vlan {id}"));
            ranges.extend(block_range(raw, &format!("interface {svi_name}")));
            out.candidate_text = drop_ranges(raw, &ranges);
        }
        Intent::AddStaticRoute {
            destination,
            next_hop,
        } => {
            let dest = network(destination)?;
            let route = format!("ip route {} {} {next_hop}", dest.address, prefix_to_mask(dest.prefix));
            out.prechecks = vec![
                format!("show ip route {} {}", dest.address, prefix_to_mask(dest.prefix)),
                format!("ping {next_hop} repeat 2"),
            ];
            out.steps.push(CommandStep::new(route.clone(), format!("no {route}")));
            out.postchecks.push(format!("show ip route {}", dest.address));
            out.candidate_text = insert_before_end(raw, &out.apply_commands());
        }
        Intent::RemoveStaticRoute {
            destination,
            next_hop,
        } => {
            let dest = network(destination)?;
            let mask = prefix_to_mask(dest.prefix);
            out.prechecks.push(format!("show ip route {} {mask}", dest.address));
            for route in matching_routes(config, destination, next_hop.as_deref()) {
                let Some(target) = route.next_hop.as_deref().or(route.interface.as_deref()) else {
                    continue;
                };
                let line = format!("ip route {} {mask} {target}", dest.address);
                out.steps.push(CommandStep::new(format!("no {line}"), line));
            }
            if out.steps.is_empty() {
                return Err(format!("no route to {} on record", dest.cidr()));
            }
            out.postchecks.push(format!("show ip route {}", dest.address));

            let ranges: Vec<(usize, usize)> = raw
                .lines()
                .enumerate()
                .filter(|(_, line)| route_matches(line, &dest, next_hop.as_deref()))
                .map(|(idx, _)| (idx + 1, idx + 1))
                .collect();
            out.candidate_text = drop_ranges(raw, &ranges);
        }
        Intent::AddFirewallRule {
            action,
            source,
            destination,
            protocol,
            port,
            ..
        } => {
            let verb = if *action == PolicyAction::Accept { "permit" } else { "deny" };
            let mut entry = format!(
                "{verb} {} {} {}",
                protocol.as_deref().unwrap_or("ip"),
                acl_address(source.as_deref())?,
                acl_address(destination.as_deref())?
            );
            if let Some(port) = port {
                entry.push_str(&format!(" eq {port}"));
            }
            let header = format!("ip access-list extended {POLICY_ACL}");
            out.prechecks.push(format!("show ip access-lists {POLICY_ACL}"));
            out.steps.push(CommandStep::new(
                format!("{header}\n {entry}"),
                format!("{header}\n no {entry}"),
            ));
            out.postchecks.push(format!("show ip access-lists {POLICY_ACL}"));
            out.candidate_text = insert_before_end(raw, &out.apply_commands());
        }
        Intent::AddNatRule {
            kind,
            source,
            destination,
            protocol,
            port,
            out_interface,
            translated_address,
            translated_port,
        } => {
            out.prechecks.push("show ip nat translations".to_string());
            let nat_acl = format!("ip access-list standard {NAT_ACL}");
            let source_spec = acl_address(source.as_deref())?;
            match kind {
                NatKind::Masquerade => {
                    let out_interface = out_interface
                        .as_deref()
                        .ok_or("masquerade needs an outgoing interface")?;
                    out.steps.push(CommandStep::new(
                        format!("{nat_acl}\n permit {source_spec}"),
                        format!("{nat_acl}\n no permit {source_spec}"),
                    ));
                    let nat = format!("ip nat inside source list {NAT_ACL} interface {out_interface} overload");
                    out.steps.push(CommandStep::new(nat.clone(), format!("no {nat}")));
                }
                NatKind::Snat => {
                    let translated = translated_address.as_deref().ok_or("snat needs a translated address")?;
                    let src = host(source.as_deref().ok_or("snat needs a source")?)?;
                    if src.prefix == 32 {
                        let nat = format!("ip nat inside source static {} {translated}", src.address);
                        out.steps.push(CommandStep::new(nat.clone(), format!("no {nat}")));
                    } else {
                        out.steps.push(CommandStep::new(
                            format!("{nat_acl}\n permit {source_spec}"),
                            format!("{nat_acl}\n no permit {source_spec}"),
                        ));
                        let pool = format!("ip nat pool {NAT_POOL} {translated} {translated} netmask 255.255.255.255");
                        out.steps.push(CommandStep::new(pool, format!("no ip nat pool {NAT_POOL}")));
                        let nat = format!("ip nat inside source list {NAT_ACL} pool {NAT_POOL} overload");
                        out.steps.push(CommandStep::new(nat.clone(), format!("no {nat}")));
                    }
                }
                NatKind::Dnat => {
                    let inside = translated_address.as_deref().ok_or("dnat needs a translated address")?;
                    let outside = destination.as_deref().ok_or("dnat needs a destination")?;
                    let port = port.ok_or("dnat needs a port")?;
                    let inside_port = translated_port.unwrap_or(port);
                    let nat = format!(
                        "ip nat inside source static {} {inside} {inside_port} {outside} {port}",
                        protocol.as_deref().unwrap_or("tcp")
                    );
                    out.steps.push(CommandStep::new(nat.clone(), format!("no {nat}")));
                }
            }
            out.postchecks.push("show ip nat translations".to_string());
            out.candidate_text = insert_before_end(raw, &out.apply_commands());
        }
        Intent::ShutdownInterface { interface } => {
            let header = format!("interface {interface}");
            let Some((start, end)) = block_range(raw, &header).first().copied() else {
                return Err(format!("interface {interface} not found"));
            };
            out.prechecks.push(format!("show interfaces {interface} status"));
            out.steps.push(CommandStep::new(
                format!("{header}\n shutdown"),
                format!("{header}\n no shutdown"),
            ));
            out.postchecks.push(format!("show interfaces {interface} status"));

            let mut text = String::with_capacity(raw.len() + 16);
            for (idx, line) in raw.lines().enumerate() {
                let line_no = idx + 1;
                let trimmed = line.trim();
                if line_no > start && line_no <= end && (trimmed == "shutdown" || trimmed == "no shutdown") {
                    continue;
                }
                text.push_str(line);
                text.push('\n');
                if line_no == start {
                    text.push_str(" shutdown\n");
                }
            }
            out.candidate_text = text;
        }
    }
    Ok(out)
}

/// `any`, `host A` or `NET WILDCARD`.
fn acl_address(cidr: Option<&str>) -> Result<String, String> {
    let Some(cidr) = cidr else {
        return Ok("any".to_string());
    };
    let net = network(cidr)?;
    Ok(match net.prefix {
        0 => "any".to_string(),
        32 => format!("host {}", net.address),
        prefix => format!("{} {}", net.address, prefix_to_wildcard(prefix)),
    })
}

/// The configuration that recreates `iface`.
fn interface_block(iface: &Interface) -> String {
    let mut lines = vec![format!("interface {}", iface.name)];
    if let Some(description) = &iface.description {
        lines.push(format!(" description {description}"));
    }
    for ip in &iface.ips {
        lines.push(ip_line(ip));
    }
    lines.push(if iface.admin_up { " no shutdown" } else { " shutdown" }.to_string());
    lines.join("\n")
}

fn ip_line(ip: &IpBinding) -> String {
    let secondary = if ip.secondary { " secondary" } else { "" };
    match ip.family {
        crate::model::IpFamily::Ipv4 => format!(" ip address {} {}{secondary}", ip.address, prefix_to_mask(ip.prefix)),
        crate::model::IpFamily::Ipv6 => format!(" ipv6 address {}", ip.cidr()),
    }
}

/// Line range of each top-level block whose header is exactly `header`,
/// including its indented children.
fn block_range(raw: &str, header: &str) -> Vec<(usize, usize)> {
    let lines: Vec<&str> = raw.lines().collect();
    let mut ranges = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        if lines[idx].trim_end() == header {
            let start = idx + 1;
            let mut end = start;
            while end < lines.len() && lines[end].starts_with([' ', '\t']) {
                end += 1;
            }
            ranges.push((start, end));
            idx = end;
        } else {
            idx += 1;
        }
    }
    ranges
}

fn route_matches(line: &str, dest: &IpBinding, next_hop: Option<&str>) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    let ["ip", "route", net, mask, target, ..] = words.as_slice() else {
        return false;
    };
    let same_net = parse_cidr(net).is_some_and(|n| n.address == dest.address)
        && mask_to_prefix(mask) == Some(dest.prefix);
    same_net && next_hop.is_none_or(|nh| nh == *target)
}

/// Insert blocks ahead of the final `end`, or append when there is none.
fn insert_before_end(raw: &str, blocks: &[String]) -> String {
    let mut lines: Vec<&str> = raw.lines().collect();
    let at = lines
        .iter()
        .rposition(|l| l.trim() == "end")
        .unwrap_or(lines.len());
    let mut insert: Vec<&str> = Vec::new();
    for block in blocks {
        insert.extend(block.lines());
        insert.push("!");
    }
    lines.splice(at..at, insert);
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
