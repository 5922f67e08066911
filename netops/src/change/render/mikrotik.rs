use super::{append_lines, drop_ranges, host, network, CommandStep, RenderedChange};
use crate::change::intent::Intent;
use crate::change::plan::{matching_routes, vlan_interfaces};
use crate::model::{CanonicalConfig, NatKind, PolicyAction};
use crate::parser::common::parse_cidr;
use crate::parser::mikrotik::commands;

pub(super) fn render(
    intent: &Intent,
    config: &CanonicalConfig,
    raw: &str,
    tag: &str,
) -> Result<RenderedChange, String> {
    let mut out = RenderedChange::default();
    let mut removed: Vec<(usize, usize)> = Vec::new();

    match intent {
        Intent::AddVlan {
            id,
            name,
            gateway,
            parent_interface,
        } => {
            let parent = parent_interface
                .as_deref()
                .ok_or("RouterOS VLAN interfaces need a parent interface")?;
            let ifname = name.clone().unwrap_or_else(|| format!("vlan{id}"));
            out.prechecks = vec![
                format!("/interface vlan print where vlan-id={id}"),
                format!("/interface print where name={parent}"),
            ];
            out.steps.push(CommandStep::new(
                format!("/interface vlan add interface={parent} name={ifname} vlan-id={id}"),
                format!("/interface vlan remove [find name={ifname}]"),
            ));
            out.postchecks.push(format!("/interface vlan print detail where name={ifname}"));
            if let Some(gateway) = gateway {
                let gateway = host(gateway)?.cidr();
                out.steps.push(CommandStep::new(
                    format!("/ip address add address={gateway} interface={ifname}"),
                    format!("/ip address remove [find address=\"{gateway}\"]"),
                ));
                out.postchecks.push(format!("/ip address print where interface={ifname}"));
            }
        }
        Intent::RemoveVlan { id } => {
            let interfaces = vlan_interfaces(config, *id);
            if interfaces.is_empty() {
                return Err(format!("no VLAN interface carries VLAN {id}"));
            }
            out.prechecks.push(format!("/interface vlan print where vlan-id={id}"));
            for iface in &interfaces {
                out.prechecks.push(format!("/ip address print where interface={}", iface.name));
                for ip in &iface.ips {
                    let cidr = ip.cidr();
                    out.steps.push(CommandStep::new(
                        format!("/ip address remove [find address=\"{cidr}\"]"),
                        format!("/ip address add address={cidr} interface={}", iface.name),
                    ));
                }
                let parent = iface
                    .parent
                    .as_deref()
                    .map(|p| format!("interface={p} "))
                    .unwrap_or_default();
                out.steps.push(CommandStep::new(
                    format!("/interface vlan remove [find name={}]", iface.name),
                    format!("/interface vlan add {parent}name={} vlan-id={id}", iface.name),
                ));
            }
            out.postchecks.push(format!("/interface vlan print where vlan-id={id}"));

            let names: Vec<&str> = interfaces.iter().map(|i| i.name.as_str()).collect();
            for (line, menu, cmd) in commands(raw) {
                if cmd.verb.as_deref() != Some("add") {
                    continue;
                }
                let hit = match menu.as_str() {
                    "/interface vlan" => cmd.get("name").is_some_and(|n| names.contains(&n)),
                    "/ip address" => cmd.get("interface").is_some_and(|n| names.contains(&n)),
                    _ => false,
                };
                if hit {
                    removed.push((line.start, line.end));
                }
            }
        }
        Intent::AddStaticRoute {
            destination,
            next_hop,
        } => {
            let dest = network(destination)?.cidr();
            out.prechecks = vec![
                format!("/ip route print where dst-address={dest}"),
                format!("/ping {next_hop} count=3"),
            ];
            out.steps.push(CommandStep::new(
                format!("/ip route add dst-address={dest} gateway={next_hop}"),
                format!("/ip route remove [find dst-address={dest} gateway={next_hop}]"),
            ));
            out.postchecks.push(format!("/ip route print detail where dst-address={dest}"));
        }
        Intent::RemoveStaticRoute {
            destination,
            next_hop,
        } => {
            let dest = network(destination)?;
            let routes = matching_routes(config, destination, next_hop.as_deref());
            if routes.is_empty() {
                return Err(format!("no route to {} on record", dest.cidr()));
            }
            let dest_cidr = dest.cidr();
            out.prechecks.push(format!("/ip route print detail where dst-address={dest_cidr}"));
            for route in &routes {
                let Some(gateway) = route.next_hop.as_deref().or(route.interface.as_deref()) else {
                    return Err(format!("route to {dest_cidr} has no gateway to select it by"));
                };
                let distance = route
                    .metric
                    .map(|m| format!(" distance={m}"))
                    .unwrap_or_default();
                out.steps.push(CommandStep::new(
                    format!("/ip route remove [find dst-address={dest_cidr} gateway={gateway}]"),
                    format!("/ip route add dst-address={dest_cidr} gateway={gateway}{distance}"),
                ));
            }
            out.postchecks.push(format!("/ip route print where dst-address={dest_cidr}"));

            for (line, menu, cmd) in commands(raw) {
                if menu != "/ip route" || cmd.verb.as_deref() != Some("add") {
                    continue;
                }
                let route_dest = cmd
                    .get("dst-address")
                    .and_then(parse_cidr)
                    .map_or_else(|| "0.0.0.0/0".to_string(), |b| b.cidr());
                let via = cmd.get("gateway");
                if route_dest == dest_cidr && next_hop.as_deref().is_none_or(|nh| via == Some(nh)) {
                    removed.push((line.start, line.end));
                }
            }
        }
        Intent::AddFirewallRule {
            action,
            source,
            destination,
            protocol,
            port,
            comment,
        } => {
            let comment = comment.clone().unwrap_or_else(|| tag.to_string());
            let action = match action {
                PolicyAction::Accept => "accept",
                PolicyAction::Reject => "reject",
                PolicyAction::Drop | PolicyAction::Deny => "drop",
            };
            let mut args = vec!["chain=forward".to_string(), format!("action={action}")];
            if let Some(source) = source {
                args.push(format!("src-address={}", network(source)?.cidr()));
            }
            if let Some(destination) = destination {
                args.push(format!("dst-address={}", network(destination)?.cidr()));
            }
            if let Some(protocol) = protocol {
                args.push(format!("protocol={protocol}"));
            }
            if let Some(port) = port {
                args.push(format!("dst-port={port}"));
            }
            args.push(format!("comment=\"{comment}\""));
            out.prechecks.push(format!("/ip firewall filter print where comment=\"{comment}\""));
            out.steps.push(CommandStep::new(
                format!("/ip firewall filter add {}", args.join(" ")),
                format!("/ip firewall filter remove [find comment=\"{comment}\"]"),
            ));
            out.postchecks.push(format!("/ip firewall filter print stats where comment=\"{comment}\""));
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
            let mut args = Vec::new();
            match kind {
                NatKind::Masquerade => {
                    args.push("chain=srcnat".to_string());
                    args.push("action=masquerade".to_string());
                    let out_interface = out_interface
                        .as_deref()
                        .ok_or("masquerade needs an outgoing interface")?;
                    args.push(format!("out-interface={out_interface}"));
                    if let Some(source) = source {
                        args.push(format!("src-address={}", network(source)?.cidr()));
                    }
                }
                NatKind::Snat => {
                    args.push("chain=srcnat".to_string());
                    args.push("action=src-nat".to_string());
                    if let Some(source) = source {
                        args.push(format!("src-address={}", network(source)?.cidr()));
                    }
                    if let Some(out_interface) = out_interface {
                        args.push(format!("out-interface={out_interface}"));
                    }
                    if let Some(addr) = translated_address {
                        args.push(format!("to-addresses={addr}"));
                    }
                    if let Some(port) = translated_port {
                        args.push(format!("to-ports={port}"));
                    }
                }
                NatKind::Dnat => {
                    args.push("chain=dstnat".to_string());
                    args.push("action=dst-nat".to_string());
                    if let Some(destination) = destination {
                        args.push(format!("dst-address={destination}"));
                    }
                    args.push(format!("protocol={}", protocol.as_deref().unwrap_or("tcp")));
                    if let Some(port) = port {
                        args.push(format!("dst-port={port}"));
                    }
                    if let Some(addr) = translated_address {
                        args.push(format!("to-addresses={addr}"));
                    }
                    if let Some(port) = translated_port.or(*port) {
                        args.push(format!("to-ports={port}"));
                    }
                }
            }
            args.push(format!("comment=\"{tag}\""));
            out.prechecks.push(format!("/ip firewall nat print where comment=\"{tag}\""));
            out.steps.push(CommandStep::new(
                format!("/ip firewall nat add {}", args.join(" ")),
                format!("/ip firewall nat remove [find comment=\"{tag}\"]"),
            ));
            out.postchecks.push(format!("/ip firewall nat print stats where comment=\"{tag}\""));
        }
        Intent::ShutdownInterface { interface } => {
            if config.interface(interface).is_none() {
                return Err(format!("interface {interface} not found"));
            }
            out.prechecks.push(format!("/interface print detail where name={interface}"));
            out.steps.push(CommandStep::new(
                format!("/interface set [find name={interface}] disabled=yes"),
                format!("/interface set [find name={interface}] disabled=no"),
            ));
            out.postchecks.push(format!("/interface print where name={interface} disabled"));
        }
    }

    let base = if removed.is_empty() {
        raw.to_string()
    } else {
        drop_ranges(raw, &removed)
    };
    // Removals are taken out of the text; additions are appended as one-liners.
    let additions: Vec<String> = if removed.is_empty() {
        out.apply_commands()
    } else {
        Vec::new()
    };
    out.candidate_text = append_lines(&base, &additions);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vendor;
    use crate::parser::parser_for;
    use pretty_assertions::assert_eq;

    const EDGE: &str = "/interface bridge\nadd name=bridge1\n/interface vlan\nadd interface=bridge1 name=vlan10 vlan-id=10\n\
                        /ip address\nadd address=10.0.10.1/24 interface=vlan10\nadd address=192.0.2.2/30 interface=ether1\n\
                        /ip route\nadd dst-address=10.20.0.0/16 gateway=10.0.10.254\nadd gateway=192.0.2.1\n";

    fn config() -> CanonicalConfig {
        parser_for(Vendor::Mikrotik).parse(EDGE).normalized
    }

    #[test]
    fn remove_vlan_drops_interface_and_addresses() {
        let change = render(&Intent::RemoveVlan { id: 10 }, &config(), EDGE, "t").expect("render");
        assert_eq!(
            change.apply_commands(),
            vec![
                "/ip address remove [find address=\"10.0.10.1/24\"]",
                "/interface vlan remove [find name=vlan10]",
            ]
        );
        assert_eq!(
            change.rollback_commands(),
            vec![
                "/interface vlan add interface=bridge1 name=vlan10 vlan-id=10",
                "/ip address add address=10.0.10.1/24 interface=vlan10",
            ]
        );
        let candidate = parser_for(Vendor::Mikrotik).parse(&change.candidate_text).normalized;
        assert!(candidate.vlan(10).is_none());
        assert!(candidate.interface("vlan10").is_none());
        assert!(candidate.interface("ether1").is_some());
    }

    #[test]
    fn remove_default_route_matches_implicit_destination() {
        let intent = Intent::RemoveStaticRoute {
            destination: "0.0.0.0/0".to_string(),
            next_hop: None,
        };
        let change = render(&intent, &config(), EDGE, "t").expect("render");
        assert_eq!(
            change.apply_commands(),
            vec!["/ip route remove [find dst-address=0.0.0.0/0 gateway=192.0.2.1]"]
        );
        let candidate = parser_for(Vendor::Mikrotik).parse(&change.candidate_text).normalized;
        assert_eq!(candidate.routing.static_routes.len(), 1);
    }

    #[test]
    fn gatewayless_route_is_refused_rather_than_dropped() {
        let raw = format!("{EDGE}/ip route\nadd dst-address=10.77.0.0/16 type=blackhole\n");
        let config = parser_for(Vendor::Mikrotik).parse(&raw).normalized;
        let intent = Intent::RemoveStaticRoute {
            destination: "10.77.0.0/16".to_string(),
            next_hop: None,
        };
        let err = render(&intent, &config, &raw, "t").expect_err("no gateway");
        assert!(err.contains("10.77.0.0/16"));
    }

    #[test]
    fn shutdown_is_appended_and_reparsed() {
        let intent = Intent::ShutdownInterface {
            interface: "ether1".to_string(),
        };
        let change = render(&intent, &config(), EDGE, "t").expect("render");
        assert!(change.candidate_text.ends_with("/interface set [find name=ether1] disabled=yes\n"));
        let candidate = parser_for(Vendor::Mikrotik).parse(&change.candidate_text).normalized;
        assert_eq!(candidate.interface("ether1").map(|i| i.admin_up), Some(false));
    }

    #[test]
    fn firewall_rule_is_tagged_for_rollback() {
        let intent = Intent::AddFirewallRule {
            action: PolicyAction::Deny,
            source: Some("10.0.40.7/24".to_string()),
            destination: None,
            protocol: Some("tcp".to_string()),
            port: Some(22),
            comment: None,
        };
        let change = render(&intent, &config(), EDGE, "netops-1a2b").expect("render");
        assert_eq!(
            change.steps[0],
            CommandStep::new(
                "/ip firewall filter add chain=forward action=drop src-address=10.0.40.0/24 protocol=tcp dst-port=22 comment=\"netops-1a2b\"",
                "/ip firewall filter remove [find comment=\"netops-1a2b\"]",
            )
        );
    }
}
