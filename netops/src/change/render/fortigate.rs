use super::{append_lines, drop_ranges, host, network, CommandStep, RenderedChange};
use crate::change::intent::Intent;
use crate::change::plan::{interface_for, vlan_interfaces};
use crate::model::{CanonicalConfig, Interface, IpBinding, NatKind, PolicyAction};
use crate::parser::common::{mask_to_prefix, parse_cidr, prefix_to_mask, split_words};
use crate::parser::fortigate::edit_spans;

const INDENT: &str = "    ";

/// One `config <section>` block holding a single `edit`.
struct EditBlock {
    section: &'static str,
    id: String,
    sets: Vec<String>,
}

impl EditBlock {
    fn new(section: &'static str, id: impl Into<String>) -> Self {
        Self {
            section,
            id: id.into(),
            sets: Vec::new(),
        }
    }

    fn set(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.sets.push(format!("set {key} {}", value.as_ref()));
        self
    }

    fn render(&self) -> String {
        let mut lines = vec![format!("config {}", self.section), format!("{INDENT}edit {}", self.id)];
        lines.extend(self.sets.iter().map(|s| format!("{INDENT}{INDENT}{s}")));
        lines.push(format!("{INDENT}next"));
        lines.push("end".to_string());
        lines.join("\n")
    }

    fn delete(&self) -> String {
        format!("config {}\n{INDENT}delete {}\nend", self.section, self.id)
    }

    /// Step that creates the entry and deletes it on rollback.
    fn step(&self) -> CommandStep {
        CommandStep::new(self.render(), self.delete())
    }
}

fn quoted(value: &str) -> String {
    format!("\"{value}\"")
}

fn ip_mask(binding: &IpBinding) -> String {
    format!("{} {}", binding.address, prefix_to_mask(binding.prefix))
}

/// Next free numeric edit id in `section`.
fn next_id(raw: &str, section: &str) -> u32 {
    edit_spans(raw, section)
        .iter()
        .filter_map(|(id, _, _)| id.parse::<u32>().ok())
        .max()
        .map_or(1, |max| max + 1)
}

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
                .ok_or("FortiOS VLAN interfaces need a parent interface")?;
            let ifname = name.clone().unwrap_or_else(|| format!("vlan{id}"));
            let mut block = EditBlock::new("system interface", quoted(&ifname))
                .set("vdom", quoted("root"))
                .set("interface", quoted(parent))
                .set("vlanid", id.to_string());
            if let Some(gateway) = gateway {
                block = block
                    .set("ip", ip_mask(&host(gateway)?))
                    .set("allowaccess", "ping");
            }
            out.prechecks = vec![
                format!("show system interface {ifname}"),
                format!("get system interface physical {parent}"),
            ];
            out.steps.push(block.step());
            out.postchecks.push(format!("show system interface {ifname}"));
        }
        Intent::RemoveVlan { id } => {
            let interfaces = vlan_interfaces(config, *id);
            if interfaces.is_empty() {
                return Err(format!("no VLAN interface carries VLAN {id}"));
            }
            let spans = edit_spans(raw, "system interface");
            for iface in interfaces {
                let block = interface_block(iface);
                out.prechecks.push(format!("show system interface {}", iface.name));
                out.steps.push(CommandStep::new(block.delete(), block.render()));
                removed.extend(
                    spans
                        .iter()
                        .filter(|(name, _, _)| *name == iface.name)
                        .map(|(_, start, end)| (*start, *end)),
                );
            }
            out.postchecks.push(format!("get system interface | grep vlanid {id}"));
        }
        Intent::AddStaticRoute {
            destination,
            next_hop,
        } => {
            let dest = network(destination)?;
            let mut block = EditBlock::new("router static", next_id(raw, "router static").to_string())
                .set("dst", ip_mask(&dest))
                .set("gateway", next_hop);
            if let Some(device) = interface_for(config, next_hop) {
                block = block.set("device", quoted(device));
            }
            out.prechecks = vec![
                format!("get router info routing-table details {}", dest.address),
                format!("execute ping {next_hop}"),
            ];
            out.steps.push(block.step());
            out.postchecks.push(format!("get router info routing-table details {}", dest.address));
        }
        Intent::RemoveStaticRoute {
            destination,
            next_hop,
        } => {
            let dest = network(destination)?;
            let lines: Vec<&str> = raw.lines().collect();
            out.prechecks.push(format!("get router info routing-table details {}", dest.address));
            for (id, start, end) in edit_spans(raw, "router static") {
                let body = &lines[start - 1..end];
                if !route_span_matches(body, &dest, next_hop.as_deref()) {
                    continue;
                }
                let restore = format!("config router static\n{}\nend", body.join("\n"));
                out.steps.push(CommandStep::new(
                    format!("config router static\n{INDENT}delete {id}\nend"),
                    restore,
                ));
                removed.push((start, end));
            }
            if out.steps.is_empty() {
                return Err(format!("no route to {} on record", dest.cidr()));
            }
            out.postchecks.push(format!("get router info routing-table details {}", dest.address));
        }
        Intent::AddFirewallRule {
            action,
            source,
            destination,
            protocol,
            port,
            comment,
        } => {
            let srcaddr = address_object(&mut out, &format!("{tag}-src"), source.as_deref())?;
            let dstaddr = address_object(&mut out, &format!("{tag}-dst"), destination.as_deref())?;
            let service = match (protocol.as_deref(), port) {
                (Some(proto @ ("tcp" | "udp")), Some(port)) => {
                    let svc = EditBlock::new("firewall service custom", quoted(&format!("{tag}-svc")))
                        .set(&format!("{proto}-portrange"), port.to_string());
                    out.steps.push(svc.step());
                    format!("{tag}-svc")
                }
                (Some("tcp"), None) => "ALL_TCP".to_string(),
                (Some("udp"), None) => "ALL_UDP".to_string(),
                (Some("icmp"), _) => "ALL_ICMP".to_string(),
                _ => "ALL".to_string(),
            };
            let verdict = if *action == PolicyAction::Accept { "accept" } else { "deny" };
            let mut policy = EditBlock::new("firewall policy", next_id(raw, "firewall policy").to_string())
                .set("name", quoted(tag))
                .set("srcintf", quoted("any"))
                .set("dstintf", quoted("any"))
                .set("srcaddr", quoted(&srcaddr))
                .set("dstaddr", quoted(&dstaddr))
                .set("action", verdict)
                .set("schedule", quoted("always"))
                .set("service", quoted(&service))
                .set("logtraffic", "all");
            if let Some(comment) = comment {
                policy = policy.set("comments", quoted(comment));
            }
            out.prechecks.push("show firewall policy".to_string());
            out.steps.push(policy.step());
            out.postchecks.push(format!("show firewall policy {}", policy.id));
        }
        Intent::AddNatRule {
            kind,
            destination,
            protocol,
            port,
            out_interface,
            translated_address,
            translated_port,
            ..
        } => {
            let block = match kind {
                NatKind::Dnat => {
                    let extip = host(destination.as_deref().ok_or("dnat needs a destination")?)?;
                    let mapped = translated_address.as_deref().ok_or("dnat needs a translated address")?;
                    let mut vip = EditBlock::new("firewall vip", quoted(&format!("{tag}-vip")))
                        .set("extip", &extip.address)
                        .set("mappedip", quoted(mapped))
                        .set("extintf", quoted("any"));
                    if let Some(port) = port {
                        vip = vip
                            .set("portforward", "enable")
                            .set("protocol", protocol.as_deref().unwrap_or("tcp"))
                            .set("extport", port.to_string())
                            .set("mappedport", translated_port.unwrap_or(*port).to_string());
                    }
                    vip
                }
                NatKind::Snat => {
                    let addr = translated_address.as_deref().ok_or("snat needs a translated address")?;
                    EditBlock::new("firewall ippool", quoted(&format!("{tag}-pool")))
                        .set("type", "one-to-one")
                        .set("startip", addr)
                        .set("endip", addr)
                }
                NatKind::Masquerade => {
                    let addr = match (translated_address.as_deref(), out_interface.as_deref()) {
                        (Some(addr), _) => addr.to_string(),
                        (None, Some(name)) => config
                            .interface(name)
                            .and_then(|i| i.ips.first())
                            .map(|ip| ip.address.clone())
                            .ok_or_else(|| format!("interface {name} has no address to masquerade behind"))?,
                        (None, None) => {
                            return Err("masquerade needs a translated address or an outgoing interface".to_string())
                        }
                    };
                    EditBlock::new("firewall ippool", quoted(&format!("{tag}-pool")))
                        .set("type", "overload")
                        .set("startip", &addr)
                        .set("endip", &addr)
                }
            };
            out.prechecks.push(format!("show {}", block.section));
            out.postchecks.push(format!("show {} {}", block.section, block.id));
            out.steps.push(block.step());
        }
        Intent::ShutdownInterface { interface } => {
            if config.interface(interface).is_none() {
                return Err(format!("interface {interface} not found"));
            }
            let down = EditBlock::new("system interface", quoted(interface)).set("status", "down");
            let up = EditBlock::new("system interface", quoted(interface)).set("status", "up");
            out.prechecks.push(format!("get system interface physical {interface}"));
            out.steps.push(CommandStep::new(down.render(), up.render()));
            out.postchecks.push(format!("get system interface physical {interface}"));
        }
    }

    out.candidate_text = if removed.is_empty() {
        append_lines(raw, &out.apply_commands())
    } else {
        drop_ranges(raw, &removed)
    };
    Ok(out)
}

/// Name of the address to reference, creating an object for anything narrower than `all`.
fn address_object(out: &mut RenderedChange, name: &str, cidr: Option<&str>) -> Result<String, String> {
    let Some(cidr) = cidr else {
        return Ok("all".to_string());
    };
    let net = network(cidr)?;
    if net.prefix == 0 {
        return Ok("all".to_string());
    }
    let object = EditBlock::new("firewall address", quoted(name)).set("subnet", ip_mask(&net));
    out.steps.push(object.step());
    Ok(name.to_string())
}

fn interface_block(iface: &Interface) -> EditBlock {
    let mut block = EditBlock::new("system interface", quoted(&iface.name)).set("vdom", quoted("root"));
    if let Some(parent) = &iface.parent {
        block = block.set("interface", quoted(parent));
    }
    if let Some(id) = iface.vlan_id {
        block = block.set("vlanid", id.to_string());
    }
    if let Some(ip) = iface.ips.first() {
        block = block.set("ip", ip_mask(ip));
    }
    if let Some(alias) = &iface.description {
        block = block.set("alias", quoted(alias));
    }
    if !iface.admin_up {
        block = block.set("status", "down");
    }
    block
}

fn route_span_matches(body: &[&str], dest: &IpBinding, next_hop: Option<&str>) -> bool {
    let mut dst: Option<(String, u8)> = None;
    let mut gateway: Option<String> = None;
    for line in body {
        let words = split_words(line.trim());
        match words.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["set", "dst", addr, mask] => {
                dst = parse_cidr(addr).zip(mask_to_prefix(mask)).map(|(b, p)| (b.address, p));
            }
            ["set", "dst", cidr] => dst = parse_cidr(cidr).map(|b| (b.address, b.prefix)),
            ["set", "gateway", gw] => gateway = Some(gw.to_string()),
            _ => {}
        }
    }
    let (address, prefix) = dst.unwrap_or_else(|| ("0.0.0.0".to_string(), 0));
    address == dest.address
        && prefix == dest.prefix
        && next_hop.is_none_or(|nh| gateway.as_deref() == Some(nh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vendor;
    use crate::parser::parser_for;
    use pretty_assertions::assert_eq;

    const FW: &str = "config system global\n    set hostname \"fw1\"\nend\nconfig system interface\n    edit \"port1\"\n        set ip 198.51.100.2 255.255.255.248\n    next\n    edit \"port2\"\n        set ip 10.0.10.1 255.255.255.0\n    next\n    edit \"users\"\n        set vdom \"root\"\n        set ip 10.0.20.1 255.255.255.0\n        set interface \"port2\"\n        set vlanid 20\n    next\nend\nconfig router static\n    edit 1\n        set gateway 198.51.100.1\n        set device \"port1\"\n    next\n    edit 4\n        set dst 10.60.0.0 255.255.0.0\n        set gateway 10.0.10.254\n    next\nend\n";

    fn config() -> CanonicalConfig {
        parser_for(Vendor::Fortigate).parse(FW).normalized
    }

    #[test]
    fn new_route_takes_next_free_id_and_device() {
        let intent = Intent::AddStaticRoute {
            destination: "10.50.0.0/16".to_string(),
            next_hop: "10.0.10.254".to_string(),
        };
        let change = render(&intent, &config(), FW, "netops-t").expect("render");
        assert_eq!(
            change.steps[0].apply,
            "config router static\n    edit 5\n        set dst 10.50.0.0 255.255.0.0\n        set gateway 10.0.10.254\n        set device \"port2\"\n    next\nend"
        );
        assert_eq!(change.steps[0].rollback, "config router static\n    delete 5\nend");
        let candidate = parser_for(Vendor::Fortigate).parse(&change.candidate_text).normalized;
        assert_eq!(candidate.routing.static_routes.len(), 3);
    }

    #[test]
    fn remove_default_route_restores_span() {
        let intent = Intent::RemoveStaticRoute {
            destination: "0.0.0.0/0".to_string(),
            next_hop: None,
        };
        let change = render(&intent, &config(), FW, "netops-t").expect("render");
        assert_eq!(change.apply_commands(), vec!["config router static\n    delete 1\nend"]);
        assert!(change.steps[0].rollback.contains("set gateway 198.51.100.1"));
        let candidate = parser_for(Vendor::Fortigate).parse(&change.candidate_text).normalized;
        assert_eq!(candidate.routing.static_routes.len(), 1);
        assert_eq!(candidate.routing.static_routes[0].destination, "10.60.0.0");
    }

    #[test]
    fn remove_vlan_recreates_interface_on_rollback() {
        let change = render(&Intent::RemoveVlan { id: 20 }, &config(), FW, "netops-t").expect("render");
        assert_eq!(change.apply_commands(), vec!["config system interface\n    delete \"users\"\nend"]);
        assert!(change.steps[0].rollback.contains("set vlanid 20"));
        assert!(change.steps[0].rollback.contains("set ip 10.0.20.1 255.255.255.0"));
        let candidate = parser_for(Vendor::Fortigate).parse(&change.candidate_text).normalized;
        assert!(candidate.interface("users").is_none());
    }

    #[test]
    fn firewall_rule_objects_are_deleted_after_policy() {
        let intent = Intent::AddFirewallRule {
            action: PolicyAction::Accept,
            source: Some("10.0.20.0/24".to_string()),
            destination: None,
            protocol: Some("tcp".to_string()),
            port: Some(443),
            comment: Some("web".to_string()),
        };
        let change = render(&intent, &config(), FW, "netops-t").expect("render");
        let rollback = change.rollback_commands();
        assert_eq!(rollback.len(), 3);
        assert_eq!(rollback[0], "config firewall policy\n    delete 1\nend");
        assert_eq!(rollback[2], "config firewall address\n    delete \"netops-t-src\"\nend");

        let candidate = parser_for(Vendor::Fortigate).parse(&change.candidate_text).normalized;
        let policy = &candidate.security.firewall_policies[0];
        assert_eq!(policy.src_addr.as_deref(), Some("netops-t-src"));
        assert_eq!(policy.dst_addr.as_deref(), Some("all"));
        assert!(policy.log);
    }

    #[test]
    fn masquerade_uses_interface_address() {
        let intent = Intent::AddNatRule {
            kind: NatKind::Masquerade,
            source: Some("10.0.20.0/24".to_string()),
            destination: None,
            protocol: None,
            port: None,
            out_interface: Some("port1".to_string()),
            translated_address: None,
            translated_port: None,
        };
        let change = render(&intent, &config(), FW, "netops-t").expect("render");
        assert!(change.steps[0].apply.contains("set startip 198.51.100.2"));

        let missing = Intent::AddNatRule {
            kind: NatKind::Masquerade,
            source: None,
            destination: None,
            protocol: None,
            port: None,
            out_interface: None,
            translated_address: None,
            translated_port: None,
        };
        assert!(render(&missing, &config(), FW, "netops-t").is_err());
    }

    #[test]
    fn shutdown_sets_status() {
        let intent = Intent::ShutdownInterface {
            interface: "port2".to_string(),
        };
        let change = render(&intent, &config(), FW, "netops-t").expect("render");
        let candidate = parser_for(Vendor::Fortigate).parse(&change.candidate_text).normalized;
        assert_eq!(candidate.interface("port2").map(|i| i.admin_up), Some(false));
        assert!(change.rollback_commands()[0].contains("set status up"));
    }
}
