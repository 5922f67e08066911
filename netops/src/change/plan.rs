use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::collab::{DeviceInventory, DeviceRecord};
use super::error::WorkflowError;
use super::intent::Intent;
use crate::model::{CanonicalConfig, InterfaceKind, NatKind, Vendor};
use crate::parser::common::{ipv4_in_subnet, parse_cidr};

/// A fact the planner needed but could not establish for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingInfo {
    pub device_id: String,
    pub field: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Backup,
    Configure,
    Verify,
}

impl TaskAction {
    fn as_str(self) -> &'static str {
        match self {
            TaskAction::Backup => "backup",
            TaskAction::Configure => "configure",
            TaskAction::Verify => "verify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTask {
    pub task_id: String,
    pub device_id: String,
    pub action: TaskAction,
    pub depends_on: Vec<String>,
}

/// Per-device tasks plus a deterministic execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGraph {
    pub tasks: Vec<PlannedTask>,
    pub order: Vec<String>,
}

impl TaskGraph {
    fn for_devices(devices: &[String]) -> Self {
        let mut tasks = Vec::new();
        for device in devices {
            let mut previous: Option<String> = None;
            for action in [TaskAction::Backup, TaskAction::Configure, TaskAction::Verify] {
                let task_id = format!("{device}:{}", action.as_str());
                tasks.push(PlannedTask {
                    task_id: task_id.clone(),
                    device_id: device.clone(),
                    action,
                    depends_on: previous.take().into_iter().collect(),
                });
                previous = Some(task_id);
            }
        }
        let order = topological_order(&tasks);
        Self { tasks, order }
    }
}

/// Kahn's algorithm; ties break on task id so the order is stable.
fn topological_order(tasks: &[PlannedTask]) -> Vec<String> {
    let mut pending: BTreeMap<&str, usize> = tasks
        .iter()
        .map(|t| (t.task_id.as_str(), t.depends_on.len()))
        .collect();
    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, deps)| **deps == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(tasks.len());
    while let Some(next) = ready.pop_first() {
        pending.remove(next);
        order.push(next.to_string());
        for task in tasks.iter().filter(|t| t.depends_on.iter().any(|d| d == next)) {
            if let Some(count) = pending.get_mut(task.task_id.as_str()) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(task.task_id.as_str());
                }
            }
        }
    }
    order
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePlan {
    pub missing_info: Vec<MissingInfo>,
    pub task_graph: TaskGraph,
}

impl ChangePlan {
    pub fn missing_for(&self, device_id: &str) -> Vec<&MissingInfo> {
        self.missing_info
            .iter()
            .filter(|m| m.device_id == device_id)
            .collect()
    }
}

/// Resolve every device in scope and list what is missing to carry out
/// `intent` on it. Touches no device state.
pub fn plan_change(
    intent: &Intent,
    scope: &[String],
    inventory: &dyn DeviceInventory,
) -> Result<ChangePlan, WorkflowError> {
    if scope.is_empty() {
        return Err(WorkflowError::EmptyScope);
    }
    intent.validate().map_err(WorkflowError::InvalidIntent)?;

    let mut missing_info = Vec::new();
    for device_id in scope {
        let device = inventory
            .resolve_device(device_id)
            .ok_or_else(|| WorkflowError::UnknownDevice(device_id.clone()))?;
        missing_info.extend(missing_for_device(intent, &device));
    }

    let task_graph = TaskGraph::for_devices(scope);
    debug!(
        devices = scope.len(),
        missing = missing_info.len(),
        tasks = task_graph.tasks.len(),
        "planned change"
    );
    Ok(ChangePlan {
        missing_info,
        task_graph,
    })
}

fn missing_for_device(intent: &Intent, device: &DeviceRecord) -> Vec<MissingInfo> {
    let mut missing = Vec::new();
    let mut note = |field: &str, detail: String| {
        missing.push(MissingInfo {
            device_id: device.id.clone(),
            field: field.to_string(),
            detail,
        });
    };

    if device.last_known_config_text.trim().is_empty() {
        note("lastKnownConfigText", "no configuration backup on record".to_string());
    }
    let Some(config) = device.last_known_normalized.as_ref() else {
        note("lastKnownNormalizedConfig", "device has never been parsed".to_string());
        return missing;
    };

    match intent {
        Intent::AddVlan {
            id,
            parent_interface,
            ..
        } => {
            if config.vlan(*id).is_some() {
                note("vlan", format!("VLAN {id} already in use"));
            }
            match parent_interface {
                Some(parent) if config.interface(parent).is_none() => {
                    note("parentInterface", format!("interface {parent} not found"));
                }
                None if device.vendor != Vendor::Cisco => {
                    note("parentInterface", format!("{} VLAN interfaces need a parent", device.vendor));
                }
                _ => {}
            }
        }
        Intent::RemoveVlan { id } => {
            if config.vlan(*id).is_none() && vlan_interfaces(config, *id).is_empty() {
                note("vlan", format!("VLAN {id} not present"));
            }
        }
        Intent::AddStaticRoute {
            destination,
            next_hop,
        } => {
            if !connected(config, next_hop) {
                note("nextHop", format!("{next_hop} is not in a connected subnet"));
            }
            if !matching_routes(config, destination, Some(next_hop)).is_empty() {
                note("route", format!("route {destination} via {next_hop} already present"));
            }
        }
        Intent::RemoveStaticRoute {
            destination,
            next_hop,
        } => {
            if matching_routes(config, destination, next_hop.as_deref()).is_empty() {
                note("route", format!("route {destination} not present"));
            }
        }
        Intent::AddNatRule {
            kind: NatKind::Masquerade,
            out_interface,
            ..
        } => match out_interface {
            None => note("outInterface", "masquerade needs an outgoing interface".to_string()),
            Some(out) if config.interface(out).is_none() => {
                note("outInterface", format!("interface {out} not found"));
            }
            Some(_) => {}
        },
        Intent::ShutdownInterface { interface } => match config.interface(interface) {
            None => note("interface", format!("interface {interface} not found")),
            Some(iface) if !iface.admin_up => {
                note("interface", format!("interface {interface} already shut down"));
            }
            Some(_) => {}
        },
        Intent::AddFirewallRule { .. } | Intent::AddNatRule { .. } => {}
    }
    missing
}

/// Whether `addr` falls inside a subnet bound to any interface.
pub(crate) fn connected(config: &CanonicalConfig, addr: &str) -> bool {
    interface_for(config, addr).is_some()
}

pub(crate) fn interface_for<'a>(config: &'a CanonicalConfig, addr: &str) -> Option<&'a str> {
    config.interfaces.iter().find_map(|iface| {
        iface
            .ips
            .iter()
            .any(|ip| ipv4_in_subnet(addr, &ip.address, ip.prefix))
            .then_some(iface.name.as_str())
    })
}

pub(crate) fn vlan_interfaces(config: &CanonicalConfig, id: u16) -> Vec<&crate::model::Interface> {
    config
        .interfaces
        .iter()
        .filter(|i| i.kind == InterfaceKind::Vlan && i.vlan_id == Some(id))
        .collect()
}

/// Static routes to `destination` (CIDR), optionally via `next_hop`.
pub(crate) fn matching_routes<'a>(
    config: &'a CanonicalConfig,
    destination: &str,
    next_hop: Option<&str>,
) -> Vec<&'a crate::model::StaticRoute> {
    let Some(dest) = parse_cidr(destination) else {
        return Vec::new();
    };
    config
        .routing
        .static_routes
        .iter()
        .filter(|r| r.destination == dest.address && r.prefix == dest.prefix)
        .filter(|r| next_hop.is_none_or(|nh| r.next_hop.as_deref() == Some(nh)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::collab::StaticInventory;
    use pretty_assertions::assert_eq;

    const EDGE: &str = "/system identity\nset name=edge\n/interface vlan\nadd interface=bridge1 name=vlan10 vlan-id=10\n\
                        /ip address\nadd address=10.0.0.1/24 interface=ether1\n";

    fn inventory() -> StaticInventory {
        StaticInventory::new([
            DeviceRecord::from_text("edge", Vendor::Mikrotik, EDGE),
            DeviceRecord::from_text("core", Vendor::Cisco, "hostname core\ninterface GigabitEthernet0/1\n ip address 10.1.0.1 255.255.255.0\n"),
        ])
    }

    #[test]
    fn empty_scope_and_unknown_devices_fail() {
        let intent = Intent::RemoveVlan { id: 10 };
        assert!(matches!(plan_change(&intent, &[], &inventory()), Err(WorkflowError::EmptyScope)));
        assert!(matches!(
            plan_change(&intent, &["ghost".to_string()], &inventory()),
            Err(WorkflowError::UnknownDevice(id)) if id == "ghost"
        ));
    }

    #[test]
    fn task_graph_orders_backup_configure_verify() {
        let intent = Intent::RemoveVlan { id: 10 };
        let plan = plan_change(&intent, &["edge".to_string(), "core".to_string()], &inventory()).expect("plan");
        assert_eq!(
            plan.task_graph.order,
            vec![
                "core:backup",
                "core:configure",
                "core:verify",
                "edge:backup",
                "edge:configure",
                "edge:verify"
            ]
        );
        let configure = &plan.task_graph.tasks[1];
        assert_eq!(configure.depends_on, vec!["edge:backup"]);
    }

    #[test]
    fn missing_info_reports_device_facts() {
        let vlan = Intent::AddVlan {
            id: 10,
            name: None,
            gateway: None,
            parent_interface: None,
        };
        let plan = plan_change(&vlan, &["edge".to_string()], &inventory()).expect("plan");
        let fields: Vec<&str> = plan.missing_info.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(fields, vec!["vlan", "parentInterface"]);

        let route = Intent::AddStaticRoute {
            destination: "10.50.0.0/16".to_string(),
            next_hop: "192.0.2.1".to_string(),
        };
        let plan = plan_change(&route, &["core".to_string()], &inventory()).expect("plan");
        assert_eq!(plan.missing_for("core")[0].field, "nextHop");

        let reachable = Intent::AddStaticRoute {
            destination: "10.50.0.0/16".to_string(),
            next_hop: "10.1.0.254".to_string(),
        };
        let plan = plan_change(&reachable, &["core".to_string()], &inventory()).expect("plan");
        assert!(plan.missing_info.is_empty());
    }
}
