//! Stack assembly: the six components threaded through one graph in
//! dependency order.
//!
//! network -> identity -> endpoints -> compute -> traffic -> schedule
//!
//! Each component only receives handles returned by the ones before it, so the
//! declaration order is the build order the provisioning engine will follow.

pub mod boot;
pub mod compute;
pub mod endpoints;
pub mod identity;
pub mod network;
pub mod schedule;
pub mod traffic;

use crate::Result;
use crate::error::BuildError;
use crate::graph::Graph;
use crate::spec::ValidatedStack;

use boot::BootPayload;
use compute::WorkloadInstance;
use endpoints::PrivateEndpoint;
use identity::TrustRole;
use network::NetworkTopology;
use schedule::LifecycleSchedule;

use serde_json::{Value, json};
use std::path::Path;

/// Everything `build` declared, as typed handles.
#[derive(Debug, Clone)]
pub struct StackOutputs {
    pub topology: NetworkTopology,
    pub management_role: TrustRole,
    pub scheduler_role: TrustRole,
    pub endpoints: Vec<PrivateEndpoint>,
    pub workload: WorkloadInstance,
    pub relay_ingress: crate::graph::ResourceRef,
    pub schedule: LifecycleSchedule,
}

/// Declare the whole stack into `graph`.
///
/// Inputs that can fail (the boot configuration file in particular) are
/// resolved before the first declaration: on error `graph` is left empty.
pub fn build(graph: &mut Graph, stack: &ValidatedStack, user_data: &Path) -> Result<StackOutputs> {
    // Pre-flight.
    let payload = BootPayload::load(user_data, &stack.workload.boot_content_type)?;
    if !graph.is_empty() {
        anyhow::bail!(
            "{}",
            crate::diagnostics::error_message("stack must be built into an empty graph")
        );
    }

    let names = &stack.names;

    // 1) Network topology (+ relay).
    let topology = network::build_topology(graph, &stack.network, names)?;

    // 2) Identity.
    let management_role = identity::bind(
        graph,
        "ManagementRole",
        &names.management_role,
        &stack.management_role,
    )?;
    let scheduler_role = identity::bind(
        graph,
        "SchedulerRole",
        &names.scheduler_role,
        &stack.scheduler_role,
    )?;

    // 3) Private endpoints.
    let endpoints = endpoints::wire(graph, &topology, names)?;

    // 4) Workload.
    let workload = compute::provision(
        graph,
        &topology,
        &management_role,
        &stack.workload,
        &payload,
        names,
    )?;

    // 5) Relay accepts everything from the workload.
    let relay_ingress = traffic::allow_from(
        graph,
        "RelayIngressFromWorkload",
        &topology.relay.security_group,
        &workload.security_group,
    )?;

    // 6) Power schedule for both instances.
    let schedule = schedule::declare(
        graph,
        &[&topology.relay.instance, &workload.instance],
        &scheduler_role,
        &stack.schedule,
        names,
    )?;

    add_outputs(graph, &topology, &workload, &schedule)?;
    graph.validate()?;

    tracing::info!(
        project = stack.naming.project(),
        resources = graph.len(),
        "stack graph complete"
    );

    Ok(StackOutputs {
        topology,
        management_role,
        scheduler_role,
        endpoints,
        workload,
        relay_ingress,
        schedule,
    })
}

fn add_outputs(
    graph: &mut Graph,
    topology: &NetworkTopology,
    workload: &WorkloadInstance,
    schedule: &LifecycleSchedule,
) -> std::result::Result<(), BuildError> {
    graph.add_output("VpcId", "Network id", topology.vpc.reference())?;
    graph.add_output(
        "RelayInstanceId",
        "NAT relay instance id",
        topology.relay.instance.reference(),
    )?;
    graph.add_output(
        "WorkloadInstanceId",
        "Workload instance id",
        workload.instance.reference(),
    )?;
    graph.add_output(
        "StartScheduleName",
        "Schedule that starts both instances",
        json!(schedule.start.name),
    )?;
    graph.add_output(
        "StopScheduleName",
        "Schedule that stops both instances",
        json!(schedule.stop.name),
    )?;
    Ok(())
}

pub(crate) fn name_tag(name: &str) -> Value {
    json!([{ "Key": "Name", "Value": name }])
}

/// The i-th availability zone of the deployment region.
pub(crate) fn zone(i: usize) -> Value {
    json!({ "Fn::Select": [i, { "Fn::GetAZs": "" }] })
}

pub(crate) fn all_traffic_egress() -> Value {
    json!({
        "CidrIp": "0.0.0.0/0",
        "Description": "Allow all outbound traffic by default",
        "IpProtocol": "-1",
    })
}
