//! Plan model: a reviewable summary of the declared graph.

use crate::graph::Graph;
use crate::spec::{EndpointService, ValidatedStack};
use crate::stack::StackOutputs;
use crate::stack::schedule::{self, LifecycleAction, ScheduledAction};

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct PlanEntryView {
    /// Position in declaration order (1-based).
    pub order: usize,
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkView {
    pub cidr: String,
    pub public_subnets: Vec<String>,
    pub private_subnets: Vec<String>,
    pub relay: String,
    pub workload_subnet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleView {
    pub action: LifecycleAction,
    pub name: String,
    pub expression: String,
    pub timezone: String,
    pub instance_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalsView {
    pub resources: usize,
    pub parameters: usize,
    pub outputs: usize,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub project: String,
    pub stack_type: String,
    pub network: NetworkView,
    pub endpoints: Vec<EndpointService>,
    pub schedules: Vec<ScheduleView>,
    /// Days with no stop action; `None` when the stop expression is date-dependent.
    pub days_without_stop: Option<Vec<&'static str>>,
    pub resources: Vec<PlanEntryView>,
    pub totals: TotalsView,
}

pub fn build_plan_summary(
    graph: &Graph,
    stack: &ValidatedStack,
    outputs: &StackOutputs,
) -> PlanSummary {
    let resources: Vec<PlanEntryView> = graph
        .declarations()
        .iter()
        .enumerate()
        .map(|(i, decl)| PlanEntryView {
            order: i + 1,
            id: decl.id.to_string(),
            kind: decl.kind.to_string(),
            name: decl.name.clone(),
            depends_on: graph
                .dependencies(decl)
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
        .collect();

    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    for decl in graph.declarations() {
        *by_type.entry(decl.kind.to_string()).or_default() += 1;
    }

    let subnets = |group: &crate::stack::network::SubnetGroup| -> Vec<String> {
        group.subnets.iter().map(|s| s.cidr.to_string()).collect()
    };
    let topology = &outputs.topology;

    PlanSummary {
        project: stack.naming.project().to_string(),
        stack_type: stack.naming.stack_type().to_string(),
        network: NetworkView {
            cidr: topology.cidr.to_string(),
            public_subnets: subnets(&topology.public),
            private_subnets: subnets(&topology.private),
            relay: topology.relay.instance.id().to_string(),
            workload_subnet: outputs.workload.subnet.id().to_string(),
        },
        endpoints: outputs.endpoints.iter().map(|e| e.service).collect(),
        schedules: vec![
            schedule_view(&outputs.schedule.start),
            schedule_view(&outputs.schedule.stop),
        ],
        days_without_stop: schedule::uncovered_days(&stack.schedule),
        totals: TotalsView {
            resources: graph.len(),
            parameters: graph.parameters().len(),
            outputs: graph.outputs().len(),
            by_type,
        },
        resources,
    }
}

fn schedule_view(action: &ScheduledAction) -> ScheduleView {
    ScheduleView {
        action: action.action,
        name: action.name.clone(),
        expression: action.expression.to_string(),
        timezone: action.timezone.to_string(),
        instance_ids: action
            .instance_ids
            .iter()
            .map(|r| r.id().to_string())
            .collect(),
    }
}
