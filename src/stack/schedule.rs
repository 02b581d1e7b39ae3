//! Weekday power lifecycle: one start and one stop action, each targeting the
//! relay and the workload together.
//!
//! Both instances share a single id list. A running workload behind a stopped
//! relay has no egress; a running relay without a workload only costs money.

use crate::diagnostics;
use crate::error::BuildError;
use crate::graph::{Decl, Graph, ResourceRef, join};
use crate::spec::cron::day_name;
use crate::spec::{CronExpr, ResourceNames, SchedulePlan, Timezone};
use crate::stack::identity::TrustRole;

use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Start,
    Stop,
}

impl LifecycleAction {
    pub fn target_arn(self) -> &'static str {
        match self {
            LifecycleAction::Start => "arn:aws:scheduler:::aws-sdk:ec2:startInstances",
            LifecycleAction::Stop => "arn:aws:scheduler:::aws-sdk:ec2:stopInstances",
        }
    }

    fn description(self) -> &'static str {
        match self {
            LifecycleAction::Start => "Event that start EC2 instance(s)",
            LifecycleAction::Stop => "Event that stop EC2 instance(s)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledAction {
    pub action: LifecycleAction,
    pub schedule: ResourceRef,
    pub name: String,
    pub expression: CronExpr,
    pub timezone: Timezone,
    pub instance_ids: Vec<ResourceRef>,
}

#[derive(Debug, Clone)]
pub struct LifecycleSchedule {
    pub start: ScheduledAction,
    pub stop: ScheduledAction,
}

/// Declare the start/stop pair for `targets`.
///
/// Every target is checked before the first schedule is declared, so either
/// both actions exist or neither does.
pub fn declare(
    graph: &mut Graph,
    targets: &[&ResourceRef],
    role: &TrustRole,
    plan: &SchedulePlan,
    names: &ResourceNames,
) -> Result<LifecycleSchedule, BuildError> {
    for target in targets {
        graph.require("lifecycle schedule", target, "AWS::EC2::Instance")?;
    }
    graph.require("lifecycle schedule", &role.role, "AWS::IAM::Role")?;

    warn_uncovered_days(plan);

    let instance_ids: Vec<ResourceRef> = targets.iter().map(|t| (*t).clone()).collect();
    let start = declare_one(
        graph,
        "StartSchedule",
        &names.start_schedule,
        LifecycleAction::Start,
        &plan.start,
        &plan.timezone,
        &instance_ids,
        role,
    )?;
    let stop = declare_one(
        graph,
        "StopSchedule",
        &names.stop_schedule,
        LifecycleAction::Stop,
        &plan.stop,
        &plan.timezone,
        &instance_ids,
        role,
    )?;

    tracing::info!(
        start = %plan.start,
        stop = %plan.stop,
        timezone = %plan.timezone,
        targets = instance_ids.len(),
        "lifecycle schedule declared"
    );
    Ok(LifecycleSchedule { start, stop })
}

#[allow(clippy::too_many_arguments)]
fn declare_one(
    graph: &mut Graph,
    logical_id: &str,
    name: &str,
    action: LifecycleAction,
    expression: &CronExpr,
    timezone: &Timezone,
    instance_ids: &[ResourceRef],
    role: &TrustRole,
) -> Result<ScheduledAction, BuildError> {
    let schedule = graph.declare(
        Decl::new(logical_id, "AWS::Scheduler::Schedule")
            .name(name)
            .properties(json!({
                "Name": name,
                "Description": action.description(),
                "FlexibleTimeWindow": { "Mode": "OFF" },
                "ScheduleExpression": expression.to_string(),
                "ScheduleExpressionTimezone": timezone.as_str(),
                "State": "ENABLED",
                "Target": {
                    "Arn": action.target_arn(),
                    "RoleArn": role.arn(),
                    "Input": instance_ids_input(instance_ids),
                },
            })),
    )?;

    Ok(ScheduledAction {
        action,
        schedule,
        name: name.to_string(),
        expression: expression.clone(),
        timezone: timezone.clone(),
        instance_ids: instance_ids.to_vec(),
    })
}

/// `{"InstanceIds":["<id>","<id>"]}` with ids resolved at deploy time.
pub fn instance_ids_input(instance_ids: &[ResourceRef]) -> Value {
    let mut parts = vec![json!("{\"InstanceIds\":[")];
    for (i, id) in instance_ids.iter().enumerate() {
        if i > 0 {
            parts.push(json!(","));
        }
        parts.push(json!("\""));
        parts.push(id.reference());
        parts.push(json!("\""));
    }
    parts.push(json!("]}"));
    join(parts)
}

/// Days on which instances started by hand (or left running) are never stopped.
pub fn uncovered_days(plan: &SchedulePlan) -> Option<Vec<&'static str>> {
    let stop_days = plan.stop.days_of_week()?;
    Some(
        (1..=7u8)
            .filter(|d| !stop_days.contains(d))
            .map(day_name)
            .collect(),
    )
}

fn warn_uncovered_days(plan: &SchedulePlan) {
    match uncovered_days(plan) {
        Some(days) if !days.is_empty() => diagnostics::warn(format!(
            "no stop action fires on {}; instances running then stay up until the next scheduled stop",
            days.join(",")
        )),
        Some(_) => {}
        None => diagnostics::warn(format!(
            "stop expression {} depends on the calendar; days without a stop action were not checked",
            plan.stop
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{RoleSpec, StackConfig};
    use crate::stack::identity;
    use pretty_assertions::assert_eq;

    fn fixture() -> (Graph, ResourceRef, ResourceRef, TrustRole, crate::spec::ValidatedStack) {
        let stack = StackConfig::default().validate_and_build(Some("demo")).unwrap();
        let mut graph = Graph::new();
        let relay = graph.declare(Decl::new("RelayInstance", "AWS::EC2::Instance")).unwrap();
        let workload = graph.declare(Decl::new("WorkloadInstance", "AWS::EC2::Instance")).unwrap();
        let role = identity::bind(
            &mut graph,
            "SchedulerRole",
            &stack.names.scheduler_role,
            &RoleSpec {
                principal: "scheduler.amazonaws.com".into(),
                managed_policies: vec![],
            },
        )
        .unwrap();
        (graph, relay, workload, role, stack)
    }

    #[test]
    fn start_and_stop_target_the_same_ids() {
        let (mut graph, relay, workload, role, stack) = fixture();
        let sched = declare(&mut graph, &[&relay, &workload], &role, &stack.schedule, &stack.names).unwrap();

        assert_eq!(sched.start.instance_ids, sched.stop.instance_ids);
        assert_eq!(sched.start.instance_ids, vec![relay.clone(), workload.clone()]);

        let input = |id: &str| graph.get(id).unwrap().properties["Target"]["Input"].clone();
        assert_eq!(input("StartSchedule"), input("StopSchedule"));
        assert_eq!(input("StartSchedule"), instance_ids_input(&[relay, workload]));
        assert_eq!(graph.count_of("AWS::Scheduler::Schedule"), 2);
    }

    #[test]
    fn schedule_fields_follow_the_plan() {
        let (mut graph, relay, workload, role, stack) = fixture();
        declare(&mut graph, &[&relay, &workload], &role, &stack.schedule, &stack.names).unwrap();

        let start = &graph.get("StartSchedule").unwrap().properties;
        assert_eq!(start["ScheduleExpression"], json!("cron(00 7 ? * MON-FRI *)"));
        assert_eq!(start["ScheduleExpressionTimezone"], json!("Asia/Tokyo"));
        assert_eq!(start["FlexibleTimeWindow"]["Mode"], json!("OFF"));
        assert_eq!(
            start["Target"]["Arn"],
            json!("arn:aws:scheduler:::aws-sdk:ec2:startInstances")
        );
        assert_eq!(start["Target"]["RoleArn"], role.arn());
        assert_eq!(start["Name"], json!("demo-Ec2LifecycleStack-ec2-start-scheduler"));

        let stop = &graph.get("StopSchedule").unwrap().properties;
        assert_eq!(stop["ScheduleExpression"], json!("cron(00 22 ? * MON-FRI *)"));
        assert_eq!(
            stop["Target"]["Arn"],
            json!("arn:aws:scheduler:::aws-sdk:ec2:stopInstances")
        );
    }

    #[test]
    fn unresolved_target_declares_no_schedule() {
        let (mut graph, relay, _, role, stack) = fixture();
        let mut elsewhere = Graph::new();
        let stray = elsewhere
            .declare(Decl::new("StrayInstance", "AWS::EC2::Instance"))
            .unwrap();
        let before = graph.len();

        let err = declare(&mut graph, &[&relay, &stray], &role, &stack.schedule, &stack.names).unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedReference { .. }));
        assert_eq!(graph.len(), before);
        assert_eq!(graph.count_of("AWS::Scheduler::Schedule"), 0);
    }

    #[test]
    fn input_renders_instance_id_list() {
        let (_, relay, workload, _, _) = fixture();
        let input = instance_ids_input(&[relay, workload]);
        assert_eq!(
            input,
            json!({ "Fn::Join": ["", [
                "{\"InstanceIds\":[",
                "\"", { "Ref": "RelayInstance" }, "\"",
                ",",
                "\"", { "Ref": "WorkloadInstance" }, "\"",
                "]}",
            ]] })
        );
    }

    #[test]
    fn weekend_gap_is_reported() {
        let stack = StackConfig::default().validate_and_build(Some("demo")).unwrap();
        assert_eq!(uncovered_days(&stack.schedule), Some(vec!["SUN", "SAT"]));

        let mut config = StackConfig::default();
        config.schedule.stop = "cron(00 22 ? * * *)".into();
        let stack = config.validate_and_build(Some("demo")).unwrap();
        assert_eq!(uncovered_days(&stack.schedule), Some(vec![]));

        let mut config = StackConfig::default();
        config.schedule.stop = "cron(00 22 ? * 6L *)".into();
        let stack = config.validate_and_build(Some("demo")).unwrap();
        assert_eq!(uncovered_days(&stack.schedule), None);
    }
}
