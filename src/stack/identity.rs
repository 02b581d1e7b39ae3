//! Trust roles: one principal service, an ordered list of managed policies.

use crate::error::BuildError;
use crate::graph::{Decl, Graph, ResourceRef, join, pseudo};
use crate::spec::RoleSpec;

use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct TrustRole {
    pub role: ResourceRef,
    pub name: String,
    pub principal: String,
    pub managed_policies: Vec<String>,
}

impl TrustRole {
    pub fn arn(&self) -> Value {
        self.role.attr("Arn")
    }
}

pub fn bind(
    graph: &mut Graph,
    logical_id: &str,
    name: &str,
    spec: &RoleSpec,
) -> Result<TrustRole, BuildError> {
    let policy_arns: Vec<Value> = spec
        .managed_policies
        .iter()
        .map(|p| managed_policy_arn(p))
        .collect();

    let role = graph.declare(
        Decl::new(logical_id, "AWS::IAM::Role")
            .name(name)
            .properties(json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": spec.principal },
                    }],
                },
                "ManagedPolicyArns": policy_arns,
                "RoleName": name,
            })),
    )?;

    tracing::info!(role = name, principal = %spec.principal, "trust role declared");
    Ok(TrustRole {
        role,
        name: name.to_string(),
        principal: spec.principal.clone(),
        managed_policies: spec.managed_policies.clone(),
    })
}

/// Instance profile so the compute runtime can assume `role`.
pub fn instance_profile(
    graph: &mut Graph,
    logical_id: &str,
    name: &str,
    role: &TrustRole,
) -> Result<ResourceRef, BuildError> {
    graph.declare(
        Decl::new(logical_id, "AWS::IAM::InstanceProfile")
            .name(name)
            .properties(json!({
                "InstanceProfileName": name,
                "Roles": [role.role.reference()],
            })),
    )
}

/// `arn:<partition>:iam::aws:policy/<name>` for a provider-managed policy.
fn managed_policy_arn(name: &str) -> Value {
    join(vec![
        json!("arn:"),
        pseudo("Partition"),
        json!(format!(":iam::aws:policy/{}", name)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::StackConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn roles_trust_exactly_one_principal() {
        let stack = StackConfig::default().validate_and_build(Some("demo")).unwrap();
        let mut graph = Graph::new();
        let mgmt = bind(&mut graph, "ManagementRole", &stack.names.management_role, &stack.management_role).unwrap();
        let sched = bind(&mut graph, "SchedulerRole", &stack.names.scheduler_role, &stack.scheduler_role).unwrap();

        let principal = |id: &str| {
            graph.get(id).unwrap().properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]
                ["Service"]
                .clone()
        };
        assert_eq!(principal("ManagementRole"), json!("ec2.amazonaws.com"));
        assert_eq!(principal("SchedulerRole"), json!("scheduler.amazonaws.com"));
        assert_ne!(mgmt.name, sched.name);
        assert_eq!(
            mgmt.managed_policies,
            vec!["AmazonSSMManagedInstanceCore", "CloudWatchAgentAdminPolicy"]
        );
        assert_eq!(sched.arn(), json!({ "Fn::GetAtt": ["SchedulerRole", "Arn"] }));
    }

    #[test]
    fn policy_arns_keep_declared_order() {
        let mut graph = Graph::new();
        let spec = RoleSpec {
            principal: "ec2.amazonaws.com".into(),
            managed_policies: vec!["B".into(), "A".into()],
        };
        bind(&mut graph, "Role", "role-name", &spec).unwrap();
        let arns = &graph.get("Role").unwrap().properties["ManagedPolicyArns"];
        assert_eq!(arns[0]["Fn::Join"][1][2], json!(":iam::aws:policy/B"));
        assert_eq!(arns[1]["Fn::Join"][1][2], json!(":iam::aws:policy/A"));
    }

    #[test]
    fn profile_references_role() {
        let mut graph = Graph::new();
        let spec = RoleSpec {
            principal: "ec2.amazonaws.com".into(),
            managed_policies: vec![],
        };
        let role = bind(&mut graph, "Role", "role-name", &spec).unwrap();
        let profile = instance_profile(&mut graph, "Profile", "profile-name", &role).unwrap();
        assert_eq!(graph.dependencies(graph.get(profile.id().as_str()).unwrap()), vec![role.role.id().clone()]);
    }
}
