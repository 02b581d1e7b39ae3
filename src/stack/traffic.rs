//! Security-group authorizations between declared groups.

use crate::error::BuildError;
use crate::graph::{Decl, Graph, ResourceRef};

use serde_json::json;

/// Let members of `source` reach members of `target` on every protocol and
/// port (ingress on `target`).
pub fn allow_from(
    graph: &mut Graph,
    logical_id: &str,
    target: &ResourceRef,
    source: &ResourceRef,
) -> Result<ResourceRef, BuildError> {
    graph.require(logical_id, target, "AWS::EC2::SecurityGroup")?;
    graph.require(logical_id, source, "AWS::EC2::SecurityGroup")?;

    let rule = graph.declare(
        Decl::new(logical_id, "AWS::EC2::SecurityGroupIngress").properties(json!({
            "IpProtocol": "-1",
            "GroupId": target.attr("GroupId"),
            "SourceSecurityGroupId": source.attr("GroupId"),
            "Description": format!("from {}:ALL TRAFFIC", source.id()),
        })),
    )?;
    tracing::info!(from = %source.id(), to = %target.id(), "ingress authorized");
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_traffic_rule_between_groups() {
        let mut graph = Graph::new();
        let relay = graph.declare(Decl::new("RelaySg", "AWS::EC2::SecurityGroup")).unwrap();
        let workload = graph.declare(Decl::new("WorkloadSg", "AWS::EC2::SecurityGroup")).unwrap();

        allow_from(&mut graph, "RelayIngress", &relay, &workload).unwrap();
        let rule = graph.get("RelayIngress").unwrap();
        assert_eq!(
            rule.properties,
            json!({
                "IpProtocol": "-1",
                "GroupId": { "Fn::GetAtt": ["RelaySg", "GroupId"] },
                "SourceSecurityGroupId": { "Fn::GetAtt": ["WorkloadSg", "GroupId"] },
                "Description": "from WorkloadSg:ALL TRAFFIC",
            })
        );
        assert!(rule.properties.get("FromPort").is_none());
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn only_groups_can_be_authorized() {
        let mut graph = Graph::new();
        let sg = graph.declare(Decl::new("Sg", "AWS::EC2::SecurityGroup")).unwrap();
        let vm = graph.declare(Decl::new("Vm", "AWS::EC2::Instance")).unwrap();
        assert!(matches!(
            allow_from(&mut graph, "Bad", &sg, &vm),
            Err(BuildError::UnexpectedResourceType { .. })
        ));
        assert_eq!(graph.len(), 2);
    }
}
