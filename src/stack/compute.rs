//! The workload instance: private subnet, management role, boot payload and
//! its own security group.

use crate::error::BuildError;
use crate::graph::{Decl, Graph, Parameter, ResourceRef};
use crate::spec::{ResourceNames, SubnetKind, WorkloadPlan};
use crate::stack::boot::BootPayload;
use crate::stack::identity::{self, TrustRole};
use crate::stack::network::NetworkTopology;
use crate::stack::{all_traffic_egress, name_tag, zone};

use serde_json::json;

#[derive(Debug, Clone)]
pub struct WorkloadInstance {
    pub instance: ResourceRef,
    pub security_group: ResourceRef,
    pub subnet: ResourceRef,
}

pub fn provision(
    graph: &mut Graph,
    topology: &NetworkTopology,
    role: &TrustRole,
    plan: &WorkloadPlan,
    payload: &BootPayload,
    names: &ResourceNames,
) -> Result<WorkloadInstance, BuildError> {
    // Placement: only the private group keeps the workload off the internet.
    let group = topology.select_subnets(&plan.subnet_group)?;
    if group.kind != SubnetKind::PrivateWithEgress {
        return Err(BuildError::SubnetGroupNotPrivate(group.name.clone()));
    }
    let subnet = group
        .subnets
        .first()
        .ok_or_else(|| BuildError::UnknownSubnetGroup(group.name.clone()))?;

    let image = graph.add_parameter(
        "WorkloadImageId",
        Parameter {
            kind: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
            description: "Image for the workload instance, resolved from the public image catalog"
                .to_string(),
            default: Some(plan.image.ssm_parameter()),
        },
    )?;

    let security_group = graph.declare(
        Decl::new("WorkloadSecurityGroup", "AWS::EC2::SecurityGroup")
            .name(&names.workload_security_group)
            .properties(json!({
                "GroupDescription": format!("Security group for {}", names.workload_instance),
                "GroupName": names.workload_security_group,
                "SecurityGroupEgress": [all_traffic_egress()],
                "VpcId": topology.vpc.reference(),
            })),
    )?;

    let profile = identity::instance_profile(
        graph,
        "WorkloadInstanceProfile",
        &names.management_profile,
        role,
    )?;

    let instance = graph.declare(
        Decl::new("WorkloadInstance", "AWS::EC2::Instance")
            .name(&names.workload_instance)
            .properties(json!({
                "AvailabilityZone": zone(0),
                "IamInstanceProfile": profile.reference(),
                "ImageId": image.reference(),
                "InstanceType": plan.instance_type,
                "SecurityGroupIds": [security_group.attr("GroupId")],
                "SubnetId": subnet.resource.reference(),
                "UserData": { "Fn::Base64": payload.render() },
                "Tags": name_tag(&names.workload_instance),
            }))
            .depends_on(&role.role),
    )?;

    tracing::info!(
        instance_type = %plan.instance_type,
        subnet = %subnet.cidr,
        "workload instance declared"
    );
    Ok(WorkloadInstance {
        instance,
        security_group,
        subnet: subnet.resource.clone(),
    })
}
