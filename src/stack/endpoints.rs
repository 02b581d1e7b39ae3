//! Private interface endpoints for the remote-management control plane.

use crate::error::BuildError;
use crate::graph::{Decl, Graph, ResourceRef, join, pseudo};
use crate::spec::{EndpointService, ResourceNames};
use crate::stack::network::NetworkTopology;
use crate::stack::{all_traffic_egress, name_tag};

use serde_json::json;

#[derive(Debug, Clone)]
pub struct PrivateEndpoint {
    pub service: EndpointService,
    pub endpoint: ResourceRef,
    pub security_group: ResourceRef,
}

/// One endpoint per named service. [`ResourceNames`] derives a name for every
/// service in [`EndpointService::REQUIRED`].
pub fn wire(
    graph: &mut Graph,
    topology: &NetworkTopology,
    names: &ResourceNames,
) -> Result<Vec<PrivateEndpoint>, BuildError> {
    names
        .endpoints
        .iter()
        .map(|(service, name)| wire_one(graph, topology, *service, name))
        .collect()
}

/// Endpoint in the private subnets, reachable on 443 from inside the VPC.
pub fn wire_one(
    graph: &mut Graph,
    topology: &NetworkTopology,
    service: EndpointService,
    name: &str,
) -> Result<PrivateEndpoint, BuildError> {
    let prefix = service.logical_prefix();

    let security_group = graph.declare(
        Decl::new(format!("{}SecurityGroup", prefix), "AWS::EC2::SecurityGroup").properties(json!({
            "GroupDescription": format!("{}/SecurityGroup", name),
            "SecurityGroupEgress": [all_traffic_egress()],
            "SecurityGroupIngress": [{
                "CidrIp": topology.vpc.attr("CidrBlock"),
                "Description": "from VPC CIDR:443",
                "FromPort": 443,
                "IpProtocol": "tcp",
                "ToPort": 443,
            }],
            "VpcId": topology.vpc.reference(),
            "Tags": name_tag(name),
        })),
    )?;

    let endpoint = graph.declare(
        Decl::new(prefix, "AWS::EC2::VPCEndpoint")
            .name(name)
            .properties(json!({
                "ServiceName": join(vec![
                    json!("com.amazonaws."),
                    pseudo("Region"),
                    json!(format!(".{}", service.service_suffix())),
                ]),
                "VpcEndpointType": "Interface",
                "VpcId": topology.vpc.reference(),
                "PrivateDnsEnabled": true,
                "SecurityGroupIds": [security_group.attr("GroupId")],
                "SubnetIds": topology.private.subnet_ids(),
            })),
    )?;

    tracing::debug!(service = service.service_suffix(), "private endpoint declared");
    Ok(PrivateEndpoint {
        service,
        endpoint,
        security_group,
    })
}
