//! Network topology: VPC, public + private subnet groups across zones, and the
//! single relay instance all private subnets route through.
//!
//! The relay is returned as a typed value instead of being looked up by name
//! afterwards; the scheduler takes its id straight from [`NetworkTopology`].

use crate::error::BuildError;
use crate::graph::{Decl, Graph, ParamRef, Parameter, ResourceRef};
use crate::spec::{Cidr, NetworkPlan, ResourceNames, SubnetGroupPlan, SubnetKind};
use crate::stack::{all_traffic_egress, name_tag, zone};

use serde_json::json;

#[derive(Debug, Clone)]
pub struct Subnet {
    pub resource: ResourceRef,
    pub cidr: Cidr,
    pub route_table: ResourceRef,
    pub default_route: ResourceRef,
}

#[derive(Debug, Clone)]
pub struct SubnetGroup {
    pub name: String,
    pub kind: SubnetKind,
    /// Zone order; `subnets[0]` sits in the first zone.
    pub subnets: Vec<Subnet>,
}

impl SubnetGroup {
    pub fn subnet_ids(&self) -> Vec<serde_json::Value> {
        self.subnets.iter().map(|s| s.resource.reference()).collect()
    }
}

/// The address-translation relay for private egress.
#[derive(Debug, Clone)]
pub struct RelayInstance {
    pub instance: ResourceRef,
    pub security_group: ResourceRef,
}

#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub vpc: ResourceRef,
    pub cidr: Cidr,
    pub public: SubnetGroup,
    pub private: SubnetGroup,
    pub relay: RelayInstance,
}

impl NetworkTopology {
    pub fn select_subnets(&self, group: &str) -> Result<&SubnetGroup, BuildError> {
        [&self.public, &self.private]
            .into_iter()
            .find(|g| g.name == group)
            .ok_or_else(|| BuildError::UnknownSubnetGroup(group.to_string()))
    }

    pub fn subnet_count(&self) -> usize {
        self.public.subnets.len() + self.private.subnets.len()
    }
}

/// Declaration order:
/// 1) VPC, internet gateway, attachment
/// 2) public subnets with gateway routes
/// 3) relay security group + relay instance in the first public subnet
/// 4) private subnets whose default route targets the relay
pub fn build_topology(
    graph: &mut Graph,
    plan: &NetworkPlan,
    names: &ResourceNames,
) -> Result<NetworkTopology, BuildError> {
    // 1) Address space and internet access.
    let vpc = graph.declare(
        Decl::new("Vpc", "AWS::EC2::VPC")
            .name(&names.vpc)
            .properties(json!({
                "CidrBlock": plan.cidr.to_string(),
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": name_tag(&names.vpc),
            })),
    )?;
    let igw = graph.declare(
        Decl::new("InternetGateway", "AWS::EC2::InternetGateway")
            .properties(json!({ "Tags": name_tag(&names.vpc) })),
    )?;
    let attachment = graph.declare(
        Decl::new("VpcGatewayAttachment", "AWS::EC2::VPCGatewayAttachment").properties(json!({
            "VpcId": vpc.reference(),
            "InternetGatewayId": igw.reference(),
        })),
    )?;

    // 2) Public group.
    let public = declare_group(graph, &vpc, &plan.public, &names.vpc, |id, route_table| {
        Decl::new(id, "AWS::EC2::Route")
            .properties(json!({
                "RouteTableId": route_table.reference(),
                "DestinationCidrBlock": "0.0.0.0/0",
                "GatewayId": igw.reference(),
            }))
            .depends_on(&attachment)
    })?;

    // 3) Relay. Exactly one, shared by every private subnet.
    let relay_image = relay_image_parameter(graph, plan)?;
    let relay = declare_relay(graph, plan, names, &vpc, &public, &relay_image)?;

    // 4) Private group, egress through the relay only.
    let private = declare_group(graph, &vpc, &plan.private, &names.vpc, |id, route_table| {
        Decl::new(id, "AWS::EC2::Route")
            .properties(json!({
                "RouteTableId": route_table.reference(),
                "DestinationCidrBlock": "0.0.0.0/0",
                "InstanceId": relay.instance.reference(),
            }))
    })?;

    tracing::info!(
        cidr = %plan.cidr,
        zones = plan.zones,
        subnets = public.subnets.len() + private.subnets.len(),
        "network topology declared"
    );

    Ok(NetworkTopology {
        vpc,
        cidr: plan.cidr,
        public,
        private,
        relay,
    })
}

/// One subnet per zone: subnet, route table, association, default route.
fn declare_group(
    graph: &mut Graph,
    vpc: &ResourceRef,
    plan: &SubnetGroupPlan,
    vpc_name: &str,
    default_route: impl Fn(String, &ResourceRef) -> Decl,
) -> Result<SubnetGroup, BuildError> {
    let mut subnets = Vec::with_capacity(plan.blocks.len());
    for (i, block) in plan.blocks.iter().enumerate() {
        let base = format!("{}Subnet{}", plan.name, i + 1);
        let tag = format!("{}/{}", vpc_name, base);

        let subnet = graph.declare(
            Decl::new(base.clone(), "AWS::EC2::Subnet")
                .name(&tag)
                .properties(json!({
                    "VpcId": vpc.reference(),
                    "CidrBlock": block.to_string(),
                    "AvailabilityZone": zone(i),
                    "MapPublicIpOnLaunch": plan.kind == SubnetKind::Public,
                    "Tags": name_tag(&tag),
                })),
        )?;
        let route_table = graph.declare(
            Decl::new(format!("{}RouteTable", base), "AWS::EC2::RouteTable").properties(json!({
                "VpcId": vpc.reference(),
                "Tags": name_tag(&tag),
            })),
        )?;
        graph.declare(
            Decl::new(
                format!("{}RouteTableAssociation", base),
                "AWS::EC2::SubnetRouteTableAssociation",
            )
            .properties(json!({
                "RouteTableId": route_table.reference(),
                "SubnetId": subnet.reference(),
            })),
        )?;
        let route = graph.declare(default_route(format!("{}DefaultRoute", base), &route_table))?;

        subnets.push(Subnet {
            resource: subnet,
            cidr: *block,
            route_table,
            default_route: route,
        });
    }

    Ok(SubnetGroup {
        name: plan.name.clone(),
        kind: plan.kind,
        subnets,
    })
}

fn relay_image_parameter(graph: &mut Graph, plan: &NetworkPlan) -> Result<ParamRef, BuildError> {
    graph.add_parameter(
        "RelayImageId",
        Parameter {
            kind: "AWS::EC2::Image::Id".to_string(),
            description: "Image for the NAT relay instance (amzn-ami-vpc-nat-*)".to_string(),
            default: plan.relay.image_id.clone(),
        },
    )
}

fn declare_relay(
    graph: &mut Graph,
    plan: &NetworkPlan,
    names: &ResourceNames,
    vpc: &ResourceRef,
    public: &SubnetGroup,
    image: &ParamRef,
) -> Result<RelayInstance, BuildError> {
    let first = public
        .subnets
        .first()
        .ok_or_else(|| BuildError::UnknownSubnetGroup(public.name.clone()))?;

    let ingress = if plan.relay.allow_inbound {
        json!([{
            "CidrIp": "0.0.0.0/0",
            "Description": "from 0.0.0.0/0:ALL TRAFFIC",
            "IpProtocol": "-1",
        }])
    } else {
        json!([])
    };

    let security_group = graph.declare(
        Decl::new("RelaySecurityGroup", "AWS::EC2::SecurityGroup")
            .name(&names.relay_security_group)
            .properties(json!({
                "GroupDescription": format!("Security group for {}", names.relay_instance),
                "SecurityGroupEgress": [all_traffic_egress()],
                "SecurityGroupIngress": ingress,
                "VpcId": vpc.reference(),
                "Tags": name_tag(&names.relay_security_group),
            })),
    )?;

    let instance = graph.declare(
        Decl::new("RelayInstance", "AWS::EC2::Instance")
            .name(&names.relay_instance)
            .properties(json!({
                "AvailabilityZone": zone(0),
                "ImageId": image.reference(),
                "InstanceType": plan.relay.instance_type,
                "SecurityGroupIds": [security_group.attr("GroupId")],
                "SourceDestCheck": false,
                "SubnetId": first.resource.reference(),
                "Tags": name_tag(&names.relay_instance),
            }))
            .depends_on(&first.default_route),
    )?;

    Ok(RelayInstance {
        instance,
        security_group,
    })
}
