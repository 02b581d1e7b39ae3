//! Stack configuration (stack.json) and its validated form.
//!
//! JSON shape (every field optional, defaults shown):
//! {
//!   "project": null,                      // or pass --project
//!   "stack_type": "Ec2LifecycleStack",
//!   "network": {
//!     "cidr": "10.0.0.0/16",
//!     "subnet_mask": 27,
//!     "availability_zones": 2,
//!     "public_group": "Public",
//!     "private_group": "Private",
//!     "relay": { "instance_type": "t3a.nano", "image_id": null, "allow_inbound": false }
//!   },
//!   "workload": {
//!     "instance_type": "t3a.nano",
//!     "subnet_group": "Private",
//!     "image": { "generation": "amazon_linux", "edition": "standard",
//!                "virtualization": "hvm", "storage": "general_purpose" },
//!     "boot_content_type": "text/cloud-config; charset=\"utf8\""
//!   },
//!   "identity": {
//!     "management": { "principal": "ec2.amazonaws.com",
//!                     "managed_policies": ["AmazonSSMManagedInstanceCore", "CloudWatchAgentAdminPolicy"] },
//!     "scheduler":  { "principal": "scheduler.amazonaws.com",
//!                     "managed_policies": ["service-role/AmazonSSMAutomationRole"] }
//!   },
//!   "schedule": {
//!     "timezone": "Asia/Tokyo",
//!     "start": "cron(00 7 ? * MON-FRI *)",
//!     "stop": "cron(00 22 ? * MON-FRI *)"
//!   }
//! }
//!
//! Validation resolves everything that can fail (address plan, names, schedule
//! expressions, subnet group selection) so that graph construction afterwards
//! cannot fail on input.

use crate::Result;
use crate::diagnostics;
use crate::error::BuildError;
use crate::spec::{Cidr, CronExpr, ImageSelection, NamingScheme, ResourceNames, Timezone};

use anyhow::{Context, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MAX_AVAILABILITY_ZONES: u8 = 6;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub project: Option<String>,
    pub stack_type: String,
    pub description: Option<String>,
    pub network: NetworkConfig,
    pub workload: WorkloadConfig,
    pub identity: IdentityConfig,
    pub schedule: ScheduleConfig,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            project: None,
            stack_type: "Ec2LifecycleStack".to_string(),
            description: None,
            network: NetworkConfig::default(),
            workload: WorkloadConfig::default(),
            identity: IdentityConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub cidr: String,
    pub subnet_mask: u8,
    pub availability_zones: u8,
    pub public_group: String,
    pub private_group: String,
    pub relay: RelayConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.0.0.0/16".to_string(),
            subnet_mask: 27,
            availability_zones: 2,
            public_group: "Public".to_string(),
            private_group: "Private".to_string(),
            relay: RelayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub instance_type: String,
    /// Image id for the relay. Left empty, the template asks for it at deploy time.
    pub image_id: Option<String>,
    /// Accept inbound traffic from anywhere in addition to outbound.
    pub allow_inbound: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            instance_type: "t3a.nano".to_string(),
            image_id: None,
            allow_inbound: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub instance_type: String,
    pub subnet_group: String,
    pub image: ImageSelection,
    pub boot_content_type: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            instance_type: "t3a.nano".to_string(),
            subnet_group: "Private".to_string(),
            image: ImageSelection::default(),
            boot_content_type: "text/cloud-config; charset=\"utf8\"".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub principal: String,
    #[serde(default)]
    pub managed_policies: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub management: RoleSpec,
    pub scheduler: RoleSpec,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            management: RoleSpec {
                principal: "ec2.amazonaws.com".to_string(),
                managed_policies: vec![
                    "AmazonSSMManagedInstanceCore".to_string(),
                    "CloudWatchAgentAdminPolicy".to_string(),
                ],
            },
            scheduler: RoleSpec {
                principal: "scheduler.amazonaws.com".to_string(),
                managed_policies: vec!["service-role/AmazonSSMAutomationRole".to_string()],
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub timezone: String,
    pub start: String,
    pub stop: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Tokyo".to_string(),
            start: "cron(00 7 ? * MON-FRI *)".to_string(),
            stop: "cron(00 22 ? * MON-FRI *)".to_string(),
        }
    }
}

/// Whether a subnet group routes to the internet directly or only through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetKind {
    Public,
    PrivateWithEgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetGroupPlan {
    pub name: String,
    pub kind: SubnetKind,
    /// One block per availability zone, in zone order.
    pub blocks: Vec<Cidr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayPlan {
    pub instance_type: String,
    pub image_id: Option<String>,
    pub allow_inbound: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    pub cidr: Cidr,
    pub zones: u8,
    pub public: SubnetGroupPlan,
    pub private: SubnetGroupPlan,
    pub relay: RelayPlan,
}

impl NetworkPlan {
    pub fn group(&self, name: &str) -> std::result::Result<&SubnetGroupPlan, BuildError> {
        [&self.public, &self.private]
            .into_iter()
            .find(|g| g.name == name)
            .ok_or_else(|| BuildError::UnknownSubnetGroup(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadPlan {
    pub instance_type: String,
    pub subnet_group: String,
    pub image: ImageSelection,
    pub boot_content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulePlan {
    pub timezone: Timezone,
    pub start: CronExpr,
    pub stop: CronExpr,
}

#[derive(Debug, Clone)]
pub struct ValidatedStack {
    pub naming: NamingScheme,
    pub names: ResourceNames,
    pub description: String,
    pub network: NetworkPlan,
    pub workload: WorkloadPlan,
    pub management_role: RoleSpec,
    pub scheduler_role: RoleSpec,
    pub schedule: SchedulePlan,
}

impl StackConfig {
    /// Read stack.json. A missing path means "all defaults".
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).with_context(|| {
            diagnostics::error_message(format!("read stack config {}", path.display()))
        })?;
        serde_json::from_str(&text).with_context(|| {
            diagnostics::error_message(format!("parse stack config {}", path.display()))
        })
    }

    /// Resolve and check every input. `project` overrides the file's project name.
    ///
    /// Phases:
    /// 1) Naming: project + stack type, then every top-level resource name.
    /// 2) Address plan: parse the block and carve public then private subnets.
    /// 3) Placement: the workload's subnet group must be the private one.
    /// 4) Identity and schedule inputs.
    pub fn validate_and_build(&self, project: Option<&str>) -> Result<ValidatedStack> {
        // Phase 1: naming.
        let Some(project) = project.or(self.project.as_deref()) else {
            bail!(
                "{}",
                diagnostics::error_message(
                    "a project name is required (--project or \"project\" in the stack config)"
                )
            );
        };
        let naming = NamingScheme::new(project, &self.stack_type)?;
        let names = ResourceNames::new(&naming)?;

        // Phase 2: address plan.
        let net = &self.network;
        if net.availability_zones == 0 || net.availability_zones > MAX_AVAILABILITY_ZONES {
            return Err(BuildError::InvalidZoneCount {
                count: net.availability_zones,
                max: MAX_AVAILABILITY_ZONES,
            }
            .into());
        }
        check_group_name(&net.public_group)?;
        check_group_name(&net.private_group)?;
        if net.public_group == net.private_group {
            bail!(
                "{}",
                diagnostics::error_message(format!(
                    "public and private subnet groups share the name '{}'",
                    net.public_group
                ))
            );
        }
        check_instance_type(&net.relay.instance_type)?;

        let cidr: Cidr = net.cidr.parse()?;
        cidr.check_network_block()?;
        let zones = usize::from(net.availability_zones);
        let mut blocks = cidr.subdivide(net.subnet_mask, zones * 2)?;
        let private_blocks = blocks.split_off(zones);

        let network = NetworkPlan {
            cidr,
            zones: net.availability_zones,
            public: SubnetGroupPlan {
                name: net.public_group.clone(),
                kind: SubnetKind::Public,
                blocks,
            },
            private: SubnetGroupPlan {
                name: net.private_group.clone(),
                kind: SubnetKind::PrivateWithEgress,
                blocks: private_blocks,
            },
            relay: RelayPlan {
                instance_type: net.relay.instance_type.clone(),
                image_id: net.relay.image_id.clone(),
                allow_inbound: net.relay.allow_inbound,
            },
        };

        // Phase 3: placement.
        let wl = &self.workload;
        check_instance_type(&wl.instance_type)?;
        check_non_empty("boot content type", &wl.boot_content_type)?;
        if network.group(&wl.subnet_group)?.kind != SubnetKind::PrivateWithEgress {
            return Err(BuildError::SubnetGroupNotPrivate(wl.subnet_group.clone()).into());
        }

        // Phase 4: identity + schedule.
        check_non_empty("management principal", &self.identity.management.principal)?;
        check_non_empty("scheduler principal", &self.identity.scheduler.principal)?;

        let schedule = SchedulePlan {
            timezone: Timezone::parse(&self.schedule.timezone)?,
            start: CronExpr::parse(&self.schedule.start)?,
            stop: CronExpr::parse(&self.schedule.stop)?,
        };

        let description = self.description.clone().unwrap_or_else(|| {
            format!(
                "{}: private network, managed instance and weekday power schedule",
                naming.name("stack")
            )
        });

        Ok(ValidatedStack {
            naming,
            names,
            description,
            network,
            workload: WorkloadPlan {
                instance_type: wl.instance_type.clone(),
                subnet_group: wl.subnet_group.clone(),
                image: wl.image,
                boot_content_type: wl.boot_content_type.clone(),
            },
            management_role: self.identity.management.clone(),
            scheduler_role: self.identity.scheduler.clone(),
            schedule,
        })
    }
}

fn check_non_empty(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{}", diagnostics::error_message(format!("{} cannot be empty", what)));
    }
    Ok(())
}

const GROUP_NAME_PATTERN: &str = "^[A-Za-z0-9]+$";
const INSTANCE_TYPE_PATTERN: &str = r"^[a-z0-9-]+\.[a-z0-9-]+$";

/// Group names become part of logical ids, so they must be plain alphanumerics.
fn check_group_name(value: &str) -> Result<()> {
    let re = Regex::new(GROUP_NAME_PATTERN)?;
    if !re.is_match(value) {
        return Err(BuildError::InvalidName {
            what: "subnet group name",
            value: value.to_string(),
            pattern: GROUP_NAME_PATTERN,
        }
        .into());
    }
    Ok(())
}

/// Instance types look like `<family>.<size>`, e.g. `t3a.nano`.
fn check_instance_type(value: &str) -> Result<()> {
    let re = Regex::new(INSTANCE_TYPE_PATTERN)?;
    if !re.is_match(value) {
        return Err(BuildError::InvalidName {
            what: "instance type",
            value: value.to_string(),
            pattern: INSTANCE_TYPE_PATTERN,
        }
        .into());
    }
    Ok(())
}
