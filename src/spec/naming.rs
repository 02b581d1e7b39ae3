//! Resource naming.
//!
//! Every top-level name is `{project}-{stack_type}-{role}`, so two deployments of
//! the same stack under different project names never collide. The scheme is a
//! plain value: same inputs, same names.

use crate::Result;
use crate::error::BuildError;
use crate::spec::EndpointService;

use regex::Regex;
use std::collections::BTreeMap;

pub const NAME_PATTERN: &str = "^[A-Za-z][A-Za-z0-9-]*$";

/// Security group names may not start with this (case-insensitive).
pub const RESERVED_GROUP_PREFIX: &str = "sg-";

/// Limit shared by IAM role names and schedule names.
pub const MAX_ROLE_NAME_LEN: usize = 64;
pub const MAX_SCHEDULE_NAME_LEN: usize = 64;
pub const MAX_GROUP_NAME_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingScheme {
    project: String,
    stack_type: String,
}

impl NamingScheme {
    pub fn new(project: &str, stack_type: &str) -> Result<Self> {
        let re = Regex::new(NAME_PATTERN)?;
        check_part(&re, "project name", project)?;
        check_part(&re, "stack type name", stack_type)?;
        Ok(Self {
            project: project.to_string(),
            stack_type: stack_type.to_string(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn stack_type(&self) -> &str {
        &self.stack_type
    }

    pub fn name(&self, role: &str) -> String {
        format!("{}-{}-{}", self.project, self.stack_type, role)
    }

    /// Like [`name`](Self::name), for resources whose name field has a length cap.
    pub fn bounded_name(&self, role: &str, max: usize) -> std::result::Result<String, BuildError> {
        let name = self.name(role);
        if name.len() > max {
            return Err(BuildError::NameTooLong {
                len: name.len(),
                name,
                max,
            });
        }
        Ok(name)
    }

    /// Security group name: length-capped and clear of the reserved id prefix.
    pub fn group_name(&self, role: &str) -> std::result::Result<String, BuildError> {
        let name = self.bounded_name(role, MAX_GROUP_NAME_LEN)?;
        if name.to_ascii_lowercase().starts_with(RESERVED_GROUP_PREFIX) {
            return Err(BuildError::ReservedPrefix {
                name,
                prefix: RESERVED_GROUP_PREFIX,
            });
        }
        Ok(name)
    }
}

/// Physical names of every top-level resource, fixed before anything is declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub vpc: String,
    pub relay_instance: String,
    pub relay_security_group: String,
    pub management_role: String,
    pub management_profile: String,
    pub endpoints: BTreeMap<EndpointService, String>,
    pub workload_instance: String,
    pub workload_security_group: String,
    pub scheduler_role: String,
    pub start_schedule: String,
    pub stop_schedule: String,
}

impl ResourceNames {
    pub fn new(naming: &NamingScheme) -> std::result::Result<Self, BuildError> {
        let endpoints = EndpointService::REQUIRED
            .iter()
            .map(|svc| (*svc, naming.name(svc.role_suffix())))
            .collect();

        Ok(Self {
            vpc: naming.name("vpc_for_ec2_and_ssm"),
            relay_instance: naming.name("nat_instance"),
            relay_security_group: naming.group_name("nat_sg")?,
            management_role: naming.bounded_name("iam_role_for_ssm", MAX_ROLE_NAME_LEN)?,
            management_profile: naming.name("instance_profile_for_ssm"),
            endpoints,
            workload_instance: naming.name("general_purpose_ec2"),
            workload_security_group: naming.group_name("ec2_sg")?,
            scheduler_role: naming
                .bounded_name("iam_role_for_ec2_schedule", MAX_ROLE_NAME_LEN)?,
            start_schedule: naming.bounded_name("ec2-start-scheduler", MAX_SCHEDULE_NAME_LEN)?,
            stop_schedule: naming.bounded_name("ec2-stop-scheduler", MAX_SCHEDULE_NAME_LEN)?,
        })
    }

    pub fn all(&self) -> Vec<&str> {
        let mut out = vec![
            self.vpc.as_str(),
            self.relay_instance.as_str(),
            self.relay_security_group.as_str(),
            self.management_role.as_str(),
            self.management_profile.as_str(),
        ];
        out.extend(self.endpoints.values().map(String::as_str));
        out.extend([
            self.workload_instance.as_str(),
            self.workload_security_group.as_str(),
            self.scheduler_role.as_str(),
            self.start_schedule.as_str(),
            self.stop_schedule.as_str(),
        ]);
        out
    }
}

fn check_part(re: &Regex, what: &'static str, value: &str) -> std::result::Result<(), BuildError> {
    if !re.is_match(value) {
        return Err(BuildError::InvalidName {
            what,
            value: value.to_string(),
            pattern: NAME_PATTERN,
        });
    }
    Ok(())
}
