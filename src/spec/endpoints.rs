//! Control-plane services the remote-management agent talks to.
//!
//! The workload has no internet path of its own, so every service in
//! [`EndpointService::REQUIRED`] gets a private endpoint. Dropping one leaves the
//! instance unreachable by the agent without any error at deploy time.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointService {
    /// Remote-management control.
    Ssm,
    /// Instance-to-service messaging.
    Ec2Messages,
    /// Session messaging.
    SsmMessages,
}

impl EndpointService {
    pub const REQUIRED: [EndpointService; 3] = [
        EndpointService::Ssm,
        EndpointService::Ec2Messages,
        EndpointService::SsmMessages,
    ];

    /// Service suffix in `com.amazonaws.<region>.<suffix>`.
    pub fn service_suffix(self) -> &'static str {
        match self {
            EndpointService::Ssm => "ssm",
            EndpointService::Ec2Messages => "ec2messages",
            EndpointService::SsmMessages => "ssmmessages",
        }
    }

    pub fn role_suffix(self) -> &'static str {
        match self {
            EndpointService::Ssm => "InterfaceEndpoint_ssm",
            EndpointService::Ec2Messages => "InterfaceEndpoint_ec2_messages",
            EndpointService::SsmMessages => "InterfaceEndpoint_ssm_messages",
        }
    }

    pub fn logical_prefix(self) -> &'static str {
        match self {
            EndpointService::Ssm => "SsmEndpoint",
            EndpointService::Ec2Messages => "Ec2MessagesEndpoint",
            EndpointService::SsmMessages => "SsmMessagesEndpoint",
        }
    }
}
