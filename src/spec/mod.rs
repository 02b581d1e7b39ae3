//! Input layer: stack configuration + validated in-memory plan.
//!
//! This module never declares resources. It owns:
//! - Cidr (address blocks and subnet carving)
//! - naming scheme and the physical names derived from it
//! - schedule expressions, image selection, the required endpoint set

pub mod cidr;
pub mod cron;
pub mod endpoints;
pub mod image;
pub mod naming;
pub mod stack;

pub use cidr::Cidr;
pub use cron::{CronExpr, Timezone};
pub use endpoints::EndpointService;
pub use image::ImageSelection;
pub use naming::{NamingScheme, ResourceNames};
pub use stack::{
    NetworkPlan, RelayPlan, RoleSpec, SchedulePlan, StackConfig, SubnetGroupPlan, SubnetKind,
    ValidatedStack, WorkloadPlan,
};
