//! Applying the resource graph to a cluster and the workflow around it.

mod orchestrator;
mod workflow;

pub use orchestrator::provision;
pub use workflow::{ProvisionRequest, Provisioner, WELCOME_MICROSERVICE_NAME};
