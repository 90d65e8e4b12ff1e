mod applications;
mod microservices;
pub mod response;
mod router;
mod studio;
pub mod validation;

pub use router::{AppState, create_router};
