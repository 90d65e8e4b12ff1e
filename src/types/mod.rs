mod application;
mod credentials;
mod microservice;
mod studio;
mod terraform;

pub use application::*;
pub use credentials::*;
pub use microservice::*;
pub use studio::*;
pub use terraform::*;
