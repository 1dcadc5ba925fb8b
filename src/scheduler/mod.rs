//! Placement algorithms: criteria resolution and fleet load balancing.

pub mod balancer;
pub mod resolver;

pub use balancer::{FleetLoadBalancer, JobCountSource};
pub use resolver::{resolve, Resolution};
