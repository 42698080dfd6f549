//! Business logic services

pub mod distance;
pub mod optimizer;
pub mod order;
pub mod routing;
pub mod schedule;
pub mod segments;
