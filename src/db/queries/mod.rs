//! Database queries

pub mod event;
pub mod optimization;
