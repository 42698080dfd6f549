//! Type definitions

pub mod event;
pub mod messages;
pub mod optimization;

pub use event::*;
pub use messages::*;
pub use optimization::*;
