//! Business logic services.

pub mod origin_guard;
pub mod threat;
