//! Request and response DTOs.

pub mod security;
