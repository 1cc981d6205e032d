//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the local blob store and the upload notification side channel.

pub mod notification;
pub mod storage;
