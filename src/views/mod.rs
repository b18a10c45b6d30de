//! Read-only views derived from a [`crate::store::DeviceLog`] scan.

pub mod readings;
pub mod timeline;
