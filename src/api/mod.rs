// Host adapter HTTP API

pub mod admin;
mod host;

pub use admin::{create_admin_router, AdminAppState};
pub use host::{create_host_router, HostAppState};
