// Entity registry: last known snapshot of every device and variable

mod registry;

pub use registry::EntityRegistry;
