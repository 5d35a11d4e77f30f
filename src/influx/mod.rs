// InfluxDB integration: point model, line protocol encoding, HTTP and in-memory backends

mod backend;
mod client;
mod line_protocol;
mod memory;
mod point;

pub use backend::{parse_type_conflict, RetentionPolicy, TimeSeriesBackend, WriteError};
pub use client::{InfluxClient, InfluxConfig};
pub use line_protocol::{encode_point, encode_points};
pub use memory::MemoryBackend;
pub use point::{FieldValue, Point, DEVICE_MEASUREMENT, VARIABLE_MEASUREMENT};
