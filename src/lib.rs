// Devices, variables and their attribute snapshots
pub mod entity;

// Forwarding policy and change diffing
pub mod filter;

// InfluxDB points, line protocol and backends
pub mod influx;

// Learned field types and coercion
pub mod schema;

// Backend session lifecycle
pub mod session;

// Retrying, type-coercing writes
pub mod pipeline;

// Last known state of every entity
pub mod state;

// Heartbeat writes for quiet entities
pub mod scheduler;

// Process-wide forwarding context
pub mod forwarder;

// Configuration file and host preferences
pub mod config;

// Host adapter HTTP API
pub mod api;
