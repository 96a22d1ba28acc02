// Shared error taxonomy
pub mod error;

// TOML + environment configuration
pub mod config;

// Per-connection sessions
pub mod session;

// Device id aliases
pub mod alias;

// Device cloud job/pub-sub client
pub mod bus;

// Device model, ACLs and provisioning
pub mod device;

// KNOT sensor schemas
pub mod schema;

// Client operations
pub mod service;

// WebSocket API
pub mod api;
