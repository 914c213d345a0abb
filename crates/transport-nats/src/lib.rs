//! NATS JetStream implementation of the saga command transport.
//!
//! Commands are published to one subject captured by a file-backed stream.
//! A durable pull consumer with explicit acks hands them to the controller
//! one at a time; unacknowledged commands are redelivered after `ack_wait`.
//! While a handler runs, the delivery's ack timer is reset every half
//! `ack_wait`, so slow steps are not handed to a second worker.

pub mod config;
pub mod transport;

pub use config::NatsTransportConfig;
pub use transport::{NatsTransport, ack_kind, progress_interval};
