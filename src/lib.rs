//! Observability bridge between a managed-service provider and the
//! platform's monitoring stack.
//!
//! Two independent daemons share one structural design: periodic-polling
//! pipelines that turn a remote catalog or event stream into a downstream
//! artifact with durability or idempotence guarantees.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────┐ snapshot ┌────────────┐ enroll  ┌──────────────┐
//! │ Fetcher │─────────▶│ Integrator │────────▶│ catalog API  │
//! │         │          └────────────┘         └──────────────┘
//! │         │ snapshot ┌────────────┐ resolve ┌──────────────┐
//! │         │─────────▶│ Discoverer │────────▶│ target file  │
//! └─────────┘          └────────────┘         └──────────────┘
//!
//! ┌────────┐  events   ┌─────────┐   POST    ┌──────────────┐
//! │ cursor │──────────▶│ Shipper │──────────▶│ event sink   │
//! └────────┘◀──advance─└─────────┘           └──────────────┘
//! ```
//!
//! The fetcher is a pure producer: the integrator and discoverer read its
//! snapshot concurrently without coordinating with each other. The
//! shipper is fully independent. Every daemon uses the shared skeleton in
//! [`daemon`] and counts every I/O boundary in [`metrics`].

pub mod catalog;
pub mod cursor;
pub mod daemon;
pub mod discoverer;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod integrator;
pub mod metrics;
pub mod proxy;
pub mod resolver;
pub mod shipper;
pub mod sink;
pub mod telemetry;
pub mod types;
pub mod writer;

pub use error::{Error, Result};
