//! Tools and Utilities Module
//!
//! Helpers for testing, benchmarking and demoing the replica.
//!
//! ## Available Tools
//! - `feed_generator`: seeded synthetic orderbook feed; the
//!   `feed_generator` binary in src/bin/ writes it as JSON lines that the
//!   main CLI can replay

pub mod feed_generator;

pub use feed_generator::FeedGenerator;
