//! Planpilot: resilient AI plan generation.
//!
//! Turns a free-text goal into a structured task list by calling the Google
//! Generative Language API, with a retrying client, tiered response parsing
//! (strict JSON, then line heuristics, then a deterministic mock plan), a
//! bounded TTL cache, and a usage metrics aggregator.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod plan;
pub mod service;
