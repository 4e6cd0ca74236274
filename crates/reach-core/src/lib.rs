//! Core of the `reach` marketing-automation server: domain records,
//! in-memory registries, provider adapters, statistics and the monitors.

pub mod config;
pub mod errors;
pub mod experiment;
pub mod model;
pub mod monitor;
pub mod providers;
pub mod publish;
pub mod registry;
pub mod report;
pub mod roi;
pub mod stats;
