// KPI dashboard pipeline engine: sources, reshape/convert pipeline, outputs and the trigger service.
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod services;
