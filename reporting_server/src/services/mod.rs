//! Gateway services — cluster access, stack catalog, GitHub aggregation,
//! run normalization, trigger synthesis.

pub mod cluster_service;
pub mod github_service;
pub mod run_service;
pub mod stack_service;
pub mod trigger_service;
