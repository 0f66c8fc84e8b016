//! CourseHarvest - course platform data acquisition and analysis system.
//!
//! Ingests data from heterogeneous course platforms through registered
//! scraper/analyzer modules, stores raw captures and derived records in
//! SQLite, and tracks every run as an auditable job.

pub mod cli;
pub mod config;
pub mod models;
pub mod modules;
pub mod orchestrator;
pub mod registry;
pub mod repository;
pub mod supervisor;
