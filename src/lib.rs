//! Guiaseller Leads Sync API Library
//!
//! This library provides the core functionality for the guiaseller leads
//! pipeline: reading the external guiaseller database, aggregating commerce
//! activity per user, scoring and segmenting leads, and syncing the results
//! into the leads CRM database.
//!
//! # Modules
//!
//! - `aggregator`: Per-user joins and derived commerce metrics.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management (leads + source).
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `repository`: Leads database persistence.
//! - `scoring`: Weighted lead scoring.
//! - `segmentation`: Sync-time and post-sync segment classification.
//! - `source_reader`: Read-only queries against the guiaseller database.
//! - `sync`: Full sync orchestration.

pub mod aggregator;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod scoring;
pub mod segmentation;
pub mod source_reader;
pub mod sync;
