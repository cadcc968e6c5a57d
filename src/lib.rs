//! Vacancy Radar Library
//!
//! This library provides the core functionality for the vacancy-radar
//! service: cross-referencing five public data sources (geocoding,
//! real-estate transactions, energy diagnostics, annual electricity
//! consumption, corporate registry) into a single explainable vacancy
//! likelihood score for a property address.
//!
//! # Modules
//!
//! - `analysis`: Per-address analysis workflow.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Domain records and upstream wire formats.
//! - `normalize`: Query-string normalization helpers.
//! - `scoring`: The scoring engine (pure core).
//! - `services`: External data-source clients.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod scoring;
pub mod services;
