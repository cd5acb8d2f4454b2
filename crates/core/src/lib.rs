//! Core types and utilities for rackenv
//!
//! This crate holds everything the convergence steps and the service
//! adapters share:
//! - [`Error`] and [`Result`]
//! - [`config::ConvergeConfig`], the run configuration
//! - [`process`], the command runner every external program goes through
//! - [`services`], the traits for package, runtime and dependency managers
//! - [`profile`], deployment profiles and the exclusion list
//! - [`outcome`], typed step results

pub mod config;
pub mod error;
pub mod outcome;
pub mod ownership;
pub mod process;
pub mod profile;
pub mod services;

pub use error::{Error, Result};
