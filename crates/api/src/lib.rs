//! HTTP API for the gas cylinder distribution service.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
pub mod seed;
