//! OpenShift dashboard server
//!
//! Configuration, HTTP router, home page rendering, request statistics and
//! static files on top of `dashboard-lib`.

pub mod api;
pub mod assets;
pub mod config;
pub mod stats;
pub mod view;
