//! User interface components.
//!
//! This module provides the Dioxus-based UI for the application:
//!
//! - [`app`] - Main application entry point, polls the call state
//! - [`call_panel`] - Status line, volume ring and call controls

mod app;
mod call_panel;

pub use app::App;
