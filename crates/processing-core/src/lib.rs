//! Reframe Processing Core
//!
//! Turns recorded telemetry into editing decisions:
//! - **Auto-Zoom:** score click sites and emit zoom keyframes
//! - **Cursor Smoothing:** time-weighted cursor lookup for the overlay
//!
//! This crate is pure computation: no I/O, no clocks, no platform
//! dependencies. All inputs are data; all outputs are data.

pub mod auto_zoom;
pub mod cursor_smooth;

pub use auto_zoom::{AutoZoomConfig, AutoZoomGenerator, ZoomCandidate, AUTO_ZOOM_CONFIG_VERSION};
pub use cursor_smooth::CursorSmoother;
