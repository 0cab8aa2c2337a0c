//! Reframe Project Model
//!
//! Defines the core data contracts for Reframe projects:
//! - **Timeline:** zoom keyframes, the trimmed segment, and the pure
//!   interpolation that turns keyframes into a per-instant camera state
//! - **Cursor:** recorded pointer telemetry in source-pixel coordinates
//! - **Background:** per-session compositing style
//! - **Project:** persisted metadata and export settings, keyed by project id

pub mod background;
pub mod camera;
pub mod cursor;
pub mod project;
pub mod timeline;

pub use background::*;
pub use camera::*;
pub use cursor::*;
pub use project::*;
pub use timeline::*;
