//! cotask common library
//!
//! Shared constants, configuration loading and the hardware boundary used by
//! the cotask runtime.
//!
//! # Module Structure
//!
//! - [`consts`] - System-wide numeric limits and default paths
//! - [`config`] - Configuration loading traits and types
//! - [`system`] - Runtime configuration schema with validation
//! - [`hal`] - Driver traits and the value types that cross them
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cotask_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod system;
