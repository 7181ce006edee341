//! Client configuration.
//!
//! A YAML file (optional) is expanded for environment variables, parsed,
//! overlaid with command-line flags and validated before anything dials
//! the server.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoadWarning};
pub use schema::{ClientConfig, ClientSettings};
pub use validation::{ValidationResult, Validator};
