//! Building blocks of an infrastructure provider for a CDN API.
//!
//! A resource type is declared once as a writable [`schema::Schema`]. The schema of its read-only
//! query is derived from it, and both are decoded through the same typed record. Records are read
//! through [`reader::RecordReader`], listed through [`list::list_enriched`] and validated against
//! the rules held in the [`registry::Registry`].
//!
//! ## Crate Features
//!
//! - `default` enables `clap`.
//! - `clap` enables the [`cli`] module and CLI arguments on [`logging::LoggingOptions`].

#[cfg(feature = "clap")]
pub mod cli;
pub mod client;
pub mod list;
pub mod locator;
pub mod logging;
pub mod reader;
pub mod registry;
pub mod resources;
pub mod schema;
pub mod snapshot;
pub mod switchable;
pub mod validation;
pub mod value;
pub mod yaml;

pub use yaml::YamlSchema;
