//! Common CLI options of provider binaries, using the `clap` crate.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use cdn_provider::{cli, resources};
//!
//! #[derive(clap::Parser)]
//! #[command(name = "CDN Provider", version)]
//! struct Opts {
//!     #[clap(subcommand)]
//!     command: cli::Command,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let opts = Opts::parse();
//! let registry = resources::registry()?;
//!
//! match opts.command {
//!     cli::Command::Schema => cli::print_schemas(&registry)?,
//!     cli::Command::Run(arguments) => {
//!         // Serve requests against `arguments.endpoint`, e.g. through `arguments.cdns(&api)`
//!     }
//! }
//! # Ok(())
//! # }
//! ```
use clap::{Args, Parser};
use serde::Serialize;
use url::Url;

use crate::{
    logging::LoggingOptions,
    registry::Registry,
    resources::cdn::{CdnApi, Cdns},
    schema::Schema,
    yaml::{self, SerializeOptions, YamlSchema as _},
};

/// A common set of commands used by provider binaries.
///
/// This enum is generic over the arguments available to the [`Command::Run`] subcommand. By
/// default, [`RunArguments`] is used, but a custom type can be used.
#[derive(Debug, PartialEq, Eq, Parser)]
pub enum Command<Run: Args = RunArguments> {
    /// Print the writable and read-only schema of every resource type.
    Schema,

    /// Run the provider.
    Run(Run),
}

/// Default CLI arguments of a running provider.
#[derive(Debug, PartialEq, Eq, Parser)]
#[command(long_about = "")]
pub struct RunArguments {
    /// Base URL of the upstream API.
    #[arg(long, env, value_name = "URL")]
    pub endpoint: Url,

    /// Key used to authenticate against the upstream API.
    #[arg(long, env, hide_env_values = true)]
    pub api_key: String,

    /// Remove managed records from state when the upstream API no longer knows them, instead of
    /// failing the read.
    #[arg(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub remove_on_missing: bool,

    // IMPORTANT: All (flattened) sub structs should be placed at the end to ensure the help
    // headings are correct.
    #[command(flatten)]
    pub logging: LoggingOptions,
}

impl RunArguments {
    /// The CDN entry points against `api`, configured by these arguments.
    pub fn cdns<'a, A: CdnApi + ?Sized>(&self, api: &'a A) -> Cdns<'a, A> {
        Cdns::new(api).remove_on_missing(self.remove_on_missing)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSchemas<'a> {
    name: &'a str,
    writable: &'a Schema,
    read_only: &'a Schema,
}

/// Prints one YAML document per resource type to stdout.
pub fn print_schemas(registry: &Registry) -> Result<(), yaml::Error> {
    for resource in registry.resources() {
        ResourceSchemas {
            name: &resource.definition.name,
            writable: &resource.definition.schema,
            read_only: &resource.read_only_schema,
        }
        .print_yaml_schema(SerializeOptions::default())?;
    }
    Ok(())
}
