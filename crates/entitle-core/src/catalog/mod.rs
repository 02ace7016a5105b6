//! Service catalog: the declarative definition of every entitlement this host
//! can enable, and the resolver that turns a definition into an activation.

pub mod activation;
pub mod parser;
pub mod runner;
pub mod schema;

pub use activation::{CatalogEntitlement, CatalogResolver};
pub use parser::{parse_catalog, parse_catalog_str};
pub use runner::{CommandOutcome, CommandRunner, SystemCommandRunner};
pub use schema::{Catalog, ServiceDefinition, VariantDefinition};
