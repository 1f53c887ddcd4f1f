pub mod config;
pub mod constraint;
pub mod copy_tree;
pub mod error;
pub mod finder;
pub mod installation;
pub mod language;
pub mod lifecycle;
pub mod location;
pub mod matcher;
pub mod mutants;
pub mod operators;
pub mod output;
pub mod patch;
pub mod replacement;
pub mod runner;
pub mod server;
pub mod snapshot;
pub mod sources;
pub mod state;
pub mod workspace;

pub use config::Configuration;
pub use error::{Error, Result};
pub use finder::MutationFilter;
pub use installation::Installation;
pub use location::{FileLocationRange, Location, LocationRange};
pub use matcher::{Match, Matcher, TemplateMatcher};
pub use mutants::{Mutant, Mutation, Replacement};
pub use snapshot::{Backend, BuildOutcome, Container, Snapshot};
pub use workspace::LocalBackend;
