//! Package environment management.
//!
//! Resolves package specs against an [`Index`], plans the [`Action`](planner::Action)s needed to bring a
//! [`Prefix`] to the result and executes them.

pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::Config;
pub use config::ReinstallPolicy;

pub mod index;
pub use index::Index;
pub use index::Dist;
pub use index::Spec;
pub use index::PackageRecord;

pub mod resolver;
pub use resolver::Resolver;
pub use resolver::ResolvedSet;

pub mod prefix;
pub use prefix::Prefix;

pub mod installation;

pub mod planner;
pub use planner::Action;
pub use planner::Planner;

pub mod executor;
pub use executor::Executor;

pub mod manager;
pub use manager::Manager;
