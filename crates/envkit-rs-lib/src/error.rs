//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("bincode error: {0}")]
	Bincode(#[from] bincode::Error),
	#[error("parsing error: {0}")]
	Parse(#[from] crate::index::ParseError),
	#[error("{0}")]
	Resolve(#[from] crate::resolver::ResolveError),
	#[error("{0}")]
	Plan(#[from] crate::planner::PlanError),
	#[error("{0}")]
	Execute(#[from] crate::executor::ExecuteError),
	#[error("deployment error: {0}")]
	Deployment(#[from] crate::installation::deployment::DeploymentError),
	#[error("configuration error: {0}")]
	Config(String),
	#[error("package {0} is not in the index.")]
	NotInIndex(crate::index::Dist),
}
