//! # Installation
//!
//! Getting a package's files onto disk and into a prefix.
//!
//! 1. [`download`] fetches the archive into a package cache directory.
//! 1. [`content`] extracts the archive next to it.
//! 1. [`deployment`] links the extracted files into a prefix and records what was placed.
//!
//! The executor only talks to the [`Fetcher`] and [`Deployment`] traits so either can be swapped out.

pub mod download;
pub use download::Fetcher;
pub use download::ChannelFetcher;
pub use download::DownloadError;

pub mod content;
pub use content::ContentError;

pub mod deployment;
pub use deployment::Deployment;
pub use deployment::HardLinkDeployment;
pub use deployment::DeploymentError;
