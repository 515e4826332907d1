// Library for the binaries and tests to access modules

pub mod archiver;
pub mod config;
pub mod error;
pub mod github;
pub mod models;
pub mod reconciler;
pub mod scheduler;
pub mod timestamp;
pub mod version;
pub mod views_repo;
