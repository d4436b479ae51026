//! Environment configuration infrastructure

mod service;

pub use service::EnvironmentConfigService;
