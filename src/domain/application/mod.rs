//! Application registry

mod entity;

pub use entity::{Application, ApplicationId, OrganizationId};
