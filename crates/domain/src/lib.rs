//! Entity lifecycle core.
//!
//! This crate provides the generic lifecycle shared by every managed resource:
//! - `VersionStamp` optimistic locking (from `entity-store`)
//! - `AuditTrail` provenance stored in each entity's `DetailInfo`
//! - a status state machine guarded by `Entity::guard_mutation`
//! - the `validator` guards and the `LifecycleService` application service

pub mod audit;
pub mod capability;
pub mod command;
pub mod entity;
pub mod error;
pub mod repository;
pub mod resource;
pub mod resources;
pub mod response;
pub mod service;
pub mod status;
pub mod validator;

pub use audit::{AUDIT_KEY, AuditAction, AuditTrail, AuditTrailFactory, ChangeLogEntry, DetailInfo};
pub use capability::{
    ActorSource, Authorizer, Clock, FixedClock, RequestContext, StaticAuthorizer, SystemClock,
};
pub use command::{CreateCommand, EntityChanges, MAX_NAME_LENGTH, Patch, UpdateCommand};
pub use entity::{Entity, EntityDiff, GuardedMutation};
pub use error::DomainError;
pub use repository::{Repository, StoreRepository};
pub use resource::Resource;
pub use resources::{
    Brand, BrandFields, BrandPatch, Placeholder, PlaceholderFields, PlaceholderPatch,
};
pub use response::EntityResponse;
pub use service::LifecycleService;
pub use status::{Status, UnknownStatus};
