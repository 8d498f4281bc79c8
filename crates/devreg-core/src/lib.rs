//! # devreg-core
//!
//! Core business logic for the device warranty registry.
//!
//! This crate provides:
//! - Device passports: per-model warranty terms covering a range of serial numbers
//! - Serial number resolution against those ranges
//! - Device registration with computed warranty expiration
//! - Renovation (service) history per device
//! - Owner onboarding
//!
//! ## Architecture
//!
//! - [`serial`] - Serial number parsing and range resolution
//! - [`passport`] - Passport CRUD with range-conflict checks
//! - [`warranty`] - Warranty period rules
//! - [`device`] - Device registration, lookup, update and deletion
//! - [`renovation`] - Renovation history
//! - [`user`] - Owners and onboarding
//! - [`store`] - Persistence traits and constraint errors
//! - [`storage`] - JSON snapshot implementation of the persistence traits
//! - [`registry`] - Wiring of all components over one store
//! - [`config`] - Layered configuration
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod device;
pub mod error;
pub mod passport;
pub mod registry;
pub mod renovation;
pub mod serial;
pub mod storage;
pub mod store;
pub mod types;
pub mod user;
pub mod warranty;

pub use config::{ConfigError, ConfigResult, RegistryConfig};
pub use device::{Device, DeviceLifecycle, DevicePatch, NewDevice};
pub use error::{RegistryError, Result};
pub use passport::{NewPassport, Passport, PassportId, PassportPatch, PassportRegistry};
pub use registry::Registry;
pub use renovation::{NewRenovation, Renovation, RenovationId, RenovationLedger};
pub use serial::{ParsedSerial, SerialRange, SerialRangeIndex};
pub use storage::JsonStore;
pub use store::{StoreError, StoreResult};
pub use types::HealthResponse;
pub use user::{NewOwner, Onboarded, OwnerOnboarding, User, UserId};
pub use warranty::{MissingPassportPolicy, WarrantyPolicy};
