//! Persistence collaborator contracts.
//!
//! The registry components only talk to storage through these traits. A
//! backend is the final arbiter of uniqueness and referential integrity: the
//! checks a component runs before writing are preconditions, and the backend
//! re-checks them atomically with the write and reports a [`StoreError`]
//! constraint violation when a concurrent caller got there first.

use async_trait::async_trait;
use thiserror::Error;

use crate::device::Device;
use crate::passport::{NewPassport, Passport, PassportId};
use crate::renovation::RenovationRecord;
use crate::serial::ParsedSerial;
use crate::user::{User, UserId};

/// Errors reported by storage backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A row with the same primary key already exists.
    #[error("duplicate key '{key}' in {table}")]
    DuplicateKey {
        /// Table name.
        table: &'static str,
        /// Offending key.
        key: String,
    },

    /// A passport range intersects another range with the same prefix.
    #[error("serial range [{from}, {to}] overlaps an existing range for prefix '{prefix}'")]
    RangeOverlap {
        /// Serial prefix shared by both passports.
        prefix: String,
        /// Lower bound of the rejected range.
        from: u64,
        /// Upper bound of the rejected range.
        to: u64,
    },

    /// The row cannot be removed while other rows reference it.
    #[error("'{key}' in {table} is still referenced by {referenced_by}")]
    StillReferenced {
        /// Table name.
        table: &'static str,
        /// Key of the row that was to be removed.
        key: String,
        /// Table holding the references.
        referenced_by: &'static str,
    },

    /// The row references a parent that does not exist.
    #[error("'{key}' in {table} references a missing row")]
    DanglingReference {
        /// Table of the missing parent.
        table: &'static str,
        /// Key of the missing parent.
        key: String,
    },

    /// An update targeted a row that does not exist.
    #[error("'{key}' not found in {table}")]
    RowNotFound {
        /// Table name.
        table: &'static str,
        /// Missing key.
        key: String,
    },

    /// The backend itself failed (I/O, encoding, connection).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type returned by storage backends.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Passport table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PassportStore: Send + Sync {
    /// Look up a passport by id.
    async fn find_by_id(&self, id: PassportId) -> StoreResult<Option<Passport>>;

    /// All passports with `prefix` whose range intersects `[from, to]`.
    async fn find_by_prefix_and_range_overlap(
        &self,
        prefix: &str,
        from: u64,
        to: u64,
    ) -> StoreResult<Vec<Passport>>;

    /// All passports whose prefix equals the serial's prefix and whose range
    /// contains its numeric suffix.
    async fn find_by_serial(&self, serial: &ParsedSerial) -> StoreResult<Vec<Passport>>;

    /// Insert a new passport and assign its id.
    ///
    /// Fails with [`StoreError::RangeOverlap`] if the range intersects a
    /// passport with the same prefix.
    async fn insert(&self, passport: NewPassport) -> StoreResult<Passport>;

    /// Overwrite an existing passport.
    ///
    /// Fails with [`StoreError::RowNotFound`] if the id is unknown and with
    /// [`StoreError::RangeOverlap`] if the range intersects another passport
    /// with the same prefix.
    async fn save(&self, passport: Passport) -> StoreResult<Passport>;

    /// Remove a passport. Returns whether a row was removed.
    ///
    /// Fails with [`StoreError::StillReferenced`] while devices link to it.
    async fn delete_by_id(&self, id: PassportId) -> StoreResult<bool>;
}

/// Device table, keyed by serial number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Look up a device by serial number.
    async fn find_by_serial(&self, serial: &str) -> StoreResult<Option<Device>>;

    /// Whether a device with this serial number exists.
    async fn exists_by_serial(&self, serial: &str) -> StoreResult<bool>;

    /// Insert a new device.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the serial is taken.
    async fn insert(&self, device: Device) -> StoreResult<Device>;

    /// Overwrite an existing device.
    async fn save(&self, device: Device) -> StoreResult<Device>;

    /// Remove a device. Returns whether a row was removed.
    ///
    /// Fails with [`StoreError::StillReferenced`] while renovations exist.
    async fn delete_by_serial(&self, serial: &str) -> StoreResult<bool>;
}

/// Renovation table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RenovationStore: Send + Sync {
    /// Insert a renovation record.
    ///
    /// Fails with [`StoreError::DanglingReference`] if the device is gone.
    async fn insert(&self, renovation: RenovationRecord) -> StoreResult<RenovationRecord>;

    /// All renovations recorded against a device.
    async fn find_by_device(&self, serial: &str) -> StoreResult<Vec<RenovationRecord>>;
}

/// User table. Only what device ownership needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by id.
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Insert a new user.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the id is taken.
    async fn insert(&self, user: User) -> StoreResult<User>;

    /// Remove a user. Returns whether a row was removed.
    async fn delete_by_id(&self, id: UserId) -> StoreResult<bool>;
}
