//! Unified error types for the devreg core library.
//!
//! Every operation exposed by the registry components returns a
//! [`RegistryError`]. Storage backends report their own [`StoreError`]
//! (see [`crate::store`]), which is always reinterpreted at the component
//! boundary and never reaches a caller as-is.
//!
//! # Design Principles
//!
//! - **Stable messages**: Display strings are fixed and safe to compare
//! - **Families**: Each variant belongs to exactly one family (not found,
//!   conflict, invalid input, dependency blocked, unavailable)
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//!
//! # Example
//!
//! ```rust
//! use devreg_core::error::{RegistryError, Result};
//!
//! fn require_serial(serial: &str) -> Result<&str> {
//!     if serial.trim().is_empty() {
//!         return Err(RegistryError::InvalidSerialNumber);
//!     }
//!     Ok(serial)
//! }
//!
//! assert_eq!(
//!     require_serial(" ").unwrap_err().to_string(),
//!     "Invalid serial number"
//! );
//! ```

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::StoreError;

/// The unified error type for all registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    // =========================================================================
    // NOT FOUND
    // =========================================================================
    /// No passport exists with the requested id.
    #[error("Passport not found")]
    PassportNotFound,

    /// No passport covers the given serial number.
    #[error("Passport not found for serial number: {0}")]
    PassportNotFoundForSerial(String),

    /// The device to update does not exist.
    #[error("Device not found")]
    DeviceNotFound,

    /// An operation required a registered device and there is none.
    #[error("Device not registered")]
    DeviceNotRegistered,

    /// An owner-linked operation was called without a resolved user.
    #[error("User not found")]
    UserNotFound,

    // =========================================================================
    // CONFLICT
    // =========================================================================
    /// The serial range intersects another passport with the same prefix.
    #[error("Serial number already exists")]
    SerialRangeConflict,

    /// A device with this serial number is already registered.
    #[error("Device already registered")]
    DeviceAlreadyExists,

    // =========================================================================
    // INVALID INPUT
    // =========================================================================
    /// The serial number could not be resolved on the anonymous path.
    #[error("Invalid serial number")]
    InvalidSerialNumber,

    /// More than one passport covers the serial number.
    #[error("Serial number {0} matches more than one passport")]
    AmbiguousSerialRange(String),

    /// The passport range is inverted.
    #[error("Invalid serial range: from ({from}) must not exceed to ({to})")]
    InvalidSerialRange {
        /// Lower bound provided.
        from: u64,
        /// Upper bound provided.
        to: u64,
    },

    /// The passport warranty duration is zero.
    #[error("Warranty months must be a positive number")]
    InvalidWarrantyMonths,

    /// The serial prefix can never match a parsed serial number.
    #[error("Invalid serial prefix '{0}': a prefix must not contain digits")]
    InvalidSerialPrefix(String),

    /// A required passport text field is blank.
    #[error("Passport {0} cannot be empty")]
    InvalidPassportField(&'static str),

    /// A required user field is blank.
    #[error("User {0} cannot be empty")]
    InvalidUserField(&'static str),

    /// The renovation description was empty.
    #[error("Renovation description cannot be empty")]
    EmptyRenovationDescription,

    /// The renovation description exceeds the maximum allowed length.
    #[error("Renovation description exceeds maximum length of {max} characters (got {actual})")]
    RenovationDescriptionTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length provided.
        actual: usize,
    },

    // =========================================================================
    // DEPENDENCY BLOCKED
    // =========================================================================
    /// The device still has renovation records.
    #[error("Cannot delete device: renovations exist")]
    DeviceDeleteBlocked,

    /// The passport could not be removed, typically because devices use it.
    #[error("Can't delete passport")]
    PassportDeleteFailed,

    // =========================================================================
    // UNAVAILABLE
    // =========================================================================
    /// The storage backend failed for a reason with no domain meaning.
    ///
    /// Components map the constraint violations they expect (duplicate keys,
    /// range overlaps, references) to specific variants before falling back
    /// here. The store error stays available as the source.
    #[error("Persistence error")]
    Persistence(#[from] StoreError),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error")]
    Config(#[from] ConfigError),
}

/// A specialized [`Result`] type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    /// Returns `true` if a requested entity does not exist.
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PassportNotFound
                | Self::PassportNotFoundForSerial(_)
                | Self::DeviceNotFound
                | Self::DeviceNotRegistered
                | Self::UserNotFound
        )
    }

    /// Returns `true` if the operation collided with existing data.
    #[inline]
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::SerialRangeConflict | Self::DeviceAlreadyExists)
    }

    /// Returns `true` if the caller supplied unusable input.
    #[inline]
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidSerialNumber
                | Self::AmbiguousSerialRange(_)
                | Self::InvalidSerialRange { .. }
                | Self::InvalidWarrantyMonths
                | Self::InvalidSerialPrefix(_)
                | Self::InvalidPassportField(_)
                | Self::InvalidUserField(_)
                | Self::EmptyRenovationDescription
                | Self::RenovationDescriptionTooLong { .. }
        )
    }

    /// Returns `true` if dependent records prevent the operation.
    #[inline]
    #[must_use]
    pub const fn is_dependency_blocked(&self) -> bool {
        matches!(self, Self::DeviceDeleteBlocked | Self::PassportDeleteFailed)
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidSerialNumber
            | Self::AmbiguousSerialRange(_)
            | Self::InvalidSerialRange { .. }
            | Self::InvalidWarrantyMonths
            | Self::InvalidSerialPrefix(_)
            | Self::InvalidPassportField(_)
            | Self::InvalidUserField(_)
            | Self::EmptyRenovationDescription
            | Self::RenovationDescriptionTooLong { .. } => 400,

            // 404 Not Found
            Self::PassportNotFound
            | Self::PassportNotFoundForSerial(_)
            | Self::DeviceNotFound
            | Self::DeviceNotRegistered
            | Self::UserNotFound => 404,

            // 409 Conflict - existing data or dependents block the change
            Self::SerialRangeConflict
            | Self::DeviceAlreadyExists
            | Self::DeviceDeleteBlocked
            | Self::PassportDeleteFailed => 409,

            // 500 Internal Server Error - server-side issues
            Self::Persistence(_) | Self::Config(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PassportNotFound | Self::PassportNotFoundForSerial(_) => "PASSPORT_NOT_FOUND",
            Self::DeviceNotFound => "DEVICE_NOT_FOUND",
            Self::DeviceNotRegistered => "DEVICE_NOT_REGISTERED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::SerialRangeConflict => "SERIAL_RANGE_CONFLICT",
            Self::DeviceAlreadyExists => "DEVICE_ALREADY_EXISTS",
            Self::InvalidSerialNumber => "INVALID_SERIAL_NUMBER",
            Self::AmbiguousSerialRange(_) => "AMBIGUOUS_SERIAL_RANGE",
            Self::InvalidSerialRange { .. } => "INVALID_SERIAL_RANGE",
            Self::InvalidWarrantyMonths => "INVALID_WARRANTY_MONTHS",
            Self::InvalidSerialPrefix(_) => "INVALID_SERIAL_PREFIX",
            Self::InvalidPassportField(_) => "INVALID_PASSPORT_FIELD",
            Self::InvalidUserField(_) => "INVALID_USER_FIELD",
            Self::EmptyRenovationDescription => "EMPTY_RENOVATION_DESCRIPTION",
            Self::RenovationDescriptionTooLong { .. } => "RENOVATION_DESCRIPTION_TOO_LONG",
            Self::DeviceDeleteBlocked => "DEVICE_DELETE_BLOCKED",
            Self::PassportDeleteFailed => "PASSPORT_DELETE_FAILED",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
