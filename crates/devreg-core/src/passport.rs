//! Passport records and the registry that guards their serial ranges.
//!
//! A passport describes a product model: which serial numbers belong to it
//! (a prefix plus an inclusive numeric range) and how many months of
//! warranty a device of that model gets. For any one prefix the ranges of
//! all passports are pairwise disjoint, so every serial resolves to at most
//! one passport.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::{RegistryError, Result};
use crate::serial::{SerialRange, SerialRangeIndex};
use crate::store::{PassportStore, StoreError};

/// Storage-assigned passport identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct PassportId(pub u64);

impl fmt::Display for PassportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored passport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1,
    "name": "Split A/C 12k BTU",
    "model": "SB-12",
    "serial_prefix": "SB",
    "from_serial_number": 1,
    "to_serial_number": 2000,
    "warranty_months": 24
}))]
pub struct Passport {
    /// Passport identifier.
    pub id: PassportId,

    /// Display name.
    pub name: String,

    /// Product model.
    pub model: String,

    /// Leading non-numeric part of covered serial numbers.
    pub serial_prefix: String,

    /// First covered serial number (inclusive).
    pub from_serial_number: u64,

    /// Last covered serial number (inclusive).
    pub to_serial_number: u64,

    /// Warranty duration for devices of this model.
    pub warranty_months: u32,
}

impl Passport {
    /// The covered serial range.
    #[must_use]
    pub const fn range(&self) -> SerialRange {
        SerialRange::new(self.from_serial_number, self.to_serial_number)
    }
}

/// Fields of a passport before storage assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "Split A/C 12k BTU",
    "model": "SB-12",
    "serial_prefix": "SB",
    "from_serial_number": 1,
    "to_serial_number": 2000,
    "warranty_months": 24
}))]
pub struct NewPassport {
    /// Display name.
    pub name: String,

    /// Product model.
    pub model: String,

    /// Leading non-numeric part of covered serial numbers.
    pub serial_prefix: String,

    /// First covered serial number (inclusive).
    pub from_serial_number: u64,

    /// Last covered serial number (inclusive).
    pub to_serial_number: u64,

    /// Warranty duration for devices of this model.
    pub warranty_months: u32,
}

impl NewPassport {
    /// Attach a storage-assigned id.
    #[must_use]
    pub fn with_id(self, id: PassportId) -> Passport {
        Passport {
            id,
            name: self.name,
            model: self.model,
            serial_prefix: self.serial_prefix,
            from_serial_number: self.from_serial_number,
            to_serial_number: self.to_serial_number,
            warranty_months: self.warranty_months,
        }
    }

    /// The covered serial range.
    #[must_use]
    pub const fn range(&self) -> SerialRange {
        SerialRange::new(self.from_serial_number, self.to_serial_number)
    }
}

/// Partial passport update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "from_serial_number": 50,
    "to_serial_number": 150
}))]
pub struct PassportPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,

    /// New product model.
    #[serde(default)]
    pub model: Option<String>,

    /// New serial prefix.
    #[serde(default)]
    pub serial_prefix: Option<String>,

    /// New warranty duration.
    #[serde(default)]
    pub warranty_months: Option<u32>,

    /// New first serial number.
    #[serde(default)]
    pub from_serial_number: Option<u64>,

    /// New last serial number.
    #[serde(default)]
    pub to_serial_number: Option<u64>,
}

impl PassportPatch {
    fn apply(self, mut passport: Passport) -> Passport {
        if let Some(name) = self.name {
            passport.name = name;
        }
        if let Some(model) = self.model {
            passport.model = model;
        }
        if let Some(prefix) = self.serial_prefix {
            passport.serial_prefix = prefix;
        }
        if let Some(months) = self.warranty_months {
            passport.warranty_months = months;
        }
        if let Some(from) = self.from_serial_number {
            passport.from_serial_number = from;
        }
        if let Some(to) = self.to_serial_number {
            passport.to_serial_number = to;
        }
        passport
    }
}

fn validate(
    name: &str,
    model: &str,
    prefix: &str,
    range: SerialRange,
    warranty_months: u32,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RegistryError::InvalidPassportField("name"));
    }
    if model.trim().is_empty() {
        return Err(RegistryError::InvalidPassportField("model"));
    }
    if prefix.chars().any(|c| c.is_ascii_digit()) {
        return Err(RegistryError::InvalidSerialPrefix(prefix.to_string()));
    }
    if !range.is_valid() {
        return Err(RegistryError::InvalidSerialRange {
            from: range.from,
            to: range.to,
        });
    }
    if warranty_months == 0 {
        return Err(RegistryError::InvalidWarrantyMonths);
    }
    Ok(())
}

/// CRUD over passports with range-overlap enforcement.
#[derive(Clone)]
pub struct PassportRegistry {
    store: Arc<dyn PassportStore>,
    index: SerialRangeIndex,
}

impl PassportRegistry {
    /// Create a registry over a passport store.
    pub fn new(store: Arc<dyn PassportStore>) -> Self {
        let index = SerialRangeIndex::new(Arc::clone(&store));
        Self { store, index }
    }

    /// Register a new passport.
    ///
    /// # Errors
    ///
    /// - validation errors for blank fields, digit prefixes, inverted ranges
    ///   or zero warranty months
    /// - [`RegistryError::SerialRangeConflict`] if the range intersects a
    ///   passport with the same prefix
    pub async fn create(&self, spec: NewPassport) -> Result<Passport> {
        validate(
            &spec.name,
            &spec.model,
            &spec.serial_prefix,
            spec.range(),
            spec.warranty_months,
        )?;

        let range = spec.range();
        let overlapping = self
            .store
            .find_by_prefix_and_range_overlap(&spec.serial_prefix, range.from, range.to)
            .await?;
        if !overlapping.is_empty() {
            warn!(
                prefix = %spec.serial_prefix,
                from = range.from,
                to = range.to,
                "passport range conflicts with existing passports"
            );
            return Err(RegistryError::SerialRangeConflict);
        }

        let passport = self.store.insert(spec).await.map_err(map_write_error)?;
        info!(
            passport_id = %passport.id,
            prefix = %passport.serial_prefix,
            "passport created"
        );
        Ok(passport)
    }

    /// Apply a partial update to a passport.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::PassportNotFound`] if the id is unknown
    /// - validation errors for the merged passport
    /// - [`RegistryError::SerialRangeConflict`] if the merged range
    ///   intersects another passport with the same prefix
    pub async fn update(&self, id: PassportId, patch: PassportPatch) -> Result<Passport> {
        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(RegistryError::PassportNotFound)?;

        let merged = patch.apply(current);
        validate(
            &merged.name,
            &merged.model,
            &merged.serial_prefix,
            merged.range(),
            merged.warranty_months,
        )?;

        let range = merged.range();
        let conflicting = self
            .store
            .find_by_prefix_and_range_overlap(&merged.serial_prefix, range.from, range.to)
            .await?
            .into_iter()
            .any(|other| other.id != id);
        if conflicting {
            warn!(passport_id = %id, prefix = %merged.serial_prefix, "passport update conflicts");
            return Err(RegistryError::SerialRangeConflict);
        }

        let passport = self.store.save(merged).await.map_err(map_write_error)?;
        info!(passport_id = %passport.id, "passport updated");
        Ok(passport)
    }

    /// Look up a passport, tolerating absence.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Persistence`] if the store cannot be read.
    pub async fn find_by_id(&self, id: PassportId) -> Result<Option<Passport>> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Resolve the passport covering a serial number.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::PassportNotFoundForSerial`] if nothing covers it
    /// - [`RegistryError::AmbiguousSerialRange`] if several passports do
    pub async fn resolve_by_serial(&self, serial: &str) -> Result<Passport> {
        self.index.resolve(serial).await
    }

    /// Remove a passport. Removing an unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Any storage failure, typically devices still referencing the
    /// passport, is reported as [`RegistryError::PassportDeleteFailed`].
    pub async fn delete(&self, id: PassportId) -> Result<()> {
        match self.store.delete_by_id(id).await {
            Ok(removed) => {
                debug!(passport_id = %id, removed, "passport delete");
                Ok(())
            }
            Err(err) => {
                warn!(passport_id = %id, error = %err, "passport delete failed");
                Err(RegistryError::PassportDeleteFailed)
            }
        }
    }
}

fn map_write_error(err: StoreError) -> RegistryError {
    match err {
        StoreError::RangeOverlap { .. } => RegistryError::SerialRangeConflict,
        StoreError::RowNotFound { .. } => RegistryError::PassportNotFound,
        other => other.into(),
    }
}
