//! Service and repair history recorded against registered devices.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::device::{Device, DeviceLifecycle};
use crate::error::{RegistryError, Result};
use crate::store::{RenovationStore, StoreError};

/// Maximum length of a renovation description.
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Renovation identifier (UUID v7, time ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RenovationId(pub Uuid);

impl RenovationId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RenovationId {
    fn default() -> Self {
        Self::new()
    }
}

/// A renovation as stored, referencing its device by serial number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenovationRecord {
    /// Renovation identifier.
    pub id: RenovationId,
    /// Serial number of the serviced device.
    pub device_serial: String,
    /// What was done.
    pub description: String,
    /// When it was done.
    pub renovation_date: NaiveDate,
}

/// A renovation with its device populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Renovation {
    /// Renovation identifier.
    pub id: RenovationId,
    /// The serviced device.
    pub device: Device,
    /// What was done.
    #[schema(example = "Changed compressor")]
    pub description: String,
    /// When it was done.
    pub renovation_date: NaiveDate,
}

impl Renovation {
    fn from_record(record: RenovationRecord, device: Device) -> Self {
        Self {
            id: record.id,
            device,
            description: record.description,
            renovation_date: record.renovation_date,
        }
    }
}

/// Input for recording a renovation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "device_serial": "SB1500",
    "description": "Changed compressor",
    "renovation_date": "2024-07-15"
}))]
pub struct NewRenovation {
    /// Serial number of the serviced device.
    pub device_serial: String,
    /// What was done.
    pub description: String,
    /// When it was done.
    pub renovation_date: NaiveDate,
}

/// Append-only renovation history.
#[derive(Clone)]
pub struct RenovationLedger {
    store: Arc<dyn RenovationStore>,
    devices: DeviceLifecycle,
}

impl RenovationLedger {
    /// Create a ledger over a renovation store.
    pub fn new(store: Arc<dyn RenovationStore>, devices: DeviceLifecycle) -> Self {
        Self { store, devices }
    }

    /// Record a renovation against an existing device.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DeviceNotRegistered`] if the device does not exist
    /// - [`RegistryError::EmptyRenovationDescription`] or
    ///   [`RegistryError::RenovationDescriptionTooLong`] for a bad description
    pub async fn save(&self, spec: NewRenovation) -> Result<Renovation> {
        let device = self.devices.lookup_or_fail(&spec.device_serial).await?;

        let description = spec.description.trim();
        if description.is_empty() {
            return Err(RegistryError::EmptyRenovationDescription);
        }
        let length = description.chars().count();
        if length > MAX_DESCRIPTION_LENGTH {
            return Err(RegistryError::RenovationDescriptionTooLong {
                max: MAX_DESCRIPTION_LENGTH,
                actual: length,
            });
        }

        let record = RenovationRecord {
            id: RenovationId::new(),
            device_serial: device.serial_number.clone(),
            description: description.to_string(),
            renovation_date: spec.renovation_date,
        };
        let record = self.store.insert(record).await.map_err(|err| match err {
            StoreError::DanglingReference { .. } => RegistryError::DeviceNotRegistered,
            other => other.into(),
        })?;

        info!(serial = %device.serial_number, renovation_id = %record.id.0, "renovation recorded");
        Ok(Renovation::from_record(record, device))
    }

    /// All renovations of a device, oldest first.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DeviceNotRegistered`] if the device does not exist.
    pub async fn history(&self, serial: &str) -> Result<Vec<Renovation>> {
        let device = self.devices.lookup_or_fail(serial).await?;
        let mut records = self.store.find_by_device(serial).await?;
        records.sort_by_key(|r| (r.renovation_date, r.id.0));
        Ok(records
            .into_iter()
            .map(|record| Renovation::from_record(record, device.clone()))
            .collect())
    }
}
