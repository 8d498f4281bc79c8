//! Device registration, warranty recomputation and removal.
//!
//! Devices are keyed by serial number, which is unique across the whole
//! registry. A device links to the passport covering its serial (when one
//! exists at registration time) and optionally to an owner. Its warranty
//! expiration date is always derived from the purchase date, the linked
//! passport's warranty months and the [`WarrantyPolicy`].

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::error::{RegistryError, Result};
use crate::passport::{Passport, PassportId, PassportRegistry};
use crate::store::{DeviceStore, StoreError};
use crate::user::{User, UserId};
use crate::warranty::{MissingPassportPolicy, WarrantyPolicy};

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "serial_number": "SB1500",
    "purchase_date": "2024-01-01",
    "warranty_expiration_date": "2026-01-01",
    "comment": null,
    "owner": null,
    "passport_id": 1
}))]
pub struct Device {
    /// Globally unique serial number.
    pub serial_number: String,

    /// Date the device was bought.
    pub purchase_date: NaiveDate,

    /// Derived warranty end date.
    pub warranty_expiration_date: NaiveDate,

    /// Free-text note.
    #[serde(default)]
    pub comment: Option<String>,

    /// Owning user, `None` for anonymous devices.
    #[serde(default)]
    pub owner: Option<UserId>,

    /// Passport covering the serial at registration time.
    #[serde(default)]
    pub passport_id: Option<PassportId>,
}

/// Input for registering a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "serial_number": "SB1500",
    "purchase_date": "2024-01-01"
}))]
pub struct NewDevice {
    /// Serial number printed on the device.
    pub serial_number: String,

    /// Date the device was bought.
    pub purchase_date: NaiveDate,
}

/// Partial device update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "purchase_date": "2024-02-01",
    "comment": "Receipt re-issued by the shop"
}))]
pub struct DevicePatch {
    /// Corrected purchase date. Triggers warranty recomputation.
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,

    /// New free-text note.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Orchestrates the device lifecycle.
#[derive(Clone)]
pub struct DeviceLifecycle {
    devices: Arc<dyn DeviceStore>,
    passports: PassportRegistry,
    policy: WarrantyPolicy,
}

impl DeviceLifecycle {
    /// Create a lifecycle over a device store and passport registry.
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        passports: PassportRegistry,
        policy: WarrantyPolicy,
    ) -> Self {
        Self {
            devices,
            passports,
            policy,
        }
    }

    /// Guard that a serial number is still free.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DeviceAlreadyExists`] if a device already uses it.
    pub async fn assert_not_registered(&self, serial: &str) -> Result<()> {
        if self.devices.exists_by_serial(serial).await? {
            debug!(serial, "serial number already registered");
            return Err(RegistryError::DeviceAlreadyExists);
        }
        Ok(())
    }

    /// Register a device on behalf of an owner.
    ///
    /// When no passport covers the serial the [`MissingPassportPolicy`]
    /// decides between registering without a passport and refusing.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidSerialNumber`] for a blank serial
    /// - [`RegistryError::DeviceAlreadyExists`] if the serial is taken
    /// - [`RegistryError::UserNotFound`] if `owner` is `None`
    /// - [`RegistryError::PassportNotFoundForSerial`] under
    ///   [`MissingPassportPolicy::Reject`]
    /// - [`RegistryError::AmbiguousSerialRange`] if passports overlap
    pub async fn register_new_device(
        &self,
        spec: NewDevice,
        owner: Option<&User>,
    ) -> Result<Device> {
        require_serial(&spec.serial_number)?;
        self.assert_not_registered(&spec.serial_number).await?;
        let owner = owner.ok_or(RegistryError::UserNotFound)?;

        let passport = match self.passports.resolve_by_serial(&spec.serial_number).await {
            Ok(passport) => Some(passport),
            Err(RegistryError::PassportNotFoundForSerial(serial))
                if self.policy.missing_passport_policy == MissingPassportPolicy::ZeroWarranty =>
            {
                debug!(serial, "registering device without passport");
                None
            }
            Err(err) => return Err(err),
        };

        let device = self.build(spec, passport.as_ref(), Some(owner.id));
        let device = self.insert(device).await?;
        info!(
            serial = %device.serial_number,
            owner = %owner.id,
            expires = %device.warranty_expiration_date,
            "device registered"
        );
        Ok(device)
    }

    /// Register a device with no owner.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::DeviceAlreadyExists`] if the serial is taken
    /// - [`RegistryError::InvalidSerialNumber`] if the serial is blank or
    ///   resolving its passport fails for any reason
    pub async fn add_anonymous_device(&self, spec: NewDevice) -> Result<Device> {
        require_serial(&spec.serial_number)?;
        self.assert_not_registered(&spec.serial_number).await?;

        let passport = self
            .passports
            .resolve_by_serial(&spec.serial_number)
            .await
            .map_err(|err| {
                warn!(
                    serial = %spec.serial_number,
                    error = %err,
                    "anonymous registration rejected"
                );
                RegistryError::InvalidSerialNumber
            })?;

        let device = self.build(spec, Some(&passport), None);
        let device = self.insert(device).await?;
        info!(
            serial = %device.serial_number,
            passport_id = %passport.id,
            expires = %device.warranty_expiration_date,
            "anonymous device registered"
        );
        Ok(device)
    }

    /// Fetch a device that must exist.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DeviceNotRegistered`] if there is none.
    pub async fn lookup_or_fail(&self, serial: &str) -> Result<Device> {
        self.devices
            .find_by_serial(serial)
            .await?
            .ok_or(RegistryError::DeviceNotRegistered)
    }

    /// Fetch a device, tolerating absence.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Persistence`] if the store cannot be read.
    pub async fn find_by_serial(&self, serial: &str) -> Result<Option<Device>> {
        Ok(self.devices.find_by_serial(serial).await?)
    }

    /// Apply a partial update, recomputing the warranty when the purchase
    /// date is provided.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DeviceNotFound`] if the device does not exist.
    pub async fn update_device(&self, serial: &str, patch: DevicePatch) -> Result<Device> {
        let mut device = self
            .devices
            .find_by_serial(serial)
            .await?
            .ok_or(RegistryError::DeviceNotFound)?;

        if let Some(comment) = patch.comment {
            device.comment = Some(comment);
        }

        if let Some(purchase_date) = patch.purchase_date {
            let passport = match device.passport_id {
                Some(id) => self.passports.find_by_id(id).await?,
                None => None,
            };
            device.purchase_date = purchase_date;
            device.warranty_expiration_date = self.policy.expiration_for(
                purchase_date,
                passport.as_ref(),
                device.owner.is_some(),
            );
        }

        let device = self.devices.save(device).await.map_err(|err| match err {
            StoreError::RowNotFound { .. } => RegistryError::DeviceNotFound,
            other => other.into(),
        })?;
        info!(
            serial = %device.serial_number,
            expires = %device.warranty_expiration_date,
            "device updated"
        );
        Ok(device)
    }

    /// Remove a device. Removing an unknown serial succeeds.
    ///
    /// # Errors
    ///
    /// Any storage failure, typically existing renovations, is reported as
    /// [`RegistryError::DeviceDeleteBlocked`].
    pub async fn delete_device(&self, serial: &str) -> Result<()> {
        match self.devices.delete_by_serial(serial).await {
            Ok(removed) => {
                debug!(serial, removed, "device delete");
                Ok(())
            }
            Err(err) => {
                warn!(serial, error = %err, "device delete blocked");
                Err(RegistryError::DeviceDeleteBlocked)
            }
        }
    }

    fn build(
        &self,
        spec: NewDevice,
        passport: Option<&Passport>,
        owner: Option<UserId>,
    ) -> Device {
        Device {
            warranty_expiration_date: self.policy.expiration_for(
                spec.purchase_date,
                passport,
                owner.is_some(),
            ),
            serial_number: spec.serial_number,
            purchase_date: spec.purchase_date,
            comment: None,
            owner,
            passport_id: passport.map(|p| p.id),
        }
    }

    async fn insert(&self, device: Device) -> Result<Device> {
        self.devices.insert(device).await.map_err(|err| match err {
            StoreError::DuplicateKey { .. } => RegistryError::DeviceAlreadyExists,
            other => other.into(),
        })
    }
}

fn require_serial(serial: &str) -> Result<()> {
    if serial.trim().is_empty() {
        return Err(RegistryError::InvalidSerialNumber);
    }
    Ok(())
}
