//! Device owners.
//!
//! The registry only knows users as opaque owner identities. Credentials and
//! profile management live elsewhere; [`OwnerOnboarding`] covers the one
//! flow that touches devices, signing a user up together with their first
//! device.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::device::{Device, DeviceLifecycle, NewDevice};
use crate::error::{RegistryError, Result};
use crate::store::UserStore;

/// User identifier (UUID v7).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A device owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    #[schema(example = "Maria Ivanova")]
    pub full_name: String,
    /// Contact address.
    #[serde(default)]
    #[schema(example = "maria@example.com")]
    pub email: Option<String>,
}

impl User {
    /// Create a user with a fresh id.
    pub fn new(full_name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: UserId::new(),
            full_name: full_name.into(),
            email,
        }
    }
}

/// Input for signing up an owner, optionally with their first device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "full_name": "Maria Ivanova",
    "email": "maria@example.com",
    "device_serial_number": "SB1500",
    "purchase_date": "2024-01-01"
}))]
pub struct NewOwner {
    /// Display name.
    pub full_name: String,
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,
    /// Serial number of a device to register for the new owner.
    #[serde(default)]
    pub device_serial_number: Option<String>,
    /// Purchase date of that device. Defaults to today.
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
}

/// Result of onboarding an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Onboarded {
    /// The stored user.
    pub user: User,
    /// The device registered alongside, if a serial was given.
    pub device: Option<Device>,
}

/// Signs up owners and registers their first device.
#[derive(Clone)]
pub struct OwnerOnboarding {
    users: Arc<dyn UserStore>,
    devices: DeviceLifecycle,
    timezone: Tz,
}

impl OwnerOnboarding {
    /// Create the onboarding flow. `timezone` decides what "today" is when
    /// no purchase date is supplied.
    pub fn new(users: Arc<dyn UserStore>, devices: DeviceLifecycle, timezone: Tz) -> Self {
        Self {
            users,
            devices,
            timezone,
        }
    }

    /// Look up an owner, tolerating absence.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Persistence`] if the store cannot be read.
    pub async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.find_by_id(id).await?)
    }

    /// Store a new owner and register their device.
    ///
    /// A taken serial is detected before the user is stored, so a failed
    /// onboarding leaves no user behind.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidUserField`] for a blank name
    /// - [`RegistryError::DeviceAlreadyExists`] if the serial is taken
    /// - any error of [`DeviceLifecycle::register_new_device`]
    pub async fn onboard(&self, spec: NewOwner) -> Result<Onboarded> {
        if spec.full_name.trim().is_empty() {
            return Err(RegistryError::InvalidUserField("full_name"));
        }
        if let Some(serial) = &spec.device_serial_number {
            self.devices.assert_not_registered(serial).await?;
        }

        let user = self
            .users
            .insert(User::new(spec.full_name.trim(), spec.email))
            .await?;

        let Some(serial_number) = spec.device_serial_number else {
            info!(user_id = %user.id, "owner onboarded");
            return Ok(Onboarded { user, device: None });
        };

        let purchase_date = spec.purchase_date.unwrap_or_else(|| self.today());
        let registration = self
            .devices
            .register_new_device(
                NewDevice {
                    serial_number,
                    purchase_date,
                },
                Some(&user),
            )
            .await;

        match registration {
            Ok(device) => {
                info!(
                    user_id = %user.id,
                    serial = %device.serial_number,
                    "owner onboarded with device"
                );
                Ok(Onboarded {
                    user,
                    device: Some(device),
                })
            }
            Err(err) => {
                warn!(
                    user_id = %user.id,
                    error = %err,
                    "device registration failed, removing user"
                );
                if let Err(cleanup) = self.users.delete_by_id(user.id).await {
                    warn!(user_id = %user.id, error = %cleanup, "failed to remove user");
                }
                Err(err)
            }
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}
