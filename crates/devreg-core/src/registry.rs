//! Wiring of the registry components over one storage backend.

use std::sync::Arc;

use chrono_tz::Tz;

use crate::config::RegistryConfig;
use crate::device::DeviceLifecycle;
use crate::error::Result;
use crate::passport::PassportRegistry;
use crate::renovation::RenovationLedger;
use crate::storage::JsonStore;
use crate::store::{DeviceStore, PassportStore, RenovationStore, UserStore};
use crate::user::OwnerOnboarding;
use crate::warranty::WarrantyPolicy;

/// All registry components, sharing their collaborators.
#[derive(Clone)]
pub struct Registry {
    /// Passport CRUD.
    pub passports: PassportRegistry,
    /// Device lifecycle.
    pub devices: DeviceLifecycle,
    /// Renovation history.
    pub renovations: RenovationLedger,
    /// Owner sign-up.
    pub owners: OwnerOnboarding,
}

impl Registry {
    /// Wire the components over separate collaborators.
    pub fn new(
        passport_store: Arc<dyn PassportStore>,
        device_store: Arc<dyn DeviceStore>,
        renovation_store: Arc<dyn RenovationStore>,
        user_store: Arc<dyn UserStore>,
        policy: WarrantyPolicy,
        timezone: Tz,
    ) -> Self {
        let passports = PassportRegistry::new(passport_store);
        let devices = DeviceLifecycle::new(device_store, passports.clone(), policy);
        let renovations = RenovationLedger::new(renovation_store, devices.clone());
        let owners = OwnerOnboarding::new(user_store, devices.clone(), timezone);
        Self {
            passports,
            devices,
            renovations,
            owners,
        }
    }

    /// Wire the components over a single [`JsonStore`].
    pub fn with_store(store: Arc<JsonStore>, policy: WarrantyPolicy, timezone: Tz) -> Self {
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            policy,
            timezone,
        )
    }

    /// Build the registry described by a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone is invalid or the snapshot cannot be
    /// loaded.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let timezone = config.timezone()?;
        let store = match &config.storage.data_dir {
            Some(dir) => JsonStore::open(dir)?,
            None => JsonStore::in_memory(),
        };
        Ok(Self::with_store(Arc::new(store), config.warranty, timezone))
    }

    /// An empty in-memory registry with default rules.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_store(
            Arc::new(JsonStore::in_memory()),
            WarrantyPolicy::default(),
            chrono_tz::UTC,
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::device::NewDevice;
    use crate::error::RegistryError;
    use crate::passport::NewPassport;

    const RACERS: u64 = 8;

    fn covering(offset: u64) -> NewPassport {
        NewPassport {
            name: "Speaker".into(),
            model: "SB".into(),
            serial_prefix: "SB".into(),
            from_serial_number: 1 + offset,
            to_serial_number: 2000 + offset,
            warranty_months: 24,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_creates_admit_one() {
        let registry = Registry::in_memory();

        let handles: Vec<_> = (0..RACERS)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.passports.create(covering(i)).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert!(matches!(err, RegistryError::SerialRangeConflict)),
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_of_one_serial_admit_one() {
        let registry = Registry::in_memory();
        registry.passports.create(covering(0)).await.unwrap();
        let purchase_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .devices
                        .add_anonymous_device(NewDevice {
                            serial_number: "SB50".into(),
                            purchase_date,
                        })
                        .await
                })
            })
            .collect();

        let mut registered = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(device) => {
                    assert_eq!(device.serial_number, "SB50");
                    registered += 1;
                }
                Err(err) => assert!(matches!(err, RegistryError::DeviceAlreadyExists)),
            }
        }
        assert_eq!(registered, 1);
        assert!(registry.devices.find_by_serial("SB50").await.unwrap().is_some());
    }
}
