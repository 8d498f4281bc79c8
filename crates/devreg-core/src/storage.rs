//! JSON snapshot storage backend.
//!
//! All tables live in memory behind one mutex, so every store call runs its
//! constraint checks and its write in a single critical section. When a data
//! directory is configured the whole registry is written to
//! `<data_dir>/registry.json` after each mutation; a failed write leaves the
//! in-memory tables untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::device::Device;
use crate::passport::{NewPassport, Passport, PassportId};
use crate::renovation::RenovationRecord;
use crate::serial::{ParsedSerial, SerialRange};
use crate::store::{
    DeviceStore, PassportStore, RenovationStore, StoreError, StoreResult, UserStore,
};
use crate::user::{User, UserId};

const SNAPSHOT_FILE: &str = "registry.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tables {
    last_passport_id: u64,
    passports: BTreeMap<PassportId, Passport>,
    devices: BTreeMap<String, Device>,
    renovations: Vec<RenovationRecord>,
    users: BTreeMap<UserId, User>,
}

impl Tables {
    fn overlapping<'a>(
        &'a self,
        prefix: &'a str,
        range: SerialRange,
    ) -> impl Iterator<Item = &'a Passport> + 'a {
        self.passports
            .values()
            .filter(move |p| p.serial_prefix == prefix && p.range().overlaps(&range))
    }
}

/// Storage backend for the registry.
#[derive(Debug)]
pub struct JsonStore {
    snapshot: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl JsonStore {
    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            snapshot: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Open the store in `data_dir`, loading an existing snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if an existing snapshot cannot be
    /// read or parsed.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let path = data_dir.join(SNAPSHOT_FILE);
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| unavailable(&path, &e))?;
            let tables: Tables =
                serde_json::from_str(&content).map_err(|e| unavailable(&path, &e))?;
            info!(
                path = %path.display(),
                passports = tables.passports.len(),
                devices = tables.devices.len(),
                "loaded registry snapshot"
            );
            tables
        } else {
            debug!(path = %path.display(), "no registry snapshot, starting empty");
            Tables::default()
        };

        Ok(Self {
            snapshot: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// Path of the snapshot file, if persistent.
    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    async fn read<T>(&self, op: impl FnOnce(&Tables) -> T) -> T {
        let tables = self.tables.lock().await;
        op(&tables)
    }

    async fn write<T>(&self, op: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let out = op(&mut next)?;
        self.persist(&next).await?;
        *tables = next;
        Ok(out)
    }

    // The lock stays held until the file is in place, so writers queue
    // behind the disk. The file I/O itself runs on the blocking pool.
    async fn persist(&self, tables: &Tables) -> StoreResult<()> {
        let Some(path) = self.snapshot.clone() else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(tables).map_err(|e| unavailable(&path, &e))?;
        tokio::task::spawn_blocking(move || write_snapshot(&path, &content))
            .await
            .map_err(|e| StoreError::Unavailable(format!("snapshot writer: {e}")))?
    }
}

fn write_snapshot(path: &Path, content: &str) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| unavailable(parent, &e))?;
    }
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, content).map_err(|e| unavailable(&staging, &e))?;
    std::fs::rename(&staging, path).map_err(|e| unavailable(path, &e))
}

fn unavailable(path: &Path, err: &dyn std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {err}", path.display()))
}

#[async_trait]
impl PassportStore for JsonStore {
    async fn find_by_id(&self, id: PassportId) -> StoreResult<Option<Passport>> {
        Ok(self.read(|t| t.passports.get(&id).cloned()).await)
    }

    async fn find_by_prefix_and_range_overlap(
        &self,
        prefix: &str,
        from: u64,
        to: u64,
    ) -> StoreResult<Vec<Passport>> {
        let range = SerialRange::new(from, to);
        Ok(self
            .read(|t| t.overlapping(prefix, range).cloned().collect())
            .await)
    }

    async fn find_by_serial(&self, serial: &ParsedSerial) -> StoreResult<Vec<Passport>> {
        Ok(self
            .read(|t| {
                t.passports
                    .values()
                    .filter(|p| {
                        p.serial_prefix == serial.prefix && p.range().contains(serial.number)
                    })
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn insert(&self, passport: NewPassport) -> StoreResult<Passport> {
        self.write(|t| {
            let range = passport.range();
            if t.overlapping(&passport.serial_prefix, range).next().is_some() {
                return Err(StoreError::RangeOverlap {
                    prefix: passport.serial_prefix,
                    from: range.from,
                    to: range.to,
                });
            }
            t.last_passport_id += 1;
            let passport = passport.with_id(PassportId(t.last_passport_id));
            t.passports.insert(passport.id, passport.clone());
            Ok(passport)
        })
        .await
    }

    async fn save(&self, passport: Passport) -> StoreResult<Passport> {
        self.write(|t| {
            if !t.passports.contains_key(&passport.id) {
                return Err(StoreError::RowNotFound {
                    table: "passports",
                    key: passport.id.to_string(),
                });
            }
            let range = passport.range();
            if t
                .overlapping(&passport.serial_prefix, range)
                .any(|other| other.id != passport.id)
            {
                return Err(StoreError::RangeOverlap {
                    prefix: passport.serial_prefix,
                    from: range.from,
                    to: range.to,
                });
            }
            t.passports.insert(passport.id, passport.clone());
            Ok(passport)
        })
        .await
    }

    async fn delete_by_id(&self, id: PassportId) -> StoreResult<bool> {
        self.write(|t| {
            if t.devices.values().any(|d| d.passport_id == Some(id)) {
                return Err(StoreError::StillReferenced {
                    table: "passports",
                    key: id.to_string(),
                    referenced_by: "devices",
                });
            }
            Ok(t.passports.remove(&id).is_some())
        })
        .await
    }
}

#[async_trait]
impl DeviceStore for JsonStore {
    async fn find_by_serial(&self, serial: &str) -> StoreResult<Option<Device>> {
        Ok(self.read(|t| t.devices.get(serial).cloned()).await)
    }

    async fn exists_by_serial(&self, serial: &str) -> StoreResult<bool> {
        Ok(self.read(|t| t.devices.contains_key(serial)).await)
    }

    async fn insert(&self, device: Device) -> StoreResult<Device> {
        self.write(|t| {
            if t.devices.contains_key(&device.serial_number) {
                return Err(StoreError::DuplicateKey {
                    table: "devices",
                    key: device.serial_number,
                });
            }
            if let Some(id) = device.passport_id {
                if !t.passports.contains_key(&id) {
                    return Err(StoreError::DanglingReference {
                        table: "passports",
                        key: id.to_string(),
                    });
                }
            }
            t.devices
                .insert(device.serial_number.clone(), device.clone());
            Ok(device)
        })
        .await
    }

    async fn save(&self, device: Device) -> StoreResult<Device> {
        self.write(|t| match t.devices.get_mut(&device.serial_number) {
            Some(slot) => {
                *slot = device.clone();
                Ok(device)
            }
            None => Err(StoreError::RowNotFound {
                table: "devices",
                key: device.serial_number,
            }),
        })
        .await
    }

    async fn delete_by_serial(&self, serial: &str) -> StoreResult<bool> {
        self.write(|t| {
            if t.renovations.iter().any(|r| r.device_serial == serial) {
                return Err(StoreError::StillReferenced {
                    table: "devices",
                    key: serial.to_string(),
                    referenced_by: "renovations",
                });
            }
            Ok(t.devices.remove(serial).is_some())
        })
        .await
    }
}

#[async_trait]
impl RenovationStore for JsonStore {
    async fn insert(&self, renovation: RenovationRecord) -> StoreResult<RenovationRecord> {
        self.write(|t| {
            if !t.devices.contains_key(&renovation.device_serial) {
                return Err(StoreError::DanglingReference {
                    table: "devices",
                    key: renovation.device_serial,
                });
            }
            t.renovations.push(renovation.clone());
            Ok(renovation)
        })
        .await
    }

    async fn find_by_device(&self, serial: &str) -> StoreResult<Vec<RenovationRecord>> {
        Ok(self
            .read(|t| {
                t.renovations
                    .iter()
                    .filter(|r| r.device_serial == serial)
                    .cloned()
                    .collect()
            })
            .await)
    }
}

#[async_trait]
impl UserStore for JsonStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.read(|t| t.users.get(&id).cloned()).await)
    }

    async fn insert(&self, user: User) -> StoreResult<User> {
        self.write(|t| {
            if t.users.contains_key(&user.id) {
                return Err(StoreError::DuplicateKey {
                    table: "users",
                    key: user.id.to_string(),
                });
            }
            t.users.insert(user.id, user.clone());
            Ok(user)
        })
        .await
    }

    async fn delete_by_id(&self, id: UserId) -> StoreResult<bool> {
        self.write(|t| Ok(t.users.remove(&id).is_some())).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::renovation::RenovationId;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_passport(prefix: &str, from: u64, to: u64) -> NewPassport {
        NewPassport {
            name: "Model A".into(),
            model: "A1".into(),
            serial_prefix: prefix.into(),
            from_serial_number: from,
            to_serial_number: to,
            warranty_months: 24,
        }
    }

    fn device(serial: &str, passport_id: Option<PassportId>) -> Device {
        Device {
            serial_number: serial.into(),
            purchase_date: date(2024, 1, 1),
            warranty_expiration_date: date(2026, 1, 1),
            comment: None,
            owner: None,
            passport_id,
        }
    }

    fn renovation(serial: &str) -> RenovationRecord {
        RenovationRecord {
            id: RenovationId::new(),
            device_serial: serial.into(),
            description: "Changed compressor".into(),
            renovation_date: date(2024, 6, 1),
        }
    }

    #[tokio::test]
    async fn test_passport_ids_are_sequential() {
        let store = JsonStore::in_memory();
        let a = PassportStore::insert(&store, new_passport("SB", 1000, 2000))
            .await
            .unwrap();
        let b = PassportStore::insert(&store, new_passport("XY", 500, 800))
            .await
            .unwrap();
        assert_eq!(a.id, PassportId(1));
        assert_eq!(b.id, PassportId(2));
    }

    #[tokio::test]
    async fn test_find_by_serial_matches_prefix_and_range() {
        let store = JsonStore::in_memory();
        PassportStore::insert(&store, new_passport("SB", 1000, 2000))
            .await
            .unwrap();
        PassportStore::insert(&store, new_passport("XY", 500, 800))
            .await
            .unwrap();

        let serial = ParsedSerial::parse("SB1234").unwrap();
        let found = PassportStore::find_by_serial(&store, &serial).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].serial_prefix, "SB");

        let serial = ParsedSerial::parse("ZZ9999").unwrap();
        assert!(PassportStore::find_by_serial(&store, &serial)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_overlap_query_ignores_other_prefixes() {
        let store = JsonStore::in_memory();
        PassportStore::insert(&store, new_passport("SB", 1000, 2000))
            .await
            .unwrap();

        assert!(store
            .find_by_prefix_and_range_overlap("ZZ", 1, 5000)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .find_by_prefix_and_range_overlap("SB", 2000, 3000)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_insert_enforces_range_overlap() {
        let store = JsonStore::in_memory();
        PassportStore::insert(&store, new_passport("SB", 1, 100))
            .await
            .unwrap();
        let err = PassportStore::insert(&store, new_passport("SB", 100, 200))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RangeOverlap { .. }));

        assert!(PassportStore::insert(&store, new_passport("SB", 101, 200))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_save_excludes_own_range() {
        let store = JsonStore::in_memory();
        let mut passport = PassportStore::insert(&store, new_passport("SN-", 1, 100))
            .await
            .unwrap();
        PassportStore::insert(&store, new_passport("SN-", 120, 200))
            .await
            .unwrap();

        passport.to_serial_number = 110;
        assert!(PassportStore::save(&store, passport.clone()).await.is_ok());

        passport.to_serial_number = 150;
        let err = PassportStore::save(&store, passport).await.unwrap_err();
        assert!(matches!(err, StoreError::RangeOverlap { .. }));
    }

    #[tokio::test]
    async fn test_device_serial_is_primary_key() {
        let store = JsonStore::in_memory();
        DeviceStore::insert(&store, device("SB15FDPSF", None))
            .await
            .unwrap();
        let err = DeviceStore::insert(&store, device("SB15FDPSF", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert!(store.exists_by_serial("SB15FDPSF").await.unwrap());
        assert!(!store.exists_by_serial("NOT_EXIST").await.unwrap());
    }

    #[tokio::test]
    async fn test_passport_delete_blocked_by_devices() {
        let store = JsonStore::in_memory();
        let passport = PassportStore::insert(&store, new_passport("SB", 1, 2000))
            .await
            .unwrap();
        DeviceStore::insert(&store, device("SB1500", Some(passport.id)))
            .await
            .unwrap();

        let err = PassportStore::delete_by_id(&store, passport.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StillReferenced { .. }));

        assert!(!PassportStore::delete_by_id(&store, PassportId(99))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_device_delete_blocked_by_renovations() {
        let store = JsonStore::in_memory();
        DeviceStore::insert(&store, device("SB1", None)).await.unwrap();
        DeviceStore::insert(&store, device("SB2", None)).await.unwrap();
        RenovationStore::insert(&store, renovation("SB1"))
            .await
            .unwrap();

        let err = store.delete_by_serial("SB1").await.unwrap_err();
        assert!(matches!(err, StoreError::StillReferenced { .. }));
        assert!(store.delete_by_serial("SB2").await.unwrap());
    }

    #[tokio::test]
    async fn test_renovation_requires_device() {
        let store = JsonStore::in_memory();
        let err = RenovationStore::insert(&store, renovation("GHOST"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DanglingReference { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = JsonStore::open(dir.path()).unwrap();
        let passport = PassportStore::insert(&store, new_passport("SB", 1, 2000))
            .await
            .unwrap();
        DeviceStore::insert(&store, device("SB1500", Some(passport.id)))
            .await
            .unwrap();
        RenovationStore::insert(&store, renovation("SB1500"))
            .await
            .unwrap();
        let user = UserStore::insert(&store, User::new("Owner", None))
            .await
            .unwrap();
        drop(store);

        let reopened = JsonStore::open(dir.path()).unwrap();
        assert!(reopened.snapshot_path().unwrap().exists());
        assert_eq!(
            PassportStore::find_by_id(&reopened, passport.id)
                .await
                .unwrap(),
            Some(passport)
        );
        assert!(reopened.exists_by_serial("SB1500").await.unwrap());
        assert_eq!(reopened.find_by_device("SB1500").await.unwrap().len(), 1);
        assert!(UserStore::find_by_id(&reopened, user.id)
            .await
            .unwrap()
            .is_some());

        let next = PassportStore::insert(&reopened, new_passport("XY", 1, 10))
            .await
            .unwrap();
        assert_eq!(next.id, PassportId(2));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SNAPSHOT_FILE), "{ not json").unwrap();
        let err = JsonStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_leaves_tables_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory's parent should be.
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let store = JsonStore::open(&blocker.join("data")).unwrap();

        let err = PassportStore::insert(&store, new_passport("SB", 1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(PassportStore::find_by_id(&store, PassportId(1))
            .await
            .unwrap()
            .is_none());

        let err = DeviceStore::insert(&store, device("SB5", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!store.exists_by_serial("SB5").await.unwrap());
    }
}
