//! Serial number parsing and passport resolution.
//!
//! A serial number is a non-numeric prefix followed by a numeric suffix,
//! e.g. `SN-150` is prefix `SN-` and number `150`. A passport covers a
//! serial when its prefix equals the serial's prefix and its inclusive
//! `[from, to]` range contains the number.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::error::{RegistryError, Result};
use crate::passport::Passport;
use crate::store::PassportStore;

static SERIAL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\D*)(\d+)$").expect("serial pattern is a valid regex"));

/// A serial number split into its prefix and numeric suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedSerial {
    /// Leading non-digit characters (may be empty).
    pub prefix: String,
    /// Trailing digits as a number.
    pub number: u64,
}

impl ParsedSerial {
    /// Parse a raw serial number.
    ///
    /// Returns `None` when the serial has no trailing digits, has digits
    /// before the end of the prefix, or the suffix does not fit in a `u64`.
    #[must_use]
    pub fn parse(serial: &str) -> Option<Self> {
        let captures = SERIAL_PATTERN.captures(serial)?;
        let number = captures.get(2)?.as_str().parse().ok()?;
        Some(Self {
            prefix: captures.get(1)?.as_str().to_string(),
            number,
        })
    }
}

/// Inclusive range of serial suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SerialRange {
    /// First serial number in the range.
    pub from: u64,
    /// Last serial number in the range.
    pub to: u64,
}

impl SerialRange {
    /// Create a range. Callers validate `from <= to`.
    #[must_use]
    pub const fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Whether `from <= to`.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.from <= self.to
    }

    /// Whether the two ranges share at least one number.
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Whether `number` lies inside the range.
    #[must_use]
    pub const fn contains(&self, number: u64) -> bool {
        self.from <= number && number <= self.to
    }
}

/// Resolves serial numbers to the passport that covers them.
#[derive(Clone)]
pub struct SerialRangeIndex {
    passports: Arc<dyn PassportStore>,
}

impl SerialRangeIndex {
    /// Create an index over a passport store.
    pub fn new(passports: Arc<dyn PassportStore>) -> Self {
        Self { passports }
    }

    /// Find the single passport covering `serial`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::PassportNotFoundForSerial`] if nothing covers it
    /// - [`RegistryError::AmbiguousSerialRange`] if more than one passport does
    pub async fn resolve(&self, serial: &str) -> Result<Passport> {
        let Some(parsed) = ParsedSerial::parse(serial) else {
            debug!(serial, "serial number does not parse");
            return Err(RegistryError::PassportNotFoundForSerial(serial.to_string()));
        };

        let mut matches = self.passports.find_by_serial(&parsed).await?;
        match matches.len() {
            0 => {
                debug!(serial, prefix = %parsed.prefix, "no passport covers serial");
                Err(RegistryError::PassportNotFoundForSerial(serial.to_string()))
            }
            1 => Ok(matches.remove(0)),
            count => {
                warn!(serial, count, "serial number covered by overlapping passports");
                Err(RegistryError::AmbiguousSerialRange(serial.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passport::PassportId;
    use crate::store::MockPassportStore;

    fn passport(id: u64, prefix: &str, from: u64, to: u64) -> Passport {
        Passport {
            id: PassportId(id),
            name: format!("Passport {id}"),
            model: "Model".into(),
            serial_prefix: prefix.into(),
            from_serial_number: from,
            to_serial_number: to,
            warranty_months: 12,
        }
    }

    #[test]
    fn test_parse_splits_prefix_and_number() {
        let parsed = ParsedSerial::parse("SN-150").unwrap();
        assert_eq!(parsed.prefix, "SN-");
        assert_eq!(parsed.number, 150);

        let parsed = ParsedSerial::parse("SB0015").unwrap();
        assert_eq!(parsed.prefix, "SB");
        assert_eq!(parsed.number, 15);

        let parsed = ParsedSerial::parse("4711").unwrap();
        assert_eq!(parsed.prefix, "");
        assert_eq!(parsed.number, 4711);
    }

    #[test]
    fn test_parse_rejects_non_numeric_suffix() {
        assert!(ParsedSerial::parse("SB15FDPSF").is_none());
        assert!(ParsedSerial::parse("SN-").is_none());
        assert!(ParsedSerial::parse("").is_none());
        assert!(ParsedSerial::parse("99999999999999999999999").is_none());
    }

    #[test]
    fn test_range_overlap() {
        let base = SerialRange::new(1, 100);
        assert!(base.overlaps(&SerialRange::new(100, 200)));
        assert!(base.overlaps(&SerialRange::new(50, 60)));
        assert!(base.overlaps(&SerialRange::new(0, 1)));
        assert!(!base.overlaps(&SerialRange::new(101, 200)));
        assert!(SerialRange::new(50, 150).overlaps(&SerialRange::new(120, 200)));
    }

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = SerialRange::new(10, 20);
        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(9));
        assert!(!range.contains(21));
    }

    #[tokio::test]
    async fn test_resolve_returns_single_match() {
        let mut store = MockPassportStore::new();
        store
            .expect_find_by_serial()
            .withf(|serial| serial.prefix == "SN-" && serial.number == 150)
            .returning(|_| Ok(vec![passport(1, "SN-", 100, 200)]));

        let index = SerialRangeIndex::new(Arc::new(store));
        let found = index.resolve("SN-150").await.unwrap();
        assert_eq!(found.id, PassportId(1));
    }

    #[tokio::test]
    async fn test_resolve_without_match_names_the_serial() {
        let mut store = MockPassportStore::new();
        store.expect_find_by_serial().returning(|_| Ok(vec![]));

        let index = SerialRangeIndex::new(Arc::new(store));
        let err = index.resolve("SN-999").await.unwrap_err();
        assert!(matches!(err, RegistryError::PassportNotFoundForSerial(ref s) if s == "SN-999"));
        assert!(err.to_string().contains("Passport not found"));
    }

    #[tokio::test]
    async fn test_resolve_unparseable_serial_skips_store() {
        let mut store = MockPassportStore::new();
        store.expect_find_by_serial().never();

        let index = SerialRangeIndex::new(Arc::new(store));
        let err = index.resolve("SB15FDPSF").await.unwrap_err();
        assert!(matches!(err, RegistryError::PassportNotFoundForSerial(_)));
    }

    #[tokio::test]
    async fn test_resolve_refuses_to_pick_among_overlaps() {
        let mut store = MockPassportStore::new();
        store.expect_find_by_serial().returning(|_| {
            Ok(vec![
                passport(1, "SB", 1, 2000),
                passport(2, "SB", 1000, 3000),
            ])
        });

        let index = SerialRangeIndex::new(Arc::new(store));
        let err = index.resolve("SB1500").await.unwrap_err();
        assert!(matches!(err, RegistryError::AmbiguousSerialRange(_)));
    }

    #[tokio::test]
    async fn test_resolve_maps_store_failure() {
        let mut store = MockPassportStore::new();
        store
            .expect_find_by_serial()
            .returning(|_| Err(crate::store::StoreError::Unavailable("offline".into())));

        let index = SerialRangeIndex::new(Arc::new(store));
        let err = index.resolve("SB1500").await.unwrap_err();
        assert!(matches!(err, RegistryError::Persistence(_)));
    }
}
