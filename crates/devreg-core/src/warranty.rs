//! Warranty expiration arithmetic.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::passport::Passport;

/// Expiration date of a warranty of `warranty_months` calendar months
/// starting at `purchase_date`.
///
/// Month arithmetic clamps to the end of shorter months, so a purchase on
/// January 31st with one month of warranty expires on the last day of
/// February. Dates beyond the calendar range saturate at [`NaiveDate::MAX`].
#[must_use]
pub fn expiration_date(purchase_date: NaiveDate, warranty_months: u32) -> NaiveDate {
    purchase_date
        .checked_add_months(Months::new(warranty_months))
        .unwrap_or(NaiveDate::MAX)
}

/// What to do when an owner registers a serial no passport covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPassportPolicy {
    /// Register the device without a passport and no passport warranty.
    #[default]
    ZeroWarranty,
    /// Refuse the registration.
    Reject,
}

/// Deployment-level warranty rules applied by the device lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarrantyPolicy {
    /// Extra months granted to devices linked to a registered owner.
    pub owner_bonus_months: u32,

    /// Behavior of owner registration when no passport covers the serial.
    pub missing_passport_policy: MissingPassportPolicy,
}

impl WarrantyPolicy {
    /// Month offset for a device with the given passport and ownership.
    #[must_use]
    pub fn months_for(&self, passport: Option<&Passport>, owned: bool) -> u32 {
        let base = passport.map_or(0, |p| p.warranty_months);
        if owned {
            base.saturating_add(self.owner_bonus_months)
        } else {
            base
        }
    }

    /// Expiration date for a device with the given passport and ownership.
    #[must_use]
    pub fn expiration_for(
        &self,
        purchase_date: NaiveDate,
        passport: Option<&Passport>,
        owned: bool,
    ) -> NaiveDate {
        expiration_date(purchase_date, self.months_for(passport, owned))
    }
}
