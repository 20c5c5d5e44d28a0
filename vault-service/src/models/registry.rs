//! National-identity registry records and the corroboration check run at
//! registration.

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct RegistryRecord {
    pub nin: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub date_of_expiry: NaiveDate,
    pub personal_id_number: String,
}

/// Fields a registrant supplies alongside a national-id.
#[derive(Debug, Clone)]
pub struct NinBundle {
    pub nin: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub date_of_expiry: NaiveDate,
    pub personal_id_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryMatch {
    Matched,
    Mismatch(&'static str),
}

impl RegistryRecord {
    pub fn check(&self, bundle: &NinBundle) -> RegistryMatch {
        if !self.surname.trim().eq_ignore_ascii_case(bundle.surname.trim()) {
            return RegistryMatch::Mismatch("surname");
        }
        if self.date_of_birth != bundle.date_of_birth {
            return RegistryMatch::Mismatch("dob");
        }
        if self.date_of_expiry != bundle.date_of_expiry {
            return RegistryMatch::Mismatch("dateOfExpiry");
        }
        if self.personal_id_number != bundle.personal_id_number.trim() {
            return RegistryMatch::Mismatch("personalIdNumber");
        }
        RegistryMatch::Matched
    }
}
