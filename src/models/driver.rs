//! Modelo de Driver
//!
//! Conductor de la flota. Mapea a la tabla `drivers`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Driver {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub license_number: String,
    pub license_expiration: Option<NaiveDate>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        license_number: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            license_number: license_number.into(),
            license_expiration: None,
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Licencia vencida a la fecha indicada (sin fecha = no vencida)
    pub fn license_expired_on(&self, date: NaiveDate) -> bool {
        self.license_expiration.map(|exp| exp < date).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_expiration() {
        let mut driver = Driver::new("Dana", "Lopez", "CO-88123");
        let today = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        assert!(!driver.license_expired_on(today));

        driver.license_expiration = NaiveDate::from_ymd_opt(2025, 8, 31);
        assert!(driver.license_expired_on(today));
        assert_eq!(driver.full_name(), "Dana Lopez");
    }
}
