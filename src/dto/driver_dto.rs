use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::models::Driver;

// Request para crear un conductor
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDriverRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(length(min = 1, max = 30))]
    pub license_number: String,
    pub license_expiration: Option<NaiveDate>,
    pub phone: Option<String>,
}

impl CreateDriverRequest {
    pub fn into_driver(self) -> Driver {
        let mut driver = Driver::new(self.first_name, self.last_name, self.license_number);
        driver.license_expiration = self.license_expiration;
        driver.phone = self.phone;
        driver
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDriverRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub license_number: Option<String>,
    pub license_expiration: Option<NaiveDate>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateDriverRequest {
    pub fn apply_to(self, driver: &mut Driver) {
        if let Some(v) = self.first_name {
            driver.first_name = v;
        }
        if let Some(v) = self.last_name {
            driver.last_name = v;
        }
        if let Some(v) = self.license_number {
            driver.license_number = v;
        }
        if let Some(v) = self.license_expiration {
            driver.license_expiration = Some(v);
        }
        if let Some(v) = self.phone {
            driver.phone = Some(v);
        }
        if let Some(v) = self.is_active {
            driver.is_active = v;
        }
    }
}
