use serde::Deserialize;
use validator::Validate;

use crate::models::{Bus, BusStatus};

// Request para crear un bus
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBusRequest {
    #[validate(length(min = 1, max = 20))]
    pub bus_number: String,
    #[validate(range(min = 1, max = 100))]
    pub seating_capacity: i32,
    #[validate(length(min = 11, max = 17))]
    pub vin: Option<String>,
    #[validate(length(max = 20))]
    pub license_number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    #[validate(range(min = 1950, max = 2100))]
    pub year: Option<i32>,
    pub status: Option<BusStatus>,
}

impl CreateBusRequest {
    pub fn into_bus(self) -> Bus {
        let mut bus = Bus::new(self.bus_number, self.seating_capacity);
        bus.vin = self.vin;
        bus.license_number = self.license_number;
        bus.make = self.make;
        bus.model = self.model;
        bus.year = self.year;
        bus.status = self.status.unwrap_or_default();
        bus
    }
}

// Request para actualizar un bus
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateBusRequest {
    #[validate(length(min = 1, max = 20))]
    pub bus_number: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub seating_capacity: Option<i32>,
    #[validate(length(max = 20))]
    pub license_number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub status: Option<BusStatus>,
}

impl UpdateBusRequest {
    pub fn apply_to(self, bus: &mut Bus) {
        if let Some(v) = self.bus_number {
            bus.bus_number = v;
        }
        if let Some(v) = self.seating_capacity {
            bus.seating_capacity = v;
        }
        if let Some(v) = self.license_number {
            bus.license_number = Some(v);
        }
        if let Some(v) = self.make {
            bus.make = Some(v);
        }
        if let Some(v) = self.model {
            bus.model = Some(v);
        }
        if let Some(v) = self.year {
            bus.year = Some(v);
        }
        if let Some(v) = self.status {
            bus.status = v;
        }
    }
}
