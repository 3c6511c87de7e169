//! Modelo de Family
//!
//! Familia importada desde el JSON de datos del distrito escolar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Family {
    pub id: Uuid,
    pub parent_guardian: String,
    pub address: String,
    pub city: String,
    pub state: Option<String>,
    pub county: String,
    pub zip: Option<String>,
    pub home_phone: Option<String>,
    pub cell_phone: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
}
