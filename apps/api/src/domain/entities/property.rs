use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "property_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    Available,
    Occupied,
    Maintenance,
    Unavailable,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Available => "available",
            PropertyStatus::Occupied => "occupied",
            PropertyStatus::Maintenance => "maintenance",
            PropertyStatus::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Property {
    pub id: Uuid,
    /// Landlord who receives payments for this property
    pub owner_id: Uuid,
    pub manager_id: Option<Uuid>,
    pub name: String,
    pub status: PropertyStatus,
    pub current_tenants: i32,
    pub max_tenants: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Records one more tenant moving in
    pub fn occupy(&mut self, now: DateTime<Utc>) {
        self.current_tenants += 1;
        self.status = PropertyStatus::Occupied;
        self.updated_at = now;
    }
}
