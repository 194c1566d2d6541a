use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A structured place as returned by the geocoding provider.
/// Compared structurally: two places are the same only if every field matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub display_name: String,
    pub place_id: String,
    pub lat: f64,
    pub lon: f64,
}

impl Place {
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageCategory {
    Document,
    Parcel,
    Food,
    Medicine,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Inprogress,
    Delivered,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub customer_id: Uuid,
    /// Snapshot of the customer's name at creation time, never live-updated.
    pub customer_name: String,
    pub driver_id: Option<Uuid>,
    /// Snapshot of the driver's name at acceptance time.
    pub driver_name: Option<String>,
    pub package_details: String,
    pub package_weight_kg: f64,
    pub package_category: PackageCategory,
    pub pickup: Place,
    pub dropoff: Place,
    /// Computed once at creation from pickup/dropoff; never recalculated.
    pub distance_km: f64,
    /// Computed once at creation from weight and distance; never recalculated.
    pub cost: f64,
    pub delivery_status: DeliveryStatus,
    pub payment_status: PaymentStatus,
    pub rating: Option<u8>,
    pub feedback: String,
    pub package_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
