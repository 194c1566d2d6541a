use crate::models::delivery::Place;

const EARTH_RADIUS_KM: f64 = 6_371.0;

const BASE_FARE: f64 = 5.0;
const PER_KM: f64 = 0.5;
const PER_KG: f64 = 0.8;

pub fn haversine_km(a: &Place, b: &Place) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Pricing is base fare plus per-km and per-kg components, rounded to cents.
/// Pure and monotonically non-decreasing in both weight and distance.
pub fn delivery_cost(weight_kg: f64, distance_km: f64) -> f64 {
    let raw = BASE_FARE + PER_KM * distance_km + PER_KG * weight_kg;
    (raw * 100.0).round() / 100.0
}
