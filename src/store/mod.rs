use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::user::User;

/// Document store for deliveries. All read-check-write sequences go through
/// [`DeliveryStore::update`], which runs the closure while holding the map
/// entry, so concurrent updates to the same delivery id are serialized.
pub struct DeliveryStore {
    records: DashMap<Uuid, Delivery>,
}

impl DeliveryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn insert(&self, delivery: Delivery) {
        self.records.insert(delivery.id, delivery);
    }

    pub fn get(&self, id: Uuid) -> Option<Delivery> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// All deliveries owned by the customer, any status.
    pub fn list_for_customer(&self, customer_id: Uuid) -> Vec<Delivery> {
        let mut deliveries: Vec<Delivery> = self
            .records
            .iter()
            .filter(|entry| entry.value().customer_id == customer_id)
            .map(|entry| entry.value().clone())
            .collect();

        deliveries.sort_by_key(|d| d.created_at);
        deliveries
    }

    /// The driver worklist: the open pool of pending deliveries plus every
    /// delivery already assigned to this driver regardless of status.
    pub fn list_for_driver(&self, driver_id: Uuid) -> Vec<Delivery> {
        let mut deliveries: Vec<Delivery> = self
            .records
            .iter()
            .filter(|entry| {
                let delivery = entry.value();
                delivery.delivery_status == DeliveryStatus::Pending
                    || delivery.driver_id == Some(driver_id)
            })
            .map(|entry| entry.value().clone())
            .collect();

        deliveries.sort_by_key(|d| d.created_at);
        deliveries
    }

    /// Atomic read-check-write. The closure validates and mutates the
    /// delivery under the entry lock; of two concurrent conflicting updates
    /// exactly one sees the original state.
    pub fn update<F>(&self, id: Uuid, f: F) -> Result<Delivery, AppError>
    where
        F: FnOnce(&mut Delivery) -> Result<(), AppError>,
    {
        let mut entry = self
            .records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;

        f(entry.value_mut())?;
        Ok(entry.value().clone())
    }

    /// Removes the delivery iff the check passes, under the entry lock.
    pub fn remove_if<F>(&self, id: Uuid, check: F) -> Result<(), AppError>
    where
        F: FnOnce(&Delivery) -> Result<(), AppError>,
    {
        match self.records.entry(id) {
            Entry::Occupied(entry) => {
                check(entry.get())?;
                entry.remove();
                Ok(())
            }
            Entry::Vacant(_) => Err(AppError::NotFound(format!("delivery {id} not found"))),
        }
    }
}

impl Default for DeliveryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity glue standing in for the external auth collaborator: request
/// handlers resolve the caller's id against this directory.
pub struct UserDirectory {
    users: DashMap<Uuid, User>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn insert(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}
