use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::delivery::{Delivery, DeliveryStatus, PaymentStatus};
use crate::models::user::{Role, User};

/// Every mutation a client can request through the update endpoint, as a
/// tagged union. Role branching happens once, when the request is mapped
/// into a variant; the transition table below is the single authority on
/// what each variant requires and does.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryUpdate {
    DriverAccept,
    DriverCancel,
    DriverMarkDelivered,
    CustomerPay,
    CustomerComplete { rating: u8, feedback: String },
}

impl DeliveryUpdate {
    /// Maps the raw field subset of an update request onto a single variant.
    /// Requests that do not correspond to any row of the transition table
    /// are rejected here, before any record is read.
    pub fn from_parts(
        role: Role,
        delivery_status: Option<DeliveryStatus>,
        rating: Option<u8>,
        feedback: Option<String>,
        payment_status: Option<PaymentStatus>,
    ) -> Result<Self, AppError> {
        if let Some(payment) = payment_status {
            if delivery_status.is_some() || rating.is_some() || feedback.is_some() {
                return Err(AppError::InvalidInput(
                    "payment cannot be combined with other changes".to_string(),
                ));
            }
            return match (role, payment) {
                (Role::Customer, PaymentStatus::Paid) => Ok(Self::CustomerPay),
                (Role::Customer, PaymentStatus::Pending) => Err(AppError::InvalidInput(
                    "payment status cannot be reset to pending".to_string(),
                )),
                (Role::Driver, _) => Err(AppError::Forbidden(
                    "only the customer can pay for a delivery".to_string(),
                )),
            };
        }

        let Some(requested) = delivery_status else {
            return Err(AppError::InvalidInput(
                "no update fields provided".to_string(),
            ));
        };

        match (role, requested) {
            (Role::Driver, DeliveryStatus::Inprogress) => Ok(Self::DriverAccept),
            (Role::Driver, DeliveryStatus::Pending) => Ok(Self::DriverCancel),
            (Role::Driver, DeliveryStatus::Delivered) => Ok(Self::DriverMarkDelivered),
            (Role::Customer, DeliveryStatus::Completed) => {
                let rating = rating.ok_or_else(|| {
                    AppError::InvalidInput("a rating is required to complete".to_string())
                })?;
                Ok(Self::CustomerComplete {
                    rating,
                    feedback: feedback.unwrap_or_default(),
                })
            }
            (Role::Driver, DeliveryStatus::Completed) => Err(AppError::Forbidden(
                "only the customer can complete a delivery".to_string(),
            )),
            (Role::Customer, _) => Err(AppError::Forbidden(
                "customers cannot change the delivery status directly".to_string(),
            )),
        }
    }
}

/// Applies one row of the transition table. Role, ownership and state are
/// checked as a single decision; callers hold the store's per-id entry lock
/// across this call so the check and the write cannot be interleaved with a
/// concurrent update.
pub fn apply_update(
    delivery: &mut Delivery,
    actor: &User,
    update: &DeliveryUpdate,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    match update {
        DeliveryUpdate::DriverAccept => {
            require_role(actor, Role::Driver)?;
            match delivery.driver_id {
                // A second accept lost the race for a pending delivery.
                Some(assigned) if assigned != actor.id => {
                    return Err(AppError::Conflict(
                        "delivery was accepted by another driver".to_string(),
                    ));
                }
                Some(_) => {
                    return Err(AppError::InvalidTransition(
                        "delivery is already accepted".to_string(),
                    ));
                }
                None => {}
            }
            if delivery.delivery_status != DeliveryStatus::Pending {
                return Err(AppError::InvalidTransition(format!(
                    "cannot accept a {:?} delivery",
                    delivery.delivery_status
                )));
            }

            delivery.driver_id = Some(actor.id);
            delivery.driver_name = Some(actor.name.clone());
            delivery.delivery_status = DeliveryStatus::Inprogress;
        }
        DeliveryUpdate::DriverCancel => {
            require_role(actor, Role::Driver)?;
            require_assigned_driver(delivery, actor)?;
            if delivery.delivery_status != DeliveryStatus::Inprogress {
                return Err(AppError::InvalidTransition(
                    "only an in-progress delivery can be cancelled".to_string(),
                ));
            }

            // Cancel releases the delivery back to the pool entirely; the
            // driver does not retain a claim on it.
            delivery.delivery_status = DeliveryStatus::Pending;
            delivery.driver_id = None;
            delivery.driver_name = None;
        }
        DeliveryUpdate::DriverMarkDelivered => {
            require_role(actor, Role::Driver)?;
            require_assigned_driver(delivery, actor)?;
            if delivery.delivery_status != DeliveryStatus::Inprogress {
                return Err(AppError::InvalidTransition(
                    "only an in-progress delivery can be marked delivered".to_string(),
                ));
            }

            delivery.delivery_status = DeliveryStatus::Delivered;
        }
        DeliveryUpdate::CustomerPay => {
            authorize_payment(delivery, actor)?;
            delivery.payment_status = PaymentStatus::Paid;
        }
        DeliveryUpdate::CustomerComplete { rating, feedback } => {
            require_role(actor, Role::Customer)?;
            require_owner(delivery, actor)?;
            if !(1..=5).contains(rating) {
                return Err(AppError::InvalidInput(
                    "rating must be between 1 and 5".to_string(),
                ));
            }
            if delivery.delivery_status != DeliveryStatus::Delivered {
                return Err(AppError::InvalidTransition(
                    "only a delivered delivery can be completed".to_string(),
                ));
            }
            if delivery.payment_status != PaymentStatus::Paid {
                return Err(AppError::InvalidTransition(
                    "payment is required before completion".to_string(),
                ));
            }
            if delivery.rating.is_some() {
                return Err(AppError::InvalidTransition(
                    "feedback has already been submitted".to_string(),
                ));
            }

            delivery.rating = Some(*rating);
            delivery.feedback = feedback.clone();
            delivery.delivery_status = DeliveryStatus::Completed;
        }
    }

    delivery.updated_at = now;
    Ok(())
}

/// Payment precondition: owning customer, delivered, not yet paid. Split out
/// so the service can run it before capturing through the payment gateway.
pub fn authorize_payment(delivery: &Delivery, actor: &User) -> Result<(), AppError> {
    require_role(actor, Role::Customer)?;
    require_owner(delivery, actor)?;
    if delivery.delivery_status != DeliveryStatus::Delivered {
        return Err(AppError::InvalidTransition(
            "payment is allowed only once the delivery is delivered".to_string(),
        ));
    }
    if delivery.payment_status == PaymentStatus::Paid {
        return Err(AppError::InvalidTransition(
            "delivery is already paid".to_string(),
        ));
    }
    Ok(())
}

/// Deletion precondition: owning customer, still pending and unassigned.
pub fn authorize_delete(delivery: &Delivery, actor: &User) -> Result<(), AppError> {
    require_role(actor, Role::Customer)?;
    require_owner(delivery, actor)?;
    if delivery.delivery_status != DeliveryStatus::Pending || delivery.driver_id.is_some() {
        return Err(AppError::InvalidTransition(
            "only an unassigned pending delivery can be deleted".to_string(),
        ));
    }
    Ok(())
}

fn require_role(actor: &User, role: Role) -> Result<(), AppError> {
    if actor.role != role {
        return Err(AppError::Forbidden(format!(
            "action requires the {role:?} role"
        )));
    }
    Ok(())
}

fn require_owner(delivery: &Delivery, actor: &User) -> Result<(), AppError> {
    if delivery.customer_id != actor.id {
        return Err(AppError::Forbidden(
            "delivery belongs to another customer".to_string(),
        ));
    }
    Ok(())
}

fn require_assigned_driver(delivery: &Delivery, actor: &User) -> Result<(), AppError> {
    if delivery.driver_id != Some(actor.id) {
        return Err(AppError::Forbidden(
            "delivery is not assigned to this driver".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{apply_update, authorize_delete, DeliveryUpdate};
    use crate::error::AppError;
    use crate::models::delivery::{
        Delivery, DeliveryStatus, PackageCategory, PaymentStatus, Place,
    };
    use crate::models::user::{Role, User};

    fn customer() -> User {
        User {
            id: Uuid::from_u128(1),
            name: "Cleo".to_string(),
            role: Role::Customer,
            email: Some("cleo@example.com".to_string()),
        }
    }

    fn driver() -> User {
        User {
            id: Uuid::from_u128(2),
            name: "Dana".to_string(),
            role: Role::Driver,
            email: Some("dana@example.com".to_string()),
        }
    }

    fn other_driver() -> User {
        User {
            id: Uuid::from_u128(3),
            name: "Rival".to_string(),
            role: Role::Driver,
            email: None,
        }
    }

    fn pending_delivery(owner: &User) -> Delivery {
        let now = Utc::now();
        Delivery {
            id: Uuid::new_v4(),
            customer_id: owner.id,
            customer_name: owner.name.clone(),
            driver_id: None,
            driver_name: None,
            package_details: "documents".to_string(),
            package_weight_kg: 0.5,
            package_category: PackageCategory::Document,
            pickup: Place {
                display_name: "A".to_string(),
                place_id: "a".to_string(),
                lat: 40.0,
                lon: -73.0,
            },
            dropoff: Place {
                display_name: "B".to_string(),
                place_id: "b".to_string(),
                lat: 40.1,
                lon: -73.2,
            },
            distance_km: 19.1,
            cost: 15.0,
            delivery_status: DeliveryStatus::Pending,
            payment_status: PaymentStatus::Pending,
            rating: None,
            feedback: String::new(),
            package_image: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(delivery: &mut Delivery, actor: &User, update: DeliveryUpdate) -> Result<(), AppError> {
        apply_update(delivery, actor, &update, Utc::now())
    }

    #[test]
    fn accept_assigns_driver_and_snapshots_name() {
        let mut delivery = pending_delivery(&customer());
        let dana = driver();

        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();

        assert_eq!(delivery.delivery_status, DeliveryStatus::Inprogress);
        assert_eq!(delivery.driver_id, Some(dana.id));
        assert_eq!(delivery.driver_name.as_deref(), Some("Dana"));
    }

    #[test]
    fn second_accept_by_another_driver_is_a_conflict() {
        let mut delivery = pending_delivery(&customer());
        apply(&mut delivery, &driver(), DeliveryUpdate::DriverAccept).unwrap();

        let result = apply(&mut delivery, &other_driver(), DeliveryUpdate::DriverAccept);
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn repeated_accept_by_same_driver_is_invalid_transition() {
        let mut delivery = pending_delivery(&customer());
        let dana = driver();
        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();

        let result = apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept);
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn cancel_releases_delivery_back_to_pool() {
        let mut delivery = pending_delivery(&customer());
        let dana = driver();
        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();

        apply(&mut delivery, &dana, DeliveryUpdate::DriverCancel).unwrap();

        assert_eq!(delivery.delivery_status, DeliveryStatus::Pending);
        assert_eq!(delivery.driver_id, None);
        assert_eq!(delivery.driver_name, None);
    }

    #[test]
    fn foreign_driver_cannot_touch_in_flight_delivery() {
        let mut delivery = pending_delivery(&customer());
        apply(&mut delivery, &driver(), DeliveryUpdate::DriverAccept).unwrap();

        for update in [
            DeliveryUpdate::DriverCancel,
            DeliveryUpdate::DriverMarkDelivered,
        ] {
            let result = apply(&mut delivery, &other_driver(), update);
            assert!(matches!(result, Err(AppError::Forbidden(_))));
        }
        assert_eq!(delivery.delivery_status, DeliveryStatus::Inprogress);
    }

    #[test]
    fn pending_cannot_jump_to_completed() {
        let owner = customer();
        let mut delivery = pending_delivery(&owner);

        let result = apply(
            &mut delivery,
            &owner,
            DeliveryUpdate::CustomerComplete {
                rating: 5,
                feedback: "great".to_string(),
            },
        );
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(delivery.delivery_status, DeliveryStatus::Pending);
    }

    #[test]
    fn payment_requires_delivered_status() {
        let owner = customer();
        let mut delivery = pending_delivery(&owner);

        let result = apply(&mut delivery, &owner, DeliveryUpdate::CustomerPay);
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        assert_eq!(delivery.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn completion_requires_payment_first() {
        let owner = customer();
        let dana = driver();
        let mut delivery = pending_delivery(&owner);
        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();
        apply(&mut delivery, &dana, DeliveryUpdate::DriverMarkDelivered).unwrap();

        let result = apply(
            &mut delivery,
            &owner,
            DeliveryUpdate::CustomerComplete {
                rating: 4,
                feedback: String::new(),
            },
        );
        assert!(matches!(result, Err(AppError::InvalidTransition(_))));

        apply(&mut delivery, &owner, DeliveryUpdate::CustomerPay).unwrap();
        apply(
            &mut delivery,
            &owner,
            DeliveryUpdate::CustomerComplete {
                rating: 4,
                feedback: "on time".to_string(),
            },
        )
        .unwrap();

        assert_eq!(delivery.delivery_status, DeliveryStatus::Completed);
        assert_eq!(delivery.rating, Some(4));
        assert_eq!(delivery.feedback, "on time");
    }

    #[test]
    fn feedback_can_only_be_submitted_once() {
        let owner = customer();
        let dana = driver();
        let mut delivery = pending_delivery(&owner);
        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();
        apply(&mut delivery, &dana, DeliveryUpdate::DriverMarkDelivered).unwrap();
        apply(&mut delivery, &owner, DeliveryUpdate::CustomerPay).unwrap();
        apply(
            &mut delivery,
            &owner,
            DeliveryUpdate::CustomerComplete {
                rating: 5,
                feedback: String::new(),
            },
        )
        .unwrap();

        let result = apply(
            &mut delivery,
            &owner,
            DeliveryUpdate::CustomerComplete {
                rating: 1,
                feedback: "changed my mind".to_string(),
            },
        );
        assert!(result.is_err());
        assert_eq!(delivery.rating, Some(5));
    }

    #[test]
    fn rating_out_of_range_is_invalid_input() {
        let owner = customer();
        let dana = driver();
        let mut delivery = pending_delivery(&owner);
        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();
        apply(&mut delivery, &dana, DeliveryUpdate::DriverMarkDelivered).unwrap();
        apply(&mut delivery, &owner, DeliveryUpdate::CustomerPay).unwrap();

        let result = apply(
            &mut delivery,
            &owner,
            DeliveryUpdate::CustomerComplete {
                rating: 6,
                feedback: String::new(),
            },
        );
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn foreign_customer_cannot_rate_or_delete() {
        let owner = customer();
        let stranger = User {
            id: Uuid::from_u128(9),
            name: "Mallory".to_string(),
            role: Role::Customer,
            email: None,
        };
        let dana = driver();
        let mut delivery = pending_delivery(&owner);

        assert!(matches!(
            authorize_delete(&delivery, &stranger),
            Err(AppError::Forbidden(_))
        ));

        apply(&mut delivery, &dana, DeliveryUpdate::DriverAccept).unwrap();
        apply(&mut delivery, &dana, DeliveryUpdate::DriverMarkDelivered).unwrap();

        let result = apply(&mut delivery, &stranger, DeliveryUpdate::CustomerPay);
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn delete_requires_pending_and_unassigned() {
        let owner = customer();
        let mut delivery = pending_delivery(&owner);
        assert!(authorize_delete(&delivery, &owner).is_ok());

        apply(&mut delivery, &driver(), DeliveryUpdate::DriverAccept).unwrap();
        assert!(matches!(
            authorize_delete(&delivery, &owner),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn request_mapping_rejects_ambiguous_bodies() {
        let mapped = DeliveryUpdate::from_parts(Role::Driver, None, None, None, None);
        assert!(matches!(mapped, Err(AppError::InvalidInput(_))));

        let mapped = DeliveryUpdate::from_parts(
            Role::Customer,
            Some(DeliveryStatus::Completed),
            Some(5),
            None,
            Some(PaymentStatus::Paid),
        );
        assert!(matches!(mapped, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn request_mapping_enforces_roles() {
        let mapped = DeliveryUpdate::from_parts(
            Role::Customer,
            Some(DeliveryStatus::Delivered),
            None,
            None,
            None,
        );
        assert!(matches!(mapped, Err(AppError::Forbidden(_))));

        let mapped = DeliveryUpdate::from_parts(
            Role::Driver,
            Some(DeliveryStatus::Completed),
            None,
            None,
            None,
        );
        assert!(matches!(mapped, Err(AppError::Forbidden(_))));

        let mapped =
            DeliveryUpdate::from_parts(Role::Driver, None, None, None, Some(PaymentStatus::Paid));
        assert!(matches!(mapped, Err(AppError::Forbidden(_))));
    }
}
