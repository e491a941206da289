use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// A requested trip and the negotiation-relevant fields the engine owns.
///
/// `assigned_driver_id` and `final_price` are set together when a bid is
/// accepted and cleared together whenever the ride leaves the assigned
/// portion of the lifecycle.
#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Ride {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub status: Status,
    #[polar(attribute)]
    pub rider_id: Uuid,
    #[polar(attribute)]
    pub assigned_driver_id: Option<Uuid>,
    pub final_price: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Requested,
    Bidding,
    Scheduled,
    Paid {
        charge_id: String,
    },
    EnRoute,
    Arrived {
        timestamp: DateTime<Utc>,
    },
    InProgress,
    Completed,
    Cancelled,
    EditPending,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Requested => "requested".into(),
            Self::Bidding => "bidding".into(),
            Self::Scheduled => "scheduled".into(),
            Self::Paid { charge_id: _ } => "paid".into(),
            Self::EnRoute => "en_route".into(),
            Self::Arrived { timestamp: _ } => "arrived".into(),
            Self::InProgress => "in_progress".into(),
            Self::Completed => "completed".into(),
            Self::Cancelled => "cancelled".into(),
            Self::EditPending => "edit_pending".into(),
        }
    }
}

impl PolarClass for Status {
    fn get_polar_class_builder() -> oso::ClassBuilder<Status> {
        oso::Class::builder()
            .name("RideStatus")
            .add_attribute_getter("name", |recv: &Status| recv.name())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Status::get_polar_class_builder();
        builder.build()
    }
}

impl Ride {
    pub fn new(rider_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: Status::Requested,
            rider_id,
            assigned_driver_id: None,
            final_price: None,
        }
    }

    /// Offers may be submitted, countered, accepted or withdrawn only while
    /// this holds.
    pub fn is_biddable(&self) -> bool {
        matches!(self.status, Status::Requested | Status::Bidding)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, Status::Completed | Status::Cancelled)
    }

    /// First offer on a requested ride moves it to bidding. Calling this on
    /// a ride that is already bidding is a no-op.
    #[tracing::instrument]
    pub fn open_bidding(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Requested => {
                self.status = Status::Bidding;
                Ok(())
            }
            Status::Bidding => Ok(()),
            _ => Err(Error::ride_not_biddable_error()),
        }
    }

    /// Reserve the ride for the winning driver at the accepted price.
    #[tracing::instrument]
    pub fn schedule(&mut self, driver_id: Uuid, final_price: i64) -> Result<(), Error> {
        match self.status {
            Status::Requested | Status::Bidding => {
                self.status = Status::Scheduled;
                self.assigned_driver_id = Some(driver_id);
                self.final_price = Some(final_price);
                Ok(())
            }
            _ => Err(Error::ride_not_biddable_error()),
        }
    }

    /// Compensation path: the charge failed after the ride was reserved, so
    /// the assignment is undone and bidding reopens.
    #[tracing::instrument]
    pub fn revert_to_bidding(&mut self) -> Result<Uuid, Error> {
        match self.status {
            Status::Scheduled => {
                let driver_id = self
                    .assigned_driver_id
                    .ok_or_else(|| Error::unexpected_error())?;

                self.status = Status::Bidding;
                self.assigned_driver_id = None;
                self.final_price = None;

                Ok(driver_id)
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn mark_paid(&mut self, charge_id: String) -> Result<(), Error> {
        match self.status {
            Status::Scheduled => {
                self.status = Status::Paid { charge_id };
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn mark_en_route(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Paid { charge_id: _ } => {
                self.status = Status::EnRoute;
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn mark_arrived(&mut self) -> Result<(), Error> {
        match self.status {
            Status::EnRoute => {
                self.status = Status::Arrived {
                    timestamp: Utc::now(),
                };
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn begin(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Arrived { timestamp: _ } => {
                self.status = Status::InProgress;
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn complete(&mut self) -> Result<(), Error> {
        match self.status {
            Status::InProgress => {
                self.status = Status::Completed;
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    /// Rider pulls the ride back to amend it before a driver is assigned.
    /// Open negotiation threads are voided by the caller in the same
    /// transaction.
    #[tracing::instrument]
    pub fn hold_for_edit(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Requested | Status::Bidding => {
                self.status = Status::EditPending;
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn reopen_bidding(&mut self) -> Result<(), Error> {
        match self.status {
            Status::EditPending => {
                self.status = Status::Bidding;
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    /// Cancellation is legal from every non-terminal state except an
    /// in-progress trip. Clears the assignment so the driver/price fields
    /// only survive on rides that still carry a driver.
    #[tracing::instrument]
    pub fn cancel(&mut self) -> Result<Option<Uuid>, Error> {
        match self.status {
            Status::Completed | Status::Cancelled | Status::InProgress => {
                Err(Error::invalid_transition_error())
            }
            _ => {
                let freed_driver = self.assigned_driver_id.take();
                self.final_price = None;
                self.status = Status::Cancelled;

                Ok(freed_driver)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigned_invariant_holds(ride: &Ride) -> bool {
        let assigned_status = matches!(
            ride.status,
            Status::Scheduled
                | Status::Paid { .. }
                | Status::EnRoute
                | Status::Arrived { .. }
                | Status::InProgress
                | Status::Completed
        );

        assigned_status == ride.assigned_driver_id.is_some()
            && assigned_status == ride.final_price.is_some()
    }

    #[test]
    fn schedule_assigns_driver_and_price() {
        let mut ride = Ride::new(Uuid::new_v4());
        let driver_id = Uuid::new_v4();

        ride.open_bidding().unwrap();
        ride.schedule(driver_id, 4500).unwrap();

        assert_eq!(ride.status.name(), "scheduled");
        assert_eq!(ride.assigned_driver_id, Some(driver_id));
        assert_eq!(ride.final_price, Some(4500));
        assert!(assigned_invariant_holds(&ride));
    }

    #[test]
    fn schedule_requires_biddable_ride() {
        let mut ride = Ride::new(Uuid::new_v4());
        ride.cancel().unwrap();

        let err = ride.schedule(Uuid::new_v4(), 4500).unwrap_err();
        assert_eq!(err.code, Error::ride_not_biddable_error().code);
        assert!(assigned_invariant_holds(&ride));
    }

    #[test]
    fn revert_clears_assignment() {
        let mut ride = Ride::new(Uuid::new_v4());
        let driver_id = Uuid::new_v4();

        ride.schedule(driver_id, 5000).unwrap();
        let freed = ride.revert_to_bidding().unwrap();

        assert_eq!(freed, driver_id);
        assert_eq!(ride.status.name(), "bidding");
        assert_eq!(ride.assigned_driver_id, None);
        assert_eq!(ride.final_price, None);
        assert!(assigned_invariant_holds(&ride));
    }

    #[test]
    fn lifecycle_runs_to_completion() {
        let mut ride = Ride::new(Uuid::new_v4());

        ride.open_bidding().unwrap();
        ride.schedule(Uuid::new_v4(), 5000).unwrap();
        ride.mark_paid("ch_1".into()).unwrap();
        ride.mark_en_route().unwrap();
        ride.mark_arrived().unwrap();
        ride.begin().unwrap();
        ride.complete().unwrap();

        assert!(ride.is_terminal());
        assert!(assigned_invariant_holds(&ride));
    }

    #[test]
    fn lifecycle_steps_cannot_be_skipped() {
        let mut ride = Ride::new(Uuid::new_v4());
        ride.schedule(Uuid::new_v4(), 5000).unwrap();

        assert!(ride.mark_en_route().is_err());
        assert!(ride.begin().is_err());
        assert!(ride.complete().is_err());
    }

    #[test]
    fn cancel_clears_assignment_and_is_terminal() {
        let mut ride = Ride::new(Uuid::new_v4());
        ride.schedule(Uuid::new_v4(), 5000).unwrap();

        let freed = ride.cancel().unwrap();

        assert!(freed.is_some());
        assert_eq!(ride.status.name(), "cancelled");
        assert!(assigned_invariant_holds(&ride));
        assert!(ride.cancel().is_err());
    }

    #[test]
    fn cancel_is_refused_mid_trip() {
        let mut ride = Ride::new(Uuid::new_v4());
        ride.schedule(Uuid::new_v4(), 5000).unwrap();
        ride.mark_paid("ch_1".into()).unwrap();
        ride.mark_en_route().unwrap();
        ride.mark_arrived().unwrap();
        ride.begin().unwrap();

        assert!(ride.cancel().is_err());
    }

    #[test]
    fn edit_hold_and_reopen() {
        let mut ride = Ride::new(Uuid::new_v4());
        ride.open_bidding().unwrap();

        ride.hold_for_edit().unwrap();
        assert_eq!(ride.status.name(), "edit_pending");
        assert!(!ride.is_biddable());

        ride.reopen_bidding().unwrap();
        assert!(ride.is_biddable());
    }
}
