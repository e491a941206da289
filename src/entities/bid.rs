use chrono::{DateTime, Utc};
use oso::PolarClass;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const MAX_NOTES_LEN: usize = 500;

/// One round of a negotiation thread.
///
/// Rounds are append-only: countering never rewrites an existing row, it
/// closes the parent as `Countered` and produces a child row linked through
/// `parent_bid_id`. Status is the only field that mutates in place.
#[derive(Clone, Debug, Serialize, Deserialize, PolarClass)]
pub struct Bid {
    #[polar(attribute)]
    pub id: Uuid,
    #[polar(attribute)]
    pub ride_id: Uuid,
    #[polar(attribute)]
    pub driver_id: Uuid,
    pub amount: i64,
    pub notes: Option<String>,
    pub status: Status,
    pub counter_party: Party,
    pub parent_bid_id: Option<Uuid>,
    pub round: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    /// Proposed by the driver, awaiting the rider.
    Pending,
    /// Proposed by the rider, awaiting the driver.
    Selected,
    /// Superseded by a child round; the thread continues there.
    Countered,
    Accepted,
    Rejected,
    Withdrawn,
    /// Created past the round limit; closes the thread.
    MaxReached,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Rider,
    Driver,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Selected => "selected".into(),
            Self::Countered => "countered".into(),
            Self::Accepted => "accepted".into(),
            Self::Rejected => "rejected".into(),
            Self::Withdrawn => "withdrawn".into(),
            Self::MaxReached => "max_reached".into(),
        }
    }
}

impl PolarClass for Status {
    fn get_polar_class_builder() -> oso::ClassBuilder<Status> {
        oso::Class::builder()
            .name("BidStatus")
            .add_attribute_getter("name", |recv: &Status| recv.name())
    }

    fn get_polar_class() -> oso::Class {
        let builder = Status::get_polar_class_builder();
        builder.build()
    }
}

impl Bid {
    /// A driver's opening offer on a ride.
    pub fn new(
        ride_id: Uuid,
        driver_id: Uuid,
        amount: i64,
        notes: Option<String>,
    ) -> Result<Self, Error> {
        validate_amount(amount)?;
        validate_notes(&notes)?;

        Ok(Self {
            id: Uuid::new_v4(),
            ride_id,
            driver_id,
            amount,
            notes,
            status: Status::Pending,
            counter_party: Party::Driver,
            parent_bid_id: None,
            round: 0,
            created_at: Utc::now(),
        })
    }

    /// The bid is awaiting a response and may still be acted on.
    pub fn is_open(&self) -> bool {
        matches!(self.status, Status::Pending | Status::Selected)
    }

    /// Terminal for the whole thread, not just this row.
    pub fn is_thread_terminal(&self) -> bool {
        matches!(
            self.status,
            Status::Accepted | Status::Rejected | Status::Withdrawn | Status::MaxReached
        )
    }

    /// Build the next round of this thread and close this row as
    /// `Countered`.
    ///
    /// A round past `max_rounds` is still materialized, as a `MaxReached`
    /// row that closes the thread; the engine persists it and fails the
    /// call, leaving an audit trail of the over-limit attempt.
    #[tracing::instrument]
    pub fn counter(
        &mut self,
        amount: i64,
        acting_party: Party,
        max_rounds: u32,
    ) -> Result<Bid, Error> {
        self.ensure_open()?;

        if acting_party == self.counter_party {
            return Err(Error::not_your_turn_error());
        }

        validate_amount(amount)?;

        let round = self.round + 1;
        let status = if round > max_rounds {
            Status::MaxReached
        } else {
            match acting_party {
                Party::Driver => Status::Pending,
                Party::Rider => Status::Selected,
            }
        };

        let child = Self {
            id: Uuid::new_v4(),
            ride_id: self.ride_id,
            driver_id: self.driver_id,
            amount,
            notes: None,
            status,
            counter_party: acting_party,
            parent_bid_id: Some(self.id),
            round,
            created_at: Utc::now(),
        };

        self.status = Status::Countered;

        Ok(child)
    }

    /// Accept this round's amount. The proposing party cannot accept its
    /// own offer.
    #[tracing::instrument]
    pub fn accept(&mut self, accepting_party: Party) -> Result<(), Error> {
        self.ensure_open()?;

        if accepting_party == self.counter_party {
            return Err(Error::not_your_turn_error());
        }

        self.status = Status::Accepted;

        Ok(())
    }

    /// Cross-thread rejection on accept, and thread voiding on ride
    /// cancellation. Lenient on already-settled rows so a sweep over a
    /// ride's bids never trips on its own earlier writes.
    #[tracing::instrument]
    pub fn reject(&mut self) {
        if self.is_open() {
            self.status = Status::Rejected;
        }
    }

    /// Driver withdraws an unanswered offer. Withdrawing twice is a no-op
    /// returning the same terminal state.
    #[tracing::instrument]
    pub fn withdraw(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Withdrawn;
                Ok(())
            }
            Status::Withdrawn => Ok(()),
            Status::Countered => Err(Error::stale_bid_error()),
            Status::Selected => Err(Error::not_your_turn_error()),
            _ => Err(Error::thread_closed_error()),
        }
    }

    /// Compensation path: the charge behind an accepted bid failed, so the
    /// round reopens awaiting the same response it awaited before.
    #[tracing::instrument]
    pub fn reopen(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Accepted => {
                self.status = match self.counter_party {
                    Party::Driver => Status::Pending,
                    Party::Rider => Status::Selected,
                };
                Ok(())
            }
            _ => Err(Error::invalid_transition_error()),
        }
    }

    fn ensure_open(&self) -> Result<(), Error> {
        match self.status {
            Status::Pending | Status::Selected => Ok(()),
            Status::Countered => Err(Error::stale_bid_error()),
            _ => Err(Error::thread_closed_error()),
        }
    }
}

fn validate_amount(amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::invalid_input_error());
    }

    Ok(())
}

fn validate_notes(notes: &Option<String>) -> Result<(), Error> {
    if let Some(notes) = notes {
        if notes.is_empty() || notes.len() > MAX_NOTES_LEN {
            return Err(Error::invalid_input_error());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opening_bid() -> Bid {
        Bid::new(Uuid::new_v4(), Uuid::new_v4(), 5000, None).unwrap()
    }

    #[test]
    fn opening_bid_starts_a_thread() {
        let bid = opening_bid();

        assert_eq!(bid.status.name(), "pending");
        assert_eq!(bid.counter_party, Party::Driver);
        assert_eq!(bid.parent_bid_id, None);
        assert_eq!(bid.round, 0);
    }

    #[test]
    fn amount_must_be_positive() {
        let err = Bid::new(Uuid::new_v4(), Uuid::new_v4(), 0, None).unwrap_err();
        assert!(err.is_invalid_input_error());

        let err = Bid::new(Uuid::new_v4(), Uuid::new_v4(), -500, None).unwrap_err();
        assert!(err.is_invalid_input_error());
    }

    #[test]
    fn notes_are_bounded() {
        let long = "x".repeat(MAX_NOTES_LEN + 1);
        let err = Bid::new(Uuid::new_v4(), Uuid::new_v4(), 5000, Some(long)).unwrap_err();
        assert!(err.is_invalid_input_error());
    }

    #[test]
    fn rider_counter_creates_selected_child_and_closes_parent() {
        let mut parent = opening_bid();
        let child = parent.counter(4500, Party::Rider, 4).unwrap();

        assert_eq!(parent.status.name(), "countered");
        assert_eq!(child.status.name(), "selected");
        assert_eq!(child.counter_party, Party::Rider);
        assert_eq!(child.parent_bid_id, Some(parent.id));
        assert_eq!(child.ride_id, parent.ride_id);
        assert_eq!(child.driver_id, parent.driver_id);
        assert_eq!(child.round, 1);
        assert_eq!(child.amount, 4500);
    }

    #[test]
    fn parties_must_alternate() {
        let mut parent = opening_bid();

        let err = parent.counter(5200, Party::Driver, 4).unwrap_err();
        assert_eq!(err.code, Error::not_your_turn_error().code);

        let mut child = parent.counter(4500, Party::Rider, 4).unwrap();
        let err = child.counter(4000, Party::Rider, 4).unwrap_err();
        assert_eq!(err.code, Error::not_your_turn_error().code);
    }

    #[test]
    fn superseded_rounds_are_stale() {
        let mut parent = opening_bid();
        let _child = parent.counter(4500, Party::Rider, 4).unwrap();

        let err = parent.counter(4800, Party::Rider, 4).unwrap_err();
        assert_eq!(err.code, Error::stale_bid_error().code);

        let err = parent.accept(Party::Rider).unwrap_err();
        assert_eq!(err.code, Error::stale_bid_error().code);
    }

    #[test]
    fn closed_threads_refuse_counters() {
        let mut bid = opening_bid();
        bid.withdraw().unwrap();

        let err = bid.counter(4500, Party::Rider, 4).unwrap_err();
        assert_eq!(err.code, Error::thread_closed_error().code);
    }

    #[test]
    fn round_limit_materializes_a_max_reached_row() {
        let mut current = opening_bid();
        let max_rounds = 4;

        // rounds 1..=4 alternate rider/driver and stay open
        for round in 1..=max_rounds {
            let party = if round % 2 == 1 {
                Party::Rider
            } else {
                Party::Driver
            };

            current = current.counter(5000 - round as i64 * 100, party, max_rounds).unwrap();
            assert!(current.is_open());
            assert_eq!(current.round, round);
        }

        // the fifth counter lands past the limit and closes the thread
        let over = current.counter(4000, Party::Rider, max_rounds).unwrap();
        assert_eq!(over.status.name(), "max_reached");
        assert_eq!(over.round, max_rounds + 1);
        assert_eq!(current.status.name(), "countered");

        let mut over = over;
        let err = over.counter(3900, Party::Driver, max_rounds).unwrap_err();
        assert_eq!(err.code, Error::thread_closed_error().code);
        let err = over.accept(Party::Driver).unwrap_err();
        assert_eq!(err.code, Error::thread_closed_error().code);
    }

    #[test]
    fn proposer_cannot_accept_own_offer() {
        let mut bid = opening_bid();

        let err = bid.accept(Party::Driver).unwrap_err();
        assert_eq!(err.code, Error::not_your_turn_error().code);

        bid.accept(Party::Rider).unwrap();
        assert_eq!(bid.status.name(), "accepted");
    }

    #[test]
    fn driver_accepts_a_rider_counter() {
        let mut parent = opening_bid();
        let mut child = parent.counter(4500, Party::Rider, 4).unwrap();

        child.accept(Party::Driver).unwrap();
        assert_eq!(child.status.name(), "accepted");
    }

    #[test]
    fn withdraw_is_idempotent() {
        let mut bid = opening_bid();

        bid.withdraw().unwrap();
        assert_eq!(bid.status.name(), "withdrawn");

        bid.withdraw().unwrap();
        assert_eq!(bid.status.name(), "withdrawn");
    }

    #[test]
    fn withdraw_needs_an_unanswered_driver_offer() {
        let mut parent = opening_bid();
        let mut child = parent.counter(4500, Party::Rider, 4).unwrap();

        let err = child.withdraw().unwrap_err();
        assert_eq!(err.code, Error::not_your_turn_error().code);

        let err = parent.withdraw().unwrap_err();
        assert_eq!(err.code, Error::stale_bid_error().code);

        child.accept(Party::Driver).unwrap();
        let err = child.withdraw().unwrap_err();
        assert_eq!(err.code, Error::thread_closed_error().code);
    }

    #[test]
    fn reopen_restores_the_awaited_response() {
        let mut driver_offer = opening_bid();
        driver_offer.accept(Party::Rider).unwrap();
        driver_offer.reopen().unwrap();
        assert_eq!(driver_offer.status.name(), "pending");

        let mut parent = opening_bid();
        let mut rider_counter = parent.counter(4500, Party::Rider, 4).unwrap();
        rider_counter.accept(Party::Driver).unwrap();
        rider_counter.reopen().unwrap();
        assert_eq!(rider_counter.status.name(), "selected");

        assert!(opening_bid().reopen().is_err());
    }

    #[test]
    fn reject_only_touches_open_rows() {
        let mut accepted = opening_bid();
        accepted.accept(Party::Rider).unwrap();
        accepted.reject();
        assert_eq!(accepted.status.name(), "accepted");

        let mut open = opening_bid();
        open.reject();
        assert_eq!(open.status.name(), "rejected");
    }
}
