use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Bid, Ride, ThreadSummary};
use crate::error::Error;

#[async_trait]
pub trait RideAPI {
    async fn create_ride(&self, user: User) -> Result<Ride, Error>;
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    /// Voids every open negotiation thread in the same transaction.
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    /// Pulls an unassigned ride back for editing; voids open threads.
    async fn hold_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn reopen_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;

    async fn mark_en_route(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn mark_arrived(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn begin_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
    async fn complete_ride(&self, user: User, id: Uuid) -> Result<Ride, Error>;
}

#[async_trait]
pub trait BidAPI {
    async fn submit_bid(
        &self,
        user: User,
        ride_id: Uuid,
        amount: i64,
        notes: Option<String>,
    ) -> Result<Bid, Error>;

    async fn counter_bid(&self, user: User, bid_id: Uuid, amount: i64) -> Result<Bid, Error>;

    /// Accept the current round of a thread: the winning bid is marked
    /// accepted, every other open bid on the ride is rejected, the ride is
    /// scheduled, and settlement runs.
    async fn accept_bid(&self, user: User, bid_id: Uuid) -> Result<Ride, Error>;

    async fn withdraw_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error>;

    async fn find_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error>;

    async fn list_ride_bids(&self, user: User, ride_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn list_driver_bids(&self, user: User, driver_id: Uuid) -> Result<Vec<Bid>, Error>;
    async fn list_open_threads(&self, user: User, ride_id: Uuid)
        -> Result<Vec<ThreadSummary>, Error>;

    /// Full ancestor chain of a bid, root first.
    async fn bid_history(&self, user: User, bid_id: Uuid) -> Result<Vec<Bid>, Error>;
}

pub trait API: RideAPI + BidAPI {}
