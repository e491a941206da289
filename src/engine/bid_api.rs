use super::helpers::{
    bid_has_child, fetch_bid_for_update, fetch_open_bids_for_update, fetch_ride_for_update,
    insert_bid, open_thread_exists, update_bid, update_ride,
};
use super::Engine;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::BidAPI,
    auth::{Platform, User},
    entities::{Bid, BidStatus, Party, Ride, ThreadSummary},
    error::Error,
    notify::{ChangeKind, StateChange},
};

/// Which side of the negotiation the caller is on. Anyone who is not the
/// ride's rider negotiates as a driver and must pass the driver-side
/// authorization checks.
fn acting_party(user: &User, ride: &Ride) -> Party {
    if user.id == ride.rider_id {
        Party::Rider
    } else {
        Party::Driver
    }
}

#[async_trait]
impl BidAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn submit_bid(
        &self,
        user: User,
        ride_id: Uuid,
        amount: i64,
        notes: Option<String>,
    ) -> Result<Bid, Error> {
        self.authorize(user.clone(), "submit_bid", Platform::default())?;

        let bid = Bid::new(ride_id, user.id, amount, notes)?;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &ride_id).await?;

        if !ride.is_biddable() {
            return Err(Error::ride_not_biddable_error());
        }

        if open_thread_exists(&mut tx, &ride_id, &user.id).await? {
            return Err(Error::duplicate_bid_error());
        }

        ride.open_bidding()?;

        insert_bid(&mut tx, &bid).await?;
        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        self.emit(StateChange::new(
            ride_id,
            Some(bid.id),
            ChangeKind::BidSubmitted,
            user.id,
        ))
        .await;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn counter_bid(&self, user: User, bid_id: Uuid, amount: i64) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;

        // authorization runs against unlocked reads; every state check is
        // redone under the row lock below
        let Json(parent): Json<Bid> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&bid_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        let Json(ride): Json<Ride> = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&parent.ride_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        let party = acting_party(&user, &ride);

        match party {
            Party::Rider => self.authorize(user.clone(), "counter_bid", ride.clone())?,
            Party::Driver => self.authorize(user.clone(), "counter_bid", parent.clone())?,
        }

        if !ride.is_biddable() {
            return Err(Error::ride_not_biddable_error());
        }

        let mut tx = conn.begin().await?;

        let mut parent = fetch_bid_for_update(&mut tx, &bid_id).await?;

        // a stale id is refused, never silently retargeted at the latest round
        if bid_has_child(&mut tx, &parent.id).await? {
            return Err(Error::stale_bid_error());
        }

        let child = parent.counter(amount, party, self.policy.max_rounds)?;

        insert_bid(&mut tx, &child).await?;
        update_bid(&mut tx, &parent).await?;

        tx.commit().await?;

        self.emit(StateChange::new(
            child.ride_id,
            Some(child.id),
            ChangeKind::BidCountered,
            user.id,
        ))
        .await;

        // the over-limit round is persisted for audit, but the call fails
        if matches!(child.status, BidStatus::MaxReached) {
            return Err(Error::max_rounds_error());
        }

        Ok(child)
    }

    #[tracing::instrument(skip(self))]
    async fn accept_bid(&self, user: User, bid_id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(target): Json<Bid> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&bid_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        let Json(current_ride): Json<Ride> = conn
            .fetch_optional(
                sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&target.ride_id),
            )
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        let party = acting_party(&user, &current_ride);

        match party {
            Party::Rider => self.authorize(user.clone(), "accept_bid", current_ride.clone())?,
            Party::Driver => self.authorize(user.clone(), "accept_bid", target.clone())?,
        }

        // the per-ride serialized section: validation, acceptance,
        // cross-thread rejection and assignment all hold the ride row lock
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &target.ride_id).await?;

        if !ride.is_biddable() {
            return Err(Error::ride_not_biddable_error());
        }

        let mut bid = fetch_bid_for_update(&mut tx, &bid_id).await?;

        if bid_has_child(&mut tx, &bid.id).await? {
            return Err(Error::stale_bid_error());
        }

        bid.accept(party)?;
        ride.schedule(bid.driver_id, bid.amount)?;

        let mut rejected = Vec::new();

        for mut other in fetch_open_bids_for_update(&mut tx, &ride.id).await? {
            if other.id == bid.id {
                continue;
            }

            other.reject();
            update_bid(&mut tx, &other).await?;
            rejected.push(other.id);
        }

        update_bid(&mut tx, &bid).await?;
        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        self.emit(StateChange::new(
            ride.id,
            Some(bid.id),
            ChangeKind::BidAccepted,
            user.id,
        ))
        .await;

        for other_id in rejected {
            self.emit(StateChange::new(
                ride.id,
                Some(other_id),
                ChangeKind::BidRejected,
                user.id,
            ))
            .await;
        }

        self.emit(StateChange::new(
            ride.id,
            Some(bid.id),
            ChangeKind::RideScheduled,
            user.id,
        ))
        .await;

        self.settle(ride, bid, user.id).await
    }

    #[tracing::instrument(skip(self))]
    async fn withdraw_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(unlocked): Json<Bid> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&bid_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        self.authorize(user.clone(), "withdraw_bid", unlocked.clone())?;

        let mut tx = conn.begin().await?;

        let mut bid = fetch_bid_for_update(&mut tx, &bid_id).await?;

        // idempotent: re-withdrawing reports the terminal state unchanged,
        // regardless of what the ride has moved on to
        if matches!(bid.status, BidStatus::Withdrawn) {
            return Ok(bid);
        }

        let Json(ride): Json<Ride> = tx
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&bid.ride_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        if !ride.is_biddable() {
            return Err(Error::ride_not_biddable_error());
        }

        bid.withdraw()?;

        update_bid(&mut tx, &bid).await?;

        tx.commit().await?;

        self.emit(StateChange::new(
            bid.ride_id,
            Some(bid.id),
            ChangeKind::BidWithdrawn,
            user.id,
        ))
        .await;

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn find_bid(&self, user: User, bid_id: Uuid) -> Result<Bid, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(bid): Json<Bid> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&bid_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        let Json(ride): Json<Ride> = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&bid.ride_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        match acting_party(&user, &ride) {
            Party::Rider => self.authorize(user.clone(), "read", ride.clone())?,
            Party::Driver => self.authorize(user.clone(), "read", bid.clone())?,
        }

        Ok(bid)
    }

    #[tracing::instrument(skip(self))]
    async fn list_ride_bids(&self, user: User, ride_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(ride): Json<Ride> = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&ride_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        // the rider sees the whole ledger; drivers see their own threads
        let query = match self.authorize(user.clone(), "read", ride) {
            Ok(()) => {
                sqlx::query("SELECT data FROM bids WHERE ride_id = $1 ORDER BY created_at ASC")
                    .bind(ride_id)
            }
            Err(_) => {
                self.authorize(user.clone(), "submit_bid", Platform::default())?;

                sqlx::query(
                    "SELECT data FROM bids WHERE ride_id = $1 AND driver_id = $2 ORDER BY created_at ASC",
                )
                .bind(ride_id)
                .bind(user.id)
            }
        };

        let mut rows = conn.fetch(query);
        let mut bids = Vec::new();

        while let Some(row) = rows.try_next().await? {
            let Json(bid): Json<Bid> = row.try_get("data")?;
            bids.push(bid);
        }

        Ok(bids)
    }

    #[tracing::instrument(skip(self))]
    async fn list_driver_bids(&self, user: User, driver_id: Uuid) -> Result<Vec<Bid>, Error> {
        if user.id != driver_id {
            self.authorize(user.clone(), "audit", Platform::default())?;
        }

        let mut conn = self.pool.acquire().await?;

        let mut rows = conn.fetch(
            sqlx::query("SELECT data FROM bids WHERE driver_id = $1 ORDER BY created_at ASC")
                .bind(driver_id),
        );

        let mut bids = Vec::new();

        while let Some(row) = rows.try_next().await? {
            let Json(bid): Json<Bid> = row.try_get("data")?;
            bids.push(bid);
        }

        Ok(bids)
    }

    #[tracing::instrument(skip(self))]
    async fn list_open_threads(
        &self,
        user: User,
        ride_id: Uuid,
    ) -> Result<Vec<ThreadSummary>, Error> {
        let bids = self.list_ride_bids(user, ride_id).await?;

        Ok(ThreadSummary::collapse(&bids)
            .into_iter()
            .filter(|summary| summary.open)
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn bid_history(&self, user: User, bid_id: Uuid) -> Result<Vec<Bid>, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(bid): Json<Bid> = conn
            .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&bid_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        let Json(ride): Json<Ride> = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&bid.ride_id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        match acting_party(&user, &ride) {
            Party::Rider => self.authorize(user.clone(), "read", ride.clone())?,
            Party::Driver => self.authorize(user.clone(), "read", bid.clone())?,
        }

        let mut chain = vec![bid];

        while let Some(parent_id) = chain.last().and_then(|bid| bid.parent_bid_id) {
            let Json(parent): Json<Bid> = conn
                .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1").bind(&parent_id))
                .await?
                .ok_or_else(|| Error::unexpected_error())?
                .try_get("data")?;

            chain.push(parent);
        }

        chain.reverse();

        Ok(chain)
    }
}
