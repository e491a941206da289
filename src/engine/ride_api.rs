use super::helpers::{fetch_open_bids_for_update, fetch_ride_for_update, update_bid, update_ride};
use super::Engine;

use async_trait::async_trait;
use sqlx::{types::Json, Acquire, Executor, Row};
use uuid::Uuid;

use crate::{
    api::RideAPI,
    auth::{Platform, User},
    entities::Ride,
    error::Error,
    notify::{ChangeKind, StateChange},
};

#[async_trait]
impl RideAPI for Engine {
    #[tracing::instrument(skip(self))]
    async fn create_ride(&self, user: User) -> Result<Ride, Error> {
        self.authorize(user.clone(), "create_ride", Platform::default())?;

        let ride = Ride::new(user.id);

        let mut conn = self.pool.acquire().await?;

        conn.execute(
            sqlx::query("INSERT INTO rides (id, status, data) VALUES ($1, $2, $3)")
                .bind(&ride.id)
                .bind(ride.status.name())
                .bind(Json(&ride)),
        )
        .await?;

        self.emit(StateChange::new(
            ride.id,
            None,
            ChangeKind::RideRequested,
            user.id,
        ))
        .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;

        let Json(ride): Json<Ride> = conn
            .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1").bind(&id))
            .await?
            .ok_or_else(|| Error::invalid_input_error())?
            .try_get("data")?;

        self.authorize(user.clone(), "read", ride.clone())?;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn cancel_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "cancel", ride.clone())?;

        ride.cancel()?;

        // voiding open threads is part of the cancellation transaction,
        // not a cleanup that runs after it
        let mut voided = Vec::new();

        for mut bid in fetch_open_bids_for_update(&mut tx, &ride.id).await? {
            bid.reject();
            update_bid(&mut tx, &bid).await?;
            voided.push(bid.id);
        }

        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        for bid_id in voided {
            self.emit(StateChange::new(
                ride.id,
                Some(bid_id),
                ChangeKind::BidRejected,
                user.id,
            ))
            .await;
        }

        self.emit(StateChange::new(
            ride.id,
            None,
            ChangeKind::RideCancelled,
            user.id,
        ))
        .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn hold_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "hold", ride.clone())?;

        ride.hold_for_edit()?;

        let mut voided = Vec::new();

        for mut bid in fetch_open_bids_for_update(&mut tx, &ride.id).await? {
            bid.reject();
            update_bid(&mut tx, &bid).await?;
            voided.push(bid.id);
        }

        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        for bid_id in voided {
            self.emit(StateChange::new(
                ride.id,
                Some(bid_id),
                ChangeKind::BidRejected,
                user.id,
            ))
            .await;
        }

        self.emit(StateChange::new(ride.id, None, ChangeKind::RideHeld, user.id))
            .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn reopen_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "reopen", ride.clone())?;

        ride.reopen_bidding()?;

        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        self.emit(StateChange::new(
            ride.id,
            None,
            ChangeKind::RideReopened,
            user.id,
        ))
        .await;

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_en_route(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.advance(user, id, ChangeKind::RideEnRoute, |ride| ride.mark_en_route())
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_arrived(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.advance(user, id, ChangeKind::RideArrived, |ride| ride.mark_arrived())
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn begin_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.advance(user, id, ChangeKind::RideInProgress, |ride| ride.begin())
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn complete_ride(&self, user: User, id: Uuid) -> Result<Ride, Error> {
        self.advance(user, id, ChangeKind::RideCompleted, |ride| ride.complete())
            .await
    }
}

impl Engine {
    /// Shared shape of the assigned driver's lifecycle transitions.
    async fn advance(
        &self,
        user: User,
        id: Uuid,
        kind: ChangeKind,
        transition: impl FnOnce(&mut Ride) -> Result<(), Error> + Send,
    ) -> Result<Ride, Error> {
        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &id).await?;

        self.authorize(user.clone(), "advance", ride.clone())?;

        transition(&mut ride)?;

        update_ride(&mut tx, &ride).await?;

        tx.commit().await?;

        self.emit(StateChange::new(ride.id, None, kind, user.id)).await;

        Ok(ride)
    }
}
