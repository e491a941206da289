use super::Database;

use sqlx::{types::Json, Executor, Row, Transaction};
use uuid::Uuid;

use crate::{
    entities::{Bid, Ride},
    error::Error,
};

#[tracing::instrument(skip(tx))]
pub async fn fetch_ride_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Ride, Error> {
    let Json(ride): Json<Ride> = tx
        .fetch_optional(sqlx::query("SELECT data FROM rides WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| Error::invalid_input_error())?
        .try_get("data")?;

    Ok(ride)
}

#[tracing::instrument(skip(tx))]
pub async fn fetch_bid_for_update(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<Bid, Error> {
    let Json(bid): Json<Bid> = tx
        .fetch_optional(sqlx::query("SELECT data FROM bids WHERE id = $1 FOR UPDATE").bind(id))
        .await?
        .ok_or_else(|| Error::invalid_input_error())?
        .try_get("data")?;

    Ok(bid)
}

#[tracing::instrument(skip(tx))]
pub async fn update_ride(tx: &mut Transaction<'_, Database>, ride: &Ride) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE rides SET status = $2, data = $3 WHERE id = $1")
            .bind(&ride.id)
            .bind(ride.status.name())
            .bind(Json(ride)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn update_bid(tx: &mut Transaction<'_, Database>, bid: &Bid) -> Result<(), Error> {
    tx.execute(
        sqlx::query("UPDATE bids SET status = $2, data = $3 WHERE id = $1")
            .bind(&bid.id)
            .bind(bid.status.name())
            .bind(Json(bid)),
    )
    .await?;

    Ok(())
}

#[tracing::instrument(skip(tx))]
pub async fn insert_bid(tx: &mut Transaction<'_, Database>, bid: &Bid) -> Result<(), Error> {
    tx.execute(
        sqlx::query(
            "INSERT INTO bids (id, ride_id, driver_id, parent_bid_id, status, round, created_at, data) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&bid.id)
        .bind(&bid.ride_id)
        .bind(&bid.driver_id)
        .bind(&bid.parent_bid_id)
        .bind(bid.status.name())
        .bind(bid.round as i32)
        .bind(&bid.created_at)
        .bind(Json(bid)),
    )
    .await?;

    Ok(())
}

/// A newer round already references this bid as its parent.
#[tracing::instrument(skip(tx))]
pub async fn bid_has_child(
    tx: &mut Transaction<'_, Database>,
    id: &Uuid,
) -> Result<bool, Error> {
    let maybe_row = tx
        .fetch_optional(sqlx::query("SELECT id FROM bids WHERE parent_bid_id = $1").bind(id))
        .await?;

    Ok(maybe_row.is_some())
}

/// A thread is open exactly when its current row is awaiting a response;
/// every superseded row is `countered` and every settled row terminal.
#[tracing::instrument(skip(tx))]
pub async fn open_thread_exists(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
    driver_id: &Uuid,
) -> Result<bool, Error> {
    let maybe_row = tx
        .fetch_optional(
            sqlx::query(
                "SELECT id FROM bids WHERE ride_id = $1 AND driver_id = $2 AND status IN ('pending', 'selected')",
            )
            .bind(ride_id)
            .bind(driver_id),
        )
        .await?;

    Ok(maybe_row.is_some())
}

/// Every awaiting-response bid on the ride, locked for the caller's
/// transaction. Used by cross-thread rejection and thread voiding.
#[tracing::instrument(skip(tx))]
pub async fn fetch_open_bids_for_update(
    tx: &mut Transaction<'_, Database>,
    ride_id: &Uuid,
) -> Result<Vec<Bid>, Error> {
    let rows = tx
        .fetch_all(
            sqlx::query(
                "SELECT data FROM bids WHERE ride_id = $1 AND status IN ('pending', 'selected') ORDER BY created_at ASC FOR UPDATE",
            )
            .bind(ride_id),
        )
        .await?;

    let mut bids = Vec::with_capacity(rows.len());

    for row in rows.iter() {
        let Json(bid): Json<Bid> = row.try_get("data")?;
        bids.push(bid);
    }

    Ok(bids)
}
