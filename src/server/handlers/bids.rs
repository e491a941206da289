use axum::extract::{Extension, Json, Path};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::{Bid, Ride, ThreadSummary};
use crate::error::Error;
use crate::server::DynAPI;

#[derive(Serialize, Deserialize)]
pub struct SubmitParams {
    amount: i64,
    notes: Option<String>,
}

#[derive(Serialize, Deserialize)]
pub struct CounterParams {
    amount: i64,
}

pub async fn submit(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(ride_id): Path<Uuid>,
    Json(params): Json<SubmitParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api
        .submit_bid(user, ride_id, params.amount, params.notes)
        .await?;

    Ok(bid.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(bid_id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.find_bid(user, bid_id).await?;

    Ok(bid.into())
}

pub async fn counter(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(bid_id): Path<Uuid>,
    Json(params): Json<CounterParams>,
) -> Result<Json<Bid>, Error> {
    let bid = api.counter_bid(user, bid_id, params.amount).await?;

    Ok(bid.into())
}

pub async fn accept(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(bid_id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.accept_bid(user, bid_id).await?;

    Ok(ride.into())
}

pub async fn withdraw(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(bid_id): Path<Uuid>,
) -> Result<Json<Bid>, Error> {
    let bid = api.withdraw_bid(user, bid_id).await?;

    Ok(bid.into())
}

pub async fn list_for_ride(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_ride_bids(user, ride_id).await?;

    Ok(bids.into())
}

pub async fn list_for_driver(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(driver_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let bids = api.list_driver_bids(user, driver_id).await?;

    Ok(bids.into())
}

pub async fn open_threads(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<ThreadSummary>>, Error> {
    let threads = api.list_open_threads(user, ride_id).await?;

    Ok(threads.into())
}

pub async fn history(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(bid_id): Path<Uuid>,
) -> Result<Json<Vec<Bid>>, Error> {
    let chain = api.bid_history(user, bid_id).await?;

    Ok(chain.into())
}
