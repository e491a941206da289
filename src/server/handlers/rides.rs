use axum::extract::{Extension, Json, Path};
use uuid::Uuid;

use crate::auth::User;
use crate::entities::Ride;
use crate::error::Error;
use crate::server::DynAPI;

pub async fn create(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
) -> Result<Json<Ride>, Error> {
    let ride = api.create_ride(user).await?;

    Ok(ride.into())
}

pub async fn find(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.find_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn cancel(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.cancel_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn hold(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.hold_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn reopen(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.reopen_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn en_route(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.mark_en_route(user, id).await?;

    Ok(ride.into())
}

pub async fn arrived(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.mark_arrived(user, id).await?;

    Ok(ride.into())
}

pub async fn begin(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.begin_ride(user, id).await?;

    Ok(ride.into())
}

pub async fn complete(
    Extension(api): Extension<DynAPI>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, Error> {
    let ride = api.complete_ride(user, id).await?;

    Ok(ride.into())
}
