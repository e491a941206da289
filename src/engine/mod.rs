mod bid_api;
mod helpers;
mod ride_api;
mod settlement;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use oso::Oso;
use sqlx::{Executor, Pool, Postgres};

use crate::{
    api::API,
    auth::authorizor,
    error::Error,
    external::PaymentGateway,
    notify::{Notifier, StateChange},
};

type Database = Postgres;

/// Negotiation policy knobs, env-overridable.
#[derive(Clone, Debug)]
pub struct Policy {
    /// Counter-offers allowed per thread; the round that would pass this
    /// limit lands as `max_reached` and closes the thread.
    pub max_rounds: u32,
    /// Upper bound on the settlement charge call.
    pub charge_timeout: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_rounds: 4,
            charge_timeout: Duration::from_secs(10),
        }
    }
}

impl Policy {
    pub fn from_env() -> Result<Self, Error> {
        let mut policy = Self::default();

        if let Ok(value) = env::var("MAX_NEGOTIATION_ROUNDS") {
            policy.max_rounds = value.parse().map_err(|_| Error::invalid_input_error())?;
        }

        if let Ok(value) = env::var("CHARGE_TIMEOUT_SECONDS") {
            let seconds: u64 = value.parse().map_err(|_| Error::invalid_input_error())?;
            policy.charge_timeout = Duration::from_secs(seconds);
        }

        Ok(policy)
    }
}

pub struct Engine {
    pool: Pool<Database>,
    authorizor: Oso,
    payments: Arc<dyn PaymentGateway + Send + Sync>,
    notifier: Arc<dyn Notifier + Send + Sync>,
    policy: Policy,
}

impl Engine {
    #[tracing::instrument(name = "Engine::new", skip_all)]
    pub async fn new(
        pool: Pool<Database>,
        payments: Arc<dyn PaymentGateway + Send + Sync>,
        notifier: Arc<dyn Notifier + Send + Sync>,
        policy: Policy,
    ) -> Result<Self, Error> {
        pool.execute(
            "CREATE TABLE IF NOT EXISTS rides (id UUID PRIMARY KEY, status VARCHAR NOT NULL, data JSONB NOT NULL)",
        )
        .await?;

        // bid ledger: header columns for querying, data for the entity;
        // rounds are inserts, status is the only in-place update
        pool.execute(
            "CREATE TABLE IF NOT EXISTS bids (id UUID PRIMARY KEY, ride_id UUID NOT NULL, driver_id UUID NOT NULL, parent_bid_id UUID, status VARCHAR NOT NULL, round INT4 NOT NULL, created_at TIMESTAMPTZ NOT NULL, data JSONB NOT NULL, CONSTRAINT fk_bid_ride FOREIGN KEY(ride_id) REFERENCES rides(id))",
        )
        .await?;

        pool.execute("CREATE INDEX IF NOT EXISTS bids_ride_idx ON bids (ride_id)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS bids_driver_idx ON bids (driver_id)")
            .await?;
        pool.execute("CREATE INDEX IF NOT EXISTS bids_parent_idx ON bids (parent_bid_id)")
            .await?;

        Ok(Self {
            pool,
            authorizor: authorizor::new(),
            payments,
            notifier,
            policy,
        })
    }
}

impl Engine {
    pub fn authorize<Actor, Action, Resource>(
        &self,
        actor: Actor,
        action: Action,
        resource: Resource,
    ) -> Result<(), Error>
    where
        Actor: oso::ToPolar,
        Action: oso::ToPolar,
        Resource: oso::ToPolar,
    {
        if self.authorizor.is_allowed(actor, action, resource)? {
            return Ok(());
        }

        Err(Error::unauthorized_error())
    }

    /// Delivery problems never fail the operation that produced the event.
    pub(crate) async fn emit(&self, event: StateChange) {
        if let Err(err) = self.notifier.on_state_change(event).await {
            tracing::warn!("failed to fan out state change: {:?}", err);
        }
    }
}

impl API for Engine {}
