use super::helpers::{fetch_bid_for_update, fetch_ride_for_update, update_bid, update_ride};
use super::Engine;

use std::time::Duration;

use sqlx::Acquire;
use uuid::Uuid;

use crate::{
    entities::{Bid, Ride},
    error::Error,
    external::{ChargeOutcome, PaymentGateway},
    notify::{ChangeKind, StateChange},
};

/// The settlement charge is the engine's one blocking external call, so it
/// runs under a hard time limit; a timeout or transport failure settles
/// exactly like a decline.
pub async fn charge_with_timeout(
    gateway: &(dyn PaymentGateway + Send + Sync),
    rider_id: Uuid,
    amount_cents: i64,
    ride_id: Uuid,
    limit: Duration,
) -> ChargeOutcome {
    match tokio::time::timeout(limit, gateway.charge_rider(rider_id, amount_cents, ride_id)).await
    {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(err)) => {
            tracing::warn!("payment collaborator failed: {:?}", err);

            ChargeOutcome::Declined {
                reason: "payment collaborator unavailable".into(),
            }
        }
        Err(_) => {
            tracing::warn!("charge timed out after {:?}", limit);

            ChargeOutcome::Declined {
                reason: "charge timed out".into(),
            }
        }
    }
}

impl Engine {
    /// Reserve-then-charge-then-compensate. The ride is already committed
    /// as scheduled when this runs: approval marks it paid, anything else
    /// unwinds the assignment and reopens the winning bid for a response.
    #[tracing::instrument(skip(self))]
    pub(crate) async fn settle(&self, ride: Ride, bid: Bid, actor: Uuid) -> Result<Ride, Error> {
        let amount = ride.final_price.ok_or_else(|| Error::unexpected_error())?;

        let outcome = charge_with_timeout(
            self.payments.as_ref(),
            ride.rider_id,
            amount,
            ride.id,
            self.policy.charge_timeout,
        )
        .await;

        let mut conn = self.pool.acquire().await?;
        let mut tx = conn.begin().await?;

        let mut ride = fetch_ride_for_update(&mut tx, &ride.id).await?;

        match outcome {
            ChargeOutcome::Approved { charge_id } => {
                ride.mark_paid(charge_id)?;

                update_ride(&mut tx, &ride).await?;

                tx.commit().await?;

                self.emit(StateChange::new(
                    ride.id,
                    Some(bid.id),
                    ChangeKind::RidePaid,
                    actor,
                ))
                .await;

                Ok(ride)
            }
            ChargeOutcome::Declined { reason } => {
                tracing::warn!("charge declined, unwinding acceptance: {}", reason);

                ride.revert_to_bidding()?;

                let mut bid = fetch_bid_for_update(&mut tx, &bid.id).await?;
                bid.reopen()?;

                update_bid(&mut tx, &bid).await?;
                update_ride(&mut tx, &ride).await?;

                tx.commit().await?;

                self.emit(StateChange::new(
                    ride.id,
                    Some(bid.id),
                    ChangeKind::PaymentFailed,
                    actor,
                ))
                .await;

                Err(Error::payment_failed_error())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_test::block_on;

    struct ApprovingGateway;

    #[async_trait]
    impl PaymentGateway for ApprovingGateway {
        async fn charge_rider(
            &self,
            _rider_id: Uuid,
            _amount_cents: i64,
            _ride_id: Uuid,
        ) -> Result<ChargeOutcome, Error> {
            Ok(ChargeOutcome::Approved {
                charge_id: "ch_test".into(),
            })
        }
    }

    struct StallingGateway;

    #[async_trait]
    impl PaymentGateway for StallingGateway {
        async fn charge_rider(
            &self,
            _rider_id: Uuid,
            _amount_cents: i64,
            _ride_id: Uuid,
        ) -> Result<ChargeOutcome, Error> {
            tokio::time::sleep(Duration::from_secs(5)).await;

            Ok(ChargeOutcome::Approved {
                charge_id: "ch_late".into(),
            })
        }
    }

    struct UnreachableGateway;

    #[async_trait]
    impl PaymentGateway for UnreachableGateway {
        async fn charge_rider(
            &self,
            _rider_id: Uuid,
            _amount_cents: i64,
            _ride_id: Uuid,
        ) -> Result<ChargeOutcome, Error> {
            Err(Error::upstream_error())
        }
    }

    #[test]
    fn approvals_pass_through() {
        let outcome = block_on(charge_with_timeout(
            &ApprovingGateway,
            Uuid::new_v4(),
            4500,
            Uuid::new_v4(),
            Duration::from_secs(1),
        ));

        assert!(matches!(outcome, ChargeOutcome::Approved { .. }));
    }

    #[test]
    fn slow_charges_settle_as_declines() {
        let outcome = block_on(charge_with_timeout(
            &StallingGateway,
            Uuid::new_v4(),
            4500,
            Uuid::new_v4(),
            Duration::from_millis(10),
        ));

        match outcome {
            ChargeOutcome::Declined { reason } => assert_eq!(reason, "charge timed out"),
            ChargeOutcome::Approved { .. } => panic!("timeout must not settle as approval"),
        }
    }

    #[test]
    fn transport_failures_settle_as_declines() {
        let outcome = block_on(charge_with_timeout(
            &UnreachableGateway,
            Uuid::new_v4(),
            4500,
            Uuid::new_v4(),
            Duration::from_secs(1),
        ));

        assert!(matches!(outcome, ChargeOutcome::Declined { .. }));
    }
}
