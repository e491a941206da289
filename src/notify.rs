use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// One committed transition, as handed to the real-time delivery
/// collaborator. The engine emits exactly one event per transition and
/// never fails an operation over delivery problems.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateChange {
    pub ride_id: Uuid,
    pub bid_id: Option<Uuid>,
    pub kind: ChangeKind,
    pub actor: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    RideRequested,
    BidSubmitted,
    BidCountered,
    BidAccepted,
    BidRejected,
    BidWithdrawn,
    RideScheduled,
    RidePaid,
    PaymentFailed,
    RideCancelled,
    RideHeld,
    RideReopened,
    RideEnRoute,
    RideArrived,
    RideInProgress,
    RideCompleted,
}

impl StateChange {
    pub fn new(ride_id: Uuid, bid_id: Option<Uuid>, kind: ChangeKind, actor: Uuid) -> Self {
        Self {
            ride_id,
            bid_id,
            kind,
            actor,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait Notifier {
    async fn on_state_change(&self, event: StateChange) -> Result<(), Error>;
}

/// In-process fan-out: events land on an unbounded channel drained by the
/// push collaborator's connection layer.
pub struct ChannelNotifier {
    sender: Sender<StateChange>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, Receiver<StateChange>) {
        let (sender, receiver) = async_channel::unbounded();

        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn on_state_change(&self, event: StateChange) -> Result<(), Error> {
        self.sender
            .send(event)
            .await
            .map_err(|_| Error::upstream_error())
    }
}

/// Drops every event. Used where no delivery collaborator is attached.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn on_state_change(&self, _event: StateChange) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn channel_notifier_delivers_in_order() {
        let (notifier, events) = ChannelNotifier::new();
        let ride_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        block_on(async {
            notifier
                .on_state_change(StateChange::new(
                    ride_id,
                    None,
                    ChangeKind::RideRequested,
                    actor,
                ))
                .await
                .unwrap();
            notifier
                .on_state_change(StateChange::new(
                    ride_id,
                    Some(Uuid::new_v4()),
                    ChangeKind::BidSubmitted,
                    actor,
                ))
                .await
                .unwrap();

            let first = events.recv().await.unwrap();
            let second = events.recv().await.unwrap();

            assert!(matches!(first.kind, ChangeKind::RideRequested));
            assert!(matches!(second.kind, ChangeKind::BidSubmitted));
            assert_eq!(second.ride_id, ride_id);
        });
    }

    #[test]
    fn closed_channel_surfaces_an_error() {
        let (notifier, events) = ChannelNotifier::new();
        drop(events);

        let result = block_on(notifier.on_state_change(StateChange::new(
            Uuid::new_v4(),
            None,
            ChangeKind::RideRequested,
            Uuid::new_v4(),
        )));

        assert!(result.is_err());
    }
}
