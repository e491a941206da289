use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Bid;

/// One driver's negotiation with the rider, collapsed to its current round.
///
/// Computed server-side from the ledger rows so clients never re-derive
/// "the latest bid" themselves.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub ride_id: Uuid,
    pub driver_id: Uuid,
    pub current: Bid,
    pub rounds: u32,
    pub open: bool,
}

impl ThreadSummary {
    /// Collapse a ride's ledger rows into one summary per thread.
    ///
    /// The current row of a thread is the childless one, which by
    /// construction carries the highest round number; `created_at` breaks
    /// ties defensively should two rows ever share a round.
    pub fn collapse(bids: &[Bid]) -> Vec<ThreadSummary> {
        let mut summaries: Vec<ThreadSummary> = Vec::new();

        for bid in bids {
            match summaries
                .iter_mut()
                .find(|summary| summary.driver_id == bid.driver_id)
            {
                Some(summary) => {
                    if (bid.round, bid.created_at)
                        > (summary.current.round, summary.current.created_at)
                    {
                        summary.current = bid.clone();
                        summary.rounds = bid.round;
                        summary.open = bid.is_open();
                    }
                }
                None => summaries.push(ThreadSummary {
                    ride_id: bid.ride_id,
                    driver_id: bid.driver_id,
                    current: bid.clone(),
                    rounds: bid.round,
                    open: bid.is_open(),
                }),
            }
        }

        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Party;

    #[test]
    fn collapse_keeps_one_row_per_driver() {
        let ride_id = Uuid::new_v4();
        let d1 = Uuid::new_v4();
        let d2 = Uuid::new_v4();

        let mut d1_root = Bid::new(ride_id, d1, 5000, None).unwrap();
        let d1_counter = d1_root.counter(4500, Party::Rider, 4).unwrap();
        let d2_root = Bid::new(ride_id, d2, 5500, None).unwrap();

        let rows = vec![d1_root, d1_counter.clone(), d2_root.clone()];
        let mut summaries = ThreadSummary::collapse(&rows);
        summaries.sort_by_key(|summary| summary.rounds);

        assert_eq!(summaries.len(), 2);

        assert_eq!(summaries[0].driver_id, d2);
        assert_eq!(summaries[0].current.id, d2_root.id);
        assert!(summaries[0].open);

        assert_eq!(summaries[1].driver_id, d1);
        assert_eq!(summaries[1].current.id, d1_counter.id);
        assert_eq!(summaries[1].rounds, 1);
        assert!(summaries[1].open);
    }

    #[test]
    fn closed_threads_collapse_as_closed() {
        let ride_id = Uuid::new_v4();
        let mut root = Bid::new(ride_id, Uuid::new_v4(), 5000, None).unwrap();
        root.withdraw().unwrap();

        let summaries = ThreadSummary::collapse(&[root]);

        assert_eq!(summaries.len(), 1);
        assert!(!summaries[0].open);
    }
}
