mod bid;
mod ride;
mod thread;

pub use bid::{Bid, Party, Status as BidStatus};
pub use ride::{Ride, Status as RideStatus};
pub use thread::ThreadSummary;
