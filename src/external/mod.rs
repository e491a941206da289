pub mod payments;

pub use payments::{ChargeOutcome, HttpPaymentGateway, PaymentGateway};
