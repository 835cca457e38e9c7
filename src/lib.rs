pub mod amount;
pub mod booking;
pub mod config;
pub mod csv;
pub mod model;
pub mod payment;
pub mod seed;
pub mod sim;
pub mod store;

pub use amount::Amount;
pub use booking::{BookingController, BookingError};
pub use model::{PaymentCard, PaymentRecord, Reservation, Session};
pub use payment::{ChargeOutcome, ChargeRequest, PaymentEngine, PaymentError};
pub use sim::{Operation, Simulator};
pub use store::{MemoryStore, Store, StoreError};
