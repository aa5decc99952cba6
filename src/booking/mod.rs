// Booking Transaction Coordinator and the transactional store behind it

pub mod coordinator;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use coordinator::BookingCoordinator;
pub use error::{BookingError, BookingResult};
pub use memory::InMemoryBookingStore;
pub use models::{Booking, BookingReceipt, Customer, CustomerProfile, ReservationRequest};
pub use postgres::PgBookingStore;
pub use store::{BookingStore, BookingTransaction, StoreError};
