// Tee-Time Inventory

pub mod handlers;
pub mod models;
pub mod service;

pub use models::{slot_id, Course, SlotStatus, TeeTimeSlot, TeeTimeView, DEFAULT_MAX_PLAYERS};
pub use service::{time_block_reason, TeeTimeInventory};
