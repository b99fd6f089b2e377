//! # Call turn orchestration
//!
//! ```text
//! webhook ──→ CallController ──→ SessionStore (per-call lock)
//!                  │
//!                  ├─→ Extractor (speech turns only)
//!                  ├─→ dialogue policy ──→ Decision
//!                  ├─→ BookingSink (once, when a call is booked)
//!                  └─→ CallResponse ──→ markup renderer
//! ```
//!
//! Every controller operation returns a [`CallResponse`](crate::dialogue::CallResponse);
//! failures inside a turn are turned into an apology and a hangup.

mod booking;
mod controller;

pub use booking::{Booking, BookingSink, LogBookingSink};
pub use controller::{CallController, ControllerSettings};
