//! Admission control for report generation.
//!
//! Bounds the number of report tasks running at once, independently of the
//! database pool size, so aggregation and workbook rendering cannot exhaust
//! CPU or memory.

pub mod controller;
pub mod error;
pub mod ticket;


pub use controller::{AdmissionController, AdmissionStatus, DEFAULT_MAX_CONCURRENT};
pub use error::AdmissionError;
pub use ticket::{AdmissionTicket, TicketState};
