//! Core types shared by the pexconf crates: conference addresses and tracing setup.

pub mod address;
pub mod tracing;

pub use address::{AddressError, ConferenceAddress};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
