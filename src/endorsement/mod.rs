//! Endorsement domain module
//!
//! Models, validation, and proportional loss-absorption on default.

pub mod model;
mod service;

pub use model::{Endorsement, EndorseRequest, RiskShareOutcome, RiskShareStatus};
pub use service::EndorsementManager;
