//! Cross-chain messenger

mod model;
mod service;

pub use model::{CcmReceipt, CrossChainAction, CrossChainMessage, MessageStatus};
pub use service::{CrossChainMessenger, GatewayMessenger, RetryPolicy};
