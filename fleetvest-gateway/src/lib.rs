//! Inbound payment-confirmation gateway.
//!
//! Verifies provider signatures over the raw body, applies confirmed
//! deposits exactly once per reference, and queues unattributable money
//! for manual reconciliation.

mod handler;
mod payload;
mod server;
mod signature;

pub use handler::{Confirmation, PaymentConfirmationHandler};
pub use payload::{ChargeData, ProviderEvent, CHARGE_SUCCESS};
pub use server::{spawn_gateway, ShutdownSignal};
pub use signature::{sign, verify_signature, SIGNATURE_HEADER};
