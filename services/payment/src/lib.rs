//! The payment participant: per-client balance, debited by
//! `payment.check`, credited by `payment.check_cancel`, with
//! `payment.revert_cancel` undoing the most recent cancel credit
//! (spec.md §4.2).

mod handler;
mod ledger;

pub use handler::{CheckCancelHandler, CheckHandler, RevertCancelHandler};
pub use ledger::{PaymentError, PaymentLedger, PaymentResult};
