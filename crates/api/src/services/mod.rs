//! Business logic that spans repositories or talks to the outside world.
//!
//! - `auth` - password hashing and JWT issuance/verification
//! - `checkout` - the order placement transaction
//! - `notifier` - the in-process notification fan-out hub
//! - `payment` - payment gateway adapter and webhook signatures

pub mod auth;
pub mod checkout;
pub mod notifier;
pub mod payment;
