// Use cases layer: the session bridge and the operations it exposes.

pub mod bridge;
pub mod sign_in;
pub mod sign_out;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::{AuthSnapshot, SessionBridge};
