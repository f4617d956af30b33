// One-time codes: issuance, delivery, verification and housekeeping.

pub mod code;
pub mod handlers;
pub mod machine;
pub mod service;
pub mod store;
