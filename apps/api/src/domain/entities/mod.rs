pub mod money;
pub mod payment;
pub mod payment_kind;
pub mod payment_status;
pub mod property;
pub mod user;
