pub mod accounts;
pub mod drugs;
pub mod health;
pub mod metrics;
pub mod orders;
