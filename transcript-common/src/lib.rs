pub mod credentials;
pub mod event;
pub mod extract;
pub mod metrics;
pub mod row;
pub mod sheets;
pub mod sink;
