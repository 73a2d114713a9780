//! Application services layer.

pub mod admin;
pub mod browse;
pub mod detail;
pub mod error;
pub mod gateways;
pub mod links;
pub mod listing;
pub mod notifications;
pub mod pagination;
pub mod preferences;
pub mod render;
pub mod repos;
pub mod session;
pub mod toast;

#[cfg(test)]
pub(crate) mod testing;
