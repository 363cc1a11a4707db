// Library root for the JUNI proxy

pub mod api;
pub mod config;
pub mod core;
pub mod guard;
pub mod metrics;
pub mod proxy;
