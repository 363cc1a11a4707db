// Safety Gate: PII guard service client

pub mod client;

pub use client::PiiGuardClient;
