// RAG forwarding: upstream client and the per-request pipeline

pub mod client;
pub mod pipeline;

pub use client::RagClient;
pub use pipeline::{PipelineOutcome, ProxyPipeline};
