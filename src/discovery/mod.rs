pub mod browser;
pub mod extract;
pub mod fetch;
pub mod pipeline;

// Re-export the entry points the rest of the crate wires together.
pub use browser::ChromeSessionFactory;
pub use fetch::LightFetcher;
pub use pipeline::DiscoveryPipeline;
