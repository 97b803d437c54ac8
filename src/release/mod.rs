pub mod aggregator;
pub mod matrix;
pub mod pipeline;
pub mod publisher;
pub mod registry;
pub mod repo_gate;
pub mod tagger;
pub mod trigger;
pub mod version_store;
