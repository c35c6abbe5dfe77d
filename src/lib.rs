pub mod aggregation;
pub mod chart;
pub mod config;
pub mod http_client;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod logos;
pub mod partition;
pub mod partitioner;
pub mod pipeline;
pub mod player_report;
pub mod records;
pub mod report;
pub mod snapshot;
pub mod store;
