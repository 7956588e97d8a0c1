pub mod aggregator;
pub mod config;
pub mod content;
pub mod model;
pub mod render;
pub mod settings;
pub mod sources;
pub mod storage;
pub mod util;
