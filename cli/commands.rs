pub mod chunks;
pub mod completion;
pub mod config;
pub mod generate;
pub mod scan;
