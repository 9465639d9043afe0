pub mod cli;
pub mod config;
pub mod connection;
pub mod pipeline;
pub mod product;
pub mod settings;
pub mod source;
pub mod transport;
