pub mod batch;
pub mod cli;
pub mod config;
pub mod domain_utils;
pub mod export;
pub mod grouping;
pub mod hash_store;
pub mod http;
pub mod image_check;
pub mod logger;
pub mod logo_chain;
pub mod pipeline;
pub mod probe;

pub use grouping::LogoGroup;
pub use hash_store::{HashStore, PerceptualHash};
pub use pipeline::{FetchReport, LogoPipeline};
