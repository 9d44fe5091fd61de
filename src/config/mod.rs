mod seed_config;

pub use seed_config::{SEED_FILE_NAME, SeedConfig, SeedError};
