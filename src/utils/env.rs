// src/utils/env.rs
use log::{debug, info};

/// Files consulted in order. Variables already present in the process
/// environment win, and an earlier file wins over a later one.
const ENV_FILES: [&str; 2] = [".env.local", ".env"];

pub fn load_env() {
    for file in ENV_FILES {
        match dotenv::from_filename(file) {
            Ok(path) => info!("Loaded environment variables from {}", path.display()),
            Err(e) => debug!("No environment file {} loaded: {}", file, e),
        }
    }
}
