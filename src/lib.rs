pub mod error;
pub mod matching;
pub mod models;
pub mod nspd;
pub mod utils;
