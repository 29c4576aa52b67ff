pub mod address;
pub mod bundle;
pub mod cadastral;
pub mod db;
pub mod district_check;
pub mod manager;
pub mod resolver;
pub mod settlement;
