pub mod client;
pub mod geometry;
pub mod schemas;

pub use client::{detect_land_status, NspdClient, NspdConfig};
pub use schemas::{CadastralObject, NspdSearchResponse};
