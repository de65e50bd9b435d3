pub mod types;
pub mod helpers;
