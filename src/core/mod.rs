pub mod errors;

pub use errors::AnkipipeError;
