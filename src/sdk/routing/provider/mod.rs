pub mod ors;
pub mod types;

pub use ors::OrsProvider;
