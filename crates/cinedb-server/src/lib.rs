pub mod config;
pub mod error;
pub mod run;

pub use error::Result;
pub use run::{build_state, run};
