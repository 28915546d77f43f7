pub mod builder;
pub mod constraints;
pub mod solver;
pub mod types;

pub use builder::build_model;
pub use constraints::*;
pub use solver::*;
pub use types::*;
