pub mod route;
pub mod series;
pub mod types;

pub use route::*;
pub use series::*;
pub use types::*;
