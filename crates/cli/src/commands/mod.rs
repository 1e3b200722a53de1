pub mod analyze;
pub mod compare;
pub mod parse;

pub use analyze::*;
pub use compare::*;
pub use parse::*;
