mod action;
mod control;
mod fabric;
mod routing;

pub use action::*;
pub use control::*;
pub use fabric::*;
pub use routing::*;
