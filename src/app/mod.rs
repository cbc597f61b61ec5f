mod application;
mod event;

pub use application::*;
pub use event::*;
