//! The delivery model between the session task and the application:
//! a lazy sequence of objects per subscription, and a lazy sequence of
//! payload chunks per object.

mod object;
mod track;

pub use object::*;
pub use track::*;
