pub mod invitation;
pub mod user;
pub mod webhook;

pub use invitation::*;
pub use user::*;
pub use webhook::*;
