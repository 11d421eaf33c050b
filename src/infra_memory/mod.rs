//! Process-local implementations of every storage port, selected with
//! `store.backend = "memory"`.

mod board;
mod media_store;
mod token_store;
mod ttl;
mod verification_store;

pub use board::*;
pub use media_store::*;
pub use token_store::*;
pub use verification_store::*;
