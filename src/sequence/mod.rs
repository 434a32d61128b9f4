//! Ordered notification of concurrently running async work.
//!
//! A [`Sequencer`] starts every submitted task immediately but hands results
//! back in submission order, so state mutations driven by those results are
//! applied deterministically regardless of which fetch finishes first.

mod sequencer;
mod ticket;

#[cfg(target_arch = "wasm32")]
mod spawn;

pub use sequencer::{Ready, Sequencer};
pub use ticket::Ticket;

#[cfg(target_arch = "wasm32")]
pub use spawn::WasmSpawner;
