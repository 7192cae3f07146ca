//! Minimal chess knowledge needed to follow a remote game.
//!
//! cozy-chess types stay internal; callers work with [`Side`] and
//! [`FenSummary`].

pub mod fen;
pub mod side;

pub use fen::{summarize_fen, FenError, FenSummary};
pub use side::Side;
