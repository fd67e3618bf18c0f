//! Conversion pipeline stages.
//!
//! ```text
//! input ──▶ engine ──▶ assets ──▶ postprocess ──▶ sanitize
//! (.docx)   (raw HTML)  (src URLs)  (structure)    (allow-list + wrapper)
//! ```
//!
//! `input` and `engine` touch the outside world and are async. Everything
//! from `assets` onwards is a pure `&str → String` function and can run on
//! any thread without coordination.

pub mod assets;
pub mod classify;
pub mod engine;
pub mod input;
pub mod lists;
pub mod postprocess;
pub mod sanitize;
