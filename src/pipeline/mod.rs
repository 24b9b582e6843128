//! Pipeline stages for contract review.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the pdfium or provider backend can be swapped behind its trait.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm (analysis) ──▶ llm (negotiation)
//! (bytes)   (pdfium)    (1st call)          (2nd call)
//!                 ╰────── postprocess ──────╯
//! ```
//!
//! 1. [`input`]: hold the uploaded bytes, or read them from disk under a size cap
//! 2. [`extract`]: PDF → text; runs in `spawn_blocking` because pdfium is
//!    not async-safe
//! 3. [`llm`]: one prompt in, one completion out, with timeout and
//!    retry; the only stage with network I/O
//! 4. [`postprocess`]: deterministic cleanup of extracted text and of both
//!    completions

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
