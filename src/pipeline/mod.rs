//! Pipeline stages for batch conversion.
//!
//! Each submodule implements exactly one stage. Keeping stages separate
//! makes each independently testable and lets us swap implementations
//! (e.g. a different discovery walker) without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! filter ──▶ discover ──▶ plan ──▶ execute ──▶ rewrite
//! (eligibility) (walk)   (paths)  (chunks +    (link repair
//!                                  assets)      after renames)
//! ```
//!
//! 1. [`filter`]   — eligibility rules for directories, files, patterns,
//!    and content condition markers
//! 2. [`discover`] — bounded lexical walk producing the candidate list
//! 3. [`plan`]     — mirror/TOC-plan output mapping plus heading renames
//! 4. [`detect`]   — binary/oversize classification used by the executor
//! 5. [`execute`]  — chunked conversion with timeout, heartbeat, and
//!    per-task asset resolution ([`assets`])
//! 6. [`rewrite`]  — cross-reference repair once filenames changed

pub mod assets;
pub mod detect;
pub mod discover;
pub mod execute;
pub mod filter;
pub mod plan;
pub mod rewrite;
