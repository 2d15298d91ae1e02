//! Word-overlap similarity between a ticket draft and recent tickets.
//!
//! Scoring is a Dice coefficient over lower-cased whitespace tokens, with
//! short tokens dropped as noise. Matches above a significance threshold are
//! ranked and summarized into hints for the person filling in the form.

mod engine;
mod suggestions;
mod tokens;

pub use engine::{Analysis, SimilarityEngine, SimilarityMatch};
pub use suggestions::Suggestion;
pub use tokens::{dice, tokenize};
