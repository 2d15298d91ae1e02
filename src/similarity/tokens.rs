//! Token sets and the overlap score between them.

use std::collections::HashSet;

/// Lower-cased whitespace tokens with at least `min_chars` characters.
pub fn tokenize(text: &str, min_chars: usize) -> HashSet<String> {
  text
    .split_whitespace()
    .map(str::to_lowercase)
    .filter(|token| token.chars().count() >= min_chars)
    .collect()
}

/// Dice coefficient `2|A∩B| / (|A|+|B|)`, in `[0, 1]`. Zero when either set is empty.
pub fn dice(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
  let shared = small.iter().filter(|token| large.contains(*token)).count();
  (2 * shared) as f64 / (a.len() + b.len()) as f64
}
