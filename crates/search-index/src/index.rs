//! Prefix-searchable token index.

mod prefix;
mod tokenize;

pub use prefix::{PrefixIndex, MAX_TOKEN_CHARS};
pub use tokenize::{prefixes, tokenize};
