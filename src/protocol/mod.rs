//! Wire types of external authentication protocols

mod token_review;

pub use token_review::*;
