//! Prime-factor field scrambler.
//!
//! Redistributes the values already observed in a set of columns across the
//! rows of a table, breaking row-level correlation between those columns
//! without introducing values that were never there.

pub mod error;
pub mod primes;
pub mod request;
pub mod scrambler;
mod statements;

pub use error::ScrambleError;
pub use primes::{MAX_PRIME, PRIMES, get_prime_after, get_prime_factors};
pub use request::{ScrambleReport, ScrambleRequest};
pub use scrambler::{Scrambler, combination_indexes};
