//! Static prime table and the balanced factorization built on it.

use crate::error::ScrambleError;

/// Largest prime the scrambler can use as a factor.
pub const MAX_PRIME: u64 = 997;

/// Every prime up to [`MAX_PRIME`], ascending.
pub const PRIMES: [u64; 168] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37,
    41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223,
    227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281,
    283, 293, 307, 311, 313, 317, 331, 337, 347, 349, 353, 359,
    367, 373, 379, 383, 389, 397, 401, 409, 419, 421, 431, 433,
    439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593,
    599, 601, 607, 613, 617, 619, 631, 641, 643, 647, 653, 659,
    661, 673, 677, 683, 691, 701, 709, 719, 727, 733, 739, 743,
    751, 757, 761, 769, 773, 787, 797, 809, 811, 821, 823, 827,
    829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997,
];

/// Smallest prime strictly greater than `n`.
pub fn get_prime_after(n: u64) -> Result<u64, ScrambleError> {
    PRIMES
        .iter()
        .copied()
        .find(|prime| *prime > n)
        .ok_or(ScrambleError::NoPrimeFound { after: n })
}

/// `count` consecutive primes whose product is at least `product`.
///
/// The window starts at the integer `count`-th root of `product` (or the next
/// prime above it). When that window's product falls short it slides up one
/// prime at a time until it covers `product` or the table runs out.
pub fn get_prime_factors(count: usize, product: u64) -> Result<Vec<u64>, ScrambleError> {
    if count == 0 {
        return Err(ScrambleError::InvalidRequest(
            "at least one field is required".to_string(),
        ));
    }
    let degree = u32::try_from(count)
        .map_err(|_| ScrambleError::InvalidRequest(format!("{count} fields is too many")))?;

    let root = integer_root(product, degree);
    let mut start = PRIMES
        .iter()
        .position(|prime| *prime >= root)
        .ok_or(ScrambleError::NoPrimeFound { after: root })?;

    loop {
        let window = PRIMES
            .get(start..start + count)
            .ok_or(ScrambleError::NoPrimeFound { after: MAX_PRIME })?;
        if window_product(window) >= u128::from(product) {
            return Ok(window.to_vec());
        }
        tracing::debug!(
            event = "prime_window_shifted",
            count = count,
            product = product,
            from = window[0]
        );
        start += 1;
    }
}

fn window_product(window: &[u64]) -> u128 {
    window
        .iter()
        .fold(1u128, |acc, prime| acc.saturating_mul(u128::from(*prime)))
}

/// Largest `r` with `r^degree <= value`.
fn integer_root(value: u64, degree: u32) -> u64 {
    if degree == 1 || value < 2 {
        return value;
    }
    let mut root = (value as f64).powf(1.0 / f64::from(degree)) as u64;
    while exceeds(root, degree, value) {
        root -= 1;
    }
    while !exceeds(root + 1, degree, value) {
        root += 1;
    }
    root
}

fn exceeds(base: u64, degree: u32, limit: u64) -> bool {
    u128::from(base)
        .checked_pow(degree)
        .is_none_or(|power| power > u128::from(limit))
}
