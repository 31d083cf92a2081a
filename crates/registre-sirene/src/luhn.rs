//! Luhn check digits and uniform sampling of valid SIRENs

use rand::Rng;
use rand::seq::SliceRandom;

/// Invalid sampling request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    /// Bounds are not 9-digit numbers, or start > end
    Bounds { start: u32, end: u32 },
    /// More SIRENs requested than valid ones exist in the range
    TooMany { requested: usize, available: usize },
}

impl std::fmt::Display for SampleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounds { start, end } => write!(
                f,
                "range [{start}, {end}] must be 9-digit numbers with start <= end"
            ),
            Self::TooMany {
                requested,
                available,
            } => write!(
                f,
                "{requested} SIRENs requested but only {available} valid ones in range"
            ),
        }
    }
}

impl std::error::Error for SampleError {}

/// Luhn check digit for an 8-digit prefix.
///
/// The rightmost prefix digit is doubled, since the check digit goes to its right.
pub fn check_digit(prefix8: &str) -> Option<u8> {
    if prefix8.len() != 8 || !prefix8.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut total = 0u32;
    for (i, b) in prefix8.bytes().rev().enumerate() {
        let mut d = u32::from(b - b'0');
        if i % 2 == 0 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        total += d;
    }
    Some(((10 - total % 10) % 10) as u8)
}

/// Nine digits whose last one is the Luhn check digit of the first eight
pub fn passes_luhn(siren: &str) -> bool {
    if !registre_core::is_valid_siren(siren) {
        return false;
    }
    let (prefix, last) = siren.split_at(8);
    check_digit(prefix).is_some_and(|d| last.as_bytes()[0] - b'0' == d)
}

/// The valid SIREN with the given 8-digit prefix
pub fn siren_from_prefix(prefix8: u32) -> u32 {
    let s8 = format!("{prefix8:08}");
    prefix8 * 10 + u32::from(check_digit(&s8).unwrap_or(0))
}

pub fn format_siren(siren: u32) -> String {
    format!("{siren:09}")
}

fn is_nine_digits(n: u32) -> bool {
    (100_000_000..=999_999_999).contains(&n)
}

/// Every 8-digit prefix yields exactly one valid SIREN; only the two edge
/// prefixes can fall outside the range.
fn available_in_range(start: u32, end: u32) -> usize {
    let (lo, hi) = (start / 10, end / 10);
    let in_range = |p: u32| usize::from((start..=end).contains(&siren_from_prefix(p)));
    if lo == hi {
        return in_range(lo);
    }
    (hi - lo - 1) as usize + in_range(lo) + in_range(hi)
}

/// Draw `k` distinct valid SIRENs uniformly from `[start, end]`.
///
/// Prefixes are drawn uniformly and rejected when the resulting SIREN
/// falls outside the range. When `k` is a large share of what is available
/// the whole range is enumerated and shuffled instead.
pub fn sample_valid_sirens<R: Rng + ?Sized>(
    start: u32,
    end: u32,
    k: usize,
    rng: &mut R,
) -> Result<Vec<u32>, SampleError> {
    if !is_nine_digits(start) || !is_nine_digits(end) || start > end {
        return Err(SampleError::Bounds { start, end });
    }
    let available = available_in_range(start, end);
    if k > available {
        return Err(SampleError::TooMany {
            requested: k,
            available,
        });
    }
    let (lo, hi) = (start / 10, end / 10);

    if k.saturating_mul(2) > available {
        let mut all: Vec<u32> = (lo..=hi)
            .map(siren_from_prefix)
            .filter(|s| (start..=end).contains(s))
            .collect();
        all.shuffle(rng);
        all.truncate(k);
        return Ok(all);
    }

    let mut seen = std::collections::HashSet::with_capacity(k);
    let mut out = Vec::with_capacity(k);
    while out.len() < k {
        let s = siren_from_prefix(rng.gen_range(lo..=hi));
        if (start..=end).contains(&s) && seen.insert(s) {
            out.push(s);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn known_check_digits() {
        // 552 100 554 and 732 829 320 are registered companies
        assert_eq!(check_digit("55210055"), Some(4));
        assert_eq!(check_digit("73282932"), Some(0));
        assert_eq!(check_digit("5521005"), None);
        assert_eq!(check_digit("5521005x"), None);
    }

    #[test]
    fn luhn_validation() {
        assert!(passes_luhn("552100554"));
        assert!(passes_luhn("443061841"));
        assert!(!passes_luhn("552100555"));
        assert!(!passes_luhn("55210055"));
    }

    #[test]
    fn prefix_roundtrip() {
        assert_eq!(siren_from_prefix(55_210_055), 552_100_554);
        assert_eq!(format_siren(siren_from_prefix(10_000_000)).len(), 9);
    }

    #[test]
    fn samples_are_valid_distinct_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let sample = sample_valid_sirens(821_000_000, 990_000_000, 500, &mut rng).unwrap();
        assert_eq!(sample.len(), 500);
        let distinct: std::collections::HashSet<_> = sample.iter().collect();
        assert_eq!(distinct.len(), 500);
        for s in sample {
            assert!((821_000_000..=990_000_000).contains(&s));
            assert!(passes_luhn(&format_siren(s)));
        }
    }

    #[test]
    fn small_range_enumerates_everything() {
        let mut rng = StdRng::seed_from_u64(1);
        // prefixes 55210050..=55210059 give ten valid SIRENs
        let all = sample_valid_sirens(552_100_500, 552_100_599, 10, &mut rng).unwrap();
        assert_eq!(all.len(), 10);
        assert!(all.contains(&552_100_554));
    }

    #[test]
    fn rejects_bad_requests() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            sample_valid_sirens(990_000_000, 821_000_000, 1, &mut rng),
            Err(SampleError::Bounds {
                start: 990_000_000,
                end: 821_000_000
            })
        );
        assert!(matches!(
            sample_valid_sirens(12_345, 990_000_000, 1, &mut rng),
            Err(SampleError::Bounds { .. })
        ));
        assert!(matches!(
            sample_valid_sirens(552_100_500, 552_100_599, 11, &mut rng),
            Err(SampleError::TooMany {
                requested: 11,
                available: 10
            })
        ));
    }

    #[test]
    fn same_seed_same_sample() {
        let a = sample_valid_sirens(821_000_000, 990_000_000, 20, &mut StdRng::seed_from_u64(3));
        let b = sample_valid_sirens(821_000_000, 990_000_000, 20, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
