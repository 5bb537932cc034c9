//! Tempo matching between heart rate and track bpm
//!
//! Candidates whose tempo is closest to the target win. On an exact tie
//! between a slower and a faster candidate only the faster one(s) are kept.

use rand::seq::SliceRandom;
use rand::Rng;

/// Indices of the candidates closest to `target`
///
/// Signed distances are `target - candidate`. With `m` the smallest absolute
/// distance, the chosen distance is `-m` when some candidate sits exactly `m`
/// above the target, and `m` otherwise. Returns every index at the chosen
/// distance, in candidate order. Empty input yields an empty result.
pub fn nearest_match(target: u32, candidates: &[u32]) -> Vec<usize> {
    let distances: Vec<i64> = candidates
        .iter()
        .map(|&bpm| target as i64 - bpm as i64)
        .collect();

    let Some(min_distance) = distances.iter().map(|d| d.abs()).min() else {
        return Vec::new();
    };

    let chosen = if distances.contains(&-min_distance) {
        -min_distance
    } else {
        min_distance
    };

    distances
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d == chosen)
        .map(|(i, _)| i)
        .collect()
}

/// Pick one of the nearest candidates uniformly at random
pub fn choose_nearest<R: Rng + ?Sized>(target: u32, candidates: &[u32], rng: &mut R) -> Option<usize> {
    nearest_match(target, candidates).choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use test_case::test_case;

    #[test_case(75, &[60, 70, 80], &[2] ; "faster candidate wins a tie")]
    #[test_case(75, &[70, 80], &[1] ; "two way tie")]
    #[test_case(75, &[70], &[0] ; "only slower candidate")]
    #[test_case(75, &[75, 90], &[0] ; "exact match")]
    #[test_case(60, &[64, 56, 64], &[0, 2] ; "duplicates above target")]
    #[test_case(60, &[52, 55, 55], &[1, 2] ; "duplicates below target")]
    #[test_case(75, &[], &[] ; "no candidates")]
    fn test_nearest_match(target: u32, candidates: &[u32], expected: &[usize]) {
        assert_eq!(nearest_match(target, candidates), expected.to_vec());
    }

    #[test]
    fn test_choose_nearest_only_returns_nearest() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = [64, 56, 64, 100];
        for _ in 0..50 {
            let picked = choose_nearest(60, &candidates, &mut rng).unwrap();
            assert!(picked == 0 || picked == 2);
        }
    }

    #[test]
    fn test_choose_nearest_reaches_every_tied_candidate() {
        let mut rng = StdRng::seed_from_u64(11);
        let candidates = [80, 80, 80];
        let mut seen = [false; 3];
        for _ in 0..100 {
            seen[choose_nearest(75, &candidates, &mut rng).unwrap()] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_choose_nearest_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(choose_nearest(75, &[], &mut rng), None);
    }
}
