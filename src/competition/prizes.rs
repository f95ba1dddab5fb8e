//! Tiered prize-pool split
//!
//! Integer arithmetic throughout: the floor comes from integer
//! division and the last paid position absorbs the rounding remainder,
//! so the split always sums to the pool exactly - no token is lost or
//! minted by rounding.

/// Split a prize pool across the top entries.
///
/// - 1 entry: the whole pool.
/// - 2 entries: 67% (floored) and the exact remainder.
/// - 3 or more entries: 50% and 30% (each floored), remainder to
///   third. Only the top 3 are ever paid regardless of entry count.
///
/// Returns one prize per paid position, first to last. Empty for an
/// empty competition.
pub fn split_prize_pool(pool: i64, entry_count: usize) -> Vec<i64> {
    match entry_count {
        0 => Vec::new(),
        1 => vec![pool],
        2 => {
            let first = pool * 67 / 100;
            vec![first, pool - first]
        }
        _ => {
            let first = pool * 50 / 100;
            let second = pool * 30 / 100;
            vec![first, second, pool - first - second]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_entry_takes_the_pool() {
        assert_eq!(split_prize_pool(50, 1), vec![50]);
        assert_eq!(split_prize_pool(0, 1), vec![0]);
    }

    #[test]
    fn test_two_entry_split() {
        assert_eq!(split_prize_pool(100, 2), vec![67, 33]);
        assert_eq!(split_prize_pool(10, 2), vec![6, 4]);
    }

    #[test]
    fn test_three_entry_split() {
        assert_eq!(split_prize_pool(300, 3), vec![150, 90, 60]);
        assert_eq!(split_prize_pool(100, 3), vec![50, 30, 20]);
    }

    #[test]
    fn test_only_top_three_paid() {
        assert_eq!(split_prize_pool(300, 7), vec![150, 90, 60]);
    }

    #[test]
    fn test_remainder_goes_to_last_position() {
        // 101 * 0.67 = 67.67 -> 67, second absorbs 34
        assert_eq!(split_prize_pool(101, 2), vec![67, 34]);
        // 103: 51 + 30, third absorbs 22
        assert_eq!(split_prize_pool(103, 3), vec![51, 30, 22]);
    }

    #[test]
    fn test_split_always_sums_to_pool() {
        for pool in [0i64, 1, 7, 10, 33, 99, 100, 101, 250, 999, 12345] {
            for entries in 1..=6usize {
                let prizes = split_prize_pool(pool, entries);
                assert_eq!(
                    prizes.iter().sum::<i64>(),
                    pool,
                    "pool {} entries {}",
                    pool,
                    entries
                );
            }
        }
    }
}
