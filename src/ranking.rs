//! Dense rank assignment for season leaderboards.
//!
//! Both storage backends call into this module from inside their
//! per-season critical section, so the ordering rule lives in exactly one
//! place. The contract: ranks form a dense permutation 1..N, ties on score
//! receive distinct sequential ranks, and repeated runs over unchanged
//! input yield identical output.

use crate::models::LeaderboardEntry;

/// Sorts a season's entries into leaderboard order and assigns 1-based
/// dense ranks in place.
///
/// Primary key: score descending. Ties are broken by entry creation time
/// ascending, then entry id ascending, which makes the assignment
/// deterministic across recomputes.
pub fn assign_ranks(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.created_date.cmp(&b.created_date))
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });

    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx as i32 + 1;
    }
}

/// Returns true when `candidate` should replace `stored` under the
/// monotonic merge rule (strictly greater wins, anything else is a no-op).
pub fn improves(stored: i64, candidate: i64) -> bool {
    candidate > stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: i64, score: i64, created_offset_secs: i64) -> LeaderboardEntry {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        LeaderboardEntry {
            entry_id: id,
            player_id: format!("PLR0000000{}", id),
            season_id: 1,
            score,
            tower_level: 0,
            rank: 0,
            created_date: base + Duration::seconds(created_offset_secs),
            updated_date: base,
        }
    }

    #[test]
    fn ranks_are_dense_permutation() {
        let mut entries = vec![
            entry(1, 500, 0),
            entry(2, 900, 1),
            entry(3, 100, 2),
            entry(4, 700, 3),
        ];
        assign_ranks(&mut entries);

        let mut ranks: Vec<i32> = entries.iter().map(|e| e.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert_eq!(entries[0].score, 900);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[3].score, 100);
        assert_eq!(entries[3].rank, 4);
    }

    #[test]
    fn ties_get_distinct_ranks_by_creation_order() {
        let mut entries = vec![entry(2, 100, 5), entry(1, 100, 0), entry(3, 80, 9)];
        assign_ranks(&mut entries);

        // The earlier-created entry wins the tie.
        assert_eq!(entries[0].entry_id, 1);
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].entry_id, 2);
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[2].rank, 3);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut first = vec![entry(1, 300, 0), entry(2, 300, 0), entry(3, 300, 1)];
        assign_ranks(&mut first);

        // Same inputs shuffled differently must produce the same ranks.
        let mut second = vec![entry(3, 300, 1), entry(1, 300, 0), entry(2, 300, 0)];
        assign_ranks(&mut second);

        let by_id = |entries: &[LeaderboardEntry], id: i64| {
            entries.iter().find(|e| e.entry_id == id).unwrap().rank
        };
        for id in [1, 2, 3] {
            assert_eq!(by_id(&first, id), by_id(&second, id));
        }
        // Equal created_date falls through to entry id.
        assert_eq!(by_id(&first, 1), 1);
        assert_eq!(by_id(&first, 2), 2);
    }

    #[test]
    fn empty_board_is_fine() {
        let mut entries: Vec<LeaderboardEntry> = Vec::new();
        assign_ranks(&mut entries);
        assert!(entries.is_empty());
    }

    #[test]
    fn monotonic_merge_rule() {
        assert!(improves(50, 51));
        assert!(!improves(50, 50));
        assert!(!improves(50, 30));
    }
}
