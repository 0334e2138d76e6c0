//! Chunk planning: splitting one table into offset/limit windows.
//!
//! Windows are read without ORDER BY, so chunk boundaries rely on the
//! source's default scan order staying stable for the duration of the sync.
//! Concurrent writes to the source table during a sync can shift rows across
//! boundaries.

/// Row count below which a table is read by a single worker.
pub const SMALL_TABLE_THRESHOLD: u64 = 1000;

/// One worker's share of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Row count the plan was computed from.
    pub row_count: u64,
    /// Number of workers the table was split across.
    pub workers: usize,
    /// Rows requested by this chunk.
    pub limit: u64,
    /// First row of this chunk.
    pub offset: u64,
}

/// Split `row_count` rows across at most `workers` chunks.
///
/// Small tables get one chunk with `limit = SMALL_TABLE_THRESHOLD`. Larger
/// tables get `limit = row_count / workers + 1` so the windows never
/// under-cover the table, and chunks whose offset would pass the row count
/// are not planned.
pub fn plan_chunks(row_count: u64, workers: usize) -> Vec<ChunkPlan> {
    if row_count < SMALL_TABLE_THRESHOLD {
        return vec![ChunkPlan {
            row_count,
            workers: 1,
            limit: SMALL_TABLE_THRESHOLD,
            offset: 0,
        }];
    }

    let workers = workers.max(1);
    let limit = row_count / workers as u64 + 1;

    (0..workers as u64)
        .map(|i| i * limit)
        .take_while(|offset| *offset <= row_count)
        .map(|offset| ChunkPlan {
            row_count,
            workers,
            limit,
            offset,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covers(plans: &[ChunkPlan], row_count: u64) -> bool {
        let mut ranges: Vec<(u64, u64)> = plans
            .iter()
            .map(|p| (p.offset, p.offset + p.limit))
            .collect();
        ranges.sort();
        let mut reached = 0;
        for (start, end) in ranges {
            if start > reached {
                return false;
            }
            reached = reached.max(end);
        }
        reached >= row_count
    }

    #[test]
    fn test_small_table_forced_to_one_chunk() {
        for rows in [0, 1, 999] {
            let plans = plan_chunks(rows, 6);
            assert_eq!(plans.len(), 1);
            assert_eq!(plans[0].limit, 1000);
            assert_eq!(plans[0].offset, 0);
            assert_eq!(plans[0].workers, 1);
        }
    }

    #[test]
    fn test_three_workers_over_2500_rows() {
        let plans = plan_chunks(2500, 3);
        let offsets: Vec<u64> = plans.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 834, 1668]);
        assert!(plans.iter().all(|p| p.limit == 834));
    }

    #[test]
    fn test_chunks_cover_table() {
        for rows in [1000, 1001, 2500, 7919, 100_000, 1_000_003] {
            for workers in 1..=8 {
                let plans = plan_chunks(rows, workers);
                assert!(covers(&plans, rows), "rows={} workers={}", rows, workers);
                assert!(plans.len() <= workers);
            }
        }
    }

    #[test]
    fn test_chunks_are_disjoint() {
        let plans = plan_chunks(10_000, 7);
        for pair in plans.windows(2) {
            assert_eq!(pair[0].offset + pair[0].limit, pair[1].offset);
        }
    }

    #[test]
    fn test_offsets_never_pass_row_count() {
        // More workers than rows per worker would need.
        let plans = plan_chunks(1000, 8);
        assert!(plans.iter().all(|p| p.offset <= 1000));
    }

    #[test]
    fn test_zero_workers_treated_as_one() {
        let plans = plan_chunks(5000, 0);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].limit, 5001);
    }
}
