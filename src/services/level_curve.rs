//! XP level curve.
//!
//! Level 1 starts at 0 XP. Advancing from level `L` to `L + 1` costs `250 + 50 * (L - 1)` XP, so
//! the cumulative threshold for level `L` with `n = L - 1` is `25n² + 225n`.

use crate::models::domain::LevelProgress;

pub const BASE_LEVEL_COST: u64 = 250;
pub const LEVEL_COST_STEP: u64 = 50;

/// XP needed to go from `level` to `level + 1`.
pub fn level_cost(level: u32) -> u64 {
    BASE_LEVEL_COST + LEVEL_COST_STEP * u64::from(level.saturating_sub(1))
}

/// Total XP at which `level` is reached.
pub fn cumulative_threshold(level: u32) -> u64 {
    let n = u64::from(level.saturating_sub(1));
    25 * n * n + 225 * n
}

/// Walks the curve one level at a time.
pub fn level_for_xp(xp: u64) -> LevelProgress {
    let mut level = 1;
    let mut need = BASE_LEVEL_COST;
    let mut remaining = xp;

    while remaining >= need {
        remaining -= need;
        level += 1;
        need += LEVEL_COST_STEP;
    }

    LevelProgress {
        level,
        xp_into_level: remaining,
        xp_for_next_level: need,
        xp_to_next_level: need - remaining,
    }
}

/// Same result as [`level_for_xp`] in constant time, by solving `25n² + 225n <= xp` for `n`.
pub fn level_for_xp_closed_form(xp: u64) -> LevelProgress {
    let estimate = ((225.0_f64 * 225.0 + 100.0 * xp as f64).sqrt() - 225.0) / 50.0;
    let mut n = estimate.max(0.0).floor() as u64;

    // Float rounding can leave the estimate one step off either way.
    while n > 0 && 25 * n * n + 225 * n > xp {
        n -= 1;
    }
    while 25 * (n + 1) * (n + 1) + 225 * (n + 1) <= xp {
        n += 1;
    }

    let level = (n + 1) as u32;
    let into = xp - cumulative_threshold(level);
    let need = level_cost(level);

    LevelProgress {
        level,
        xp_into_level: into,
        xp_for_next_level: need,
        xp_to_next_level: need - into,
    }
}
