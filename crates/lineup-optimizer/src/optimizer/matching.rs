// Exact maximum-weight slot assignment.
//
// Slots are rows and players are columns of a rectangular assignment problem
// solved with the Hungarian method (shortest augmenting paths with
// potentials, O(rows^2 * cols)). Every slot also gets access to a pool of
// "leave empty" columns, so a slot with no worthwhile player simply stays
// open instead of forcing an ineligible pairing.
//
// The objective is lexicographic:
//   1. number of required slots filled
//   2. starter score (sum over required slots)
//   3. number of optional slots filled
//   4. bench score
// Filling a required slot outranks any score difference: on a short pool a
// lineup that fills more required slots wins even if another lineup that
// leaves one open would total more points. Score only decides between
// lineups that fill the same number of required slots.
//
// Each level is folded into a single i128 edge weight with radixes wide
// enough that no combination of lower levels can outweigh one unit of a
// higher level. Scores enter as integer milli-points, so equality of two
// objectives is exact.

use tracing::trace;

use crate::error::LineupError;

use super::control::SolveControl;

/// Scale applied to fantasy points before they enter the integer objective.
pub const MILLI: f64 = 1000.0;

/// Largest score magnitude, in fantasy points, the objective encoding
/// supports. With weights bounded by this the composite stays inside `i128`
/// for templates of up to roughly two thousand slots.
pub const MAX_POINTS: f64 = 1.0e9;

/// Convert fantasy points to integer milli-points.
pub fn to_milli(points: f64) -> i64 {
    (points * MILLI).round() as i64
}

/// A constraint fixing what a slot holds before solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    Player(usize),
    Empty,
}

/// A solved assignment: `slots[s]` is the player index placed in slot `s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matching {
    pub slots: Vec<Option<usize>>,
    pub objective: i128,
}

impl Matching {
    /// Slot holding `player`, if any.
    pub fn slot_of(&self, player: usize) -> Option<usize> {
        self.slots.iter().position(|p| *p == Some(player))
    }
}

/// Weighted bipartite problem between roster slots and candidate players.
///
/// Players must be indexed in ascending identifier order; the tie-break in
/// [`AssignmentProblem::solve_canonical`] relies on it.
#[derive(Debug, Clone)]
pub struct AssignmentProblem {
    slot_ids: Vec<String>,
    required: Vec<bool>,
    /// `edges[s][p]` is the composite weight of placing player `p` in slot
    /// `s`, or `None` when the pairing is ineligible.
    edges: Vec<Vec<Option<i128>>>,
    num_players: usize,
}

impl AssignmentProblem {
    /// Build a problem from per-slot metadata and a `[slot][player]` matrix
    /// of milli-point weights (`None` = ineligible). Weights must lie within
    /// `±to_milli(MAX_POINTS)`.
    pub fn new(slot_ids: Vec<String>, required: Vec<bool>, weights: Vec<Vec<Option<i64>>>) -> Self {
        let n = slot_ids.len() as i128;
        let num_players = weights.first().map_or(0, |row| row.len());

        let smax: i128 = weights
            .iter()
            .flatten()
            .flatten()
            .map(|w| (*w as i128).abs())
            .max()
            .unwrap_or(0)
            + 1;
        // Radixes, lowest level first. See the module comment.
        let bench_unit = 2 * smax * n + 1;
        let starter_unit = n * (bench_unit + 2 * smax) + 1;
        let required_unit = n * starter_unit * 2 * smax + starter_unit + 1;

        let edges = weights
            .iter()
            .zip(&required)
            .map(|(row, &req)| {
                row.iter()
                    .map(|w| {
                        w.map(|w| {
                            let shifted = w as i128 + smax;
                            if req {
                                required_unit + starter_unit * shifted
                            } else {
                                bench_unit + shifted
                            }
                        })
                    })
                    .collect()
            })
            .collect();

        AssignmentProblem {
            slot_ids,
            required,
            edges,
            num_players,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slot_ids.len()
    }

    pub fn num_players(&self) -> usize {
        self.num_players
    }

    pub fn is_required(&self, slot: usize) -> bool {
        self.required[slot]
    }

    pub fn is_eligible(&self, slot: usize, player: usize) -> bool {
        self.edges[slot][player].is_some()
    }

    /// Composite objective of an arbitrary slot vector, or `None` if it
    /// places a player in an ineligible slot.
    pub fn objective_of(&self, slots: &[Option<usize>]) -> Option<i128> {
        let mut total = 0i128;
        for (s, p) in slots.iter().enumerate() {
            if let Some(p) = p {
                total += self.edges[s][*p]?;
            }
        }
        Some(total)
    }

    /// Solve for an optimal assignment honoring `pins`. Returns `Ok(None)`
    /// when the pins themselves are contradictory (a player pinned twice, a
    /// slot pinned twice, or a pin onto an ineligible pairing).
    pub fn solve(
        &self,
        pins: &[(usize, Pin)],
        control: &SolveControl,
    ) -> Result<Option<Matching>, LineupError> {
        let n = self.num_slots();
        let m = self.num_players;

        let mut row_pin: Vec<Option<Pin>> = vec![None; n];
        let mut pinned_player: Vec<Option<usize>> = vec![None; m];
        for &(slot, pin) in pins {
            if slot >= n || row_pin[slot].is_some() {
                return Ok(None);
            }
            if let Pin::Player(p) = pin {
                if p >= m || pinned_player[p].is_some() || !self.is_eligible(slot, p) {
                    return Ok(None);
                }
                pinned_player[p] = Some(slot);
            }
            row_pin[slot] = Some(pin);
        }

        if n == 0 {
            return Ok(Some(Matching {
                slots: Vec::new(),
                objective: 0,
            }));
        }

        // Minimize (top - weight) so all costs are non-negative. Empty
        // columns cost `top` (weight zero).
        let top: i128 = self.edges.iter().flatten().flatten().copied().max().unwrap_or(0) + 1;
        let forbidden: i128 = (n as i128 + 1) * top * 2;
        let cols = m + n;

        let cost = |s: usize, c: usize| -> i128 {
            let pin = row_pin[s];
            if c >= m {
                return match pin {
                    None | Some(Pin::Empty) => top,
                    Some(Pin::Player(_)) => forbidden,
                };
            }
            match pin {
                Some(Pin::Empty) => return forbidden,
                Some(Pin::Player(p)) if p != c => return forbidden,
                _ => {}
            }
            if pinned_player[c].is_some_and(|owner| owner != s) {
                return forbidden;
            }
            match self.edges[s][c] {
                Some(w) => top - w,
                None => forbidden,
            }
        };

        let assignment = hungarian(n, cols, &cost, control)?;

        let mut slots = vec![None; n];
        let mut objective = 0i128;
        for (s, &c) in assignment.iter().enumerate() {
            if cost(s, c) >= forbidden {
                return Err(LineupError::Internal(format!(
                    "assignment solver used a forbidden pairing for slot `{}`",
                    self.slot_ids[s]
                )));
            }
            if c < m {
                slots[s] = Some(c);
                objective += self.edges[s][c].unwrap_or(0);
            }
        }

        Ok(Some(Matching { slots, objective }))
    }

    /// Solve, then canonicalize among all optimal assignments: visiting slots
    /// in ascending id order, each slot receives the smallest player index
    /// (an empty slot ranks after every player) that still admits an optimal
    /// completion. The result is unique for a given problem.
    pub fn solve_canonical(
        &self,
        pins: &[(usize, Pin)],
        control: &SolveControl,
    ) -> Result<Option<Matching>, LineupError> {
        let Some(mut best) = self.solve(pins, control)? else {
            return Ok(None);
        };

        let mut order: Vec<usize> = (0..self.num_slots()).collect();
        order.sort_by(|&a, &b| self.slot_ids[a].cmp(&self.slot_ids[b]));

        let mut fixed: Vec<(usize, Pin)> = pins.to_vec();
        let mut resolves = 0usize;
        for s in order {
            if fixed.iter().any(|(slot, _)| *slot == s) {
                continue;
            }
            let limit = best.slots[s].unwrap_or(self.num_players);
            for p in 0..limit {
                if !self.is_eligible(s, p) || fixed.iter().any(|(_, pin)| *pin == Pin::Player(p)) {
                    continue;
                }
                let mut trial = fixed.clone();
                trial.push((s, Pin::Player(p)));
                resolves += 1;
                if let Some(candidate) = self.solve(&trial, control)? {
                    if candidate.objective == best.objective {
                        best = candidate;
                        break;
                    }
                }
            }
            let pin = best.slots[s].map_or(Pin::Empty, Pin::Player);
            fixed.push((s, pin));
        }

        trace!(resolves, "canonical tie-break complete");
        Ok(Some(best))
    }
}

/// Rectangular Hungarian method (rows <= cols). Returns the column assigned
/// to each row. `cost` must be non-negative.
fn hungarian<F>(
    rows: usize,
    cols: usize,
    cost: F,
    control: &SolveControl,
) -> Result<Vec<usize>, LineupError>
where
    F: Fn(usize, usize) -> i128,
{
    const INF: i128 = i128::MAX / 4;

    // 1-based potentials and matching; column 0 is the virtual source.
    let mut u = vec![0i128; rows + 1];
    let mut v = vec![0i128; cols + 1];
    let mut owner = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for i in 1..=rows {
        control.checkpoint()?;
        owner[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![INF; cols + 1];
        let mut used = vec![false; cols + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = INF;
            let mut j1 = 0usize;
            for j in 1..=cols {
                if used[j] {
                    continue;
                }
                let reduced = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=cols {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        // Flip the augmenting path.
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; rows];
    for j in 1..=cols {
        if owner[j] != 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    Ok(assignment)
}
