//! Learned state shared by every algorithm
//!
//! Q, V, H and w are keyed by [`StateKey`] and filled lazily. The
//! successor matrix M is a dense `n² x n²` array whose rows and columns
//! follow [`StateKey::index`]; it only covers states inside the grid it was
//! allocated for.

use ndarray::{Array2, ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::{Action, ActionValues, LearnError, Result, StateKey};

/// Largest supported grid side; M already holds `n⁴` entries
pub const MAX_GRID_SIZE: usize = 64;

/// Owned store of every learned table
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    grid_size: usize,
    q: HashMap<StateKey, ActionValues>,
    v: HashMap<StateKey, f64>,
    h: HashMap<StateKey, ActionValues>,
    m: Array2<f64>,
    w: HashMap<StateKey, f64>,
    observed: HashMap<(StateKey, Action), StateKey>,
}

impl TableStore {
    /// Create a store initialised for an `n x n` grid
    pub fn new(grid_size: usize) -> Result<Self> {
        let mut store = Self::default();
        store.initialize(grid_size)?;
        Ok(store)
    }

    /// Clear every table and allocate them for an `n x n` grid
    ///
    /// This is the only lifecycle boundary: nothing from the previous grid
    /// survives.
    pub fn initialize(&mut self, grid_size: usize) -> Result<()> {
        if grid_size == 0 || grid_size > MAX_GRID_SIZE {
            return Err(LearnError::InvalidGridSize(grid_size));
        }
        let states = grid_size * grid_size;
        self.grid_size = grid_size;
        self.q.clear();
        self.v.clear();
        self.h.clear();
        self.w.clear();
        self.observed.clear();
        self.m = Array2::zeros((states, states));
        for state in StateKey::all(grid_size) {
            self.ensure_state(state);
        }
        debug!(grid_size, states, "tables initialised");
        Ok(())
    }

    /// Fill missing Q, V, H and w entries for `state`
    ///
    /// Idempotent: existing entries are never touched. M rows exist for every
    /// in-grid state from [`TableStore::initialize`] onwards.
    pub fn ensure_state(&mut self, state: StateKey) {
        self.q.entry(state).or_default();
        self.v.entry(state).or_insert(0.0);
        self.h.entry(state).or_default();
        self.w.entry(state).or_insert(0.0);
    }

    /// Grid size the tables were allocated for
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Q-values of `state`, all zero when unseen
    #[must_use]
    pub fn q_values(&self, state: StateKey) -> ActionValues {
        self.q.get(&state).copied().unwrap_or_default()
    }

    /// Q(s, a)
    #[must_use]
    pub fn q(&self, state: StateKey, action: Action) -> f64 {
        self.q_values(state)[action]
    }

    /// Mutable Q(s, a), initialising the state first
    pub fn q_mut(&mut self, state: StateKey, action: Action) -> &mut f64 {
        &mut self.q.entry(state).or_default()[action]
    }

    /// V(s)
    #[must_use]
    pub fn v(&self, state: StateKey) -> f64 {
        self.v.get(&state).copied().unwrap_or(0.0)
    }

    /// Mutable V(s), initialising the state first
    pub fn v_mut(&mut self, state: StateKey) -> &mut f64 {
        self.v.entry(state).or_insert(0.0)
    }

    /// Actor preferences of `state`
    #[must_use]
    pub fn preferences(&self, state: StateKey) -> ActionValues {
        self.h.get(&state).copied().unwrap_or_default()
    }

    /// Mutable actor preferences, initialising the state first
    pub fn preferences_mut(&mut self, state: StateKey) -> &mut ActionValues {
        self.h.entry(state).or_default()
    }

    /// Reward weight w(s)
    #[must_use]
    pub fn w(&self, state: StateKey) -> f64 {
        self.w.get(&state).copied().unwrap_or(0.0)
    }

    /// Mutable w(s), initialising the state first
    pub fn w_mut(&mut self, state: StateKey) -> &mut f64 {
        self.w.entry(state).or_insert(0.0)
    }

    /// Row M(s, ·), if `state` is inside the grid
    #[must_use]
    pub fn m_row(&self, state: StateKey) -> Option<ArrayView1<'_, f64>> {
        state.index(self.grid_size).map(|i| self.m.row(i))
    }

    /// Mutable row M(s, ·), if `state` is inside the grid
    pub fn m_row_mut(&mut self, state: StateKey) -> Option<ArrayViewMut1<'_, f64>> {
        state.index(self.grid_size).map(|i| self.m.row_mut(i))
    }

    /// M(s, s'), zero for states outside the grid
    #[must_use]
    pub fn m(&self, state: StateKey, target: StateKey) -> f64 {
        match (state.index(self.grid_size), target.index(self.grid_size)) {
            (Some(i), Some(j)) => self.m[[i, j]],
            _ => 0.0,
        }
    }

    /// The whole successor matrix
    #[must_use]
    pub fn m_matrix(&self) -> &Array2<f64> {
        &self.m
    }

    /// Remember that `action` from `state` led to `next_state`
    pub fn record_transition(&mut self, state: StateKey, action: Action, next_state: StateKey) {
        self.observed.insert((state, action), next_state);
    }

    /// Successor last observed for `(state, action)`
    #[must_use]
    pub fn observed_successor(&self, state: StateKey, action: Action) -> Option<StateKey> {
        self.observed.get(&(state, action)).copied()
    }

    /// Every state with a Q entry, sorted
    #[must_use]
    pub fn states(&self) -> Vec<StateKey> {
        let mut states: Vec<StateKey> = self.q.keys().copied().collect();
        states.sort_unstable();
        states
    }

    /// Serializable copy of every table, keyed by `"x,y"`
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        fn keyed<T: Copy>(map: &HashMap<StateKey, T>) -> BTreeMap<String, T> {
            map.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        }

        TableSnapshot {
            grid_size: self.grid_size,
            q: keyed(&self.q),
            v: keyed(&self.v),
            h: keyed(&self.h),
            w: keyed(&self.w),
            m: self.m.rows().into_iter().map(|row| row.to_vec()).collect(),
        }
    }
}

/// Point-in-time copy of the learned tables, for inspection and rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Grid size the tables cover
    pub grid_size: usize,
    /// Action values
    pub q: BTreeMap<String, ActionValues>,
    /// Critic state values
    pub v: BTreeMap<String, f64>,
    /// Actor preferences
    pub h: BTreeMap<String, ActionValues>,
    /// Reward weights
    pub w: BTreeMap<String, f64>,
    /// Successor matrix rows in [`StateKey::index`] order
    pub m: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_initialize_covers_grid() {
        let store = TableStore::new(3).unwrap();
        assert_eq!(store.states(), StateKey::all(3).collect::<Vec<_>>());
        assert_eq!(store.m_matrix().dim(), (9, 9));
        assert!(store.m_matrix().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_resize_leaves_no_stale_keys() {
        let mut store = TableStore::new(4).unwrap();
        *store.q_mut(StateKey::new(3, 3), Action::Up) = 2.0;
        *store.w_mut(StateKey::new(3, 2)) = 1.0;
        store.record_transition(StateKey::new(3, 3), Action::Up, StateKey::new(3, 2));

        store.initialize(2).unwrap();

        let expected: Vec<StateKey> = StateKey::all(2).collect();
        assert_eq!(store.states(), expected);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.q.len(), 4);
        assert_eq!(snapshot.v.len(), 4);
        assert_eq!(snapshot.h.len(), 4);
        assert_eq!(snapshot.w.len(), 4);
        assert_eq!(snapshot.m.len(), 4);
        assert!(snapshot.m.iter().all(|row| row.len() == 4));
        assert_eq!(store.observed_successor(StateKey::new(3, 3), Action::Up), None);
        assert!(store.m_row(StateKey::new(3, 3)).is_none());
    }

    #[test]
    fn test_invalid_grid_size() {
        assert!(matches!(
            TableStore::new(0),
            Err(LearnError::InvalidGridSize(0))
        ));
        assert!(TableStore::new(MAX_GRID_SIZE + 1).is_err());
    }

    #[test]
    fn test_ensure_state_keeps_existing_values() {
        let mut store = TableStore::new(2).unwrap();
        let s = StateKey::new(1, 0);
        *store.q_mut(s, Action::Left) = 0.7;
        *store.v_mut(s) = -0.2;
        store.ensure_state(s);
        assert_eq!(store.q(s, Action::Left), 0.7);
        assert_eq!(store.v(s), -0.2);
    }

    #[test]
    fn test_snapshot_serializes_with_string_keys() {
        let store = TableStore::new(2).unwrap();
        let json = serde_json::to_value(store.snapshot()).unwrap();
        assert!(json["q"]["1,0"]["up"].is_number());
        assert_eq!(json["grid_size"], 2);
    }

    proptest! {
        #[test]
        fn prop_ensure_state_is_idempotent(x in 0usize..12, y in 0usize..12, q in -5.0f64..5.0) {
            let mut store = TableStore::new(6).unwrap();
            let s = StateKey::new(x, y);
            store.ensure_state(s);
            *store.q_mut(s, Action::Right) = q;
            let once = store.snapshot();
            store.ensure_state(s);
            prop_assert_eq!(once, store.snapshot());
        }
    }
}
