//! Values derived from the successor representation
//!
//! `V(s) = Σ_s' M(s, s')·w(s')` and `Q(s, a) = w(s') + γ·V(s')`, where `s'`
//! is the state reached by taking `a` in `s`.

use gridlearn_core::{Action, ActionValues, Dynamics, SrLookahead, StateKey, TableStore};

/// State value V(s) from the successor matrix and reward weights
///
/// Zero for states without an M row.
#[must_use]
pub fn state_value(store: &TableStore, state: StateKey) -> f64 {
    let n = store.grid_size();
    store.m_row(state).map_or(0.0, |row| {
        row.iter()
            .zip(StateKey::all(n))
            .map(|(m, target)| m * store.w(target))
            .sum()
    })
}

/// State reached by `action` from `state` under the configured lookahead
///
/// The learned model treats an unobserved pair as staying put.
pub fn lookahead<D: Dynamics + ?Sized>(
    store: &TableStore,
    state: StateKey,
    action: Action,
    mode: SrLookahead,
    dynamics: &D,
) -> StateKey {
    match mode {
        SrLookahead::Environment => dynamics.step(action, state, store.grid_size()).next_state,
        SrLookahead::LearnedModel => store.observed_successor(state, action).unwrap_or(state),
    }
}

/// Q(s, a) = w(s') + γ·V(s')
pub fn action_value<D: Dynamics + ?Sized>(
    store: &TableStore,
    state: StateKey,
    action: Action,
    gamma: f64,
    mode: SrLookahead,
    dynamics: &D,
) -> f64 {
    let next = lookahead(store, state, action, mode, dynamics);
    store.w(next) + gamma * state_value(store, next)
}

/// Q(s, ·) for all four actions
///
/// With [`SrLookahead::Environment`] this costs one environment query per action.
pub fn action_values<D: Dynamics + ?Sized>(
    store: &TableStore,
    state: StateKey,
    gamma: f64,
    mode: SrLookahead,
    dynamics: &D,
) -> ActionValues {
    ActionValues::from_fn(|action| action_value(store, state, action, gamma, mode, dynamics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gridlearn_core::Transition;
    use std::cell::Cell;

    struct CountingRight {
        calls: Cell<usize>,
    }

    impl Dynamics for CountingRight {
        fn step(&self, action: Action, position: StateKey, grid_size: usize) -> Transition {
            self.calls.set(self.calls.get() + 1);
            let next = match action {
                Action::Right => position.neighbour(action, grid_size).unwrap_or(position),
                _ => position,
            };
            Transition {
                next_state: next,
                reward: 0.0,
                new_position: next,
                done: false,
            }
        }
    }

    fn seeded_store() -> TableStore {
        let mut store = TableStore::new(2).unwrap();
        let a = StateKey::new(0, 0);
        let b = StateKey::new(1, 0);
        *store.w_mut(b) = 2.0;
        let mut row = store.m_row_mut(a).unwrap();
        row[b.index(2).unwrap()] = 0.5;
        store
    }

    #[test]
    fn test_state_value_sums_occupancy_times_weight() {
        let store = seeded_store();
        assert_relative_eq!(state_value(&store, StateKey::new(0, 0)), 1.0);
        assert_relative_eq!(state_value(&store, StateKey::new(1, 1)), 0.0);
        assert_relative_eq!(state_value(&store, StateKey::new(9, 9)), 0.0);
    }

    #[test]
    fn test_environment_lookahead_queries_once_per_action() {
        let store = seeded_store();
        let env = CountingRight {
            calls: Cell::new(0),
        };
        let q = action_values(&store, StateKey::new(0, 0), 0.9, SrLookahead::Environment, &env);
        assert_eq!(env.calls.get(), 4);
        assert_relative_eq!(q.right, 2.0);
        assert_relative_eq!(q.up, 0.9 * 1.0);
    }

    #[test]
    fn test_learned_model_lookahead_skips_environment() {
        let mut store = seeded_store();
        let a = StateKey::new(0, 0);
        store.record_transition(a, Action::Down, StateKey::new(1, 0));
        let env = CountingRight {
            calls: Cell::new(0),
        };
        let q = action_values(&store, a, 0.5, SrLookahead::LearnedModel, &env);
        assert_eq!(env.calls.get(), 0);
        assert_relative_eq!(q.down, 2.0);
        assert_relative_eq!(q.left, 0.5 * 1.0);
    }
}
