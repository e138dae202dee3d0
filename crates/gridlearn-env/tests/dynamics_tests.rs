//! Transition properties of the grid world

use approx::assert_relative_eq;
use gridlearn_env::prelude::*;

fn walled() -> GridWorld {
    let mut env = GridWorld::new(GridWorldConfig {
        size: 4,
        step_penalty: -0.05,
        ..GridWorldConfig::default()
    })
    .unwrap();
    env.set_cell(StateKey::new(1, 1), Cell::Wall).unwrap();
    env.set_cell(StateKey::new(2, 1), Cell::Wall).unwrap();
    env
}

#[test]
fn test_transitions_stay_in_grid_and_avoid_walls() {
    let env = walled();
    let n = env.grid_size();
    for state in StateKey::all(n) {
        for action in Action::ALL {
            let t = env.step(action, state, n);
            assert!(t.new_position.in_grid(n));
            assert_eq!(t.next_state, t.new_position);
            assert_ne!(env.cell(t.next_state), Some(Cell::Wall));

            let moved = t.next_state != state;
            let expected = state.neighbour(action, n);
            if moved {
                assert_eq!(Some(t.next_state), expected);
            } else if let Some(blocked) = expected {
                assert_eq!(env.cell(blocked), Some(Cell::Wall));
            }
        }
    }
}

#[test]
fn test_rewards_match_destination_cell() {
    let env = walled();
    let n = env.grid_size();
    for state in StateKey::all(n) {
        for action in Action::ALL {
            let t = env.step(action, state, n);
            match env.cell(t.next_state) {
                Some(Cell::Gem) => {
                    assert_relative_eq!(t.reward, 1.0);
                    assert!(t.done);
                }
                Some(Cell::Trap) => {
                    assert_relative_eq!(t.reward, -1.0);
                    assert!(t.done);
                }
                _ => {
                    assert_relative_eq!(t.reward, -0.05);
                    assert!(!t.done);
                }
            }
        }
    }
}

#[test]
fn test_environment_contract_reset_and_resize() {
    let mut env = walled();
    env.set_start(StateKey::new(0, 3)).unwrap();
    assert_eq!(env.reset(), StateKey::new(0, 3));

    env.resize(6).unwrap();
    assert_eq!(env.grid_size(), 6);
    assert_eq!(env.reset(), StateKey::new(0, 0));
    assert_eq!(env.cell(StateKey::new(1, 1)), Some(Cell::Empty));
    assert!(env.resize(65).is_err());
    assert_eq!(env.grid_size(), 6);
}

#[test]
fn test_closure_dynamics_are_interchangeable() {
    let env = walled();
    let as_fn = |action: Action, position: StateKey, n: usize| env.step(action, position, n);
    let origin = StateKey::new(0, 0);
    for action in Action::ALL {
        assert_eq!(Dynamics::step(&as_fn, action, origin, 4), env.step(action, origin, 4));
    }
}
