//! Example: train every algorithm on the default grid world

use gridlearn_agent::{Learner, Session, SessionConfig};
use gridlearn_core::{Algorithm, LearnerConfig, StateKey};
use gridlearn_env::{GridWorld, GridWorldConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env_config = GridWorldConfig::default();
    let num_episodes = 300;

    for algorithm in Algorithm::ALL {
        let env = GridWorld::new(env_config.clone())?;
        let learner = Learner::new(
            LearnerConfig {
                algorithm: algorithm.into(),
                seed: Some(1),
                ..LearnerConfig::default()
            },
            env_config.size,
        )?;
        let mut session = Session::new(learner, env, SessionConfig::default())?;

        let summaries = session.run_episodes(num_episodes);
        let truncated = summaries.iter().filter(|s| s.truncated).count();
        let (learner, env) = session.parts_mut();
        let start = env.start();
        let probabilities = learner.action_probabilities(start, env);

        println!("== {algorithm} ==");
        println!(
            "Smoothed reward after {} episodes: {:.3} ({} truncated)",
            summaries.len(),
            session.stats().latest_average().unwrap_or_default(),
            truncated
        );
        println!("Policy at start {start}: {probabilities:?}");
        if algorithm == Algorithm::SuccessorRepresentation {
            println!(
                "SR value at start: {:.3}",
                session.learner().sr_state_value(StateKey::new(0, 0))
            );
        }
    }

    println!("\nLayout:\n{}", GridWorld::new(env_config)?);
    Ok(())
}
