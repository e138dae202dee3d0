//! Timer-driven sessions

use std::time::Duration;

use gridlearn_agent::{Learner, Session, SessionConfig, StopReason, TickDriver};
use gridlearn_core::{Algorithm, LearnerConfig};
use gridlearn_env::{GridWorld, GridWorldConfig};
use tokio::sync::watch;

fn session(algorithm: &str) -> Session<GridWorld> {
    let mut learner = Learner::new(
        LearnerConfig {
            seed: Some(9),
            ..LearnerConfig::default()
        },
        2,
    )
    .unwrap();
    learner.set_algorithm_named(algorithm);
    let env = GridWorld::new(GridWorldConfig {
        size: 2,
        ..GridWorldConfig::default()
    })
    .unwrap();
    Session::new(
        learner,
        env,
        SessionConfig {
            max_steps_per_episode: 5,
            ..SessionConfig::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_driver_stops_at_episode_budget() {
    let mut session = session(Algorithm::QLearning.as_str());
    let (_tx, rx) = watch::channel(false);
    let driver = TickDriver::new(Duration::from_millis(1)).with_max_episodes(3);

    let report = driver.run(&mut session, rx).await.unwrap();

    assert_eq!(report.reason, StopReason::EpisodeBudget);
    assert_eq!(report.episodes, 3);
    assert!(report.ticks >= 3 && report.ticks <= 15);
    assert_eq!(session.stats().episodes(), 3);
}

#[tokio::test]
async fn test_driver_honours_stop_signal() {
    let mut session = session(Algorithm::Sarsa.as_str());
    let (tx, rx) = watch::channel(false);
    let driver = TickDriver::new(Duration::from_millis(1));

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        tx
    });
    let report = driver.run(&mut session, rx).await.unwrap();
    drop(stopper.await.unwrap());

    assert_eq!(report.reason, StopReason::Signalled);
    assert!(report.ticks > 0);
}

#[tokio::test]
async fn test_driver_stops_when_learner_needs_stop() {
    let mut session = session("bogus");
    let (_tx, rx) = watch::channel(false);

    let report = TickDriver::new(Duration::from_millis(1))
        .run(&mut session, rx)
        .await
        .unwrap();

    assert_eq!(report.reason, StopReason::NeedsStop);
    assert_eq!(report.ticks, 1);
    assert_eq!(report.episodes, 0);
}

#[tokio::test]
async fn test_driver_rejects_zero_interval() {
    let mut session = session(Algorithm::QLearning.as_str());
    let (_tx, rx) = watch::channel(false);
    let driver = TickDriver::default();

    assert!(driver.set_interval(Duration::ZERO).is_err());
    assert_eq!(driver.interval(), Duration::from_millis(50));
    assert!(TickDriver::new(Duration::ZERO)
        .run(&mut session, rx)
        .await
        .is_err());
    assert_eq!(session.stats().episodes(), 0);
}

#[tokio::test]
async fn test_interval_change_applies_to_running_loop() {
    let mut session = session(Algorithm::QLearning.as_str());
    let (_tx, rx) = watch::channel(false);
    let driver = TickDriver::new(Duration::from_secs(3600)).with_max_episodes(2);

    let speed_up = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        driver.set_interval(Duration::from_millis(1)).unwrap();
    };
    let (report, ()) = tokio::time::timeout(
        Duration::from_secs(10),
        async { tokio::join!(driver.run(&mut session, rx), speed_up) },
    )
    .await
    .expect("a slow interval must not outlive the speed change");

    let report = report.unwrap();
    assert_eq!(report.reason, StopReason::EpisodeBudget);
    assert_eq!(report.episodes, 2);
    assert_eq!(driver.interval(), Duration::from_millis(1));
}
