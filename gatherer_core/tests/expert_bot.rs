use std::sync::Arc;

use gatherer_core::{
    Action, Direction, Position, Resource, ResourceKind,
    bot::{CycleOutcome, EpisodeEnd, ExpertBot, GameControl, run_games},
    config::{BotConfig, GameConfig},
    episode::EpisodeState,
    grid::Terrain,
    pathfinding::find_path,
    session::{Session, SessionHandle},
};

fn config(budget: u32) -> GameConfig {
    GameConfig {
        grid_size: 5,
        hindered_tiles: 0,
        normal_resources: 1,
        golden_resources: 0,
        normal_value: 10,
        budget,
        bot: BotConfig {
            confirm_timeout_ms: 500,
            poll_interval_ms: 1,
            max_consecutive_aborts: 3,
        },
        ..GameConfig::default()
    }
}

/// 5x5 open field, base and agent on (0, 0), one resource worth 10 on (2, 0).
fn single_resource() -> EpisodeState {
    EpisodeState::new(
        1,
        Position::new(0, 0),
        Terrain::new(5, 1, 5),
        vec![Resource {
            position: Position::new(2, 0),
            kind: ResourceKind::Normal,
            value: 10,
        }],
    )
}

fn spawn(budget: u32) -> (SessionHandle, ExpertBot) {
    let config = config(budget);
    let bot = ExpertBot::new(config.bot.clone(), config.budget);
    let handle = Session::spawn_with_state(config, single_resource(), 7).unwrap();
    (handle, bot)
}

#[test]
fn pathfinder_on_open_field() {
    let state = single_resource();
    let result = find_path(Position::new(0, 0), Position::new(2, 0), &state.terrain);
    assert_eq!(
        result.path,
        vec![Position::new(0, 0), Position::new(1, 0), Position::new(2, 0)]
    );
    assert_eq!(result.cost, Some(2));
}

#[tokio::test]
async fn bot_fetches_and_delivers_through_session() {
    let (handle, mut bot) = spawn(200);

    let outcome = bot.run_cycle(&handle).await;
    assert!(matches!(outcome, CycleOutcome::Delivered(r) if r.value == 10));

    let state = handle.observe_state().unwrap();
    assert_eq!(state.score, 10);
    assert_eq!(state.step_cost, 4);
    assert_eq!(state.agent.position, state.base);
    assert!(state.agent.holding.is_none());
    // Delivered resource respawned somewhere free.
    assert_eq!(state.resources.len(), 1);
    assert_ne!(state.resources[0].position, state.base);

    let log = handle.take_log().await.unwrap();
    let actions: Vec<u8> = log.iter().map(|entry| entry.action).collect();
    assert_eq!(actions, vec![3, 3, 4, 2, 2, 4]);
    // Each entry holds the state from before its action.
    assert_eq!(log[0].state.agent_pos, (0, 0));
    assert_eq!(log[2].state.agent_pos, (2, 0));
    assert_eq!(log[2].cost, 2);
    assert_eq!(log[5].state.remaining_cost, 196);
    assert!(log.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test]
async fn unaffordable_round_trip_ends_episode_without_moving() {
    let (handle, mut bot) = spawn(3);

    let summary = bot.run_episode(&handle).await;
    assert_eq!(summary.end, EpisodeEnd::Exhausted);
    assert_eq!(summary.deliveries, 0);
    assert_eq!(summary.step_cost, 0);

    // The exhaustion notice is applied asynchronously.
    for _ in 0..100 {
        if !handle.observe_active() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    assert!(!handle.observe_active());
    let state = handle.observe_state().unwrap();
    assert_eq!(state.agent.position, Position::new(0, 0));
    assert!(handle.take_log().await.unwrap().is_empty());
}

#[tokio::test]
async fn budget_runs_out_mid_episode() {
    // Enough for one round trip (4) and then some, but the session stops
    // accepting actions the moment the spent cost reaches 6.
    let (handle, mut bot) = spawn(6);

    let summary = bot.run_episode(&handle).await;
    assert_eq!(summary.deliveries, 1);
    assert_eq!(summary.score, 10);
    assert!(summary.step_cost <= 6);
    assert!(matches!(
        summary.end,
        EpisodeEnd::Exhausted | EpisodeEnd::Inactive
    ));
}

#[tokio::test]
async fn human_moves_are_ignored_once_inactive() {
    let (handle, _) = spawn(1);

    handle.record_decision(Action::Move(Direction::Down), handle.observe_state().unwrap());
    handle.request_move(Direction::Down);
    handle.request_move(Direction::Down);

    let log = handle.take_log().await.unwrap();
    assert_eq!(log.len(), 1);
    let state = handle.observe_state().unwrap();
    assert_eq!(state.agent.position, Position::new(0, 1));
    assert_eq!(state.step_cost, 1);
    assert!(!handle.observe_active());
}

#[tokio::test]
async fn run_games_plays_fresh_episodes_back_to_back() {
    let config = config(40);
    let mut bot = ExpertBot::new(config.bot.clone(), config.budget);
    let handle = Session::spawn(config, Some(2024)).unwrap();

    let summaries = run_games(&handle, &mut bot, 3).await.unwrap();
    let ids: Vec<u64> = summaries.iter().map(|s| s.episode_id).collect();
    assert_eq!(ids, vec![2, 3, 4]);

    for summary in &summaries {
        assert!(summary.step_cost <= 40);
        assert_eq!(summary.score, 10 * summary.deliveries as u32);
        assert_ne!(summary.end, EpisodeEnd::Stalled);
    }

    // Every recorded decision belongs to one of the played episodes, in order.
    let log = handle.take_log().await.unwrap();
    assert!(!log.is_empty());
    assert!(log.windows(2).all(|pair| pair[0].episode_id <= pair[1].episode_id));
    assert!(log.iter().all(|entry| (2..=4).contains(&entry.episode_id)));
}

#[tokio::test]
async fn state_snapshots_are_shared_not_copied_per_reader() {
    let (handle, _) = spawn(200);
    let a = handle.observe_state().unwrap();
    let b = GameControl::observe_state(&handle).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
