use anyhow::{Context, Result};
use clap::Parser;
use gatherer_core::{
    Action, Direction, Position, ResourceKind,
    bot::{Efficiency, EpisodeSummary, ExpertBot, preview, run_games},
    config::GameConfig,
    dataset::{LogEntry, write_jsonl},
    episode::EpisodeState,
    grid::Tile,
    scores::HighScores,
    session::{GameEvent, Session, SessionError, SessionHandle},
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, BufWriter, Stdout},
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tokio::{
    runtime::Runtime,
    sync::broadcast::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, prelude::*};

const EVENT_LOG_LEN: usize = 200;
/// Pause between a human episode running out of budget and the next one.
const AUTO_RESTART_DELAY: Duration = Duration::from_secs(4);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON game config; defaults are used for missing fields
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Seed for map generation
    #[arg(short, long)]
    seed: Option<u64>,

    /// Override the step-cost budget
    #[arg(short, long)]
    budget: Option<u32>,

    /// Number of games the bot plays per run
    #[arg(short, long, default_value_t = 100)]
    episodes: usize,

    /// Run the bot without a UI and print a summary per game
    #[arg(long)]
    headless: bool,

    /// Write recorded decisions to this JSONL file on exit
    #[arg(short, long, value_name = "JSONL_FILE")]
    dataset: Option<PathBuf>,

    /// Log file used in TUI mode
    #[arg(long, default_value = "gatherer.log")]
    log_file: PathBuf,

    /// Best-score cache, one entry per budget
    #[arg(long, value_name = "JSON_FILE", default_value = "gatherer_scores.json")]
    high_scores: PathBuf,
}

type BotRun = JoinHandle<Result<Vec<EpisodeSummary>, SessionError>>;

struct App {
    /// Handle to the session worker.
    handle: SessionHandle,
    events: broadcast::Receiver<GameEvent>,
    /// Most recent messages, newest last.
    event_log: VecDeque<String>,
    /// Running bot games, if any. Human input is ignored while set.
    bot_run: Option<BotRun>,
    episodes: usize,
    /// Index into the current resources for the path preview.
    selected: Option<usize>,
    /// Episode started from the keyboard; only its end triggers an auto-restart.
    human_episode: Option<u64>,
    restart_at: Option<Instant>,
    should_quit: bool,
}

impl App {
    fn new(handle: SessionHandle, episodes: usize) -> Self {
        let events = handle.subscribe_events();
        let mut app = App {
            handle,
            events,
            event_log: VecDeque::with_capacity(EVENT_LOG_LEN),
            bot_run: None,
            episodes,
            selected: None,
            human_episode: None,
            restart_at: None,
            should_quit: false,
        };
        app.push_log("Press 's' to start an episode or 'b' to let the bot play.".to_string());
        app
    }

    fn push_log(&mut self, line: String) {
        if self.event_log.len() == EVENT_LOG_LEN {
            self.event_log.pop_front();
        }
        self.event_log.push_back(line);
    }

    fn bot_running(&self) -> bool {
        self.bot_run.is_some()
    }

    /// Records and requests a human action.
    fn human_action(&mut self, action: Action) {
        if self.bot_running() {
            self.push_log("Bot is playing, input ignored.".to_string());
            return;
        }
        if !self.handle.observe_active() {
            self.push_log("No active episode, press 's' to start.".to_string());
            return;
        }
        let Some(state) = self.handle.observe_state() else {
            return;
        };

        self.handle.record_decision(action, state);
        match action {
            Action::Move(direction) => self.handle.request_move(direction),
            Action::CollectOrDeliver => self.handle.request_collect_or_deliver(),
        }
    }

    fn restart(&mut self, runtime: &Runtime) {
        if self.bot_running() {
            return;
        }
        self.restart_at = None;
        match runtime.block_on(self.handle.restart()) {
            Ok(episode_id) => {
                self.selected = None;
                self.human_episode = Some(episode_id);
            }
            Err(e) => {
                tracing::error!(error = %e, "Restart failed");
                self.push_log(format!("Restart failed: {e}"));
            }
        }
    }

    fn start_bot(&mut self, runtime: &Runtime) {
        if self.bot_running() {
            return;
        }
        self.human_episode = None;
        self.restart_at = None;
        let handle = self.handle.clone();
        let config = handle.config();
        let mut bot = ExpertBot::new(config.bot.clone(), config.budget);
        let episodes = self.episodes;
        self.bot_run = Some(runtime.spawn(async move {
            run_games(&handle, &mut bot, episodes).await
        }));
        self.push_log(format!("Bot started for {episodes} game(s)."));
    }

    /// Clears the decision log and the event panel.
    fn clear_logs(&mut self) {
        self.event_log.clear();
        self.handle.clear_log();
    }

    /// Moves the preview to the next resource.
    fn cycle_preview(&mut self) {
        let count = self
            .handle
            .observe_state()
            .map_or(0, |state| state.resources.len());
        self.selected = match (self.selected, count) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(i), n) => Some((i + 1) % n),
        };
    }

    /// Drains session events and collects finished bot runs.
    fn tick(&mut self, runtime: &Runtime) {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    let line = describe_event(&event);
                    self.push_log(line);
                    if let GameEvent::EpisodeEnded { episode_id, .. } = event
                        && !self.bot_running()
                        && self.human_episode == Some(episode_id)
                    {
                        self.restart_at = Some(Instant::now() + AUTO_RESTART_DELAY);
                        self.push_log(format!(
                            "Next episode in {} seconds.",
                            AUTO_RESTART_DELAY.as_secs()
                        ));
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    self.push_log(format!("({skipped} events skipped)"));
                }
                Err(_) => break,
            }
        }

        if self.bot_run.as_ref().is_some_and(|run| run.is_finished()) {
            if let Some(run) = self.bot_run.take() {
                match runtime.block_on(run) {
                    Ok(Ok(summaries)) => {
                        for summary in &summaries {
                            let line = describe_summary(summary);
                            self.push_log(line);
                        }
                    }
                    Ok(Err(e)) => self.push_log(format!("Bot stopped: {e}")),
                    Err(e) => self.push_log(format!("Bot task failed: {e}")),
                }
            }
        }

        if self.restart_at.is_some_and(|at| Instant::now() >= at) {
            self.restart(runtime);
        }
    }

    fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Stops the bot, saves scores and the dataset, and shuts the session down.
    fn finish(self, runtime: &Runtime, dataset: Option<&Path>, scores_path: &Path) -> Result<()> {
        if let Some(run) = self.bot_run {
            run.abort();
        }
        runtime.block_on(save_session(&self.handle, dataset, scores_path))
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let _guard = init_logging(args.headless, &args.log_file)?;
    let config = load_config(&args)?;

    let runtime = Runtime::new()?;
    let handle = {
        let _enter = runtime.enter();
        Session::spawn(config, args.seed)?
    };
    match HighScores::load(&args.high_scores) {
        Ok(scores) => handle.set_high_scores(scores),
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable high score file"),
    }

    if args.headless {
        return runtime.block_on(run_headless(
            handle,
            args.episodes,
            args.dataset.as_deref(),
            &args.high_scores,
        ));
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let mut app = App::new(handle, args.episodes);
    let result = run_app(&mut terminal, &mut app, &runtime);

    // Restore the terminal state before reporting anything
    restore_terminal(&mut terminal)?;
    result?;

    app.finish(&runtime, args.dataset.as_deref(), &args.high_scores)
}

/// Logs go to a file in TUI mode, since the terminal belongs to the UI.
fn init_logging(headless: bool, log_file: &Path) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gatherer_core=info,gatherer_tui=info,warn"));

    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return Ok(None);
    }

    let directory = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file
        .file_name()
        .with_context(|| format!("log file path has no file name: {}", log_file.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    Ok(Some(guard))
}

fn load_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            GameConfig::from_json_str(&json)?
        }
        None => GameConfig::default(),
    };
    if let Some(budget) = args.budget {
        config.budget = budget;
    }
    config.validate()?;
    Ok(config)
}

async fn run_headless(
    handle: SessionHandle,
    episodes: usize,
    dataset: Option<&Path>,
    scores_path: &Path,
) -> Result<()> {
    let config = handle.config().clone();
    let mut bot = ExpertBot::new(config.bot.clone(), config.budget);
    let summaries = run_games(&handle, &mut bot, episodes).await?;

    for summary in &summaries {
        println!("{}", describe_summary(summary));
    }
    if !summaries.is_empty() {
        let total: u64 = summaries.iter().map(|s| u64::from(s.score)).sum();
        println!(
            "{} game(s), mean score {:.1}",
            summaries.len(),
            total as f64 / summaries.len() as f64
        );
    }

    save_session(&handle, dataset, scores_path).await
}

/// Writes the dataset and high scores, then stops the session worker.
async fn save_session(
    handle: &SessionHandle,
    dataset: Option<&Path>,
    scores_path: &Path,
) -> Result<()> {
    if let Some(path) = dataset {
        let entries = handle.take_log().await?;
        export_dataset(path, &entries)?;
    }
    let scores = handle.high_scores().await?;
    scores
        .save(scores_path)
        .with_context(|| format!("Failed to save high scores: {}", scores_path.display()))?;
    handle.shutdown();
    Ok(())
}

fn export_dataset(path: &Path, entries: &[LogEntry]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create dataset file: {}", path.display()))?;
    write_jsonl(entries, BufWriter::new(file))?;
    tracing::info!(entries = entries.len(), path = %path.display(), "Dataset written");
    Ok(())
}

fn describe_event(event: &GameEvent) -> String {
    match event {
        GameEvent::EpisodeStarted { episode_id } => format!("Episode {episode_id} started"),
        GameEvent::Moved {
            position,
            tile,
            cost,
        } => match tile {
            Tile::Normal => format!("Moved to ({}, {}) +{cost}", position.x, position.y),
            Tile::Hindered => format!("Waded into mud at ({}, {}) +{cost}", position.x, position.y),
        },
        GameEvent::Collected { kind } => format!("Picked up {} resource", kind_name(*kind)),
        GameEvent::Delivered { kind, value, score } => {
            format!("Delivered {} resource for {value}, score {score}", kind_name(*kind))
        }
        GameEvent::EpisodeEnded {
            episode_id,
            reason,
            score,
        } => format!("Episode {episode_id} ended ({reason:?}) with score {score}"),
        GameEvent::TargetReached { target } => format!("Target score of {target} reached!"),
        GameEvent::NewHighScore { score } => format!("New high score: {score}!"),
        GameEvent::LogCleared => "Logs cleared.".to_string(),
    }
}

fn describe_summary(summary: &EpisodeSummary) -> String {
    format!(
        "Episode {}: score {}, cost {}, {} deliveries, {} aborts, {:?}",
        summary.episode_id,
        summary.score,
        summary.step_cost,
        summary.deliveries,
        summary.aborts,
        summary.end
    )
}

fn kind_name(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Normal => "normal",
        ResourceKind::Golden => "golden",
    }
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    runtime: &Runtime,
) -> Result<()> {
    let tick_rate = Duration::from_millis(50);
    let mut last_tick = Instant::now();

    loop {
        let state = app.handle.observe_state();
        let active = app.handle.observe_active();
        terminal.draw(|f| ui(f, app, state.as_deref(), active))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                        KeyCode::Up => app.human_action(Action::Move(Direction::Up)),
                        KeyCode::Down => app.human_action(Action::Move(Direction::Down)),
                        KeyCode::Left => app.human_action(Action::Move(Direction::Left)),
                        KeyCode::Right => app.human_action(Action::Move(Direction::Right)),
                        KeyCode::Char(' ') | KeyCode::Enter => {
                            app.human_action(Action::CollectOrDeliver)
                        }
                        KeyCode::Char('s') => app.restart(runtime),
                        KeyCode::Char('b') => app.start_bot(runtime),
                        KeyCode::Tab => app.cycle_preview(),
                        KeyCode::Char('c') => app.clear_logs(),
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick(runtime);
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App, state: Option<&EpisodeState>, active: bool) {
    let [game_area, side_area] =
        Layout::horizontal([Constraint::Min(30), Constraint::Length(48)]).areas(frame.area());
    let [stats_area, map_area, help_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
        Constraint::Length(2),
    ])
    .areas(game_area);
    let [preview_area, events_area] =
        Layout::vertical([Constraint::Length(6), Constraint::Min(0)]).areas(side_area);

    let target = state.and_then(|s| app.selected.and_then(|i| s.resources.get(i)).map(|r| (s, r)));
    let previewed = target.map(|(s, resource)| (resource, preview(s, resource)));

    match state {
        Some(state) => {
            render_stats(frame, stats_area, app, state, active);
            let path = previewed.as_ref().map_or(&[][..], |(_, p)| &p.path.path[..]);
            render_map(frame, map_area, state, path);
        }
        None => frame.render_widget(
            Paragraph::new("Waiting for the session...")
                .block(Block::default().borders(Borders::ALL)),
            map_area,
        ),
    }

    let preview_lines: Vec<Line> = match &previewed {
        Some((resource, preview)) => vec![
            Line::from(format!(
                "{} resource at ({}, {}) worth {}",
                kind_name(resource.kind),
                resource.position.x,
                resource.position.y,
                resource.value
            )),
            Line::from(match preview.path.cost {
                Some(cost) => format!("Path cost: {cost}"),
                None => "Path cost: unreachable".to_string(),
            }),
            Line::from(match preview.efficiency {
                Some(Efficiency::Finite(e)) => format!("Efficiency: {e:.2}"),
                Some(Efficiency::Infinite) => "Efficiency: infinite".to_string(),
                None => "Efficiency: n/a".to_string(),
            }),
        ],
        None => vec![Line::from("Tab to preview a resource.")],
    };
    frame.render_widget(
        Paragraph::new(preview_lines)
            .block(Block::default().borders(Borders::ALL).title("Preview")),
        preview_area,
    );

    // Newest first
    let visible = events_area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .event_log
        .iter()
        .rev()
        .take(visible)
        .map(|line| ListItem::new(line.as_str()))
        .collect();
    frame.render_widget(
        List::new(items).block(Block::default().borders(Borders::ALL).title("Events")),
        events_area,
    );

    let help_text = Paragraph::new(
        "Arrows: move  Space/Enter: collect/deliver  s: start  b: bot  Tab: preview  \
         c: clear logs  q/Esc: quit",
    )
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, help_area);
}

fn render_stats(frame: &mut Frame, area: Rect, app: &App, state: &EpisodeState, active: bool) {
    let config = app.handle.config();
    let target = config.target_score();
    let high_score = app.handle.snapshot().high_score;
    let holding = match state.agent.holding.map(|r| r.kind) {
        None => "nothing",
        Some(kind) => kind_name(kind),
    };
    let status = if app.bot_running() {
        Span::styled("BOT", Style::default().fg(Color::Magenta).bold())
    } else if active {
        Span::styled("ACTIVE", Style::default().fg(Color::Green).bold())
    } else {
        Span::styled("INACTIVE", Style::default().fg(Color::DarkGray))
    };

    let score_style = if state.score >= target {
        Style::default().fg(Color::Green).bold()
    } else {
        Style::default()
    };

    let line = Line::from(vec![
        Span::raw(format!("Episode {}  ", state.episode_id)),
        Span::styled(format!("Score {}", state.score), score_style),
        Span::raw(format!(
            "  Target {}  High {}  Cost {}/{}  Holding {}  ",
            target, high_score, state.step_cost, config.budget, holding
        )),
        status,
    ]);
    frame.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::ALL)),
        area,
    );
}

/// Renders the grid onto the frame.
fn render_map(frame: &mut Frame, area: Rect, state: &EpisodeState, path: &[Position]) {
    let size = state.grid_size();
    let mut lines: Vec<Line> = Vec::with_capacity(size);

    for y in 0..size {
        let mut spans: Vec<Span> = Vec::with_capacity(size * 2);
        for x in 0..size {
            let pos = Position::new(x, y);
            let span = if state.agent.position == pos {
                Span::styled("@", Style::default().fg(Color::Red).bold())
            } else if state.base == pos {
                Span::styled("B", Style::default().fg(Color::Blue).bold())
            } else if let Some(resource) = state.resource_at(pos) {
                match resource.kind {
                    ResourceKind::Normal => Span::styled("n", Style::default().fg(Color::Yellow)),
                    ResourceKind::Golden => {
                        Span::styled("G", Style::default().fg(Color::LightYellow).bold())
                    }
                }
            } else if path.contains(&pos) {
                Span::styled("*", Style::default().fg(Color::Cyan))
            } else if state.terrain.is_hindered(pos) {
                Span::styled("~", Style::default().fg(Color::Rgb(139, 90, 43)))
            } else {
                Span::styled(".", Style::default().fg(Color::DarkGray))
            };
            spans.push(span);
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Gatherer").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(map_paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatherer_core::{
        bot::EpisodeEnd,
        session::EndReason,
    };

    #[test]
    fn budget_flag_overrides_config() {
        let args = Args::parse_from(["gatherer_tui", "--budget", "42", "--headless"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.budget, 42);
        assert!(args.headless);
        assert_eq!(args.episodes, 100);
        assert_eq!(args.high_scores, PathBuf::from("gatherer_scores.json"));
    }

    #[test]
    fn zero_budget_is_rejected() {
        let args = Args::parse_from(["gatherer_tui", "--budget", "0"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn events_read_naturally() {
        assert_eq!(
            describe_event(&GameEvent::Moved {
                position: Position::new(3, 1),
                tile: Tile::Hindered,
                cost: 5
            }),
            "Waded into mud at (3, 1) +5"
        );
        assert_eq!(
            describe_event(&GameEvent::EpisodeEnded {
                episode_id: 4,
                reason: EndReason::BudgetReached,
                score: 60
            }),
            "Episode 4 ended (BudgetReached) with score 60"
        );
        assert_eq!(
            describe_summary(&EpisodeSummary {
                episode_id: 2,
                score: 10,
                step_cost: 4,
                deliveries: 1,
                aborts: 0,
                end: EpisodeEnd::Exhausted,
            }),
            "Episode 2: score 10, cost 4, 1 deliveries, 0 aborts, Exhausted"
        );
        assert_eq!(
            describe_event(&GameEvent::TargetReached { target: 100 }),
            "Target score of 100 reached!"
        );
        assert_eq!(
            describe_event(&GameEvent::NewHighScore { score: 120 }),
            "New high score: 120!"
        );
    }

    #[test]
    fn human_episode_restarts_after_running_out() {
        let runtime = Runtime::new().unwrap();
        let config = GameConfig {
            budget: 1,
            ..GameConfig::default()
        };
        let handle = {
            let _enter = runtime.enter();
            Session::spawn(config, Some(11)).unwrap()
        };
        let mut app = App::new(handle, 1);

        app.restart(&runtime);
        let first = app.human_episode.unwrap();
        assert!(app.handle.observe_active());

        let state = app.handle.observe_state().unwrap();
        let direction = if state.agent.position.x > 0 {
            Direction::Left
        } else {
            Direction::Right
        };
        app.human_action(Action::Move(direction));

        // Any move spends the whole budget of 1.
        for _ in 0..200 {
            app.tick(&runtime);
            if app.restart_at.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(app.restart_at.is_some());
        assert!(!app.handle.observe_active());

        app.restart_at = Some(Instant::now());
        app.tick(&runtime);
        assert!(app.restart_at.is_none());
        assert!(app.human_episode.unwrap() > first);
        assert!(app.handle.observe_active());
        app.handle.shutdown();
    }

    #[test]
    fn clearing_logs_empties_the_panel() {
        let runtime = Runtime::new().unwrap();
        let handle = {
            let _enter = runtime.enter();
            Session::spawn(GameConfig::default(), Some(5)).unwrap()
        };
        let mut app = App::new(handle, 1);
        assert!(!app.event_log.is_empty());

        app.clear_logs();
        assert!(app.event_log.is_empty());
        for _ in 0..200 {
            app.tick(&runtime);
            if !app.event_log.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(app.event_log.back().map(String::as_str), Some("Logs cleared."));
        app.handle.shutdown();
    }
}
