use anyhow::{Context, Result, ensure};
use clap::Parser;
use grid_mdp_core::{
    Action, Cell, GridMdpSolver, GridWorld, Solution, SolverConfig, WalkOutcome,
    wire::{TrainRequest, TrainResponse},
    world::load_world_from_string,
};
use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::HashSet,
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Token map file to load
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// JSON request file (`gridSize`, `startPos`, `goalPos`, `obstacles`)
    #[arg(short, long, value_name = "REQUEST_FILE", conflicts_with = "map")]
    request: Option<PathBuf>,

    /// Generate a random grid of this size instead of loading one
    #[arg(long, value_name = "SIZE", conflicts_with_all = ["map", "request"])]
    random: Option<usize>,

    /// Probability that a cell of a random grid is an obstacle
    #[arg(long, default_value_t = 0.2)]
    density: f64,

    /// Seed for random grids
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Discount factor
    #[arg(long, default_value_t = 0.9)]
    gamma: f64,

    /// Convergence threshold on the largest value change per sweep
    #[arg(long, default_value_t = 1e-3)]
    threshold: f64,

    /// Maximum number of value iteration sweeps
    #[arg(long, default_value_t = 1000)]
    max_iterations: usize,

    /// Print the solution as JSON and exit
    #[arg(long)]
    json: bool,
}

/// Where the current grid came from.
enum Source {
    Fixed,
    Random {
        size: usize,
        density: f64,
        seed: u64,
    },
}

struct App {
    solver: GridMdpSolver,
    world: GridWorld,
    solution: Solution,
    source: Source,
    /// Index into the path of the animated agent marker.
    walker: usize,
    /// Show Q-values instead of policy arrows.
    show_values: bool,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(solver: GridMdpSolver, world: GridWorld, source: Source) -> Self {
        let solution = solver.solve(&world);
        App {
            solver,
            world,
            solution,
            source,
            walker: 0,
            show_values: false,
            should_quit: false,
        }
    }

    /// Advances the agent marker one cell along the traced path.
    fn tick(&mut self) {
        if self.walker + 1 < self.solution.path.cells.len() {
            self.walker += 1;
        }
    }

    /// Draws a fresh random layout with the next seed and solves it.
    fn reroll(&mut self) -> Result<()> {
        if let Source::Random {
            size,
            density,
            seed,
        } = &mut self.source
        {
            *seed += 1;
            self.world = random_world(*size, *density, *seed)?;
            self.solution = self.solver.solve(&self.world);
            self.walker = 0;
            info!("re-rolled grid with seed {}", seed);
        }
        Ok(())
    }

    fn toggle_values(&mut self) {
        self.show_values = !self.show_values;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Parse command line arguments
    let args = Args::parse();

    let config = SolverConfig::default()
        .gamma(args.gamma)
        .threshold(args.threshold)
        .max_iterations(args.max_iterations);
    let solver = GridMdpSolver::new(config)?;
    let (world, source) = load_world(&args)?;

    if args.json {
        let solution = solver.solve(&world);
        let response = TrainResponse::from_solution(&solution, world.size());
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Create the application state
    let mut app = App::new(solver, world, source);

    // Run the main application loop, restoring the terminal even if it fails
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    result
}

/// Builds the world from whichever input source the arguments select.
fn load_world(args: &Args) -> Result<(GridWorld, Source)> {
    if let Some(size) = args.random {
        let world = random_world(size, args.density, args.seed)?;
        let source = Source::Random {
            size,
            density: args.density,
            seed: args.seed,
        };
        return Ok((world, source));
    }

    if let Some(path) = &args.request {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?;
        let request: TrainRequest = serde_json::from_str(&text)
            .with_context(|| format!("Malformed request file: {}", path.display()))?;
        return Ok((request.to_world()?, Source::Fixed));
    }

    // If no map file is provided, use the default map
    let map_file = args
        .map
        .clone()
        .unwrap_or_else(|| PathBuf::from("maps/maze01.txt"));
    ensure!(
        map_file.exists(),
        "Map file does not exist: {}",
        map_file.display()
    );
    let text = std::fs::read_to_string(&map_file)
        .with_context(|| format!("Failed to read map file: {}", map_file.display()))?;
    let world = load_world_from_string(&text)
        .with_context(|| format!("Failed to load map: {}", map_file.display()))?;
    Ok((world, Source::Fixed))
}

/// Random obstacle layout with the start in the top-left and the goal in the bottom-right corner.
fn random_world(size: usize, density: f64, seed: u64) -> Result<GridWorld> {
    ensure!(size > 0, "Random grid size must be positive");
    ensure!(
        (0.0..=1.0).contains(&density),
        "Obstacle density must be within [0, 1], got {}",
        density
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let start = Cell::new(0, 0);
    let goal = Cell::new(size - 1, size - 1);
    let mut obstacles = Vec::new();
    for row in 0..size {
        for col in 0..size {
            let cell = Cell::new(row, col);
            if cell != start && cell != goal && rng.random_bool(density) {
                obstacles.push(cell);
            }
        }
    }

    Ok(GridWorld::new(size, start, goal, obstacles)?)
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
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char('v') => app.toggle_values(),
                    KeyCode::Char('r') => app.reroll()?,
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Area for the grid
            Constraint::Percentage(20), // Area for the solution summary
            Constraint::Percentage(10), // Area for help
        ])
        .split(frame.area());

    render_grid(frame, main_layout[0], app);
    render_summary(frame, main_layout[1], app);

    let help = match app.source {
        Source::Random { .. } => "'v' values/arrows  'r' re-roll  'q'/'Esc' quit",
        Source::Fixed => "'v' values/arrows  'q'/'Esc' quit",
    };
    let help_text = Paragraph::new(help)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn arrow(action: Action) -> &'static str {
    match action {
        Action::Up => "↑",
        Action::Down => "↓",
        Action::Left => "←",
        Action::Right => "→",
    }
}

fn describe(outcome: WalkOutcome) -> String {
    match outcome {
        WalkOutcome::ReachedGoal => "reached goal".to_string(),
        WalkOutcome::Cycle(cell) => format!("cycle at {}", cell),
        WalkOutcome::NoPolicy(cell) => format!("no action at {}", cell),
        WalkOutcome::Blocked(cell) => format!("blocked at {}", cell),
    }
}

/// Renders the grid with policy arrows or values, the path and the agent marker.
fn render_grid(frame: &mut Frame, area: Rect, app: &App) {
    let world = &app.world;
    let solution = &app.solution;
    let on_path: HashSet<Cell> = solution.path.cells.iter().copied().collect();
    let agent = solution.path.cells.get(app.walker).copied();
    let width = if app.show_values { 7 } else { 3 };

    let mut lines: Vec<Line> = Vec::with_capacity(world.size());
    for row in 0..world.size() {
        let mut spans: Vec<Span> = Vec::with_capacity(world.size());
        for col in 0..world.size() {
            let cell = Cell::new(row, col);
            let (text, style) = if world.is_obstacle(cell) {
                ("#".repeat(width), Style::default().fg(Color::DarkGray))
            } else if Some(cell) == agent {
                ("@".to_string(), Style::default().fg(Color::Red).bold())
            } else if cell == world.goal() {
                ("G".to_string(), Style::default().fg(Color::Green).bold())
            } else if cell == world.start() {
                ("S".to_string(), Style::default().fg(Color::Yellow).bold())
            } else {
                let text = if app.show_values {
                    solution
                        .q_values
                        .get(&cell)
                        .map(|q| format!("{:.3}", q))
                        .unwrap_or_default()
                } else {
                    solution
                        .policy
                        .get(&cell)
                        .map(|a| arrow(*a).to_string())
                        .unwrap_or_default()
                };
                let style = if on_path.contains(&cell) {
                    Style::default().fg(Color::Cyan)
                } else {
                    Style::default()
                };
                (text, style)
            };
            spans.push(Span::styled(format!("{:^width$}", text), style));
        }
        lines.push(Line::from(spans));
    }

    let title = format!("Grid {}x{}", world.size(), world.size());
    let grid_paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(grid_paragraph, area);
}

/// Renders reachability, convergence and path details.
fn render_summary(frame: &mut Frame, area: Rect, app: &App) {
    let solution = &app.solution;
    let path = &solution.path;

    let reachable = if path.reachable {
        Span::styled("reachable", Style::default().fg(Color::Green))
    } else {
        Span::styled("unreachable", Style::default().fg(Color::Red))
    };
    let config = app.solver.config();
    let converged = if solution.converged {
        format!("converged after {} sweeps", solution.iterations)
    } else {
        format!("not converged after {} sweeps", solution.iterations)
    };
    let start_q = solution
        .q_values
        .get(&app.world.start())
        .copied()
        .unwrap_or_default();

    let items = vec![
        ListItem::from(Line::from(vec![
            Span::raw("Goal: "),
            reachable,
            Span::raw(format!(" ({})", describe(path.outcome))),
        ])),
        ListItem::from(format!(
            "Value iteration: {} (gamma {}, threshold {:e})",
            converged, config.gamma, config.threshold
        )),
        ListItem::from(format!(
            "Path: {} cells, start Q-value {:.4}",
            path.cells.len(),
            start_q
        )),
    ];

    let summary = List::new(items).block(Block::default().borders(Borders::ALL).title("Solution"));
    frame.render_widget(summary, area);
}
