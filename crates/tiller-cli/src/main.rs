mod action;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tiller_link::{doctor as link_doctor, HttpTransport, LinkConfig, Transport};
use tiller_pilot::command::{CommandError, Dispatcher, RefreshTrigger};
use tiller_pilot::reconcile::{LimitSide, Reconciler, Refresh, View};
use tiller_pilot::scheduler::Scheduler;
use tiller_pilot::state::SharedState;
use tiller_pilot::{doctor as pilot_doctor, PollConfig, StepConfig};

use action::Action;

#[derive(Debug, Parser)]
#[command(name = "tiller", version, about = "Tiller - autopilot monitor & helm console")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the configuration file.
    Doctor,
    /// Monitor the device and take helm actions from stdin.
    Run {
        /// Also print raw interface readings on every update.
        #[arg(long)]
        diagnostics: bool,
    },
    /// Poll once and print the view.
    Status,
    /// Change course by a signed number of degrees (e.g. +10, -1).
    Course {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    Engage,
    Disengage,
    Toggle,
    Pid { #[command(subcommand)] cmd: PidCmd },
    Limit { #[command(subcommand)] side: LimitCmd },
    Biases { #[command(subcommand)] cmd: BiasesCmd },
}

#[derive(Debug, Subcommand)]
enum PidCmd {
    Get,
    Set { p: f64, i: f64, d: f64 },
}

#[derive(Debug, Subcommand)]
enum LimitCmd {
    /// Latch the current rudder reading as the port limit.
    Port,
    /// Latch the current rudder reading as the starboard limit.
    Starboard,
}

#[derive(Debug, Subcommand)]
enum BiasesCmd {
    Get,
    Reset,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    device: LinkConfig,
    #[serde(default)]
    poll: PollConfig,
    #[serde(default)]
    steps: StepConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

/// The control loop's parts, wired to one device.
struct Session {
    reconciler: Arc<Reconciler>,
    dispatcher: Dispatcher,
    refresh_rx: mpsc::UnboundedReceiver<Refresh>,
}

impl Session {
    fn open(cfg: &Config) -> Result<Self> {
        check_config(cfg).context("invalid config (see `tiller doctor`)")?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&cfg.device)?);
        let reconciler = Arc::new(Reconciler::new(transport.clone(), SharedState::default(), cfg.poll.mode));
        let (trigger, refresh_rx) = RefreshTrigger::channel();
        let dispatcher = Dispatcher::new(transport, reconciler.clone(), cfg.steps.clone(), trigger);
        Ok(Self { reconciler, dispatcher, refresh_rx })
    }

    /// Runs the cycles commands asked for and returns the last view.
    async fn settle(&mut self) -> Option<View> {
        let mut last = None;
        while let Ok(request) = self.refresh_rx.try_recv() {
            last = Some(self.reconciler.refresh(request).await);
        }
        last
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg),
        Command::Run { diagnostics } => run(cfg, diagnostics).await,
        cmd => oneshot(&cfg, cmd).await,
    }
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    check_config(cfg)?;
    info!("doctor: OK");
    Ok(())
}

fn check_config(cfg: &Config) -> Result<()> {
    link_doctor::check_link(&cfg.device)?;
    pilot_doctor::check_poll(&cfg.poll)?;
    pilot_doctor::check_steps(&cfg.steps)?;
    Ok(())
}

async fn run(cfg: Config, diagnostics: bool) -> Result<()> {
    info!("run: starting against {}", cfg.device.base_url);
    let Session { reconciler, dispatcher, refresh_rx } = Session::open(&cfg)?;

    let shutdown = CancellationToken::new();
    let scheduler = Scheduler::new(reconciler.clone(), cfg.poll.interval(), refresh_rx)?;
    let scheduler = tokio::spawn(scheduler.run(shutdown.clone()));

    let mut views = reconciler.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("{}", action::HELP);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = views.changed() => {
                if changed.is_err() { break; }
                let view = views.borrow_and_update().clone();
                render(&view, diagnostics);
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else { break };
                match action::parse(&line) {
                    Ok(Action::Quit) => break,
                    Ok(Action::Help) => println!("{}", action::HELP),
                    // Commands are fire-and-forget: the prompt stays live and
                    // the refresh cycle reports the outcome.
                    Ok(a) => {
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            if let Err(e) = perform(&dispatcher, a).await {
                                println!("  ! {}", e);
                            }
                        });
                    }
                    Err(e) => println!("  ! {:#}", e),
                }
            }
        }
    }

    shutdown.cancel();
    scheduler.await.context("scheduler task")?;
    info!("run: stopped");
    Ok(())
}

async fn perform(dispatcher: &Dispatcher, action: Action) -> Result<(), CommandError> {
    match action {
        Action::Course(delta) => dispatcher.adjust_course(delta).await,
        Action::Step(step, direction) => dispatcher.adjust(step, direction).await,
        Action::Engage(enabled) => dispatcher.set_engagement(enabled).await,
        Action::Toggle => dispatcher.toggle_engagement().await,
        Action::Gains(p, i, d) => dispatcher.set_gains(p, i, d).await,
        Action::Limit(side) => dispatcher.set_limit(side).await,
        Action::ResetBiases => dispatcher.reset_biases().await,
        Action::Help | Action::Quit => Ok(()),
    }
}

fn render(view: &View, diagnostics: bool) {
    println!("{}", view);
    if diagnostics {
        println!("  {}", view.diagnostics);
    }
}

async fn oneshot(cfg: &Config, cmd: Command) -> Result<()> {
    let mut session = Session::open(cfg)?;
    // Course commands are gated on live state, so look before acting
    let before = session.reconciler.cycle().await;

    let d = &session.dispatcher;
    let outcome = match cmd {
        Command::Status => {
            print_status(&session, &before);
            return Ok(());
        }
        Command::Course { delta } => d.adjust_course(delta).await,
        Command::Engage => d.set_engagement(true).await,
        Command::Disengage => d.set_engagement(false).await,
        Command::Toggle => d.toggle_engagement().await,
        Command::Pid { cmd: PidCmd::Get } => session.reconciler.refresh_gains().await.map(drop).map_err(Into::into),
        Command::Pid { cmd: PidCmd::Set { p, i, d: dg } } => d.set_gains(p, i, dg).await,
        Command::Limit { side: LimitCmd::Port } => d.set_limit(LimitSide::Port).await,
        Command::Limit { side: LimitCmd::Starboard } => d.set_limit(LimitSide::Starboard).await,
        Command::Biases { cmd: BiasesCmd::Get } => {
            session.reconciler.refresh_biases().await.map(drop).map_err(Into::into)
        }
        Command::Biases { cmd: BiasesCmd::Reset } => d.reset_biases().await,
        Command::Doctor | Command::Run { .. } => anyhow::bail!("not a one-shot command"),
    };

    let view = session.settle().await.unwrap_or(before);
    print_status(&session, &view);
    if let Err(e) = &outcome {
        warn!("command failed: {}", e);
    }
    outcome.context("command not accepted")
}

fn print_status(session: &Session, view: &View) {
    render(view, true);
    let state = session.reconciler.state();
    if let Some(g) = state.read(|s| s.gains()) {
        println!("  gains p={} i={} d={}", g.p, g.i, g.d);
    }
    if let Some(b) = state.read(|s| s.biases()) {
        println!(
            "  biases gyro=({}, {}, {}) accel=({}, {}, {})",
            b.gyro_x, b.gyro_y, b.gyro_z, b.accel_x, b.accel_y, b.accel_z
        );
    }
    if let Some(t) = state.read(|s| s.updated_at()) {
        println!("  updated {:02}:{:02}:{:02} UTC", t.hour(), t.minute(), t.second());
    }
}
