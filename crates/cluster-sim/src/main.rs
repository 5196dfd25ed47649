//! Cluster-pays headless simulator
//!
//! Usage:
//!   cluster-sim spin                 - Play one spin and print its stages
//!   cluster-sim autoplay <n>         - Run an autoplay session of n spins
//!   cluster-sim autoplay 0 --buy     - Buy the bonus and autoplay its free spins
//!   cluster-sim simulate <n>         - Play n paid spins flat out, report stats

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cluster_engine::cluster_stage::{Stage, StageEvent, StageTrace};
use cluster_engine::{
    AutoplayConfig, AutoplayScheduler, InMemoryAccount, InstantPresentation, SessionStats, SlotConfig,
    SpinError, SpinMode, SpinOrchestrator, TimingProfile,
};
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "cluster-sim", about = "Cluster-pays slot simulator")]
struct Cli {
    /// Slot config file (.json, .yaml or .yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// RNG seed for reproducible runs
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    /// Base bet (overrides the config)
    #[arg(short, long, global = true)]
    bet: Option<f64>,

    /// Starting balance
    #[arg(long, global = true, default_value_t = 1000.0)]
    balance: f64,

    /// Spin mode: standard, enhanced-bet, feature-buy
    #[arg(short, long, global = true, default_value = "standard", value_parser = parse_mode)]
    mode: SpinMode,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single spin and print its stage events
    Spin {
        /// Write the stage trace as JSON
        #[arg(long)]
        trace: Option<PathBuf>,
    },
    /// Run an autoplay session
    Autoplay {
        /// Paid spins to play (ignored with --buy)
        spins: u32,
        /// Pacing: normal, turbo, studio
        #[arg(long, default_value = "studio", value_parser = parse_timing)]
        timing: TimingProfile,
        /// Buy the bonus round and autoplay its free spins
        #[arg(long)]
        buy: bool,
    },
    /// Play paid spins without pacing and report session statistics
    Simulate {
        /// Paid spins to play
        spins: u64,
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_mode(value: &str) -> Result<SpinMode, String> {
    SpinMode::parse(value).ok_or_else(|| format!("unknown spin mode '{value}'"))
}

fn parse_timing(value: &str) -> Result<TimingProfile, String> {
    match value.to_ascii_lowercase().as_str() {
        "normal" => Ok(TimingProfile::Normal),
        "turbo" => Ok(TimingProfile::Turbo),
        "studio" => Ok(TimingProfile::Studio),
        _ => Err(format!("unknown timing profile '{value}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Spin { ref trace } => run_spin(config, &cli, trace.as_deref()).await,
        Commands::Autoplay { spins, timing, buy } => run_autoplay(config, &cli, spins, timing, buy).await,
        Commands::Simulate { spins, json } => run_simulation(config, &cli, spins, json).await,
    }
}

fn load_config(cli: &Cli) -> Result<SlotConfig> {
    let mut config = match &cli.config {
        Some(path) => SlotConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SlotConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(bet) = cli.bet {
        config.pricing.bet = bet;
    }
    Ok(config)
}

fn build(config: SlotConfig, balance: f64) -> Result<Arc<SpinOrchestrator>> {
    let orchestrator = SpinOrchestrator::new(
        config,
        Arc::new(InMemoryAccount::new(balance)),
        Arc::new(InstantPresentation),
    )
    .context("Invalid slot configuration")?;
    Ok(Arc::new(orchestrator))
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════

async fn run_spin(config: SlotConfig, cli: &Cli, trace_path: Option<&Path>) -> Result<()> {
    let orchestrator = build(config, cli.balance)?;
    let mut events = orchestrator.subscribe();

    let attempt = orchestrator.spin(cli.mode).await?;
    let Some(summary) = attempt.summary() else {
        bail!("Spin was ignored");
    };

    let mut trace = StageTrace::new(format!("spin-{}", summary.spin_index));
    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
        trace.push(event);
    }

    println!();
    println!(
        "Win {:.2} ({:.1}x) in {} tumbles, balance {:.2}",
        summary.total_win, summary.win_ratio, summary.tumble_steps, summary.balance
    );
    if let Some(tier) = summary.tier {
        println!("{}", tier.display_name());
    }

    if let Some(path) = trace_path {
        std::fs::write(path, trace.to_json()?)
            .with_context(|| format!("Failed to write trace to {}", path.display()))?;
        println!("Trace written to {}", path.display());
    }
    Ok(())
}

async fn run_autoplay(
    config: SlotConfig,
    cli: &Cli,
    spins: u32,
    timing: TimingProfile,
    buy: bool,
) -> Result<()> {
    let orchestrator = build(config, cli.balance)?;
    orchestrator.set_turbo(timing == TimingProfile::Turbo);
    let scheduler = AutoplayScheduler::new(Arc::clone(&orchestrator), AutoplayConfig::from_profile(timing));

    let printer = tokio::spawn(print_settled(orchestrator.subscribe()));
    let mut autoplay = scheduler.subscribe();

    if buy {
        orchestrator.spin(SpinMode::FeatureBuy).await?;
        scheduler.start_free_spins()?;
    } else {
        scheduler.start(spins, cli.mode)?;
    }
    wait_for_stop(&mut autoplay).await?;

    printer.abort();
    print_stats(&orchestrator.stats(), orchestrator.balance());
    Ok(())
}

async fn run_simulation(config: SlotConfig, cli: &Cli, spins: u64, json: bool) -> Result<()> {
    let price = config.pricing.price(cli.mode.paid_kind(), config.pricing.bet);
    let orchestrator = build(config, cli.balance.max(price * spins as f64))?;
    let report_every = (spins / 10).max(1);
    let started = Instant::now();

    loop {
        let stats = orchestrator.stats();
        let in_bonus = orchestrator.in_bonus();
        if stats.paid_spins >= spins && !in_bonus {
            break;
        }
        let mode = if in_bonus { SpinMode::Standard } else { cli.mode };
        match orchestrator.spin(mode).await {
            Ok(_) => {}
            Err(SpinError::InsufficientBalance { required, available }) => {
                log::warn!("[Sim] Out of balance: required {:.2}, available {:.2}", required, available);
                break;
            }
            Err(e) => return Err(e.into()),
        }
        let paid = orchestrator.stats().paid_spins;
        if !in_bonus && paid % report_every == 0 {
            log::info!("[Sim] {}/{} paid spins", paid, spins);
        }
    }

    let stats = orchestrator.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats, orchestrator.balance());
        println!("  Elapsed:          {:.2?}", started.elapsed());
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════

fn print_event(event: &StageEvent) -> Result<()> {
    println!(
        "[{:>8.2}ms] #{:<4} {:<24} {}",
        event.timestamp_ms,
        event.spin_index,
        event.type_name(),
        serde_json::to_string(&event.stage)?
    );
    Ok(())
}

async fn print_settled(mut events: broadcast::Receiver<StageEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match event.stage {
                Stage::SpinSettled {
                    total_win, tier, ..
                } => {
                    let tier = tier.map(|t| t.display_name()).unwrap_or("");
                    println!("Spin #{:<5} win {:>10.2} {}", event.spin_index, total_win, tier);
                }
                Stage::BonusEntered { free_spins, .. } => {
                    println!("  Bonus entered: {} free spins", free_spins);
                }
                Stage::BonusEnded { bonus_win } => {
                    println!("  Bonus ended: {:.2}", bonus_win);
                }
                _ => {}
            },
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn wait_for_stop(events: &mut broadcast::Receiver<StageEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(StageEvent {
                stage: Stage::AutoplayStop { reason, spins_played },
                ..
            }) => {
                println!("Autoplay stopped after {} spins: {}", spins_played, reason.display_name());
                return Ok(());
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => bail!("Autoplay channel closed"),
        }
    }
}

fn print_stats(stats: &SessionStats, balance: f64) {
    println!();
    println!("Session");
    println!("  Spins:            {} ({} paid, {} free)", stats.total_spins, stats.paid_spins, stats.free_spins_played);
    println!("  Staked:           {:.2}", stats.total_staked);
    println!("  Won:              {:.2}", stats.total_won);
    println!("  RTP:              {:.2}%", stats.rtp());
    println!("  Hit rate:         {:.2}%", stats.hit_rate());
    println!("  Bonus triggers:   {} (+{} retriggers)", stats.bonus_triggers, stats.retriggers);
    println!("  Max win:          {:.1}x", stats.max_win_ratio);
    println!("  Longest tumbles:  {}", stats.longest_tumble_chain);
    if stats.tumble_ceiling_hits > 0 {
        println!("  Ceiling hits:     {}", stats.tumble_ceiling_hits);
    }
    println!("  Balance:          {:.2}", balance);
}
