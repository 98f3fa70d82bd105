#![deny(warnings)]

//! Headless CLI: play a scenario with an autoplay strategy and print the report.

use anyhow::{bail, Context as _, Result};
use sdlc_autoplay::{play, Chooser, Strategy};
use sdlc_catalog::ScenarioCatalog;
use sdlc_core::{Scenario, Track};
use sdlc_outcome::TrackConfig;
use sdlc_runtime::{confirm, present, report_for, track_controller, SimulationController};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Run settings read from `--config`. Flags override every field.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
struct PlayConfig {
    scenario: Option<String>,
    strategy: Option<String>,
    seed: Option<u64>,
    scenarios_dir: Option<PathBuf>,
    json: bool,
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    play: PlayConfig,
    config: Option<PathBuf>,
    list: bool,
    track: Option<String>,
    version: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = |name: &str| it.next().with_context(|| format!("{name} needs a value"));
        match arg.as_str() {
            "--scenario" => out.play.scenario = Some(value("--scenario")?),
            "--strategy" => out.play.strategy = Some(value("--strategy")?),
            "--seed" => {
                let raw = value("--seed")?;
                out.play.seed = Some(raw.parse().with_context(|| format!("bad --seed {raw}"))?);
            }
            "--scenarios-dir" => out.play.scenarios_dir = Some(value("--scenarios-dir")?.into()),
            "--config" => out.config = Some(value("--config")?.into()),
            "--track" => out.track = Some(value("--track")?),
            "--json" => out.play.json = true,
            "--list" => out.list = true,
            "--version" => out.version = true,
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(out)
}

fn load_config(path: &Path) -> Result<PlayConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Fill every field the flags left unset from `file`.
fn merge(flags: PlayConfig, file: PlayConfig) -> PlayConfig {
    PlayConfig {
        scenario: flags.scenario.or(file.scenario),
        strategy: flags.strategy.or(file.strategy),
        seed: flags.seed.or(file.seed),
        scenarios_dir: flags.scenarios_dir.or(file.scenarios_dir),
        json: flags.json || file.json,
    }
}

fn print_listing(catalog: &ScenarioCatalog, track: Option<Track>) {
    let scenarios: Vec<&Scenario> = match track {
        Some(t) => catalog.list_scenarios(t),
        None => catalog.scenarios().iter().collect(),
    };
    for s in scenarios {
        println!(
            "{:<22} {:<10} {} ({} phases)",
            s.id,
            s.track,
            s.title,
            s.phase_count()
        );
    }
}

/// Step through the run phase by phase, printing each choice.
fn play_verbose(ctrl: &mut SimulationController, strategy: Strategy) -> Result<()> {
    let scenario = ctrl.scenario().cloned().context("no scenario loaded")?;
    let config = TrackConfig::for_track(scenario.track);
    let mut chooser = Chooser::new(strategy);
    let total = ctrl.total_phases();

    while let Some(phase) = ctrl.current_phase().cloned() {
        println!("== Phase {}/{}: {} ==", ctrl.phase_index() + 1, total, phase.title);
        println!("{}", phase.narrative.trim());
        ctrl.acknowledge_phase_intro()?;

        let pick = chooser
            .choose(&phase, ctrl.live_context(), &scenario.initial_context, config)
            .cloned()
            .with_context(|| format!("phase {} offers no decisions", phase.id))?;
        for option in present(&phase, ctrl.live_context()) {
            let marker = if option.decision.id == pick.id { '*' } else { ' ' };
            let impacts: Vec<String> = option
                .impacts
                .iter()
                .map(|i| format!("{} {}", i.label, i.display))
                .collect();
            println!(" {marker} {} [{}]", option.decision.title, impacts.join(", "));
        }

        let receipt = confirm(ctrl, &pick)?;
        println!("   -> {}", receipt.entry.outcome_text);
        if let Some(view) = track_controller(ctrl) {
            println!(
                "   health: {} ({:.1}) | progress {:.0}%",
                view.project_health.label(),
                view.project_score,
                view.progress_pct
            );
        }
        println!();
    }
    Ok(())
}

fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!(
            "sdlc-sim cli {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }
    let play_cfg = match &args.config {
        Some(path) => merge(args.play.clone(), load_config(path)?),
        None => args.play.clone(),
    };

    let mut catalog = ScenarioCatalog::builtin()?;
    if let Some(dir) = &play_cfg.scenarios_dir {
        let n = catalog.load_dir(dir)?;
        info!(dir = %dir.display(), loaded = n, "extra scenarios");
    }

    if args.list {
        let track = match &args.track {
            Some(name) => Some(Track::parse(name).with_context(|| format!("unknown track {name}"))?),
            None => None,
        };
        print_listing(&catalog, track);
        return Ok(());
    }

    let Some(id) = play_cfg.scenario.as_deref() else {
        bail!("--scenario <id> is required (see --list)");
    };
    let strategy = Strategy::named(
        play_cfg.strategy.as_deref().unwrap_or("first"),
        play_cfg.seed.unwrap_or(42),
    )?;
    info!(scenario = id, %strategy, "starting CLI");

    let mut ctrl = SimulationController::new();
    ctrl.start_scenario(&catalog, id)?;

    if play_cfg.json {
        play(&mut ctrl, strategy)?;
        let report = report_for(&ctrl).context("run did not complete")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        play_verbose(&mut ctrl, strategy)?;
        let report = report_for(&ctrl).context("run did not complete")?;
        print!("{report}");
    }
    Ok(())
}
