//! sysdesign-runner: headless evaluation runner for the system-design game.
//!
//! Usage:
//!   sysdesign-runner --design demos/tinyurl.json --ticks 30 --step 1
//!   sysdesign-runner --design demos/tinyurl.json --scenarios data/scenarios.json --db designs.db
//!   sysdesign-runner --ipc-mode

use anyhow::{bail, Context, Result};
use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use sysdesign_core::{
    catalog,
    config::EngineConfig,
    design::Design,
    engine::SimEngine,
    evaluation::EvaluationResult,
    service::EvaluationService,
    session::Session,
    state::EngineState,
    store::{DesignRepository, MemoryDesignStore, MemoryScenarioStore, SqliteDesignStore},
    world::GameState,
};

const STARTING_BALANCE: f64 = 1_000.0;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Evaluate {
        design_id: String,
        elapsed: f64,
        #[serde(default)]
        state: Option<EngineState>,
    },
    SaveDesign {
        design: Design,
    },
    ListScenarios,
    ListComponents,
    Restart {
        state: EngineState,
        component_id: String,
        at: f64,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ticks = parse_arg(&args, "--ticks", 30u32);
    let step = parse_arg(&args, "--step", 1.0f64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let design_path = arg_str(&args, "--design");
    let scenario_override = arg_str(&args, "--scenario");
    let scenarios_path = arg_str(&args, "--scenarios");
    let config_path = arg_str(&args, "--config");
    let db = arg_str(&args, "--db");

    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let scenarios = match scenarios_path {
        Some(path) => MemoryScenarioStore::from_file(path)?,
        None => MemoryScenarioStore::with_builtin(),
    };
    let designs: Arc<dyn DesignRepository> = match db {
        Some(path) => {
            let store = SqliteDesignStore::open(path)?;
            store.migrate()?;
            Arc::new(store)
        }
        None => Arc::new(MemoryDesignStore::new()),
    };
    let service = EvaluationService::new(SimEngine::new(config), designs, Arc::new(scenarios));

    if ipc_mode {
        return run_ipc_loop(&service);
    }

    let Some(design_path) = design_path else {
        bail!("--design FILE is required outside --ipc-mode");
    };
    let content = std::fs::read_to_string(design_path)
        .with_context(|| format!("reading design {design_path}"))?;
    let mut design: Design = serde_json::from_str(&content)
        .with_context(|| format!("parsing design {design_path}"))?;
    if let Some(id) = scenario_override {
        design.scenario_id = id.to_string();
    }

    println!("System Design Game: sysdesign-runner");
    println!("  started:   {}", chrono::Utc::now().to_rfc3339());
    println!("  design:    {design_path}");
    println!("  scenario:  {}", design.scenario_id);
    println!("  ticks:     {ticks}");
    println!("  step:      {step}s");
    println!("  db:        {}", db.unwrap_or(":memory:"));
    println!();

    let design_id = service.save_design(design)?;
    let design = service.get_design(&design_id)?;
    let scenario = service.get_scenario(&design.scenario_id)?;
    let game = GameState::new(design.player_id.clone(), STARTING_BALANCE);
    let mut session = Session::new(service.engine().clone(), design, scenario, game)?;

    let mut results = Vec::with_capacity(ticks as usize);
    for _ in 0..ticks {
        let r = session.advance(step)?;
        print_tick(&r);
        results.push(r);
    }
    print_summary(&session, &results);
    Ok(())
}

fn run_ipc_loop(service: &EvaluationService) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        if matches!(cmd, IpcCommand::Quit) {
            break;
        }
        match handle_command(service, cmd) {
            Ok(reply) => writeln!(stdout, "{reply}")?,
            Err(e) => {
                log::warn!("ipc command failed: {e:#}");
                write_error(&mut stdout, &e.to_string())?;
            }
        }
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(service: &EvaluationService, cmd: IpcCommand) -> Result<serde_json::Value> {
    let reply = match cmd {
        IpcCommand::Evaluate { design_id, elapsed, state } => {
            let eval = match state {
                Some(state) => service.evaluate(&design_id, elapsed, &state)?,
                None => service.evaluate_snapshot(&design_id, elapsed)?,
            };
            serde_json::to_value(eval)?
        }
        IpcCommand::SaveDesign { design } => {
            let design_id = service.save_design(design)?;
            serde_json::json!({ "design_id": design_id })
        }
        IpcCommand::ListScenarios => serde_json::to_value(service.list_scenarios()?)?,
        IpcCommand::ListComponents => serde_json::to_value(catalog::blueprints())?,
        IpcCommand::Restart { mut state, component_id, at } => {
            state.restart(&component_id, at);
            serde_json::to_value(state)?
        }
        IpcCommand::Quit => serde_json::Value::Null,
    };
    Ok(reply)
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(out, "{err_json}")?;
    out.flush()?;
    Ok(())
}

fn print_tick(r: &EvaluationResult) {
    let crashed = if r.crashed_component_ids.is_empty() {
        String::new()
    } else {
        format!(" | crashed: {}", r.crashed_component_ids.join(","))
    };
    println!(
        "  t={:>6.1}s | offered {:>9.1} | served {:>9.1} | latency {:>7.1}ms | score {:>5.1}{}",
        r.elapsed_seconds, r.offered_rps, r.fulfilled_rps, r.avg_latency_ms, r.total_score, crashed
    );
}

fn print_summary(session: &Session, results: &[EvaluationResult]) {
    let n = results.len().max(1) as f64;
    let avg_score = results.iter().map(|r| r.total_score).sum::<f64>() / n;
    let avg_success = results.iter().map(|r| r.success_rate).sum::<f64>() / n;
    let passed = results.iter().filter(|r| r.passed).count();
    let game = session.game();

    println!();
    println!("=== RUN SUMMARY ===");
    println!("  design:         {}", session.design().id);
    println!("  scenario:       {}", session.scenario().id);
    println!("  ticks run:      {}", results.len());
    println!("  final offset:   {:.1}s", session.elapsed());
    println!("  avg score:      {avg_score:.1}");
    println!("  avg success:    {:.1}%", avg_success * 100.0);
    println!("  ticks passed:   {passed}");
    println!("  still crashed:  {}", session.state().crashed.len());

    println!();
    println!("=== WORLD ===");
    println!("  balance:        ${:.2}", game.balance);
    println!("  total users:    {}", game.total_users);
    println!("  health:         {:.1}", game.system_health);
    println!("  uptime:         {:.0}s", game.uptime);
    if let Some(last) = results.last() {
        println!();
        println!("=== FINAL SCORES ===");
        for s in &last.scores {
            println!("  {:<12} {:>5.1}  {}", s.dimension, s.value, s.comment);
        }
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn arg_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
