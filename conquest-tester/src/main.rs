mod common;
mod logic;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use common::util::{load_map, load_rules, parse_seeds, run_stamp, split_csv};
use logic::{GameTester, LogicTester, ScenarioResult};
use scenario::{TestScenario, all_scenario_keys, get_scenario, list_scenarios};

#[derive(Debug, Parser)]
#[command(name = "conquest-tester", version = "0.1.0")]
#[command(about = "Automated QA for the Conquest rules engine: scripted seeded games")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Seat this many players in every scenario
    #[arg(long)]
    players: Option<usize>,

    /// Stop every game after this many turns
    #[arg(long)]
    max_turns: Option<u32>,

    /// JSON map to play on instead of the classic board
    #[arg(long)]
    map: Option<PathBuf>,

    /// JSON rules to play with instead of the classic rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    let map = load_map(args.map.as_deref())?;
    let rules = args.rules.as_deref().map(load_rules).transpose()?;
    log::info!(
        "playing on {} ({} territories) with seeds {seeds:?}",
        map.name,
        map.territories.len()
    );

    let game_tester = GameTester::new(Arc::new(map), args.verbose);
    let scenarios = resolve_scenarios(&args, rules.as_ref());
    let results = run_logic_scenarios(&args, &scenarios, &seeds, game_tester);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎮 Conquest Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
    println!("Run {}", run_stamp().dimmed());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for key in all_scenario_keys() {
            if !scenarios.contains(&key) {
                scenarios.push(key);
            }
        }
    }
    scenarios
}

/// Look up every requested scenario and apply the command-line overrides.
fn resolve_scenarios(
    args: &Args,
    rules: Option<&conquest_game::RulesConfig>,
) -> Vec<TestScenario> {
    let mut resolved = Vec::new();
    for name in expand_scenarios(&args.scenarios) {
        let Some(mut scenario) = get_scenario(&name) else {
            eprintln!("⚠️  Unknown scenario: {}", name.yellow());
            continue;
        };
        if let Some(players) = args.players {
            scenario.plan.players = players;
        }
        if let Some(max_turns) = args.max_turns {
            scenario.plan.max_turns = Some(max_turns);
        }
        if let Some(rules) = rules {
            scenario.plan.rules = rules.clone();
        }
        resolved.push(scenario);
    }
    resolved
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[TestScenario],
    seeds: &[u64],
    game_tester: GameTester,
) -> Vec<ScenarioResult> {
    println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());

    let logic_tester = LogicTester::new(game_tester, args.verbose);
    scenarios
        .iter()
        .flat_map(|scenario| logic_tester.run_scenario(scenario, seeds, args.iterations))
        .collect()
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(&mut output_target, "[]")?;
            } else {
                logic::reports::generate_json_report(&mut output_target, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Conquest Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            let duration = start_time.elapsed();
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
