//! `galley-sim` command line: chaos simulation and offline scoring

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use galley_core::GalleyConfig;
use galley_sim::{compressed_backoff, run_simulator, ChaosRates, ScoreInput, SimulatorConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("galley-sim")
        .version(galley_core::VERSION)
        .about("Galley failure-isolation simulator")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run sessions against a failure-injecting remote")
                .arg(
                    Arg::new("sessions")
                        .long("sessions")
                        .default_value("100")
                        .value_parser(value_parser!(u64))
                        .help("Number of sessions to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(rate_arg("quota-rate", "0.05", "Probability of a quota answer"))
                .arg(rate_arg("transient-rate", "0.15", "Probability of a transient failure"))
                .arg(rate_arg("permanent-rate", "0.05", "Probability of a permanent failure"))
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Session configuration (TOML); backoff is compressed otherwise"),
                )
                .arg(
                    Arg::new("stop-on-violation")
                        .long("stop-on-violation")
                        .action(ArgAction::SetTrue)
                        .help("Stop simulation on first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("score")
                .about("Score a saved {ingredients, protocol} document")
                .arg(
                    Arg::new("input")
                        .long("input")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the JSON document"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Take fusion parameters from this TOML file"),
                ),
        )
}

fn rate_arg(name: &'static str, default: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .default_value(default)
        .value_parser(value_parser!(f64))
        .help(help)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<Option<GalleyConfig>> {
    args.get_one::<PathBuf>("config")
        .map(|path| {
            GalleyConfig::load(path).with_context(|| format!("loading {}", path.display()))
        })
        .transpose()
}

async fn simulate(args: &ArgMatches) -> anyhow::Result<bool> {
    let rate = |name: &str| args.get_one::<f64>(name).copied().unwrap_or_default();
    let config = SimulatorConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
        sessions: args.get_one::<u64>("sessions").copied().unwrap_or(100),
        rates: ChaosRates {
            quota: rate("quota-rate"),
            transient: rate("transient-rate"),
            permanent: rate("permanent-rate"),
        },
        galley: load_config(args)?
            .unwrap_or_else(|| compressed_backoff(GalleyConfig::default())),
        stop_on_first_violation: args.get_flag("stop-on-violation"),
    };

    let report = run_simulator(config).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.passed())
}

fn score(args: &ArgMatches) -> anyhow::Result<()> {
    let path = args
        .get_one::<PathBuf>("input")
        .context("--input is required")?;
    let params = load_config(args)?.unwrap_or_default().fusion;

    let breakdown = ScoreInput::load(path)?.score(params);
    println!("{}", serde_json::to_string_pretty(&breakdown)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            if !simulate(args).await? {
                std::process::exit(1);
            }
        }
        Some(("score", args)) => score(args)?,
        _ => unreachable!("clap requires a subcommand"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn simulate_defaults() {
        let matches = cli().get_matches_from(["galley-sim", "simulate", "--quota-rate", "0.2"]);
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_one::<u64>("sessions"), Some(&100));
        assert_eq!(args.get_one::<f64>("quota-rate"), Some(&0.2));
        assert!(load_config(args).unwrap().is_none());
    }

    #[test]
    fn score_requires_input() {
        assert!(cli().try_get_matches_from(["galley-sim", "score"]).is_err());
    }
}
