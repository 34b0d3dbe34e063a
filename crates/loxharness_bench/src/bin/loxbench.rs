//! Time one host-side Fibonacci evaluation.
//!
//! ## Examples
//! Run from the workspace root:
//! ```bash
//! cargo run --release -p loxharness_bench --bin loxbench -- --n 35 --strategy both
//! ```

use clap::{Parser, ValueEnum};

use std::process;

use loxharness_bench::{DEFAULT_N, MAX_N, Measurement, Strategy, measure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Plain,
    Memoized,
    Both,
}

impl StrategyArg {
    fn strategies(self) -> &'static [Strategy] {
        match self {
            StrategyArg::Plain => &[Strategy::Plain],
            StrategyArg::Memoized => &[Strategy::Memoized],
            StrategyArg::Both => &[Strategy::Plain, Strategy::Memoized],
        }
    }
}

/// Host-side Fibonacci baseline for Lox interpreter timings
#[derive(Parser, Debug)]
#[command(name = "loxbench", version, about, long_about = None)]
struct Args {
    /// Fibonacci term to compute (at most 93)
    #[arg(long, default_value_t = DEFAULT_N, value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_N)))]
    n: u32,

    /// Evaluation strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::Plain)]
    strategy: StrategyArg,
}

fn report(m: &Measurement, labelled: bool) {
    if labelled {
        println!("[{}]", m.strategy);
    }
    println!("{}", m.value);
    println!("Took {} us.", m.micros());
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let args = Args::parse();
    let strategies = args.strategy.strategies();
    for strategy in strategies {
        match measure(*strategy, args.n) {
            Ok(m) => report(&m, strategies.len() > 1),
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(2);
            }
        }
    }
}
