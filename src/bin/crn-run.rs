//! Demo CLI: builds one of a handful of built-in reaction networks and
//! prints a CSV trajectory to stdout. The runnable analogue of the
//! doc-comment examples in `lib.rs`, since this crate has no Python
//! binding layer to demonstrate itself through.

use std::collections::HashMap;

use clap::{Parser, ValueEnum};
use crn_ssa::{Gillespie, RunOpts};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    /// S + I -> 2 I @ 1e-4, I -> R @ 0.01
    Sir,
    /// A -> P @ "V * A / (Km + A)"
    MichaelisMenten,
    /// () -> A @ birth, A -> () @ decay
    BirthDeath,
}

#[derive(Debug, Parser)]
#[command(about = "Run a built-in chemical reaction network and print a CSV trajectory")]
struct Args {
    #[arg(value_enum)]
    model: Model,

    #[arg(long, default_value_t = 250.0)]
    tmax: f64,

    #[arg(long, default_value_t = 250)]
    nb_steps: usize,

    #[arg(long)]
    seed: Option<u64>,
}

fn build(model: Model) -> (Gillespie, HashMap<String, i64>, RunOpts, Vec<String>) {
    let mut g = Gillespie::new();
    let (init, params, var_names) = match model {
        Model::Sir => {
            g.add_reaction(1e-4, &["S", "I"], &["I", "I"], None::<f64>).expect("valid rate");
            g.add_reaction(0.01, &["I"], &["R"], None::<f64>).expect("valid rate");
            (
                HashMap::from([("S".to_string(), 999), ("I".to_string(), 1)]),
                HashMap::new(),
                vec!["S".to_string(), "I".to_string(), "R".to_string()],
            )
        }
        Model::MichaelisMenten => {
            g.add_reaction("V * A / (Km + A)", &["A"], &["P"], None::<f64>).expect("valid rate");
            (
                HashMap::from([("A".to_string(), 100)]),
                HashMap::from([("V".to_string(), 1.0), ("Km".to_string(), 20.0)]),
                vec!["A".to_string(), "P".to_string()],
            )
        }
        Model::BirthDeath => {
            g.add_reaction(10.0, &[], &["A"], None::<f64>).expect("valid rate");
            g.add_reaction(0.5, &["A"], &[], None::<f64>).expect("valid rate");
            (HashMap::new(), HashMap::new(), vec!["A".to_string()])
        }
    };
    (g, init, RunOpts::new(0.0, 0).with_params(params), var_names)
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let (mut g, init, opts, var_names) = build(args.model);
    for w in g.set_init(&init).expect("initial counts are non-negative") {
        log::warn!("{w}");
    }

    let mut opts = opts.with_var_names(var_names);
    opts.tmax = args.tmax;
    opts.nb_steps = args.nb_steps;
    if let Some(seed) = args.seed {
        opts = opts.with_seed(seed);
    }

    let traj = match g.run(&opts) {
        Ok(traj) => traj,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    println!("time,{}", traj.var_names.join(","));
    for (row, &t) in traj.times.iter().enumerate() {
        let values: Vec<String> = traj.series.iter().map(|col| col[row].to_string()).collect();
        println!("{t},{}", values.join(","));
    }
}
