//! An exact stochastic simulator for well-mixed chemical reaction
//! networks (CRNs), implementing Gillespie's direct-method Stochastic
//! Simulation Algorithm (SSA).
//!
//! Given a set of species, a set of reactions (each with reactants,
//! products, and a propensity rule), and an initial copy-number vector,
//! [`Gillespie::run`] produces a statistically correct sample trajectory
//! of species counts over continuous time up to a specified horizon.
//!
//! Reaction rates can be specified with a number (for a reaction obeying
//! the law of mass action) or a string (for an arbitrary rate expression
//! over species counts and named parameters):
//!
//! ```
//! use crn_ssa::Gillespie;
//! use std::collections::HashMap;
//!
//! let mut sir = Gillespie::new();
//! sir.add_reaction(1e-4, &["S", "I"], &["I", "I"], None::<f64>).unwrap();
//! sir.add_reaction(0.01, &["I"], &["R"], None::<f64>).unwrap();
//! sir.set_init(&HashMap::from([("S".to_string(), 999), ("I".to_string(), 1)])).unwrap();
//!
//! let opts = crn_ssa::RunOpts::new(250.0, 250).with_seed(42);
//! let ds = sir.run(&opts).unwrap();
//! assert_eq!(ds.times.len(), 251);
//! ```
//!
//! If you can, use the law of mass action, which is more efficient and
//! often more correct:
//!
//! ```
//! use crn_ssa::Gillespie;
//! let mut s = Gillespie::new();
//! // Correct, and recommended.
//! s.add_reaction(4.2, &["A", "A"], &["AA"], None::<f64>).unwrap();
//! // Also correct, but not recommended: the same propensity, spelled out.
//! s.add_reaction("4.2 * A * (A - 1)", &["A", "A"], &["AA"], None::<f64>).unwrap();
//! ```
//!
//! # Dense vs. sparse
//!
//! `run`'s `sparse` option picks between two propensity-bookkeeping
//! strategies: dense recomputes every reaction's propensity after each
//! firing, sparse maintains a reaction dependency graph and recomputes
//! only what changed. Both must (and do) produce identical trajectories
//! for identical seeds; left unset, the choice follows a heuristic based
//! on species count and reaction locality.
//!
//! # Non-goals
//!
//! Spatially resolved simulation, ODE or tau-leaping approximation,
//! parallel trajectories within one call, and persistence of state
//! between calls are out of scope.

mod error;
mod network;
mod propensity;
mod rate;
mod rng;
mod sampler;
mod ssa;

pub use error::{Error, Warning};
pub use network::{Gillespie, RateArg, RunOpts, Trajectory};
