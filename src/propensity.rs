//! The in-memory reaction representation and the propensity vector
//! computation, in both dense (recompute-everything) and sparse
//! (dependency-graph) bookkeeping.

use std::collections::{HashMap, HashSet};

use crate::error::Error;
use crate::rate::{self, Ast, ResolvedAst};

/// How a reaction's rate is specified, as supplied to `add_reaction`.
#[derive(Debug, Clone)]
pub enum RateKind {
    /// Law of mass action with the given rate constant.
    Constant(f64),
    /// An arbitrary expression. `source` is kept for [`Display`](std::fmt::Display).
    Expr { source: String, ast: Ast },
}

/// One reaction as recorded by `add_reaction`, before compilation.
#[derive(Debug, Clone)]
pub struct Reaction {
    /// Ordered multiset of reactant species indices (repeats for multiplicity).
    pub reactants: Vec<usize>,
    /// Ordered multiset of product species indices.
    pub products: Vec<usize>,
    pub rate: RateKind,
}

/// A reaction's rate, compiled for one `run`: expression names are
/// resolved and mass-action reactant multiplicities are pre-aggregated.
pub enum CompiledRateKind {
    Constant {
        c: f64,
        /// `(species_index, multiplicity)`, deduplicated and sorted.
        reactant_counts: Vec<(usize, i64)>,
    },
    Expr(ResolvedAst),
}

/// One reaction, ready for repeated firing in the driver's hot loop.
pub struct CompiledReaction {
    /// Net change vector, sparse: `(species_index, delta)`, zeros omitted.
    pub delta: Vec<(usize, i64)>,
    pub kind: CompiledRateKind,
    /// Species whose count can change this reaction's propensity.
    /// Used to build the sparse dependency graph.
    pub touched_species: Vec<usize>,
}

/// A reaction network compiled for one `run`: reactions carry resolved
/// rates, and `dependents[r]` lists every reaction whose propensity must
/// be recomputed after `r` fires (used only in sparse mode).
pub struct CompiledNetwork {
    pub reactions: Vec<CompiledReaction>,
    pub dependents: Vec<Vec<usize>>,
}

fn reactant_counts(reactants: &[usize]) -> Vec<(usize, i64)> {
    let mut counts: Vec<(usize, i64)> = Vec::new();
    for &idx in reactants {
        match counts.iter_mut().find(|(i, _)| *i == idx) {
            Some(entry) => entry.1 += 1,
            None => counts.push((idx, 1)),
        }
    }
    counts.sort_unstable_by_key(|&(i, _)| i);
    counts
}

fn net_delta(n_species: usize, reactants: &[usize], products: &[usize]) -> Vec<(usize, i64)> {
    let mut delta = vec![0i64; n_species];
    for &i in reactants {
        delta[i] -= 1;
    }
    for &i in products {
        delta[i] += 1;
    }
    delta
        .into_iter()
        .enumerate()
        .filter(|&(_, d)| d != 0)
        .collect()
}

/// Compiles the network's reactions against one run's `params`. Fails
/// with [`Error::MissingParameter`] if an expression rate references a
/// name that is neither a species nor a key of `params`.
pub fn compile_network(
    species: &HashMap<String, usize>,
    n_species: usize,
    reactions: &[Reaction],
    params: &HashMap<String, f64>,
) -> Result<CompiledNetwork, Error> {
    let mut compiled = Vec::with_capacity(reactions.len());
    for r in reactions {
        let delta = net_delta(n_species, &r.reactants, &r.products);
        let (kind, touched_species) = match &r.rate {
            RateKind::Constant(c) => {
                let counts = reactant_counts(&r.reactants);
                let touched = counts.iter().map(|&(i, _)| i).collect();
                (CompiledRateKind::Constant { c: *c, reactant_counts: counts }, touched)
            }
            RateKind::Expr { ast, .. } => {
                let mut names = HashSet::new();
                ast.free_names(&mut names);
                let mut touched = Vec::new();
                for name in &names {
                    if let Some(&idx) = species.get(name) {
                        touched.push(idx);
                    } else if !params.contains_key(name) {
                        return Err(Error::MissingParameter(name.clone()));
                    }
                }
                touched.sort_unstable();
                touched.dedup();
                let resolved = rate::compile(ast, species, params)?;
                (CompiledRateKind::Expr(resolved), touched)
            }
        };
        compiled.push(CompiledReaction { delta, kind, touched_species });
    }

    let mut species_to_reactions: Vec<Vec<usize>> = vec![Vec::new(); n_species];
    for (ridx, cr) in compiled.iter().enumerate() {
        for &s in &cr.touched_species {
            species_to_reactions[s].push(ridx);
        }
    }

    let mut dependents = Vec::with_capacity(compiled.len());
    for cr in &compiled {
        let mut deps = Vec::new();
        for &(s, _) in &cr.delta {
            deps.extend_from_slice(&species_to_reactions[s]);
        }
        deps.sort_unstable();
        deps.dedup();
        dependents.push(deps);
    }

    Ok(CompiledNetwork { reactions: compiled, dependents })
}

/// `S >= 8` and the mean number of species touched per reaction, divided
/// by `S`, is below `0.25`.
pub fn heuristic_sparse(n_species: usize, net: &CompiledNetwork) -> bool {
    if n_species < 8 || net.reactions.is_empty() {
        return false;
    }
    let total_touched: usize = net.reactions.iter().map(|r| r.touched_species.len()).sum();
    let mean = total_touched as f64 / net.reactions.len() as f64;
    mean / (n_species as f64) < 0.25
}

/// The raw propensity of one reaction at state `x`, before clamping.
///
/// `Constant(c)` computes `c * Pi binom-like falling factorial`: each
/// reactant occurrence consumes one factor and decrements it by one
/// within the reaction (`A + A -> ...` contributes `c * x[A] * (x[A]-1)`,
/// with no extra `1/m!` prefactor. This is the mass-action convention
/// with a stochastic rate constant: the user's rate constant is expected
/// to already absorb any combinatorial factor for repeated reactants.
pub fn evaluate(kind: &CompiledRateKind, x: &[i64]) -> f64 {
    match kind {
        CompiledRateKind::Constant { c, reactant_counts } => {
            let mut p = *c;
            for &(idx, m) in reactant_counts {
                let n = x[idx];
                for k in 0..m {
                    p *= (n - k) as f64;
                }
            }
            p
        }
        CompiledRateKind::Expr(ast) => ast.eval(x),
    }
}

/// Clamps a non-finite or negative propensity to zero, logging a
/// once-per-reaction warning. A legitimate zero (exhausted reactant) is
/// passed through silently.
pub fn clamp(value: f64, reaction_idx: usize, warned: &mut [bool]) -> f64 {
    if value.is_finite() && value >= 0.0 {
        return value;
    }
    if !warned[reaction_idx] {
        log::warn!(
            "reaction {reaction_idx} produced a non-finite or negative propensity ({value}); clamping to 0"
        );
        warned[reaction_idx] = true;
    }
    0.0
}
