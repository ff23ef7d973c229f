//! The reaction-network builder and the public `run` entry point.

use std::collections::HashMap;
use std::fmt;

use bimap::BiHashMap;

use crate::error::{Error, Warning};
use crate::propensity::{self, RateKind, Reaction};
use crate::rate;
use crate::rng::Rng;
use crate::ssa;

/// Either a numeric rate constant (law of mass action) or a rate
/// expression string, as accepted by [`Gillespie::add_reaction`].
#[derive(Debug, Clone)]
pub enum RateArg {
    Constant(f64),
    Expr(String),
}

impl From<f64> for RateArg {
    fn from(v: f64) -> Self {
        RateArg::Constant(v)
    }
}

impl From<&str> for RateArg {
    fn from(s: &str) -> Self {
        RateArg::Expr(s.to_string())
    }
}

impl From<String> for RateArg {
    fn from(s: String) -> Self {
        RateArg::Expr(s)
    }
}

/// Options bundled for one `run` call. Rust has no keyword arguments, so
/// this plays the role of the original's `run(tmax, nb_steps, params=,
/// seed=, sparse=, var_names=)` signature.
#[derive(Debug, Clone)]
pub struct RunOpts {
    pub tmax: f64,
    pub nb_steps: usize,
    pub params: HashMap<String, f64>,
    pub seed: Option<u64>,
    pub sparse: Option<bool>,
    pub var_names: Option<Vec<String>>,
}

impl RunOpts {
    pub fn new(tmax: f64, nb_steps: usize) -> Self {
        RunOpts { tmax, nb_steps, params: HashMap::new(), seed: None, sparse: None, var_names: None }
    }

    pub fn with_params(mut self, params: HashMap<String, f64>) -> Self {
        self.params = params;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_sparse(mut self, sparse: bool) -> Self {
        self.sparse = Some(sparse);
        self
    }

    pub fn with_var_names(mut self, var_names: Vec<String>) -> Self {
        self.var_names = Some(var_names);
        self
    }
}

/// The output of [`Gillespie::run`]: a time axis and, for each recorded
/// species, an array of copy numbers at those times.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub series: Vec<Vec<i64>>,
    pub var_names: Vec<String>,
    /// `true` if the run terminated because total propensity reached
    /// zero before `tmax`, rather than running to completion. In grid
    /// mode this is the only way to detect early exhaustion, since the
    /// trailing grid points are silently filled with the final state;
    /// in event mode the same condition also produces a terminal `+inf`
    /// row.
    pub exhausted: bool,
}

impl Trajectory {
    /// The recorded series for `name`, if it was part of `var_names`.
    pub fn get(&self, name: &str) -> Option<&[i64]> {
        self.var_names.iter().position(|n| n == name).map(|i| self.series[i].as_slice())
    }

    /// Consumes the trajectory into a name -> series map, the shape
    /// the out-of-scope tabular-dataset layer would wrap.
    pub fn into_map(self) -> HashMap<String, Vec<i64>> {
        self.var_names.into_iter().zip(self.series).collect()
    }
}

/// A chemical reaction network: species, reactions, and (once `run` has
/// been called) the initial condition used for the next run.
pub struct Gillespie {
    species: BiHashMap<String, usize>,
    reactions: Vec<Reaction>,
    init: HashMap<usize, i64>,
}

impl Default for Gillespie {
    fn default() -> Self {
        Self::new()
    }
}

impl Gillespie {
    pub fn new() -> Self {
        Gillespie { species: BiHashMap::new(), reactions: Vec::new(), init: HashMap::new() }
    }

    pub fn nb_species(&self) -> usize {
        self.species.len()
    }

    pub fn nb_reactions(&self) -> usize {
        self.reactions.len()
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.species.get_by_left(name) {
            idx
        } else {
            let idx = self.species.len();
            self.species.insert(name.to_string(), idx);
            idx
        }
    }

    fn species_name(&self, idx: usize) -> &str {
        self.species.get_by_right(&idx).expect("every interned index has a name")
    }

    fn build_rate_kind(arg: RateArg) -> Result<RateKind, Error> {
        match arg {
            RateArg::Constant(c) => Ok(RateKind::Constant(c)),
            RateArg::Expr(source) => {
                let ast = rate::parse(&source)
                    .map_err(|()| Error::RateExpressionNotUnderstood(source.clone()))?;
                Ok(RateKind::Expr { source, ast })
            }
        }
    }

    /// Adds a reaction. `reactants`/`products` name species, interning
    /// any not seen before. If `reverse_rate` is `Some`, a second
    /// reaction with swapped sides is appended as well.
    pub fn add_reaction<R1, R2>(
        &mut self,
        rate: R1,
        reactants: &[&str],
        products: &[&str],
        reverse_rate: Option<R2>,
    ) -> Result<(), Error>
    where
        R1: Into<RateArg>,
        R2: Into<RateArg>,
    {
        let reactant_idx: Vec<usize> = reactants.iter().map(|s| self.intern(s)).collect();
        let product_idx: Vec<usize> = products.iter().map(|s| self.intern(s)).collect();

        let rate_kind = Self::build_rate_kind(rate.into())?;
        self.reactions.push(Reaction {
            reactants: reactant_idx.clone(),
            products: product_idx.clone(),
            rate: rate_kind,
        });

        if let Some(rr) = reverse_rate {
            let rr_kind = Self::build_rate_kind(rr.into())?;
            self.reactions.push(Reaction { reactants: product_idx, products: reactant_idx, rate: rr_kind });
        }
        Ok(())
    }

    fn touches_species(&self, r: &Reaction, idx: usize) -> bool {
        if r.reactants.contains(&idx) || r.products.contains(&idx) {
            return true;
        }
        if let RateKind::Expr { ast, .. } = &r.rate {
            let mut names = std::collections::HashSet::new();
            ast.free_names(&mut names);
            return names.contains(self.species_name(idx));
        }
        false
    }

    /// Records the initial state. Names not yet declared in any reaction
    /// are interned (so they appear in the output with a constant value)
    /// and reported as [`Warning::SpeciesNotInvolvedInAnyReaction`].
    pub fn set_init(&mut self, init: &HashMap<String, i64>) -> Result<Vec<Warning>, Error> {
        let mut warnings = Vec::new();
        let mut resolved = HashMap::new();
        for (name, &count) in init {
            if count < 0 {
                return Err(Error::InitSpeciesNegative(name.clone()));
            }
            let idx = self.intern(name);
            if !self.reactions.iter().any(|r| self.touches_species(r, idx)) {
                let w = Warning::SpeciesNotInvolvedInAnyReaction(name.clone());
                log::warn!("{w}");
                warnings.push(w);
            }
            resolved.insert(idx, count);
        }
        self.init = resolved;
        Ok(warnings)
    }

    fn initial_state(&self) -> Vec<i64> {
        let mut x = vec![0i64; self.species.len()];
        for (&idx, &count) in &self.init {
            x[idx] = count;
        }
        x
    }

    /// Runs the system from the last `set_init` state until `opts.tmax`.
    pub fn run(&self, opts: &RunOpts) -> Result<Trajectory, Error> {
        if !(opts.tmax > 0.0 && opts.tmax.is_finite()) {
            return Err(Error::NonPositiveTmax);
        }
        for name in opts.params.keys() {
            if self.species.contains_left(name) {
                return Err(Error::ParameterNameCollidesWithSpecies(name.clone()));
            }
        }

        let var_names: Vec<String> = match &opts.var_names {
            Some(names) => {
                for n in names {
                    if !self.species.contains_left(n) {
                        return Err(Error::UnknownVarName(n.clone()));
                    }
                }
                names.clone()
            }
            None => (0..self.species.len()).map(|i| self.species_name(i).to_string()).collect(),
        };
        let record: Vec<usize> =
            var_names.iter().map(|n| *self.species.get_by_left(n).expect("validated above")).collect();

        let species_map: HashMap<String, usize> =
            self.species.iter().map(|(n, &i)| (n.clone(), i)).collect();
        let compiled =
            propensity::compile_network(&species_map, self.species.len(), &self.reactions, &opts.params)?;

        let sparse = opts.sparse.unwrap_or_else(|| propensity::heuristic_sparse(self.species.len(), &compiled));

        let mut rng = match opts.seed {
            Some(seed) => Rng::seed_from_u64(seed),
            None => Rng::from_entropy(),
        };

        let x0 = self.initial_state();
        let (times, series, exhausted) = if opts.nb_steps == 0 {
            ssa::run_event(&compiled, x0, opts.tmax, &mut rng, sparse, &record)
        } else {
            ssa::run_grid(&compiled, x0, opts.tmax, opts.nb_steps, &mut rng, sparse, &record)
        };

        Ok(Trajectory { times, series, var_names, exhausted })
    }

    fn format_side(&self, side: &[usize]) -> String {
        if side.is_empty() {
            return "\u{2205}".to_string();
        }
        side.iter().map(|&i| self.species_name(i)).collect::<Vec<_>>().join(" + ")
    }
}

impl fmt::Display for Gillespie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} species and {} reactions", self.species.len(), self.reactions.len())?;
        for r in &self.reactions {
            let rate = match &r.rate {
                RateKind::Constant(c) => c.to_string(),
                RateKind::Expr { source, .. } => source.clone(),
            };
            writeln!(f, "{} \u{2192} {} [{rate}]", self.format_side(&r.reactants), self.format_side(&r.products))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_species_in_declaration_order() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(1.0, &["S", "I"], &["I", "I"], None).unwrap();
        g.add_reaction::<f64, f64>(0.01, &["I"], &["R"], None).unwrap();
        assert_eq!(g.nb_species(), 3);
        assert_eq!(g.nb_reactions(), 2);
    }

    #[test]
    fn reverse_rate_adds_a_second_swapped_reaction() {
        let mut g = Gillespie::new();
        g.add_reaction(0.1, &["A", "B"], &["C"], Some(0.01)).unwrap();
        assert_eq!(g.nb_reactions(), 2);
    }

    #[test]
    fn bad_rate_expression_is_rejected_at_add_reaction() {
        let mut g = Gillespie::new();
        let err = g.add_reaction::<&str, f64>("1 +", &["A"], &["B"], None).unwrap_err();
        assert_eq!(err, Error::RateExpressionNotUnderstood("1 +".to_string()));
    }

    #[test]
    fn negative_init_is_rejected() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(1.0, &["A"], &["B"], None).unwrap();
        let err = g.set_init(&HashMap::from([("A".to_string(), -1)])).unwrap_err();
        assert_eq!(err, Error::InitSpeciesNegative("A".to_string()));
    }

    #[test]
    fn init_species_outside_any_reaction_warns() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(1.0, &["A"], &["B"], None).unwrap();
        let warnings = g.set_init(&HashMap::from([("Z".to_string(), 5)])).unwrap();
        assert_eq!(warnings, vec![Warning::SpeciesNotInvolvedInAnyReaction("Z".to_string())]);
    }

    #[test]
    fn missing_parameter_is_rejected_at_run() {
        let mut g = Gillespie::new();
        g.add_reaction::<&str, f64>("k", &[], &["A"], None).unwrap();
        g.set_init(&HashMap::new()).unwrap();
        let err = g.run(&RunOpts::new(10.0, 10)).unwrap_err();
        assert_eq!(err, Error::MissingParameter("k".to_string()));
    }

    #[test]
    fn param_species_collision_is_rejected_at_run() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(4.0, &["A"], &["B"], None).unwrap();
        g.set_init(&HashMap::from([("A".to_string(), 1)])).unwrap();
        let opts = RunOpts::new(10.0, 10).with_params(HashMap::from([("B".to_string(), 4.2)]));
        let err = g.run(&opts).unwrap_err();
        assert_eq!(err, Error::ParameterNameCollidesWithSpecies("B".to_string()));
    }

    #[test]
    fn unknown_var_name_is_rejected_at_run() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(4.0, &["A"], &["B"], None).unwrap();
        g.set_init(&HashMap::from([("A".to_string(), 1)])).unwrap();
        let opts = RunOpts::new(10.0, 10).with_var_names(vec!["Q".to_string()]);
        let err = g.run(&opts).unwrap_err();
        assert_eq!(err, Error::UnknownVarName("Q".to_string()));
    }

    #[test]
    fn nonpositive_tmax_is_rejected() {
        let g = Gillespie::new();
        assert_eq!(g.run(&RunOpts::new(0.0, 10)).unwrap_err(), Error::NonPositiveTmax);
        assert_eq!(g.run(&RunOpts::new(-1.0, 10)).unwrap_err(), Error::NonPositiveTmax);
    }

    #[test]
    fn empty_network_returns_flat_grid() {
        let g = Gillespie::new();
        let traj = g.run(&RunOpts::new(10.0, 10)).unwrap();
        assert_eq!(traj.times, (0..=10).map(|k| k as f64).collect::<Vec<_>>());
        assert!(traj.var_names.is_empty());
    }

    #[test]
    fn display_renders_arrows_and_empty_sides() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(14.0, &[], &["A"], None).unwrap();
        let text = g.to_string();
        assert!(text.contains("\u{2205} \u{2192} A [14]"));
    }

    #[test]
    fn deterministic_for_identical_seed() {
        let mut g = Gillespie::new();
        g.add_reaction::<f64, f64>(1e-4, &["S", "I"], &["I", "I"], None).unwrap();
        g.add_reaction::<f64, f64>(0.01, &["I"], &["R"], None).unwrap();
        g.set_init(&HashMap::from([("S".to_string(), 999), ("I".to_string(), 1)])).unwrap();
        let opts = RunOpts::new(250.0, 250).with_seed(42);
        let a = g.run(&opts).unwrap();
        let b = g.run(&opts).unwrap();
        assert_eq!(a, b);
    }
}
