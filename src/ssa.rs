//! The direct-method SSA main loop: draws the next-reaction time and
//! index, fires the reaction, and feeds the sampler.

use crate::propensity::{self, CompiledNetwork};
use crate::rng::Rng;
use crate::sampler::{EventRecorder, GridRecorder};

/// Per-run bookkeeping: current state, propensity vector and its total,
/// and the one-warning-per-reaction clamp guard.
struct Engine<'a> {
    net: &'a CompiledNetwork,
    x: Vec<i64>,
    a: Vec<f64>,
    total: f64,
    warned: Vec<bool>,
}

impl<'a> Engine<'a> {
    fn new(net: &'a CompiledNetwork, x0: Vec<i64>) -> Self {
        let r = net.reactions.len();
        let mut engine = Engine { net, x: x0, a: vec![0.0; r], total: 0.0, warned: vec![false; r] };
        engine.recompute_all();
        engine
    }

    fn recompute_all(&mut self) {
        self.total = 0.0;
        for i in 0..self.net.reactions.len() {
            let raw = propensity::evaluate(&self.net.reactions[i].kind, &self.x);
            let clamped = propensity::clamp(raw, i, &mut self.warned);
            self.a[i] = clamped;
            self.total += clamped;
        }
    }

    fn recompute_dependents(&mut self, fired: usize) {
        for &r in &self.net.dependents[fired] {
            let raw = propensity::evaluate(&self.net.reactions[r].kind, &self.x);
            let clamped = propensity::clamp(raw, r, &mut self.warned);
            self.total += clamped - self.a[r];
            self.a[r] = clamped;
        }
    }

    /// Smallest `k` with `sum(a[0..=k]) >= u2 * total`. Falls back to the
    /// last index on floating-point rounding that just misses the target.
    fn select(&self, u2: f64) -> usize {
        let target = u2 * self.total;
        let mut acc = 0.0;
        for (i, &ai) in self.a.iter().enumerate() {
            acc += ai;
            if acc >= target {
                return i;
            }
        }
        self.a.len() - 1
    }

    fn fire(&mut self, k: usize, sparse: bool) {
        for &(idx, d) in &self.net.reactions[k].delta {
            self.x[idx] += d;
        }
        if sparse {
            self.recompute_dependents(k);
        } else {
            self.recompute_all();
        }
    }
}

/// Uniform grid mode (`nb_steps >= 1`): sample at `t_k = k * tmax / nb_steps`.
pub fn run_grid(
    net: &CompiledNetwork,
    x0: Vec<i64>,
    tmax: f64,
    nb_steps: usize,
    rng: &mut Rng,
    sparse: bool,
    record: &[usize],
) -> (Vec<f64>, Vec<Vec<i64>>, bool) {
    let mut recorder = GridRecorder::new(tmax, nb_steps, record.len());
    let mut engine = Engine::new(net, x0);
    let mut t_current = 0.0;
    let mut exhausted = false;

    loop {
        if engine.total <= 0.0 {
            exhausted = true;
            break;
        }
        let u1 = rng.next_open01();
        let u2 = rng.next_open01();
        let tau = -u1.ln() / engine.total;
        let t_new = t_current + tau;

        recorder.advance_to(t_new, &engine.x, record);

        if t_new > tmax {
            break;
        }

        let k = engine.select(u2);
        engine.fire(k, sparse);
        t_current = t_new;
    }

    let (times, series) = recorder.finish(&engine.x, record);
    (times, series, exhausted)
}

/// Event mode (`nb_steps == 0`): every reaction firing produces a row.
/// On exhaustion, a terminal row at `t = +inf` is appended.
pub fn run_event(
    net: &CompiledNetwork,
    x0: Vec<i64>,
    tmax: f64,
    rng: &mut Rng,
    sparse: bool,
    record: &[usize],
) -> (Vec<f64>, Vec<Vec<i64>>, bool) {
    let mut recorder = EventRecorder::new(&x0, record);
    let mut engine = Engine::new(net, x0);
    let mut t_current = 0.0;
    let mut exhausted = false;

    while t_current < tmax {
        if engine.total <= 0.0 {
            exhausted = true;
            recorder.push(f64::INFINITY, &engine.x, record);
            break;
        }
        let u1 = rng.next_open01();
        let u2 = rng.next_open01();
        let tau = -u1.ln() / engine.total;
        t_current += tau;
        let k = engine.select(u2);
        engine.fire(k, sparse);
        recorder.push(t_current, &engine.x, record);
    }

    let (times, series) = recorder.finish();
    (times, series, exhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propensity::{compile_network, RateKind, Reaction};
    use std::collections::HashMap;

    fn birth_only_network() -> CompiledNetwork {
        // ∅ -> A @ 5.0
        let species = HashMap::from([("A".to_string(), 0usize)]);
        let reactions = vec![Reaction { reactants: vec![], products: vec![0], rate: RateKind::Constant(5.0) }];
        compile_network(&species, 1, &reactions, &HashMap::new()).unwrap()
    }

    #[test]
    fn grid_mode_produces_exact_linspace_length() {
        let net = birth_only_network();
        let mut rng = Rng::seed_from_u64(7);
        let (times, series, exhausted) = run_grid(&net, vec![0], 10.0, 10, &mut rng, false, &[0]);
        assert_eq!(times.len(), 11);
        assert_eq!(series[0].len(), 11);
        assert_eq!(times[0], 0.0);
        assert_eq!(times[10], 10.0);
        assert!(!exhausted);
        // Birth-only: species count is non-decreasing.
        assert!(series[0].windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn exhausted_network_stays_at_final_state() {
        // A -> () @ 1.0, starting with a single A: exhausts quickly, then
        // total propensity is zero and the grid must be filled with 0.
        let species = HashMap::from([("A".to_string(), 0usize)]);
        let reactions = vec![Reaction { reactants: vec![0], products: vec![], rate: RateKind::Constant(1.0) }];
        let net = compile_network(&species, 1, &reactions, &HashMap::new()).unwrap();
        let mut rng = Rng::seed_from_u64(1);
        let (_times, series, exhausted) = run_grid(&net, vec![1], 1000.0, 20, &mut rng, false, &[0]);
        assert_eq!(*series[0].last().unwrap(), 0);
        assert!(exhausted);
    }

    #[test]
    fn event_mode_times_are_nondecreasing_and_start_at_zero() {
        let net = birth_only_network();
        let mut rng = Rng::seed_from_u64(99);
        let (times, _series, _exhausted) = run_event(&net, vec![0], 5.0, &mut rng, false, &[0]);
        assert_eq!(times[0], 0.0);
        assert!(times.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn dense_and_sparse_agree_for_identical_seed() {
        let species: HashMap<String, usize> =
            ('A'..='H').enumerate().map(|(i, c)| (c.to_string(), i)).collect();
        let reactions: Vec<Reaction> = (0..8)
            .map(|i| Reaction {
                reactants: vec![i],
                products: vec![(i + 1) % 8],
                rate: RateKind::Constant(0.5),
            })
            .collect();
        let net = compile_network(&species, 8, &reactions, &HashMap::new()).unwrap();
        let x0 = vec![10, 0, 0, 0, 0, 0, 0, 0];

        let mut rng_dense = Rng::seed_from_u64(123);
        let dense = run_grid(&net, x0.clone(), 5.0, 5, &mut rng_dense, false, &(0..8).collect::<Vec<_>>());

        let mut rng_sparse = Rng::seed_from_u64(123);
        let sparse = run_grid(&net, x0, 5.0, 5, &mut rng_sparse, true, &(0..8).collect::<Vec<_>>());

        assert_eq!(dense, sparse);
    }
}
