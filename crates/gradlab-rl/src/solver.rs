//! Policy iteration over fully known dynamics

use ndarray::{Array1, Array3, Axis};
use tracing::debug;

use gradlab_core::util::argmax;
use gradlab_core::{GradlabError, Result};

use crate::env::{Act, Environment};

/// Policy evaluation stops once no state value moves by more than this
pub const EVAL_TOLERANCE: f64 = 1e-10;
const MAX_EVAL_SWEEPS: usize = 1_000_000;
const MAX_POLICY_ITERATIONS: usize = 10_000;

/// Dense model of an environment.
///
/// `T[s, a, s']` is the probability of reaching `s'` and `R[s, a, s']` the
/// reward received on the way. Repeated outcomes in `dynamics` accumulate
/// their probability.
pub fn build_model(env: &dyn Environment) -> (Array3<f64>, Array3<f64>) {
    let (ns, na) = (env.num_states(), env.num_actions());
    let mut t = Array3::zeros((ns, na, ns));
    let mut r = Array3::zeros((ns, na, ns));
    for s in 0..ns {
        for a in 0..na {
            let transitions = env.dynamics(s, a);
            for ((next, reward), prob) in transitions
                .states
                .iter()
                .zip(&transitions.rewards)
                .zip(&transitions.probs)
            {
                t[[s, a, *next]] += prob;
                r[[s, a, *next]] = *reward;
            }
        }
    }
    (t, r)
}

fn check_gamma(gamma: f64) -> Result<()> {
    if (0.0..1.0).contains(&gamma) {
        Ok(())
    } else {
        Err(GradlabError::invalid("gamma", gamma, "policy iteration needs 0 <= gamma < 1"))
    }
}

/// Expected one-step return of `a` in `s` followed by values `v`
fn action_value(t: &Array3<f64>, r: &Array3<f64>, v: &Array1<f64>, gamma: f64, s: usize, a: Act) -> f64 {
    let probs = t.index_axis(Axis(0), s);
    let rewards = r.index_axis(Axis(0), s);
    probs
        .row(a)
        .iter()
        .zip(rewards.row(a))
        .zip(v)
        .map(|((p, reward), value)| p * (reward + gamma * value))
        .sum()
}

fn eval_model(t: &Array3<f64>, r: &Array3<f64>, pi: &[Act], gamma: f64) -> Result<Array1<f64>> {
    let ns = t.len_of(Axis(0));
    let mut v = Array1::zeros(ns);
    for sweep in 0..MAX_EVAL_SWEEPS {
        let next = Array1::from_shape_fn(ns, |s| action_value(t, r, &v, gamma, s, pi[s]));
        let delta = next
            .iter()
            .zip(&v)
            .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
        v = next;
        if delta < EVAL_TOLERANCE {
            debug!(sweeps = sweep + 1, "policy evaluation converged");
            return Ok(v);
        }
    }
    Err(GradlabError::Internal(format!(
        "policy evaluation did not converge in {MAX_EVAL_SWEEPS} sweeps"
    )))
}

fn check_policy(env: &dyn Environment, pi: &[Act]) -> Result<()> {
    if pi.len() != env.num_states() {
        return Err(GradlabError::Environment(format!(
            "policy covers {} states, {} has {}",
            pi.len(),
            env.name(),
            env.num_states()
        )));
    }
    if let Some(a) = pi.iter().find(|a| **a >= env.num_actions()) {
        return Err(GradlabError::Environment(format!(
            "policy uses action {a}, {} has {}",
            env.name(),
            env.num_actions()
        )));
    }
    Ok(())
}

/// State values of the deterministic policy `pi` (iterative evaluation)
pub fn policy_eval(env: &dyn Environment, pi: &[Act], gamma: f64) -> Result<Array1<f64>> {
    check_gamma(gamma)?;
    check_policy(env, pi)?;
    let (t, r) = build_model(env);
    eval_model(&t, &r, pi, gamma)
}

fn improve_model(t: &Array3<f64>, r: &Array3<f64>, v: &Array1<f64>, gamma: f64) -> Vec<Act> {
    let (ns, na) = (t.len_of(Axis(0)), t.len_of(Axis(1)));
    (0..ns)
        .map(|s| {
            let q: Vec<f64> = (0..na).map(|a| action_value(t, r, v, gamma, s, a)).collect();
            argmax(&q)
        })
        .collect()
}

/// Greedy policy with respect to the state values `v`; ties go to the lowest action
pub fn policy_improvement(env: &dyn Environment, v: &Array1<f64>, gamma: f64) -> Result<Vec<Act>> {
    check_gamma(gamma)?;
    if v.len() != env.num_states() {
        return Err(GradlabError::Environment(format!(
            "value vector has {} entries, {} has {} states",
            v.len(),
            env.name(),
            env.num_states()
        )));
    }
    let (t, r) = build_model(env);
    Ok(improve_model(&t, &r, v, gamma))
}

/// Optimal deterministic policy by policy iteration, starting from all-zero actions
pub fn find_optimal_policy(env: &dyn Environment, gamma: f64) -> Result<Vec<Act>> {
    check_gamma(gamma)?;
    let (t, r) = build_model(env);
    let mut pi = vec![0; env.num_states()];

    for iteration in 0..MAX_POLICY_ITERATIONS {
        let v = eval_model(&t, &r, &pi, gamma)?;
        let next = improve_model(&t, &r, &v, gamma);
        if next == pi {
            debug!(env = env.name(), iterations = iteration + 1, "policy iteration converged");
            return Ok(pi);
        }
        pi = next;
    }
    Err(GradlabError::Internal(format!(
        "policy iteration did not converge in {MAX_POLICY_ITERATIONS} iterations"
    )))
}
