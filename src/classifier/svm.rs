use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct SvmParams {
    pub c: f64,
    pub gamma: f64,
    pub tolerance: f64,
    pub max_passes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmClassifier {
    n_classes: usize,
    n_features: usize,
    gamma: f64,
    machines: Vec<BinaryMachine>,
}

/// Decision function `sum(coef_i * K(sv_i, x)) - rho`; positive means `positive`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BinaryMachine {
    positive: usize,
    negative: usize,
    support_vectors: Array2<f64>,
    coefficients: Array1<f64>,
    rho: f64,
}

impl SvmClassifier {
    /// `x` and `y` must be the same length with labels `< n_classes`.
    pub fn fit(x: ArrayView2<f64>, y: &[usize], n_classes: usize, params: SvmParams) -> Self {
        let mut machines = Vec::new();

        for positive in 0..n_classes {
            for negative in positive + 1..n_classes {
                let members: Vec<usize> = (0..y.len())
                    .filter(|&i| y[i] == positive || y[i] == negative)
                    .collect();
                let has_both = members.iter().any(|&i| y[i] == positive)
                    && members.iter().any(|&i| y[i] == negative);
                if !has_both {
                    log::debug!("No training samples for pair ({positive}, {negative}), skipping");
                    continue;
                }

                let pair_x = x.select(Axis(0), &members);
                let signs: Vec<f64> = members
                    .iter()
                    .map(|&i| if y[i] == positive { 1.0 } else { -1.0 })
                    .collect();
                machines.push(BinaryMachine::train(positive, negative, pair_x, &signs, &params));
            }
        }

        Self {
            n_classes,
            n_features: x.ncols(),
            gamma: params.gamma,
            machines,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict(&self, sample: ArrayView1<f64>) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for machine in &self.machines {
            if machine.decision(sample, self.gamma) > 0.0 {
                votes[machine.positive] += 1;
            } else {
                votes[machine.negative] += 1;
            }
        }

        let mut winner = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[winner] {
                winner = class;
            }
        }
        winner
    }
}

/// `1 / (n_features * Var(X))` over every element of the training matrix.
pub fn scale_gamma(x: ArrayView2<f64>) -> f64 {
    if x.is_empty() {
        return 1.0;
    }
    let variance = x.iter().copied().collect::<Array1<f64>>().var(0.0);
    if !(variance > 0.0) {
        return 1.0;
    }
    1.0 / (x.ncols() as f64 * variance)
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let distance: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
    (-gamma * distance).exp()
}

impl BinaryMachine {
    fn train(positive: usize, negative: usize, x: Array2<f64>, y: &[f64], params: &SvmParams) -> Self {
        let n = y.len();
        let c = params.c;
        let kernel = Array2::from_shape_fn((n, n), |(i, j)| rbf(x.row(i), x.row(j), params.gamma));

        let mut alpha = vec![0.0f64; n];
        let mut gradient = vec![-1.0f64; n];
        let in_up = |a: f64, y: f64| (y > 0.0 && a < c) || (y < 0.0 && a > 0.0);
        let in_low = |a: f64, y: f64| (y > 0.0 && a > 0.0) || (y < 0.0 && a < c);

        let mut iterations = 0;
        while iterations < params.max_passes {
            let mut i = None;
            let mut g_max = f64::NEG_INFINITY;
            let mut j = None;
            let mut g_min = f64::INFINITY;
            for t in 0..n {
                let value = -y[t] * gradient[t];
                if in_up(alpha[t], y[t]) && value > g_max {
                    g_max = value;
                    i = Some(t);
                }
                if in_low(alpha[t], y[t]) && value < g_min {
                    g_min = value;
                    j = Some(t);
                }
            }

            let (Some(i), Some(j)) = (i, j) else { break };
            if g_max - g_min < params.tolerance {
                break;
            }

            let (old_i, old_j) = (alpha[i], alpha[j]);
            if y[i] != y[j] {
                let quad = (kernel[[i, i]] + kernel[[j, j]] - 2.0 * kernel[[i, j]]).max(TAU);
                let delta = (-gradient[i] - gradient[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;
                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > 0.0 {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = c - diff;
                    }
                } else if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = c + diff;
                }
            } else {
                let quad = (kernel[[i, i]] + kernel[[j, j]] - 2.0 * kernel[[i, j]]).max(TAU);
                let delta = (gradient[i] - gradient[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;
                if sum > c {
                    if alpha[i] > c {
                        alpha[i] = c;
                        alpha[j] = sum - c;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c {
                    if alpha[j] > c {
                        alpha[j] = c;
                        alpha[i] = sum - c;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let delta_i = alpha[i] - old_i;
            let delta_j = alpha[j] - old_j;
            for t in 0..n {
                gradient[t] += y[t] * (y[i] * kernel[[t, i]] * delta_i + y[j] * kernel[[t, j]] * delta_j);
            }
            iterations += 1;
        }

        if iterations >= params.max_passes {
            log::warn!(
                "SMO for pair ({positive}, {negative}) stopped after {} iterations without converging",
                params.max_passes
            );
        }

        let rho = compute_rho(&alpha, &gradient, y, c);
        let support: Vec<usize> = (0..n).filter(|&t| alpha[t] > 0.0).collect();
        let coefficients = support.iter().map(|&t| alpha[t] * y[t]).collect();

        Self {
            positive,
            negative,
            support_vectors: x.select(Axis(0), &support),
            coefficients,
            rho,
        }
    }

    fn decision(&self, sample: ArrayView1<f64>, gamma: f64) -> f64 {
        let sum: f64 = self
            .support_vectors
            .rows()
            .into_iter()
            .zip(self.coefficients.iter())
            .map(|(sv, coef)| coef * rbf(sv, sample, gamma))
            .sum();
        sum - self.rho
    }
}

// Average of y*G over free vectors, or the midpoint of the feasible range.
fn compute_rho(alpha: &[f64], gradient: &[f64], y: &[f64], c: f64) -> f64 {
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut free_count = 0usize;

    for t in 0..alpha.len() {
        let yg = y[t] * gradient[t];
        let at_upper = alpha[t] >= c;
        let at_lower = alpha[t] <= 0.0;
        if at_upper {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if at_lower {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            free_count += 1;
            free_sum += yg;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (upper + lower) / 2.0
    }
}
