//! Elman-style recurrent network with a linear output head.
//!
//! Small enough to train with plain backpropagation through time and
//! stochastic gradient descent; weights serialize into the persisted
//! model artifact.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Elementwise gradient clip bound; tanh recurrences explode without it.
const GRAD_CLIP: f64 = 1.0;

/// Recurrent network: tanh hidden state fed by the input row and the
/// previous hidden state, linear readout from the final hidden state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrentNet {
    input: usize,
    hidden: usize,
    /// Input-to-hidden weights, `hidden x input`.
    w_ih: Vec<Vec<f64>>,
    /// Hidden-to-hidden weights, `hidden x hidden`.
    w_hh: Vec<Vec<f64>>,
    b_h: Vec<f64>,
    /// Hidden-to-output weights.
    w_out: Vec<f64>,
    b_out: f64,
}

impl RecurrentNet {
    /// Create a network with Xavier-uniform initialized weights.
    pub fn new(input: usize, hidden: usize, rng: &mut impl Rng) -> Self {
        let bound_ih = (6.0 / (input + hidden) as f64).sqrt();
        let bound_hh = (6.0 / (2 * hidden) as f64).sqrt();
        let bound_out = (6.0 / (hidden + 1) as f64).sqrt();

        let w_ih = (0..hidden)
            .map(|_| (0..input).map(|_| rng.gen_range(-bound_ih..bound_ih)).collect())
            .collect();
        let w_hh = (0..hidden)
            .map(|_| (0..hidden).map(|_| rng.gen_range(-bound_hh..bound_hh)).collect())
            .collect();
        let w_out = (0..hidden).map(|_| rng.gen_range(-bound_out..bound_out)).collect();

        Self {
            input,
            hidden,
            w_ih,
            w_hh,
            b_h: vec![0.0; hidden],
            w_out,
            b_out: 0.0,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    /// Run the window through the recurrence and return the prediction.
    pub fn forward(&self, window: &[Vec<f64>]) -> f64 {
        self.forward_states(window).1
    }

    /// Forward pass keeping per-step hidden states for backpropagation.
    fn forward_states(&self, window: &[Vec<f64>]) -> (Vec<Vec<f64>>, f64) {
        let mut states: Vec<Vec<f64>> = Vec::with_capacity(window.len());
        let mut h_prev = vec![0.0; self.hidden];

        for row in window {
            let mut h = vec![0.0; self.hidden];
            for (j, h_j) in h.iter_mut().enumerate() {
                let mut pre = self.b_h[j];
                for (k, &x) in row.iter().enumerate() {
                    pre += self.w_ih[j][k] * x;
                }
                for (k, &hp) in h_prev.iter().enumerate() {
                    pre += self.w_hh[j][k] * hp;
                }
                *h_j = pre.tanh();
            }
            states.push(h.clone());
            h_prev = h;
        }

        let last = states.last().map(|s| s.as_slice()).unwrap_or(&[]);
        let output = self.b_out
            + last
                .iter()
                .zip(self.w_out.iter())
                .map(|(h, w)| h * w)
                .sum::<f64>();
        (states, output)
    }

    /// One SGD step on a single sample via backpropagation through time.
    /// Returns the squared error before the update.
    pub fn train_sample(&mut self, window: &[Vec<f64>], target: f64, learning_rate: f64) -> f64 {
        let (states, output) = self.forward_states(window);
        let error = output - target;
        let loss = error * error;

        let d_out = 2.0 * error;

        let mut grad_w_ih = vec![vec![0.0; self.input]; self.hidden];
        let mut grad_w_hh = vec![vec![0.0; self.hidden]; self.hidden];
        let mut grad_b_h = vec![0.0; self.hidden];
        let mut grad_w_out = vec![0.0; self.hidden];

        let last = &states[states.len() - 1];
        for (j, g) in grad_w_out.iter_mut().enumerate() {
            *g = d_out * last[j];
        }
        let grad_b_out = d_out;

        // dL/dh at the last step comes from the readout; earlier steps
        // receive it through the recurrence.
        let mut d_h: Vec<f64> = self.w_out.iter().map(|w| d_out * w).collect();

        for t in (0..states.len()).rev() {
            let h_t = &states[t];
            // tanh'(pre) = 1 - h^2
            let d_pre: Vec<f64> = d_h
                .iter()
                .zip(h_t.iter())
                .map(|(dh, h)| dh * (1.0 - h * h))
                .collect();

            let h_prev: &[f64] = if t > 0 { &states[t - 1] } else { &[] };
            for j in 0..self.hidden {
                for (k, &x) in window[t].iter().enumerate() {
                    grad_w_ih[j][k] += d_pre[j] * x;
                }
                for (k, &hp) in h_prev.iter().enumerate() {
                    grad_w_hh[j][k] += d_pre[j] * hp;
                }
                grad_b_h[j] += d_pre[j];
            }

            if t > 0 {
                let mut d_h_prev = vec![0.0; self.hidden];
                for (k, d) in d_h_prev.iter_mut().enumerate() {
                    for j in 0..self.hidden {
                        *d += self.w_hh[j][k] * d_pre[j];
                    }
                }
                d_h = d_h_prev;
            }
        }

        let clip = |g: f64| g.clamp(-GRAD_CLIP, GRAD_CLIP);
        for j in 0..self.hidden {
            for k in 0..self.input {
                self.w_ih[j][k] -= learning_rate * clip(grad_w_ih[j][k]);
            }
            for k in 0..self.hidden {
                self.w_hh[j][k] -= learning_rate * clip(grad_w_hh[j][k]);
            }
            self.b_h[j] -= learning_rate * clip(grad_b_h[j]);
            self.w_out[j] -= learning_rate * clip(grad_w_out[j]);
        }
        self.b_out -= learning_rate * clip(grad_b_out);

        loss
    }
}
