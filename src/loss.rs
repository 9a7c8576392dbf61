use ndarray::{Array1, ArrayView1};

use crate::util::safe_ln;

/// Return the loss and gradient of the co-occurence classification.
///
/// This function returns the negative log likelihood and gradient of
/// a training instance using the probability function *P(1|x) =
/// σ(u·v)*. `u` and `v` are vectors and `label` is the target label.
///
/// The partial derivative of the log likelihood with respect to a
/// component *v_1* is *(y - σ(u·v)) u_1*. We return *y - σ(u·v)* as the
/// gradient, so that the caller can compute the gradient for all
/// components of u and v.
///
/// In CBOW this is used both for negative sampling, where `u` is the
/// hidden layer and `v` an output word vector, and for hierarchical
/// softmax, where `v` is the vector of an inner node of the Huffman
/// tree and the label is the branch taken at that node.
pub fn log_logistic_loss(u: ArrayView1<f32>, v: ArrayView1<f32>, label: bool) -> (f32, f32) {
    let dp = u.dot(&v);
    let lf = logistic_function(dp);
    let grad = (label as usize) as f32 - lf;
    let loss = if label {
        -safe_ln(lf)
    } else {
        -safe_ln(1.0 - lf)
    };

    (loss, grad)
}

/// Compute the logistic function.
///
/// **σ(a) = 1 / (1 + e^{-a})**
#[inline]
pub fn logistic_function(a: f32) -> f32 {
    1.0 / (1.0 + (-a).exp())
}

/// Compute *ln σ(a)* without overflowing for large |a|.
#[inline]
pub fn log_sigmoid(a: f32) -> f32 {
    if a >= 0.0 {
        -(-a).exp().ln_1p()
    } else {
        a - a.exp().ln_1p()
    }
}

/// Compute *ln Σ_i e^{x_i}*.
///
/// The maximum is subtracted before exponentiation, so that large
/// activations do not overflow.
pub fn log_sum_exp(logits: ArrayView1<f32>) -> f32 {
    let max = logits.fold(std::f32::NEG_INFINITY, |m, &v| m.max(v));
    if !max.is_finite() {
        return max;
    }

    max + logits.mapv(|v| (v - max).exp()).sum().ln()
}

/// Softmax of the given activations.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.fold(std::f32::NEG_INFINITY, |m, &v| m.max(v));
    let mut probs = logits.mapv(|v| (v - max).exp());
    let z = probs.sum();
    probs /= z;
    probs
}

/// Error of a softmax output layer for a gold index.
///
/// Returns *onehot(target) - softmax(logits)* together with the
/// cross-entropy loss *-ln P(target)*.
pub fn softmax_error(logits: ArrayView1<f32>, target: usize) -> (Array1<f32>, f32) {
    let mut err = -softmax(logits);
    let loss = -safe_ln(-err[target]);
    err[target] += 1.0;
    (err, loss)
}
