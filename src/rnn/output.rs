use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::Rng;

use crate::loss::{log_sum_exp, softmax_error};
use crate::util::argmax;

/// Standard deviation of the initial RNN weights.
pub(crate) const INIT_STDDEV: f32 = 0.1;

/// Draw a weight matrix from *N(0, INIT_STDDEV²)*.
pub(crate) fn random_weights<R>(rows: usize, cols: usize, rng: &mut R) -> Array2<f32>
where
    R: Rng,
{
    Array2::<f32>::random_using((rows, cols), StandardNormal, rng) * INIT_STDDEV
}

/// `matrix += lr · err ⊗ hidden`
fn outer_update(matrix: &mut Array2<f32>, err: ArrayView1<f32>, hidden: ArrayView1<f32>, lr: f32) {
    general_mat_mul(
        lr,
        &err.insert_axis(Axis(1)),
        &hidden.insert_axis(Axis(0)),
        1.0,
        matrix,
    );
}

/// Output layer of a recurrent language model.
///
/// The output layer predicts the next word from the hidden layer.
pub trait OutputLayer {
    /// The number of words that can be predicted.
    fn n_words(&self) -> usize;

    /// Dimensionality of the word representations.
    fn representation_dims(&self) -> usize;

    /// Predict `target` from `hidden` and update the output weights.
    ///
    /// Returns the error backpropagated to the hidden layer (before
    /// applying the derivative of the hidden activation) and the
    /// cross-entropy loss of the prediction. The backpropagated error is
    /// computed with the updated output weights.
    fn train(&mut self, hidden: ArrayView1<f32>, target: usize, lr: f32) -> (Array1<f32>, f32);

    /// Log-probability of `target` given `hidden`.
    fn log_prob(&self, hidden: ArrayView1<f32>, target: usize) -> f32;

    /// Most probable word given `hidden`.
    fn predict(&self, hidden: ArrayView1<f32>) -> usize;

    /// Representation of a word in the output layer.
    fn word_representation(&self, word: usize) -> Array1<f32>;
}

/// Softmax over the full vocabulary.
///
/// The weight matrix has one row per word, that row is also the word's
/// representation.
#[derive(Clone, Debug)]
pub struct FlatSoftmax {
    weights: Array2<f32>,
}

impl FlatSoftmax {
    pub fn new<R>(n_words: usize, hidden_size: usize, rng: &mut R) -> Self
    where
        R: Rng,
    {
        FlatSoftmax {
            weights: random_weights(n_words, hidden_size, rng),
        }
    }

    /// Output weights, one row per word.
    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    #[cfg(test)]
    pub(crate) fn from_weights(weights: Array2<f32>) -> Self {
        FlatSoftmax { weights }
    }
}

impl OutputLayer for FlatSoftmax {
    fn n_words(&self) -> usize {
        self.weights.nrows()
    }

    fn representation_dims(&self) -> usize {
        self.weights.ncols()
    }

    fn train(&mut self, hidden: ArrayView1<f32>, target: usize, lr: f32) -> (Array1<f32>, f32) {
        let (err, loss) = softmax_error(self.weights.dot(&hidden).view(), target);
        outer_update(&mut self.weights, err.view(), hidden, lr);
        (self.weights.t().dot(&err), loss)
    }

    fn log_prob(&self, hidden: ArrayView1<f32>, target: usize) -> f32 {
        let logits = self.weights.dot(&hidden);
        logits[target] - log_sum_exp(logits.view())
    }

    fn predict(&self, hidden: ArrayView1<f32>) -> usize {
        let logits = self.weights.dot(&hidden);
        argmax(&logits).unwrap_or(0)
    }

    fn word_representation(&self, word: usize) -> Array1<f32> {
        self.weights.row(word).to_owned()
    }
}

/// Class-factored softmax.
///
/// Words are split into consecutive classes of `class_size` words. A word
/// `w` is predicted as the pair of its class `w / class_size` and its slot
/// `w % class_size` within the class, using two softmaxes that share the
/// hidden layer:
///
/// *P(w | h) = P(class(w) | h) P(slot(w) | h)*
///
/// The slot weights are shared between all classes, which reduces the
/// output layer from *|V|* to *class_size + |V| / class_size* rows. Since
/// the vocabulary is sorted by frequency, classes group words of similar
/// frequency.
#[derive(Clone, Debug)]
pub struct ClassSoftmax {
    class_size: usize,
    n_words: usize,
    slot_weights: Array2<f32>,
    class_weights: Array2<f32>,
}

impl ClassSoftmax {
    pub fn new<R>(n_words: usize, class_size: usize, hidden_size: usize, rng: &mut R) -> Self
    where
        R: Rng,
    {
        let n_classes = (n_words + class_size - 1) / class_size;
        let n_slots = class_size.min(n_words);

        ClassSoftmax {
            class_size,
            n_words,
            slot_weights: random_weights(n_slots, hidden_size, rng),
            class_weights: random_weights(n_classes, hidden_size, rng),
        }
    }

    /// The class of a word.
    pub fn class(&self, word: usize) -> usize {
        word / self.class_size
    }

    /// The slot of a word within its class.
    pub fn slot(&self, word: usize) -> usize {
        word % self.class_size
    }

    /// The number of word classes.
    pub fn n_classes(&self) -> usize {
        self.class_weights.nrows()
    }

    /// Slot weights, one row per slot.
    pub fn slot_weights(&self) -> &Array2<f32> {
        &self.slot_weights
    }

    /// Class weights, one row per class.
    pub fn class_weights(&self) -> &Array2<f32> {
        &self.class_weights
    }
}

impl OutputLayer for ClassSoftmax {
    fn n_words(&self) -> usize {
        self.n_words
    }

    fn representation_dims(&self) -> usize {
        self.slot_weights.ncols() + self.class_weights.ncols()
    }

    fn train(&mut self, hidden: ArrayView1<f32>, target: usize, lr: f32) -> (Array1<f32>, f32) {
        let (slot_err, slot_loss) =
            softmax_error(self.slot_weights.dot(&hidden).view(), self.slot(target));
        let (class_err, class_loss) =
            softmax_error(self.class_weights.dot(&hidden).view(), self.class(target));

        outer_update(&mut self.slot_weights, slot_err.view(), hidden, lr);
        outer_update(&mut self.class_weights, class_err.view(), hidden, lr);

        let hidden_err = self.slot_weights.t().dot(&slot_err) + self.class_weights.t().dot(&class_err);

        (hidden_err, slot_loss + class_loss)
    }

    fn log_prob(&self, hidden: ArrayView1<f32>, target: usize) -> f32 {
        let slot_logits = self.slot_weights.dot(&hidden);
        let class_logits = self.class_weights.dot(&hidden);

        slot_logits[self.slot(target)] - log_sum_exp(slot_logits.view())
            + class_logits[self.class(target)]
            - log_sum_exp(class_logits.view())
    }

    fn predict(&self, hidden: ArrayView1<f32>) -> usize {
        let class_logits = self.class_weights.dot(&hidden);
        let class = argmax(&class_logits).unwrap_or(0);

        // The last class can have fewer words than there are slots.
        let n_class_words = self.class_size.min(self.n_words - class * self.class_size);
        let slot_logits = self
            .slot_weights
            .slice(s![..n_class_words, ..])
            .dot(&hidden);
        let slot = argmax(&slot_logits).unwrap_or(0);

        class * self.class_size + slot
    }

    fn word_representation(&self, word: usize) -> Array1<f32> {
        let slot_dims = self.slot_weights.ncols();
        let mut repr = Array1::zeros(self.representation_dims());
        repr.slice_mut(s![..slot_dims])
            .assign(&self.slot_weights.row(self.slot(word)));
        repr.slice_mut(s![slot_dims..])
            .assign(&self.class_weights.row(self.class(word)));
        repr
    }
}
