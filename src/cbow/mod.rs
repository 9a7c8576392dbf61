//! Continuous bag-of-words model (Mikolov et al., 2013).

mod context;
pub use self::context::ContextWindows;

use std::io::{Seek, Write};

use anyhow::{bail, Result};
use finalfusion::prelude::VocabWrap;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::io::{write_embeddings, TrainInfo, WriteModelBinary};
use crate::loss::{log_logistic_loss, log_sigmoid, log_sum_exp, softmax_error};
use crate::sampling::ZipfRangeGenerator;
use crate::vocab::huffman::HuffmanTree;
use crate::{CbowConfig, CommonConfig, OutputLayerType, Vocab};

/// Output layer state of a CBOW model.
#[derive(Clone)]
enum CbowOutput<R> {
    Softmax,
    HierarchicalSoftmax(HuffmanTree),
    NegativeSampling {
        negative_samples: usize,
        range_gen: ZipfRangeGenerator<R>,
    },
}

/// Continuous bag-of-words model.
///
/// The model predicts a focus word from the average of the input vectors
/// of its context words. The input matrix has one row per word, those rows
/// are the word embeddings. The output matrix has one row per word for the
/// softmax and negative sampling output layers and one row per inner node
/// of the Huffman tree for hierarchical softmax.
#[derive(Clone)]
pub struct Cbow<R, V> {
    common_config: CommonConfig,
    cbow_config: CbowConfig,
    vocab: V,
    input: Array2<f32>,
    output: Array2<f32>,
    output_layer: CbowOutput<R>,
    rng: R,
}

impl<R, V> Cbow<R, V>
where
    R: Rng + SeedableRng,
    V: Vocab,
{
    /// Construct a model for the given vocabulary.
    ///
    /// Input vectors are drawn uniformly from *[-0.5/dims, 0.5/dims]*,
    /// output vectors are initialized to zero.
    pub fn new(
        vocab: V,
        common_config: CommonConfig,
        cbow_config: CbowConfig,
        mut rng: R,
    ) -> Result<Self> {
        common_config.check()?;
        cbow_config.check()?;

        if vocab.is_empty() {
            bail!("Cannot train a CBOW model with an empty vocabulary");
        }

        let (output_layer, n_outputs) = match cbow_config.output {
            OutputLayerType::Softmax => (CbowOutput::Softmax, vocab.len()),
            OutputLayerType::HierarchicalSoftmax => {
                let counts = vocab.types().iter().map(|t| t.count()).collect::<Vec<_>>();
                let tree = HuffmanTree::new(&counts)?;
                let n_inner = tree.n_inner_nodes();
                (CbowOutput::HierarchicalSoftmax(tree), n_inner)
            }
            OutputLayerType::NegativeSampling => {
                if vocab.len() < 2 {
                    bail!("Negative sampling requires at least two words in the vocabulary");
                }

                let range_gen = ZipfRangeGenerator::new_with_exponent(
                    R::from_rng(&mut rng)?,
                    vocab.len(),
                    cbow_config.zipf_exponent,
                )?;
                (
                    CbowOutput::NegativeSampling {
                        negative_samples: cbow_config.negative_samples as usize,
                        range_gen,
                    },
                    vocab.len(),
                )
            }
        };

        let dims = common_config.dims as usize;
        let init_bound = 0.5 / dims as f32;
        let input = Array2::random_using(
            (vocab.len(), dims),
            Uniform::new_inclusive(-init_bound, init_bound),
            &mut rng,
        );
        let output = Array2::zeros((n_outputs, dims));

        Ok(Cbow {
            common_config,
            cbow_config,
            vocab,
            input,
            output,
            output_layer,
            rng,
        })
    }
}

impl<R, V> Cbow<R, V> {
    /// Get the common configuration.
    pub fn common_config(&self) -> CommonConfig {
        self.common_config
    }

    /// Get the CBOW configuration.
    pub fn cbow_config(&self) -> CbowConfig {
        self.cbow_config
    }

    /// Get the model's vocabulary.
    pub fn vocab(&self) -> &V {
        &self.vocab
    }

    /// Get the input representation (embedding) of a word.
    pub fn word_input_rep(&self, word: usize) -> ArrayView1<f32> {
        self.input.row(word)
    }

    /// Get the output representation of a word.
    ///
    /// Returns `None` for hierarchical softmax, where output vectors
    /// belong to the inner nodes of the Huffman tree rather than words.
    pub fn word_output_rep(&self, word: usize) -> Option<ArrayView1<f32>> {
        match self.output_layer {
            CbowOutput::HierarchicalSoftmax(_) => None,
            _ => Some(self.output.row(word)),
        }
    }

    /// Destruct the model into its vocabulary and input matrix.
    pub fn into_parts(self) -> (V, Array2<f32>) {
        (self.vocab, self.input)
    }

    #[cfg(test)]
    pub(crate) fn input_mut(&mut self) -> ndarray::ArrayViewMut2<f32> {
        self.input.view_mut()
    }

    #[cfg(test)]
    pub(crate) fn output_mut(&mut self) -> ndarray::ArrayViewMut2<f32> {
        self.output.view_mut()
    }

    /// Hidden layer: the mean of the context input vectors.
    fn hidden(&self, contexts: &[usize]) -> Array1<f32> {
        let mut hidden = Array1::zeros(self.input.ncols());
        for &context in contexts {
            hidden += &self.input.row(context);
        }
        hidden /= contexts.len() as f32;
        hidden
    }

    /// Log-probability of the focus word given the hidden layer.
    fn log_prob(&self, focus: usize, hidden: ArrayView1<f32>) -> f32 {
        match self.output_layer {
            CbowOutput::HierarchicalSoftmax(ref tree) => tree
                .decisions(focus)
                .map(|(node, branch)| {
                    let activation = self.output.row(node).dot(&hidden);
                    log_sigmoid(if branch { activation } else { -activation })
                })
                .sum(),
            _ => {
                let logits = self.output.dot(&hidden);
                logits[focus] - log_sum_exp(logits.view())
            }
        }
    }

    /// Log-likelihood of sentences under the model.
    ///
    /// This sums *ln P(focus | context)* over all (unreduced) windows of the
    /// given sentences. The model is not modified.
    pub fn log_likelihood<I, S>(&self, sentences: I) -> f32
    where
        R: Rng,
        I: IntoIterator<Item = S>,
        S: AsRef<[usize]>,
    {
        let context_size = self.cbow_config.context_size as usize;
        let mut ll = 0.0;
        for sentence in sentences {
            for (focus, contexts) in ContextWindows::<R>::new(sentence.as_ref(), context_size) {
                let hidden = self.hidden(&contexts);
                ll += self.log_prob(focus, hidden.view());
            }
        }

        ll
    }
}

impl<R, V> Cbow<R, V>
where
    R: Rng,
{
    /// Train on every window of a sentence.
    ///
    /// Returns the summed loss and the number of windows.
    pub fn train_sentence(&mut self, sentence: &[usize], lr: f32) -> (f32, usize) {
        let context_size = self.cbow_config.context_size as usize;
        let windows: Vec<_> = if self.cbow_config.reduced_window {
            ContextWindows::reduced(sentence, context_size, &mut self.rng).collect()
        } else {
            ContextWindows::<R>::new(sentence, context_size).collect()
        };

        let loss = windows
            .iter()
            .map(|(focus, contexts)| self.train_window(*focus, contexts, lr))
            .sum();

        (loss, windows.len())
    }

    /// Perform a gradient descent step for a single window.
    ///
    /// The output vectors involved in predicting `focus` are updated
    /// immediately. The gradient with respect to the hidden layer is
    /// accumulated using the output vectors before their update and is
    /// then distributed over the input vectors of the context words.
    ///
    /// Returns the loss of predicting the focus word.
    pub fn train_window(&mut self, focus: usize, contexts: &[usize], lr: f32) -> f32 {
        if contexts.is_empty() {
            return 0.0;
        }

        let hidden = self.hidden(contexts);
        let mut hidden_delta = Array1::zeros(hidden.len());

        let output = &mut self.output;
        let loss = match self.output_layer {
            CbowOutput::Softmax => softmax_step(output, hidden.view(), &mut hidden_delta, focus, lr),
            CbowOutput::HierarchicalSoftmax(ref tree) => {
                let mut loss = 0.0;
                for (node, branch) in tree.decisions(focus) {
                    loss += logistic_step(output, hidden.view(), &mut hidden_delta, node, branch, lr);
                }
                loss
            }
            CbowOutput::NegativeSampling {
                negative_samples,
                ref mut range_gen,
            } => {
                let mut loss =
                    logistic_step(output, hidden.view(), &mut hidden_delta, focus, true, lr);
                for _ in 0..negative_samples {
                    let negative = range_gen
                        .by_ref()
                        .find(|&negative| negative != focus)
                        .expect("Zipf range generator is endless");
                    loss +=
                        logistic_step(output, hidden.view(), &mut hidden_delta, negative, false, lr);
                }
                loss
            }
        };

        // The hidden layer is the mean of the context vectors.
        let context_lr = lr / contexts.len() as f32;
        for &context in contexts {
            self.input
                .row_mut(context)
                .scaled_add(context_lr, &hidden_delta);
        }

        loss
    }
}

/// Binary logistic prediction of `label` from the output vector `idx`.
///
/// Accumulates the hidden layer gradient in `hidden_delta` before updating
/// the output vector.
fn logistic_step(
    output: &mut Array2<f32>,
    hidden: ArrayView1<f32>,
    hidden_delta: &mut Array1<f32>,
    idx: usize,
    label: bool,
    lr: f32,
) -> f32 {
    let (loss, part_gradient) = log_logistic_loss(hidden, output.row(idx), label);
    hidden_delta.scaled_add(part_gradient, &output.row(idx));
    output.row_mut(idx).scaled_add(lr * part_gradient, &hidden);
    loss
}

/// Full softmax prediction of `focus`.
fn softmax_step(
    output: &mut Array2<f32>,
    hidden: ArrayView1<f32>,
    hidden_delta: &mut Array1<f32>,
    focus: usize,
    lr: f32,
) -> f32 {
    let (err, loss) = softmax_error(output.dot(&hidden).view(), focus);
    hidden_delta.assign(&output.t().dot(&err));
    for (mut output_vec, &e) in output.axis_iter_mut(Axis(0)).zip(err.iter()) {
        output_vec.scaled_add(lr * e, &hidden);
    }
    loss
}

/// Metadata for CBOW embeddings.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CbowMetadata<VC> {
    common_config: CommonConfig,
    #[serde(rename = "model_config")]
    cbow_config: CbowConfig,
    vocab_config: VC,
}

impl<W, R, V> WriteModelBinary<W> for Cbow<R, V>
where
    W: Seek + Write,
    V: Vocab + Into<VocabWrap>,
    V::Config: Serialize,
{
    fn write_model_binary(self, write: &mut W, train_info: TrainInfo) -> Result<()> {
        let metadata = CbowMetadata {
            common_config: self.common_config,
            cbow_config: self.cbow_config,
            vocab_config: self.vocab.config(),
        };
        let (vocab, input) = self.into_parts();
        write_embeddings(write, vocab, input, metadata, train_info)
    }
}
