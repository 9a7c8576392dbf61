use std::convert::TryFrom;

use anyhow::{anyhow, bail, Error, Result};
use serde::Serialize;

use crate::vocab::Cutoff;

/// Output layers of the CBOW model.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum OutputLayerType {
    /// Full softmax over the vocabulary.
    Softmax,

    /// Hierarchical softmax over a Huffman tree (Morin & Bengio, 2005).
    HierarchicalSoftmax,

    /// Logistic regression with negative sampling (Mikolov, 2013).
    NegativeSampling,
}

impl TryFrom<&str> for OutputLayerType {
    type Error = Error;

    fn try_from(output: &str) -> Result<Self> {
        match output {
            "softmax" => Ok(OutputLayerType::Softmax),
            "hs" => Ok(OutputLayerType::HierarchicalSoftmax),
            "ns" => Ok(OutputLayerType::NegativeSampling),
            _ => Err(anyhow!("Unknown output layer: {}", output)),
        }
    }
}

/// Hidden layer activations of the RNN models.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Activation {
    /// The logistic function.
    Sigmoid,

    /// Rectified linear units.
    Relu,
}

impl TryFrom<&str> for Activation {
    type Error = Error;

    fn try_from(activation: &str) -> Result<Self> {
        match activation {
            "sigmoid" => Ok(Activation::Sigmoid),
            "relu" => Ok(Activation::Relu),
            _ => Err(anyhow!("Unknown activation: {}", activation)),
        }
    }
}

/// Common model hyperparameters.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CommonConfig {
    /// Word embedding dimensionality.
    ///
    /// For RNN models this is the size of the hidden layer.
    pub dims: u32,

    /// The number of training epochs.
    pub epochs: u32,

    /// The initial learning rate.
    pub lr: f32,
}

impl CommonConfig {
    pub(crate) fn check(&self) -> Result<()> {
        if self.dims == 0 {
            bail!("Dimensionality must be at least 1");
        }

        Ok(())
    }
}

/// Hyperparameters for the continuous bag-of-words model.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename = "Cbow")]
pub struct CbowConfig {
    /// The number of preceding and succeeding tokens that will be averaged
    /// to predict the focus token.
    ///
    /// If `reduced_window` is set, the context size is sampled uniformly
    /// from *[1, context_size]* for every focus token.
    pub context_size: u32,

    /// Sample the window size for every focus token.
    pub reduced_window: bool,

    /// The output layer.
    pub output: OutputLayerType,

    /// Number of negative samples per focus token.
    ///
    /// Only used by `OutputLayerType::NegativeSampling`.
    pub negative_samples: u32,

    /// Exponent in zipfian distribution.
    ///
    /// This is s in *f(k) = 1 / (k^s H_{N, s})*.
    pub zipf_exponent: f64,
}

impl CbowConfig {
    pub(crate) fn check(&self) -> Result<()> {
        if self.context_size == 0 {
            bail!("Context size must be at least 1");
        }

        if self.output == OutputLayerType::NegativeSampling && self.negative_samples == 0 {
            bail!("Negative sampling requires at least one negative sample");
        }

        Ok(())
    }
}

/// Hyperparameters for the recurrent language models.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename = "Rnn")]
pub struct RnnConfig {
    /// Activation function of the hidden layer.
    pub activation: Activation,

    /// Number of time steps that errors are propagated back through.
    ///
    /// A value of 1 only updates the recurrent weights using the
    /// error of the current time step.
    pub bptt_steps: u32,

    /// Size of the word classes for the class-factored output layer.
    ///
    /// `None` uses a flat softmax over the vocabulary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_size: Option<usize>,
}

impl RnnConfig {
    pub(crate) fn check(&self) -> Result<()> {
        if self.bptt_steps == 0 {
            bail!("Backpropagation through time needs at least one step");
        }

        if self.class_size == Some(0) {
            bail!("Class size must be at least 1");
        }

        Ok(())
    }
}

/// Hyperparameters for simple vocabs.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename = "SimpleVocab")]
#[serde(tag = "type")]
pub struct SimpleVocabConfig {
    /// Vocabulary size cut-off.
    pub cutoff: Cutoff,

    /// Discard threshold.
    ///
    /// The discard threshold is used to compute the discard probability of
    /// a token. E.g. with a threshold of 0.00001 tokens with approximately
    /// that probability will never be discarded.
    pub discard_threshold: f32,
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use super::{Activation, CbowConfig, OutputLayerType, RnnConfig};

    #[test]
    fn output_layer_from_str() {
        assert_eq!(
            OutputLayerType::try_from("hs").unwrap(),
            OutputLayerType::HierarchicalSoftmax
        );
        assert_eq!(
            OutputLayerType::try_from("ns").unwrap(),
            OutputLayerType::NegativeSampling
        );
        assert_eq!(
            OutputLayerType::try_from("softmax").unwrap(),
            OutputLayerType::Softmax
        );
        assert!(OutputLayerType::try_from("hsm").is_err());
    }

    #[test]
    fn activation_from_str() {
        assert_eq!(Activation::try_from("relu").unwrap(), Activation::Relu);
        assert_eq!(Activation::try_from("sigmoid").unwrap(), Activation::Sigmoid);
        assert!(Activation::try_from("tanh").is_err());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let cbow = CbowConfig {
            context_size: 2,
            reduced_window: false,
            output: OutputLayerType::NegativeSampling,
            negative_samples: 0,
            zipf_exponent: 0.5,
        };
        assert!(cbow.check().is_err());

        let rnn = RnnConfig {
            activation: Activation::Sigmoid,
            bptt_steps: 2,
            class_size: Some(0),
        };
        assert!(rnn.check().is_err());
    }
}
