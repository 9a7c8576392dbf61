use std::io::{Seek, Write};

use anyhow::{bail, Result};
use finalfusion::prelude::VocabWrap;
use rand::Rng;
use serde::Serialize;

use crate::io::{write_embeddings, TrainInfo, WriteModelBinary};
use crate::rnn::{OutputLayer, Rnn};
use crate::{Cbow, CommonConfig, RnnConfig, Vocab};

/// Map tokens to word indices, skipping unknown tokens.
fn word_indices<V, S>(vocab: &V, sentence: &[S]) -> Vec<usize>
where
    V: Vocab<VocabType = String>,
    S: AsRef<str>,
{
    sentence
        .iter()
        .filter_map(|t| vocab.idx(t.as_ref()))
        .collect()
}

/// Stochastic gradient descent for the CBOW model.
///
/// This data type applies stochastic gradient descent on sentences.
#[derive(Clone)]
pub struct CbowSgd<R, V> {
    loss: f32,
    model: Cbow<R, V>,
    n_examples: usize,
    n_tokens_processed: usize,
    rng: R,
}

impl<R, V> CbowSgd<R, V> {
    /// Get the model trained by this SGD.
    pub fn model(&self) -> &Cbow<R, V> {
        &self.model
    }

    /// Consume the SGD, returning the trained model.
    pub fn into_model(self) -> Cbow<R, V> {
        self.model
    }

    /// Get the number of tokens that are processed by this SGD.
    ///
    /// This counts tokens before subsampling, so that it can be used to
    /// compute the learning rate schedule.
    pub fn n_tokens_processed(&self) -> usize {
        self.n_tokens_processed
    }

    /// Get the average training loss of this SGD.
    ///
    /// This returns the average training loss over all context windows seen
    /// by this SGD instance since its construction.
    pub fn train_loss(&self) -> f32 {
        if self.n_examples == 0 {
            0.0
        } else {
            self.loss / self.n_examples as f32
        }
    }
}

impl<R, V> CbowSgd<R, V>
where
    R: Rng,
    V: Vocab<VocabType = String>,
{
    /// Construct a new SGD instance.
    ///
    /// `rng` is used for subsampling frequent words.
    pub fn new(model: Cbow<R, V>, rng: R) -> Self {
        CbowSgd {
            loss: 0.0,
            model,
            n_examples: 0,
            n_tokens_processed: 0,
            rng,
        }
    }

    /// Update the model parameters using the given sentence.
    ///
    /// This applies a gradient descent step on the sentence, with the given
    /// learning rate.
    pub fn update_sentence<S>(&mut self, sentence: &[S], lr: f32)
    where
        S: AsRef<str>,
    {
        let vocab = self.model.vocab();
        let rng = &mut self.rng;

        // Convert the sentence into word identifiers, discarding words with
        // the probability indicated by the dictionary.
        let words: Vec<_> = word_indices(vocab, sentence)
            .into_iter()
            .filter(|&idx| rng.gen_range(0f32..1f32) < vocab.discard(idx))
            .collect();

        let (loss, n_windows) = self.model.train_sentence(&words, lr);
        self.loss += loss;
        self.n_examples += n_windows;
        self.n_tokens_processed += sentence.len();
    }

    /// Log-likelihood of tokenized sentences.
    ///
    /// Unknown tokens are skipped, no subsampling is applied.
    pub fn log_likelihood<'a, I, S>(&self, sentences: I) -> f32
    where
        I: IntoIterator<Item = &'a [S]>,
        S: AsRef<str> + 'a,
    {
        let vocab = self.model.vocab();
        self.model.log_likelihood(
            sentences
                .into_iter()
                .map(|sentence| word_indices(vocab, sentence)),
        )
    }
}

impl<W, R, V> WriteModelBinary<W> for CbowSgd<R, V>
where
    W: Seek + Write,
    V: Vocab + Into<VocabWrap>,
    V::Config: Serialize,
{
    fn write_model_binary(self, write: &mut W, train_info: TrainInfo) -> Result<()> {
        self.model.write_model_binary(write, train_info)
    }
}

/// Stochastic gradient descent for RNN language models.
///
/// The hidden state of the model is carried over from one sentence to
/// the next.
#[derive(Clone)]
pub struct RnnSgd<O, V> {
    loss: f32,
    model: Rnn<O>,
    vocab: V,
    n_examples: usize,
    n_tokens_processed: usize,
}

impl<O, V> RnnSgd<O, V> {
    /// Get the model trained by this SGD.
    pub fn model(&self) -> &Rnn<O> {
        &self.model
    }

    /// Get the vocabulary.
    pub fn vocab(&self) -> &V {
        &self.vocab
    }

    /// Get the number of tokens that are processed by this SGD.
    pub fn n_tokens_processed(&self) -> usize {
        self.n_tokens_processed
    }

    /// Get the average training loss of this SGD.
    ///
    /// This returns the average cross-entropy per predicted word since
    /// the construction of this SGD instance.
    pub fn train_loss(&self) -> f32 {
        if self.n_examples == 0 {
            0.0
        } else {
            self.loss / self.n_examples as f32
        }
    }
}

impl<O, V> RnnSgd<O, V>
where
    O: OutputLayer,
    V: Vocab<VocabType = String>,
{
    /// Construct a new SGD instance.
    ///
    /// The vocabulary must be the one that the model was constructed
    /// for.
    pub fn new(model: Rnn<O>, vocab: V) -> Result<Self> {
        if model.n_words() != vocab.len() {
            bail!(
                "Model has {} words, vocabulary has {} types",
                model.n_words(),
                vocab.len()
            );
        }

        Ok(RnnSgd {
            loss: 0.0,
            model,
            vocab,
            n_examples: 0,
            n_tokens_processed: 0,
        })
    }

    /// Update the model parameters using the given sentence.
    pub fn update_sentence<S>(&mut self, sentence: &[S], lr: f32)
    where
        S: AsRef<str>,
    {
        let words = word_indices(&self.vocab, sentence);
        self.loss += self.model.train(&words, lr);
        self.n_examples += words.len().saturating_sub(1);
        self.n_tokens_processed += sentence.len();
    }

    /// Log-likelihood of tokenized sentences.
    ///
    /// Unknown tokens are skipped.
    pub fn log_likelihood<'a, I, S>(&self, sentences: I) -> f32
    where
        I: IntoIterator<Item = &'a [S]>,
        S: AsRef<str> + 'a,
    {
        self.model.log_likelihood(
            sentences
                .into_iter()
                .map(|sentence| word_indices(&self.vocab, sentence)),
        )
    }

    /// Clear the hidden state of the model.
    pub fn reset_state(&mut self) {
        self.model.reset_state();
    }
}

/// Metadata for RNN word representations.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct RnnMetadata<VC> {
    common_config: CommonConfig,
    #[serde(rename = "model_config")]
    rnn_config: RnnConfig,
    vocab_config: VC,
}

impl<W, O, V> WriteModelBinary<W> for RnnSgd<O, V>
where
    W: Seek + Write,
    O: OutputLayer,
    V: Vocab + Into<VocabWrap>,
    V::Config: Serialize,
{
    fn write_model_binary(self, write: &mut W, train_info: TrainInfo) -> Result<()> {
        let metadata = RnnMetadata {
            common_config: self.model.common_config(),
            rnn_config: self.model.rnn_config(),
            vocab_config: self.vocab.config(),
        };
        let representations = self.model.word_representations();
        write_embeddings(write, self.vocab, representations, metadata, train_info)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    use super::{word_indices, CbowSgd, RnnSgd};
    use crate::io::{SentenceIterator, TrainInfo, WriteModelBinary};
    use crate::util::{close, EOS};
    use crate::{
        Activation, Cbow, CbowConfig, CommonConfig, Cutoff, FlatSoftmax, OutputLayerType,
        RnnConfig, SimpleRnn, SimpleVocab, SimpleVocabConfig, Vocab, VocabBuilder,
    };

    static CORPUS: &str = "the cat sat on the mat\n\
                           the dog sat on the rug\n\
                           a cat saw a dog\n\
                           the dog saw the cat on the mat\n";

    lazy_static! {
        static ref SENTENCES: Vec<Vec<String>> = SentenceIterator::new(Cursor::new(CORPUS))
            .collect::<Result<_, _>>()
            .unwrap();
    }

    const COMMON_CONFIG: CommonConfig = CommonConfig {
        dims: 8,
        epochs: 1,
        lr: 0.05,
    };

    fn vocab(discard_threshold: f32) -> SimpleVocab<String> {
        let mut builder: VocabBuilder<_, String> = VocabBuilder::new(SimpleVocabConfig {
            cutoff: Cutoff::MinCount(1),
            discard_threshold,
        });
        for sentence in SENTENCES.iter() {
            for token in sentence {
                builder.count(token.as_str());
            }
        }
        builder.into()
    }

    fn cbow_sgd(discard_threshold: f32) -> CbowSgd<XorShiftRng, SimpleVocab<String>> {
        let model = Cbow::new(
            vocab(discard_threshold),
            COMMON_CONFIG,
            CbowConfig {
                context_size: 2,
                reduced_window: true,
                output: OutputLayerType::HierarchicalSoftmax,
                negative_samples: 5,
                zipf_exponent: 0.5,
            },
            XorShiftRng::seed_from_u64(1),
        )
        .unwrap();
        CbowSgd::new(model, XorShiftRng::seed_from_u64(2))
    }

    #[test]
    fn cbow_sgd_counts_tokens() {
        // A threshold of 1 never discards a word.
        let mut sgd = cbow_sgd(1.0);
        assert!(close(sgd.train_loss(), 0.0, 1e-7));

        sgd.update_sentence(&["the", "cat", "unknown", "sat", EOS], 0.05);
        assert_eq!(sgd.n_tokens_processed(), 5);
        assert!(sgd.train_loss() > 0.0);

        sgd.update_sentence(&["unknown", "unseen"], 0.05);
        assert_eq!(sgd.n_tokens_processed(), 7);
    }

    #[test]
    fn cbow_sgd_subsamples_frequent_words() {
        // With a tiny threshold nearly every token is discarded and no
        // windows remain.
        let mut sgd = cbow_sgd(1e-9);
        for sentence in SENTENCES.iter() {
            sgd.update_sentence(sentence, 0.05);
        }
        assert!(close(sgd.train_loss(), 0.0, 1e-7));
        assert_eq!(
            sgd.n_tokens_processed(),
            SENTENCES.iter().map(Vec::len).sum::<usize>()
        );
    }

    #[test]
    fn cbow_sgd_improves_log_likelihood() {
        let mut sgd = cbow_sgd(1.0);
        let ll_before = sgd.log_likelihood(SENTENCES.iter().map(Vec::as_slice));
        for _ in 0..50 {
            for sentence in SENTENCES.iter() {
                sgd.update_sentence(sentence, 0.1);
            }
        }
        let ll_after = sgd.log_likelihood(SENTENCES.iter().map(Vec::as_slice));
        assert!(ll_after > ll_before);
    }

    #[test]
    fn word_indices_skip_unknown_tokens() {
        let vocab = vocab(1e-4);
        let indices = word_indices(&vocab, &["the", "bird", "cat", EOS]);
        assert_eq!(
            indices,
            vec![
                vocab.idx("the").unwrap(),
                vocab.idx("cat").unwrap(),
                vocab.idx(EOS).unwrap()
            ]
        );
        assert!(word_indices(&vocab, &["bird"]).is_empty());
    }

    fn rnn_model(n_words: usize) -> SimpleRnn {
        let mut rng = XorShiftRng::seed_from_u64(3);
        SimpleRnn::new(
            n_words,
            COMMON_CONFIG,
            RnnConfig {
                activation: Activation::Sigmoid,
                bptt_steps: 2,
                class_size: None,
            },
            &mut rng,
        )
        .unwrap()
    }

    fn rnn_sgd() -> RnnSgd<FlatSoftmax, SimpleVocab<String>> {
        let vocab = vocab(1e-4);
        RnnSgd::new(rnn_model(vocab.len()), vocab).unwrap()
    }

    #[test]
    fn rnn_sgd_rejects_vocab_size_mismatch() {
        let vocab = vocab(1e-4);
        assert!(RnnSgd::new(rnn_model(vocab.len() + 1), vocab).is_err());
    }

    #[test]
    fn rnn_sgd_improves_log_likelihood() {
        let mut sgd = rnn_sgd();
        let ll_before = sgd.log_likelihood(SENTENCES.iter().map(Vec::as_slice));
        for _ in 0..50 {
            for sentence in SENTENCES.iter() {
                sgd.update_sentence(sentence, 0.1);
            }
        }
        let ll_after = sgd.log_likelihood(SENTENCES.iter().map(Vec::as_slice));
        assert!(ll_after > ll_before);

        // 7 + 7 + 6 + 9 tokens per epoch, including end-of-sentence markers.
        assert_eq!(sgd.n_tokens_processed(), 50 * 29);
        assert!(sgd.train_loss() > 0.0);
    }

    #[test]
    fn rnn_sgd_writes_representations() {
        let sgd = rnn_sgd();
        let mut output = Cursor::new(Vec::new());
        sgd.write_model_binary(
            &mut output,
            TrainInfo::new("corpus.txt".to_string(), "out.fifu".to_string()),
        )
        .unwrap();
        assert!(!output.into_inner().is_empty());
    }

    #[test]
    fn cbow_sgd_writes_embeddings() {
        let sgd = cbow_sgd(1e-4);
        let mut output = Cursor::new(Vec::new());
        sgd.write_model_binary(
            &mut output,
            TrainInfo::new("corpus.txt".to_string(), "out.fifu".to_string()),
        )
        .unwrap();
        assert!(!output.into_inner().is_empty());
    }
}
