mod output;
pub use self::output::{ClassSoftmax, FlatSoftmax, OutputLayer};

use anyhow::{bail, Result};
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;

use self::output::random_weights;
use crate::loss::logistic_function;
use crate::{Activation, CommonConfig, RnnConfig};

impl Activation {
    /// Apply the activation function.
    pub fn activate(self, a: f32) -> f32 {
        match self {
            Activation::Sigmoid => logistic_function(a),
            Activation::Relu => a.max(0.0),
        }
    }

    /// Derivative of the activation function.
    ///
    /// The derivative is computed from the activated value.
    pub fn derivative(self, activated: f32) -> f32 {
        match self {
            Activation::Sigmoid => activated * (1.0 - activated),
            Activation::Relu => {
                if activated > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// RNN language model with a flat softmax output layer.
pub type SimpleRnn = Rnn<FlatSoftmax>;

/// RNN language model with a class-factored output layer.
pub type ExtendedRnn = Rnn<ClassSoftmax>;

/// Recurrent neural network language model (Mikolov et al., 2010).
///
/// The hidden layer at time *t* is computed from the current word and
/// the hidden layer at time *t - 1*:
///
/// *s(t) = f(U x(t) + W s(t - 1))*
///
/// and the output layer predicts the next word from *s(t)*. The model is
/// trained with truncated backpropagation through time, the most recent
/// `bptt_steps + 1` hidden layers are kept in the state history.
#[derive(Clone, Debug)]
pub struct Rnn<O> {
    common_config: CommonConfig,
    rnn_config: RnnConfig,

    /// Input weights, one column per word.
    input: Array2<f32>,

    /// Recurrent weights.
    recurrent: Array2<f32>,

    output: O,

    /// Hidden layers, row 0 is the most recent.
    state: Array2<f32>,

    /// Activation derivatives of the hidden layers.
    state_deriv: Array2<f32>,
}

impl Rnn<FlatSoftmax> {
    /// Construct a simple RNN for a vocabulary of `n_words` words.
    pub fn new<R>(
        n_words: usize,
        common_config: CommonConfig,
        rnn_config: RnnConfig,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: Rng,
    {
        if rnn_config.class_size.is_some() {
            bail!("A simple RNN does not use word classes");
        }

        Self::new_with_output(n_words, common_config, rnn_config, rng, |rng| {
            FlatSoftmax::new(n_words, common_config.dims as usize, rng)
        })
    }
}

impl Rnn<ClassSoftmax> {
    /// Construct an extended RNN for a vocabulary of `n_words` words.
    ///
    /// The words are assigned to classes of `rnn_config.class_size` words.
    pub fn new<R>(
        n_words: usize,
        common_config: CommonConfig,
        rnn_config: RnnConfig,
        rng: &mut R,
    ) -> Result<Self>
    where
        R: Rng,
    {
        let class_size = match rnn_config.class_size {
            Some(class_size) => class_size,
            None => bail!("An extended RNN requires a class size"),
        };

        Self::new_with_output(n_words, common_config, rnn_config, rng, |rng| {
            ClassSoftmax::new(n_words, class_size, common_config.dims as usize, rng)
        })
    }
}

impl<O> Rnn<O>
where
    O: OutputLayer,
{
    fn new_with_output<R, F>(
        n_words: usize,
        common_config: CommonConfig,
        rnn_config: RnnConfig,
        rng: &mut R,
        output: F,
    ) -> Result<Self>
    where
        R: Rng,
        F: FnOnce(&mut R) -> O,
    {
        common_config.check()?;
        rnn_config.check()?;

        if n_words == 0 {
            bail!("Cannot train a language model with an empty vocabulary");
        }

        let hidden_size = common_config.dims as usize;
        let input = random_weights(hidden_size, n_words, rng);
        let recurrent = random_weights(hidden_size, hidden_size, rng);
        let output = output(rng);

        let history = rnn_config.bptt_steps as usize + 1;

        Ok(Rnn {
            common_config,
            rnn_config,
            input,
            recurrent,
            output,
            state: Array2::zeros((history, hidden_size)),
            state_deriv: Array2::zeros((history, hidden_size)),
        })
    }

    /// Train the model on a sentence.
    ///
    /// Every word of the sentence is used to predict its successor.
    /// Returns the summed cross-entropy loss of the predictions.
    pub fn train(&mut self, sentence: &[usize], lr: f32) -> f32 {
        sentence
            .windows(2)
            .map(|pair| self.train_step(pair[0], pair[1], lr))
            .sum()
    }

    fn train_step(&mut self, input: usize, target: usize, lr: f32) -> f32 {
        self.shift_state();

        let activation = self.rnn_config.activation;
        let hidden = self.forward(input, self.state.row(1));
        self.state_deriv
            .row_mut(0)
            .assign(&hidden.mapv(|v| activation.derivative(v)));
        self.state.row_mut(0).assign(&hidden);

        let (hidden_err, loss) = self.output.train(self.state.row(0), target, lr);

        // Errors of the hidden layers, row i is the error at time t - i.
        let bptt_steps = self.rnn_config.bptt_steps as usize;
        let mut errs = Array2::zeros((bptt_steps, self.hidden_size()));
        errs.row_mut(0)
            .assign(&(hidden_err * &self.state_deriv.row(0)));
        for i in 1..bptt_steps {
            let err = self.recurrent.t().dot(&errs.row(i - 1)) * &self.state_deriv.row(i);
            errs.row_mut(i).assign(&err);
        }

        self.input.column_mut(input).scaled_add(lr, &errs.row(0));
        general_mat_mul(
            lr,
            &errs.t(),
            &self.state.slice(s![1.., ..]),
            1.0,
            &mut self.recurrent,
        );

        loss
    }

    /// Move the state history one time step back.
    fn shift_state(&mut self) {
        let prev_state = self.state.slice(s![..-1, ..]).to_owned();
        self.state.slice_mut(s![1.., ..]).assign(&prev_state);
        let prev_deriv = self.state_deriv.slice(s![..-1, ..]).to_owned();
        self.state_deriv.slice_mut(s![1.., ..]).assign(&prev_deriv);
    }

    /// Compute the hidden layer for a word given the previous hidden layer.
    fn forward(&self, input: usize, prev: ArrayView1<f32>) -> Array1<f32> {
        let activation = self.rnn_config.activation;
        let mut hidden = &self.input.column(input) + &self.recurrent.dot(&prev);
        hidden.mapv_inplace(|v| activation.activate(v));
        hidden
    }

    /// Predict the word following `input`.
    ///
    /// The prediction uses the current hidden state, which is not
    /// modified.
    pub fn predict(&self, input: usize) -> usize {
        let hidden = self.forward(input, self.state.row(0));
        self.output.predict(hidden.view())
    }

    /// Log-likelihood of a sentence.
    ///
    /// The recurrence starts from an all-zero hidden layer, the model
    /// state is not used or modified.
    pub fn sentence_log_likelihood(&self, sentence: &[usize]) -> f32 {
        let mut prev = Array1::zeros(self.hidden_size());
        let mut ll = 0.0;

        for pair in sentence.windows(2) {
            let hidden = self.forward(pair[0], prev.view());
            ll += self.output.log_prob(hidden.view(), pair[1]);
            prev = hidden;
        }

        ll
    }

    /// Summed log-likelihood of sentences.
    pub fn log_likelihood<I, S>(&self, sentences: I) -> f32
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[usize]>,
    {
        sentences
            .into_iter()
            .map(|sentence| self.sentence_log_likelihood(sentence.as_ref()))
            .sum()
    }

    /// Clear the hidden state history.
    pub fn reset_state(&mut self) {
        self.state.fill(0.0);
        self.state_deriv.fill(0.0);
    }

    /// Representation of a word, taken from the output layer.
    pub fn word_representation(&self, word: usize) -> Array1<f32> {
        self.output.word_representation(word)
    }

    /// Word representations of all words, one row per word.
    pub fn word_representations(&self) -> Array2<f32> {
        let mut reprs = Array2::zeros((self.n_words(), self.output.representation_dims()));
        for (word, mut row) in reprs.outer_iter_mut().enumerate() {
            row.assign(&self.output.word_representation(word));
        }
        reprs
    }

    /// The number of words in the vocabulary.
    pub fn n_words(&self) -> usize {
        self.output.n_words()
    }
}

impl<O> Rnn<O> {
    /// Get the common configuration.
    pub fn common_config(&self) -> CommonConfig {
        self.common_config
    }

    /// Get the RNN configuration.
    pub fn rnn_config(&self) -> RnnConfig {
        self.rnn_config
    }

    /// The size of the hidden layer.
    pub fn hidden_size(&self) -> usize {
        self.recurrent.nrows()
    }

    /// Input weights, one column per word.
    pub fn input(&self) -> ArrayView2<f32> {
        self.input.view()
    }

    /// Recurrent weights.
    pub fn recurrent(&self) -> ArrayView2<f32> {
        self.recurrent.view()
    }

    /// The output layer.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Hidden state history, row 0 is the most recent hidden layer.
    pub fn state(&self) -> ArrayView2<f32> {
        self.state.view()
    }

    #[cfg(test)]
    pub(crate) fn input_mut(&mut self) -> ndarray::ArrayViewMut2<f32> {
        self.input.view_mut()
    }

    #[cfg(test)]
    pub(crate) fn recurrent_mut(&mut self) -> ndarray::ArrayViewMut2<f32> {
        self.recurrent.view_mut()
    }
}
