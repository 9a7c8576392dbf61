use std::convert::TryFrom;
use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use lmfrontier::io::TrainInfo;
use lmfrontier::{
    Activation, CommonConfig, ExtendedRnn, OutputLayer, Rnn, RnnConfig, RnnSgd, SimpleRnn,
    SimpleVocab, SimpleVocabConfig, Vocab, WriteModelBinary,
};

use crate::subcommands::{
    build_vocab, held_out_sentences, training_sentences, LmfrontierApp, TrainProgress,
};

static ACTIVATION: &str = "activation";
static BPTT: &str = "bptt";
static CLASSES: &str = "classes";

/// Number of sentences between progress updates.
const PROGRESS_UPDATE_INTERVAL: usize = 100;

/// Subcommand for training RNN language models.
pub struct RnnApp {
    train_info: TrainInfo,
    common_config: CommonConfig,
    rnn_config: RnnConfig,
    vocab_config: SimpleVocabConfig,
    eval_sentences: usize,
    rng: rand_xorshift::XorShiftRng,
}

impl RnnApp {
    /// Get the corpus path.
    pub fn corpus(&self) -> &str {
        self.train_info.corpus()
    }

    /// Get the output path.
    pub fn output(&self) -> &str {
        self.train_info.output()
    }

    fn rnn_config_from_matches(matches: &ArgMatches) -> Result<RnnConfig> {
        let activation = matches
            .value_of(ACTIVATION)
            .map(|v| Activation::try_from(v).context("Cannot parse activation"))
            .transpose()?
            .unwrap();
        let bptt_steps = matches
            .value_of(BPTT)
            .map(|v| v.parse().context("Cannot parse number of BPTT steps"))
            .transpose()?
            .unwrap();
        let class_size = matches
            .value_of(CLASSES)
            .map(|v| v.parse().context("Cannot parse class size"))
            .transpose()?;

        Ok(RnnConfig {
            activation,
            bptt_steps,
            class_size,
        })
    }
}

impl LmfrontierApp for RnnApp {
    fn app() -> App<'static, 'static> {
        Self::common_opts("rnn")
            .about("Train a recurrent neural network language model")
            .arg(
                Arg::with_name(ACTIVATION)
                    .long("activation")
                    .value_name("ACTIVATION")
                    .help("Hidden layer activation")
                    .takes_value(true)
                    .possible_values(&["relu", "sigmoid"])
                    .default_value("sigmoid"),
            )
            .arg(
                Arg::with_name(BPTT)
                    .long("bptt")
                    .value_name("STEPS")
                    .help("Time steps of backpropagation through time")
                    .takes_value(true)
                    .default_value("2"),
            )
            .arg(
                Arg::with_name(CLASSES)
                    .long("classes")
                    .value_name("CLASS_SIZE")
                    .help("Use a class-factored output layer with classes of CLASS_SIZE words")
                    .takes_value(true),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        let corpus = matches.value_of(Self::CORPUS).unwrap().into();
        let output = matches.value_of(Self::OUTPUT).unwrap().into();
        let train_info = TrainInfo::new(corpus, output);

        Ok(RnnApp {
            train_info,
            common_config: Self::parse_common_config(matches)?,
            rnn_config: Self::rnn_config_from_matches(matches)?,
            vocab_config: Self::parse_vocab_config(matches)?,
            eval_sentences: Self::parse_eval_sentences(matches)?,
            rng: Self::parse_rng(matches)?,
        })
    }

    fn run(&self) -> Result<()> {
        let vocab = build_vocab(self.vocab_config, self.corpus(), self.eval_sentences)?;
        eprintln!(
            "Vocabulary: {} types, {} tokens",
            vocab.len(),
            vocab.n_tokens()
        );

        let mut rng = self.rng.clone();
        match self.rnn_config.class_size {
            Some(_) => {
                let model = ExtendedRnn::new(
                    vocab.len(),
                    self.common_config,
                    self.rnn_config,
                    &mut rng,
                )?;
                train_and_write(model, vocab, self)
            }
            None => {
                let model =
                    SimpleRnn::new(vocab.len(), self.common_config, self.rnn_config, &mut rng)?;
                train_and_write(model, vocab, self)
            }
        }
    }
}

fn train_and_write<O>(model: Rnn<O>, vocab: SimpleVocab<String>, app: &RnnApp) -> Result<()>
where
    O: OutputLayer,
{
    let held_out = held_out_sentences(app.corpus(), app.eval_sentences)?;
    let n_tokens = vocab.n_tokens();
    let progress = TrainProgress::new(&app.common_config, n_tokens);

    let mut sgd = RnnSgd::new(model, vocab)?;
    for epoch in 0..app.common_config.epochs {
        sgd.reset_state();

        for (idx, sentence) in training_sentences(app.corpus(), app.eval_sentences)?.enumerate() {
            let sentence = sentence.context("Cannot read sentence")?;
            let lr = progress.lr(sgd.n_tokens_processed());
            sgd.update_sentence(&sentence, lr);

            if idx % PROGRESS_UPDATE_INTERVAL == 0 {
                progress.update(sgd.n_tokens_processed(), sgd.train_loss());
            }
        }

        let mut msg = format!("Epoch {}: loss: {:.5}", epoch + 1, sgd.train_loss());
        if !held_out.is_empty() {
            msg.push_str(&format!(
                ", held-out log-likelihood: {:.4}",
                sgd.log_likelihood(held_out.iter().map(Vec::as_slice))
            ));
        }
        progress.println(msg);
    }

    progress.finish();

    let mut output_writer = BufWriter::new(
        File::create(app.output()).context("Cannot open output file for writing.")?,
    );
    sgd.write_model_binary(&mut output_writer, app.train_info.clone())
        .context("Cannot write model")
}
