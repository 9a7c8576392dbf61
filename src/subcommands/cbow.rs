use std::convert::TryFrom;
use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use lmfrontier::io::TrainInfo;
use lmfrontier::{
    Cbow, CbowConfig, CbowSgd, CommonConfig, OutputLayerType, SimpleVocab, SimpleVocabConfig,
    Vocab, WriteModelBinary,
};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::subcommands::{
    build_vocab, held_out_sentences, training_sentences, LmfrontierApp, TrainProgress,
};

static CONTEXT: &str = "context";
static NS: &str = "ns";
static OUTPUT_LAYER: &str = "output_layer";
static REDUCED_WINDOW: &str = "reduced_window";
static ZIPF_EXPONENT: &str = "zipf";

/// Number of sentences between progress updates.
const PROGRESS_UPDATE_INTERVAL: usize = 1000;

/// Subcommand for training CBOW models.
pub struct CbowApp {
    train_info: TrainInfo,
    common_config: CommonConfig,
    cbow_config: CbowConfig,
    vocab_config: SimpleVocabConfig,
    eval_sentences: usize,
    rng: XorShiftRng,
}

impl CbowApp {
    /// Get the corpus path.
    pub fn corpus(&self) -> &str {
        self.train_info.corpus()
    }

    /// Get the output path.
    pub fn output(&self) -> &str {
        self.train_info.output()
    }

    fn cbow_config_from_matches(matches: &ArgMatches) -> Result<CbowConfig> {
        let context_size = matches
            .value_of(CONTEXT)
            .map(|v| v.parse().context("Cannot parse context size"))
            .transpose()?
            .unwrap();
        let output = matches
            .value_of(OUTPUT_LAYER)
            .map(|v| OutputLayerType::try_from(v).context("Cannot parse output layer"))
            .transpose()?
            .unwrap();
        let negative_samples = matches
            .value_of(NS)
            .map(|v| v.parse().context("Cannot parse number of negative samples"))
            .transpose()?
            .unwrap();
        let zipf_exponent = matches
            .value_of(ZIPF_EXPONENT)
            .map(|v| {
                v.parse()
                    .context("Cannot parse exponent zipf distribution")
            })
            .transpose()?
            .unwrap();

        Ok(CbowConfig {
            context_size,
            reduced_window: matches.is_present(REDUCED_WINDOW),
            output,
            negative_samples,
            zipf_exponent,
        })
    }
}

impl LmfrontierApp for CbowApp {
    fn app() -> App<'static, 'static> {
        Self::common_opts("cbow")
            .about("Train a continuous bag-of-words model")
            .arg(
                Arg::with_name(CONTEXT)
                    .long("context")
                    .value_name("CONTEXT_SIZE")
                    .help("Context size")
                    .takes_value(true)
                    .default_value("5"),
            )
            .arg(
                Arg::with_name(REDUCED_WINDOW)
                    .long("reduced-window")
                    .help("Sample the context size for every focus word"),
            )
            .arg(
                Arg::with_name(OUTPUT_LAYER)
                    .long("output")
                    .value_name("OUTPUT_LAYER")
                    .help("Output layer")
                    .takes_value(true)
                    .possible_values(&["hs", "ns", "softmax"])
                    .default_value("hs"),
            )
            .arg(
                Arg::with_name(NS)
                    .long("ns")
                    .value_name("FREQ")
                    .help("Negative samples per word")
                    .takes_value(true)
                    .default_value("5"),
            )
            .arg(
                Arg::with_name(ZIPF_EXPONENT)
                    .long("zipf")
                    .value_name("EXP")
                    .help("Exponent Zipf distribution for negative sampling")
                    .takes_value(true)
                    .default_value("0.5"),
            )
    }

    fn parse(matches: &ArgMatches) -> Result<Self> {
        let corpus = matches.value_of(Self::CORPUS).unwrap().into();
        let output = matches.value_of(Self::OUTPUT).unwrap().into();
        let train_info = TrainInfo::new(corpus, output);

        Ok(CbowApp {
            train_info,
            common_config: Self::parse_common_config(matches)?,
            cbow_config: Self::cbow_config_from_matches(matches)?,
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
        let model = Cbow::new(
            vocab,
            self.common_config,
            self.cbow_config,
            XorShiftRng::from_rng(&mut rng)?,
        )?;
        let sgd = train(CbowSgd::new(model, rng), self)?;

        let mut output_writer = BufWriter::new(
            File::create(self.output()).context("Cannot open output file for writing.")?,
        );
        sgd.write_model_binary(&mut output_writer, self.train_info.clone())
            .context("Cannot write model")
    }
}

fn train(
    mut sgd: CbowSgd<XorShiftRng, SimpleVocab<String>>,
    app: &CbowApp,
) -> Result<CbowSgd<XorShiftRng, SimpleVocab<String>>> {
    let held_out = held_out_sentences(app.corpus(), app.eval_sentences)?;
    let n_tokens = sgd.model().vocab().n_tokens();
    let progress = TrainProgress::new(&app.common_config, n_tokens);

    for epoch in 0..app.common_config.epochs {
        for (idx, sentence) in training_sentences(app.corpus(), app.eval_sentences)?.enumerate() {
            let sentence = sentence.context("Cannot read sentence")?;
            let lr = progress.lr(sgd.n_tokens_processed());
            sgd.update_sentence(&sentence, lr);

            if idx % PROGRESS_UPDATE_INTERVAL == 0 {
                progress.update(sgd.n_tokens_processed(), sgd.train_loss());
            }
        }

        if !held_out.is_empty() {
            progress.println(format!(
                "Epoch {}: held-out log-likelihood: {:.4}",
                epoch + 1,
                sgd.log_likelihood(held_out.iter().map(Vec::as_slice))
            ));
        }
    }

    progress.finish();

    Ok(sgd)
}
