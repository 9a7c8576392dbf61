use anyhow::{Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches};
use lmfrontier::{CommonConfig, Cutoff, SimpleVocabConfig};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

static DEFAULT_CLAP_SETTINGS: &[AppSettings] = &[
    AppSettings::DontCollapseArgsInUsage,
    AppSettings::UnifiedHelpMessage,
];

// Option constants
static DIMS: &str = "dims";
static DISCARD: &str = "discard";
static EPOCHS: &str = "epochs";
static EVAL_SENTENCES: &str = "eval_sentences";
static LR: &str = "lr";
static MINCOUNT: &str = "mincount";
static SEED: &str = "seed";
static TARGET_SIZE: &str = "target_size";

pub trait LmfrontierApp
where
    Self: Sized,
{
    const CORPUS: &'static str = "CORPUS";
    const OUTPUT: &'static str = "OUTPUT";

    fn app() -> App<'static, 'static>;

    fn parse(matches: &ArgMatches) -> Result<Self>;

    fn run(&self) -> Result<()>;

    fn common_opts<'a, 'b>(name: &str) -> App<'a, 'b> {
        let version = if let Some(git_desc) = option_env!("MAYBE_LMFRONTIER_GIT_DESC") {
            git_desc
        } else {
            env!("CARGO_PKG_VERSION")
        };
        App::new(name)
            .settings(DEFAULT_CLAP_SETTINGS)
            .version(version)
            .arg(
                Arg::with_name(DIMS)
                    .long("dims")
                    .value_name("DIMENSIONS")
                    .help("Embedding (or hidden layer) dimensionality")
                    .takes_value(true)
                    .default_value("100"),
            )
            .arg(
                Arg::with_name(DISCARD)
                    .long("discard")
                    .value_name("THRESHOLD")
                    .help("Discard threshold")
                    .takes_value(true)
                    .default_value("1e-4"),
            )
            .arg(
                Arg::with_name(EPOCHS)
                    .long("epochs")
                    .value_name("N")
                    .help("Number of epochs")
                    .takes_value(true)
                    .default_value("5"),
            )
            .arg(
                Arg::with_name(EVAL_SENTENCES)
                    .long("eval-sentences")
                    .value_name("N")
                    .help("Hold out the first N sentences for computing the log-likelihood")
                    .takes_value(true)
                    .default_value("0"),
            )
            .arg(
                Arg::with_name(LR)
                    .long("lr")
                    .value_name("LEARNING_RATE")
                    .help("Initial learning rate")
                    .takes_value(true)
                    .default_value("0.05"),
            )
            .arg(
                Arg::with_name(MINCOUNT)
                    .long("mincount")
                    .value_name("FREQ")
                    .help("Minimum token frequency")
                    .takes_value(true)
                    .default_value("5"),
            )
            .arg(
                Arg::with_name(TARGET_SIZE)
                    .long("target-size")
                    .value_name("SIZE")
                    .help("Target vocabulary size, overrides the minimum frequency")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(SEED)
                    .long("seed")
                    .value_name("SEED")
                    .help("Seed of the random number generator (default: from entropy)")
                    .takes_value(true),
            )
            .arg(
                Arg::with_name(Self::CORPUS)
                    .help("Tokenized corpus")
                    .index(1)
                    .required(true),
            )
            .arg(
                Arg::with_name(Self::OUTPUT)
                    .help("Embeddings output")
                    .index(2)
                    .required(true),
            )
    }

    /// Construct `CommonConfig` from `matches`.
    fn parse_common_config(matches: &ArgMatches) -> Result<CommonConfig> {
        let dims = matches
            .value_of(DIMS)
            .map(|v| v.parse().context("Cannot parse dimensionality"))
            .transpose()?
            .unwrap();
        let epochs = matches
            .value_of(EPOCHS)
            .map(|v| v.parse().context("Cannot parse number of epochs"))
            .transpose()?
            .unwrap();
        let lr = matches
            .value_of(LR)
            .map(|v| v.parse().context("Cannot parse learning rate"))
            .transpose()?
            .unwrap();

        Ok(CommonConfig { dims, epochs, lr })
    }

    /// Construct `SimpleVocabConfig` from `matches`.
    fn parse_vocab_config(matches: &ArgMatches) -> Result<SimpleVocabConfig> {
        let discard_threshold = matches
            .value_of(DISCARD)
            .map(|v| v.parse().context("Cannot parse discard threshold"))
            .transpose()?
            .unwrap();

        let cutoff = match matches.value_of(TARGET_SIZE) {
            Some(target_size) => Cutoff::TargetSize(
                target_size
                    .parse()
                    .context("Cannot parse target vocabulary size")?,
            ),
            None => Cutoff::MinCount(
                matches
                    .value_of(MINCOUNT)
                    .map(|v| v.parse().context("Cannot parse mincount"))
                    .transpose()?
                    .unwrap(),
            ),
        };

        Ok(SimpleVocabConfig {
            cutoff,
            discard_threshold,
        })
    }

    /// Get the number of held-out evaluation sentences.
    fn parse_eval_sentences(matches: &ArgMatches) -> Result<usize> {
        Ok(matches
            .value_of(EVAL_SENTENCES)
            .map(|v| v.parse().context("Cannot parse number of evaluation sentences"))
            .transpose()?
            .unwrap())
    }

    /// Construct the random number generator.
    ///
    /// The generator is seeded from `--seed` if present, from system
    /// entropy otherwise.
    fn parse_rng(matches: &ArgMatches) -> Result<XorShiftRng> {
        let seed = matches
            .value_of(SEED)
            .map(|v| v.parse().context("Cannot parse random seed"))
            .transpose()?;

        Ok(match seed {
            Some(seed) => XorShiftRng::seed_from_u64(seed),
            None => XorShiftRng::from_entropy(),
        })
    }
}
