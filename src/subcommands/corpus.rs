use std::fs::File;
use std::io::BufReader;
use std::iter::Skip;
use std::path::Path;

use anyhow::{Context, Result};
use lmfrontier::io::FileProgress;
use lmfrontier::{SentenceIterator, SimpleVocab, SimpleVocabConfig, VocabBuilder};

/// Sentences of a corpus file, excluding the held-out sentences.
pub type TrainingSentences = Skip<SentenceIterator<BufReader<File>>>;

/// Open the corpus for a training epoch.
///
/// The first `n_held_out` sentences are skipped.
pub fn training_sentences<P>(corpus_path: P, n_held_out: usize) -> Result<TrainingSentences>
where
    P: AsRef<Path>,
{
    let f = File::open(corpus_path).context("Cannot open corpus for reading")?;
    Ok(SentenceIterator::new(BufReader::new(f)).skip(n_held_out))
}

/// Read the first `n` sentences of the corpus.
pub fn held_out_sentences<P>(corpus_path: P, n: usize) -> Result<Vec<Vec<String>>>
where
    P: AsRef<Path>,
{
    let f = File::open(corpus_path).context("Cannot open corpus for reading")?;
    SentenceIterator::new(BufReader::new(f))
        .take(n)
        .map(|sentence| sentence.context("Cannot read sentence"))
        .collect()
}

/// Build a vocabulary from the training sentences of the corpus.
pub fn build_vocab<P>(
    config: SimpleVocabConfig,
    corpus_path: P,
    n_held_out: usize,
) -> Result<SimpleVocab<String>>
where
    P: AsRef<Path>,
{
    let f = File::open(corpus_path).context("Cannot open corpus for reading")?;
    let file_progress = FileProgress::new(f).context("Cannot create progress bar")?;

    let sentences = SentenceIterator::new(BufReader::new(file_progress)).skip(n_held_out);

    let mut builder: VocabBuilder<_, String> = VocabBuilder::new(config);
    for sentence in sentences {
        let sentence = sentence.context("Cannot read sentence")?;

        for token in sentence {
            builder.count(token);
        }
    }

    Ok(builder.into())
}
