use std::fs::File;
use std::io::{self, BufRead, Lines, Read, Seek, SeekFrom, Write};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use finalfusion::io::WriteEmbeddings;
use finalfusion::metadata::Metadata;
use finalfusion::norms::NdNorms;
use finalfusion::prelude::{Embeddings, VocabWrap};
use finalfusion::storage::NdArray;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, ArrayViewMut1, Axis};
use serde::Serialize;
use toml::Value;

use crate::util::{VersionInfo, EOS};
use crate::Vocab;

pub struct FileProgress {
    inner: File,
    progress: ProgressBar,
}

/// A progress bar that implements the `Read` trait.
///
/// This wrapper of `indicatif`'s `ProgressBar` updates progress based on the
/// current offset within the file.
impl FileProgress {
    pub fn new(file: File) -> io::Result<Self> {
        let metadata = file.metadata()?;
        let progress = ProgressBar::new(metadata.len());
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{bar:30} {bytes}/{total_bytes} ETA: {eta_precise}"),
        );

        Ok(FileProgress {
            inner: file,
            progress,
        })
    }
}

impl Read for FileProgress {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n_read = self.inner.read(buf)?;
        let pos = self.inner.seek(SeekFrom::Current(0))?;
        self.progress.set_position(pos);
        Ok(n_read)
    }
}

impl Drop for FileProgress {
    fn drop(&mut self) {
        self.progress.finish();
    }
}

/// Sentence iterator.
///
/// This iterator consumes a reader with tokenized sentences:
///
/// - One sentence per line.
/// - Tokens separated by a space.
///
/// It produces `Vec`s with the tokens, adding an end-of-sentence marker
/// to the end of the sentence. Lines that are empty or only consist of
/// whitespace are discarded.
pub struct SentenceIterator<R> {
    lines: Lines<R>,
}

impl<R> SentenceIterator<R>
where
    R: BufRead,
{
    pub fn new(read: R) -> Self {
        SentenceIterator {
            lines: read.lines(),
        }
    }
}

impl<R> Iterator for SentenceIterator<R>
where
    R: BufRead,
{
    type Item = Result<Vec<String>, io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in &mut self.lines {
            let line = match line {
                Ok(ref line) => line.trim(),
                Err(err) => return Some(Err(err)),
            };

            // Skip empty lines.
            if !line.is_empty() {
                return Some(Ok(whitespace_tokenize(line)));
            }
        }

        None
    }
}

fn whitespace_tokenize(line: &str) -> Vec<String> {
    let mut tokens = line
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();
    tokens.push(EOS.to_string());
    tokens
}

/// Information about a training run.
///
/// Stored in the metadata of the written embeddings.
#[derive(Clone, Debug, Serialize)]
pub struct TrainInfo {
    corpus: String,
    output: String,
    start_datetime: String,
    end_datetime: Option<String>,
}

impl TrainInfo {
    /// Construct new training information.
    ///
    /// The start time is set to the current time.
    pub fn new(corpus: String, output: String) -> Self {
        let start_datetime: DateTime<Local> = Local::now();
        TrainInfo {
            corpus,
            output,
            start_datetime: start_datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            end_datetime: None,
        }
    }

    /// Get the corpus path.
    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    /// Get the output file.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Get the start of training.
    pub fn start_datetime(&self) -> &str {
        &self.start_datetime
    }

    /// Get the end of training, if it has been set.
    pub fn end_datetime(&self) -> Option<&str> {
        self.end_datetime.as_deref()
    }

    /// Set the end of training to the current time.
    pub fn set_end(&mut self) {
        let end_datetime: DateTime<Local> = Local::now();
        self.end_datetime = Some(end_datetime.format("%Y-%m-%d %H:%M:%S").to_string());
    }
}

/// Trait for writing models in binary format.
pub trait WriteModelBinary<W>
where
    W: Write,
{
    fn write_model_binary(self, write: &mut W, train_info: TrainInfo) -> Result<()>;
}

/// Normalize a vector to unit length, returning its original norm.
///
/// Zero vectors are left untouched.
pub fn l2_normalize(mut v: ArrayViewMut1<f32>) -> f32 {
    let norm = v.dot(&v).sqrt();
    if norm > 0.0 {
        v /= norm;
    }
    norm
}

/// Build the metadata table of a model.
///
/// The table contains the model's own metadata, the version of this crate
/// and information about the training run.
pub(crate) fn model_metadata<M>(metadata: M, mut train_info: TrainInfo) -> Result<Value>
where
    M: Serialize,
{
    let mut metadata = Value::try_from(metadata)?;
    let build_info = Value::try_from(VersionInfo::new())?;
    let metadata_table = metadata
        .as_table_mut()
        .ok_or_else(|| anyhow!("Metadata has to be 'Table'."))?;
    metadata_table.insert("version_info".to_string(), build_info);
    train_info.set_end();
    let train_info = Value::try_from(train_info)?;
    metadata_table.insert("training_info".to_string(), train_info);

    Ok(metadata)
}

/// Write word representations as finalfusion embeddings.
///
/// Row *i* of `matrix` is the representation of the *i*-th type of
/// `vocab`. The rows are normalized, their original norms are stored
/// with the embeddings.
pub(crate) fn write_embeddings<W, V, M>(
    write: &mut W,
    vocab: V,
    mut matrix: Array2<f32>,
    metadata: M,
    train_info: TrainInfo,
) -> Result<()>
where
    W: Seek + Write,
    V: Vocab + Into<VocabWrap>,
    M: Serialize,
{
    if matrix.nrows() != vocab.len() {
        return Err(anyhow!(
            "Embedding matrix has {} rows, vocabulary has {} types",
            matrix.nrows(),
            vocab.len()
        ));
    }

    let metadata = model_metadata(metadata, train_info)?;

    let norms = matrix
        .axis_iter_mut(Axis(0))
        .map(l2_normalize)
        .collect::<Vec<_>>();

    let vocab: VocabWrap = vocab.into();
    let storage = NdArray::new(matrix);
    let norms = NdNorms::new(Array1::from(norms));

    Embeddings::new(Some(Metadata::new(metadata)), vocab, storage, norms)
        .write_embeddings(write)
        .map_err(|err| err.into())
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek, SeekFrom};

    use finalfusion::prelude::*;
    use ndarray::array;

    use super::{l2_normalize, model_metadata, write_embeddings, SentenceIterator, TrainInfo};
    use crate::util::{all_close, close, EOS};
    use crate::{Cutoff, SimpleVocab, SimpleVocabConfig, VocabBuilder};

    #[test]
    fn sentence_iterator_test() {
        let v = b"This is a sentence .\nAnd another one .\n".to_vec();
        let c = Cursor::new(v);
        let mut iter = SentenceIterator::new(c);
        assert_eq!(
            iter.next().unwrap().unwrap(),
            vec!["This", "is", "a", "sentence", ".", EOS]
        );
        assert_eq!(
            iter.next().unwrap().unwrap(),
            vec!["And", "another", "one", ".", EOS]
        );
        assert!(iter.next().is_none());
    }

    #[test]
    fn sentence_iterator_no_newline_test() {
        let v = b"This is a sentence .\nAnd another one .".to_vec();
        let c = Cursor::new(v);
        let mut iter = SentenceIterator::new(c);
        assert_eq!(
            iter.next().unwrap().unwrap(),
            vec!["This", "is", "a", "sentence", ".", EOS]
        );
        assert_eq!(
            iter.next().unwrap().unwrap(),
            vec!["And", "another", "one", ".", EOS]
        );
        assert!(iter.next().is_none());
    }

    #[test]
    fn sentence_iterator_empty_test() {
        let v = b"".to_vec();
        let c = Cursor::new(v);
        let mut iter = SentenceIterator::new(c);
        assert!(iter.next().is_none());
    }

    #[test]
    fn sentence_iterator_empty_newline_test() {
        let v = b"\n \n   \n".to_vec();
        let c = Cursor::new(v);
        let mut iter = SentenceIterator::new(c);
        assert!(iter.next().is_none());
    }

    #[test]
    fn l2_normalize_test() {
        let mut u = array![1., -2., -1., 3., -3., 1.];
        assert!(close(l2_normalize(u.view_mut()), 5., 1e-5));
        assert!(all_close(
            &[0.2, -0.4, -0.2, 0.6, -0.6, 0.2],
            u.as_slice().unwrap(),
            1e-5
        ));

        let mut zero = array![0., 0.];
        assert!(close(l2_normalize(zero.view_mut()), 0., 1e-7));
        assert!(all_close(&[0., 0.], zero.as_slice().unwrap(), 1e-7));
    }

    #[test]
    fn metadata_contains_training_info() {
        let mut table = toml::value::Table::new();
        table.insert("dims".to_string(), toml::Value::Integer(3));

        let train_info = TrainInfo::new("corpus.txt".to_string(), "out.fifu".to_string());
        let metadata = model_metadata(table, train_info).unwrap();

        assert_eq!(metadata["dims"].as_integer(), Some(3));
        assert!(metadata.get("version_info").is_some());
        assert_eq!(
            metadata["training_info"]["corpus"].as_str(),
            Some("corpus.txt")
        );
        assert!(metadata["training_info"].get("end_datetime").is_some());
    }

    fn test_vocab() -> SimpleVocab<String> {
        let config = SimpleVocabConfig {
            cutoff: Cutoff::MinCount(1),
            discard_threshold: 1e-4,
        };
        let mut builder: VocabBuilder<_, String> = VocabBuilder::new(config);
        for word in &["a", "a", "b"] {
            builder.count(word.to_string());
        }
        builder.into()
    }

    #[test]
    fn embeddings_are_written_normalized() {
        let vocab = test_vocab();
        let matrix = array![[3., 4.], [0., 2.]];
        let mut table = toml::value::Table::new();
        table.insert("model".to_string(), toml::Value::String("test".to_string()));

        let mut cursor = Cursor::new(Vec::new());
        write_embeddings(
            &mut cursor,
            vocab,
            matrix,
            table,
            TrainInfo::new("corpus".to_string(), "output".to_string()),
        )
        .unwrap();

        cursor.seek(SeekFrom::Start(0)).unwrap();
        let embeddings: Embeddings<VocabWrap, StorageWrap> =
            Embeddings::read_embeddings(&mut cursor).unwrap();

        let a = embeddings.embedding("a").unwrap();
        assert!(all_close(a.as_slice().unwrap(), &[0.6, 0.8], 1e-6));
        let b = embeddings.embedding("b").unwrap();
        assert!(all_close(b.as_slice().unwrap(), &[0., 1.], 1e-6));
    }

    #[test]
    fn mismatching_matrix_is_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(write_embeddings(
            &mut cursor,
            test_vocab(),
            array![[1., 0.]],
            toml::value::Table::new(),
            TrainInfo::new("corpus".to_string(), "output".to_string()),
        )
        .is_err());
    }
}
