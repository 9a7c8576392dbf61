#[macro_use]
#[cfg(test)]
extern crate lazy_static;

#[macro_use]
#[cfg(test)]
extern crate maplit;

mod cbow;
pub use crate::cbow::{Cbow, CbowMetadata, ContextWindows};

mod config;
pub use crate::config::{
    Activation, CbowConfig, CommonConfig, OutputLayerType, RnnConfig, SimpleVocabConfig,
};

pub mod io;
pub use crate::io::{SentenceIterator, WriteModelBinary};

pub mod loss;

mod rnn;
pub use crate::rnn::{ClassSoftmax, ExtendedRnn, FlatSoftmax, OutputLayer, Rnn, SimpleRnn};

pub mod sampling;

mod sgd;
pub use crate::sgd::{CbowSgd, RnnMetadata, RnnSgd};

pub(crate) mod util;

pub(crate) mod vocab;
pub use crate::vocab::huffman::HuffmanTree;
pub use crate::vocab::simple::SimpleVocab;
pub use crate::vocab::{CountedType, Cutoff, Vocab, VocabBuilder, Word};
