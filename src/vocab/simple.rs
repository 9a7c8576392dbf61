use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use finalfusion::vocab::SimpleVocab as FiFuSimpleVocab;
use finalfusion::prelude::VocabWrap;

use crate::vocab::{create_discards, create_indices};
use crate::{CountedType, SimpleVocabConfig, Vocab, VocabBuilder};

/// Generic corpus vocabulary type.
///
/// Types are sorted by descending frequency, so that the index of a type
/// is also its frequency rank.
#[derive(Clone)]
pub struct SimpleVocab<T> {
    config: SimpleVocabConfig,
    types: Vec<CountedType<T>>,
    index: HashMap<T, usize>,
    n_tokens: usize,
    discards: Vec<f32>,
}

impl<T> SimpleVocab<T>
where
    T: Hash + Eq + Clone + Ord,
{
    /// Constructor only used by the Vocabbuilder
    pub(crate) fn new(
        config: SimpleVocabConfig,
        types: Vec<CountedType<T>>,
        n_tokens: usize,
    ) -> Self {
        let discards = create_discards(config.discard_threshold, &types, n_tokens);
        let index = create_indices(&types);
        SimpleVocab {
            config,
            types,
            index,
            n_tokens,
            discards,
        }
    }

    /// Get a specific type.
    pub fn get<Q>(&self, key: &Q) -> Option<&CountedType<T>>
    where
        T: Borrow<Q>,
        Q: Hash + ?Sized + Eq,
    {
        self.idx(key).map(|idx| &self.types[idx])
    }
}

impl From<SimpleVocab<String>> for VocabWrap {
    fn from(vocab: SimpleVocab<String>) -> VocabWrap {
        FiFuSimpleVocab::new(
            vocab
                .types
                .into_iter()
                .map(|t| t.label)
                .collect::<Vec<_>>(),
        )
        .into()
    }
}

impl<T> Vocab for SimpleVocab<T>
where
    T: Hash + Eq,
{
    type VocabType = T;
    type Config = SimpleVocabConfig;

    fn config(&self) -> SimpleVocabConfig {
        self.config
    }

    fn idx<Q>(&self, key: &Q) -> Option<usize>
    where
        Self::VocabType: Borrow<Q>,
        Q: Hash + ?Sized + Eq,
    {
        self.index.get(key).cloned()
    }

    fn discard(&self, idx: usize) -> f32 {
        self.discards[idx]
    }

    fn types(&self) -> &[CountedType<Self::VocabType>] {
        &self.types
    }

    fn n_tokens(&self) -> usize {
        self.n_tokens
    }
}

/// Constructs a `SimpleVocab<S>` from a `VocabBuilder<T>` where `T: Into<S>`.
impl<T, S> From<VocabBuilder<SimpleVocabConfig, T>> for SimpleVocab<S>
where
    T: Hash + Eq + Into<S>,
    S: Hash + Eq + Clone + Ord,
{
    fn from(builder: VocabBuilder<SimpleVocabConfig, T>) -> Self {
        let types = builder.config.cutoff.filter(builder.items);
        SimpleVocab::new(builder.config, types, builder.n_items)
    }
}
