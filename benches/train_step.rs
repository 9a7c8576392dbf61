use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lmfrontier::{
    Activation, Cbow, CbowConfig, CommonConfig, Cutoff, ExtendedRnn, OutputLayerType, RnnConfig,
    SimpleRnn, SimpleVocab, SimpleVocabConfig, VocabBuilder,
};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

const VOCAB_SIZE: usize = 1000;
const SENTENCE_LEN: usize = 20;

const COMMON_CONFIG: CommonConfig = CommonConfig {
    dims: 100,
    epochs: 1,
    lr: 0.05,
};

fn vocab() -> SimpleVocab<String> {
    let mut builder: VocabBuilder<_, String> = VocabBuilder::new(SimpleVocabConfig {
        cutoff: Cutoff::MinCount(1),
        discard_threshold: 1e-4,
    });

    for word in 0..VOCAB_SIZE {
        for _ in 0..(VOCAB_SIZE / (word + 1)) {
            builder.count(word.to_string());
        }
    }

    builder.into()
}

fn random_sentence(rng: &mut XorShiftRng) -> Vec<usize> {
    (0..SENTENCE_LEN)
        .map(|_| rng.gen_range(0..VOCAB_SIZE))
        .collect()
}

fn cbow_config(output: OutputLayerType) -> CbowConfig {
    CbowConfig {
        context_size: 5,
        reduced_window: false,
        output,
        negative_samples: 5,
        zipf_exponent: 0.5,
    }
}

fn cbow_sentence(c: &mut Criterion, name: &str, output: OutputLayerType) {
    let mut rng = XorShiftRng::seed_from_u64(42);
    let sentence = random_sentence(&mut rng);
    let mut model = Cbow::new(vocab(), COMMON_CONFIG, cbow_config(output), rng).unwrap();

    c.bench_function(name, move |b| {
        b.iter(|| black_box(model.train_sentence(&sentence, 0.05)))
    });
}

fn cbow_hs(c: &mut Criterion) {
    cbow_sentence(c, "cbow_hs", OutputLayerType::HierarchicalSoftmax);
}

fn cbow_ns(c: &mut Criterion) {
    cbow_sentence(c, "cbow_ns", OutputLayerType::NegativeSampling);
}

fn cbow_softmax(c: &mut Criterion) {
    cbow_sentence(c, "cbow_softmax", OutputLayerType::Softmax);
}

fn rnn_config(class_size: Option<usize>) -> RnnConfig {
    RnnConfig {
        activation: Activation::Sigmoid,
        bptt_steps: 3,
        class_size,
    }
}

fn rnn_simple(c: &mut Criterion) {
    let mut rng = XorShiftRng::seed_from_u64(42);
    let sentence = random_sentence(&mut rng);
    let mut model = SimpleRnn::new(VOCAB_SIZE, COMMON_CONFIG, rnn_config(None), &mut rng).unwrap();

    c.bench_function("rnn_simple", move |b| {
        b.iter(|| black_box(model.train(&sentence, 0.05)))
    });
}

fn rnn_extended(c: &mut Criterion) {
    let mut rng = XorShiftRng::seed_from_u64(42);
    let sentence = random_sentence(&mut rng);
    let mut model =
        ExtendedRnn::new(VOCAB_SIZE, COMMON_CONFIG, rnn_config(Some(32)), &mut rng).unwrap();

    c.bench_function("rnn_extended", move |b| {
        b.iter(|| black_box(model.train(&sentence, 0.05)))
    });
}

criterion_group!(
    benches,
    cbow_hs,
    cbow_ns,
    cbow_softmax,
    rnn_simple,
    rnn_extended
);
criterion_main!(benches);
