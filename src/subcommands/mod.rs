mod cbow;
pub use self::cbow::CbowApp;

mod corpus;
pub use self::corpus::{build_vocab, held_out_sentences, training_sentences};

mod progress;
pub use self::progress::TrainProgress;

mod rnn;
pub use self::rnn::RnnApp;

mod traits;
pub use self::traits::LmfrontierApp;
