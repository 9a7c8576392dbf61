use indicatif::{ProgressBar, ProgressStyle};
use lmfrontier::CommonConfig;

/// Progress of a training run.
///
/// Progress is measured in processed tokens over all epochs. The bar also
/// shows the average loss and the current learning rate.
pub struct TrainProgress {
    bar: ProgressBar,
    n_tokens: usize,
    start_lr: f32,
}

impl TrainProgress {
    /// Construct the progress bar for a corpus of `n_tokens` tokens.
    pub fn new(config: &CommonConfig, n_tokens: usize) -> Self {
        let total = config.epochs as usize * n_tokens;
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar().template("{bar:30} {percent}% {msg} ETA: {eta_precise}"),
        );

        TrainProgress {
            bar,
            n_tokens: total,
            start_lr: config.lr,
        }
    }

    /// Learning rate after processing `n_tokens_processed` tokens.
    ///
    /// The learning rate decays linearly to zero.
    pub fn lr(&self, n_tokens_processed: usize) -> f32 {
        let done = n_tokens_processed as f32 / self.n_tokens.max(1) as f32;
        (1.0 - done).max(0.0) * self.start_lr
    }

    pub fn update(&self, n_tokens_processed: usize, loss: f32) {
        self.bar.set_position(n_tokens_processed as u64);
        self.bar.set_message(&format!(
            "loss: {:.*} lr: {:.*}",
            5,
            loss,
            5,
            self.lr(n_tokens_processed)
        ));
    }

    /// Print a line above the progress bar.
    pub fn println(&self, msg: impl AsRef<str>) {
        self.bar.println(msg.as_ref());
    }

    pub fn finish(&self) {
        self.bar.finish();
    }
}
