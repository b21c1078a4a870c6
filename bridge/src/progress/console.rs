use std::io::{self, Write};

use comms::Metrics;
use log::warn;

use super::ProgressSink;

const NSAMPLES: &str = "nsamples";
const BAR_WIDTH: usize = 20;

/// Renders training progress as text, one refreshed line per epoch:
///
/// ```text
/// Epoch 1/10
///  64/100 [============        ]  64.00% -- acc: 0.5312 -- loss: 0.9120
/// ```
///
/// Metrics are averaged over the epoch, weighted by the `nsamples` metric of
/// every batch.
pub struct ConsoleProgress<W: Write> {
    out: W,
    epochs: u32,
    samples: u64,
    epoch_samples: u64,
    weight: f64,
    sums: Metrics,
    failed: bool,
}

impl ConsoleProgress<io::Stdout> {
    /// Creates a new `ConsoleProgress` writing to stdout.
    ///
    /// # Arguments
    /// * `epochs` - The amount of epochs the call will run.
    /// * `samples` - The amount of samples per epoch.
    pub fn stdout(epochs: u32, samples: u64) -> Self {
        Self::new(io::stdout(), epochs, samples)
    }
}

impl<W: Write> ConsoleProgress<W> {
    pub fn new(out: W, epochs: u32, samples: u64) -> Self {
        Self {
            out,
            epochs,
            samples,
            epoch_samples: 0,
            weight: 0.0,
            sums: Metrics::new(),
            failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Runs `f` on the output, giving up on rendering after the first write
    /// error instead of failing the call.
    fn render(&mut self, f: impl FnOnce(&mut W) -> io::Result<()>) {
        if self.failed {
            return;
        }

        if let Err(e) = f(&mut self.out).and_then(|_| self.out.flush()) {
            warn!("progress output failed, not rendering anymore: {e}");
            self.failed = true;
        }
    }

    fn bar(&self) -> String {
        let filled = if self.samples == 0 {
            BAR_WIDTH
        } else {
            (self.epoch_samples.min(self.samples) as usize * BAR_WIDTH) / self.samples as usize
        };

        let mut bar = "=".repeat(filled);
        bar.push_str(&" ".repeat(BAR_WIDTH - filled));
        bar
    }
}

fn digits(n: u64) -> usize {
    n.max(1).ilog10() as usize + 1
}

impl<W: Write> ProgressSink for ConsoleProgress<W> {
    fn on_epoch_begin(&mut self, epoch: u32, _metrics: &Metrics) {
        self.epoch_samples = 0;
        self.weight = 0.0;
        self.sums.clear();

        let width = digits(self.epochs as u64);
        let epochs = self.epochs;
        self.render(|out| writeln!(out, "Epoch {:>width$}/{epochs}", epoch + 1));
    }

    fn on_batch_end(&mut self, _batch: u32, metrics: &Metrics) {
        let nsamples = metrics.get(NSAMPLES).copied().unwrap_or(1.0);

        self.weight += nsamples;
        self.epoch_samples += nsamples.max(0.0) as u64;
        for (name, value) in metrics.iter().filter(|(name, _)| *name != NSAMPLES) {
            *self.sums.entry(name.clone()).or_default() += nsamples * value;
        }

        let pct = if self.samples == 0 {
            100.0
        } else {
            self.epoch_samples as f64 / self.samples as f64 * 100.0
        };

        let mut line = format!(
            "\r{:>width$}/{} [{}] {pct:6.2}%",
            self.epoch_samples,
            self.samples,
            self.bar(),
            width = digits(self.samples),
        );

        if self.weight > 0.0 {
            for (name, sum) in &self.sums {
                line.push_str(&format!(" -- {name}: {:.4}", sum / self.weight));
            }
        }

        self.render(|out| out.write_all(line.as_bytes()));
    }

    fn on_epoch_end(&mut self, _epoch: u32, _metrics: &Metrics) {
        self.render(|out| writeln!(out));
    }
}
