use std::time::Duration;

/// Running statistics over kernel launch times.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KernelStats {
    count: usize,
    total: Duration,
    min: Option<Duration>,
    max: Option<Duration>,
    // Welford accumulators, in seconds
    mean: f64,
    m2: f64,
}

impl KernelStats {
    pub fn add(&mut self, sample: Duration) {
        self.count += 1;
        self.total += sample;
        self.min = Some(
            self.min
                .map_or(sample, |min| min.min(sample)),
        );
        self.max = Some(
            self.max
                .map_or(sample, |max| max.max(sample)),
        );

        let x = sample.as_secs_f64();
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    /// Mean launch time, `None` before the first launch.
    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(self.mean))
        }
    }

    /// Sample standard deviation, `None` with fewer than two launches.
    pub fn std_dev(&self) -> Option<Duration> {
        if self.count < 2 {
            None
        } else {
            Some(Duration::from_secs_f64(
                (self.m2 / (self.count - 1) as f64).sqrt(),
            ))
        }
    }
}
