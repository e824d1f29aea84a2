//! Trailing fixed-count window over one partition
//!
//! Holds the last `WINDOW_LEN` observations. Null prices occupy a slot
//! (they count toward the window size) but are excluded from the mean and
//! standard deviation. Non-finite prices are stored as null.
//!
//! Statistics are recomputed from the buffered slots on every push with a
//! two-pass mean and sum of squared deviations. The window is bounded, so
//! no running state survives an eviction and an outlier stops influencing
//! the result as soon as it leaves.

use std::collections::VecDeque;

/// Number of observations in a full window: the current one plus six
/// predecessors.
pub const WINDOW_LEN: usize = 7;

/// Statistics for the window ending at the most recent observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Observations in the window, priced or not.
    pub observations: usize,
    /// Observations with a non-null price.
    pub priced: usize,
    /// Arithmetic mean of the priced observations.
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1) of the priced observations.
    pub stddev: Option<f64>,
}

/// Bounded trailing window over one partition's ordered prices.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    capacity: usize,
    slots: VecDeque<Option<f64>>,
}

impl Default for TrailingWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl TrailingWindow {
    /// A window of `WINDOW_LEN` observations.
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_LEN)
    }

    /// A window of `capacity` observations (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    /// Append the next observation, evicting the oldest once full, and
    /// return the statistics of the window ending at it.
    pub fn push(&mut self, price: Option<f64>) -> WindowStats {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(price.filter(|p| p.is_finite()));
        self.stats()
    }

    /// Statistics of the current window contents.
    pub fn stats(&self) -> WindowStats {
        let moments = Moments::of(self.slots.iter());
        WindowStats {
            observations: self.slots.len(),
            priced: moments.count,
            mean: moments.mean,
            stddev: moments.stddev,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

struct Moments {
    count: usize,
    mean: Option<f64>,
    stddev: Option<f64>,
}

impl Moments {
    fn of<'a, I>(prices: I) -> Self
    where
        I: Iterator<Item = &'a Option<f64>> + Clone,
    {
        let values = prices.flatten().copied();
        let count = values.clone().count();
        if count == 0 {
            return Self { count, mean: None, stddev: None };
        }

        let n = count as f64;
        let mean = values.clone().sum::<f64>() / n;
        let stddev = (count > 1).then(|| {
            let ss: f64 = values.map(|x| (x - mean) * (x - mean)).sum();
            (ss / (n - 1.0)).sqrt()
        });
        Self { count, mean: Some(mean), stddev }
    }
}

/// Mean and sample standard deviation over a slice, skipping nulls.
pub fn sample_stats(prices: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let moments = Moments::of(prices.iter());
    (moments.mean, moments.stddev)
}
