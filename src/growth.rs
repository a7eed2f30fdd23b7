//! # Growth Windows
//! Change of the tracked metric over a fixed set of lookback windows.
//!
//! Every refresh is one event: the fresh value is written to the
//! [`SampleStore`] and then each window is evaluated against the store.
//! For a window of `d` seconds ending at `now`:
//!
//! - fewer than two samples at or after `now - d` → [`GrowthValue::NoData`];
//! - the store's history reaches back past `now - d` → [`GrowthValue::Measured`];
//! - otherwise the history is younger than the window and the oldest sample
//!   stands in for the window start → [`GrowthValue::Partial`].
//!
//! Growth is `latest - earliest` inside the window, so a shrinking network
//! reports a negative figure.

use std::fmt;

use serde::Serialize;

use crate::error::StorageError;
use crate::store::{Sample, SampleStore};
use crate::units::{round3, SECS_PER_DAY};

/// A named lookback duration, e.g. `"7d"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthWindow {
    pub name: String,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid growth window {0:?}: expected <number><m|h|d|w>, e.g. \"7d\"")]
pub struct WindowParseError(pub String);

impl GrowthWindow {
    pub fn new(name: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            name: name.into(),
            duration_secs,
        }
    }

    pub fn days(n: u64) -> Self {
        Self::new(format!("{n}d"), n.saturating_mul(SECS_PER_DAY))
    }

    /// Parse `"<n><unit>"` where unit is `m`, `h`, `d` or `w`.
    pub fn parse(input: &str) -> Result<Self, WindowParseError> {
        let s = input.trim();
        let err = || WindowParseError(input.to_string());
        let unit = s.chars().last().ok_or_else(err)?;
        let n: u64 = s[..s.len() - unit.len_utf8()].parse().map_err(|_| err())?;
        let mult = match unit.to_ascii_lowercase() {
            'm' => 60,
            'h' => 3_600,
            'd' => SECS_PER_DAY,
            'w' => 7 * SECS_PER_DAY,
            _ => return Err(err()),
        };
        if n == 0 {
            return Err(err());
        }
        let secs = n.checked_mul(mult).ok_or_else(err)?;
        Ok(Self::new(s, secs))
    }

    /// 1d, 3d, 7d, 30d, 90d, 365d.
    pub fn defaults() -> Vec<Self> {
        [1, 3, 7, 30, 90, 365].into_iter().map(Self::days).collect()
    }
}

/// Growth over one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthValue {
    /// History covers the whole window.
    Measured { value: f64 },
    /// History is shorter than the window; measured from the oldest sample.
    Partial { value: f64, covered_secs: f64 },
    NoData,
}

impl GrowthValue {
    pub fn value(&self) -> Option<f64> {
        match *self {
            GrowthValue::Measured { value } | GrowthValue::Partial { value, .. } => Some(value),
            GrowthValue::NoData => None,
        }
    }
}

impl fmt::Display for GrowthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthValue::Measured { value } => write!(f, "{value:.3}"),
            GrowthValue::Partial { value, .. } => write!(f, "~{value:.3}"),
            GrowthValue::NoData => f.write_str("n/a"),
        }
    }
}

/// Growth per window, in window order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GrowthReport {
    pub windows: Vec<(String, GrowthValue)>,
}

impl GrowthReport {
    pub fn no_data(windows: &[GrowthWindow]) -> Self {
        Self {
            windows: windows
                .iter()
                .map(|w| (w.name.clone(), GrowthValue::NoData))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<GrowthValue> {
        self.windows
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, GrowthValue)> {
        self.windows.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

#[derive(Debug, Clone)]
pub struct GrowthCalculator {
    windows: Vec<GrowthWindow>,
    unit_scale: f64,
}

impl GrowthCalculator {
    /// `unit_scale` multiplies every delta, e.g. `1000.0` to show PB growth
    /// as TB.
    pub fn new(windows: Vec<GrowthWindow>, unit_scale: f64) -> Self {
        Self {
            windows,
            unit_scale,
        }
    }

    pub fn windows(&self) -> &[GrowthWindow] {
        &self.windows
    }

    /// Record `value` at `now`, then evaluate every window.
    ///
    /// A failed write degrades the whole cycle to no data; the caller keeps
    /// running on whatever the store already holds next time.
    pub fn observe(&self, store: &SampleStore, value: f64, now: f64) -> GrowthReport {
        if let Err(e) = store.insert(now, value) {
            tracing::error!(target: "store", error = %e, "failed to record sample");
            metrics::counter!("store_errors_total").increment(1);
            return GrowthReport::no_data(&self.windows);
        }
        self.evaluate(store, now)
    }

    /// Evaluate every window against the current store without writing.
    pub fn evaluate(&self, store: &SampleStore, now: f64) -> GrowthReport {
        let oldest = match (store.len(), store.earliest()) {
            (Ok(n), Ok(oldest)) if n >= 2 => oldest,
            (Ok(_), Ok(_)) => return GrowthReport::no_data(&self.windows),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(target: "store", error = %e, "failed to read sample history");
                metrics::counter!("store_errors_total").increment(1);
                return GrowthReport::no_data(&self.windows);
            }
        };

        let windows = self
            .windows
            .iter()
            .map(|w| {
                let value = match self.window_growth(store, w, now, oldest) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(target: "store", window = %w.name, error = %e, "growth window failed");
                        GrowthValue::NoData
                    }
                };
                (w.name.clone(), value)
            })
            .collect();

        GrowthReport { windows }
    }

    fn window_growth(
        &self,
        store: &SampleStore,
        window: &GrowthWindow,
        now: f64,
        oldest: Option<Sample>,
    ) -> Result<GrowthValue, StorageError> {
        let cutoff = now - window.duration_secs as f64;
        let Some(bounds) = store.window_bounds(cutoff)? else {
            return Ok(GrowthValue::NoData);
        };
        if bounds.count < 2 {
            return Ok(GrowthValue::NoData);
        }

        let value = round3((bounds.latest.value - bounds.earliest.value) * self.unit_scale);
        let covers_window = oldest.is_some_and(|s| s.timestamp <= cutoff);
        Ok(if covers_window {
            GrowthValue::Measured { value }
        } else {
            GrowthValue::Partial {
                value,
                covered_secs: bounds.latest.timestamp - bounds.earliest.timestamp,
            }
        })
    }
}
