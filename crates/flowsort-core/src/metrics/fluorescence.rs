use serde::{Deserialize, Serialize};

use crate::calibration::RoutingThresholds;
use crate::error::Result;
use crate::frame::Illumination;
use crate::record::{Direction, RejectReason};
use crate::stats::{mean, median, percentile};

use super::{Classifier, Metric, SpecimenView};

/// Dead specimens light up evenly; live ones show a few bright structures.
/// A specimen is dead when `median / p(bright_percentile)` of its masked
/// fluorescence exceeds `max_median_ratio`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViabilityCheck {
    pub bright_percentile: f64,
    pub max_median_ratio: f64,
}

impl ViabilityCheck {
    fn is_dead(&self, values: &[f32]) -> bool {
        let (Some(bright), Some(mid)) = (percentile(values, self.bright_percentile), median(values))
        else {
            return false;
        };
        bright > 0.0 && mid / bright > self.max_median_ratio
    }
}

/// Shared health checks for the single-channel fluorescence classifiers.
fn fluorescence_rejects(
    view: &SpecimenView,
    channel: Illumination,
    metric: &Metric,
    viability: Option<&ViabilityCheck>,
    min_signal: Option<f64>,
) -> Option<RejectReason> {
    if let Some(check) = viability {
        if let Ok(values) = view.masked_values(channel) {
            if check.is_dead(&values) {
                return Some(RejectReason::DeadWorm);
            }
        }
    }
    match (min_signal, metric.primary()) {
        (Some(min), Some(value)) if value < min => Some(RejectReason::DimWorm),
        _ => None,
    }
}

/// Nth percentile of the masked, background-subtracted channel.
pub struct PercentileClassifier {
    pub channel: Illumination,
    pub percentile: f64,
    pub min_signal: Option<f64>,
    pub viability: Option<ViabilityCheck>,
}

impl Classifier for PercentileClassifier {
    fn name(&self) -> &'static str {
        "percentile"
    }

    fn channels(&self) -> Vec<Illumination> {
        vec![self.channel]
    }

    fn extract_metric(&self, view: &SpecimenView) -> Result<Metric> {
        let values = view.masked_values(self.channel)?;
        Ok(Metric {
            values: percentile(&values, self.percentile).into_iter().collect(),
        })
    }

    fn reject_checks(&self, view: &SpecimenView, metric: &Metric) -> Option<RejectReason> {
        fluorescence_rejects(
            view,
            self.channel,
            metric,
            self.viability.as_ref(),
            self.min_signal,
        )
    }

    fn record_fields(&self) -> Vec<String> {
        vec!["fluorescence".into()]
    }
}

/// Mean of the masked pixels above a high percentile of the masked
/// distribution. Less sensitive to a single hot pixel than a plain percentile.
pub struct TopMeanClassifier {
    pub channel: Illumination,
    pub percentile: f64,
    pub min_signal: Option<f64>,
    pub viability: Option<ViabilityCheck>,
}

/// Mean of `values` strictly above their `pct` percentile. Falls back to the
/// values at the percentile when none lie strictly above it (flat input).
pub fn mean_over_percentile(values: &[f32], pct: f64) -> Option<f64> {
    let cut = percentile(values, pct)?;
    let above: Vec<f32> = values.iter().copied().filter(|&v| v as f64 > cut).collect();
    if above.is_empty() {
        let at: Vec<f32> = values.iter().copied().filter(|&v| v as f64 >= cut).collect();
        return mean(&at);
    }
    mean(&above)
}

impl Classifier for TopMeanClassifier {
    fn name(&self) -> &'static str {
        "top_mean"
    }

    fn channels(&self) -> Vec<Illumination> {
        vec![self.channel]
    }

    fn extract_metric(&self, view: &SpecimenView) -> Result<Metric> {
        let values = view.masked_values(self.channel)?;
        Ok(Metric {
            values: mean_over_percentile(&values, self.percentile).into_iter().collect(),
        })
    }

    fn reject_checks(&self, view: &SpecimenView, metric: &Metric) -> Option<RejectReason> {
        fluorescence_rejects(
            view,
            self.channel,
            metric,
            self.viability.as_ref(),
            self.min_signal,
        )
    }

    fn record_fields(&self) -> Vec<String> {
        vec!["top_mean_fluorescence".into()]
    }
}

/// Two reporters against fixed thresholds: green-only goes up, red-only goes
/// down, anything else straight.
pub struct RedGreenClassifier {
    pub green_channel: Illumination,
    pub red_channel: Illumination,
    pub percentile: f64,
    pub green_threshold: f64,
    pub red_threshold: f64,
}

impl Classifier for RedGreenClassifier {
    fn name(&self) -> &'static str {
        "red_green"
    }

    fn channels(&self) -> Vec<Illumination> {
        vec![self.green_channel, self.red_channel]
    }

    fn uses_thresholds(&self) -> bool {
        false
    }

    fn extract_metric(&self, view: &SpecimenView) -> Result<Metric> {
        let green = view.masked_values(self.green_channel)?;
        let red = view.masked_values(self.red_channel)?;
        match (
            percentile(&green, self.percentile),
            percentile(&red, self.percentile),
        ) {
            (Some(green), Some(red)) => Ok(Metric {
                values: vec![green, red],
            }),
            _ => Ok(Metric::default()),
        }
    }

    fn decide_direction(
        &self,
        metric: &Metric,
        _thresholds: Option<&RoutingThresholds>,
        _sequence: u64,
    ) -> Direction {
        let [green, red] = match metric.values.as_slice() {
            [g, r, ..] => [*g, *r],
            _ => return Direction::Straight,
        };
        if green > self.green_threshold && red < self.red_threshold {
            Direction::Up
        } else if green < self.green_threshold && red > self.red_threshold {
            Direction::Down
        } else {
            Direction::Straight
        }
    }

    fn record_fields(&self) -> Vec<String> {
        vec!["gfp".into(), "mcherry".into()]
    }
}
