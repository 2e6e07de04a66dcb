//! Safety-stock sizing and narrative advisories on top of combined
//! predictions.
//!
//! Everything here works on owned copies of the predictions and
//! reports its own errors; an advisory failure never invalidates the
//! underlying forecast.

use crate::core::{Prediction, RedistributionInput, RiskLevel, SeriesKey, Trend};
use crate::error::{ForecastError, Result};
use std::collections::BTreeMap;

/// Service-level to z-score lookup used for safety-stock sizing.
///
/// `utils::quantile_normal` approximates the same quantiles; the fixed
/// table keeps sizing reproducible against planning documents.
const Z_TABLE: [(f64, f64); 5] = [
    (0.90, 1.28),
    (0.95, 1.65),
    (0.975, 1.96),
    (0.99, 2.33),
    (0.995, 2.58),
];

/// Per-container daily storage cost in EUR, industry ballpark for dry
/// storage at a contracted depot.
pub const STORAGE_COST_PER_DAY: f64 = 2.5;

/// Inputs to the safety-stock formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyStockParams {
    pub lead_time_days: f64,
    /// Target service level in (0, 1); snapped to the nearest tabulated
    /// level.
    pub service_level: f64,
    pub demand_variance: f64,
    pub mean_demand: f64,
    pub lead_time_variance: f64,
}

/// Z-score for a service level, snapped to the nearest tabulated entry.
pub fn z_score(service_level: f64) -> f64 {
    let mut best = Z_TABLE[0];
    for entry in Z_TABLE {
        if (entry.0 - service_level).abs() < (best.0 - service_level).abs() {
            best = entry;
        }
    }
    best.1
}

/// Optimal safety stock:
/// `ceil(z · sqrt(leadTime·demandVar + meanDemand² · leadTimeVar))`.
pub fn optimal_safety_stock(params: &SafetyStockParams) -> Result<u32> {
    if params.lead_time_days <= 0.0 {
        return Err(ForecastError::InvalidParameter(
            "lead time must be positive".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&params.service_level) {
        return Err(ForecastError::InvalidParameter(format!(
            "service level must lie in (0, 1), got {}",
            params.service_level
        )));
    }
    if params.demand_variance < 0.0 || params.lead_time_variance < 0.0 || params.mean_demand < 0.0
    {
        return Err(ForecastError::InvalidParameter(
            "variances and mean demand must be non-negative".to_string(),
        ));
    }

    let z = z_score(params.service_level);
    let combined = params.lead_time_days * params.demand_variance
        + params.mean_demand.powi(2) * params.lead_time_variance;
    Ok((z * combined.sqrt()).ceil() as u32)
}

/// Severity of the situation described by a prediction batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

/// Thresholds and cost constants for insight generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisoryConfig {
    pub storage_cost_per_day: f64,
    /// High-risk share above which the batch warrants a warning.
    pub warning_risk_share: f64,
    /// High-risk share above which the batch is critical.
    pub critical_risk_share: f64,
    /// Increasing-trend share that escalates the alert.
    pub rising_trend_share: f64,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            storage_cost_per_day: STORAGE_COST_PER_DAY,
            warning_risk_share: 0.1,
            critical_risk_share: 0.3,
            rising_trend_share: 0.5,
        }
    }
}

/// Narrative summary of a prediction batch for operators.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastInsight {
    pub alert: AlertLevel,
    /// Share of predictions classified high risk.
    pub high_risk_share: f64,
    /// Share of predictions with an increasing trend.
    pub rising_share: f64,
    /// Average daily stock across the batch times the per-container
    /// daily storage cost.
    pub estimated_daily_storage_cost: f64,
    pub summary: String,
}

/// Summarize a prediction batch into an alert level and cost estimate.
pub fn summarize(predictions: &[Prediction], config: &AdvisoryConfig) -> Result<ForecastInsight> {
    if predictions.is_empty() {
        return Err(ForecastError::EmptyData);
    }

    let n = predictions.len() as f64;
    let high_risk = predictions.iter().filter(|p| p.risk == RiskLevel::High).count() as f64;
    let rising = predictions
        .iter()
        .filter(|p| p.trend == Trend::Increasing)
        .count() as f64;
    let high_risk_share = high_risk / n;
    let rising_share = rising / n;

    let mut days: Vec<_> = predictions.iter().map(|p| p.date).collect();
    days.sort_unstable();
    days.dedup();
    let total_container_days: f64 = predictions.iter().map(|p| p.predicted_count).sum();
    let avg_daily_stock = total_container_days / days.len() as f64;
    let estimated_daily_storage_cost = avg_daily_stock * config.storage_cost_per_day;

    let alert = if high_risk_share > config.critical_risk_share {
        AlertLevel::Critical
    } else if high_risk_share > config.warning_risk_share
        || rising_share > config.rising_trend_share
    {
        AlertLevel::Warning
    } else {
        AlertLevel::Info
    };

    let summary = format!(
        "{:.0}% of forecasts are high risk and {:.0}% are trending up; \
         projected average stock of {:.0} empties costs ~{:.0} per day in storage",
        high_risk_share * 100.0,
        rising_share * 100.0,
        avg_daily_stock,
        estimated_daily_storage_cost
    );

    Ok(ForecastInsight {
        alert,
        high_risk_share,
        rising_share,
        estimated_daily_storage_cost,
        summary,
    })
}

/// Group predictions into per-key payloads for the redistribution
/// optimizer, ordered by date within each key.
pub fn redistribution_inputs(predictions: &[Prediction]) -> Vec<RedistributionInput> {
    let mut grouped: BTreeMap<SeriesKey, Vec<&Prediction>> = BTreeMap::new();
    for p in predictions {
        grouped.entry(p.series_key()).or_default().push(p);
    }

    grouped
        .into_iter()
        .map(|(key, mut group)| {
            group.sort_by_key(|p| p.date);
            RedistributionInput {
                location: key.location,
                container_type: key.container_type,
                predicted_counts: group.iter().map(|p| p.predicted_count).collect(),
                confidence: group.iter().map(|p| p.confidence).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ComponentValues, ComponentWeights, ForecastMethod};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn prediction(
        location: &str,
        day: u32,
        count: f64,
        risk: RiskLevel,
        trend: Trend,
    ) -> Prediction {
        Prediction {
            date: NaiveDate::from_ymd_opt(2026, 7, day).unwrap(),
            predicted_count: count,
            confidence: 0.8,
            location: location.to_string(),
            container_type: "40HC".to_string(),
            trend,
            risk,
            method: ForecastMethod::Ensemble,
            components: ComponentValues::default(),
            weights: ComponentWeights {
                sequence: 0.5,
                tabular: 0.5,
            },
        }
    }

    #[test]
    fn safety_stock_matches_the_reference_case() {
        let params = SafetyStockParams {
            lead_time_days: 3.0,
            service_level: 0.95,
            demand_variance: 4.0,
            mean_demand: 10.0,
            lead_time_variance: 0.3,
        };
        // ceil(1.65 * sqrt(12 + 30)) = ceil(10.69)
        assert_eq!(optimal_safety_stock(&params).unwrap(), 11);
    }

    #[test]
    fn z_scores_snap_to_the_table() {
        assert_relative_eq!(z_score(0.95), 1.65);
        assert_relative_eq!(z_score(0.94), 1.65);
        assert_relative_eq!(z_score(0.99), 2.33);
        assert_relative_eq!(z_score(0.999), 2.58);
        assert_relative_eq!(z_score(0.5), 1.28);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let good = SafetyStockParams {
            lead_time_days: 3.0,
            service_level: 0.95,
            demand_variance: 4.0,
            mean_demand: 10.0,
            lead_time_variance: 0.3,
        };
        assert!(optimal_safety_stock(&SafetyStockParams {
            lead_time_days: 0.0,
            ..good
        })
        .is_err());
        assert!(optimal_safety_stock(&SafetyStockParams {
            service_level: 1.0,
            ..good
        })
        .is_err());
        assert!(optimal_safety_stock(&SafetyStockParams {
            demand_variance: -1.0,
            ..good
        })
        .is_err());
    }

    #[test]
    fn alert_escalates_with_risk_share() {
        let config = AdvisoryConfig::default();
        let calm: Vec<_> = (0..10)
            .map(|i| prediction("A", i + 1, 10.0, RiskLevel::Low, Trend::Stable))
            .collect();
        assert_eq!(summarize(&calm, &config).unwrap().alert, AlertLevel::Info);

        let mut warm = calm.clone();
        warm[0].risk = RiskLevel::High;
        warm[1].risk = RiskLevel::High;
        assert_eq!(summarize(&warm, &config).unwrap().alert, AlertLevel::Warning);

        let mut hot = warm.clone();
        for p in hot.iter_mut().take(4) {
            p.risk = RiskLevel::High;
        }
        assert_eq!(summarize(&hot, &config).unwrap().alert, AlertLevel::Critical);
    }

    #[test]
    fn rising_trends_alone_reach_warning() {
        let config = AdvisoryConfig::default();
        let rising: Vec<_> = (0..10)
            .map(|i| prediction("A", i + 1, 10.0, RiskLevel::Low, Trend::Increasing))
            .collect();
        assert_eq!(summarize(&rising, &config).unwrap().alert, AlertLevel::Warning);
    }

    #[test]
    fn storage_cost_uses_average_daily_stock() {
        let config = AdvisoryConfig::default();
        // Two keys on the same two days, 10 empties each.
        let predictions = vec![
            prediction("A", 1, 10.0, RiskLevel::Low, Trend::Stable),
            prediction("A", 2, 10.0, RiskLevel::Low, Trend::Stable),
            prediction("B", 1, 10.0, RiskLevel::Low, Trend::Stable),
            prediction("B", 2, 10.0, RiskLevel::Low, Trend::Stable),
        ];
        let insight = summarize(&predictions, &config).unwrap();
        // 40 container-days over 2 days = 20/day.
        assert_relative_eq!(
            insight.estimated_daily_storage_cost,
            20.0 * STORAGE_COST_PER_DAY,
            epsilon = 1e-12
        );
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert_eq!(
            summarize(&[], &AdvisoryConfig::default()).unwrap_err(),
            ForecastError::EmptyData
        );
    }

    #[test]
    fn optimizer_payloads_group_by_key_in_date_order() {
        let predictions = vec![
            prediction("B", 2, 12.0, RiskLevel::Low, Trend::Stable),
            prediction("A", 1, 10.0, RiskLevel::Low, Trend::Stable),
            prediction("B", 1, 11.0, RiskLevel::Low, Trend::Stable),
        ];
        let inputs = redistribution_inputs(&predictions);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].location, "A");
        assert_eq!(inputs[1].predicted_counts, vec![11.0, 12.0]);
        assert_eq!(inputs[1].confidence.len(), 2);
    }
}
