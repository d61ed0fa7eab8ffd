use std::collections::HashMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One raw upstream time series: hourly timestamps mapped to values.
/// Missing hours are simply absent keys, never zeros.
pub type HourlySeries = HashMap<NaiveDateTime, f64>;

/// The four raw series needed to settle one plant over a date range.
#[derive(Debug, Clone, Default)]
pub struct PlantSeries {
    pub day_ahead_price: HourlySeries,
    pub system_marginal_price: HourlySeries,
    pub forecast_generation: HourlySeries,
    pub realized_generation: HourlySeries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlantType {
    Hydro,
    Wind,
    Other,
}

impl PlantType {
    /// Derive the plant category from its listed name, as the EPİAŞ plant
    /// list encodes it (HES = hydro, RES = wind).
    pub fn from_plant_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        if upper.contains("HES") {
            PlantType::Hydro
        } else if upper.contains("RES") {
            PlantType::Wind
        } else {
            PlantType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlantType::Hydro => "HES",
            PlantType::Wind => "RES",
            PlantType::Other => "OTHER",
        }
    }
}

impl fmt::Display for PlantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantInfo {
    pub name: String,
    pub plant_type: PlantType,
    /// Installed capacity in MW, when the plant directory knows it.
    /// The capacity-factor KPI stays empty without it.
    pub installed_capacity_mw: Option<f64>,
}

/// One settled hour for one plant. `None` means the upstream value for
/// that hour was missing; it propagates through every derived field and
/// must never be read as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRecord {
    pub timestamp: NaiveDateTime,
    pub day_ahead_price: Option<f64>,
    pub system_marginal_price: Option<f64>,
    pub positive_imbalance_price: Option<f64>,
    pub negative_imbalance_price: Option<f64>,
    pub forecast_generation: Option<f64>,
    pub realized_generation: Option<f64>,
    pub imbalance_volume: Option<f64>,
    pub day_ahead_revenue: Option<f64>,
    pub imbalance_amount: Option<f64>,
    pub net_revenue: Option<f64>,
    pub imbalance_cost: Option<f64>,
    pub unit_imbalance_cost: Option<f64>,
}

impl HourlyRecord {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn hour(&self) -> u32 {
        use chrono::Timelike;
        self.timestamp.time().hour()
    }

    /// First day of the record's calendar month, used as the monthly
    /// grouping key so ranges spanning years keep months distinct.
    pub fn month_key(&self) -> NaiveDate {
        self.timestamp.date().with_day(1).unwrap()
    }
}

/// Sums over one plant-month (or the whole range). Missing hourly values
/// contribute nothing to the sums; `grid_hours` counts every grid hour
/// regardless of data coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub realized_generation_mwh: f64,
    /// Signed sum, displayed in the comparison table.
    pub imbalance_volume_mwh: f64,
    /// Absolute sum, the unit-imbalance-cost denominator.
    pub abs_imbalance_volume_mwh: f64,
    pub day_ahead_revenue: f64,
    pub imbalance_amount: f64,
    pub net_revenue: f64,
    pub imbalance_cost: f64,
    pub grid_hours: u32,
}

impl MonthlyTotals {
    pub fn accumulate(&mut self, record: &HourlyRecord) {
        if let Some(v) = record.realized_generation {
            self.realized_generation_mwh += v;
        }
        if let Some(v) = record.imbalance_volume {
            self.imbalance_volume_mwh += v;
            self.abs_imbalance_volume_mwh += v.abs();
        }
        if let Some(v) = record.day_ahead_revenue {
            self.day_ahead_revenue += v;
        }
        if let Some(v) = record.imbalance_amount {
            self.imbalance_amount += v;
        }
        if let Some(v) = record.net_revenue {
            self.net_revenue += v;
        }
        if let Some(v) = record.imbalance_cost {
            self.imbalance_cost += v;
        }
        self.grid_hours += 1;
    }

    /// Net revenue per realized MWh over these totals.
    pub fn unit_revenue(&self) -> Option<f64> {
        ratio(self.net_revenue, self.realized_generation_mwh)
    }

    /// Imbalance cost per absolute imbalance MWh over these totals.
    pub fn unit_imbalance_cost(&self) -> Option<f64> {
        ratio(self.imbalance_cost, self.abs_imbalance_volume_mwh)
    }
}

/// Guarded division: `None` instead of a division fault or an infinity.
pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// The derived monthly indicators. Every ratio is `None` when its
/// denominator is zero or its inputs were missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonthlyKpis {
    pub unit_revenue: Option<f64>,
    pub unit_imbalance_cost: Option<f64>,
    pub forecast_accuracy_pct: Option<f64>,
    pub cost_asymmetry: Option<f64>,
    pub capacity_factor_pct: Option<f64>,
    /// Sum of the month's five costliest days' imbalance cost.
    pub top5_daily_cost: f64,
    pub top5_cost_share_pct: Option<f64>,
    pub revenue_share_pct: Option<f64>,
    /// Whole-range directional shares, repeated on every month row.
    pub range_positive_share_pct: Option<f64>,
    pub range_negative_share_pct: Option<f64>,
    pub production_hours: u32,
    pub production_hour_share_pct: Option<f64>,
    pub production_share_pct: Option<f64>,
}

/// One plant-month: computed once from the finalized hourly table and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    /// First day of the calendar month.
    pub month: NaiveDate,
    pub totals: MonthlyTotals,
    pub kpis: MonthlyKpis,
}

impl MonthlyAggregate {
    /// Placeholder for a month the other plant has data for but this one
    /// does not: zero totals, empty indicators.
    pub fn empty(month: NaiveDate) -> Self {
        Self {
            month,
            totals: MonthlyTotals::default(),
            kpis: MonthlyKpis::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlantSummary {
    pub info: PlantInfo,
    /// Ascending by month.
    pub months: Vec<MonthlyAggregate>,
    pub range_totals: MonthlyTotals,
}

/// Two same-type plants' monthly tables with aligned month keys. Lives
/// only for the duration of one report generation.
#[derive(Debug, Clone, Serialize)]
pub struct PlantComparison {
    pub left: PlantSummary,
    pub right: PlantSummary,
}

#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("cannot compare {left_plant} ({left_type}) with {right_plant} ({right_type}): plant types must match")]
    PlantTypeMismatch {
        left_plant: String,
        left_type: PlantType,
        right_plant: String,
        right_type: PlantType,
    },
}
