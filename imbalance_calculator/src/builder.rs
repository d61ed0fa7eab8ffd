use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::models::{HourlyRecord, PlantSeries};

/// Multiplier on min(PTF, SMF): the price at which surplus energy is
/// settled (imbalance volume >= 0).
pub const NEGATIVE_PRICE_MULTIPLIER: f64 = 0.97;
/// Multiplier on max(PTF, SMF): the price charged for shortfalls
/// (imbalance volume < 0).
pub const POSITIVE_PRICE_MULTIPLIER: f64 = 1.03;

/// Builds the per-plant hourly metrics table for one inclusive date range.
///
/// The builder owns no data: it is handed the four already-fetched series
/// and produces one `HourlyRecord` per grid hour, sorted ascending. Hours
/// missing from a series yield `None` fields, never a missing row.
pub struct MetricsBuilder {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl MetricsBuilder {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { start_date, end_date }
    }

    /// Every hour of [start_date 00:00, end_date 23:00]. Empty when the
    /// range is inverted; callers validate dates up front.
    pub fn hour_grid(&self) -> Vec<NaiveDateTime> {
        let mut grid = Vec::new();
        let mut day = self.start_date;
        while day <= self.end_date {
            let midnight = day.and_hms_opt(0, 0, 0).unwrap();
            for hour in 0..24 {
                grid.push(midnight + Duration::hours(hour));
            }
            day += Duration::days(1);
        }
        grid
    }

    pub fn build(&self, series: &PlantSeries) -> Vec<HourlyRecord> {
        self.hour_grid()
            .into_iter()
            .map(|timestamp| settle_hour(timestamp, series))
            .collect()
    }
}

fn settle_hour(timestamp: NaiveDateTime, series: &PlantSeries) -> HourlyRecord {
    let day_ahead_price = series.day_ahead_price.get(&timestamp).copied();
    let system_marginal_price = series.system_marginal_price.get(&timestamp).copied();
    let forecast_generation = series.forecast_generation.get(&timestamp).copied();
    let realized_generation = series.realized_generation.get(&timestamp).copied();

    let (negative_imbalance_price, positive_imbalance_price) =
        match (day_ahead_price, system_marginal_price) {
            (Some(ptf), Some(smf)) => (
                Some(ptf.min(smf) * NEGATIVE_PRICE_MULTIPLIER),
                Some(ptf.max(smf) * POSITIVE_PRICE_MULTIPLIER),
            ),
            _ => (None, None),
        };

    let imbalance_volume = match (realized_generation, forecast_generation) {
        (Some(realized), Some(forecast)) => Some(realized - forecast),
        _ => None,
    };

    let day_ahead_revenue = match (forecast_generation, day_ahead_price) {
        (Some(forecast), Some(ptf)) => Some(forecast * ptf),
        _ => None,
    };

    // Sign-crossed settlement: surplus is paid out at the negative
    // imbalance price, shortfall is charged at the positive one.
    let imbalance_amount = match imbalance_volume {
        Some(volume) if volume >= 0.0 => negative_imbalance_price.map(|price| volume * price),
        Some(volume) => positive_imbalance_price.map(|price| volume * price),
        None => None,
    };

    let net_revenue = match (day_ahead_revenue, imbalance_amount) {
        (Some(revenue), Some(amount)) => Some(revenue + amount),
        _ => None,
    };

    // Only the cost-producing direction counts; favorable imbalances add
    // to net revenue but not to cost.
    let imbalance_cost = imbalance_amount.map(|amount| (-amount).max(0.0));

    let unit_imbalance_cost = match (imbalance_cost, imbalance_volume) {
        (Some(cost), Some(volume)) if volume != 0.0 => Some(cost / volume.abs()),
        _ => None,
    };

    HourlyRecord {
        timestamp,
        day_ahead_price,
        system_marginal_price,
        positive_imbalance_price,
        negative_imbalance_price,
        forecast_generation,
        realized_generation,
        imbalance_volume,
        day_ahead_revenue,
        imbalance_amount,
        net_revenue,
        imbalance_cost,
        unit_imbalance_cost,
    }
}
