use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::{
    ratio, ComparisonError, HourlyRecord, MonthlyAggregate, MonthlyKpis, MonthlyTotals,
    PlantComparison, PlantInfo, PlantSummary,
};

/// Fatal pre-flight check: comparisons only make sense between plants of
/// the same category. Runs before any data is fetched or computed.
pub fn ensure_comparable(left: &PlantInfo, right: &PlantInfo) -> Result<(), ComparisonError> {
    if left.plant_type != right.plant_type {
        return Err(ComparisonError::PlantTypeMismatch {
            left_plant: left.name.clone(),
            left_type: left.plant_type,
            right_plant: right.name.clone(),
            right_type: right.plant_type,
        });
    }
    Ok(())
}

/// Whole-range figures shared by every month row of one plant.
struct RangeContext {
    totals: MonthlyTotals,
    positive_share_pct: Option<f64>,
    negative_share_pct: Option<f64>,
}

/// Collapse a plant's finalized hourly table into one aggregate per
/// calendar month, ascending.
pub fn aggregate_monthly(records: &[HourlyRecord], info: &PlantInfo) -> PlantSummary {
    let mut range_totals = MonthlyTotals::default();
    let mut positive_volume = 0.0;
    let mut negative_volume = 0.0;
    for record in records {
        range_totals.accumulate(record);
        if let Some(volume) = record.imbalance_volume {
            if volume > 0.0 {
                positive_volume += volume;
            } else {
                negative_volume += -volume;
            }
        }
    }

    let range = RangeContext {
        positive_share_pct: ratio(positive_volume, range_totals.abs_imbalance_volume_mwh)
            .map(|share| share * 100.0),
        negative_share_pct: ratio(negative_volume, range_totals.abs_imbalance_volume_mwh)
            .map(|share| share * 100.0),
        totals: range_totals,
    };

    let mut by_month: BTreeMap<NaiveDate, Vec<&HourlyRecord>> = BTreeMap::new();
    for record in records {
        by_month.entry(record.month_key()).or_default().push(record);
    }

    let months = by_month
        .into_iter()
        .map(|(month, rows)| aggregate_month(month, &rows, info, &range))
        .collect();

    PlantSummary {
        info: info.clone(),
        months,
        range_totals,
    }
}

fn aggregate_month(
    month: NaiveDate,
    rows: &[&HourlyRecord],
    info: &PlantInfo,
    range: &RangeContext,
) -> MonthlyAggregate {
    let mut totals = MonthlyTotals::default();
    let mut abs_volume_sum = 0.0;
    let mut volume_hours = 0u32;
    let mut forecast_sum = 0.0;
    let mut forecast_hours = 0u32;
    // Cost split by which settlement price applied to the hour.
    let mut shortfall_cost = 0.0;
    let mut surplus_cost = 0.0;
    let mut daily_cost: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut production_hours = 0u32;

    for record in rows {
        totals.accumulate(record);
        if let Some(volume) = record.imbalance_volume {
            abs_volume_sum += volume.abs();
            volume_hours += 1;
            if let Some(cost) = record.imbalance_cost {
                if volume < 0.0 {
                    shortfall_cost += cost;
                } else {
                    surplus_cost += cost;
                }
            }
        }
        if let Some(forecast) = record.forecast_generation {
            forecast_sum += forecast;
            forecast_hours += 1;
        }
        if let Some(cost) = record.imbalance_cost {
            *daily_cost.entry(record.date()).or_insert(0.0) += cost;
        }
        if matches!(record.realized_generation, Some(generation) if generation > 0.0) {
            production_hours += 1;
        }
    }

    let forecast_accuracy_pct = if volume_hours == 0 || forecast_hours == 0 {
        None
    } else {
        let mean_abs_volume = abs_volume_sum / f64::from(volume_hours);
        let mean_forecast = forecast_sum / f64::from(forecast_hours);
        ratio(mean_abs_volume, mean_forecast)
            .map(|miss| ((1.0 - miss) * 100.0).clamp(0.0, 100.0))
    };

    let mut day_costs: Vec<f64> = daily_cost.into_values().collect();
    day_costs.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let top5_daily_cost: f64 = day_costs.iter().take(5).sum();

    let kpis = MonthlyKpis {
        unit_revenue: totals.unit_revenue(),
        unit_imbalance_cost: totals.unit_imbalance_cost(),
        forecast_accuracy_pct,
        cost_asymmetry: ratio(shortfall_cost, surplus_cost),
        capacity_factor_pct: info
            .installed_capacity_mw
            .filter(|capacity| *capacity > 0.0)
            .and_then(|capacity| {
                ratio(totals.realized_generation_mwh, capacity * f64::from(totals.grid_hours))
            })
            .map(|factor| factor * 100.0),
        top5_daily_cost,
        top5_cost_share_pct: ratio(top5_daily_cost, totals.imbalance_cost)
            .map(|share| share * 100.0),
        revenue_share_pct: ratio(totals.net_revenue, range.totals.net_revenue)
            .map(|share| share * 100.0),
        range_positive_share_pct: range.positive_share_pct,
        range_negative_share_pct: range.negative_share_pct,
        production_hours,
        production_hour_share_pct: ratio(f64::from(production_hours), f64::from(totals.grid_hours))
            .map(|share| share * 100.0),
        production_share_pct: ratio(
            totals.realized_generation_mwh,
            range.totals.realized_generation_mwh,
        )
        .map(|share| share * 100.0),
    };

    MonthlyAggregate { month, totals, kpis }
}

impl PlantComparison {
    /// Pair two plants' monthly tables on a shared month axis. Months one
    /// plant lacks appear as empty aggregates on that side only.
    pub fn build(left: PlantSummary, right: PlantSummary) -> Result<Self, ComparisonError> {
        ensure_comparable(&left.info, &right.info)?;

        let month_keys: BTreeSet<NaiveDate> = left
            .months
            .iter()
            .chain(right.months.iter())
            .map(|aggregate| aggregate.month)
            .collect();

        Ok(Self {
            left: align_months(left, &month_keys),
            right: align_months(right, &month_keys),
        })
    }
}

fn align_months(mut summary: PlantSummary, month_keys: &BTreeSet<NaiveDate>) -> PlantSummary {
    let mut existing: BTreeMap<NaiveDate, MonthlyAggregate> = summary
        .months
        .drain(..)
        .map(|aggregate| (aggregate.month, aggregate))
        .collect();
    summary.months = month_keys
        .iter()
        .map(|month| {
            existing
                .remove(month)
                .unwrap_or_else(|| MonthlyAggregate::empty(*month))
        })
        .collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MetricsBuilder;
    use crate::models::{HourlySeries, PlantSeries, PlantType};
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 1e-6
    }

    fn hydro_info(capacity: Option<f64>) -> PlantInfo {
        PlantInfo {
            name: "TEST HES".to_string(),
            plant_type: PlantType::Hydro,
            installed_capacity_mw: capacity,
        }
    }

    /// Flat series over [start, end]: same price/forecast/realized every
    /// hour, so monthly sums are easy to state by hand.
    fn flat_series(start: NaiveDate, end: NaiveDate, price: f64, forecast: f64, realized: f64) -> PlantSeries {
        let mut day_ahead_price = HourlySeries::new();
        let mut system_marginal_price = HourlySeries::new();
        let mut forecast_generation = HourlySeries::new();
        let mut realized_generation = HourlySeries::new();
        let mut day = start;
        while day <= end {
            for h in 0..24 {
                let ts = day.and_hms_opt(h, 0, 0).unwrap();
                day_ahead_price.insert(ts, price);
                system_marginal_price.insert(ts, price);
                forecast_generation.insert(ts, forecast);
                realized_generation.insert(ts, realized);
            }
            day += Duration::days(1);
        }
        PlantSeries {
            day_ahead_price,
            system_marginal_price,
            forecast_generation,
            realized_generation,
        }
    }

    #[test]
    fn mismatched_plant_types_are_rejected() {
        let hydro = hydro_info(None);
        let wind = PlantInfo {
            name: "TEST RES".to_string(),
            plant_type: PlantType::Wind,
            installed_capacity_mw: None,
        };
        let err = ensure_comparable(&hydro, &wind).unwrap_err();
        assert!(matches!(err, ComparisonError::PlantTypeMismatch { .. }));

        let left = aggregate_monthly(&[], &hydro);
        let right = aggregate_monthly(&[], &wind);
        assert!(PlantComparison::build(left, right).is_err());
    }

    #[test]
    fn three_hour_day_matches_hand_computed_totals() {
        let day = date(2024, 5, 10);
        let mut series = PlantSeries::default();
        for (h, ptf, smf, forecast, realized) in [
            (0, 100.0, 90.0, 10.0, 12.0),
            (1, 200.0, 210.0, 20.0, 15.0),
            (2, 300.0, 300.0, 30.0, 30.0),
        ] {
            let ts = day.and_hms_opt(h, 0, 0).unwrap();
            series.day_ahead_price.insert(ts, ptf);
            series.system_marginal_price.insert(ts, smf);
            series.forecast_generation.insert(ts, forecast);
            series.realized_generation.insert(ts, realized);
        }

        let records = MetricsBuilder::new(day, day).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(Some(20.0)));

        assert_eq!(summary.months.len(), 1);
        let month = &summary.months[0];
        assert_eq!(month.month, date(2024, 5, 1));

        // Hour 0: surplus 2 MWh at 90*0.97; hour 1: shortfall 5 MWh at
        // 210*1.03; hour 2: balanced.
        let amount = 2.0 * 90.0 * 0.97 - 5.0 * 210.0 * 1.03;
        assert!(close(month.totals.realized_generation_mwh, 57.0));
        assert!(close(month.totals.imbalance_volume_mwh, -3.0));
        assert!(close(month.totals.abs_imbalance_volume_mwh, 7.0));
        assert!(close(month.totals.day_ahead_revenue, 14_000.0));
        assert!(close(month.totals.imbalance_amount, amount));
        assert!(close(month.totals.net_revenue, 14_000.0 + amount));
        assert!(close(month.totals.imbalance_cost, 5.0 * 210.0 * 1.03));
        assert_eq!(month.totals.grid_hours, 24);

        let kpis = &month.kpis;
        assert!(close(kpis.unit_revenue.unwrap(), (14_000.0 + amount) / 57.0));
        assert!(close(kpis.unit_imbalance_cost.unwrap(), 5.0 * 210.0 * 1.03 / 7.0));
        // mean |volume| = 7/3 over mean forecast = 20.
        assert!(close(kpis.forecast_accuracy_pct.unwrap(), (1.0 - (7.0 / 3.0) / 20.0) * 100.0));
        // All cost sits on shortfall hours; no surplus cost to divide by.
        assert_eq!(kpis.cost_asymmetry, None);
        assert!(close(kpis.capacity_factor_pct.unwrap(), 57.0 / (20.0 * 24.0) * 100.0));
        assert!(close(kpis.top5_daily_cost, 5.0 * 210.0 * 1.03));
        assert!(close(kpis.top5_cost_share_pct.unwrap(), 100.0));
        assert!(close(kpis.revenue_share_pct.unwrap(), 100.0));
        assert!(close(kpis.range_positive_share_pct.unwrap(), 2.0 / 7.0 * 100.0));
        assert!(close(kpis.range_negative_share_pct.unwrap(), 5.0 / 7.0 * 100.0));
        assert_eq!(kpis.production_hours, 3);
        assert!(close(kpis.production_hour_share_pct.unwrap(), 3.0 / 24.0 * 100.0));
        assert!(close(kpis.production_share_pct.unwrap(), 100.0));
    }

    #[test]
    fn monthly_totals_equal_hourly_sums() {
        let start = date(2024, 1, 30);
        let end = date(2024, 2, 2);
        let series = flat_series(start, end, 500.0, 80.0, 95.0);
        let records = MetricsBuilder::new(start, end).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(None));

        assert_eq!(summary.months.len(), 2);
        for aggregate in &summary.months {
            let mut expected = MonthlyTotals::default();
            for record in records.iter().filter(|r| r.month_key() == aggregate.month) {
                expected.accumulate(record);
            }
            assert_eq!(aggregate.totals, expected);
        }

        let january = &summary.months[0];
        assert_eq!(january.month, date(2024, 1, 1));
        assert_eq!(january.totals.grid_hours, 48);
        assert!(close(january.totals.realized_generation_mwh, 95.0 * 48.0));
    }

    #[test]
    fn capacity_factor_reaches_one_hundred_at_full_output() {
        let day = date(2024, 6, 1);
        let series = flat_series(day, day, 500.0, 50.0, 50.0);
        let records = MetricsBuilder::new(day, day).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(Some(50.0)));

        let factor = summary.months[0].kpis.capacity_factor_pct.unwrap();
        assert!(close(factor, 100.0));
    }

    #[test]
    fn capacity_factor_needs_a_directory_capacity() {
        let day = date(2024, 6, 1);
        let series = flat_series(day, day, 500.0, 50.0, 50.0);
        let records = MetricsBuilder::new(day, day).build(&series);

        let summary = aggregate_monthly(&records, &hydro_info(None));
        assert_eq!(summary.months[0].kpis.capacity_factor_pct, None);

        let summary = aggregate_monthly(&records, &hydro_info(Some(0.0)));
        assert_eq!(summary.months[0].kpis.capacity_factor_pct, None);
    }

    #[test]
    fn accuracy_is_clamped_at_zero_for_wild_misses() {
        let day = date(2024, 6, 1);
        // Forecast 10, realized 100: |volume| is 9x the forecast.
        let series = flat_series(day, day, 500.0, 10.0, 100.0);
        let records = MetricsBuilder::new(day, day).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(None));

        assert_eq!(summary.months[0].kpis.forecast_accuracy_pct, Some(0.0));
    }

    #[test]
    fn top5_days_rank_within_the_month() {
        let start = date(2024, 7, 1);
        let end = date(2024, 7, 6);
        let mut series = flat_series(start, end, 500.0, 100.0, 100.0);
        // One shortfall hour per day, deepening day by day: daily costs
        // scale 1..=6, so the top five drop the first day.
        let mut day = start;
        let mut depth = 1.0;
        while day <= end {
            let ts = day.and_hms_opt(12, 0, 0).unwrap();
            series.realized_generation.insert(ts, 100.0 - depth);
            day += Duration::days(1);
            depth += 1.0;
        }

        let records = MetricsBuilder::new(start, end).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(None));
        let month = &summary.months[0];

        let unit_cost = 500.0 * 1.03;
        assert!(close(month.totals.imbalance_cost, 21.0 * unit_cost));
        assert!(close(month.kpis.top5_daily_cost, 20.0 * unit_cost));
        assert!(close(month.kpis.top5_cost_share_pct.unwrap(), 20.0 / 21.0 * 100.0));
    }

    #[test]
    fn comparison_aligns_disjoint_months() {
        let info = hydro_info(None);
        let jan = flat_series(date(2024, 1, 1), date(2024, 1, 3), 500.0, 10.0, 11.0);
        let feb = flat_series(date(2024, 2, 1), date(2024, 2, 3), 500.0, 10.0, 11.0);

        let left_records = MetricsBuilder::new(date(2024, 1, 1), date(2024, 1, 3)).build(&jan);
        let right_records = MetricsBuilder::new(date(2024, 2, 1), date(2024, 2, 3)).build(&feb);

        let comparison = PlantComparison::build(
            aggregate_monthly(&left_records, &info),
            aggregate_monthly(&right_records, &info),
        )
        .unwrap();

        let months: Vec<NaiveDate> = comparison.left.months.iter().map(|m| m.month).collect();
        assert_eq!(months, vec![date(2024, 1, 1), date(2024, 2, 1)]);
        assert_eq!(
            months,
            comparison.right.months.iter().map(|m| m.month).collect::<Vec<_>>()
        );

        // The side without data carries an empty aggregate, not a gap.
        let left_feb = &comparison.left.months[1];
        assert_eq!(left_feb.totals, MonthlyTotals::default());
        assert_eq!(left_feb.kpis.unit_revenue, None);
        assert!(comparison.right.months[1].totals.realized_generation_mwh > 0.0);
    }

    #[test]
    fn range_shares_repeat_on_every_month_row() {
        let start = date(2024, 1, 30);
        let end = date(2024, 2, 2);
        let series = flat_series(start, end, 500.0, 80.0, 95.0);
        let records = MetricsBuilder::new(start, end).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(None));

        let first = &summary.months[0].kpis;
        let second = &summary.months[1].kpis;
        assert_eq!(first.range_positive_share_pct, second.range_positive_share_pct);
        assert_eq!(first.range_negative_share_pct, second.range_negative_share_pct);
        assert!(close(first.range_positive_share_pct.unwrap(), 100.0));
        assert!(close(first.range_negative_share_pct.unwrap(), 0.0));
    }

    #[test]
    fn zero_generation_has_no_unit_revenue() {
        let day = date(2024, 6, 1);
        let series = flat_series(day, day, 500.0, 0.0, 0.0);
        let records = MetricsBuilder::new(day, day).build(&series);
        let summary = aggregate_monthly(&records, &hydro_info(None));

        let month = &summary.months[0];
        assert_eq!(month.kpis.unit_revenue, None);
        assert_eq!(month.kpis.unit_imbalance_cost, None);
        assert_eq!(month.kpis.production_hours, 0);
        assert_eq!(month.kpis.production_hour_share_pct, Some(0.0));
    }
}
