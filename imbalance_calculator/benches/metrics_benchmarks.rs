use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imbalance_calculator::{
    aggregate_monthly, MetricsBuilder, PlantInfo, PlantSeries, PlantType,
};

/// One year of synthetic hourly data with a deterministic price/output
/// shape.
fn year_of_series(start: NaiveDate, end: NaiveDate) -> PlantSeries {
    let mut series = PlantSeries::default();
    let mut day = start;
    while day <= end {
        for hour in 0..24 {
            let ts = day.and_hms_opt(hour, 0, 0).unwrap();
            let ptf = 1500.0 + 700.0 * f64::from(hour % 12);
            series.day_ahead_price.insert(ts, ptf);
            series.system_marginal_price.insert(ts, ptf * 0.95);
            series.forecast_generation.insert(ts, 40.0);
            series
                .realized_generation
                .insert(ts, 40.0 + f64::from(hour % 5) - 2.0);
        }
        day += Duration::days(1);
    }
    series
}

fn benchmark_hourly_build(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let series = year_of_series(start, end);
    let builder = MetricsBuilder::new(start, end);

    c.bench_function("build_hourly_year", |b| {
        b.iter(|| {
            let records = black_box(builder.build(&series));
            assert_eq!(records.len(), 8784);
        });
    });
}

fn benchmark_monthly_aggregation(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let series = year_of_series(start, end);
    let records = MetricsBuilder::new(start, end).build(&series);
    let info = PlantInfo {
        name: "BENCH HES".to_string(),
        plant_type: PlantType::Hydro,
        installed_capacity_mw: Some(50.0),
    };

    c.bench_function("aggregate_monthly_year", |b| {
        b.iter(|| {
            let summary = black_box(aggregate_monthly(&records, &info));
            assert_eq!(summary.months.len(), 12);
        });
    });
}

criterion_group!(benches, benchmark_hourly_build, benchmark_monthly_aggregation);
criterion_main!(benches);
