use chrono::NaiveDate;
use imbalance_calculator::{
    aggregate_monthly, MetricsBuilder, PlantComparison, PlantInfo, PlantSeries, PlantType,
};

fn build_series(day: NaiveDate, forecast: f64, miss: f64) -> PlantSeries {
    let mut series = PlantSeries::default();
    for hour in 0..24 {
        let ts = day.and_hms_opt(hour, 0, 0).unwrap();
        // A plausible daily price shape: cheap nights, expensive evenings.
        let ptf = match hour {
            0..=5 | 22..=23 => 1200.0,
            18..=21 => 2800.0,
            _ => 1900.0,
        };
        series.day_ahead_price.insert(ts, ptf);
        series.system_marginal_price.insert(ts, ptf * 1.1);
        series.forecast_generation.insert(ts, forecast);
        // `miss` shifts realized output away from the forecast.
        series.realized_generation.insert(ts, forecast + miss);
    }
    series
}

fn main() {
    let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let builder = MetricsBuilder::new(day, day);

    let accurate = PlantInfo {
        name: "ACCURATE HES".to_string(),
        plant_type: PlantType::Hydro,
        installed_capacity_mw: Some(60.0),
    };
    let sloppy = PlantInfo {
        name: "SLOPPY HES".to_string(),
        plant_type: PlantType::Hydro,
        installed_capacity_mw: Some(60.0),
    };

    let accurate_records = builder.build(&build_series(day, 50.0, 1.0));
    let sloppy_records = builder.build(&build_series(day, 50.0, -8.0));

    let comparison = PlantComparison::build(
        aggregate_monthly(&accurate_records, &accurate),
        aggregate_monthly(&sloppy_records, &sloppy),
    )
    .expect("both plants are hydro");

    println!("Plant Comparison");
    println!("================");
    for summary in [&comparison.left, &comparison.right] {
        let totals = &summary.range_totals;
        println!();
        println!("{} ({})", summary.info.name, summary.info.plant_type);
        println!("  Net revenue:    {:.2} TL", totals.net_revenue);
        println!("  Imbalance cost: {:.2} TL", totals.imbalance_cost);
        for month in &summary.months {
            println!(
                "  {}: accuracy {}, unit cost {}",
                month.month.format("%Y-%m"),
                month
                    .kpis
                    .forecast_accuracy_pct
                    .map(|v| format!("{v:.1}%"))
                    .unwrap_or_else(|| "n/a".to_string()),
                month
                    .kpis
                    .unit_imbalance_cost
                    .map(|v| format!("{v:.2} TL/MWh"))
                    .unwrap_or_else(|| "n/a".to_string()),
            );
        }
    }
}
