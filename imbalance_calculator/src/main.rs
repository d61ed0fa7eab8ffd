use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;

use imbalance_calculator::{
    aggregate_monthly, MetricsBuilder, PlantInfo, PlantSeries, PlantType, SeriesLoader,
};

#[derive(Parser)]
#[command(name = "imbalance_calculator")]
#[command(about = "Compute hourly imbalance settlement metrics and monthly KPIs from local series files")]
struct Args {
    /// Plant name used in the output
    #[arg(long, default_value = "PLANT")]
    plant_name: String,

    /// Plant category
    #[arg(long, value_enum, default_value = "other")]
    plant_type: PlantKind,

    /// Installed capacity in MW (enables the capacity-factor KPI)
    #[arg(long)]
    capacity_mw: Option<f64>,

    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long)]
    start_date: String,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(long)]
    end_date: String,

    /// Day-ahead price series CSV (timestamp,value)
    #[arg(long)]
    day_ahead_price: PathBuf,

    /// System marginal price series CSV (timestamp,value)
    #[arg(long)]
    system_marginal_price: PathBuf,

    /// Forecast generation series CSV (timestamp,value)
    #[arg(long)]
    forecast: PathBuf,

    /// Realized generation series CSV (timestamp,value)
    #[arg(long)]
    realized: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum PlantKind {
    Hydro,
    Wind,
    Other,
}

impl From<PlantKind> for PlantType {
    fn from(kind: PlantKind) -> Self {
        match kind {
            PlantKind::Hydro => PlantType::Hydro,
            PlantKind::Wind => PlantType::Wind,
            PlantKind::Other => PlantType::Other,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start_date = NaiveDate::parse_from_str(&args.start_date, "%Y-%m-%d")?;
    let end_date = NaiveDate::parse_from_str(&args.end_date, "%Y-%m-%d")?;
    if end_date < start_date {
        anyhow::bail!("end date {} is before start date {}", end_date, start_date);
    }

    info!("loading series files");
    let series = PlantSeries {
        day_ahead_price: SeriesLoader::load_series_csv(&args.day_ahead_price)?,
        system_marginal_price: SeriesLoader::load_series_csv(&args.system_marginal_price)?,
        forecast_generation: SeriesLoader::load_series_csv(&args.forecast)?,
        realized_generation: SeriesLoader::load_series_csv(&args.realized)?,
    };

    let info = PlantInfo {
        name: args.plant_name.clone(),
        plant_type: args.plant_type.clone().into(),
        installed_capacity_mw: args.capacity_mw,
    };

    let records = MetricsBuilder::new(start_date, end_date).build(&series);
    info!("settled {} hours", records.len());
    let summary = aggregate_monthly(&records, &info);

    match args.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Csv => {
            println!(
                "Month,RealizedMWh,ImbalanceMWh,DayAheadRevenue,ImbalanceAmount,NetRevenue,ImbalanceCost,UnitRevenue,UnitImbalanceCost"
            );
            for month in &summary.months {
                println!(
                    "{},{:.3},{:.3},{:.2},{:.2},{:.2},{:.2},{},{}",
                    month.month.format("%Y-%m"),
                    month.totals.realized_generation_mwh,
                    month.totals.imbalance_volume_mwh,
                    month.totals.day_ahead_revenue,
                    month.totals.imbalance_amount,
                    month.totals.net_revenue,
                    month.totals.imbalance_cost,
                    format_opt(month.kpis.unit_revenue),
                    format_opt(month.kpis.unit_imbalance_cost),
                );
            }
        }
        OutputFormat::Summary => {
            let totals = &summary.range_totals;
            println!("Imbalance Settlement Summary");
            println!("============================");
            println!("Plant: {} ({})", summary.info.name, summary.info.plant_type);
            println!("Period: {} to {}", start_date, end_date);
            println!();
            println!("Realized generation: {:.1} MWh", totals.realized_generation_mwh);
            println!("Imbalance volume:    {:.1} MWh (|{:.1}| MWh)", totals.imbalance_volume_mwh, totals.abs_imbalance_volume_mwh);
            println!("Day-ahead revenue:   {:.2}", totals.day_ahead_revenue);
            println!("Imbalance amount:    {:.2}", totals.imbalance_amount);
            println!("Net revenue:         {:.2}", totals.net_revenue);
            println!("Imbalance cost:      {:.2}", totals.imbalance_cost);
            println!();
            println!("Months:");
            for month in &summary.months {
                println!(
                    "  {}: net {:.2}, cost {:.2}, unit revenue {}",
                    month.month.format("%Y-%m"),
                    month.totals.net_revenue,
                    month.totals.imbalance_cost,
                    format_opt(month.kpis.unit_revenue),
                );
            }
        }
    }

    Ok(())
}

fn format_opt(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => String::new(),
    }
}
