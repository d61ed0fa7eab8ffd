use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;

use imbalance_calculator::{
    aggregate_monthly, ensure_comparable, MetricsBuilder, PlantComparison, PlantSeries,
};

mod csv_export;
mod epias_client;
mod excel_report;
mod plant_directory;

use csv_export::CsvExport;
use epias_client::EpiasClient;
use excel_report::ExcelReport;
use plant_directory::PlantDirectory;

#[derive(Parser)]
#[command(name = "epias_market_processor")]
#[command(about = "Fetch EPİAŞ market data for two plants and build a comparative imbalance report")]
struct Args {
    /// First plant name, as listed in the plant directory
    #[arg(long)]
    plant1: String,

    /// Second plant name (must be a different plant of the same type)
    #[arg(long)]
    plant2: String,

    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long)]
    start_date: String,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(long)]
    end_date: String,

    /// Path to the plant directory JSON
    #[arg(long, default_value = "pp_list.json")]
    plant_list: PathBuf,

    /// EPİAŞ Transparency Platform username (falls back to EPIAS_USERNAME)
    #[arg(long)]
    username: Option<String>,

    /// EPİAŞ Transparency Platform password (falls back to EPIAS_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Output workbook path (defaults to Analiz_<plant1>_vs_<plant2>_<start>_<end>.xlsx)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also export the tables as CSV files into this directory
    #[arg(long)]
    csv_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start_date = NaiveDate::parse_from_str(&args.start_date, "%Y-%m-%d")
        .context("start date must be YYYY-MM-DD")?;
    let end_date = NaiveDate::parse_from_str(&args.end_date, "%Y-%m-%d")
        .context("end date must be YYYY-MM-DD")?;
    if end_date < start_date {
        anyhow::bail!("end date {} is before start date {}", end_date, start_date);
    }

    // Everything that can reject the request is checked before the first
    // network call.
    let directory = PlantDirectory::from_json_file(&args.plant_list)?;
    if directory.is_empty() {
        anyhow::bail!("plant directory {} lists no plants", args.plant_list.display());
    }
    let left_plant = directory
        .lookup(&args.plant1)
        .with_context(|| {
            format!(
                "plant '{}' is not in the plant directory (available: {})",
                args.plant1,
                directory.plant_names().join(", ")
            )
        })?
        .clone();
    let right_plant = directory
        .lookup(&args.plant2)
        .with_context(|| format!("plant '{}' is not in the plant directory", args.plant2))?
        .clone();
    if left_plant.power_plant_name == right_plant.power_plant_name {
        anyhow::bail!("select two different plants of the same type");
    }
    let left_info = left_plant.plant_info();
    let right_info = right_plant.plant_info();
    ensure_comparable(&left_info, &right_info)?;

    let username = args
        .username
        .or_else(|| env::var("EPIAS_USERNAME").ok())
        .context("no username given; pass --username or set EPIAS_USERNAME")?;
    let password = args
        .password
        .or_else(|| env::var("EPIAS_PASSWORD").ok())
        .context("no password given; pass --password or set EPIAS_PASSWORD")?;

    info!("authenticating against the EPİAŞ Transparency Platform");
    let tgt = EpiasClient::obtain_tgt(&username, &password)?;
    let client = EpiasClient::new(tgt)?;

    let progress = ProgressBar::new(6);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("bad progress bar template")?,
    );

    // PTF and SMF are market-wide; fetched once and shared by both plants.
    progress.set_message("day-ahead prices");
    let day_ahead_price = client.fetch_day_ahead_prices(start_date, end_date)?;
    progress.inc(1);
    progress.set_message("system marginal prices");
    let system_marginal_price = client.fetch_system_marginal_prices(start_date, end_date)?;
    progress.inc(1);

    let mut plant_series = Vec::new();
    for plant in [&left_plant, &right_plant] {
        progress.set_message(format!("{} forecasts", plant.power_plant_name));
        let forecast_generation = client.fetch_forecast_generation(plant, start_date, end_date)?;
        progress.inc(1);
        progress.set_message(format!("{} realized generation", plant.power_plant_name));
        let realized_generation = client.fetch_realized_generation(plant, start_date, end_date)?;
        progress.inc(1);

        plant_series.push(PlantSeries {
            day_ahead_price: day_ahead_price.clone(),
            system_marginal_price: system_marginal_price.clone(),
            forecast_generation,
            realized_generation,
        });
    }
    progress.finish_with_message("fetch complete");

    let right_series = plant_series.pop().context("missing second plant series")?;
    let left_series = plant_series.pop().context("missing first plant series")?;

    // The two plants' pipelines are independent; build them side by side.
    let builder = MetricsBuilder::new(start_date, end_date);
    let (left_records, right_records) =
        rayon::join(|| builder.build(&left_series), || builder.build(&right_series));
    info!(
        "settled {} hours per plant over {} to {}",
        left_records.len(),
        start_date,
        end_date
    );

    let comparison = PlantComparison::build(
        aggregate_monthly(&left_records, &left_info),
        aggregate_monthly(&right_records, &right_info),
    )?;

    let output_path = args.output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "Analiz_{}_vs_{}_{}_{}.xlsx",
            slugify(&left_info.name),
            slugify(&right_info.name),
            start_date.format("%Y%m%d"),
            end_date.format("%Y%m%d"),
        ))
    });
    ExcelReport::new(output_path.clone()).write(&comparison, &left_records, &right_records)?;

    if let Some(csv_dir) = args.csv_dir {
        CsvExport::new(csv_dir).write_all(&comparison, &left_records, &right_records)?;
    }

    println!("Report written to {}", output_path.display());
    Ok(())
}

/// File-name-safe plant slug: spaces become underscores, everything but
/// alphanumerics, underscores and dashes is dropped.
fn slugify(name: &str) -> String {
    name.trim()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_keeps_file_names_safe() {
        assert_eq!(slugify("KARAKAYA HES"), "KARAKAYA_HES");
        assert_eq!(slugify("A/B (test) plant"), "AB_test_plant");
        assert_eq!(slugify("already-safe_1"), "already-safe_1");
    }
}
