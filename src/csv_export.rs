use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Datelike;

use imbalance_calculator::{HourlyRecord, PlantComparison, PlantSummary};

use crate::excel_report::{COMPARISON_HEADERS, DETAIL_HEADERS};

/// Plain-CSV twin of the workbook for downstream tooling: one file per
/// detail sheet plus the comparison table.
pub struct CsvExport {
    output_dir: PathBuf,
}

impl CsvExport {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn write_all(
        &self,
        comparison: &PlantComparison,
        left_records: &[HourlyRecord],
        right_records: &[HourlyRecord],
    ) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create {}", self.output_dir.display()))?;

        self.write_detail("santral_1_detay.csv", left_records)?;
        self.write_detail("santral_2_detay.csv", right_records)?;
        self.write_comparison("karsilastirma.csv", comparison)?;
        log::info!("CSV tables written to {}", self.output_dir.display());
        Ok(())
    }

    fn write_detail(&self, file_name: &str, records: &[HourlyRecord]) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        writer.write_record(DETAIL_HEADERS)?;

        for record in records {
            let mut row = vec![
                record.date().format("%Y-%m-%d").to_string(),
                record.timestamp.month().to_string(),
                format!("{:02}:00", record.hour()),
            ];
            row.extend(
                [
                    record.day_ahead_price,
                    record.system_marginal_price,
                    record.positive_imbalance_price,
                    record.negative_imbalance_price,
                    record.forecast_generation,
                    record.realized_generation,
                    record.imbalance_volume,
                    record.day_ahead_revenue,
                    record.imbalance_amount,
                    record.net_revenue,
                    record.imbalance_cost,
                    record.unit_imbalance_cost,
                ]
                .iter()
                .map(|value| format_cell(*value)),
            );
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_comparison(&self, file_name: &str, comparison: &PlantComparison) -> Result<()> {
        let path = self.output_dir.join(file_name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        let mut header = vec!["Santral".to_string()];
        header.extend(COMPARISON_HEADERS.iter().map(|h| (*h).to_string()));
        writer.write_record(&header)?;

        for summary in [&comparison.left, &comparison.right] {
            for row in summary_rows(summary) {
                writer.write_record(&row)?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

fn summary_rows(summary: &PlantSummary) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for aggregate in &summary.months {
        let totals = &aggregate.totals;
        let kpis = &aggregate.kpis;
        rows.push(vec![
            summary.info.name.clone(),
            aggregate.month.format("%Y-%m").to_string(),
            totals.realized_generation_mwh.to_string(),
            totals.imbalance_volume_mwh.to_string(),
            totals.day_ahead_revenue.to_string(),
            totals.imbalance_amount.to_string(),
            totals.net_revenue.to_string(),
            format_cell(kpis.unit_revenue),
            totals.imbalance_cost.to_string(),
            format_cell(kpis.unit_imbalance_cost),
            format_cell(kpis.forecast_accuracy_pct),
            format_cell(kpis.cost_asymmetry),
            format_cell(kpis.capacity_factor_pct),
            kpis.top5_daily_cost.to_string(),
            format_cell(kpis.top5_cost_share_pct),
            format_cell(kpis.revenue_share_pct),
            format_cell(kpis.range_positive_share_pct),
            format_cell(kpis.range_negative_share_pct),
            kpis.production_hours.to_string(),
            format_cell(kpis.production_hour_share_pct),
            format_cell(kpis.production_share_pct),
        ]);
    }

    let totals = &summary.range_totals;
    let top5_sum: f64 = summary.months.iter().map(|m| m.kpis.top5_daily_cost).sum();
    let production_hours: u32 = summary.months.iter().map(|m| m.kpis.production_hours).sum();
    rows.push(vec![
        summary.info.name.clone(),
        "Toplam".to_string(),
        totals.realized_generation_mwh.to_string(),
        totals.imbalance_volume_mwh.to_string(),
        totals.day_ahead_revenue.to_string(),
        totals.imbalance_amount.to_string(),
        totals.net_revenue.to_string(),
        format_cell(totals.unit_revenue()),
        totals.imbalance_cost.to_string(),
        format_cell(totals.unit_imbalance_cost()),
        String::new(),
        String::new(),
        String::new(),
        top5_sum.to_string(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        production_hours.to_string(),
        String::new(),
        String::new(),
    ]);
    rows
}

/// Empty cell for a missing value; the distinction from 0 must survive
/// the export.
fn format_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
