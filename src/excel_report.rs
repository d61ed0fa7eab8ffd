use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Datelike;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};

use imbalance_calculator::{HourlyRecord, PlantComparison, PlantSummary};

/// Detail sheet columns, in the report's fixed order. Headers stay in
/// Turkish because the workbook is the deliverable for a Turkish market
/// desk.
pub const DETAIL_HEADERS: [&str; 15] = [
    "Tarih",
    "Ay",
    "Saat",
    "PTF",
    "SMF",
    "Pozitif Dengesizlik Fiyatı",
    "Negatif Dengesizlik Fiyatı",
    "Gün Öncesi Üretim Tahmini (KGÜP)",
    "Gerçekleşen Üretim",
    "Dengesizlik Miktarı",
    "GÖP Geliri",
    "Dengesizlik Tutarı",
    "Toplam (Net) Gelir",
    "Dengesizlik Maliyeti",
    "Birim Dengesizlik Maliyeti",
];

pub const COMPARISON_HEADERS: [&str; 20] = [
    "Ay",
    "Gerçekleşen Üretim (MWh)",
    "Dengesizlik Miktarı (MWh)",
    "GÖP Geliri (TL)",
    "Dengesizlik Tutarı (TL)",
    "Toplam Gelir (TL)",
    "Birim Gelir (TL/MWh)",
    "Dengesizlik Maliyeti (TL)",
    "Birim Deng. Mal. (TL/MWh)",
    "Tahmin Doğruluğu (%)",
    "Maliyet Asimetrisi (Poz/Neg)",
    "Kapasite Faktörü (%)",
    "En Maliyetli 5 Gün (TL)",
    "Top 5 Gün DM Payı (%)",
    "Gelir Payı (%)",
    "Yıllık Pozitif Deng. Payı (%)",
    "Yıllık Negatif Deng. Payı (%)",
    "Üretim Saati (saat)",
    "Üretim Saat Payı (%)",
    "Üretim Payı (%)",
];

/// Renders the three-sheet workbook: one detail sheet per plant plus the
/// monthly comparison. Values are written as computed numbers; a missing
/// value stays a blank cell, never a zero.
pub struct ExcelReport {
    output_path: PathBuf,
}

struct SheetFormats {
    header: Format,
    number: Format,
    integer: Format,
    title: Format,
}

impl SheetFormats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_text_wrap()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter),
            number: Format::new().set_num_format("#,##0.00"),
            integer: Format::new().set_num_format("0"),
            title: Format::new().set_bold().set_font_size(14),
        }
    }
}

impl ExcelReport {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    pub fn write(
        &self,
        comparison: &PlantComparison,
        left_records: &[HourlyRecord],
        right_records: &[HourlyRecord],
    ) -> Result<()> {
        let formats = SheetFormats::new();
        let mut workbook = Workbook::new();

        write_detail_sheet(workbook.add_worksheet(), "Santral_1", left_records, &formats)?;
        write_detail_sheet(workbook.add_worksheet(), "Santral_2", right_records, &formats)?;
        write_comparison_sheet(workbook.add_worksheet(), comparison, &formats)?;

        workbook
            .save(&self.output_path)
            .with_context(|| format!("failed to save workbook {}", self.output_path.display()))?;
        log::info!("workbook written to {}", self.output_path.display());
        Ok(())
    }
}

fn write_detail_sheet(
    sheet: &mut Worksheet,
    name: &str,
    records: &[HourlyRecord],
    formats: &SheetFormats,
) -> Result<()> {
    sheet.set_name(name)?;
    for (col, header) in DETAIL_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        sheet.write_string(row, 0, record.date().format("%Y-%m-%d").to_string())?;
        sheet.write_number_with_format(row, 1, f64::from(record.timestamp.month()), &formats.integer)?;
        sheet.write_string(row, 2, format!("{:02}:00", record.hour()))?;

        let values = [
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
        ];
        for (offset, value) in values.iter().enumerate() {
            write_optional(sheet, row, offset as u16 + 3, *value, &formats.number)?;
        }
    }

    sheet.set_column_width(0, 19)?;
    sheet.set_column_width(1, 6)?;
    sheet.set_column_width(2, 7)?;
    for col in 3..DETAIL_HEADERS.len() as u16 {
        sheet.set_column_width(col, 16)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_comparison_sheet(
    sheet: &mut Worksheet,
    comparison: &PlantComparison,
    formats: &SheetFormats,
) -> Result<()> {
    sheet.set_name("Karşılaştırma")?;

    let after_left = write_plant_block(sheet, "Santral 1", &comparison.left, 0, formats)?;
    write_plant_block(sheet, "Santral 2", &comparison.right, after_left + 2, formats)?;

    sheet.set_column_width(0, 10)?;
    for col in 1..COMPARISON_HEADERS.len() as u16 {
        sheet.set_column_width(col, 18)?;
    }
    Ok(())
}

/// One plant's block: title row, header row, one row per month, and a
/// closing totals row. Returns the row index after the block.
fn write_plant_block(
    sheet: &mut Worksheet,
    title: &str,
    summary: &PlantSummary,
    start_row: u32,
    formats: &SheetFormats,
) -> Result<u32> {
    sheet.write_string_with_format(
        start_row,
        0,
        format!("{} - {}", title, summary.info.name),
        &formats.title,
    )?;

    let header_row = start_row + 2;
    for (col, header) in COMPARISON_HEADERS.iter().enumerate() {
        sheet.write_string_with_format(header_row, col as u16, *header, &formats.header)?;
    }

    let mut row = header_row + 1;
    for aggregate in &summary.months {
        let totals = &aggregate.totals;
        let kpis = &aggregate.kpis;

        sheet.write_string(row, 0, aggregate.month.format("%Y-%m").to_string())?;
        sheet.write_number_with_format(row, 1, totals.realized_generation_mwh, &formats.number)?;
        sheet.write_number_with_format(row, 2, totals.imbalance_volume_mwh, &formats.number)?;
        sheet.write_number_with_format(row, 3, totals.day_ahead_revenue, &formats.number)?;
        sheet.write_number_with_format(row, 4, totals.imbalance_amount, &formats.number)?;
        sheet.write_number_with_format(row, 5, totals.net_revenue, &formats.number)?;
        write_optional(sheet, row, 6, kpis.unit_revenue, &formats.number)?;
        sheet.write_number_with_format(row, 7, totals.imbalance_cost, &formats.number)?;
        write_optional(sheet, row, 8, kpis.unit_imbalance_cost, &formats.number)?;
        write_optional(sheet, row, 9, kpis.forecast_accuracy_pct, &formats.number)?;
        write_optional(sheet, row, 10, kpis.cost_asymmetry, &formats.number)?;
        write_optional(sheet, row, 11, kpis.capacity_factor_pct, &formats.number)?;
        sheet.write_number_with_format(row, 12, kpis.top5_daily_cost, &formats.number)?;
        write_optional(sheet, row, 13, kpis.top5_cost_share_pct, &formats.number)?;
        write_optional(sheet, row, 14, kpis.revenue_share_pct, &formats.number)?;
        write_optional(sheet, row, 15, kpis.range_positive_share_pct, &formats.number)?;
        write_optional(sheet, row, 16, kpis.range_negative_share_pct, &formats.number)?;
        sheet.write_number_with_format(row, 17, f64::from(kpis.production_hours), &formats.integer)?;
        write_optional(sheet, row, 18, kpis.production_hour_share_pct, &formats.number)?;
        write_optional(sheet, row, 19, kpis.production_share_pct, &formats.number)?;
        row += 1;
    }

    let totals = &summary.range_totals;
    let top5_sum: f64 = summary.months.iter().map(|m| m.kpis.top5_daily_cost).sum();
    let production_hours: u32 = summary.months.iter().map(|m| m.kpis.production_hours).sum();

    sheet.write_string_with_format(row, 0, "Toplam", &formats.header)?;
    sheet.write_number_with_format(row, 1, totals.realized_generation_mwh, &formats.number)?;
    sheet.write_number_with_format(row, 2, totals.imbalance_volume_mwh, &formats.number)?;
    sheet.write_number_with_format(row, 3, totals.day_ahead_revenue, &formats.number)?;
    sheet.write_number_with_format(row, 4, totals.imbalance_amount, &formats.number)?;
    sheet.write_number_with_format(row, 5, totals.net_revenue, &formats.number)?;
    write_optional(sheet, row, 6, totals.unit_revenue(), &formats.number)?;
    sheet.write_number_with_format(row, 7, totals.imbalance_cost, &formats.number)?;
    write_optional(sheet, row, 8, totals.unit_imbalance_cost(), &formats.number)?;
    sheet.write_number_with_format(row, 12, top5_sum, &formats.number)?;
    sheet.write_number_with_format(row, 17, f64::from(production_hours), &formats.integer)?;

    Ok(row + 1)
}

fn write_optional(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: Option<f64>,
    format: &Format,
) -> Result<(), XlsxError> {
    if let Some(value) = value {
        sheet.write_number_with_format(row, col, value, format)?;
    }
    Ok(())
}
