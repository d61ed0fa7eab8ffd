use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use imbalance_calculator::HourlySeries;

use crate::plant_directory::PlantRecord;

const TGT_URL: &str = "https://giris.epias.com.tr/cas/v1/tickets";
const DAY_AHEAD_PRICE_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/markets/dam/data/mcp";
const SYSTEM_MARGINAL_PRICE_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/markets/bpm/data/system-marginal-price";
const FORECAST_GENERATION_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/generation/data/dpp-first-version";
const REALIZED_GENERATION_URL: &str =
    "https://seffaflik.epias.com.tr/electricity-service/v1/generation/data/realtime-generation";

/// Pause between consecutive month-chunk requests so a year-long range
/// does not hammer the platform.
const REQUEST_DELAY: Duration = Duration::from_millis(150);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the EPİAŞ Transparency Platform time-series endpoints.
///
/// Authentication is a two-step CAS handshake: `obtain_tgt` exchanges
/// credentials for a ticket-granting ticket (valid for about two hours),
/// which every data request then carries in a `TGT` header. The token is
/// plain state handed in at construction; nothing is cached globally.
pub struct EpiasClient {
    http: Client,
    tgt: String,
    day_re: Regex,
    clock_re: Regex,
    embedded_clock_re: Regex,
}

#[derive(Serialize)]
struct RangeBody<'a> {
    #[serde(rename = "startDate")]
    start_date: &'a str,
    #[serde(rename = "endDate")]
    end_date: &'a str,
}

#[derive(Serialize)]
struct ForecastBody<'a> {
    #[serde(rename = "startDate")]
    start_date: &'a str,
    #[serde(rename = "endDate")]
    end_date: &'a str,
    #[serde(rename = "organizationId")]
    organization_id: i64,
    #[serde(rename = "uevcbId")]
    uevcb_id: i64,
    region: &'a str,
}

#[derive(Serialize)]
struct RealizedBody<'a> {
    #[serde(rename = "startDate")]
    start_date: &'a str,
    #[serde(rename = "endDate")]
    end_date: &'a str,
    #[serde(rename = "powerPlantId")]
    power_plant_id: i64,
}

#[derive(Deserialize)]
struct ItemsResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct DayAheadPriceItem {
    date: Option<String>,
    hour: Option<String>,
    price: Option<f64>,
}

#[derive(Deserialize)]
struct SystemMarginalPriceItem {
    date: Option<String>,
    hour: Option<String>,
    #[serde(rename = "systemMarginalPrice")]
    system_marginal_price: Option<f64>,
}

#[derive(Deserialize)]
struct ForecastItem {
    date: Option<String>,
    time: Option<String>,
    #[serde(rename = "toplam")]
    total: Option<f64>,
}

#[derive(Deserialize)]
struct RealizedItem {
    date: Option<String>,
    time: Option<String>,
    total: Option<f64>,
}

impl EpiasClient {
    /// Exchange credentials for a TGT token.
    pub fn obtain_tgt(username: &str, password: &str) -> Result<String> {
        let response = Client::new()
            .post(TGT_URL)
            .header("Accept", "text/plain")
            .form(&[("username", username), ("password", password)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .context("failed to reach the EPİAŞ login service")?;
        if !response.status().is_success() {
            bail!("EPİAŞ login failed: HTTP {}", response.status());
        }
        Ok(response
            .text()
            .context("failed to read the TGT response")?
            .trim()
            .to_string())
    }

    pub fn new(tgt: String) -> Result<Self> {
        Ok(Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("failed to build the HTTP client")?,
            tgt,
            day_re: Regex::new(r"^(\d{4}-\d{2}-\d{2})")?,
            clock_re: Regex::new(r"^(\d{2}:\d{2})")?,
            embedded_clock_re: Regex::new(r"T(\d{2}:\d{2})")?,
        })
    }

    pub fn fetch_day_ahead_prices(&self, start: NaiveDate, end: NaiveDate) -> Result<HourlySeries> {
        let mut series = HourlySeries::new();
        for (chunk_start, chunk_end) in month_ranges(start, end) {
            let body = RangeBody {
                start_date: &chunk_start,
                end_date: &chunk_end,
            };
            let response: ItemsResponse<DayAheadPriceItem> =
                self.post_json(DAY_AHEAD_PRICE_URL, &body)?;
            for item in response.items {
                self.insert_item(&mut series, item.date.as_deref(), item.hour.as_deref(), item.price);
            }
            thread::sleep(REQUEST_DELAY);
        }
        log::debug!("fetched {} day-ahead price hours", series.len());
        Ok(series)
    }

    pub fn fetch_system_marginal_prices(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HourlySeries> {
        let mut series = HourlySeries::new();
        for (chunk_start, chunk_end) in month_ranges(start, end) {
            let body = RangeBody {
                start_date: &chunk_start,
                end_date: &chunk_end,
            };
            let response: ItemsResponse<SystemMarginalPriceItem> =
                self.post_json(SYSTEM_MARGINAL_PRICE_URL, &body)?;
            for item in response.items {
                self.insert_item(
                    &mut series,
                    item.date.as_deref(),
                    item.hour.as_deref(),
                    item.system_marginal_price,
                );
            }
            thread::sleep(REQUEST_DELAY);
        }
        log::debug!("fetched {} system marginal price hours", series.len());
        Ok(series)
    }

    /// First-version day-ahead production plan (KGÜP) for one plant.
    pub fn fetch_forecast_generation(
        &self,
        plant: &PlantRecord,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HourlySeries> {
        let mut series = HourlySeries::new();
        for (chunk_start, chunk_end) in month_ranges(start, end) {
            let body = ForecastBody {
                start_date: &chunk_start,
                end_date: &chunk_end,
                organization_id: plant.organization_id,
                uevcb_id: plant.uevcb_id,
                region: "TR1",
            };
            let response: ItemsResponse<ForecastItem> =
                self.post_json(FORECAST_GENERATION_URL, &body)?;
            for item in response.items {
                self.insert_item(&mut series, item.date.as_deref(), item.time.as_deref(), item.total);
            }
            thread::sleep(REQUEST_DELAY);
        }
        log::debug!(
            "fetched {} forecast hours for {}",
            series.len(),
            plant.power_plant_name
        );
        Ok(series)
    }

    pub fn fetch_realized_generation(
        &self,
        plant: &PlantRecord,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HourlySeries> {
        let mut series = HourlySeries::new();
        for (chunk_start, chunk_end) in month_ranges(start, end) {
            let body = RealizedBody {
                start_date: &chunk_start,
                end_date: &chunk_end,
                power_plant_id: plant.power_plant_id,
            };
            let response: ItemsResponse<RealizedItem> =
                self.post_json(REALIZED_GENERATION_URL, &body)?;
            for item in response.items {
                self.insert_item(&mut series, item.date.as_deref(), item.time.as_deref(), item.total);
            }
            thread::sleep(REQUEST_DELAY);
        }
        log::debug!(
            "fetched {} realized generation hours for {}",
            series.len(),
            plant.power_plant_name
        );
        Ok(series)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: &str, body: &B) -> Result<T> {
        let response = self
            .http
            .post(url)
            .header("TGT", &self.tgt)
            .header("Accept-Language", "en")
            .header("Accept", "application/json")
            .json(body)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        if !response.status().is_success() {
            bail!("EPİAŞ request to {url} failed: HTTP {}", response.status());
        }
        response
            .json()
            .with_context(|| format!("unexpected response body from {url}"))
    }

    fn insert_item(
        &self,
        series: &mut HourlySeries,
        date: Option<&str>,
        clock: Option<&str>,
        value: Option<f64>,
    ) {
        let Some(value) = value else {
            return;
        };
        match self.item_timestamp(date, clock) {
            Some(timestamp) => {
                series.insert(timestamp, value);
            }
            None => {
                log::warn!("skipping item with unparseable timestamp: {date:?} {clock:?}");
            }
        }
    }

    /// Normalize the platform's mixed timestamp layouts: `date` may be a
    /// bare day or a full ISO timestamp, the clock field may carry
    /// seconds or an offset, and either may be missing.
    fn item_timestamp(&self, date: Option<&str>, clock: Option<&str>) -> Option<NaiveDateTime> {
        let date = date?;
        let day = self.day_re.captures(date)?.get(1)?.as_str();
        let clock = clock
            .and_then(|raw| self.clock_re.captures(raw))
            .or_else(|| self.embedded_clock_re.captures(date))
            .and_then(|captures| captures.get(1))
            .map_or("00:00", |m| m.as_str());
        NaiveDateTime::parse_from_str(&format!("{day} {clock}"), "%Y-%m-%d %H:%M").ok()
    }
}

/// Split an inclusive date range into month-sized sub-ranges, formatted
/// the way the Transparency endpoints expect (`+03:00`, Turkish local
/// time). Requests above roughly a month get rejected upstream, so every
/// fetch walks these chunks.
pub(crate) fn month_ranges(start: NaiveDate, end: NaiveDate) -> Vec<(String, String)> {
    let mut ranges = Vec::new();
    let mut cursor = start.with_day(1).unwrap();
    while cursor <= end {
        let next_month = if cursor.month() == 12 {
            NaiveDate::from_ymd_opt(cursor.year() + 1, 1, 1).unwrap()
        } else {
            NaiveDate::from_ymd_opt(cursor.year(), cursor.month() + 1, 1).unwrap()
        };
        let chunk_start = cursor.max(start);
        let chunk_end = (next_month - chrono::Duration::days(1)).min(end);
        ranges.push((format_boundary(chunk_start), format_boundary(chunk_end)));
        cursor = next_month;
    }
    ranges
}

fn format_boundary(date: NaiveDate) -> String {
    format!("{}T00:00:00+03:00", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn single_month_range_is_one_chunk() {
        let ranges = month_ranges(date(2024, 3, 5), date(2024, 3, 20));
        assert_eq!(
            ranges,
            vec![(
                "2024-03-05T00:00:00+03:00".to_string(),
                "2024-03-20T00:00:00+03:00".to_string()
            )]
        );
    }

    #[test]
    fn range_splits_at_month_boundaries() {
        let ranges = month_ranges(date(2024, 1, 15), date(2024, 3, 10));
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].0, "2024-01-15T00:00:00+03:00");
        assert_eq!(ranges[0].1, "2024-01-31T00:00:00+03:00");
        assert_eq!(ranges[1].0, "2024-02-01T00:00:00+03:00");
        assert_eq!(ranges[1].1, "2024-02-29T00:00:00+03:00");
        assert_eq!(ranges[2].0, "2024-03-01T00:00:00+03:00");
        assert_eq!(ranges[2].1, "2024-03-10T00:00:00+03:00");
    }

    #[test]
    fn range_crosses_year_end() {
        let ranges = month_ranges(date(2023, 12, 20), date(2024, 1, 5));
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].1, "2023-12-31T00:00:00+03:00");
        assert_eq!(ranges[1].0, "2024-01-01T00:00:00+03:00");
    }

    #[test]
    fn timestamps_normalize_across_layouts() {
        let client = EpiasClient::new("TGT-test".to_string()).unwrap();
        let expected = date(2024, 5, 1).and_hms_opt(14, 0, 0).unwrap();

        // Clock in its own field, with or without seconds.
        assert_eq!(
            client.item_timestamp(Some("2024-05-01"), Some("14:00")),
            Some(expected)
        );
        assert_eq!(
            client.item_timestamp(Some("2024-05-01T00:00:00+03:00"), Some("14:00:00")),
            Some(expected)
        );
        // Clock embedded in the date field.
        assert_eq!(
            client.item_timestamp(Some("2024-05-01T14:00:00+03:00"), None),
            Some(expected)
        );
        // No clock anywhere falls back to midnight.
        assert_eq!(
            client.item_timestamp(Some("2024-05-01"), None),
            Some(date(2024, 5, 1).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(client.item_timestamp(None, Some("14:00")), None);
        assert_eq!(client.item_timestamp(Some("garbage"), Some("14:00")), None);
    }

    #[test]
    fn response_items_deserialize() {
        let payload = r#"{"items":[{"date":"2024-01-01T00:00:00+03:00","hour":"00:00","price":1842.57}]}"#;
        let response: ItemsResponse<DayAheadPriceItem> = serde_json::from_str(payload).unwrap();
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].price, Some(1842.57));

        let payload = r#"{"items":[{"date":"2024-01-01T00:00:00+03:00","time":"00:00","toplam":42.0}]}"#;
        let response: ItemsResponse<ForecastItem> = serde_json::from_str(payload).unwrap();
        assert_eq!(response.items[0].total, Some(42.0));

        // An empty body still parses to an empty series input.
        let response: ItemsResponse<RealizedItem> = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
    }
}
