pub mod builder;
pub mod comparator;
pub mod models;
pub mod series_loader;

pub use builder::MetricsBuilder;
pub use comparator::{aggregate_monthly, ensure_comparable};
pub use models::{
    ComparisonError, HourlyRecord, HourlySeries, MonthlyAggregate, MonthlyKpis, MonthlyTotals,
    PlantComparison, PlantInfo, PlantSeries, PlantSummary, PlantType,
};
pub use series_loader::SeriesLoader;
