use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use imbalance_calculator::{PlantInfo, PlantType};

/// One entry of the plant list JSON. The platform export is inconsistent
/// about key casing, hence the aliases. `installedCapacityMw` is a local
/// supplement; plants without it simply get no capacity-factor KPI.
#[derive(Debug, Clone, Deserialize)]
pub struct PlantRecord {
    #[serde(rename = "powerPlantName", alias = "powerplantName")]
    pub power_plant_name: String,
    #[serde(rename = "organizationId")]
    pub organization_id: i64,
    #[serde(rename = "powerPlantId", alias = "powerplantId")]
    pub power_plant_id: i64,
    #[serde(rename = "uevcbId")]
    pub uevcb_id: i64,
    #[serde(rename = "installedCapacityMw", default)]
    pub installed_capacity_mw: Option<f64>,
}

impl PlantRecord {
    pub fn plant_info(&self) -> PlantInfo {
        PlantInfo {
            name: self.power_plant_name.clone(),
            plant_type: PlantType::from_plant_name(&self.power_plant_name),
            installed_capacity_mw: self.installed_capacity_mw,
        }
    }
}

/// Static name-keyed lookup of the plants the pipeline may settle.
/// Loaded once at startup and injected; the core never touches the file.
pub struct PlantDirectory {
    plants: Vec<PlantRecord>,
}

impl PlantDirectory {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read plant list {}", path.display()))?;
        let plants: Vec<PlantRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse plant list {}", path.display()))?;
        log::info!("loaded {} plants from {}", plants.len(), path.display());
        Ok(Self { plants })
    }

    pub fn lookup(&self, name: &str) -> Option<&PlantRecord> {
        self.plants
            .iter()
            .find(|plant| plant.power_plant_name == name)
    }

    pub fn plant_names(&self) -> Vec<&str> {
        self.plants
            .iter()
            .map(|plant| plant.power_plant_name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plants.is_empty()
    }
}
