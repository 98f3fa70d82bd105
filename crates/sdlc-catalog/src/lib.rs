#![deny(warnings)]

//! Scenario catalog: built-in scenarios plus YAML scenario packs loaded from disk.

use sdlc_core::{validate_scenario, Scenario, Track, ValidationError};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Scenarios shipped with the engine, parsed on demand.
const BUILTIN: [(&str, &str); 4] = [
    (
        "ecommerce-waterfall.yaml",
        include_str!("../../../assets/scenarios/ecommerce-waterfall.yaml"),
    ),
    (
        "patient-portal.yaml",
        include_str!("../../../assets/scenarios/patient-portal.yaml"),
    ),
    (
        "ecommerce-ai.yaml",
        include_str!("../../../assets/scenarios/ecommerce-ai.yaml"),
    ),
    (
        "fintech-ai.yaml",
        include_str!("../../../assets/scenarios/fintech-ai.yaml"),
    ),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("scenario not found: {0}")]
    NotFound(String),
    #[error("duplicate scenario id: {0}")]
    Duplicate(String),
    #[error("invalid scenario {id}: {source}")]
    Invalid {
        id: String,
        #[source]
        source: ValidationError,
    },
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e.to_string())
    }
}

/// Immutable-after-load collection of validated scenarios, in load order.
#[derive(Clone, Debug, Default)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Catalog of the scenarios embedded in the binary.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut catalog = Self::empty();
        for (file, text) in BUILTIN {
            catalog.insert_yaml(file, text)?;
        }
        Ok(catalog)
    }

    /// Parse one YAML scenario and add it. `source` names it in errors.
    pub fn insert_yaml(&mut self, source: &str, text: &str) -> Result<&Scenario, CatalogError> {
        let scenario = parse_yaml(source, text)?;
        self.insert(scenario)
    }

    /// Validate and add a scenario. Ids must be unique across the catalog.
    pub fn insert(&mut self, scenario: Scenario) -> Result<&Scenario, CatalogError> {
        self.admit(&scenario, &[])?;
        Ok(self.push(scenario))
    }

    /// Check `scenario` against the catalog and a batch not yet committed.
    fn admit(&self, scenario: &Scenario, pending: &[Scenario]) -> Result<(), CatalogError> {
        validate_scenario(scenario).map_err(|source| CatalogError::Invalid {
            id: scenario.id.clone(),
            source,
        })?;
        if self
            .scenarios
            .iter()
            .chain(pending)
            .any(|s| s.id == scenario.id)
        {
            return Err(CatalogError::Duplicate(scenario.id.clone()));
        }
        Ok(())
    }

    fn push(&mut self, scenario: Scenario) -> &Scenario {
        debug!(id = %scenario.id, track = %scenario.track, phases = scenario.phase_count(), "scenario registered");
        self.scenarios.push(scenario);
        let last = self.scenarios.len() - 1;
        &self.scenarios[last]
    }

    /// Load every `*.yaml`/`*.yml` file in `dir`, in file-name order.
    ///
    /// All or nothing: if any file fails to read, parse, validate or collides,
    /// the catalog is left unchanged. Returns the number of scenarios added.
    pub fn load_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize, CatalogError> {
        let mut paths = Vec::new();
        for ent in fs::read_dir(dir.as_ref())? {
            let ent = ent?;
            if !ent.file_type()?.is_file() {
                continue;
            }
            let path = ent.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "yaml" || e == "yml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut batch = Vec::with_capacity(paths.len());
        for path in &paths {
            let text = fs::read_to_string(path)?;
            let scenario = parse_yaml(&path.display().to_string(), &text)?;
            self.admit(&scenario, &batch)?;
            batch.push(scenario);
        }
        let added = batch.len();
        for (scenario, path) in batch.into_iter().zip(&paths) {
            let scenario = self.push(scenario);
            info!(id = %scenario.id, file = %path.display(), "loaded scenario");
        }
        Ok(added)
    }

    pub fn get_scenario(&self, id: &str) -> Result<&Scenario, CatalogError> {
        self.scenarios
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Scenarios of one track, in catalog order.
    pub fn list_scenarios(&self, track: Track) -> Vec<&Scenario> {
        self.scenarios.iter().filter(|s| s.track == track).collect()
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

fn parse_yaml(source: &str, text: &str) -> Result<Scenario, CatalogError> {
    serde_yaml::from_str(text).map_err(|e| CatalogError::Parse {
        file: source.to_string(),
        message: e.to_string(),
    })
}
