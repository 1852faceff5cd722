use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SoilError;
use crate::models::{HorizonRecord, ProfileId};

use super::{CapillaryRow, HorizonSource, ReferenceRow, ReferenceSource};

/// In-memory horizon and reference source.
///
/// Counts every read so callers can observe how often a cache hits the source.
#[derive(Debug, Default)]
pub struct MemorySource {
    name: String,
    profiles: BTreeMap<ProfileId, Vec<HorizonRecord>>,
    principal: Vec<ReferenceRow>,
    modifier: Vec<ReferenceRow>,
    capillary: Vec<CapillaryRow>,
    failure: Option<String>,
    bulk_loads: AtomicUsize,
    profile_loads: AtomicUsize,
    principal_loads: AtomicUsize,
    modifier_loads: AtomicUsize,
    capillary_loads: AtomicUsize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_profile(mut self, id: ProfileId, horizons: Vec<HorizonRecord>) -> Self {
        self.profiles.insert(id, horizons);
        self
    }

    pub fn with_principal_rows(mut self, rows: Vec<ReferenceRow>) -> Self {
        self.principal = rows;
        self
    }

    pub fn with_modifier_rows(mut self, rows: Vec<ReferenceRow>) -> Self {
        self.modifier = rows;
        self
    }

    pub fn with_capillary_rows(mut self, rows: Vec<CapillaryRow>) -> Self {
        self.capillary = rows;
        self
    }

    /// Make every read fail with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn bulk_loads(&self) -> usize {
        self.bulk_loads.load(Ordering::SeqCst)
    }

    pub fn profile_loads(&self) -> usize {
        self.profile_loads.load(Ordering::SeqCst)
    }

    pub fn principal_loads(&self) -> usize {
        self.principal_loads.load(Ordering::SeqCst)
    }

    pub fn modifier_loads(&self) -> usize {
        self.modifier_loads.load(Ordering::SeqCst)
    }

    pub fn capillary_loads(&self) -> usize {
        self.capillary_loads.load(Ordering::SeqCst)
    }

    fn check(&self, counter: &AtomicUsize) -> Result<(), SoilError> {
        counter.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(SoilError::DataSource {
                source_id: self.identity_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn identity_string(&self) -> String {
        format!("memory:{}", self.name)
    }
}

impl HorizonSource for MemorySource {
    fn identity(&self) -> String {
        self.identity_string()
    }

    fn load_profile(&self, id: ProfileId) -> Result<Vec<HorizonRecord>, SoilError> {
        self.check(&self.profile_loads)?;
        Ok(self.profiles.get(&id).cloned().unwrap_or_default())
    }

    fn load_all_horizons(&self) -> Result<BTreeMap<ProfileId, Vec<HorizonRecord>>, SoilError> {
        self.check(&self.bulk_loads)?;
        Ok(self.profiles.clone())
    }
}

impl ReferenceSource for MemorySource {
    fn identity(&self) -> String {
        self.identity_string()
    }

    fn principal_rows(&self) -> Result<Vec<ReferenceRow>, SoilError> {
        self.check(&self.principal_loads)?;
        Ok(self.principal.clone())
    }

    fn modifier_rows(&self) -> Result<Vec<ReferenceRow>, SoilError> {
        self.check(&self.modifier_loads)?;
        Ok(self.modifier.clone())
    }

    fn capillary_rows(&self) -> Result<Vec<CapillaryRow>, SoilError> {
        self.check(&self.capillary_loads)?;
        Ok(self.capillary.clone())
    }
}
