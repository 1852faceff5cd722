use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use super::discretizer::{discretize, LayerSettings};
use crate::error::SoilError;
use crate::hydraulics::{HydraulicMethod, ReferenceTableStore, ReferenceTables};
use crate::io::{HorizonSource, ReferenceSource};
use crate::models::{ProfileId, SoilProfile};

/// Every profile of one data source, discretized in a single pass.
#[derive(Debug, Clone, Default)]
pub struct SourceProfiles {
    source_id: String,
    profiles: BTreeMap<ProfileId, Arc<SoilProfile>>,
    rejected: BTreeMap<ProfileId, String>,
}

impl SourceProfiles {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Look up a loaded profile, telling absent ids apart from rejected ones.
    pub fn get(&self, id: ProfileId) -> Result<Arc<SoilProfile>, SoilError> {
        if let Some(profile) = self.profiles.get(&id) {
            return Ok(Arc::clone(profile));
        }
        match self.rejected.get(&id) {
            Some(reason) => Err(SoilError::ProfileRejected {
                profile_id: id,
                reason: reason.clone(),
            }),
            None => Err(SoilError::ProfileNotFound {
                source_id: self.source_id.clone(),
                profile_id: id,
            }),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = ProfileId> + '_ {
        self.profiles.keys().copied()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SoilProfile> + '_ {
        self.profiles.values().map(|p| p.as_ref())
    }

    /// Ids that failed to load, with the reason.
    pub fn rejected(&self) -> &BTreeMap<ProfileId, String> {
        &self.rejected
    }

    /// KA5 texture sequence of every loaded profile.
    pub fn texture_summaries(&self) -> BTreeMap<ProfileId, String> {
        self.profiles
            .iter()
            .map(|(id, p)| (*id, p.texture_summary()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

type SourceSlot = OnceCell<Result<Arc<SourceProfiles>, String>>;

/// Load-once cache of discretized soil profiles, keyed by data source identity.
///
/// The first request for a source reads all of its horizons in one go and
/// discretizes every profile. Later requests, from any thread, are served from
/// memory; nothing is evicted or reloaded, including failures.
pub struct ProfileCache {
    settings: LayerSettings,
    tables: ReferenceTables,
    slots: Mutex<HashMap<String, Arc<SourceSlot>>>,
}

impl ProfileCache {
    /// Cache deriving hydraulics from `references`, with a reference store of its own.
    pub fn new(
        settings: LayerSettings,
        references: Arc<dyn ReferenceSource>,
    ) -> Result<Self, SoilError> {
        let tables = ReferenceTableStore::new().tables(references);
        Self::with_tables(settings, tables)
    }

    /// Cache sharing already created reference tables.
    pub fn with_tables(settings: LayerSettings, tables: ReferenceTables) -> Result<Self, SoilError> {
        settings.validate()?;
        Ok(Self {
            settings,
            tables,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    pub fn tables(&self) -> &ReferenceTables {
        &self.tables
    }

    /// One discretized profile, loading the whole source on first use.
    pub fn get_profile(
        &self,
        source: &dyn HorizonSource,
        id: ProfileId,
    ) -> Result<Arc<SoilProfile>, SoilError> {
        self.profiles(source)?.get(id)
    }

    /// All profiles of a source, loading them on first use.
    pub fn profiles(&self, source: &dyn HorizonSource) -> Result<Arc<SourceProfiles>, SoilError> {
        let source_id = source.identity();
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(source_id.clone()).or_default())
        };

        slot.get_or_init(|| self.load_source(source, &source_id))
            .clone()
            .map_err(|message| SoilError::DataSource { source_id, message })
    }

    /// Identities of the sources seen so far.
    pub fn cached_sources(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// KA5 derivation needs both tables; an outage fails the whole source
    /// instead of rejecting each profile.
    fn preload_tables(&self) -> Result<(), SoilError> {
        if self.settings.method == HydraulicMethod::Ka5 {
            self.tables.principal_table()?;
            self.tables.modifier_table()?;
        }
        Ok(())
    }

    fn load_source(
        &self,
        source: &dyn HorizonSource,
        source_id: &str,
    ) -> Result<Arc<SourceProfiles>, String> {
        let started = Instant::now();
        let horizons = source.load_all_horizons().map_err(|e| {
            warn!(source = source_id, error = %e, "loading soil profiles failed");
            e.into_message()
        })?;
        self.preload_tables().map_err(|e| {
            warn!(source = source_id, error = %e, "reference tables unavailable");
            e.to_string()
        })?;

        let mut loaded = SourceProfiles {
            source_id: source_id.to_string(),
            ..SourceProfiles::default()
        };
        for (id, profile_horizons) in horizons {
            match discretize(&profile_horizons, &self.settings, &self.tables) {
                Ok(layers) => {
                    loaded.profiles.insert(
                        id,
                        Arc::new(SoilProfile::new(id, self.settings.layer_thickness_cm, layers)),
                    );
                }
                Err(e) => {
                    warn!(source = source_id, profile = id, error = %e, "skipping soil profile");
                    loaded.rejected.insert(id, e.to_string());
                }
            }
        }

        info!(
            source = source_id,
            profiles = loaded.profiles.len(),
            rejected = loaded.rejected.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded soil profiles"
        );
        Ok(Arc::new(loaded))
    }
}

impl std::fmt::Debug for ProfileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileCache")
            .field("settings", &self.settings)
            .field("tables", &self.tables)
            .field("sources", &self.cached_sources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory::fixtures;
    use crate::io::MemorySource;
    use crate::models::{Density, HorizonRecord, OrganicContent};

    fn horizon(lower: Option<f64>, code: &str) -> HorizonRecord {
        HorizonRecord {
            organic: Some(OrganicContent::Matter(0.02)),
            density: Some(Density::Raw(1400.0)),
            ..HorizonRecord::with_texture(lower, code)
        }
    }

    fn sample_source(name: &str) -> MemorySource {
        MemorySource::new(name)
            .with_profile(1, vec![horizon(Some(30.0), "Sl2"), horizon(None, "Ls3")])
            .with_profile(2, vec![horizon(None, "Ls3")])
            // no organic content or density: rejected
            .with_profile(3, vec![HorizonRecord::with_texture(None, "Ls3")])
    }

    fn sample_cache() -> (Arc<MemorySource>, ProfileCache) {
        let references = Arc::new(fixtures::ka5_source("refs"));
        let cache = ProfileCache::new(LayerSettings::default(), references.clone()).unwrap();
        (references, cache)
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = LayerSettings {
            layer_thickness_cm: 0,
            ..LayerSettings::default()
        };
        let references = Arc::new(fixtures::ka5_source("refs"));
        assert!(ProfileCache::new(settings, references).is_err());
    }

    #[test]
    fn test_get_profile_is_idempotent() {
        let (_, cache) = sample_cache();
        let source = sample_source("idempotent");
        let first = cache.get_profile(&source, 1).unwrap();
        let second = cache.get_profile(&source, 1).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.num_layers(), 20);
        cache.get_profile(&source, 2).unwrap();
        assert_eq!(source.bulk_loads(), 1);
        assert_eq!(source.profile_loads(), 0);
    }

    #[test]
    fn test_reference_tables_loaded_once_for_all_profiles() {
        let (references, cache) = sample_cache();
        let source = sample_source("tables");
        cache.get_profile(&source, 1).unwrap();
        cache.get_profile(&source, 2).unwrap();
        assert_eq!(references.principal_loads(), 1);
        assert_eq!(references.modifier_loads(), 1);
    }

    #[test]
    fn test_not_found_and_rejected_differ() {
        let (_, cache) = sample_cache();
        let source = sample_source("outcomes");

        let missing = cache.get_profile(&source, 99).unwrap_err();
        assert!(missing.is_not_found());

        let rejected = cache.get_profile(&source, 3).unwrap_err();
        match rejected {
            SoilError::ProfileRejected { profile_id, reason } => {
                assert_eq!(profile_id, 3);
                assert!(reason.contains("organic_carbon"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.bulk_loads(), 1);
    }

    #[test]
    fn test_source_profiles_listing() {
        let (_, cache) = sample_cache();
        let source = sample_source("listing");
        let loaded = cache.profiles(&source).unwrap();
        assert_eq!(loaded.ids().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(loaded.rejected().keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(loaded.texture_summaries()[&1], "Sl2|Ls3");
        assert_eq!(loaded.source_id(), "memory:listing");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_sources_cached_separately() {
        let (_, cache) = sample_cache();
        let a = sample_source("a");
        let b = MemorySource::new("b").with_profile(1, vec![horizon(None, "Sl2")]);
        assert_eq!(cache.get_profile(&a, 1).unwrap().texture_summary(), "Sl2|Ls3");
        assert_eq!(cache.get_profile(&b, 1).unwrap().texture_summary(), "Sl2");
        assert!(cache.get_profile(&b, 2).unwrap_err().is_not_found());
        assert_eq!(
            cache.cached_sources(),
            vec!["memory:a".to_string(), "memory:b".to_string()]
        );
    }

    #[test]
    fn test_bulk_load_failure_is_memoized() {
        let (_, cache) = sample_cache();
        let source = MemorySource::new("down").failing("connection refused");
        for _ in 0..3 {
            let err = cache.get_profile(&source, 1).unwrap_err();
            match err {
                SoilError::DataSource { source_id, message } => {
                    assert_eq!(source_id, "memory:down");
                    assert_eq!(message, "connection refused");
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(source.bulk_loads(), 1);
    }

    #[test]
    fn test_reference_outage_fails_the_source() {
        let references = Arc::new(MemorySource::new("refs-down").failing("tables offline"));
        let cache = ProfileCache::new(LayerSettings::default(), references.clone()).unwrap();
        let source = sample_source("outage");
        for _ in 0..2 {
            match cache.get_profile(&source, 1).unwrap_err() {
                SoilError::DataSource { source_id, message } => {
                    assert_eq!(source_id, "memory:outage");
                    assert!(message.contains("memory:refs-down"));
                    assert!(message.contains("tables offline"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(source.bulk_loads(), 1);
        assert_eq!(references.principal_loads(), 1);
    }

    #[test]
    fn test_van_genuchten_does_not_need_tables() {
        let settings = LayerSettings {
            method: HydraulicMethod::VanGenuchten,
            ..LayerSettings::default()
        };
        let references = Arc::new(MemorySource::new("refs-unused").failing("tables offline"));
        let cache = ProfileCache::new(settings, references.clone()).unwrap();
        let source = sample_source("vg");
        assert_eq!(cache.get_profile(&source, 1).unwrap().num_layers(), 20);
        assert_eq!(references.principal_loads(), 0);
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let (_, cache) = sample_cache();
        let source = sample_source("concurrent");
        std::thread::scope(|scope| {
            for i in 0..8 {
                let cache = &cache;
                let source = &source;
                scope.spawn(move || {
                    let id = if i % 2 == 0 { 1 } else { 2 };
                    let profile = cache.get_profile(source, id).unwrap();
                    assert_eq!(profile.num_layers(), 20);
                });
            }
        });
        assert_eq!(source.bulk_loads(), 1);
    }
}
