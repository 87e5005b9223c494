//! In-memory sample registry.
//!
//! Uniqueness violations are reported as `RelationalFailure`s with the
//! diagnostic shape a relational store would produce, so they travel the same
//! classification path as real storage errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use labkit::classify::RelationalFailure;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BARCODE_CONSTRAINT: &str = "samples_barcode_key";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub id: Uuid,
    pub lab_id: Uuid,
    pub barcode: String,
    pub submitter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    pub volume_ml: f64,
    pub replicates: u32,
    pub priority: String,
    pub collected_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_on: Option<String>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SampleRegistry {
    samples: Arc<DashMap<Uuid, Sample>>,
    barcodes: Arc<DashMap<String, Uuid>>,
}

impl SampleRegistry {
    /// # Errors
    /// Returns a unique-violation failure when the barcode is already registered.
    pub fn insert(&self, sample: Sample) -> Result<Sample, RelationalFailure> {
        match self.barcodes.entry(sample.barcode.clone()) {
            Entry::Occupied(_) => Err(RelationalFailure::new(
                UNIQUE_VIOLATION,
                format!("duplicate key value violates unique constraint \"{BARCODE_CONSTRAINT}\""),
            )
            .with_constraint(BARCODE_CONSTRAINT)
            .with_detail(format!("Key (barcode)=({}) already exists.", sample.barcode))),
            Entry::Vacant(slot) => {
                slot.insert(sample.id);
                self.samples.insert(sample.id, sample.clone());
                Ok(sample)
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Sample> {
        self.samples.get(&id).map(|s| s.value().clone())
    }

    /// Apply `update` to a stored sample, returning the new state.
    #[must_use]
    pub fn update<F>(&self, id: Uuid, update: F) -> Option<Sample>
    where
        F: FnOnce(&mut Sample),
    {
        self.samples.get_mut(&id).map(|mut s| {
            update(s.value_mut());
            s.value().clone()
        })
    }

    /// One page in registration order, plus the total count.
    #[must_use]
    pub fn page(&self, priority: Option<&str>, page: u64, page_size: u64) -> (Vec<Sample>, u64) {
        let mut all: Vec<Sample> = self
            .samples
            .iter()
            .filter(|s| priority.is_none_or(|p| s.priority == p))
            .map(|s| s.value().clone())
            .collect();
        all.sort_by(|a, b| a.registered_at.cmp(&b.registered_at).then(a.id.cmp(&b.id)));

        let total = u64::try_from(all.len()).unwrap_or(u64::MAX);
        let skip = usize::try_from(page.saturating_sub(1).saturating_mul(page_size))
            .unwrap_or(usize::MAX);
        let take = usize::try_from(page_size).unwrap_or(usize::MAX);
        (all.into_iter().skip(skip).take(take).collect(), total)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn sample(barcode: &str) -> Sample {
        Sample {
            id: Uuid::now_v7(),
            lab_id: Uuid::now_v7(),
            barcode: barcode.to_owned(),
            submitter: "Dr. Rao".to_owned(),
            contact_phone: None,
            volume_ml: 5.0,
            replicates: 1,
            priority: "routine".to_owned(),
            collected_on: "2026-03-01".to_owned(),
            analyzed_on: None,
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_barcodes_fail_like_a_unique_index() {
        let registry = SampleRegistry::default();
        registry.insert(sample("LAB-0001")).unwrap();

        let err = registry.insert(sample("LAB-0001")).unwrap_err();
        assert_eq!(err.code, UNIQUE_VIOLATION);
        assert_eq!(err.constraint.as_deref(), Some(BARCODE_CONSTRAINT));
    }

    #[test]
    fn pages_are_stable() {
        let registry = SampleRegistry::default();
        for i in 0..25 {
            registry.insert(sample(&format!("LAB-{i:04}"))).unwrap();
        }

        let (first, total) = registry.page(None, 1, 10);
        let (third, _) = registry.page(None, 3, 10);
        assert_eq!(total, 25);
        assert_eq!(first.len(), 10);
        assert_eq!(third.len(), 5);
        assert_eq!(first[0].barcode, "LAB-0000");
    }

    #[test]
    fn update_touches_only_the_target() {
        let registry = SampleRegistry::default();
        let stored = registry.insert(sample("LAB-0042")).unwrap();
        let updated = registry
            .update(stored.id, |s| s.analyzed_on = Some("2026-03-05".to_owned()))
            .unwrap();
        assert_eq!(updated.analyzed_on.as_deref(), Some("2026-03-05"));
        assert!(registry.update(Uuid::now_v7(), |_| {}).is_none());
    }
}
