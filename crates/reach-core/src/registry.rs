//! Process-lifetime registries for campaigns and experiments.
//!
//! Both maps are shared between tool handlers and the background monitors.
//! Nothing is persisted: a restart starts from empty registries.

use crate::errors::RegistryError;
use crate::model::{
    Campaign, CampaignStatus, Experiment, ExperimentStatus, Implementation, MetricsSnapshot,
    Winner,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct CampaignRegistry {
    inner: Arc<RwLock<HashMap<String, Campaign>>>,
}

impl CampaignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, campaign: Campaign) {
        write(&self.inner).insert(campaign.id.clone(), campaign);
    }

    pub fn get(&self, id: &str) -> Option<Campaign> {
        read(&self.inner).get(id).cloned()
    }

    /// All campaigns, oldest first.
    pub fn list(&self) -> Vec<Campaign> {
        let mut all: Vec<Campaign> = read(&self.inner).values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn list_active(&self) -> Vec<Campaign> {
        self.list()
            .into_iter()
            .filter(|c| c.status != CampaignStatus::Paused)
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the snapshot wholesale.
    pub fn update_metrics(&self, id: &str, metrics: MetricsSnapshot) -> Result<(), RegistryError> {
        let mut map = write(&self.inner);
        let c = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("campaign {id}")))?;
        c.metrics = metrics;
        Ok(())
    }

    pub fn set_status(&self, id: &str, status: CampaignStatus) -> Result<(), RegistryError> {
        let mut map = write(&self.inner);
        let c = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("campaign {id}")))?;
        c.status = status;
        Ok(())
    }

    /// Overlays `patch` onto the campaign config and returns the config it replaced.
    pub fn merge_config(
        &self,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<serde_json::Value, RegistryError> {
        let mut map = write(&self.inner);
        let c = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("campaign {id}")))?;
        let previous = c.config.clone();
        match (c.config.as_object_mut(), patch.as_object()) {
            (Some(cur), Some(p)) => {
                for (k, v) in p {
                    cur.insert(k.clone(), v.clone());
                }
            }
            _ => c.config = patch.clone(),
        }
        Ok(previous)
    }
}

#[derive(Clone, Default)]
pub struct ExperimentRegistry {
    inner: Arc<RwLock<HashMap<String, Experiment>>>,
}

impl ExperimentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, exp: Experiment) {
        write(&self.inner).insert(exp.id.clone(), exp);
    }

    pub fn get(&self, id: &str) -> Option<Experiment> {
        read(&self.inner).get(id).cloned()
    }

    pub fn list(&self) -> Vec<Experiment> {
        let mut all: Vec<Experiment> = read(&self.inner).values().cloned().collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        all
    }

    pub fn list_running(&self) -> Vec<Experiment> {
        self.list()
            .into_iter()
            .filter(|e| e.status == ExperimentStatus::Running)
            .collect()
    }

    pub fn update_variant_metrics(
        &self,
        id: &str,
        variant: usize,
        metrics: MetricsSnapshot,
    ) -> Result<(), RegistryError> {
        let mut map = write(&self.inner);
        let exp = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;
        if exp.status == ExperimentStatus::Completed {
            return Err(RegistryError::InvalidState(format!("test {id} is completed")));
        }
        let v = exp
            .variants
            .get_mut(variant)
            .ok_or_else(|| RegistryError::NotFound(format!("variant #{variant} of test {id}")))?;
        v.metrics = metrics;
        Ok(())
    }

    /// Pauses or resumes a test. Completed tests stay completed.
    pub fn set_status(&self, id: &str, status: ExperimentStatus) -> Result<(), RegistryError> {
        let mut map = write(&self.inner);
        let exp = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;
        if exp.status == ExperimentStatus::Completed {
            return Err(RegistryError::InvalidState(format!("test {id} is completed")));
        }
        if status == ExperimentStatus::Completed {
            return Err(RegistryError::InvalidState(
                "use complete() to finish a test".into(),
            ));
        }
        exp.status = status;
        Ok(())
    }

    /// Marks the test completed. Returns `false` if it already was, in which
    /// case the stored winner is left untouched.
    pub fn complete(&self, id: &str, winner: Option<Winner>) -> Result<bool, RegistryError> {
        let mut map = write(&self.inner);
        let exp = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;
        if exp.status == ExperimentStatus::Completed {
            return Ok(false);
        }
        exp.status = ExperimentStatus::Completed;
        exp.winner = winner;
        exp.completed_at = Some(Utc::now());
        Ok(true)
    }

    pub fn set_implementation(
        &self,
        id: &str,
        implementation: Implementation,
    ) -> Result<(), RegistryError> {
        let mut map = write(&self.inner);
        let exp = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;
        exp.implemented = Some(implementation);
        exp.implementation_error = None;
        Ok(())
    }

    pub fn set_implementation_error(&self, id: &str, error: String) -> Result<(), RegistryError> {
        let mut map = write(&self.inner);
        let exp = map
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("test {id}")))?;
        exp.implementation_error = Some(error);
        Ok(())
    }
}
