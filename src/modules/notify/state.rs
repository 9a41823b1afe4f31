use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::models::{ModelQuota, StatusTier};

/// A change in quota status for one (account, model) pair.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub account: String,
    pub display_name: String,
    /// `None` marks the account's first-ever observation.
    pub old_tier: Option<StatusTier>,
    pub new_tier: StatusTier,
    pub old_percentage: i32,
    pub new_percentage: i32,
    pub reset_time: Option<DateTime<Utc>>,
}

impl StatusChange {
    pub fn is_initial(&self) -> bool {
        self.old_tier.is_none()
    }
}

#[derive(Default)]
struct AccountState {
    // display name -> (last tier, last percentage)
    models: HashMap<String, (StatusTier, i32)>,
}

/// Tracks the last observed status per (account, model) pair and turns
/// successive snapshots into the minimal set of change events.
///
/// The only long-lived mutable state in the core; process-lifetime
/// only, never persisted.
#[derive(Default)]
pub struct StateTracker {
    accounts: Mutex<HashMap<String, AccountState>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a snapshot and returns the detected changes.
    ///
    /// The first observation of an account reports every model with no
    /// old tier, seeding an initial summary. Afterwards only tier
    /// transitions are reported; percentage drift within a tier stays
    /// silent. Internal state is applied after detection, so detection
    /// always compares against the previous update.
    pub fn update(&self, account: &str, quotas: &[ModelQuota]) -> Vec<StatusChange> {
        let mut accounts = self.accounts.lock().expect("tracker lock poisoned");
        let is_first = !accounts.contains_key(account);
        let state = accounts.entry(account.to_string()).or_default();

        let mut changes = Vec::new();
        let mut observed = HashMap::with_capacity(quotas.len());

        for quota in quotas {
            let new_tier = quota.status_tier();
            let new_percentage = quota.remaining_percentage();
            let previous = state.models.get(&quota.display_name).copied();

            if is_first {
                changes.push(StatusChange {
                    account: account.to_string(),
                    display_name: quota.display_name.clone(),
                    old_tier: None,
                    new_tier,
                    old_percentage: 0,
                    new_percentage,
                    reset_time: quota.reset_time,
                });
            } else if let Some((old_tier, old_percentage)) = previous {
                if old_tier != new_tier {
                    changes.push(StatusChange {
                        account: account.to_string(),
                        display_name: quota.display_name.clone(),
                        old_tier: Some(old_tier),
                        new_tier,
                        old_percentage,
                        new_percentage,
                        reset_time: quota.reset_time,
                    });
                }
            }

            observed.insert(quota.display_name.clone(), (new_tier, new_percentage));
        }

        // Apply all updates only after detection for this call is done.
        state.models.extend(observed);
        changes
    }

    /// Clears all history; every account's next update behaves as a
    /// first observation again.
    pub fn reset(&self) {
        self.accounts.lock().expect("tracker lock poisoned").clear();
    }
}
