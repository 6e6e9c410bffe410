use chrono::{DateTime, Utc};

use crate::config::IdentityConfig;
use crate::models::{MessageId, Observation, ProductRecord, Target};
use crate::store::StockStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// New, or previously sold out, and now in stock.
    Restocked,
    /// Previously in stock and now sold out.
    SoldOut,
    None,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub record: ProductRecord,
    pub transition: Transition,
    /// A restock alert should be sent for `record`.
    pub notify: bool,
    /// New record, or sold-out flag flipped.
    pub changed: bool,
    /// Alert message to retract; already removed from the store.
    pub retract: Option<MessageId>,
}

/// Folds observations into the store and decides the side effects.
///
/// Side effects are only described here; the caller performs them after
/// releasing the state lock.
#[derive(Debug, Clone)]
pub struct Reconciler {
    identity: IdentityConfig,
    stale_after_cycles: u32,
}

impl Reconciler {
    pub fn new(identity: IdentityConfig, stale_after_cycles: u32) -> Self {
        Self {
            identity,
            stale_after_cycles,
        }
    }

    pub fn identity_of(&self, target: &Target, observation: &Observation) -> String {
        observation.identity(self.identity.key_for(target.kind()), &target.site_name)
    }

    /// Apply one observation. `cold_start` suppresses restock alerts while the
    /// store has no history, so the first ever scan does not alert on
    /// everything.
    pub fn reconcile(
        &self,
        store: &mut StockStore,
        target: &Target,
        observation: &Observation,
        cold_start: bool,
        now: DateTime<Utc>,
    ) -> ReconcileOutcome {
        let identity = self.identity_of(target, observation);
        let prior = store
            .get(&identity)
            .map(|r| (r.is_sold_out, r.sustained_in_stock_count));

        let changed = match prior {
            None => true,
            Some((was_sold_out, _)) => was_sold_out != observation.is_sold_out,
        };

        let mut transition = Transition::None;
        let mut notify = false;
        let mut retract = None;
        let count;

        match (prior, observation.is_sold_out) {
            (_, true) => {
                count = 0;
                if matches!(prior, Some((false, _))) {
                    transition = Transition::SoldOut;
                }
                retract = store.take_alert(&identity);
            }
            (None, false) | (Some((true, _)), false) => {
                count = 0;
                transition = Transition::Restocked;
                notify = !cold_start;
            }
            (Some((false, previous)), false) => {
                count = previous.saturating_add(1);
                if count == self.stale_after_cycles {
                    retract = store.take_alert(&identity);
                }
            }
        }

        let record = ProductRecord {
            identity,
            name: observation.name.clone(),
            url: observation.url.clone(),
            site_name: target.site_name.clone(),
            is_sold_out: observation.is_sold_out,
            sustained_in_stock_count: count,
            updated_at: now,
        };
        store.upsert(record.clone());

        ReconcileOutcome {
            record,
            transition,
            notify,
            changed,
            retract,
        }
    }
}
