//! Sales enricher: attaches CRM conversion data to aggregated objects.

use adpilot_domain::metrics::{AggregatedEntity, SalesRecord};
use adpilot_domain::rule::{DateWindow, Scope};

use crate::ports::SalesStore;

/// Joins aggregated performance with sales records for the same object.
pub struct SalesEnricher<S> {
    sales: S,
}

impl<S: SalesStore> SalesEnricher<S> {
    pub fn new(sales: S) -> Self {
        Self { sales }
    }

    /// Enrich every entity with the records falling inside `window`.
    ///
    /// Ad groups without any record of their own fall back to the records of
    /// their campaign. A failed lookup leaves the entity with zero sales.
    #[tracing::instrument(skip(self, entities), fields(count = entities.len()))]
    pub async fn enrich(&self, entities: &mut [AggregatedEntity], scope: Scope, window: DateWindow) {
        for entity in entities.iter_mut() {
            let records = self.records_for(entity, scope).await;
            entity.enrich(&records, window);
        }
    }

    async fn records_for(&self, entity: &AggregatedEntity, scope: Scope) -> Vec<SalesRecord> {
        let direct = self.lookup(&entity.object_id, scope).await;
        if !direct.is_empty() || scope != Scope::AdGroup {
            return direct;
        }
        match entity.campaign_id.as_deref() {
            Some(campaign_id) => {
                tracing::debug!(
                    ad_group = %entity.object_id,
                    campaign = campaign_id,
                    "no sales for ad group, using campaign attribution"
                );
                self.lookup(campaign_id, Scope::Campaign).await
            }
            None => direct,
        }
    }

    async fn lookup(&self, object_id: &str, level: Scope) -> Vec<SalesRecord> {
        match self.sales.find_by_object(object_id, level).await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    object_id,
                    %level,
                    error = %err.detailed_message(),
                    "sales lookup failed, treating as no sales"
                );
                Vec::new()
            }
        }
    }
}
