//! Performance metrics: raw daily records and the per-object aggregate built
//! from them every cycle.

mod sales;

pub use sales::{SalesMetrics, SalesRecord};

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyPolicy;
use crate::rule::{DateWindow, MetricSource, Scope};

/// One day of platform-reported performance for one object.
///
/// `spend` is in platform units (minor units for non-local currencies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPerformanceRecord {
    pub level: Scope,
    pub ad_account_id: String,
    pub date: NaiveDate,
    pub campaign_id: Option<String>,
    pub campaign_name: Option<String>,
    pub ad_group_id: Option<String>,
    pub ad_group_name: Option<String>,
    pub ad_id: Option<String>,
    pub ad_name: Option<String>,
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub results: f64,
}

impl RawPerformanceRecord {
    /// Identifier of the object this record belongs to at `scope`.
    #[must_use]
    pub fn object_id(&self, scope: Scope) -> Option<&str> {
        let id = match scope {
            Scope::Campaign => self.campaign_id.as_deref(),
            Scope::AdGroup => self.ad_group_id.as_deref(),
            Scope::Ad => self.ad_id.as_deref(),
        };
        id.filter(|id| !id.is_empty())
    }

    #[must_use]
    pub fn object_name(&self, scope: Scope) -> Option<&str> {
        match scope {
            Scope::Campaign => self.campaign_name.as_deref(),
            Scope::AdGroup => self.ad_group_name.as_deref(),
            Scope::Ad => self.ad_name.as_deref(),
        }
    }
}

/// Per-cycle summary of one campaign, ad group or ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEntity {
    pub object_id: String,
    pub name: String,
    pub scope: Scope,
    pub ad_account_id: String,
    pub campaign_id: Option<String>,
    /// Whole currency units.
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub results: f64,
    pub cost_per_result: f64,
    pub sales: SalesMetrics,
}

impl AggregatedEntity {
    fn seed(record: &RawPerformanceRecord, scope: Scope, object_id: &str) -> Self {
        Self {
            object_id: object_id.to_string(),
            name: record.object_name(scope).unwrap_or(object_id).to_string(),
            scope,
            ad_account_id: record.ad_account_id.clone(),
            campaign_id: record.campaign_id.clone(),
            spend: 0.0,
            impressions: 0.0,
            clicks: 0.0,
            results: 0.0,
            cost_per_result: 0.0,
            sales: SalesMetrics::default(),
        }
    }

    /// Attach conversion data from `records` falling inside `window`.
    pub fn enrich(&mut self, records: &[SalesRecord], window: DateWindow) {
        self.sales = SalesMetrics::derive(records, window, self.spend, self.results);
    }
}

impl MetricSource for AggregatedEntity {
    fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "spend" => Some(self.spend),
            "impressions" => Some(self.impressions),
            "clicks" => Some(self.clicks),
            "results" | "conversions" => Some(self.results),
            "cost_per_result" | "cpr" => Some(self.cost_per_result),
            other => self.sales.metric(other),
        }
    }
}

/// Group `records` into one [`AggregatedEntity`] per object at `scope`.
///
/// `currencies` maps ad account id to currency code; accounts missing from
/// it are treated as local currency. Spend is scaled once per record before
/// summing. Objects come out in first-seen order.
#[must_use]
pub fn aggregate(
    records: &[RawPerformanceRecord],
    scope: Scope,
    currencies: &HashMap<String, String>,
    policy: &CurrencyPolicy,
) -> Vec<AggregatedEntity> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut entities: Vec<AggregatedEntity> = Vec::new();

    for record in records {
        let Some(object_id) = record.object_id(scope) else {
            continue;
        };
        let position = *index.entry(object_id.to_string()).or_insert_with(|| {
            entities.push(AggregatedEntity::seed(record, scope, object_id));
            entities.len() - 1
        });
        let currency = currencies.get(&record.ad_account_id).map(String::as_str);
        let entity = &mut entities[position];
        entity.spend += policy.to_major(record.spend, currency);
        entity.impressions += record.impressions;
        entity.clicks += record.clicks;
        entity.results += record.results;
    }

    for entity in &mut entities {
        entity.cost_per_result = if entity.results > 0.0 {
            entity.spend / entity.results
        } else {
            0.0
        };
    }
    entities
}
