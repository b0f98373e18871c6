//! Conversion/revenue data recorded outside the ad platform and the ratios
//! derived from it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::rule::DateWindow;

/// Statuses counted as a booking.
const BOOKED_STATUSES: [&str; 2] = ["booked", "showed up"];

/// A lead or sale attributed to a campaign, ad group or ad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    pub object_id: String,
    pub phone: Option<String>,
    pub status: String,
    pub revenue: f64,
    pub service_revenue: f64,
    pub recorded_on: NaiveDate,
    pub appointment_on: Option<NaiveDate>,
}

impl SalesRecord {
    /// Date the record counts towards: the appointment when there is one.
    #[must_use]
    pub fn effective_date(&self) -> NaiveDate {
        self.appointment_on.unwrap_or(self.recorded_on)
    }

    #[must_use]
    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    #[must_use]
    pub fn is_booking(&self) -> bool {
        let status = self.status.trim();
        BOOKED_STATUSES
            .iter()
            .any(|booked| status.eq_ignore_ascii_case(booked))
    }
}

/// Sales counts and ratios for one aggregated object.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SalesMetrics {
    pub phone_count: u32,
    pub booking_count: u32,
    pub total_revenue: f64,
    pub service_revenue: f64,
    pub sdt_rate: f64,
    pub cost_per_phone: f64,
    pub booking_rate: f64,
    pub revenue_rate: f64,
    pub cost_per_appointment: f64,
    pub cost_per_service_revenue: f64,
    pub marketing_revenue_ratio: f64,
    pub marketing_service_ratio: f64,
    pub roi: f64,
    pub roas: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl SalesMetrics {
    /// Derive from the records whose effective date falls in `window`.
    #[must_use]
    pub fn derive(records: &[SalesRecord], window: DateWindow, spend: f64, results: f64) -> Self {
        let in_window: Vec<&SalesRecord> = records
            .iter()
            .filter(|r| window.contains(r.effective_date()))
            .collect();

        let phone_count = count(in_window.iter().filter(|r| r.has_phone()).count());
        let booking_count = count(in_window.iter().filter(|r| r.is_booking()).count());
        let total_revenue: f64 = in_window.iter().map(|r| r.revenue).sum();
        let service_revenue: f64 = in_window.iter().map(|r| r.service_revenue).sum();
        let phones = f64::from(phone_count);
        let bookings = f64::from(booking_count);

        Self {
            phone_count,
            booking_count,
            total_revenue,
            service_revenue,
            sdt_rate: round2(ratio(phones, results) * 100.0),
            cost_per_phone: ratio(spend, phones).round(),
            booking_rate: round2(ratio(bookings, results) * 100.0),
            revenue_rate: round2(ratio(total_revenue, spend) * 100.0),
            cost_per_appointment: ratio(spend, bookings).round(),
            cost_per_service_revenue: round2(ratio(spend, service_revenue)),
            marketing_revenue_ratio: round2(ratio(spend, total_revenue) * 100.0),
            marketing_service_ratio: round2(ratio(spend, service_revenue) * 100.0),
            roi: round2(ratio(total_revenue - spend, spend) * 100.0),
            roas: round2(ratio(total_revenue, spend)),
        }
    }

    pub(crate) fn metric(&self, name: &str) -> Option<f64> {
        let value = match name {
            "phone_count" | "phones" => f64::from(self.phone_count),
            "booking_count" | "bookings" => f64::from(self.booking_count),
            "total_revenue" | "revenue" => self.total_revenue,
            "service_revenue" => self.service_revenue,
            "sdt_rate" => self.sdt_rate,
            "cost_per_phone" => self.cost_per_phone,
            "booking_rate" => self.booking_rate,
            "revenue_rate" => self.revenue_rate,
            "cost_per_appointment" => self.cost_per_appointment,
            "cost_per_service_revenue" => self.cost_per_service_revenue,
            "marketing_revenue_ratio" => self.marketing_revenue_ratio,
            "marketing_service_ratio" => self.marketing_service_ratio,
            "roi" => self.roi,
            "roas" => self.roas,
            _ => return None,
        };
        Some(value)
    }
}
