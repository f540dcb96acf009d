// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mystique Budget Pacing Engine - Marketplace Statistics

//! Per-campaign and per-day summaries of a finished (or paused) run.
//!
//! Per-day rows are indexed by global day: a campaign's `k`-th completed day
//! lands on `day_started + k`.

use rust_decimal::Decimal;
use serde::Serialize;

use super::campaign::Campaign;
use super::serving::ServingSystem;
use crate::adapter::from_decimal;
use crate::clock::Clock;
use crate::pacing::PacingStatistics;

#[derive(Debug, Clone, Serialize)]
pub struct CampaignReport {
    pub campaign_id: String,
    pub day_started: Option<u64>,
    pub day_ended: Option<u64>,
    pub daily_budget: Decimal,
    pub wins: Vec<u32>,
    pub cpm: Vec<Option<f64>>,
    pub budget_utilization: Vec<f64>,
    pub overspend: Vec<Decimal>,
    pub minutes_alive: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingStatistics>,
}

impl CampaignReport {
    pub fn new(campaign: &Campaign, pacing: Option<PacingStatistics>) -> Self {
        Self {
            campaign_id: campaign.id().to_string(),
            day_started: campaign.day_started(),
            day_ended: campaign.day_ended(),
            daily_budget: campaign.daily_budget(),
            wins: campaign.history().iter().map(|d| d.wins).collect(),
            cpm: campaign.cpm_daily_history(),
            budget_utilization: campaign.budget_utilization_daily_history(),
            overspend: campaign.overspend_daily_history(),
            minutes_alive: campaign.history().iter().map(|d| d.minutes_alive).collect(),
            pacing,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayReport {
    pub day: u64,
    pub cpm: Option<f64>,
    pub spend: Decimal,
    pub overspend: Decimal,
    pub wins: u64,
    pub over_budget_campaigns: u32,
    pub minutes_alive: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_constrained_campaigns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_budget_constrained_campaigns: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverallReport {
    pub cpm: Option<f64>,
    pub spend: Decimal,
    pub overspend: Decimal,
    pub wins: u64,
    pub over_budget_campaign_days: u32,
    pub minutes_alive: u64,
    /// Mean budget utilization over all completed campaign-days.
    pub mean_budget_utilization: Option<f64>,
}

fn cpm(spend: Decimal, wins: u64) -> Option<f64> {
    (wins > 0).then(|| 1000.0 * from_decimal(spend) / wins as f64)
}

pub fn campaign_reports(serving: &ServingSystem) -> Vec<CampaignReport> {
    serving
        .all_campaigns()
        .map(|c| CampaignReport::new(c, serving.pacing_statistics(c.id())))
        .collect()
}

/// One row per completed global day.
pub fn day_reports(serving: &ServingSystem, now: &Clock) -> Vec<DayReport> {
    let days = now.days() as usize;
    let mut rows: Vec<DayReport> =
        (0..days).map(|day| DayReport { day: day as u64, ..DayReport::default() }).collect();

    for campaign in serving.all_campaigns() {
        let start = campaign.day_started().unwrap_or(0) as usize;
        let overspend = campaign.overspend_daily_history();
        for (offset, ledger) in campaign.history().iter().enumerate() {
            let Some(row) = rows.get_mut(start + offset) else { continue };
            row.spend += ledger.spend;
            row.wins += u64::from(ledger.wins);
            row.minutes_alive += u64::from(ledger.minutes_alive);
            row.overspend += overspend[offset];
            if overspend[offset] > Decimal::ZERO {
                row.over_budget_campaigns += 1;
            }
        }
    }

    let global = serving.pacing().map(|p| p.get_global_pacing_statistics(now));
    for row in &mut rows {
        row.cpm = cpm(row.spend, row.wins);
        if let Some(g) = &global {
            let day = row.day as usize;
            row.budget_constrained_campaigns = g.budget_constrained_per_day.get(day).copied();
            row.not_budget_constrained_campaigns = g.not_budget_constrained_per_day.get(day).copied();
        }
    }
    rows
}

pub fn overall_report(serving: &ServingSystem, days: &[DayReport]) -> OverallReport {
    let spend = days.iter().map(|d| d.spend).sum();
    let wins = days.iter().map(|d| d.wins).sum();
    let utilizations: Vec<f64> =
        serving.all_campaigns().flat_map(Campaign::budget_utilization_daily_history).collect();
    OverallReport {
        cpm: cpm(spend, wins),
        spend,
        overspend: days.iter().map(|d| d.overspend).sum(),
        wins,
        over_budget_campaign_days: days.iter().map(|d| d.over_budget_campaigns).sum(),
        minutes_alive: days.iter().map(|d| d.minutes_alive).sum(),
        mean_budget_utilization: crate::pacing::util::mean(&utilizations),
    }
}
