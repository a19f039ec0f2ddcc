//! Dashboard statistics over a scope set
//!
//! Ages are completed years on the day of computation. A member without a
//! birth date counts as age 0 and lands in the youngest band, but is left
//! out whenever an age filter is present.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::auth::{Actor, Role};
use crate::db::{Gender, MemberDoc};
use crate::network::resolver::Scope;
use crate::network::store::MemberStore;
use crate::types::{AliancaError, Result};

/// Completed years between `birth` and `today`, never negative
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBand {
    Child,
    Teen,
    YoungAdult,
    Adult,
    MiddleAge,
    Senior,
}

impl AgeBand {
    /// Band for an age: [0,12] [13,17] [18,25] [26,35] [36,50] [51,..)
    pub fn of(age: u32) -> Self {
        match age {
            0..=12 => AgeBand::Child,
            13..=17 => AgeBand::Teen,
            18..=25 => AgeBand::YoungAdult,
            26..=35 => AgeBand::Adult,
            36..=50 => AgeBand::MiddleAge,
            _ => AgeBand::Senior,
        }
    }
}

/// Optional narrowing of the members counted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsFilter {
    pub gender: Option<Gender>,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
}

impl StatsFilter {
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(AliancaError::invalid(
                    "min_age",
                    "min_age must not exceed max_age",
                ));
            }
        }
        Ok(())
    }

    fn has_age_bounds(&self) -> bool {
        self.min_age.is_some() || self.max_age.is_some()
    }

    pub fn matches(&self, member: &MemberDoc, today: NaiveDate) -> bool {
        if let Some(gender) = self.gender {
            if member.gender != Some(gender) {
                return false;
            }
        }
        if !self.has_age_bounds() {
            return true;
        }
        let Some(birth) = member.birth_date else {
            return false;
        };
        let age = age_on(birth, today);
        self.min_age.map_or(true, |min| age >= min) && self.max_age.map_or(true, |max| age <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub disciples: u64,
    pub direct_reports: u64,
    /// Equals `disciples` for cell leaders, 0 otherwise
    pub cell: u64,
    pub network: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MilestoneCounts {
    pub baptized: u64,
    pub life_university: u64,
    pub destiny_training_1: u64,
    pub destiny_training_2: u64,
    pub destiny_training_3: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgeBands {
    #[serde(rename = "0-12")]
    pub child: u64,
    #[serde(rename = "13-17")]
    pub teen: u64,
    #[serde(rename = "18-25")]
    pub young_adult: u64,
    #[serde(rename = "26-35")]
    pub adult: u64,
    #[serde(rename = "36-50")]
    pub middle_age: u64,
    #[serde(rename = "51+")]
    pub senior: u64,
}

impl AgeBands {
    fn record(&mut self, band: AgeBand) {
        let slot = match band {
            AgeBand::Child => &mut self.child,
            AgeBand::Teen => &mut self.teen,
            AgeBand::YoungAdult => &mut self.young_adult,
            AgeBand::Adult => &mut self.adult,
            AgeBand::MiddleAge => &mut self.middle_age,
            AgeBand::Senior => &mut self.senior,
        };
        *slot += 1;
    }

    pub fn sum(&self) -> u64 {
        self.child + self.teen + self.young_adult + self.adult + self.middle_age + self.senior
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Demographics {
    pub men: u64,
    pub women: u64,
    pub age_bands: AgeBands,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsReport {
    pub totals: Totals,
    pub milestones: MilestoneCounts,
    pub demographics: Demographics,
}

/// Build a report from already-scoped members
///
/// Inactive members and those rejected by `filter` are skipped.
pub fn summarize(
    actor: &Actor,
    members: &[MemberDoc],
    filter: &StatsFilter,
    today: NaiveDate,
) -> StatsReport {
    let mut report = StatsReport::default();

    for member in members
        .iter()
        .filter(|m| m.is_active() && filter.matches(m, today))
    {
        report.totals.disciples += 1;
        if member.supervisor_id.as_deref() == Some(actor.id.as_str()) {
            report.totals.direct_reports += 1;
        }

        let m = &member.milestones;
        let counts = &mut report.milestones;
        counts.baptized += m.baptized as u64;
        counts.life_university += m.life_university as u64;
        counts.destiny_training_1 += m.destiny_training_1 as u64;
        counts.destiny_training_2 += m.destiny_training_2 as u64;
        counts.destiny_training_3 += m.destiny_training_3 as u64;

        match member.gender {
            Some(Gender::Male) => report.demographics.men += 1,
            Some(Gender::Female) => report.demographics.women += 1,
            None => {}
        }

        let age = member.birth_date.map_or(0, |birth| age_on(birth, today));
        report.demographics.age_bands.record(AgeBand::of(age));
    }

    report.totals.network = report.totals.disciples;
    if actor.role == Role::Leader {
        report.totals.cell = report.totals.disciples;
    }

    report
}

/// Computes dashboard statistics for an actor's scope
#[derive(Clone)]
pub struct StatisticsAggregator {
    store: Arc<dyn MemberStore>,
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        Self { store }
    }

    pub async fn aggregate(
        &self,
        actor: &Actor,
        scope: &Scope,
        filter: &StatsFilter,
    ) -> Result<StatsReport> {
        filter.validate()?;

        let members = self.store.members_in(scope.ids()).await?;
        let report = summarize(actor, &members, filter, Utc::now().date_naive());

        debug!(
            "Statistics for {}: {} of {} scoped member(s) counted",
            actor.id,
            report.totals.disciples,
            scope.len()
        );
        Ok(report)
    }
}
