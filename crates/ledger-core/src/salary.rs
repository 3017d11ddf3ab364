// Salary groups: contests that share one player-pricing sheet.
//
// Contests with the same style starting at the same time use the same
// salaries, so pricing is fetched once per (style, tournament_date) group
// from the group's lowest contest id.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::columns::format_datetime;
use crate::contest::{Contest, ContestId};
use crate::error::{LedgerError, Result};

/// Grouping key: normalized style plus start time.
pub type SalaryKey = (String, NaiveDateTime);

/// Representative contest id of every salary group in a day's collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryGroups {
    representatives: BTreeMap<SalaryKey, ContestId>,
}

impl SalaryGroups {
    /// Group the day's contests. Contests without a style or a start time
    /// are left out of every group.
    pub fn from_contests(contests: &[Contest]) -> Self {
        let mut representatives: BTreeMap<SalaryKey, ContestId> = BTreeMap::new();
        for contest in contests {
            let Some(key) = group_key(contest) else {
                continue;
            };
            representatives
                .entry(key)
                .and_modify(|rep| {
                    if contest.contest_id < *rep {
                        *rep = contest.contest_id.clone();
                    }
                })
                .or_insert_with(|| contest.contest_id.clone());
        }
        Self { representatives }
    }

    pub fn representative(&self, style: &str, date: &NaiveDateTime) -> Option<&ContestId> {
        self.representatives.get(&(style.trim().to_string(), *date))
    }

    /// The salary id for `contest`, or `UnresolvableSalaryGroup` when its
    /// (style, date) pair is not part of this collection.
    pub fn resolve(&self, contest: &Contest) -> Result<&ContestId> {
        let unresolvable = |reason: String| LedgerError::UnresolvableSalaryGroup {
            contest_id: contest.contest_id.to_string(),
            reason,
        };

        if contest.tournament_date.is_none() {
            return Err(unresolvable("no tournament date".into()));
        }
        let Some(key) = group_key(contest) else {
            return Err(unresolvable("no style".into()));
        };

        self.representatives.get(&key).ok_or_else(|| {
            unresolvable(format!(
                "style `{}` on {} is not in the day's contests",
                key.0,
                format_datetime(&key.1)
            ))
        })
    }

    /// Distinct salary ids, one per group, in ascending order.
    pub fn salary_ids(&self) -> BTreeSet<ContestId> {
        self.representatives.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.representatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representatives.is_empty()
    }
}

fn group_key(contest: &Contest) -> Option<SalaryKey> {
    let date = contest.tournament_date?;
    let style = contest.style.trim();
    if style.is_empty() {
        return None;
    }
    Some((style.to_string(), date))
}

/// Assign `salary_id` on every contest of the day's collection.
///
/// Pure function of the collection: re-running it on the same contests
/// yields the same ids, and a newly added lower id re-assigns its whole
/// group. Contests that cannot be grouped get `salary_id = None` and are
/// returned as errors for the caller to report.
pub fn assign_salary_ids(contests: &mut [Contest]) -> Vec<LedgerError> {
    let groups = SalaryGroups::from_contests(contests);
    let mut unresolved = Vec::new();

    for contest in contests.iter_mut() {
        match groups.resolve(contest) {
            Ok(salary_id) => contest.salary_id = Some(salary_id.clone()),
            Err(e) => {
                contest.salary_id = None;
                unresolved.push(e);
            }
        }
    }

    debug!(
        "assigned {} salary groups across {} contests",
        groups.len(),
        contests.len()
    );
    unresolved
}

// ---------------------------------------------------------------------------
// Salary file inventory
// ---------------------------------------------------------------------------

/// Why a salary sheet could not be downloaded for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryMarker {
    AlreadyStarted,
    ReservationOnly,
    NotDownloaded,
}

impl SalaryMarker {
    pub fn suffix(&self) -> &'static str {
        match self {
            SalaryMarker::AlreadyStarted => "already_started",
            SalaryMarker::ReservationOnly => "reservation_only",
            SalaryMarker::NotDownloaded => "couldnt_be_downloaded",
        }
    }

    /// File name of the marker for `salary_id`, e.g. `81234567_already_started`.
    pub fn file_name(&self, salary_id: &ContestId) -> String {
        format!("{salary_id}_{}", self.suffix())
    }
}

/// A file found in a day's `salaries/` folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalaryFile {
    /// `salary_<id>.csv`
    Pricing(ContestId),
    /// `<id>_<marker>`
    Marker(ContestId, SalaryMarker),
    Other,
}

/// File name of the pricing sheet for `salary_id`.
pub fn pricing_file_name(salary_id: &ContestId) -> String {
    format!("salary_{salary_id}.csv")
}

pub fn classify_salary_file(name: &str) -> SalaryFile {
    if let Some(id) = name
        .strip_prefix("salary_")
        .and_then(|rest| rest.strip_suffix(".csv"))
    {
        return SalaryFile::Pricing(ContestId::new(id));
    }

    for marker in [
        SalaryMarker::AlreadyStarted,
        SalaryMarker::ReservationOnly,
        SalaryMarker::NotDownloaded,
    ] {
        if let Some(id) = name.strip_suffix(marker.suffix()).and_then(|rest| rest.strip_suffix('_')) {
            return SalaryFile::Marker(ContestId::new(id), marker);
        }
    }

    SalaryFile::Other
}

/// What still has to happen in a day's `salaries/` folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalaryPlan {
    /// Salary ids with neither a pricing sheet nor a marker.
    pub pending: Vec<ContestId>,
    /// Pricing sheets whose id is no longer a group representative.
    pub obsolete: Vec<String>,
}

impl SalaryPlan {
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Compare the day's salary ids with the files already on disk.
///
/// Representatives can change when lower ids appear later in the day, which
/// leaves sheets downloaded for the old representative behind; those are
/// reported as obsolete.
pub fn plan_salary_files(needed: &BTreeSet<ContestId>, files: &[String]) -> SalaryPlan {
    let mut accounted: BTreeSet<&ContestId> = BTreeSet::new();
    let mut obsolete = Vec::new();

    for name in files {
        match classify_salary_file(name) {
            SalaryFile::Pricing(id) => match needed.get(&id) {
                Some(needed_id) => {
                    accounted.insert(needed_id);
                }
                None => obsolete.push(name.clone()),
            },
            SalaryFile::Marker(id, _) => {
                if let Some(needed_id) = needed.get(&id) {
                    accounted.insert(needed_id);
                }
            }
            SalaryFile::Other => warn!("unexpected file in salaries folder: {name}"),
        }
    }

    let pending = needed
        .iter()
        .filter(|id| !accounted.contains(id))
        .cloned()
        .collect();

    obsolete.sort();
    SalaryPlan { pending, obsolete }
}
