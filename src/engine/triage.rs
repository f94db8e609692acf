//! Case triage queue: filter, then totally order the active case set.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregator::AggregateReport;
use crate::models::{Case, CaseStatus, DerivedSlaStatus, Priority, ProjectionFailure, SlaStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Sla,
    Priority,
    Date,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sla" => Ok(SortBy::Sla),
            "priority" => Ok(SortBy::Priority),
            "date" => Ok(SortBy::Date),
            _ => Err(format!("Invalid sortBy '{}'. Valid options: sla, priority, date", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(format!("Invalid sortOrder '{}'. Valid options: asc, desc", s)),
        }
    }
}

/// Filter and ordering options. Empty selections mean "all".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriageQuery {
    pub priorities: Vec<Priority>,
    pub statuses: Vec<CaseStatus>,
    pub search: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

/// One row of the triage view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageEntry {
    #[serde(flatten)]
    pub case: Case,
    /// `None` when the SLA record could not be projected
    pub sla: Option<DerivedSlaStatus>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResult {
    pub cases: Vec<TriageEntry>,
    /// True when the filter left nothing to show
    pub no_matches: bool,
    /// Cases whose SLA could not be derived
    pub sla_failures: Vec<ProjectionFailure>,
}

impl TriageQuery {
    pub fn matches(&self, case: &Case) -> bool {
        if !self.priorities.is_empty() && !self.priorities.contains(&case.priority) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&case.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [&case.protocol, &case.customer_name, &case.case_type]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

/// A resolved record is terminal even when its response metric stays BREACHED.
fn is_terminal(entry: &TriageEntry) -> bool {
    entry.case.status.is_terminal()
        || matches!(&entry.sla, Some(sla) if sla.resolved_at.is_some()
            || sla.overall_status == SlaStatus::Completed)
}

fn urgency(entry: &TriageEntry) -> i64 {
    entry
        .sla
        .as_ref()
        .and_then(DerivedSlaStatus::urgency_minutes)
        .unwrap_or(i64::MAX)
}

fn tie_break(a: &TriageEntry, b: &TriageEntry) -> Ordering {
    a.case
        .created_at
        .cmp(&b.case.created_at)
        .then_with(|| a.case.id.cmp(&b.case.id))
}

/// Total order over triage entries for the given key and direction.
pub fn compare(a: &TriageEntry, b: &TriageEntry, sort_by: SortBy, order: SortOrder) -> Ordering {
    let directed = |ord: Ordering| match order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    };

    let primary = match sort_by {
        SortBy::Sla => {
            // terminal entries sink regardless of direction
            match (is_terminal(a), is_terminal(b)) {
                (false, true) => return Ordering::Less,
                (true, false) => return Ordering::Greater,
                (true, true) => Ordering::Equal,
                (false, false) => directed(urgency(a).cmp(&urgency(b))),
            }
        }
        SortBy::Priority => directed(a.case.priority.rank().cmp(&b.case.priority.rank())),
        SortBy::Date => directed(a.case.created_at.cmp(&b.case.created_at)),
    };

    primary.then_with(|| tie_break(a, b))
}

/// Build the triage view from the case set and one aggregation report.
pub fn triage(cases: Vec<Case>, report: &AggregateReport, query: &TriageQuery) -> TriageResult {
    let statuses: HashMap<Uuid, &DerivedSlaStatus> =
        report.statuses.iter().map(|(id, s)| (*id, s)).collect();
    let failed: HashMap<Uuid, &ProjectionFailure> = report
        .failures
        .iter()
        .map(|f| (f.case_id, f))
        .collect();

    let mut sla_failures = Vec::new();
    let mut entries = Vec::new();
    for case in cases.into_iter().filter(|case| query.matches(case)) {
        let sla = statuses.get(&case.id).map(|s| (*s).clone());
        if sla.is_none() {
            let cause = failed
                .get(&case.id)
                .map(|f| f.cause.clone())
                .unwrap_or_else(|| format!("No SLA record for case {}", case.id));
            sla_failures.push(ProjectionFailure {
                case_id: case.id,
                cause,
            });
            // unknown SLA must not be ranked as "no risk"
            if query.sort_by == SortBy::Sla {
                continue;
            }
        }
        entries.push(TriageEntry { case, sla });
    }

    entries.sort_by(|a, b| compare(a, b, query.sort_by, query.sort_order));
    sla_failures.sort_by_key(|f| f.case_id);

    TriageResult {
        no_matches: entries.is_empty() && sla_failures.is_empty(),
        cases: entries,
        sla_failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregator::aggregate;
    use crate::engine::state_machine::ThresholdPolicy;
    use crate::models::{SlaRecord, SlaTargets};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn case(n: u128, priority: Priority, created_offset: i64) -> Case {
        Case {
            id: Uuid::from_u128(n),
            protocol: format!("PRT-{:04}", n),
            customer_name: format!("Customer {}", n),
            case_type: if n % 2 == 0 { "billing" } else { "technical" }.into(),
            priority,
            status: CaseStatus::InProgress,
            created_at: t0() + Duration::minutes(created_offset),
        }
    }

    /// A record with a met response whose resolution has `remaining` minutes left at `now`.
    fn record_with_remaining(case: &Case, remaining: i64, now: DateTime<Utc>) -> SlaRecord {
        let elapsed = (now - case.created_at).num_minutes();
        let mut record = SlaRecord::new(case, SlaTargets::new(30, elapsed + remaining));
        record.record_first_response(case.created_at).unwrap();
        record
    }

    fn build(cases: &[Case], records: &[SlaRecord], now: DateTime<Utc>, query: &TriageQuery) -> TriageResult {
        let report = aggregate(records, now, &ThresholdPolicy::default());
        triage(cases.to_vec(), &report, query)
    }

    fn ids(result: &TriageResult) -> Vec<u128> {
        result.cases.iter().map(|e| e.case.id.as_u128()).collect()
    }

    #[test]
    fn test_sla_ascending_orders_by_remaining() {
        let now = t0() + Duration::minutes(1000);
        let cases = vec![
            case(1, Priority::High, 0),
            case(2, Priority::Medium, 10),
            case(3, Priority::Low, 20),
            case(4, Priority::High, 30),
        ];
        let remaining = [135, 270, 675, 60];
        let records: Vec<_> = cases
            .iter()
            .zip(remaining)
            .map(|(c, r)| record_with_remaining(c, r, now))
            .collect();

        let result = build(&cases, &records, now, &TriageQuery::default());
        assert_eq!(ids(&result), vec![4, 1, 2, 3]);
        assert!(!result.no_matches);

        let desc = TriageQuery {
            sort_order: SortOrder::Desc,
            ..TriageQuery::default()
        };
        assert_eq!(ids(&build(&cases, &records, now, &desc)), vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_completed_sink_in_both_directions() {
        let now = t0() + Duration::minutes(500);
        let cases = vec![case(1, Priority::High, 0), case(2, Priority::High, 5), case(3, Priority::Low, 10)];
        let mut records: Vec<_> = cases
            .iter()
            .map(|c| record_with_remaining(c, 100, now))
            .collect();
        records[0].record_resolution(t0() + Duration::minutes(50)).unwrap();
        records[2] = record_with_remaining(&cases[2], 40, now);

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let query = TriageQuery {
                sort_order: order,
                ..TriageQuery::default()
            };
            let result = build(&cases, &records, now, &query);
            assert_eq!(*ids(&result).last().unwrap(), 1, "order {:?}", order);
        }
    }

    #[test]
    fn test_resolved_late_without_response_sinks() {
        let now = t0() + Duration::minutes(60);
        let cases = vec![case(1, Priority::Low, 0), case(2, Priority::High, 0)];
        let live = SlaRecord::new(&cases[0], SlaTargets::new(600, 2400));
        let mut late = SlaRecord::new(&cases[1], SlaTargets::new(30, 240));
        late.record_resolution(t0() + Duration::minutes(40)).unwrap();
        let records = vec![live, late];

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let query = TriageQuery {
                sort_order: order,
                ..TriageQuery::default()
            };
            let result = build(&cases, &records, now, &query);
            assert_eq!(ids(&result), vec![1, 2], "order {:?}", order);
            let sla = result.cases[1].sla.as_ref().unwrap();
            assert_eq!(sla.response_status, SlaStatus::Breached);
        }
    }

    #[test]
    fn test_priority_and_date_sorting_with_tie_break() {
        let now = t0() + Duration::minutes(100);
        let cases = vec![
            case(5, Priority::Low, 0),
            case(3, Priority::High, 20),
            case(2, Priority::High, 20),
            case(4, Priority::Medium, 10),
        ];
        let records: Vec<_> = cases
            .iter()
            .map(|c| record_with_remaining(c, 300, now))
            .collect();

        let by_priority = TriageQuery {
            sort_by: SortBy::Priority,
            ..TriageQuery::default()
        };
        assert_eq!(ids(&build(&cases, &records, now, &by_priority)), vec![2, 3, 4, 5]);

        let by_date_desc = TriageQuery {
            sort_by: SortBy::Date,
            sort_order: SortOrder::Desc,
            ..TriageQuery::default()
        };
        // equal createdAt falls back to id ascending, not reversed
        assert_eq!(ids(&build(&cases, &records, now, &by_date_desc)), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_ordering_is_deterministic() {
        let now = t0() + Duration::minutes(300);
        let cases: Vec<_> = (1..=40)
            .map(|n| case(n, Priority::Medium, (n % 3) as i64))
            .collect();
        let records: Vec<_> = cases
            .iter()
            .map(|c| record_with_remaining(c, 50 + (c.id.as_u128() % 4) as i64, now))
            .collect();

        let first = ids(&build(&cases, &records, now, &TriageQuery::default()));
        let mut reversed = cases.clone();
        reversed.reverse();
        let second = ids(&build(&reversed, &records, now, &TriageQuery::default()));
        assert_eq!(first, second);

        let report = aggregate(&records, now, &ThresholdPolicy::default());
        let entries = triage(cases, &report, &TriageQuery::default()).cases;
        for a in &entries {
            for b in &entries {
                let ab = compare(a, b, SortBy::Sla, SortOrder::Asc);
                let ba = compare(b, a, SortBy::Sla, SortOrder::Asc);
                assert_eq!(ab, ba.reverse());
                if a.case.id != b.case.id {
                    assert_ne!(ab, Ordering::Equal);
                }
            }
        }
    }

    #[test]
    fn test_filters_combine_and_search_is_case_insensitive() {
        let now = t0() + Duration::minutes(10);
        let mut cases = vec![
            case(1, Priority::High, 0),
            case(2, Priority::High, 0),
            case(3, Priority::Low, 0),
        ];
        cases[1].customer_name = "Maria Oliveira".into();
        cases[2].status = CaseStatus::Resolved;
        let records: Vec<_> = cases
            .iter()
            .map(|c| record_with_remaining(c, 300, now))
            .collect();

        let query = TriageQuery {
            priorities: vec![Priority::High],
            search: Some("OLIVEIRA".into()),
            ..TriageQuery::default()
        };
        assert_eq!(ids(&build(&cases, &records, now, &query)), vec![2]);

        let query = TriageQuery {
            statuses: vec![CaseStatus::Resolved],
            search: Some("prt-0003".into()),
            ..TriageQuery::default()
        };
        assert_eq!(ids(&build(&cases, &records, now, &query)), vec![3]);

        let query = TriageQuery {
            search: Some("nobody".into()),
            ..TriageQuery::default()
        };
        let result = build(&cases, &records, now, &query);
        assert!(result.cases.is_empty());
        assert!(result.no_matches);
    }

    #[test]
    fn test_unprojectable_case_reported_not_ranked() {
        let now = t0() + Duration::minutes(10);
        let cases = vec![case(1, Priority::High, 0), case(2, Priority::High, 0)];
        let mut records: Vec<_> = cases
            .iter()
            .map(|c| record_with_remaining(c, 300, now))
            .collect();
        records[1].resolution_time_minutes = 0;

        let result = build(&cases, &records, now, &TriageQuery::default());
        assert_eq!(ids(&result), vec![1]);
        assert_eq!(result.sla_failures.len(), 1);
        assert_eq!(result.sla_failures[0].case_id, Uuid::from_u128(2));
        assert!(!result.no_matches);

        let by_priority = TriageQuery {
            sort_by: SortBy::Priority,
            ..TriageQuery::default()
        };
        let result = build(&cases, &records, now, &by_priority);
        assert_eq!(ids(&result), vec![1, 2]);
        assert!(result.cases[1].sla.is_none());
    }
}
