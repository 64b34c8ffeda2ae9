//! 依條件篩選標案
//!
//! 純函式：不做 I/O、不修改輸入，保持輸入順序。無法解析提交日期的標案一律排除。

use crate::domain::model::{window_cutoff, SearchCriteria, Tender};
use chrono::{Local, NaiveDateTime};

pub const DEFAULT_MATCH_WINDOW_DAYS: i64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchStats {
    pub examined: usize,
    pub undated: usize,
    pub stale: usize,
    pub rejected: usize,
    pub matched: usize,
}

#[derive(Debug, Clone)]
pub struct TenderMatcher {
    window_days: i64,
    reference_time: Option<NaiveDateTime>,
}

impl Default for TenderMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_WINDOW_DAYS)
    }
}

impl TenderMatcher {
    pub fn new(window_days: i64) -> Self {
        Self {
            window_days,
            reference_time: None,
        }
    }

    /// 固定比對時的「現在」，不設定則使用本地時間
    pub fn with_reference_time(mut self, now: NaiveDateTime) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn window_days(&self) -> i64 {
        self.window_days
    }

    pub fn filter(&self, tenders: &[Tender], criteria: &SearchCriteria) -> Vec<Tender> {
        self.filter_with_stats(tenders, criteria).0
    }

    pub fn filter_with_stats(
        &self,
        tenders: &[Tender],
        criteria: &SearchCriteria,
    ) -> (Vec<Tender>, MatchStats) {
        let cutoff = self.cutoff();
        let compiled = CompiledCriteria::new(criteria);
        let mut stats = MatchStats {
            examined: tenders.len(),
            ..MatchStats::default()
        };

        let matched: Vec<Tender> = tenders
            .iter()
            .filter(|tender| {
                let Some(submitted) = tender.submission_datetime() else {
                    stats.undated += 1;
                    return false;
                };
                if submitted < cutoff {
                    stats.stale += 1;
                    return false;
                }
                if !compiled.matches(tender) {
                    stats.rejected += 1;
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        stats.matched = matched.len();
        tracing::debug!(
            criteria = %criteria,
            examined = stats.examined,
            matched = stats.matched,
            stale = stats.stale,
            undated = stats.undated,
            "🔎 Filtered tenders"
        );

        (matched, stats)
    }

    fn cutoff(&self) -> NaiveDateTime {
        let now = self
            .reference_time
            .unwrap_or_else(|| Local::now().naive_local());
        window_cutoff(now, self.window_days)
    }
}

/// 預先轉小寫、去空白的條件；空清單代表不限制
struct CompiledCriteria {
    agencies: Vec<String>,
    activities: Vec<String>,
    keywords: Vec<String>,
    tender_name: Option<String>,
}

impl CompiledCriteria {
    fn new(criteria: &SearchCriteria) -> Self {
        Self {
            agencies: normalize_all(&criteria.agency_names),
            activities: normalize_all(&criteria.activity_names),
            keywords: normalize_all(&criteria.keywords),
            tender_name: criteria
                .tender_name
                .as_deref()
                .map(normalize)
                .filter(|name| !name.is_empty()),
        }
    }

    fn matches(&self, tender: &Tender) -> bool {
        let name = normalize(tender.name_or_empty());
        let agency = normalize(tender.agency_or_empty());
        let activity = normalize(tender.activity_or_empty());

        let agency_ok = any_within(&self.agencies, &agency);
        let activity_ok = any_within(&self.activities, &activity);
        let keyword_ok = self.keywords.is_empty()
            || self.keywords.iter().any(|keyword| {
                name.contains(keyword.as_str())
                    || activity.contains(keyword.as_str())
                    || agency.contains(keyword.as_str())
            });
        let name_ok = self
            .tender_name
            .as_deref()
            .map_or(true, |wanted| name.contains(wanted));

        agency_ok && activity_ok && keyword_ok && name_ok
    }
}

fn any_within(needles: &[String], haystack: &str) -> bool {
    needles.is_empty() || needles.iter().any(|n| haystack.contains(n.as_str()))
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn normalize_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| normalize(v))
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn days_ago(days: i64) -> String {
        (now() - Duration::days(days))
            .format("%Y-%m-%dT%H:%M:%S%.3f")
            .to_string()
    }

    fn tender(id: i64, name: &str, agency: &str, activity: &str, age_days: i64) -> Tender {
        Tender {
            id: Some(crate::domain::model::TenderId::Number(id)),
            name: Some(name.to_string()),
            agency_name: Some(agency.to_string()),
            activity_name: Some(activity.to_string()),
            submission_date: Some(days_ago(age_days)),
            ..Tender::default()
        }
    }

    fn sample() -> Vec<Tender> {
        vec![
            tender(1, "Test Tender for Medical Equipment", "Test Hospital", "Medical Equipment", 1),
            tender(2, "Road Maintenance", "Ministry of Transportation", "Construction & Building", 3),
            tender(3, "School Cleaning Services", "Ministry of Education", "Cleaning", 10),
            tender(4, "Old Hospital Beds", "Ministry of Health", "Medical Equipment", 90),
            tender(5, "Network Upgrade", "Ministry of Health", "IT & Technology Services", 20),
        ]
    }

    fn matcher() -> TenderMatcher {
        TenderMatcher::new(60).with_reference_time(now())
    }

    fn ids(tenders: &[Tender]) -> Vec<String> {
        tenders.iter().map(|t| t.display_id()).collect()
    }

    #[test]
    fn test_empty_criteria_returns_all_recent_in_order() {
        let result = matcher().filter(&sample(), &SearchCriteria::default());
        assert_eq!(ids(&result), vec!["1", "2", "3", "5"]);
    }

    #[test]
    fn test_recency_window_drops_old_tender_regardless_of_match() {
        let tenders = vec![
            tender(1, "Medical Supplies", "Ministry of Health", "Medical Equipment", 5),
            tender(2, "Medical Supplies", "Ministry of Health", "Medical Equipment", 90),
        ];
        let criteria = SearchCriteria::default().with_keywords(["medical"]);

        assert_eq!(ids(&matcher().filter(&tenders, &criteria)), vec!["1"]);
        assert_eq!(
            ids(&matcher().filter(&tenders, &SearchCriteria::default())),
            vec!["1"]
        );
    }

    #[test]
    fn test_keyword_matches_case_insensitively() {
        let criteria = SearchCriteria::default().with_keywords(["medical"]);
        let result = matcher().filter(&sample()[..1], &criteria);
        assert_eq!(ids(&result), vec!["1"]);
    }

    #[test]
    fn test_keyword_searches_agency_and_activity_fields() {
        let criteria = SearchCriteria::default().with_keywords(["TRANSPORTATION", "cleaning"]);
        let result = matcher().filter(&sample(), &criteria);
        assert_eq!(ids(&result), vec!["2", "3"]);
    }

    #[test]
    fn test_agency_activity_or_within_and_across() {
        let criteria = SearchCriteria::default()
            .with_agencies(["ministry of health", "Test Hospital"])
            .with_activities(["medical"]);
        let result = matcher().filter(&sample(), &criteria);
        // 5 是衛生部但活動不符，4 過期
        assert_eq!(ids(&result), vec!["1"]);
    }

    #[test]
    fn test_tender_name_substring() {
        let criteria = SearchCriteria::default().with_tender_name("  road MAINT ");
        assert_eq!(ids(&matcher().filter(&sample(), &criteria)), vec!["2"]);

        let criteria = SearchCriteria::default().with_tender_name("bridge");
        assert!(matcher().filter(&sample(), &criteria).is_empty());
    }

    #[test]
    fn test_missing_field_is_empty_string() {
        let mut no_agency = tender(9, "Medical Gloves", "", "Supplies", 1);
        no_agency.agency_name = None;
        let tenders = vec![no_agency];

        let by_agency = SearchCriteria::default().with_agencies(["health"]);
        assert!(matcher().filter(&tenders, &by_agency).is_empty());

        let by_keyword = SearchCriteria::default().with_keywords(["gloves"]);
        assert_eq!(matcher().filter(&tenders, &by_keyword).len(), 1);
    }

    #[test]
    fn test_unparsable_date_is_excluded() {
        let mut broken = tender(7, "Medical", "Health", "Medical", 1);
        broken.submission_date = Some("yesterday".to_string());
        let mut missing = tender(8, "Medical", "Health", "Medical", 1);
        missing.submission_date = None;

        let (result, stats) =
            matcher().filter_with_stats(&[broken, missing], &SearchCriteria::default());
        assert!(result.is_empty());
        assert_eq!(stats.undated, 2);
    }

    #[test]
    fn test_filter_is_idempotent_and_sound() {
        let criteria = SearchCriteria::default()
            .with_agencies(["ministry"])
            .with_keywords(["services", "road"]);
        let once = matcher().filter(&sample(), &criteria);
        let twice = matcher().filter(&once, &criteria);
        assert_eq!(once, twice);

        for t in &once {
            assert!(t.agency_or_empty().to_lowercase().contains("ministry"));
            let haystack = format!("{} {} {}", t.name_or_empty(), t.agency_or_empty(), t.activity_or_empty())
                .to_lowercase();
            assert!(haystack.contains("services") || haystack.contains("road"));
        }
    }

    #[test]
    fn test_output_is_subsequence_of_input() {
        let input = sample();
        let criteria = SearchCriteria::default().with_agencies(["ministry"]);
        let output = matcher().filter(&input, &criteria);

        let mut cursor = input.iter();
        for item in &output {
            assert!(cursor.any(|candidate| candidate == item));
        }
    }

    #[test]
    fn test_huge_window_keeps_every_dated_tender() {
        let matcher = TenderMatcher::new(1_000_000_000).with_reference_time(now());
        let tenders = sample();
        let dated = tenders
            .iter()
            .filter(|t| t.submission_datetime().is_some())
            .count();
        assert_eq!(matcher.filter(&tenders, &SearchCriteria::default()).len(), dated);

        let unbounded = TenderMatcher::new(i64::MAX);
        assert!(unbounded.filter(&[], &SearchCriteria::default()).is_empty());
        assert_eq!(unbounded.window_days(), i64::MAX);
    }

    #[test]
    fn test_stats_account_for_every_tender() {
        let criteria = SearchCriteria::default().with_keywords(["medical"]);
        let (_, stats) = matcher().filter_with_stats(&sample(), &criteria);
        assert_eq!(stats.examined, 5);
        assert_eq!(stats.stale, 1);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.rejected, 3);
        assert_eq!(
            stats.matched + stats.rejected + stats.stale + stats.undated,
            stats.examined
        );
    }
}
