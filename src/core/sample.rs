use crate::domain::model::{Tender, TenderId};
use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;

pub const SAMPLE_PAGE_SIZE: u32 = 24;

const ACTIVITIES: [&str; 8] = [
    "Construction & Building",
    "IT & Technology Services",
    "Healthcare & Medical",
    "Education & Training",
    "Transportation & Logistics",
    "Financial Services",
    "Environmental Services",
    "Security & Safety",
];

const AGENCIES: [&str; 8] = [
    "Ministry of Health",
    "Ministry of Education",
    "Ministry of Transportation",
    "Ministry of Finance",
    "Ministry of Interior",
    "Ministry of Defense",
    "Ministry of Environment",
    "Ministry of Energy",
];

/// 產生一頁示範用的標案，只在降級模式下使用
pub fn sample_tenders_at(page_number: u32, now: NaiveDateTime) -> Vec<Tender> {
    let page = page_number.max(1);
    (0..SAMPLE_PAGE_SIZE)
        .map(|i| {
            let slot = i as usize;
            let serial = (page - 1) * SAMPLE_PAGE_SIZE + i + 1;
            let tender_id = format!("{:06}", serial);
            let submitted = now - Duration::days(i64::from(i % 7));

            let mut extra = HashMap::new();
            extra.insert("synthetic".to_string(), serde_json::Value::Bool(true));

            Tender {
                id: Some(TenderId::Text(tender_id.clone())),
                name: Some(format!("Sample Tender {} - Page {}", tender_id, page)),
                agency_name: Some(AGENCIES[slot % AGENCIES.len()].to_string()),
                activity_name: Some(ACTIVITIES[slot % ACTIVITIES.len()].to_string()),
                submission_date: Some(submitted.format("%Y-%m-%dT%H:%M:%S").to_string()),
                last_enquiries_date: None,
                last_offer_presentation_date: None,
                reference_number: Some(format!("SAMPLE-{}", tender_id)),
                detail_url_token: None,
                extra,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_sample_page_shape() {
        let now = NaiveDate::from_ymd_opt(2025, 9, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let tenders = sample_tenders_at(2, now);

        assert_eq!(tenders.len(), 24);
        assert_eq!(tenders[0].display_id(), "000025");
        assert_eq!(tenders[0].agency_or_empty(), "Ministry of Health");
        assert_eq!(tenders[9].activity_or_empty(), "IT & Technology Services");
        assert!(tenders
            .iter()
            .all(|t| t.submission_datetime().unwrap() > now - Duration::days(7)));
        assert!(tenders.iter().all(|t| t.extra.contains_key("synthetic")));
    }
}
