//! In-memory store of driver-submitted traffic reports.
//!
//! The store backs the public report feed, the incident count in the
//! conditions snapshot and the "reports today" statistic. Reports older
//! than the retention window are pruned by the background sweep.

use crate::congestion::Severity;
use crate::tracking::VehicleClass;
use lookout_env::{DriverId, ReportId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default page size of the public report feed.
pub const DEFAULT_LIST_LIMIT: usize = 50;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

// ============================================================================
// REPORT TYPES
// ============================================================================

/// Category of a traffic report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Congestion,
    Accident,
    Hazard,
    Construction,
    Weather,
    /// Any category the client invents; kept verbatim
    Other(String),
}

impl ReportType {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "congestion" => ReportType::Congestion,
            "accident" => ReportType::Accident,
            "hazard" => ReportType::Hazard,
            "construction" => ReportType::Construction,
            "weather" => ReportType::Weather,
            _ => ReportType::Other(label.trim().to_string()),
        }
    }
    
    pub fn as_str(&self) -> &str {
        match self {
            ReportType::Congestion => "congestion",
            ReportType::Accident => "accident",
            ReportType::Hazard => "hazard",
            ReportType::Construction => "construction",
            ReportType::Weather => "weather",
            ReportType::Other(label) => label,
        }
    }
    
    /// Severity of the congestion zone this report creates, if any.
    ///
    /// Only accidents and congestion affect routing.
    pub fn zone_severity(&self) -> Option<Severity> {
        match self {
            ReportType::Accident => Some(Severity::High),
            ReportType::Congestion => Some(Severity::Moderate),
            _ => None,
        }
    }
}

/// Lifecycle state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Active,
}

/// A stored traffic report, including the reporter's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReport {
    pub id: ReportId,
    
    /// Reporter (never exposed through the public feed)
    pub driver_id: DriverId,
    
    pub report_type: ReportType,
    
    pub location: String,
    
    pub description: String,
    
    pub lat: f64,
    
    pub lng: f64,
    
    /// Vehicle class of the reporter at submission time
    pub vehicle_class: VehicleClass,
    
    pub proof_text: Option<String>,
    
    /// Whether a proof image accompanied the report (bytes are not kept)
    pub has_proof_image: bool,
    
    pub timestamp: SystemTime,
    
    pub status: ReportStatus,
    
    /// Trust weight in [0.2, 1.0]; emergency reporters always get 1.0
    pub verification_score: f64,
}

/// Public view of a report, without the reporter's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicReport {
    pub id: ReportId,
    pub report_type: ReportType,
    pub location: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub vehicle_class: VehicleClass,
    pub timestamp: SystemTime,
    pub verification_score: f64,
    pub is_emergency_report: bool,
}

impl From<&TrafficReport> for PublicReport {
    fn from(report: &TrafficReport) -> Self {
        Self {
            id: report.id,
            report_type: report.report_type.clone(),
            location: report.location.clone(),
            description: report.description.clone(),
            lat: report.lat,
            lng: report.lng,
            vehicle_class: report.vehicle_class,
            timestamp: report.timestamp,
            verification_score: report.verification_score,
            is_emergency_report: report.vehicle_class.is_emergency(),
        }
    }
}

// ============================================================================
// REPORT STORE
// ============================================================================

/// Append-mostly list of reports behind its own lock, independent of the
/// congestion model and the route cache.
#[derive(Debug, Default)]
pub struct ReportStore {
    reports: RwLock<Vec<TrafficReport>>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn push(&self, report: TrafficReport) {
        self.reports.write().push(report);
    }
    
    /// Newest-first page of active reports, optionally filtered by type.
    ///
    /// The limit is applied before the type filter, so a filtered page may
    /// hold fewer than `limit` entries even when more matches exist.
    pub fn list(&self, limit: usize, report_type: Option<&ReportType>) -> Vec<PublicReport> {
        let reports = self.reports.read();
        
        let mut active: Vec<&TrafficReport> = reports
            .iter()
            .filter(|report| report.status == ReportStatus::Active)
            .collect();
        active.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        
        active
            .into_iter()
            .take(limit)
            .filter(|report| report_type.map_or(true, |wanted| &report.report_type == wanted))
            .map(PublicReport::from)
            .collect()
    }
    
    pub fn total_active(&self) -> usize {
        self.reports
            .read()
            .iter()
            .filter(|report| report.status == ReportStatus::Active)
            .count()
    }
    
    /// Reports stamped strictly less than `window` before `now`.
    pub fn count_within(&self, now: SystemTime, window: Duration) -> usize {
        self.reports
            .read()
            .iter()
            .filter(|report| age(now, report.timestamp) < window)
            .count()
    }
    
    /// Reports stamped on the same UTC calendar day as `now`.
    pub fn count_on_day(&self, now: SystemTime) -> usize {
        let today = utc_day(now);
        self.reports
            .read()
            .iter()
            .filter(|report| utc_day(report.timestamp) == today)
            .count()
    }
    
    /// Drop reports older than `retention`. Returns how many were removed.
    pub fn prune_older_than(&self, now: SystemTime, retention: Duration) -> usize {
        let mut reports = self.reports.write();
        let before = reports.len();
        reports.retain(|report| age(now, report.timestamp) <= retention);
        before - reports.len()
    }
    
    pub fn len(&self) -> usize {
        self.reports.read().len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

fn age(now: SystemTime, then: SystemTime) -> Duration {
    now.duration_since(then).unwrap_or(Duration::ZERO)
}

fn utc_day(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_secs() / SECS_PER_DAY)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    
    const MINUTE: Duration = Duration::from_secs(60);
    
    fn t0() -> SystemTime {
        // 2024-01-01T12:00:00Z
        UNIX_EPOCH + Duration::from_secs(1_704_067_200 + 12 * 3600)
    }
    
    fn report(seed: u64, report_type: ReportType, timestamp: SystemTime) -> TrafficReport {
        TrafficReport {
            id: ReportId::from_seed(seed),
            driver_id: DriverId::from_seed(seed),
            report_type,
            location: format!("Spot {}", seed),
            description: "Stopped traffic".to_string(),
            lat: 37.7749,
            lng: -122.4194,
            vehicle_class: VehicleClass::Regular,
            proof_text: None,
            has_proof_image: false,
            timestamp,
            status: ReportStatus::Active,
            verification_score: 0.5,
        }
    }
    
    #[test]
    fn test_report_type_labels() {
        assert_eq!(ReportType::from_label("Accident"), ReportType::Accident);
        assert_eq!(ReportType::from_label("weather"), ReportType::Weather);
        assert_eq!(ReportType::from_label("pothole"), ReportType::Other("pothole".to_string()));
        assert_eq!(ReportType::Other("pothole".to_string()).as_str(), "pothole");
    }
    
    #[test]
    fn test_zone_severity_mapping() {
        assert_eq!(ReportType::Accident.zone_severity(), Some(Severity::High));
        assert_eq!(ReportType::Congestion.zone_severity(), Some(Severity::Moderate));
        assert_eq!(ReportType::Hazard.zone_severity(), None);
        assert_eq!(ReportType::Construction.zone_severity(), None);
        assert_eq!(ReportType::Other("x".into()).zone_severity(), None);
    }
    
    #[test]
    fn test_list_newest_first_and_limited() {
        let store = ReportStore::new();
        for i in 0..5 {
            store.push(report(i, ReportType::Hazard, t0() + MINUTE * i as u32));
        }
        
        let page = store.list(3, None);
        let ids: Vec<ReportId> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ReportId::from_seed(4), ReportId::from_seed(3), ReportId::from_seed(2)]);
        assert_eq!(store.total_active(), 5);
    }
    
    #[test]
    fn test_list_limit_applies_before_type_filter() {
        let store = ReportStore::new();
        store.push(report(1, ReportType::Accident, t0()));
        store.push(report(2, ReportType::Hazard, t0() + MINUTE));
        store.push(report(3, ReportType::Hazard, t0() + 2 * MINUTE));
        
        // Newest two are hazards, so the accident falls outside the page
        assert!(store.list(2, Some(&ReportType::Accident)).is_empty());
        assert_eq!(store.list(DEFAULT_LIST_LIMIT, Some(&ReportType::Accident)).len(), 1);
    }
    
    #[test]
    fn test_public_report_marks_emergency() {
        let mut stored = report(1, ReportType::Accident, t0());
        stored.vehicle_class = VehicleClass::Emergency;
        
        let public = PublicReport::from(&stored);
        assert!(public.is_emergency_report);
        
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("driver_id").is_none());
        assert_eq!(json["report_type"], "accident");
    }
    
    #[test]
    fn test_count_within_window() {
        let store = ReportStore::new();
        store.push(report(1, ReportType::Accident, t0()));
        store.push(report(2, ReportType::Hazard, t0() + 10 * MINUTE));
        store.push(report(3, ReportType::Hazard, t0() + 35 * MINUTE));
        
        let now = t0() + 40 * MINUTE;
        assert_eq!(store.count_within(now, 30 * MINUTE), 2);
        assert_eq!(store.count_within(now, 5 * MINUTE), 1);
    }
    
    #[test]
    fn test_count_on_day() {
        let store = ReportStore::new();
        store.push(report(1, ReportType::Accident, t0()));
        store.push(report(2, ReportType::Hazard, t0() - Duration::from_secs(13 * 3600)));
        store.push(report(3, ReportType::Hazard, t0() + Duration::from_secs(11 * 3600)));
        
        assert_eq!(store.count_on_day(t0()), 2);
    }
    
    #[test]
    fn test_prune_older_than() {
        let store = ReportStore::new();
        let retention = Duration::from_secs(24 * 3600);
        store.push(report(1, ReportType::Accident, t0()));
        store.push(report(2, ReportType::Hazard, t0() + Duration::from_secs(3600)));
        
        let now = t0() + retention + MINUTE;
        assert_eq!(store.prune_older_than(now, retention), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.prune_older_than(now, retention), 0);
    }
}
