//! Risk mapping, clustering and alerting

pub mod alert;
pub mod cluster;
pub mod mapping;

pub use alert::{
    format_alert_message, AlertConfig, AlertDispatcher, AlertOutcome, OutboxEntry, SmsComposer,
    SMS_MAX_CHARS,
};
pub use cluster::{find_alert_clusters, AlertCluster};
pub use mapping::{fos_to_risk, top_hotspots, Hotspot, RiskCurve, RiskSummary};
