//! Table rendering for command output.
//!
//! Unique responsibility: turn the client's response types into
//! human-readable tables. Every function here is pure; printing is the
//! binary's job, so the library never touches stdout.

use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::runpod_client::{PodStatusUpdate, PodSummary};

#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Cloud")]
    cloud: String,
    #[tabled(rename = "Type")]
    instance_type: String,
    #[tabled(rename = "GPU")]
    gpu: String,
    #[tabled(rename = "Count")]
    count: String,
    #[tabled(rename = "$/hr")]
    cost: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&PodSummary> for PodRow {
    fn from(pod: &PodSummary) -> Self {
        let machine = pod.machine.as_ref();
        Self {
            id: pod.id.clone(),
            name: pod.name.clone().unwrap_or_else(|| "-".to_string()),
            cloud: match machine.and_then(|m| m.secureCloud) {
                Some(true) => "SECURE".to_string(),
                Some(false) => "COMMUNITY".to_string(),
                None => "-".to_string(),
            },
            // The API spells spot capacity "INTERRUPTABLE".
            instance_type: if pod.podType.as_deref() == Some("INTERRUPTABLE") {
                "SPOT".to_string()
            } else {
                "ON_DEMAND".to_string()
            },
            gpu: machine
                .and_then(|m| m.gpuDisplayName.clone())
                .unwrap_or_else(|| "-".to_string()),
            count: pod
                .gpuCount
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
            cost: pod
                .costPerHr
                .map_or_else(|| "-".to_string(), |c| format!("${c:.2}/hr")),
            status: pod.desiredStatus.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Render pods as a table. An empty slice still renders the header row.
#[must_use]
pub fn pod_table(pods: &[PodSummary]) -> String {
    let rows: Vec<PodRow> = pods.iter().map(PodRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.to_string()
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Render the result of a stop/start transition as a one-row table.
#[must_use]
pub fn status_table(update: &PodStatusUpdate) -> String {
    let row = StatusRow {
        id: update.id.clone(),
        status: update
            .desiredStatus
            .clone()
            .unwrap_or_else(|| "-".to_string()),
    };
    let mut table = Table::new(vec![row]);
    table.with(Style::modern());
    table.to_string()
}

/// Confirmation line for a terminated pod; the mutation returns no object.
#[must_use]
pub fn terminated_message(pod_id: &str) -> String {
    format!("Terminated pod {pod_id}")
}
