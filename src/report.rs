use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::AnalyticsSnapshot;
use crate::trends::TimeRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total_producers: usize,
    pub total_consumers: usize,
    pub last_updated: String,
}

/// Downloadable bundle of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_date: String,
    pub time_range: TimeRange,
    pub analytics: AnalyticsSnapshot,
    pub summary: ExportSummary,
}

pub fn export_document(
    snapshot: &AnalyticsSnapshot,
    range: TimeRange,
    now: DateTime<Utc>,
) -> ExportDocument {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    ExportDocument {
        export_date: stamp.clone(),
        time_range: range,
        analytics: snapshot.clone(),
        summary: ExportSummary {
            total_producers: snapshot.overview.active_producers,
            total_consumers: snapshot.overview.active_consumers,
            last_updated: stamp,
        },
    }
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("carbon-analytics-{}.json", now.format("%Y-%m-%d"))
}

pub fn build_report(snapshot: &AnalyticsSnapshot, range: TimeRange) -> String {
    let mut output = String::new();
    let overview = &snapshot.overview;
    let matches = &snapshot.matches;

    let _ = writeln!(output, "# Carbon Marketplace Analytics");
    let _ = writeln!(
        output,
        "Window: last {} ({} producers, {} consumers)",
        range, overview.active_producers, overview.active_consumers
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overview");
    let _ = writeln!(output, "- Estimated matches: {}", overview.total_matches);
    let _ = writeln!(output, "- Carbon efficiency: {}%", overview.carbon_saved);
    let _ = writeln!(
        output,
        "- Supply {:.1} t/week vs demand {:.1} t/week",
        overview.total_supply, overview.total_demand
    );
    let _ = writeln!(output, "- Estimated revenue: ${}", overview.revenue_generated);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trends");
    for bucket in &overview.trends {
        let _ = writeln!(
            output,
            "- {}: {} matches, {}% carbon, ${}",
            bucket.period_label, bucket.matches, bucket.carbon_pct, bucket.revenue
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Matches");
    let _ = writeln!(
        output,
        "Success rate {}%, capacity utilization {}%, average distance {} km",
        matches.success_rate, matches.capacity_utilization, matches.avg_distance
    );

    if matches.top_industries.is_empty() {
        let _ = writeln!(output, "No producers registered.");
    } else {
        for industry in &matches.top_industries {
            let _ = writeln!(
                output,
                "- {}: {} producers ({}%)",
                industry.name, industry.count, industry.percentage
            );
        }
    }

    if !matches.transport_methods.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Transport");
        for method in &matches.transport_methods {
            let _ = writeln!(output, "- {}: {}", method.method, method.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Geography");
    if snapshot.geography.top_states.is_empty() {
        let _ = writeln!(output, "No located participants.");
    } else {
        for region in &snapshot.geography.top_states {
            let _ = writeln!(output, "- {}: {}", region.label, region.count);
        }
    }

    let vectors = &snapshot.vectors;
    let _ = writeln!(output);
    let _ = writeln!(output, "## Vector System");
    let _ = writeln!(
        output,
        "Health {}%, match quality {}%, algorithm efficiency {}% across {} vectors",
        vectors.system_health, vectors.match_quality, vectors.algorithm_efficiency, vectors.total_vectors
    );
    for (factor, weight) in &vectors.weight_distribution {
        let _ = writeln!(output, "- {}: {:.2}", factor, weight);
    }

    output
}
