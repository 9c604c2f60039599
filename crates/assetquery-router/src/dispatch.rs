//! Intent dispatch: turns a resolved [`IntentKind`] plus extracted filters into store reads.
//!
//! The four analytic intents compute aggregates directly; every other mapped intent becomes a
//! projection of the fields its mapping row names, narrowed by IP address and publication year.

use crate::metrics::{DISPATCH_SECONDS, REQUESTS_TOTAL};
use assetquery_core::intent::round2;
use assetquery_core::{FilterSet, IntentKind, Map, MappingRow, QueryError, Result, Value};
use assetquery_storage::{DocumentStore, Filter, Projection};
use std::collections::HashSet;

pub const MAC_ADDRESS_FIELD: &str = "MAC Address";
pub const LAB_NAME_FIELD: &str = "Lab name";
pub const SOLUTION_FIELD: &str = "Solution";
pub const IP_ADDRESS_FIELD: &str = "IP Address";
pub const PUBLICATION_DATE_FIELD: &str = "Vuln Publication Date";
pub const SEVERITY_FIELD: &str = "Severity";

/// Severity buckets, in the order they are reported.
pub const SEVERITIES: [&str; 4] = ["Critical", "High", "Medium", "Low"];

// Generic intents narrow by year on whichever of their fields contains this (case-insensitive).
const PUBLICATION_DATE_MARKER: &str = "vuln publication date";

/// Runs the strategy for `kind`. An unmapped intent comes back as [`QueryError::MappingMiss`],
/// which callers report in-band rather than as a failure.
pub async fn dispatch(
    kind: &IntentKind<'_>,
    filters: &FilterSet,
    store: &dyn DocumentStore,
) -> Result<Value> {
    REQUESTS_TOTAL.with_label_values(&[kind.name()]).inc();
    let _timer = DISPATCH_SECONDS
        .with_label_values(&[kind.name()])
        .start_timer();
    tracing::debug!(intent_kind = kind.name(), "dispatching");
    match kind {
        IntentKind::AssetCount => asset_count(store).await,
        IntentKind::VulnerabilityLabname => vulnerabilities_by_lab(store).await,
        IntentKind::NotPatchable => not_patchable(store).await,
        IntentKind::CountVulnerabilities => count_vulnerabilities(filters, store).await,
        IntentKind::Generic(row) => generic(row, filters, store).await,
        IntentKind::Unmapped(label) => {
            tracing::warn!(intent = %label, "no mapping row for predicted intent");
            Err(QueryError::MappingMiss {
                intent: label.to_string(),
            })
        }
    }
}

fn lowercase_mac(doc: &Map) -> Option<String> {
    doc.get(MAC_ADDRESS_FIELD)
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_lowercase)
}

fn single(key: &str, value: impl Into<Value>) -> Value {
    let mut m = Map::new();
    m.insert(key.to_string(), value.into());
    Value::Map(m)
}

async fn asset_count(store: &dyn DocumentStore) -> Result<Value> {
    let macs: HashSet<String> = store.scan().await?.iter().filter_map(lowercase_mac).collect();
    Ok(single("unique_mac_count", macs.len() as u64))
}

async fn vulnerabilities_by_lab(store: &dyn DocumentStore) -> Result<Value> {
    let mut labs = Map::new();
    for group in store.group_count(LAB_NAME_FIELD).await? {
        if group.key.is_blank() {
            continue;
        }
        // "5" and 5 are separate groups in the store but share a key here
        let count = i64::try_from(group.count).unwrap_or(i64::MAX);
        match labs.entry(group.key.key_text()).or_insert(Value::Int(0)) {
            Value::Int(n) => *n = n.saturating_add(count),
            other => *other = Value::Int(count),
        }
    }
    Ok(Value::Map(labs))
}

async fn not_patchable(store: &dyn DocumentStore) -> Result<Value> {
    let count = store.count(&Filter::new().blank(SOLUTION_FIELD)).await?;
    Ok(single("not_patchable_count", count))
}

async fn count_vulnerabilities(filters: &FilterSet, store: &dyn DocumentStore) -> Result<Value> {
    let mut filter = Filter::new();
    if let Some(year) = filters.year() {
        filter = filter.matches(PUBLICATION_DATE_FIELD, year);
    }
    if let Some(ip) = filters.ip_address() {
        filter = filter.equals(IP_ADDRESS_FIELD, ip);
    }
    let projection = Projection::include([MAC_ADDRESS_FIELD, SEVERITY_FIELD]);

    let mut buckets = [0u64; 4];
    let mut all_macs = HashSet::new();
    let mut vuln_macs = HashSet::new();
    for doc in store.find(&filter, &projection).await? {
        let Some(mac) = lowercase_mac(&doc) else {
            continue;
        };
        let severity = doc.get(SEVERITY_FIELD).and_then(Value::as_str);
        if let Some(i) = severity.and_then(|s| SEVERITIES.iter().position(|b| *b == s)) {
            buckets[i] += 1;
            vuln_macs.insert(mac.clone());
        }
        all_macs.insert(mac);
    }

    let mut breakdown = Map::new();
    for (name, n) in SEVERITIES.iter().zip(buckets) {
        breakdown.insert(name.to_string(), Value::from(n));
    }
    let percentage = if all_macs.is_empty() {
        Value::Int(0)
    } else {
        Value::Float(round2(
            vuln_macs.len() as f64 / all_macs.len() as f64 * 100.0,
        ))
    };

    let mut out = Map::new();
    out.insert("severity_breakdown".into(), Value::Map(breakdown));
    out.insert("affected_mac_percentage".into(), percentage);
    Ok(Value::Map(out))
}

async fn generic(row: &MappingRow, filters: &FilterSet, store: &dyn DocumentStore) -> Result<Value> {
    let projection = Projection::include(row.entities.iter().cloned()).without_id();
    let mut filter = Filter::new();
    if let Some(ip) = filters.ip_address() {
        filter = filter.equals(IP_ADDRESS_FIELD, ip);
    }
    if let Some(year) = filters.year() {
        let date_field = row
            .entities
            .iter()
            .find(|e| e.to_lowercase().contains(PUBLICATION_DATE_MARKER));
        if let Some(field) = date_field {
            filter = filter.matches(field.as_str(), year);
        }
    }
    tracing::debug!(intent = %row.intent, ?filter, "generic lookup");
    let docs = store.find(&filter, &projection).await?;
    Ok(Value::Array(docs.into_iter().map(Value::Map).collect()))
}
