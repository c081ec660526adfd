//! The single-pass aggregation over a batch of run records.

use std::collections::{HashMap, hash_map::Entry};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::tracestore::{RunRecord, normalize_user_id};

use super::{MetricsAccumulator, cost_per_token};

/// Aggregate a record batch into metrics, evaluated against the current time.
pub fn aggregate(records: &[RunRecord]) -> MetricsAccumulator {
    aggregate_at(records, Utc::now())
}

/// Aggregate against an explicit "now", which anchors the 24-hour and 7-day
/// engagement windows.
///
/// Each record is processed independently; a malformed record is logged and
/// skipped without aborting the batch. Mutations applied before the record's
/// failing step are kept, so a record can contribute to early metrics and
/// still be absent from later ones.
pub fn aggregate_at(records: &[RunRecord], now: DateTime<Utc>) -> MetricsAccumulator {
    let mut acc = MetricsAccumulator::default();
    let mut first_seen: HashMap<String, DateTime<Utc>> = HashMap::new();

    for record in records {
        if let Err(e) = process_record(&mut acc, &mut first_seen, record, now) {
            warn!("Error processing run: {e:#}");
        }
    }

    acc.engagement.total_unique_users = acc.unique_users.len() as u64;
    acc.engagement.active_users = acc.engagement.users_7d.len() as u64;

    let non_zero: Vec<u64> = acc
        .query_metrics
        .query_lengths
        .iter()
        .copied()
        .filter(|&l| l > 0)
        .collect();
    if !non_zero.is_empty() {
        acc.query_metrics.avg_query_length =
            non_zero.iter().sum::<u64>() as f64 / non_zero.len() as f64;
    }

    acc
}

fn process_record(
    acc: &mut MetricsAccumulator,
    first_seen: &mut HashMap<String, DateTime<Utc>>,
    record: &RunRecord,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    // Identity extraction: metadata first, inputs.user_profile as fallback.
    let metadata = record.metadata();
    let mut user_id = metadata
        .and_then(|m| m.user_id.as_ref())
        .and_then(normalize_user_id);
    let mut company = metadata.and_then(|m| m.company.clone());
    let model = metadata.and_then(|m| m.ls_model_name.clone());

    // Model usage, tokens, and cost.
    if let Some(model) = &model {
        *acc.models.entry(model.clone()).or_default() += 1;

        if let Some(usage) = metadata.and_then(|m| m.token_usage.as_ref()) {
            let total_tokens = usage.total();
            *acc.model_metrics
                .token_usage_by_model
                .entry(model.clone())
                .or_default() += total_tokens;
            *acc.model_metrics
                .cost_by_model
                .entry(model.clone())
                .or_default() += total_tokens as f64 * cost_per_token(model);
        }
    }

    if user_id.is_none() {
        if let Some(profile) = record.inputs.as_ref().and_then(|i| i.user_profile.as_ref()) {
            user_id = profile.user_id.as_ref().and_then(normalize_user_id);
            if company.is_none() {
                company = profile.company.clone();
            }
        }
    }

    // Engagement.
    if let Some(user_id) = &user_id {
        acc.unique_users.insert(user_id.clone());

        if let Some(raw_start) = &record.start_time {
            let start = raw_start
                .to_utc()
                .context("invalid start_time in engagement tracking")?;

            if start >= now - Duration::days(1) {
                acc.engagement.users_24h.insert(user_id.clone());
            }
            if start >= now - Duration::days(7) {
                acc.engagement.users_7d.insert(user_id.clone());
            }

            match first_seen.entry(user_id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(start);
                    acc.engagement.new_users.insert(user_id.clone());
                }
                Entry::Occupied(slot) if start > *slot.get() => {
                    acc.engagement.returning_users.insert(user_id.clone());
                }
                Entry::Occupied(_) => {}
            }
        }

        *acc.engagement
            .sessions_by_user
            .entry(user_id.clone())
            .or_default() += 1;
    }

    // Company normalization: a name containing "atlantiq" in any casing is
    // canonicalized to the brand spelling.
    if let Some(company) = &company {
        let mut name = company.trim().to_string();
        if name.to_lowercase().contains("atlantiq") {
            name = "Atlantiq AI".to_string();
        }
        acc.companies.insert(name);
    }

    // Temporal distribution and latency.
    if let Some(raw_start) = &record.start_time {
        let start = raw_start
            .to_utc()
            .context("invalid start_time in temporal metrics")?;

        let hour = start.format("%H:00").to_string();
        let weekday = start.format("%A").to_string();
        *acc.time_metrics.peak_hours.entry(hour).or_default() += 1;
        *acc.time_metrics
            .weekday_distribution
            .entry(weekday)
            .or_default() += 1;

        if let Some(raw_end) = &record.end_time {
            let end = raw_end.to_utc().context("invalid end_time")?;
            let duration = (end - start).num_milliseconds() as f64 / 1000.0;
            acc.total_duration += duration;

            if let Some(model) = &model {
                acc.time_metrics
                    .avg_response_time_by_model
                    .entry(model.clone())
                    .or_default()
                    .push(duration);
                acc.model_metrics
                    .model_latencies
                    .entry(model.clone())
                    .or_default()
                    .push(duration);
            }
        }
    }

    // Query metrics.
    if let Some(query) = record.inputs.as_ref().and_then(|i| i.query()) {
        let length = query.chars().count() as u64;
        acc.query_metrics.query_lengths.push(length);

        let complexity = if length < 100 {
            "short"
        } else if length < 500 {
            "medium"
        } else {
            "long"
        };
        *acc.query_metrics
            .query_complexity
            .entry(complexity.to_string())
            .or_default() += 1;

        let bucket = length / 100 * 100;
        let tally = acc.query_metrics.success_by_length.entry(bucket).or_default();
        tally.total += 1;
        if !record.has_error() {
            tally.success += 1;
        }
    }

    // Errors.
    if record.has_error() {
        acc.error_count += 1;
        if let Some(model) = &model {
            acc.model_metrics
                .model_error_rates
                .entry(model.clone())
                .or_default()
                .errors += 1;
        }
    }
    if let Some(model) = &model {
        acc.model_metrics
            .model_error_rates
            .entry(model.clone())
            .or_default()
            .total += 1;
    }

    Ok(())
}
