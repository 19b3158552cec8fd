//! Synchronous listing algorithms
//!
//! These run on the caller's side when no background worker is available, and
//! the background worker runs exactly the same functions. Both paths must give
//! identical results for identical input.

use crate::protocol::{
    Features, ProcessingMetadata, ProcessingOptions, ProcessingResult, Record, SortDirection,
    SortKey, TaskOutput, TaskRequest,
};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Filter, sort and truncate a record set
///
/// Steps, in order: keep records whose transaction type equals
/// `filter_by_type` (if set), stable-sort by price when `sort_by` is price
/// (missing or non-finite price counts as zero), then keep the first `limit`
/// records. Returned records are [`Record::normalized`].
pub fn process_properties(records: &[Record], options: &ProcessingOptions) -> ProcessingResult {
    let mut filtered: Vec<Record> = match options.filter_by_type.as_deref() {
        Some(wanted) => records
            .iter()
            .filter(|record| record.transaction_type.as_deref() == Some(wanted))
            .cloned()
            .map(Record::normalized)
            .collect(),
        None => records.iter().cloned().map(Record::normalized).collect(),
    };
    let filtered_count = filtered.len();

    if options.sort_by == Some(SortKey::Price) {
        match options.direction() {
            SortDirection::Asc => filtered.sort_by(|a, b| compare_prices(a, b)),
            SortDirection::Desc => filtered.sort_by(|a, b| compare_prices(b, a)),
        }
    }

    if let Some(limit) = options.limit {
        filtered.truncate(limit);
    }

    let returned_count = filtered.len();
    ProcessingResult {
        properties: filtered,
        metadata: ProcessingMetadata {
            total_count: records.len(),
            filtered_count,
            returned_count,
        },
    }
}

/// Sort prices are always finite, so this is a total order in which
/// `-0.0` and `0.0` tie
fn compare_prices(a: &Record, b: &Record) -> Ordering {
    a.sort_price()
        .partial_cmp(&b.sort_price())
        .unwrap_or(Ordering::Equal)
}

/// Summarise a record set for building search filters
///
/// Price and area bounds only consider positive values and are zero when
/// none exist. Room counts keep distinct positive values; city and
/// neighborhood keep distinct non-empty names.
pub fn extract_features(records: &[Record]) -> Features {
    let mut prices = Bounds::default();
    let mut areas = Bounds::default();
    let mut bedrooms = BTreeSet::new();
    let mut bathrooms = BTreeSet::new();
    let mut cities = BTreeSet::new();
    let mut neighborhoods = BTreeSet::new();

    for record in records {
        if let Some(price) = record.price {
            prices.observe(price);
        }
        if let Some(area) = record.usable_area {
            areas.observe(area);
        }
        if let Some(count) = record.bedrooms.filter(|count| *count > 0) {
            bedrooms.insert(count);
        }
        if let Some(count) = record.bathrooms.filter(|count| *count > 0) {
            bathrooms.insert(count);
        }
        if let Some(city) = record.city.as_deref().filter(|name| !name.is_empty()) {
            cities.insert(city.to_string());
        }
        if let Some(name) = record.neighborhood.as_deref().filter(|name| !name.is_empty()) {
            neighborhoods.insert(name.to_string());
        }
    }

    let (min_price, max_price) = prices.finish();
    let (min_area, max_area) = areas.finish();

    Features {
        min_price,
        max_price,
        min_area,
        max_area,
        bedrooms: bedrooms.into_iter().collect(),
        bathrooms: bathrooms.into_iter().collect(),
        cities: cities.into_iter().collect(),
        neighborhoods: neighborhoods.into_iter().collect(),
    }
}

/// Run whichever algorithm the request asks for
pub fn execute(request: &TaskRequest) -> TaskOutput {
    match request {
        TaskRequest::ProcessProperties { data, options } => {
            TaskOutput::Processed(process_properties(data, options))
        }
        TaskRequest::ExtractFeatures { data } => TaskOutput::Features(extract_features(data)),
    }
}

/// Running min/max over positive finite values
#[derive(Default)]
struct Bounds {
    range: Option<(f64, f64)>,
}

impl Bounds {
    fn observe(&mut self, value: f64) {
        if !value.is_finite() || value <= 0.0 {
            return;
        }
        self.range = Some(match self.range {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    fn finish(self) -> (f64, f64) {
        self.range.unwrap_or((0.0, 0.0))
    }
}
