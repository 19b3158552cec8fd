//! Property record shapes shared by the dispatcher and the background worker
//!
//! Records arrive from the CMS with Portuguese keys. The Rust side uses English
//! names and maps them back with serde renames, so a CMS export decodes as-is.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Transaction-type tag used by the CMS for properties on sale
pub const TRANSACTION_SALE: &str = "Venda";
/// Transaction-type tag used by the CMS for rentals
pub const TRANSACTION_RENT: &str = "Aluguel";

/// A single property listing as supplied by the CMS
///
/// Every field is optional. Fields the dispatcher does not read are kept in
/// `extra` so a record leaves the dispatcher as it entered, apart from
/// non-finite numbers (see [`Record::normalized`]).
///
/// # Examples
/// ```
/// use property_offload::protocol::Record;
///
/// let record = Record::new()
///     .with_price(350_000.0)
///     .with_transaction_type("Venda")
///     .with_location("Ribeirão Preto", "Jardim Botânico");
///
/// assert_eq!(record.price, Some(350_000.0));
/// assert_eq!(record.city.as_deref(), Some("Ribeirão Preto"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "titulo", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "preco", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "areaUtil", default, skip_serializing_if = "Option::is_none")]
    pub usable_area: Option<f64>,
    #[serde(rename = "dormitorios", default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i64>,
    #[serde(rename = "banheiros", default, skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<i64>,
    #[serde(rename = "vagas", default, skip_serializing_if = "Option::is_none")]
    pub parking_spots: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// "Venda" or "Aluguel" in practice, but not restricted
    #[serde(rename = "finalidade", default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
    #[serde(rename = "cidade", default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "bairro", default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    /// CMS fields not interpreted here (slug, images, gallery, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_usable_area(mut self, area: f64) -> Self {
        self.usable_area = Some(area);
        self
    }

    pub fn with_rooms(mut self, bedrooms: i64, bathrooms: i64) -> Self {
        self.bedrooms = Some(bedrooms);
        self.bathrooms = Some(bathrooms);
        self
    }

    pub fn with_transaction_type<S: Into<String>>(mut self, transaction_type: S) -> Self {
        self.transaction_type = Some(transaction_type.into());
        self
    }

    pub fn with_location<C: Into<String>, N: Into<String>>(mut self, city: C, neighborhood: N) -> Self {
        self.city = Some(city.into());
        self.neighborhood = Some(neighborhood.into());
        self
    }

    /// Price used for ordering; a missing or non-finite price sorts as zero
    pub fn sort_price(&self) -> f64 {
        self.price.filter(|price| price.is_finite()).unwrap_or(0.0)
    }

    /// Clear numeric fields JSON cannot carry
    ///
    /// NaN and infinities serialize as `null`, so a worker never sees them.
    /// Results on both paths drop them the same way.
    pub fn normalized(mut self) -> Self {
        self.price = self.price.filter(|price| price.is_finite());
        self.usable_area = self.usable_area.filter(|area| area.is_finite());
        self
    }
}

/// Key a result set can be ordered by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Price,
    /// Any key the processor does not know; order is left untouched
    #[serde(other)]
    Unsupported,
}

impl SortKey {
    /// Read a key with the same exact, case-sensitive rule as the wire format
    pub fn from_name(name: &str) -> Self {
        serde_json::from_value(Value::String(name.to_string())).unwrap_or(SortKey::Unsupported)
    }
}

/// Direction for [`SortKey`] ordering
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Options for a `process-properties` task
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    /// Keep only records whose transaction type equals this value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_by_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortKey>,
    /// Defaults to descending when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<SortDirection>,
    /// Cap applied after filtering and sorting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ProcessingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_by_type<S: Into<String>>(mut self, transaction_type: S) -> Self {
        self.filter_by_type = Some(transaction_type.into());
        self
    }

    pub fn sort_by_price(mut self, direction: SortDirection) -> Self {
        self.sort_by = Some(SortKey::Price);
        self.sort_direction = Some(direction);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Effective direction, falling back to descending
    pub fn direction(&self) -> SortDirection {
        self.sort_direction.unwrap_or_default()
    }
}

/// Counts describing how a result set was derived from its input
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingMetadata {
    pub total_count: usize,
    pub filtered_count: usize,
    pub returned_count: usize,
}

/// Output of a `process-properties` task
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingResult {
    pub properties: Vec<Record>,
    pub metadata: ProcessingMetadata,
}

/// Aggregate summary of a record set, used to build search filters
///
/// An empty input yields zeroed bounds and empty sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub min_price: f64,
    pub max_price: f64,
    pub min_area: f64,
    pub max_area: f64,
    /// Distinct positive bedroom counts, ascending
    pub bedrooms: Vec<i64>,
    /// Distinct positive bathroom counts, ascending
    pub bathrooms: Vec<i64>,
    /// Distinct non-empty city names, sorted
    pub cities: Vec<String>,
    /// Distinct non-empty neighborhood names, sorted
    pub neighborhoods: Vec<String>,
}
