use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::errors::GenerationError;

pub const DEFAULT_MIN_SIZE: usize = 1;
pub const DEFAULT_MAX_SIZE: usize = 5;
pub const DEFAULT_INT_MIN: i64 = 0;
pub const DEFAULT_INT_MAX: i64 = 10000;
pub const DEFAULT_FLOAT_MIN: f64 = 0.0;
pub const DEFAULT_FLOAT_MAX: f64 = 10000.0;
pub const DEFAULT_MIN_LEN: usize = 1;
pub const DEFAULT_MAX_LEN: usize = 16;
pub const DEFAULT_MAX_REPEAT: u32 = 32;
pub const DEFAULT_CHARSET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Which value a generator picks within its configured bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    Min,
    Max,
    #[default]
    Random,
    Null,
}

impl SelectionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "min" | "minimum" => Some(SelectionMode::Min),
            "max" | "maximum" => Some(SelectionMode::Max),
            "random" => Some(SelectionMode::Random),
            "null" => Some(SelectionMode::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Min => "min",
            SelectionMode::Max => "max",
            SelectionMode::Random => "random",
            SelectionMode::Null => "null",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `min` / `max` bound. The field's declared type decides which flavour
/// is acceptable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Bound {
    fn kind(&self) -> &'static str {
        match self {
            Bound::Int(_) => "int",
            Bound::Float(_) => "float",
            Bound::Date(_) => "date",
            Bound::Timestamp(_) => "timestamp",
        }
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::Int(value)
    }
}

impl From<f64> for Bound {
    fn from(value: f64) -> Self {
        Bound::Float(value)
    }
}

impl From<NaiveDate> for Bound {
    fn from(value: NaiveDate) -> Self {
        Bound::Date(value)
    }
}

impl From<NaiveDateTime> for Bound {
    fn from(value: NaiveDateTime) -> Self {
        Bound::Timestamp(value)
    }
}

/// One layer of configuration. Every attribute is optional; an unset
/// attribute falls through to lower layers when merging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub charset: Option<String>,
    pub pattern: Option<String>,
    pub max_repeat: Option<u32>,
    pub scale: Option<u32>,
    pub values: Option<Vec<String>>,
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub selection: Option<SelectionMode>,
    pub size_selection: Option<SelectionMode>,
    pub generator: Option<String>,
    pub params: BTreeMap<String, JsonValue>,
}

fn take<T: Clone>(low: &mut Option<T>, high: &Option<T>) {
    if let Some(value) = high {
        *low = Some(value.clone());
    }
}

fn differs<T: PartialEq>(left: &Option<T>, right: &Option<T>) -> bool {
    matches!((left, right), (Some(a), Some(b)) if a != b)
}

impl PartialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overwrite every attribute `higher` sets, leaving the rest untouched.
    pub fn overlay(&mut self, higher: &PartialConfig) {
        take(&mut self.min, &higher.min);
        take(&mut self.max, &higher.max);
        take(&mut self.min_len, &higher.min_len);
        take(&mut self.max_len, &higher.max_len);
        take(&mut self.charset, &higher.charset);
        take(&mut self.pattern, &higher.pattern);
        take(&mut self.max_repeat, &higher.max_repeat);
        take(&mut self.scale, &higher.scale);
        take(&mut self.values, &higher.values);
        take(&mut self.min_size, &higher.min_size);
        take(&mut self.max_size, &higher.max_size);
        take(&mut self.selection, &higher.selection);
        take(&mut self.size_selection, &higher.size_selection);
        take(&mut self.generator, &higher.generator);
        for (key, value) in &higher.params {
            self.params.insert(key.clone(), value.clone());
        }
    }

    /// Names of attributes set in both layers to different values.
    pub fn conflicts_with(&self, other: &PartialConfig) -> Vec<String> {
        let mut conflicts = Vec::new();
        let checks = [
            ("min", differs(&self.min, &other.min)),
            ("max", differs(&self.max, &other.max)),
            ("min_len", differs(&self.min_len, &other.min_len)),
            ("max_len", differs(&self.max_len, &other.max_len)),
            ("charset", differs(&self.charset, &other.charset)),
            ("pattern", differs(&self.pattern, &other.pattern)),
            ("max_repeat", differs(&self.max_repeat, &other.max_repeat)),
            ("scale", differs(&self.scale, &other.scale)),
            ("values", differs(&self.values, &other.values)),
            ("min_size", differs(&self.min_size, &other.min_size)),
            ("max_size", differs(&self.max_size, &other.max_size)),
            ("selection", differs(&self.selection, &other.selection)),
            (
                "size_selection",
                differs(&self.size_selection, &other.size_selection),
            ),
            ("generator", differs(&self.generator, &other.generator)),
        ];
        for (name, conflict) in checks {
            if conflict {
                conflicts.push(name.to_string());
            }
        }
        for (key, value) in &self.params {
            if other.params.get(key).is_some_and(|other| other != value) {
                conflicts.push(format!("params.{key}"));
            }
        }
        conflicts
    }

    pub fn with_min(mut self, min: impl Into<Bound>) -> Self {
        self.min = Some(min.into());
        self
    }

    pub fn with_max(mut self, max: impl Into<Bound>) -> Self {
        self.max = Some(max.into());
        self
    }

    pub fn with_len(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = Some(min_len);
        self.max_len = Some(max_len);
        self
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_size(mut self, min_size: usize, max_size: usize) -> Self {
        self.min_size = Some(min_size);
        self.max_size = Some(max_size);
        self
    }

    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_size_selection(mut self, selection: SelectionMode) -> Self {
        self.size_selection = Some(selection);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Fully merged configuration for one generator instantiation.
///
/// Getters apply the built-in defaults for attributes no layer set and
/// reject inverted ranges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveConfig {
    merged: PartialConfig,
    /// Per-layer bounds, highest precedence first.
    bounds: Vec<BoundLayer>,
}

/// The `min` / `max` one layer contributed. Only a strict layer may fail a
/// generator with a bound of the wrong kind; other layers are passed over.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BoundLayer {
    min: Option<Bound>,
    max: Option<Bound>,
    strict: bool,
}

impl BoundLayer {
    fn of(config: &PartialConfig, strict: bool) -> Option<Self> {
        (config.min.is_some() || config.max.is_some()).then_some(Self {
            min: config.min,
            max: config.max,
            strict,
        })
    }
}

impl EffectiveConfig {
    /// A single layer whose bounds must all fit the generator.
    pub fn from_partial(merged: PartialConfig) -> Self {
        let bounds = BoundLayer::of(&merged, true).into_iter().collect();
        Self { merged, bounds }
    }

    pub fn raw(&self) -> &PartialConfig {
        &self.merged
    }

    pub fn selection(&self) -> SelectionMode {
        self.merged.selection.unwrap_or_default()
    }

    pub fn size_selection(&self) -> SelectionMode {
        self.merged.size_selection.unwrap_or_default()
    }

    pub fn size_range(&self) -> Result<(usize, usize), GenerationError> {
        resolve_range(
            self.merged.min_size,
            self.merged.max_size,
            (DEFAULT_MIN_SIZE, DEFAULT_MAX_SIZE),
            "size",
        )
    }

    pub fn len_range(&self) -> Result<(usize, usize), GenerationError> {
        resolve_range(
            self.merged.min_len,
            self.merged.max_len,
            (DEFAULT_MIN_LEN, DEFAULT_MAX_LEN),
            "length",
        )
    }

    pub fn int_range(&self) -> Result<(i64, i64), GenerationError> {
        let min = self.bound_as("min", |layer| layer.min, |bound| match bound {
            Bound::Int(value) => Some(value),
            _ => None,
        })?;
        let max = self.bound_as("max", |layer| layer.max, |bound| match bound {
            Bound::Int(value) => Some(value),
            _ => None,
        })?;
        resolve_range(min, max, (DEFAULT_INT_MIN, DEFAULT_INT_MAX), "int")
    }

    pub fn float_range(&self) -> Result<(f64, f64), GenerationError> {
        let as_float = |bound| match bound {
            Bound::Int(value) => Some(value as f64),
            Bound::Float(value) => Some(value),
            _ => None,
        };
        let min = self.bound_as("min", |layer| layer.min, as_float)?;
        let max = self.bound_as("max", |layer| layer.max, as_float)?;
        resolve_range(min, max, (DEFAULT_FLOAT_MIN, DEFAULT_FLOAT_MAX), "float")
    }

    pub fn date_range(&self) -> Result<(NaiveDate, NaiveDate), GenerationError> {
        let as_date = |bound| match bound {
            Bound::Date(value) => Some(value),
            Bound::Timestamp(value) => Some(value.date()),
            _ => None,
        };
        let min = self.bound_as("min", |layer| layer.min, as_date)?;
        let max = self.bound_as("max", |layer| layer.max, as_date)?;
        resolve_range(min, max, (default_min_date(), default_max_date()), "date")
    }

    pub fn timestamp_range(&self) -> Result<(NaiveDateTime, NaiveDateTime), GenerationError> {
        let as_timestamp = |bound| match bound {
            Bound::Timestamp(value) => Some(value),
            Bound::Date(value) => value.and_hms_opt(0, 0, 0),
            _ => None,
        };
        let min = self.bound_as("min", |layer| layer.min, as_timestamp)?;
        let max = self.bound_as("max", |layer| layer.max, as_timestamp)?;
        let default_min = default_min_date()
            .and_hms_opt(0, 0, 0)
            .unwrap_or(NaiveDateTime::MIN);
        let default_max = default_max_date()
            .and_hms_opt(23, 59, 59)
            .unwrap_or(default_min);
        resolve_range(min, max, (default_min, default_max), "timestamp")
    }

    pub fn charset(&self) -> &str {
        self.merged.charset.as_deref().unwrap_or(DEFAULT_CHARSET)
    }

    pub fn pattern(&self) -> Option<&str> {
        self.merged.pattern.as_deref()
    }

    pub fn max_repeat(&self) -> u32 {
        self.merged.max_repeat.unwrap_or(DEFAULT_MAX_REPEAT)
    }

    pub fn scale(&self) -> Option<u32> {
        self.merged.scale
    }

    pub fn values(&self) -> Option<&[String]> {
        self.merged.values.as_deref()
    }

    pub fn generator(&self) -> Option<&str> {
        self.merged.generator.as_deref()
    }

    pub fn params(&self) -> &BTreeMap<String, JsonValue> {
        &self.merged.params
    }

    fn bound_as<T>(
        &self,
        name: &str,
        side: impl Fn(&BoundLayer) -> Option<Bound>,
        convert: impl Fn(Bound) -> Option<T>,
    ) -> Result<Option<T>, GenerationError> {
        for layer in &self.bounds {
            let Some(bound) = side(layer) else {
                continue;
            };
            if let Some(value) = convert(bound) {
                return Ok(Some(value));
            }
            if layer.strict {
                return Err(GenerationError::InvalidConfig(format!(
                    "{name} bound of kind {} does not fit this generator",
                    bound.kind()
                )));
            }
        }
        Ok(None)
    }
}

pub(crate) fn default_min_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

pub(crate) fn default_max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Pick `[min, max]` from optional bounds. A one-sided bound outside the
/// default range drags the other side along with it.
fn resolve_range<T: PartialOrd + Copy>(
    min: Option<T>,
    max: Option<T>,
    defaults: (T, T),
    what: &str,
) -> Result<(T, T), GenerationError> {
    let lo = match (min, max) {
        (Some(lo), _) => lo,
        (None, Some(hi)) if hi < defaults.0 => hi,
        _ => defaults.0,
    };
    let hi = match (min, max) {
        (_, Some(hi)) => hi,
        (Some(lo), None) if lo > defaults.1 => lo,
        _ => defaults.1,
    };
    if lo > hi {
        return Err(GenerationError::InvalidConfig(format!(
            "{what} min must be <= max"
        )));
    }
    Ok((lo, hi))
}

/// The session-owned scopes: PerInstance, PerDeclaredType (keyed by
/// [`dtoforge_core::FieldType::type_key`]) and PerFieldName.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationScopes {
    instance: PartialConfig,
    by_type: BTreeMap<String, PartialConfig>,
    by_field: BTreeMap<String, PartialConfig>,
}

impl ConfigurationScopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.instance.is_empty() && self.by_type.is_empty() && self.by_field.is_empty()
    }

    pub fn set_instance(&mut self, config: PartialConfig) {
        self.instance.overlay(&config);
    }

    pub fn set_type(&mut self, type_key: impl Into<String>, config: PartialConfig) {
        self.by_type.entry(type_key.into()).or_default().overlay(&config);
    }

    pub fn set_field(&mut self, field_name: impl Into<String>, config: PartialConfig) {
        self.by_field
            .entry(field_name.into())
            .or_default()
            .overlay(&config);
    }

    pub fn instance(&self) -> &PartialConfig {
        &self.instance
    }

    pub fn for_type(&self, type_key: &str) -> Option<&PartialConfig> {
        self.by_type.get(type_key)
    }

    pub fn for_field(&self, field_name: &str) -> Option<&PartialConfig> {
        self.by_field.get(field_name)
    }

    /// Scopes for a nested object: a deep copy of the enclosing scopes with
    /// the nested node's own settings laid over them.
    pub fn inherit(parent: &ConfigurationScopes, own: &ConfigurationScopes) -> ConfigurationScopes {
        let mut scopes = parent.clone();
        scopes.instance.overlay(&own.instance);
        for (key, config) in &own.by_type {
            scopes.by_type.entry(key.clone()).or_default().overlay(config);
        }
        for (key, config) in &own.by_field {
            scopes.by_field.entry(key.clone()).or_default().overlay(config);
        }
        scopes
    }

    /// Fold every layer, low to high: rule defaults, global, declared
    /// type, instance, field name.
    ///
    /// Only the rule defaults bind a generator to their bound kinds. A bound
    /// from a wider scope that does not fit the generator, such as an int
    /// `min` reaching a date field, falls through to the layers below it.
    pub fn merge_for(
        &self,
        rule_defaults: &PartialConfig,
        global: &PartialConfig,
        field_name: &str,
        type_key: &str,
    ) -> EffectiveConfig {
        let mut layers = vec![(rule_defaults, true), (global, false)];
        if let Some(config) = self.by_type.get(type_key) {
            layers.push((config, false));
        }
        layers.push((&self.instance, false));
        if let Some(config) = self.by_field.get(field_name) {
            layers.push((config, false));
        }

        let mut merged = PartialConfig::default();
        for (layer, _) in &layers {
            merged.overlay(layer);
        }
        let bounds = layers
            .iter()
            .rev()
            .filter_map(|(layer, strict)| BoundLayer::of(layer, *strict))
            .collect();
        EffectiveConfig { merged, bounds }
    }
}
