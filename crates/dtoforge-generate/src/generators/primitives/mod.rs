use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use rand_regex::Regex as RandRegex;

use dtoforge_core::{FieldType, ScalarKind, Value};

use crate::config::SelectionMode;
use crate::errors::GenerationError;
use crate::generators::{BuildRequest, GenerationContext, Generator, GeneratorBuilder};

/// Maps Basic rule tags to the builders that instantiate their generators.
#[derive(Clone)]
pub struct BuilderRegistry {
    builders: BTreeMap<String, Arc<dyn GeneratorBuilder>>,
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.builders.keys()).finish()
    }
}

impl Default for BuilderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BuilderRegistry {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        let builtin: [(&str, Arc<dyn GeneratorBuilder>); 9] = [
            ("bool", Arc::new(build_bool)),
            ("int", Arc::new(build_int)),
            ("float", Arc::new(build_float)),
            ("char", Arc::new(build_char)),
            ("text", Arc::new(build_text)),
            ("date", Arc::new(build_date)),
            ("timestamp", Arc::new(build_timestamp)),
            ("uuid", Arc::new(build_uuid)),
            ("enum", Arc::new(build_enum)),
        ];
        for (tag, builder) in builtin {
            registry.builders.insert(tag.to_string(), builder);
        }
        registry
    }

    pub fn register(
        &mut self,
        tag: impl Into<String>,
        builder: Arc<dyn GeneratorBuilder>,
    ) -> Result<(), GenerationError> {
        let tag = tag.into();
        if self.builders.contains_key(&tag) {
            return Err(GenerationError::ConfigurationConflict(format!(
                "a builder for rule tag '{tag}' is already registered"
            )));
        }
        self.builders.insert(tag, builder);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn GeneratorBuilder>> {
        self.builders.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.builders.contains_key(tag)
    }
}

/// Built-in tag used for an unruled field when every known type is
/// generated.
pub fn default_tag_for(field_type: &FieldType) -> Option<&'static str> {
    match field_type {
        FieldType::Scalar { scalar, .. } => Some(scalar.as_str()),
        FieldType::Enum { .. } => Some("enum"),
        _ => None,
    }
}

fn select<T>(
    selection: SelectionMode,
    min: T,
    max: T,
    random: impl FnOnce() -> T,
) -> Option<T> {
    match selection {
        SelectionMode::Null => None,
        SelectionMode::Min => Some(min),
        SelectionMode::Max => Some(max),
        SelectionMode::Random => Some(random()),
    }
}

fn build_bool(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    Ok(Arc::new(BoolGenerator {
        selection: request.config.selection(),
    }))
}

fn build_int(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let (min, max) = request.config.int_range()?;
    Ok(Arc::new(IntGenerator {
        min,
        max,
        selection: request.config.selection(),
    }))
}

fn build_float(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let (min, max) = request.config.float_range()?;
    if !min.is_finite() || !max.is_finite() {
        return Err(GenerationError::InvalidConfig(format!(
            "{}: float bounds must be finite",
            request.path
        )));
    }
    if !(max - min).is_finite() {
        return Err(GenerationError::InvalidConfig(format!(
            "{}: float range {min}..={max} is too wide to sample",
            request.path
        )));
    }
    Ok(Arc::new(FloatGenerator {
        min,
        max,
        scale: request.config.scale(),
        selection: request.config.selection(),
    }))
}

fn charset_chars(request: &BuildRequest<'_>) -> Result<Vec<char>, GenerationError> {
    let mut chars: Vec<char> = request.config.charset().chars().collect();
    chars.sort_unstable();
    chars.dedup();
    if chars.is_empty() {
        return Err(GenerationError::InvalidConfig(format!(
            "{}: charset must include valid characters",
            request.path
        )));
    }
    Ok(chars)
}

fn build_char(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    Ok(Arc::new(CharGenerator {
        chars: charset_chars(request)?,
        selection: request.config.selection(),
    }))
}

fn build_text(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let selection = request.config.selection();
    if let Some(pattern) = request.config.pattern() {
        let regex = RandRegex::compile(pattern, request.config.max_repeat()).map_err(|err| {
            GenerationError::InvalidConfig(format!(
                "{}: invalid regex pattern: {err}",
                request.path
            ))
        })?;
        return Ok(Arc::new(PatternTextGenerator { regex, selection }));
    }
    let (min_len, max_len) = request.config.len_range()?;
    Ok(Arc::new(TextGenerator {
        min_len,
        max_len,
        chars: charset_chars(request)?,
        selection,
    }))
}

fn build_date(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let (min, max) = request.config.date_range()?;
    Ok(Arc::new(DateGenerator {
        min,
        max,
        selection: request.config.selection(),
    }))
}

fn build_timestamp(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let (min, max) = request.config.timestamp_range()?;
    Ok(Arc::new(TimestampGenerator {
        min,
        max,
        selection: request.config.selection(),
    }))
}

fn build_uuid(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let as_text = matches!(
        request.field_type,
        FieldType::Scalar {
            scalar: ScalarKind::Text,
            ..
        }
    );
    Ok(Arc::new(UuidGenerator {
        as_text,
        selection: request.config.selection(),
    }))
}

fn build_enum(request: &BuildRequest<'_>) -> Result<Arc<dyn Generator>, GenerationError> {
    let labels: Vec<String> = request
        .config
        .values()
        .or(request.enum_labels)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    if labels.is_empty() {
        return Err(GenerationError::InvalidConfig(format!(
            "{}: enum rule needs at least one value",
            request.path
        )));
    }
    if let Some(allowed) = request.enum_labels
        && let Some(unknown) = labels.iter().find(|label| !allowed.contains(label))
    {
        return Err(GenerationError::InvalidConfig(format!(
            "{}: '{unknown}' is not a label of the declared enum",
            request.path
        )));
    }
    Ok(Arc::new(EnumGenerator {
        labels,
        selection: request.config.selection(),
    }))
}

struct BoolGenerator {
    selection: SelectionMode,
}

impl Generator for BoolGenerator {
    fn id(&self) -> &str {
        "primitive.bool"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let value = select(self.selection, false, true, || ctx.rng.random_bool(0.5));
        Ok(value.map_or(Value::Null, Value::Bool))
    }
}

struct IntGenerator {
    min: i64,
    max: i64,
    selection: SelectionMode,
}

impl Generator for IntGenerator {
    fn id(&self) -> &str {
        "primitive.int"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let value = select(self.selection, self.min, self.max, || {
            ctx.rng.random_range(self.min..=self.max)
        });
        Ok(value.map_or(Value::Null, Value::Int))
    }
}

struct FloatGenerator {
    min: f64,
    max: f64,
    scale: Option<u32>,
    selection: SelectionMode,
}

impl Generator for FloatGenerator {
    fn id(&self) -> &str {
        "primitive.float"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let value = select(self.selection, self.min, self.max, || {
            ctx.rng.random_range(self.min..=self.max)
        });
        Ok(value.map_or(Value::Null, |value| {
            let value = match self.scale {
                Some(scale) => {
                    let factor = 10f64.powi(scale as i32);
                    ((value * factor).round() / factor).clamp(self.min, self.max)
                }
                None => value,
            };
            Value::Float(value)
        }))
    }
}

struct CharGenerator {
    chars: Vec<char>,
    selection: SelectionMode,
}

impl Generator for CharGenerator {
    fn id(&self) -> &str {
        "primitive.char"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let last = self.chars.len() - 1;
        let index = select(self.selection, 0, last, || ctx.rng.random_range(0..=last));
        Ok(index.map_or(Value::Null, |index| Value::Char(self.chars[index])))
    }
}

struct TextGenerator {
    min_len: usize,
    max_len: usize,
    chars: Vec<char>,
    selection: SelectionMode,
}

impl Generator for TextGenerator {
    fn id(&self) -> &str {
        "primitive.text"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let Some(len) = select(self.selection, self.min_len, self.max_len, || {
            ctx.rng.random_range(self.min_len..=self.max_len)
        }) else {
            return Ok(Value::Null);
        };
        let mut value = String::with_capacity(len);
        for _ in 0..len {
            let idx = ctx.rng.random_range(0..self.chars.len());
            value.push(self.chars[idx]);
        }
        Ok(Value::Text(value))
    }
}

struct PatternTextGenerator {
    regex: RandRegex,
    selection: SelectionMode,
}

impl Generator for PatternTextGenerator {
    fn id(&self) -> &str {
        "primitive.text.pattern"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        if self.selection == SelectionMode::Null {
            return Ok(Value::Null);
        }
        let value: String = ctx.rng.sample(&self.regex);
        Ok(Value::Text(value))
    }
}

struct DateGenerator {
    min: NaiveDate,
    max: NaiveDate,
    selection: SelectionMode,
}

impl Generator for DateGenerator {
    fn id(&self) -> &str {
        "primitive.date"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let span = (self.max - self.min).num_days().max(0);
        let Some(offset) = select(self.selection, 0, span, || ctx.rng.random_range(0..=span))
        else {
            return Ok(Value::Null);
        };
        self.min
            .checked_add_signed(chrono::Duration::days(offset))
            .map(Value::Date)
            .ok_or_else(|| GenerationError::Runtime {
                path: ctx.path.to_string(),
                message: "date out of range".to_string(),
            })
    }
}

struct TimestampGenerator {
    min: NaiveDateTime,
    max: NaiveDateTime,
    selection: SelectionMode,
}

impl Generator for TimestampGenerator {
    fn id(&self) -> &str {
        "primitive.timestamp"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let span = (self.max - self.min).num_seconds().max(0);
        let Some(offset) = select(self.selection, 0, span, || ctx.rng.random_range(0..=span))
        else {
            return Ok(Value::Null);
        };
        self.min
            .checked_add_signed(chrono::Duration::seconds(offset))
            .map(Value::Timestamp)
            .ok_or_else(|| GenerationError::Runtime {
                path: ctx.path.to_string(),
                message: "timestamp out of range".to_string(),
            })
    }
}

struct UuidGenerator {
    as_text: bool,
    selection: SelectionMode,
}

impl Generator for UuidGenerator {
    fn id(&self) -> &str {
        "primitive.uuid"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let Some(uuid) = select(
            self.selection,
            uuid::Uuid::nil(),
            uuid::Uuid::from_u128(u128::MAX),
            || uuid::Builder::from_random_bytes(ctx.rng.random()).into_uuid(),
        ) else {
            return Ok(Value::Null);
        };
        if self.as_text {
            Ok(Value::Text(uuid.to_string()))
        } else {
            Ok(Value::Uuid(uuid))
        }
    }
}

struct EnumGenerator {
    labels: Vec<String>,
    selection: SelectionMode,
}

impl Generator for EnumGenerator {
    fn id(&self) -> &str {
        "primitive.enum"
    }

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Value, GenerationError> {
        let last = self.labels.len() - 1;
        let index = select(self.selection, 0, last, || ctx.rng.random_range(0..=last));
        Ok(index.map_or(Value::Null, |index| Value::Text(self.labels[index].clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EffectiveConfig, PartialConfig};
    use crate::generators::ParentView;
    use crate::remarks::{ParamMap, RemarkSet};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn build(
        tag: &str,
        field_type: &FieldType,
        config: PartialConfig,
        enum_labels: Option<&[String]>,
    ) -> Result<Arc<dyn Generator>, GenerationError> {
        let registry = BuilderRegistry::builtin();
        let config = EffectiveConfig::from_partial(config);
        let remarks = RemarkSet::new();
        let params = ParamMap::new();
        let request = BuildRequest {
            path: "field",
            field_name: "field",
            field_type,
            config: &config,
            tag: Some(tag),
            enum_labels,
            remarks: &remarks,
            params: &params,
        };
        registry.get(tag).expect("builtin tag").build(&request)
    }

    fn sample(generator: &dyn Generator, seed: u64) -> Value {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ctx = GenerationContext::new("field", &mut rng, ParentView::detached());
        generator.generate(&mut ctx).expect("generate")
    }

    #[test]
    fn int_respects_bounds_and_selection() {
        let int = FieldType::primitive(ScalarKind::Int);
        let generator = build(
            "int",
            &int,
            PartialConfig::new().with_min(3_i64).with_max(6_i64),
            None,
        )
        .expect("build");
        for seed in 0..32 {
            let value = sample(generator.as_ref(), seed).as_i64().expect("int");
            assert!((3..=6).contains(&value));
        }

        let max = build(
            "int",
            &int,
            PartialConfig::new()
                .with_max(6_i64)
                .with_selection(SelectionMode::Max),
            None,
        )
        .expect("build");
        assert_eq!(sample(max.as_ref(), 1), Value::Int(6));
    }

    #[test]
    fn null_selection_yields_null() {
        let text = FieldType::scalar(ScalarKind::Text);
        let generator = build(
            "text",
            &text,
            PartialConfig::new().with_selection(SelectionMode::Null),
            None,
        )
        .expect("build");
        assert_eq!(sample(generator.as_ref(), 7), Value::Null);
    }

    #[test]
    fn text_uses_charset_and_length() {
        let text = FieldType::scalar(ScalarKind::Text);
        let generator = build(
            "text",
            &text,
            PartialConfig::new().with_len(4, 4).with_charset("xy"),
            None,
        )
        .expect("build");
        let value = sample(generator.as_ref(), 3);
        let value = value.as_str().expect("text");
        assert_eq!(value.chars().count(), 4);
        assert!(value.chars().all(|ch| ch == 'x' || ch == 'y'));
    }

    #[test]
    fn text_pattern_matches() {
        let text = FieldType::scalar(ScalarKind::Text);
        let generator = build(
            "text",
            &text,
            PartialConfig::new().with_pattern("[A-Z]{3}-[0-9]{2}"),
            None,
        )
        .expect("build");
        let value = sample(generator.as_ref(), 11);
        let value = value.as_str().expect("text");
        assert_eq!(value.len(), 6);
        assert_eq!(&value[3..4], "-");
    }

    #[test]
    fn invalid_pattern_is_invalid_config() {
        let text = FieldType::scalar(ScalarKind::Text);
        let result = build("text", &text, PartialConfig::new().with_pattern("(["), None);
        assert!(matches!(result, Err(GenerationError::InvalidConfig(_))));
    }

    #[test]
    fn date_min_and_max_selection() {
        let date = FieldType::scalar(ScalarKind::Date);
        let low = NaiveDate::from_ymd_opt(2024, 3, 1).expect("date");
        let high = NaiveDate::from_ymd_opt(2024, 3, 9).expect("date");
        let config = PartialConfig::new().with_min(low).with_max(high);
        let min = build(
            "date",
            &date,
            config.clone().with_selection(SelectionMode::Min),
            None,
        )
        .expect("build");
        let max = build("date", &date, config.with_selection(SelectionMode::Max), None)
            .expect("build");
        assert_eq!(sample(min.as_ref(), 0), Value::Date(low));
        assert_eq!(sample(max.as_ref(), 0), Value::Date(high));
    }

    #[test]
    fn uuid_on_text_field_renders_text() {
        let text = FieldType::scalar(ScalarKind::Text);
        let generator = build("uuid", &text, PartialConfig::new(), None).expect("build");
        let value = sample(generator.as_ref(), 5);
        let parsed = uuid::Uuid::parse_str(value.as_str().expect("text")).expect("uuid");
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn enum_picks_declared_labels() {
        let labels = vec!["RED".to_string(), "GREEN".to_string()];
        let enum_type = FieldType::enumeration("Color");
        let generator =
            build("enum", &enum_type, PartialConfig::new(), Some(&labels)).expect("build");
        for seed in 0..16 {
            let value = sample(generator.as_ref(), seed);
            assert!(labels.iter().any(|label| Some(label.as_str()) == value.as_str()));
        }
    }

    #[test]
    fn enum_rejects_values_outside_declared_labels() {
        let labels = vec!["RED".to_string()];
        let enum_type = FieldType::enumeration("Color");
        let result = build(
            "enum",
            &enum_type,
            PartialConfig::new().with_values(["BLUE"]),
            Some(&labels),
        );
        assert!(matches!(result, Err(GenerationError::InvalidConfig(_))));
    }

    #[test]
    fn float_scale_rounds() {
        let float = FieldType::scalar(ScalarKind::Float);
        let generator = build(
            "float",
            &float,
            PartialConfig {
                scale: Some(2),
                ..PartialConfig::new().with_min(1.0).with_max(2.0)
            },
            None,
        )
        .expect("build");
        let value = sample(generator.as_ref(), 9).as_f64().expect("float");
        assert_eq!((value * 100.0).round() / 100.0, value);
    }

    #[test]
    fn float_span_must_be_finite() {
        let float = FieldType::scalar(ScalarKind::Float);
        let result = build(
            "float",
            &float,
            PartialConfig::new().with_min(-1.0e308).with_max(1.0e308),
            None,
        );
        assert!(matches!(result, Err(GenerationError::InvalidConfig(_))));

        let generator = build(
            "float",
            &float,
            PartialConfig::new().with_min(-1.0e307).with_max(1.0e307),
            None,
        )
        .expect("build");
        let value = sample(generator.as_ref(), 4).as_f64().expect("float");
        assert!(value.is_finite());
    }

    #[test]
    fn register_rejects_taken_tag() {
        let mut registry = BuilderRegistry::builtin();
        let result = registry.register("int", Arc::new(build_bool));
        assert!(matches!(
            result,
            Err(GenerationError::ConfigurationConflict(_))
        ));
    }
}
