use std::sync::Arc;

use tracing::{debug, warn};

use dtoforge_core::{FieldDescriptor, FieldType, TypeRegistry};
use dtoforge_rules::{
    Classification, GroupFilter, RuleCatalog, RuleClassifier, RuleInfo, RuleKind, ValidationIssue,
    ValidationReport,
};

use crate::compiled::{CompiledComposition, CompiledField};
use crate::config::{ConfigurationScopes, EffectiveConfig, PartialConfig, SelectionMode};
use crate::errors::GenerationError;
use crate::generators::collection::Sizing;
use crate::generators::primitives::default_tag_for;
use crate::generators::{
    BuildRequest, BuilderRegistry, CollectionGenerator, CollectionShape, CustomRegistry, Generator,
    MapGenerator, NestedGenerator,
};
use crate::model::{CompositionReport, Diagnostic, GenerateOptions};
use crate::overrides::{GeneratorOrBuilder, OverrideRegistry, OverrideSource};
use crate::params::parse_attributes;
use crate::path::{NodeId, PathTree, child_path};
use crate::remarks::RemarkAndParamHolder;

type Composed = Option<Arc<dyn Generator>>;

/// Everything a composition pass reads, borrowed from the build session.
pub(crate) struct ComposeInputs<'s> {
    pub registry: &'s TypeRegistry,
    pub catalog: &'s RuleCatalog,
    pub filter: &'s GroupFilter,
    pub builders: &'s BuilderRegistry,
    pub customs: &'s CustomRegistry,
    pub overrides: &'s OverrideRegistry,
    pub holder: &'s RemarkAndParamHolder,
    pub options: &'s GenerateOptions,
    pub global: PartialConfig,
}

/// One full-graph composition pass.
///
/// Invalid rule metadata and invalid configuration values are collected
/// into `issues` so the caller can report the whole graph at once; only
/// errors that make further scanning meaningless are returned directly.
pub(crate) struct Composer<'s> {
    inputs: ComposeInputs<'s>,
    tree: &'s mut PathTree,
    issues: ValidationReport,
    report: CompositionReport,
}

/// Field currently being resolved.
struct Slot<'a> {
    field_name: &'a str,
    path: &'a str,
    scopes: &'a ConfigurationScopes,
    depth: usize,
}

impl<'s> Composer<'s> {
    pub fn new(inputs: ComposeInputs<'s>, tree: &'s mut PathTree, root_type: &str) -> Self {
        Self {
            inputs,
            tree,
            issues: ValidationReport::default(),
            report: CompositionReport::new(root_type),
        }
    }

    pub fn finish(self) -> (ValidationReport, CompositionReport) {
        (self.issues, self.report)
    }

    /// Compose every declared field of `type_name` into the node `node`.
    pub fn compose_type(
        &mut self,
        type_name: &str,
        node: NodeId,
        scopes: &ConfigurationScopes,
        depth: usize,
    ) -> Result<Arc<CompiledComposition>, GenerationError> {
        let registry = self.inputs.registry;
        self.tree.bind_type(node, type_name);
        let node_path = self
            .tree
            .node(node)
            .map(|node| node.path.clone())
            .unwrap_or_default();
        let template = registry.create_instance(type_name)?;

        let mut compiled = Vec::new();
        for field in registry.fields_of(type_name)? {
            let path = child_path(&node_path, &field.name);
            let slot = Slot {
                field_name: &field.name,
                path: &path,
                scopes,
                depth,
            };
            if let Some(generator) = self.compose_field(field, &slot)? {
                debug!(path = %path, generator = generator.id(), "field composed");
                self.report.record_composed();
                self.report.record_generator_usage(generator.id());
                compiled.push(CompiledField {
                    name: field.name.clone(),
                    path,
                    field_type: field.field_type.clone(),
                    generator,
                });
            }
        }

        let composition = Arc::new(CompiledComposition::new(
            type_name.to_string(),
            node_path,
            template,
            compiled,
            self.inputs.options.collect_field_errors,
        ));
        self.tree.set_compiled(node, Arc::clone(&composition));
        Ok(composition)
    }

    fn compose_field(
        &mut self,
        field: &FieldDescriptor,
        slot: &Slot<'_>,
    ) -> Result<Composed, GenerationError> {
        if field.is_final {
            warn!(path = slot.path, "final field is never generated");
            self.report.record_skipped(Diagnostic::warning(
                "final_field_skipped",
                slot.path,
                "final field is never generated",
            ));
            return Ok(None);
        }

        if let Some((source, entry)) = self.inputs.overrides.resolve(slot.path, None, None) {
            let defaults = PartialConfig::default();
            let config = self.merge(&defaults, slot, &field.field_type);
            return self.materialize(entry, source, slot, &field.field_type, &config, None);
        }

        let classifier = RuleClassifier::new(self.inputs.catalog, self.inputs.filter);
        match classifier.classify(field, slot.path, &mut self.issues) {
            Classification::Invalid => Ok(None),
            Classification::Excluded => {
                self.report.record_skipped(Diagnostic::info(
                    "excluded_by_group",
                    slot.path,
                    "no rule declaration in an included group",
                ));
                Ok(None)
            }
            Classification::Unruled => self.compose_unruled(&field.field_type, slot),
            Classification::Active(info) => self.compose_rule(&info, slot),
        }
    }

    fn compose_rule(
        &mut self,
        info: &RuleInfo,
        slot: &Slot<'_>,
    ) -> Result<Composed, GenerationError> {
        let defaults = match parse_attributes(&info.decl.attributes, slot.path) {
            Ok(defaults) => defaults,
            Err(err) => return self.collect(slot.path, Err(err)),
        };
        let config = self.merge(&defaults, slot, &info.field_type);

        match &info.kind {
            RuleKind::Collection { element } => {
                let Some(element_generator) = self.compose_rule(element, slot)? else {
                    return Ok(None);
                };
                self.wrap_collection(
                    &info.field_type,
                    element_generator,
                    &element.field_type,
                    &config,
                    slot,
                )
            }
            RuleKind::Map { key, value } => {
                let key_generator = self.compose_rule(key, slot)?;
                let value_generator = self.compose_rule(value, slot)?;
                let (Some(key_generator), Some(value_generator)) = (key_generator, value_generator)
                else {
                    return Ok(None);
                };
                self.wrap_map(
                    (key_generator, &key.field_type),
                    (value_generator, &value.field_type),
                    &config,
                    slot,
                )
            }
            RuleKind::Basic | RuleKind::Nested | RuleKind::Custom => {
                let type_key = info.field_type.type_key();
                if let Some((source, entry)) =
                    self.inputs.overrides.resolve(slot.path, Some(info.tag()), Some(&type_key))
                {
                    return self.materialize(
                        entry,
                        source,
                        slot,
                        &info.field_type,
                        &config,
                        Some(info.tag()),
                    );
                }
                match info.kind {
                    RuleKind::Nested => {
                        self.compose_nested(&info.field_type, slot, config.selection())
                    }
                    RuleKind::Custom => self.compose_custom(slot, &config),
                    _ => self.build_basic(info.tag(), &info.field_type, slot, &config),
                }
            }
        }
    }

    /// Fields without rules: type override, then (when every known type is
    /// generated) the type's default generator. Otherwise left unset.
    fn compose_unruled(
        &mut self,
        field_type: &FieldType,
        slot: &Slot<'_>,
    ) -> Result<Composed, GenerationError> {
        let defaults = PartialConfig::default();
        let config = self.merge(&defaults, slot, field_type);
        let type_key = (!field_type.is_container()).then(|| field_type.type_key());
        if let Some((source, entry)) =
            self.inputs.overrides.resolve(slot.path, None, type_key.as_deref())
        {
            return self.materialize(entry, source, slot, field_type, &config, None);
        }
        if !self.inputs.options.generate_all_known_types {
            return Ok(None);
        }

        match field_type {
            FieldType::Object { .. } => self.compose_nested(field_type, slot, config.selection()),
            FieldType::List { element }
            | FieldType::Set { element }
            | FieldType::Array { element } => {
                let Some(element_generator) = self.compose_unruled(element, slot)? else {
                    return Ok(None);
                };
                self.wrap_collection(field_type, element_generator, &**element, &config, slot)
            }
            FieldType::Map { key, value } => {
                let key_generator = self.compose_unruled(key, slot)?;
                let value_generator = self.compose_unruled(value, slot)?;
                let (Some(key_generator), Some(value_generator)) = (key_generator, value_generator)
                else {
                    return Ok(None);
                };
                self.wrap_map(
                    (key_generator, &**key),
                    (value_generator, &**value),
                    &config,
                    slot,
                )
            }
            FieldType::Scalar { .. } | FieldType::Enum { .. } => match default_tag_for(field_type) {
                Some(tag) => self.build_basic(tag, field_type, slot, &config),
                None => Ok(None),
            },
        }
    }

    fn merge(
        &self,
        defaults: &PartialConfig,
        slot: &Slot<'_>,
        field_type: &FieldType,
    ) -> EffectiveConfig {
        slot.scopes.merge_for(
            defaults,
            &self.inputs.global,
            slot.field_name,
            &field_type.type_key(),
        )
    }

    fn enum_labels(&self, field_type: &FieldType) -> Option<&'s [String]> {
        match field_type {
            FieldType::Enum { name } => {
                let registry: &'s TypeRegistry = self.inputs.registry;
                registry.enum_labels(name)
            }
            _ => None,
        }
    }

    fn build_basic(
        &mut self,
        tag: &str,
        field_type: &FieldType,
        slot: &Slot<'_>,
        config: &EffectiveConfig,
    ) -> Result<Composed, GenerationError> {
        let Some(builder) = self.inputs.builders.get(tag) else {
            return self.collect(
                slot.path,
                Err(GenerationError::InvalidConfig(format!(
                    "no generator builder registered for rule tag '{tag}'"
                ))),
            );
        };
        let remarks = self.inputs.holder.remarks_for(slot.path, tag);
        let mut params = config.params().clone();
        params.extend(self.inputs.holder.params_for(slot.path, tag));
        let request = BuildRequest {
            path: slot.path,
            field_name: slot.field_name,
            field_type,
            config,
            tag: Some(tag),
            enum_labels: self.enum_labels(field_type),
            remarks: &remarks,
            params: &params,
        };
        let built = builder.build(&request);
        self.collect(slot.path, built)
    }

    fn materialize(
        &mut self,
        entry: &GeneratorOrBuilder,
        source: OverrideSource,
        slot: &Slot<'_>,
        field_type: &FieldType,
        config: &EffectiveConfig,
        tag: Option<&str>,
    ) -> Result<Composed, GenerationError> {
        debug!(path = slot.path, source = source.as_str(), "override applied");
        self.report.record_override(source.as_str());
        match entry {
            GeneratorOrBuilder::Generator(generator) => Ok(Some(Arc::clone(generator))),
            GeneratorOrBuilder::Builder(builder) => {
                let key = tag.unwrap_or_default();
                let remarks = self.inputs.holder.remarks_for(slot.path, key);
                let mut params = config.params().clone();
                params.extend(self.inputs.holder.params_for(slot.path, key));
                let request = BuildRequest {
                    path: slot.path,
                    field_name: slot.field_name,
                    field_type,
                    config,
                    tag,
                    enum_labels: self.enum_labels(field_type),
                    remarks: &remarks,
                    params: &params,
                };
                let built = builder.build(&request);
                self.collect(slot.path, built)
            }
        }
    }

    fn compose_custom(
        &mut self,
        slot: &Slot<'_>,
        config: &EffectiveConfig,
    ) -> Result<Composed, GenerationError> {
        let Some(name) = config.generator() else {
            return self.collect(
                slot.path,
                Err(GenerationError::InvalidConfig(
                    "custom rule needs a 'generator' attribute".to_string(),
                )),
            );
        };
        let mut params = config.params().clone();
        params.extend(self.inputs.holder.params_for(slot.path, name));
        let remarks = self.inputs.holder.remarks_for(slot.path, name);
        let adapter = self.inputs.customs.instantiate(name, params, remarks)?;
        Ok(Some(Arc::new(adapter)))
    }

    fn compose_nested(
        &mut self,
        field_type: &FieldType,
        slot: &Slot<'_>,
        selection: SelectionMode,
    ) -> Result<Composed, GenerationError> {
        let Some(type_name) = field_type.object_name() else {
            return self.collect(
                slot.path,
                Err(GenerationError::InvalidConfig(format!(
                    "nested generation needs an object type, found {field_type}"
                ))),
            );
        };
        if !self.inputs.registry.contains(type_name) {
            warn!(path = slot.path, type_name, "unknown nested type; field left unset");
            self.report.record_skipped(Diagnostic::warning(
                "unknown_type",
                slot.path,
                format!("type '{type_name}' is not registered"),
            ));
            return Ok(None);
        }
        if slot.depth >= self.inputs.options.max_depth {
            warn!(
                path = slot.path,
                max_depth = self.inputs.options.max_depth,
                "nesting too deep; field left unset"
            );
            self.report.record_skipped(Diagnostic::warning(
                "max_depth_reached",
                slot.path,
                format!(
                    "nesting deeper than {} levels is not generated",
                    self.inputs.options.max_depth
                ),
            ));
            return Ok(None);
        }

        let node = self.tree.get_or_create(slot.path)?;
        let own = self
            .tree
            .node(node)
            .map(|node| node.scopes.clone())
            .unwrap_or_default();
        let scopes = ConfigurationScopes::inherit(slot.scopes, &own);
        let composition = self.compose_type(type_name, node, &scopes, slot.depth + 1)?;
        Ok(Some(Arc::new(NestedGenerator::new(composition, selection))))
    }

    fn sizing(
        &mut self,
        config: &EffectiveConfig,
        path: &str,
    ) -> Result<Option<Sizing>, GenerationError> {
        let range = config.size_range();
        let Some((min, max)) = self.collect(path, range)? else {
            return Ok(None);
        };
        Ok(Some(Sizing {
            min,
            max,
            selection: config.size_selection(),
            max_attempts: self.inputs.options.max_attempts_element,
        }))
    }

    fn wrap_collection(
        &mut self,
        field_type: &FieldType,
        element: Arc<dyn Generator>,
        element_type: &FieldType,
        config: &EffectiveConfig,
        slot: &Slot<'_>,
    ) -> Result<Composed, GenerationError> {
        let Some(sizing) = self.sizing(config, slot.path)? else {
            return Ok(None);
        };
        let Some(shape) = CollectionShape::of(field_type) else {
            return self.collect(
                slot.path,
                Err(GenerationError::InvalidConfig(format!(
                    "collection generation needs a list, set or array, found {field_type}"
                ))),
            );
        };
        Ok(Some(Arc::new(CollectionGenerator::new(
            shape,
            element,
            element_type.clone(),
            sizing,
        ))))
    }

    fn wrap_map(
        &mut self,
        key: (Arc<dyn Generator>, &FieldType),
        value: (Arc<dyn Generator>, &FieldType),
        config: &EffectiveConfig,
        slot: &Slot<'_>,
    ) -> Result<Composed, GenerationError> {
        let Some(sizing) = self.sizing(config, slot.path)? else {
            return Ok(None);
        };
        Ok(Some(Arc::new(MapGenerator::new(
            key.0,
            value.0,
            key.1.clone(),
            value.1.clone(),
            sizing,
        ))))
    }

    /// Record invalid configuration against `path` and keep scanning;
    /// propagate anything else.
    fn collect<T>(
        &mut self,
        path: &str,
        result: Result<T, GenerationError>,
    ) -> Result<Option<T>, GenerationError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(GenerationError::InvalidConfig(message)) => {
                self.issues
                    .push_error(ValidationIssue::error("invalid_config", path, message));
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }
}
