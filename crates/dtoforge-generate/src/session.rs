use std::sync::Arc;

use rand::RngCore;
use tracing::info;

use dtoforge_core::{Record, TypeRegistry};
use dtoforge_rules::{GroupFilter, RuleCatalog, RuleCategory, TypeMatcher};

use crate::compiled::CompiledComposition;
use crate::composer::{ComposeInputs, Composer};
use crate::config::{ConfigurationScopes, PartialConfig};
use crate::errors::GenerationError;
use crate::generators::{
    BuilderRegistry, CustomFactory, CustomGenerator, CustomRegistry, GeneratorBuilder,
};
use crate::global::global_snapshot;
use crate::model::{CompositionReport, GenerateOptions};
use crate::overrides::{GeneratorOrBuilder, OverrideRegistry};
use crate::path::{PathTree, ROOT};
use crate::remarks::{HolderScope, RemarkAndParamHolder};

/// Configuration-time state for composing generators.
///
/// All configuration goes through `&mut self` and must finish before the
/// compiled composition is shared for generation. Cloning a session gives
/// an independent copy of every scope, override and remark.
#[derive(Debug, Clone)]
pub struct BuildSession {
    registry: Arc<TypeRegistry>,
    catalog: RuleCatalog,
    builders: BuilderRegistry,
    customs: CustomRegistry,
    filter: GroupFilter,
    overrides: OverrideRegistry,
    holder: RemarkAndParamHolder,
    tree: PathTree,
    options: GenerateOptions,
}

fn is_container_key(type_key: &str) -> bool {
    ["list<", "set<", "array<", "map<"]
        .iter()
        .any(|prefix| type_key.starts_with(prefix))
}

impl BuildSession {
    pub fn new(registry: impl Into<Arc<TypeRegistry>>) -> Self {
        Self {
            registry: registry.into(),
            catalog: RuleCatalog::builtin(),
            builders: BuilderRegistry::builtin(),
            customs: CustomRegistry::new(),
            filter: GroupFilter::new(),
            overrides: OverrideRegistry::new(),
            holder: RemarkAndParamHolder::new(),
            tree: PathTree::new(),
            options: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: GenerateOptions) {
        self.options = options;
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The first call replaces the implicit default group; later calls add.
    pub fn include_groups<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.include(names);
        self
    }

    pub fn groups(&self) -> &GroupFilter {
        &self.filter
    }

    /// PerInstance scope of the root object, inherited by nested objects.
    pub fn configure_instance(&mut self, config: PartialConfig) -> &mut Self {
        self.root_scopes_mut().set_instance(config);
        self
    }

    /// PerDeclaredType scope, keyed like [`dtoforge_core::FieldType::type_key`].
    pub fn configure_type(
        &mut self,
        type_key: impl Into<String>,
        config: PartialConfig,
    ) -> &mut Self {
        self.root_scopes_mut().set_type(type_key, config);
        self
    }

    /// PerFieldName scope: applies to every field with this name.
    pub fn configure_field(
        &mut self,
        field_name: impl Into<String>,
        config: PartialConfig,
    ) -> &mut Self {
        self.root_scopes_mut().set_field(field_name, config);
        self
    }

    /// Scopes applied only inside the nested object at `path` (and below).
    /// The node is created if composition has not reached it yet.
    pub fn scopes_at(&mut self, path: &str) -> Result<&mut ConfigurationScopes, GenerationError> {
        let id = self.tree.get_or_create(path)?;
        self.tree
            .node_mut(id)
            .map(|node| &mut node.scopes)
            .ok_or_else(|| GenerationError::InvalidConfig(format!("no path node for '{path}'")))
    }

    pub fn scopes(&self) -> Option<&ConfigurationScopes> {
        self.tree.node(ROOT).map(|node| &node.scopes)
    }

    fn root_scopes_mut(&mut self) -> &mut ConfigurationScopes {
        // The root node is created with the tree and never removed.
        match self.tree.node_mut(ROOT) {
            Some(node) => &mut node.scopes,
            None => unreachable!("path tree without root"),
        }
    }

    /// Replace whatever would generate the field at `path`. Terminal: the
    /// field's rules are not consulted.
    pub fn override_path(
        &mut self,
        path: impl Into<String>,
        entry: GeneratorOrBuilder,
    ) -> Result<(), GenerationError> {
        let path = path.into();
        self.tree.get_or_create(&path)?;
        self.overrides.register_path(path, entry)
    }

    /// Replace generation for every non-container field of a declared type.
    pub fn override_type(
        &mut self,
        type_key: impl Into<String>,
        entry: GeneratorOrBuilder,
    ) -> Result<(), GenerationError> {
        let type_key = type_key.into();
        if is_container_key(&type_key) {
            return Err(GenerationError::InvalidConfig(format!(
                "container type '{type_key}' can only be overridden by field path"
            )));
        }
        self.overrides.register_type(type_key, entry)
    }

    /// Substitute the generator for every field whose active rule has `tag`.
    pub fn override_rule(
        &mut self,
        tag: impl Into<String>,
        entry: GeneratorOrBuilder,
    ) -> Result<(), GenerationError> {
        let tag = tag.into();
        match self.catalog.category(&tag) {
            None => Err(GenerationError::InvalidConfig(format!(
                "unknown rule tag '{tag}'"
            ))),
            Some(category) if category.is_container() => {
                Err(GenerationError::InvalidConfig(format!(
                    "{category} rule '{tag}' can only be overridden by field path"
                )))
            }
            Some(_) => self.overrides.register_rule(tag, entry),
        }
    }

    pub fn set_remark(
        &mut self,
        scope: HolderScope,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), GenerationError> {
        self.holder.set_remark(scope, key, value)
    }

    pub fn set_param(
        &mut self,
        scope: HolderScope,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Result<(), GenerationError> {
        self.holder.set_param(scope, key, value)
    }

    pub fn register_custom(
        &mut self,
        name: impl Into<String>,
        factory: CustomFactory,
    ) -> Result<(), GenerationError> {
        self.customs.register(name, factory)
    }

    /// Register a custom generator type built by `make` for each field.
    pub fn register_custom_with<F, G>(
        &mut self,
        name: impl Into<String>,
        make: F,
    ) -> Result<(), GenerationError>
    where
        F: Fn() -> G + Send + Sync + 'static,
        G: CustomGenerator + 'static,
    {
        let factory: CustomFactory = Arc::new(move || Box::new(make()) as Box<dyn CustomGenerator>);
        self.customs.register(name, factory)
    }

    /// Add a Basic rule tag with its own builder.
    pub fn register_rule_tag(
        &mut self,
        tag: impl Into<String>,
        accepts: TypeMatcher,
        builder: Arc<dyn GeneratorBuilder>,
    ) -> Result<(), GenerationError> {
        let tag = tag.into();
        if self.catalog.get(&tag).is_some() {
            return Err(GenerationError::ConfigurationConflict(format!(
                "rule tag '{tag}' is already registered"
            )));
        }
        self.builders.register(tag.clone(), builder)?;
        self.catalog.register(tag, RuleCategory::Basic, accepts);
        Ok(())
    }

    pub fn compile(
        &mut self,
        root_type: &str,
    ) -> Result<Arc<CompiledComposition>, GenerationError> {
        self.compile_with_report(root_type)
            .map(|(composition, _)| composition)
    }

    /// Scan the whole object graph below `root_type`. Any structural issue
    /// aborts with every issue found; nothing is generated.
    pub fn compile_with_report(
        &mut self,
        root_type: &str,
    ) -> Result<(Arc<CompiledComposition>, CompositionReport), GenerationError> {
        if !self.registry.contains(root_type) {
            return Err(GenerationError::UnknownType(root_type.to_string()));
        }
        info!(root_type, "compiling composition");
        self.tree.clear_compiled();
        let root_scopes = self.scopes().cloned().unwrap_or_default();
        let inputs = ComposeInputs {
            registry: &self.registry,
            catalog: &self.catalog,
            filter: &self.filter,
            builders: &self.builders,
            customs: &self.customs,
            overrides: &self.overrides,
            holder: &self.holder,
            options: &self.options,
            global: global_snapshot(),
        };
        let mut composer = Composer::new(inputs, &mut self.tree, root_type);
        let composition = composer.compose_type(root_type, ROOT, &root_scopes, 0)?;
        let (issues, report) = composer.finish();
        if !issues.is_ok() {
            return Err(GenerationError::Structural(issues));
        }
        info!(
            root_type,
            fields_composed = report.fields_composed,
            fields_skipped = report.fields_skipped,
            "composition compiled"
        );
        Ok((composition, report))
    }

    /// Composition compiled for the object at `path` by the last compile.
    pub fn compiled_at(&self, path: &str) -> Option<Arc<CompiledComposition>> {
        let id = self.tree.find(path)?;
        self.tree.node(id).and_then(|node| node.compiled.clone())
    }

    pub fn path_tree(&self) -> &PathTree {
        &self.tree
    }

    /// Compile `root_type` and generate one fresh instance.
    pub fn generate(
        &mut self,
        root_type: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Record, GenerationError> {
        self.compile(root_type)?.generate(rng)
    }

    /// Compile the record's type and fill the caller-supplied instance.
    pub fn populate(
        &mut self,
        record: &mut Record,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        let composition = self.compile(&record.type_name.clone())?;
        composition.populate(record, rng)
    }
}
