use crate::attr::{Arena, Attr, AttrId, KeyValue, Parent};
use crate::error::{Result, TycoError};
use crate::schema::StructDef;
use crate::serialization::Value;
use crate::source::SourceLocation;
use crate::template;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashMap;
use std::path::PathBuf;

/// Local defaults tables captured when a file finishes lexing, keyed by
/// struct name. Re-including a cached file replays these into the including
/// file instead of re-lexing it.
pub(crate) type IncludeDefaults = HashMap<String, IndexMap<String, AttrId>>;

/// Shared state of one parse session: the attribute arena, struct and
/// global registries, and the include cache. All loaded files feed the same
/// context; resolution runs once over the merged result.
#[derive(Debug, Default)]
pub struct Context {
    pub(crate) arena: Arena,
    pub(crate) structs: IndexMap<String, StructDef>,
    pub(crate) globals: IndexMap<String, AttrId>,
    pub(crate) include_cache: HashMap<PathBuf, IncludeDefaults>,
    object_cache: Option<Value>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    pub(crate) fn add_struct(&mut self, name: &str, location: Option<SourceLocation>) -> &mut StructDef {
        self.structs
            .entry(name.to_string())
            .or_insert_with(|| StructDef::new(name, location))
    }

    /// Registers a global. A name may only be declared once across all
    /// loaded files.
    pub(crate) fn add_global(&mut self, name: &str, id: AttrId) -> Result<()> {
        if self.globals.contains_key(name) {
            return Err(TycoError::schema(
                format!("duplicate global attribute {name}"),
                self.arena.get(id).location().cloned(),
            ));
        }
        self.globals.insert(name.to_string(), id);
        Ok(())
    }

    pub fn global(&self, name: &str) -> Option<AttrId> {
        self.globals.get(name).copied()
    }

    pub(crate) fn add_instance(&mut self, type_name: &str, id: AttrId) {
        if let Some(def) = self.structs.get_mut(type_name) {
            def.instances.push(id);
        }
    }

    /// Builds an instance of `type_name`. Arguments carry their keyword
    /// name on the attribute itself when one was written; unnamed arguments
    /// bind positionally to fields in declaration order, and no positional
    /// argument may follow a keyword one. Absent fields fall back to a deep
    /// copy of the active default, local overrides before schema-level.
    pub(crate) fn create_instance(
        &mut self,
        type_name: &str,
        args: Vec<AttrId>,
        local_defaults: Option<&IndexMap<String, AttrId>>,
        location: Option<SourceLocation>,
    ) -> Result<AttrId> {
        let def = self.structs.get(type_name).ok_or_else(|| {
            TycoError::binding(format!("unknown struct {type_name}"), location.clone())
        })?;
        let field_names = def.field_names();
        let schemas: Vec<_> = def.fields.values().cloned().collect();

        let mut kwargs_only = false;
        let mut bound: IndexMap<String, AttrId> = IndexMap::new();
        for (i, arg) in args.into_iter().enumerate() {
            let arg_location = self.arena.get(arg).location().cloned().or_else(|| location.clone());
            let name = match self.arena.get(arg).attr_name() {
                Some(name) => {
                    kwargs_only = true;
                    if !field_names.iter().any(|f| f == name) {
                        return Err(TycoError::binding(
                            format!("invalid attribute {name} for {type_name}"),
                            arg_location,
                        ));
                    }
                    name.to_string()
                }
                None => {
                    if kwargs_only {
                        return Err(TycoError::binding(
                            format!("cannot use positional values after keyed values for {type_name}"),
                            arg_location,
                        ));
                    }
                    if i >= field_names.len() {
                        return Err(TycoError::binding(
                            format!("too many positional arguments for {type_name}"),
                            arg_location,
                        ));
                    }
                    let name = field_names[i].clone();
                    self.arena.set_attr_name(arg, &name);
                    name
                }
            };
            if bound.insert(name.clone(), arg).is_some() {
                return Err(TycoError::binding(
                    format!("attribute {name} given twice for {type_name}"),
                    arg_location,
                ));
            }
        }

        let mut fields: IndexMap<String, AttrId> = IndexMap::new();
        for (name, schema) in field_names.iter().zip(schemas) {
            let attr = match bound.shift_remove(name) {
                Some(attr) => attr,
                None => {
                    let default = local_defaults
                        .and_then(|table| table.get(name).copied())
                        .or(schema.default);
                    match default {
                        Some(default) => self.arena.deep_copy(default),
                        None => {
                            return Err(TycoError::binding(
                                format!("invalid attribute {name} for {type_name}: mandatory field missing"),
                                location,
                            ));
                        }
                    }
                }
            };
            self.arena.apply_schema_info(
                attr,
                Some(&schema.type_name),
                Some(name),
                Some(schema.is_nullable),
                Some(schema.is_array),
            )?;
            fields.insert(name.clone(), attr);
        }

        Ok(self.arena.alloc_instance(type_name.to_string(), fields, location))
    }

    /// Runs the five resolution phases in their fixed order. Every phase
    /// completes over the whole context before the next starts, so later
    /// phases can rely on the earlier ones globally.
    pub fn render_content(&mut self) -> Result<()> {
        debug!(
            "binding parents for {} globals, {} structs",
            self.globals.len(),
            self.structs.len()
        );
        for id in self.global_roots() {
            self.arena.set_parent(id, Some(Parent::Globals));
        }
        for id in self.instance_roots() {
            self.arena.set_parent(id, None);
        }

        debug!("rendering base content");
        for id in self.all_roots() {
            self.arena.render_base(id)?;
        }

        debug!("indexing primary keys");
        self.load_primary_keys()?;

        debug!("resolving references");
        for id in self.all_roots() {
            self.render_references(id)?;
        }

        debug!("rendering templates");
        template::render_templates(self)?;
        Ok(())
    }

    fn global_roots(&self) -> Vec<AttrId> {
        self.globals.values().copied().collect()
    }

    fn instance_roots(&self) -> Vec<AttrId> {
        self.structs
            .values()
            .flat_map(|def| def.instances.iter().copied())
            .collect()
    }

    pub(crate) fn all_roots(&self) -> Vec<AttrId> {
        let mut roots = self.global_roots();
        roots.extend(self.instance_roots());
        roots
    }

    fn load_primary_keys(&mut self) -> Result<()> {
        let struct_names: Vec<String> = self.structs.keys().cloned().collect();
        for name in struct_names {
            let def = &self.structs[&name];
            if !def.has_primary_keys() {
                continue;
            }
            let pk_names = def.primary_keys.clone();
            let instances = def.instances.clone();

            let mut index: HashMap<Vec<KeyValue>, AttrId> = HashMap::new();
            for instance in instances {
                let key = self.primary_key_of(instance, &pk_names)?;
                if let Some(earlier) = index.insert(key.clone(), instance) {
                    let earlier_at = self
                        .arena
                        .get(earlier)
                        .location()
                        .map(|l| l.to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    return Err(TycoError::binding(
                        format!(
                            "duplicate primary key {}({}), first declared at {}",
                            name,
                            join_key(&key),
                            earlier_at,
                        ),
                        self.arena.get(instance).location().cloned(),
                    ));
                }
            }
            self.structs[&name].pk_index = index;
        }
        Ok(())
    }

    fn primary_key_of(&self, instance: AttrId, pk_names: &[String]) -> Result<Vec<KeyValue>> {
        let Attr::Instance(inst) = self.arena.get(instance) else {
            return Err(TycoError::binding(
                "primary key lookup on non-instance".to_string(),
                self.arena.get(instance).location().cloned(),
            ));
        };
        let mut key = Vec::with_capacity(pk_names.len());
        for pk in pk_names {
            let field = inst.fields.get(pk).copied().ok_or_else(|| {
                TycoError::binding(
                    format!("primary key field {pk} missing on {}", inst.type_name),
                    inst.location.clone(),
                )
            })?;
            let rendered = self.arena.rendered(field).ok_or_else(|| {
                TycoError::binding(
                    format!(
                        "primary key field {pk} of {} did not render to a scalar",
                        inst.type_name
                    ),
                    inst.location.clone(),
                )
            })?;
            key.push(KeyValue::from(rendered));
        }
        Ok(key)
    }

    /// Reference-resolution walk: every `Type(args)` attribute reachable
    /// from `id` is bound to the instance its key tuple names.
    fn render_references(&mut self, id: AttrId) -> Result<()> {
        match self.arena.get(id) {
            Attr::Value(_) => Ok(()),
            Attr::Array(a) => {
                let items = a.items.clone();
                for item in items {
                    self.render_references(item)?;
                }
                Ok(())
            }
            Attr::Instance(i) => {
                let fields: Vec<AttrId> = i.fields.values().copied().collect();
                for field in fields {
                    self.render_references(field)?;
                }
                Ok(())
            }
            Attr::Reference(_) => self.resolve_reference(id),
        }
    }

    /// Binds the reference's arguments against the target's primary-key
    /// fields, builds the key tuple in declared order, and looks it up.
    fn resolve_reference(&mut self, id: AttrId) -> Result<()> {
        let Attr::Reference(reference) = self.arena.get(id) else {
            unreachable!("resolve_reference called on non-reference");
        };
        let type_name = reference.type_name.clone();
        let args = reference.args.clone();
        let location = reference.location.clone();
        if reference.resolved.is_some() {
            return Err(TycoError::reference(
                format!("reference to {type_name} resolved twice"),
                location,
            ));
        }

        let def = self.structs.get(&type_name).ok_or_else(|| {
            TycoError::reference(
                format!("unable to find reference {type_name}: unknown struct"),
                location.clone(),
            )
        })?;
        let pk_names = def.primary_keys.clone();
        if pk_names.is_empty() {
            return Err(TycoError::reference(
                format!("struct {type_name} has no primary keys to reference"),
                location,
            ));
        }

        let mut kwargs_only = false;
        let mut by_name: IndexMap<String, AttrId> = IndexMap::new();
        for (i, arg) in args.into_iter().enumerate() {
            let arg_location = self.arena.get(arg).location().cloned().or_else(|| location.clone());
            let name = match self.arena.get(arg).attr_name() {
                Some(name) => {
                    kwargs_only = true;
                    name.to_string()
                }
                None => {
                    if kwargs_only {
                        return Err(TycoError::reference(
                            format!("cannot use positional values after keyed values for reference to {type_name}"),
                            arg_location,
                        ));
                    }
                    if i >= pk_names.len() {
                        return Err(TycoError::reference(
                            format!("too many arguments for reference to {type_name}"),
                            arg_location,
                        ));
                    }
                    let name = pk_names[i].clone();
                    self.arena.set_attr_name(arg, &name);
                    name
                }
            };
            if !pk_names.iter().any(|pk| pk == &name) {
                return Err(TycoError::reference(
                    format!("{name} is not a primary key of {type_name}"),
                    arg_location,
                ));
            }
            let schema = self.structs[&type_name].fields[&name].clone();
            self.arena.apply_schema_info(
                arg,
                Some(&schema.type_name),
                Some(&name),
                Some(schema.is_nullable),
                Some(schema.is_array),
            )?;
            self.arena.render_base(arg)?;
            by_name.insert(name, arg);
        }

        let mut key = Vec::with_capacity(pk_names.len());
        for pk in &pk_names {
            let arg = by_name.get(pk).copied().ok_or_else(|| {
                TycoError::reference(
                    format!("reference to {type_name} missing key {pk}"),
                    location.clone(),
                )
            })?;
            let rendered = self.arena.rendered(arg).ok_or_else(|| {
                TycoError::reference(
                    format!("reference key {pk} for {type_name} did not render to a scalar"),
                    location.clone(),
                )
            })?;
            key.push(KeyValue::from(rendered));
        }

        let target = self.structs[&type_name].pk_index.get(&key).copied();
        let Some(target) = target else {
            return Err(TycoError::reference(
                format!("unable to find reference {}({})", type_name, join_key(&key)),
                location,
            ));
        };

        let Attr::Reference(reference) = self.arena.get_mut(id) else {
            unreachable!();
        };
        reference.resolved = Some(target);
        Ok(())
    }

    /// Memoized whole-context materialization: every global by name, then
    /// every struct with primary keys as the ordered list of its instances.
    pub fn to_object(&mut self) -> Value {
        if let Some(cached) = &self.object_cache {
            return cached.clone();
        }
        let mut out: IndexMap<String, Value> = IndexMap::new();
        let globals: Vec<(String, AttrId)> = self
            .globals
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        for (name, id) in globals {
            out.insert(name, self.arena.object_view(id));
        }
        let structs: Vec<(String, Vec<AttrId>, bool)> = self
            .structs
            .iter()
            .map(|(name, def)| (name.clone(), def.instances.clone(), def.has_primary_keys()))
            .collect();
        for (name, instances, keyed) in structs {
            if !keyed {
                continue;
            }
            let rendered: Vec<Value> = instances
                .into_iter()
                .map(|id| self.arena.object_view(id))
                .collect();
            out.insert(name, Value::Array(rendered));
        }
        let value = Value::Object(out);
        self.object_cache = Some(value.clone());
        value
    }
}

fn join_key(key: &[KeyValue]) -> String {
    key.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
