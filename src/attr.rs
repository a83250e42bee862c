use crate::error::{Result, TycoError};
use crate::serialization::Value;
use crate::source::SourceLocation;
use crate::utils;
use indexmap::IndexMap;
use std::fmt;

/// Base scalar type tags a schema may declare.
pub const BASE_TYPES: &[&str] = &[
    "str", "int", "bool", "float", "decimal", "date", "time", "datetime",
];

/// Handle into the attribute arena. Attributes form a tree with upward
/// parent links; indices break the ownership cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(pub(crate) usize);

/// What an attribute hangs off of, for template scope traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// The context's global table.
    Globals,
    /// A containing Instance or Array.
    Attr(AttrId),
}

/// Native value of a rendered scalar. Decimals keep their canonical source
/// text so template substitution preserves the written precision; the JSON
/// view converts them to floating point.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Decimal(String),
    Bool(bool),
}

impl Rendered {
    /// Template placeholders may only interpolate strings and numbers.
    pub fn as_template_text(&self) -> Option<String> {
        match self {
            Rendered::Str(s) => Some(s.clone()),
            Rendered::Int(i) => Some(i.to_string()),
            Rendered::Float(f) => Some(f.to_string()),
            Rendered::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Null => write!(f, "null"),
            Rendered::Str(s) => write!(f, "{s}"),
            Rendered::Int(i) => write!(f, "{i}"),
            Rendered::Float(v) => write!(f, "{v}"),
            Rendered::Decimal(d) => write!(f, "{d}"),
            Rendered::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Hashable form of a rendered scalar, used for primary-key index tuples.
/// Floats hash by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Decimal(String),
    Str(String),
}

impl From<&Rendered> for KeyValue {
    fn from(rendered: &Rendered) -> Self {
        match rendered {
            Rendered::Null => KeyValue::Null,
            Rendered::Bool(b) => KeyValue::Bool(*b),
            Rendered::Int(i) => KeyValue::Int(*i),
            Rendered::Float(f) => KeyValue::Float(f.to_bits()),
            Rendered::Decimal(d) => KeyValue::Decimal(d.clone()),
            Rendered::Str(s) => KeyValue::Str(s.clone()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Null => write!(f, "null"),
            KeyValue::Bool(b) => write!(f, "{b}"),
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyValue::Decimal(d) => write!(f, "{d}"),
            KeyValue::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Schema facets shared by every attribute variant. Type, nullable and
/// array are write-once: a conflicting rebind is a binding error.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub type_name: Option<String>,
    pub attr_name: Option<String>,
    pub nullable: Option<bool>,
    pub array: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ValueAttr {
    pub raw: String,
    pub facets: Facets,
    pub parent: Option<Parent>,
    pub location: Option<SourceLocation>,
    pub literal_str: bool,
    pub rendered: Option<Rendered>,
}

#[derive(Debug, Clone)]
pub struct ArrayAttr {
    pub items: Vec<AttrId>,
    pub facets: Facets,
    pub parent: Option<Parent>,
    pub location: Option<SourceLocation>,
    pub object_cache: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct InstanceAttr {
    pub type_name: String,
    pub fields: IndexMap<String, AttrId>,
    pub facets: Facets,
    pub parent: Option<Parent>,
    pub location: Option<SourceLocation>,
    pub object_cache: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct ReferenceAttr {
    pub type_name: String,
    pub args: Vec<AttrId>,
    pub facets: Facets,
    pub parent: Option<Parent>,
    pub location: Option<SourceLocation>,
    /// Target instance, set exactly once during reference resolution.
    pub resolved: Option<AttrId>,
}

/// Closed set of attribute shapes. Operations dispatch by exhaustive match
/// rather than virtual calls.
#[derive(Debug, Clone)]
pub enum Attr {
    Value(ValueAttr),
    Array(ArrayAttr),
    Instance(InstanceAttr),
    Reference(ReferenceAttr),
}

impl Attr {
    pub fn facets(&self) -> &Facets {
        match self {
            Attr::Value(v) => &v.facets,
            Attr::Array(a) => &a.facets,
            Attr::Instance(i) => &i.facets,
            Attr::Reference(r) => &r.facets,
        }
    }

    fn facets_mut(&mut self) -> &mut Facets {
        match self {
            Attr::Value(v) => &mut v.facets,
            Attr::Array(a) => &mut a.facets,
            Attr::Instance(i) => &mut i.facets,
            Attr::Reference(r) => &mut r.facets,
        }
    }

    pub fn attr_name(&self) -> Option<&str> {
        self.facets().attr_name.as_deref()
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        match self {
            Attr::Value(v) => v.location.as_ref(),
            Attr::Array(a) => a.location.as_ref(),
            Attr::Instance(i) => i.location.as_ref(),
            Attr::Reference(r) => r.location.as_ref(),
        }
    }

    pub fn parent(&self) -> Option<Parent> {
        match self {
            Attr::Value(v) => v.parent,
            Attr::Array(a) => a.parent,
            Attr::Instance(i) => i.parent,
            Attr::Reference(r) => r.parent,
        }
    }
}

/// Flat storage for every attribute of one parse session. Attributes are
/// never removed; the arena lives as long as its [`crate::context::Context`].
#[derive(Debug, Default)]
pub struct Arena {
    attrs: Vec<Attr>,
}

impl Arena {
    pub fn new() -> Self {
        Arena::default()
    }

    pub fn alloc(&mut self, attr: Attr) -> AttrId {
        let id = AttrId(self.attrs.len());
        self.attrs.push(attr);
        id
    }

    pub fn alloc_value(&mut self, raw: String, location: Option<SourceLocation>) -> AttrId {
        self.alloc(Attr::Value(ValueAttr {
            raw,
            facets: Facets::default(),
            parent: None,
            location,
            literal_str: false,
            rendered: None,
        }))
    }

    pub fn alloc_array(&mut self, items: Vec<AttrId>, location: Option<SourceLocation>) -> AttrId {
        self.alloc(Attr::Array(ArrayAttr {
            items,
            facets: Facets::default(),
            parent: None,
            location,
            object_cache: None,
        }))
    }

    pub fn alloc_instance(
        &mut self,
        type_name: String,
        fields: IndexMap<String, AttrId>,
        location: Option<SourceLocation>,
    ) -> AttrId {
        self.alloc(Attr::Instance(InstanceAttr {
            type_name,
            fields,
            facets: Facets::default(),
            parent: None,
            location,
            object_cache: None,
        }))
    }

    pub fn alloc_reference(
        &mut self,
        type_name: String,
        args: Vec<AttrId>,
        location: Option<SourceLocation>,
    ) -> AttrId {
        self.alloc(Attr::Reference(ReferenceAttr {
            type_name,
            args,
            facets: Facets::default(),
            parent: None,
            location,
            resolved: None,
        }))
    }

    pub fn get(&self, id: AttrId) -> &Attr {
        &self.attrs[id.0]
    }

    pub fn get_mut(&mut self, id: AttrId) -> &mut Attr {
        &mut self.attrs[id.0]
    }

    /// Fresh owned copy of a whole subtree. Parent links are left unset;
    /// they are (re)assigned by the parent-binding phase or by instance
    /// construction.
    pub fn deep_copy(&mut self, id: AttrId) -> AttrId {
        let copied = match self.get(id).clone() {
            Attr::Value(mut v) => {
                v.parent = None;
                Attr::Value(v)
            }
            Attr::Array(mut a) => {
                a.items = a.items.iter().map(|item| self.deep_copy(*item)).collect();
                a.parent = None;
                a.object_cache = None;
                Attr::Array(a)
            }
            Attr::Instance(mut i) => {
                i.fields = i
                    .fields
                    .iter()
                    .map(|(name, field)| (name.clone(), *field))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .map(|(name, field)| (name, self.deep_copy(field)))
                    .collect();
                i.parent = None;
                i.object_cache = None;
                Attr::Instance(i)
            }
            Attr::Reference(mut r) => {
                r.args = r.args.iter().map(|arg| self.deep_copy(*arg)).collect();
                r.parent = None;
                Attr::Reference(r)
            }
        };
        self.alloc(copied)
    }

    /// Dotted display path for error messages: owning instance type plus
    /// field name, or whatever part of that is known.
    pub fn display_path(&self, id: AttrId) -> String {
        let attr = self.get(id);
        let name = attr.attr_name().unwrap_or("?");
        match attr.parent() {
            Some(Parent::Attr(parent_id)) => match self.get(parent_id) {
                Attr::Instance(inst) => format!("{}.{}", inst.type_name, name),
                _ => name.to_string(),
            },
            Some(Parent::Globals) => format!("global.{name}"),
            None => name.to_string(),
        }
    }

    /// Binds schema information onto an attribute. Each facet is
    /// write-once: rebinding to an equal value is a no-op, a conflicting
    /// rebind fails. Arrays propagate the binding to their elements.
    pub fn apply_schema_info(
        &mut self,
        id: AttrId,
        type_name: Option<&str>,
        attr_name: Option<&str>,
        nullable: Option<bool>,
        array: Option<bool>,
    ) -> Result<()> {
        let path = self.display_path(id);
        let location = self.get(id).location().cloned();

        match self.get_mut(id) {
            Attr::Value(value) => {
                if let Some(t) = type_name {
                    if !BASE_TYPES.contains(&t) && t != "null" {
                        return Err(TycoError::binding(
                            format!(
                                "{} expected for {}, likely needs {}({})",
                                t, value.raw, t, value.raw
                            ),
                            location,
                        ));
                    }
                    bind_facet(&mut value.facets.type_name, t.to_string(), "type", &path, &location)?;
                }
                if let Some(name) = attr_name {
                    value.facets.attr_name = Some(name.to_string());
                }
                if let Some(n) = nullable {
                    bind_facet(&mut value.facets.nullable, n, "nullable", &path, &location)?;
                }
                if let Some(a) = array {
                    bind_facet(&mut value.facets.array, a, "array", &path, &location)?;
                }
                let null_escape = value.facets.nullable == Some(true) && value.raw == "null";
                if value.facets.array == Some(true) && !null_escape {
                    return Err(TycoError::binding(
                        format!("array expected for {path}: {}", value.raw),
                        location,
                    ));
                }
            }
            Attr::Instance(instance) => {
                if let Some(t) = type_name {
                    if instance.type_name != t {
                        return Err(TycoError::binding(
                            format!(
                                "expected {t} for {path}, instead have {}",
                                instance.type_name
                            ),
                            location,
                        ));
                    }
                }
                if let Some(name) = attr_name {
                    instance.facets.attr_name = Some(name.to_string());
                }
                if let Some(n) = nullable {
                    bind_facet(&mut instance.facets.nullable, n, "nullable", &path, &location)?;
                }
                if let Some(a) = array {
                    bind_facet(&mut instance.facets.array, a, "array", &path, &location)?;
                }
                if instance.facets.array == Some(true) {
                    return Err(TycoError::binding(
                        format!("expected array for {path}, instead have {} instance", instance.type_name),
                        location,
                    ));
                }
            }
            Attr::Reference(reference) => {
                if let Some(t) = type_name {
                    if reference.type_name != t {
                        return Err(TycoError::binding(
                            format!(
                                "expected {t} for {path}, instead have reference to {}",
                                reference.type_name
                            ),
                            location,
                        ));
                    }
                }
                if let Some(name) = attr_name {
                    reference.facets.attr_name = Some(name.to_string());
                }
                if let Some(n) = nullable {
                    bind_facet(&mut reference.facets.nullable, n, "nullable", &path, &location)?;
                }
                if let Some(a) = array {
                    bind_facet(&mut reference.facets.array, a, "array", &path, &location)?;
                }
                if reference.facets.array == Some(true) {
                    return Err(TycoError::binding(
                        format!(
                            "expected array for {path}, instead have reference to {}",
                            reference.type_name
                        ),
                        location,
                    ));
                }
            }
            Attr::Array(arr) => {
                if let Some(t) = type_name {
                    bind_facet(&mut arr.facets.type_name, t.to_string(), "type", &path, &location)?;
                }
                if let Some(name) = attr_name {
                    arr.facets.attr_name = Some(name.to_string());
                }
                if let Some(n) = nullable {
                    bind_facet(&mut arr.facets.nullable, n, "nullable", &path, &location)?;
                }
                if let Some(a) = array {
                    bind_facet(&mut arr.facets.array, a, "array", &path, &location)?;
                }
                if arr.facets.array == Some(false) {
                    return Err(TycoError::binding(
                        format!("schema for {path} needs to indicate array with []"),
                        location,
                    ));
                }
                // Elements inherit the declared element type; they are
                // scalars (or nested constructs) themselves, never arrays.
                let element_type = arr.facets.type_name.clone();
                let element_name = arr.facets.attr_name.clone();
                let items = arr.items.clone();
                for item in items {
                    self.apply_schema_info(
                        item,
                        element_type.as_deref(),
                        element_name.as_deref(),
                        Some(false),
                        Some(false),
                    )?;
                }
            }
        }
        Ok(())
    }

    pub fn set_attr_name(&mut self, id: AttrId, name: &str) {
        self.get_mut(id).facets_mut().attr_name = Some(name.to_string());
    }

    /// Parent-binding phase. Instances hand themselves down to their
    /// fields; arrays are transparent, passing their own parent through to
    /// each element.
    pub fn set_parent(&mut self, id: AttrId, parent: Option<Parent>) {
        match self.get_mut(id) {
            Attr::Value(v) => v.parent = parent,
            Attr::Reference(r) => r.parent = parent,
            Attr::Array(a) => {
                a.parent = parent;
                let items = a.items.clone();
                for item in items {
                    self.set_parent(item, parent);
                }
            }
            Attr::Instance(i) => {
                i.parent = parent;
                let fields: Vec<AttrId> = i.fields.values().copied().collect();
                for field in fields {
                    self.set_parent(field, Some(Parent::Attr(id)));
                }
            }
        }
    }

    /// Base-content rendering phase: raw text becomes a native value per
    /// the bound type tag. References are resolved in a later phase and do
    /// not render here.
    pub fn render_base(&mut self, id: AttrId) -> Result<()> {
        match self.get(id) {
            Attr::Value(_) => self.render_base_value(id),
            Attr::Array(a) => {
                let items = a.items.clone();
                for item in items {
                    self.render_base(item)?;
                }
                Ok(())
            }
            Attr::Instance(i) => {
                let fields: Vec<AttrId> = i.fields.values().copied().collect();
                for field in fields {
                    self.render_base(field)?;
                }
                Ok(())
            }
            Attr::Reference(_) => Ok(()),
        }
    }

    fn render_base_value(&mut self, id: AttrId) -> Result<()> {
        let path = self.display_path(id);
        let Attr::Value(value) = self.get_mut(id) else {
            unreachable!("render_base_value called on non-value");
        };
        if value.rendered.is_some() {
            return Ok(());
        }
        let location = value.location.clone();
        let (Some(type_name), Some(_)) = (
            value.facets.type_name.clone(),
            value.facets.attr_name.clone(),
        ) else {
            return Err(TycoError::binding(
                format!("attributes not set for {path}: {}", value.raw),
                location,
            ));
        };

        let raw = value.raw.clone();
        let rendered = if value.facets.nullable == Some(true) && raw == "null" {
            Rendered::Null
        } else {
            match type_name.as_str() {
                "str" => {
                    value.literal_str = raw.starts_with('\'');
                    Rendered::Str(unquote(&raw))
                }
                "int" => Rendered::Int(parse_int(&raw).ok_or_else(|| {
                    TycoError::binding(
                        format!("invalid int literal for {path}: {raw}"),
                        location.clone(),
                    )
                })?),
                "float" => Rendered::Float(raw.trim().parse::<f64>().map_err(|_| {
                    TycoError::binding(
                        format!("invalid float literal for {path}: {raw}"),
                        location.clone(),
                    )
                })?),
                "decimal" => {
                    let text = raw.trim().to_string();
                    if text.parse::<f64>().is_err() {
                        return Err(TycoError::binding(
                            format!("invalid decimal literal for {path}: {raw}"),
                            location,
                        ));
                    }
                    Rendered::Decimal(text)
                }
                "bool" => match raw.as_str() {
                    "true" => Rendered::Bool(true),
                    "false" => Rendered::Bool(false),
                    other => {
                        return Err(TycoError::binding(
                            format!("boolean {path} not in (true, false): {other}"),
                            location,
                        ));
                    }
                },
                "date" => Rendered::Str(raw.clone()),
                "time" => Rendered::Str(utils::normalize_time_literal(&raw)),
                "datetime" => Rendered::Str(utils::normalize_datetime_literal(&raw)),
                other => {
                    return Err(TycoError::binding(
                        format!("unknown type for {path}: {other}"),
                        location,
                    ));
                }
            }
        };

        let Attr::Value(value) = self.get_mut(id) else {
            unreachable!();
        };
        value.rendered = Some(rendered);
        Ok(())
    }

    /// Rendered scalar of a Value attribute, if any.
    pub fn rendered(&self, id: AttrId) -> Option<&Rendered> {
        match self.get(id) {
            Attr::Value(v) => v.rendered.as_ref(),
            _ => None,
        }
    }

    /// Follows a Reference through to its resolved target instance.
    pub fn deref_target(&self, id: AttrId) -> Option<AttrId> {
        match self.get(id) {
            Attr::Reference(r) => r.resolved,
            _ => None,
        }
    }

    /// Field lookup used by template path resolution: instances answer
    /// directly, references answer through their resolved target.
    pub fn field(&self, id: AttrId, name: &str) -> Option<AttrId> {
        match self.get(id) {
            Attr::Instance(i) => i.fields.get(name).copied(),
            Attr::Reference(r) => {
                let target = r.resolved?;
                self.field(target, name)
            }
            _ => None,
        }
    }

    /// Plain materialized tree with no remaining object identity. Decimals
    /// become floating point here, matching the JSON output contract.
    pub fn json_view(&self, id: AttrId) -> Value {
        match self.get(id) {
            Attr::Value(v) => match &v.rendered {
                None | Some(Rendered::Null) => Value::Null,
                Some(Rendered::Str(s)) => Value::String(s.clone()),
                Some(Rendered::Int(i)) => Value::Int(*i),
                Some(Rendered::Float(f)) => Value::Float(*f),
                Some(Rendered::Decimal(d)) => Value::Float(d.parse::<f64>().unwrap_or(f64::NAN)),
                Some(Rendered::Bool(b)) => Value::Bool(*b),
            },
            Attr::Array(a) => Value::Array(a.items.iter().map(|item| self.json_view(*item)).collect()),
            Attr::Instance(i) => Value::Object(
                i.fields
                    .iter()
                    .map(|(name, field)| (name.clone(), self.json_view(*field)))
                    .collect(),
            ),
            Attr::Reference(r) => match r.resolved {
                Some(target) => self.json_view(target),
                None => Value::Null,
            },
        }
    }

    /// Memoized materialization. Attributes are immutable once rendering
    /// finishes, so the cache is populated at most once and never cleared.
    pub fn object_view(&mut self, id: AttrId) -> Value {
        match self.get(id) {
            Attr::Array(a) => {
                if let Some(cached) = &a.object_cache {
                    return cached.clone();
                }
            }
            Attr::Instance(i) => {
                if let Some(cached) = &i.object_cache {
                    return cached.clone();
                }
            }
            Attr::Value(_) => return self.json_view(id),
            Attr::Reference(r) => {
                return match r.resolved {
                    Some(target) => self.object_view(target),
                    None => Value::Null,
                };
            }
        }
        let computed = self.json_view(id);
        match self.get_mut(id) {
            Attr::Array(a) => a.object_cache = Some(computed.clone()),
            Attr::Instance(i) => i.object_cache = Some(computed.clone()),
            _ => {}
        }
        computed
    }
}

fn bind_facet<T: PartialEq + fmt::Debug>(
    slot: &mut Option<T>,
    incoming: T,
    facet: &str,
    path: &str,
    location: &Option<SourceLocation>,
) -> Result<()> {
    match slot {
        None => {
            *slot = Some(incoming);
            Ok(())
        }
        Some(existing) if *existing == incoming => Ok(()),
        Some(existing) => Err(TycoError::binding(
            format!(
                "conflicting {facet} for {path}: already {existing:?}, rebound to {incoming:?}"
            ),
            location.clone(),
        )),
    }
}

/// Strips the quoting a raw string token still carries from the scanner.
fn unquote(raw: &str) -> String {
    if (raw.starts_with("'''") || raw.starts_with("\"\"\"")) && raw.len() >= 6 {
        let inner = &raw[3..raw.len() - 3];
        inner.strip_prefix('\n').unwrap_or(inner).to_string()
    } else if (raw.starts_with('\'') || raw.starts_with('"')) && raw.len() >= 2 {
        raw[1..raw.len() - 1].to_string()
    } else {
        raw.to_string()
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    let mut digits = raw.trim();
    let mut sign = 1i64;
    if let Some(rest) = digits.strip_prefix('-') {
        sign = -1;
        digits = rest;
    } else if let Some(rest) = digits.strip_prefix('+') {
        digits = rest;
    }
    let (radix, rest) = if let Some(rest) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = digits.strip_prefix("0o").or_else(|| digits.strip_prefix("0O")) {
        (8, rest)
    } else if let Some(rest) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        (2, rest)
    } else {
        (10, digits)
    };
    i64::from_str_radix(rest, radix).ok().map(|v| sign * v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_of(arena: &mut Arena, raw: &str, type_name: &str) -> Rendered {
        let id = arena.alloc_value(raw.to_string(), None);
        arena
            .apply_schema_info(id, Some(type_name), Some("x"), Some(false), Some(false))
            .unwrap();
        arena.render_base(id).unwrap();
        arena.rendered(id).unwrap().clone()
    }

    #[test]
    fn int_radix_prefixes() {
        let mut arena = Arena::new();
        assert_eq!(rendered_of(&mut arena, "0xff", "int"), Rendered::Int(255));
        assert_eq!(rendered_of(&mut arena, "0o17", "int"), Rendered::Int(15));
        assert_eq!(rendered_of(&mut arena, "0b101", "int"), Rendered::Int(5));
        assert_eq!(rendered_of(&mut arena, "-42", "int"), Rendered::Int(-42));
        assert_eq!(rendered_of(&mut arena, "+7", "int"), Rendered::Int(7));
    }

    #[test]
    fn str_unquoting_sets_literal_flag() {
        let mut arena = Arena::new();
        let id = arena.alloc_value("'keep {raw}'".to_string(), None);
        arena
            .apply_schema_info(id, Some("str"), Some("x"), Some(false), Some(false))
            .unwrap();
        arena.render_base(id).unwrap();
        assert_eq!(
            arena.rendered(id),
            Some(&Rendered::Str("keep {raw}".to_string()))
        );
        match arena.get(id) {
            Attr::Value(v) => assert!(v.literal_str),
            _ => unreachable!(),
        }
    }

    #[test]
    fn nullable_null_renders_null() {
        let mut arena = Arena::new();
        let id = arena.alloc_value("null".to_string(), None);
        arena
            .apply_schema_info(id, Some("int"), Some("x"), Some(true), Some(false))
            .unwrap();
        arena.render_base(id).unwrap();
        assert_eq!(arena.rendered(id), Some(&Rendered::Null));
    }

    #[test]
    fn struct_type_on_scalar_is_rejected() {
        let mut arena = Arena::new();
        let id = arena.alloc_value("Rex".to_string(), None);
        let err = arena
            .apply_schema_info(id, Some("Dog"), Some("pet"), Some(false), Some(false))
            .unwrap_err();
        assert!(err.message().contains("likely needs Dog(Rex)"));
    }

    #[test]
    fn conflicting_type_rebind_fails() {
        let mut arena = Arena::new();
        let id = arena.alloc_value("3".to_string(), None);
        arena
            .apply_schema_info(id, Some("int"), Some("x"), None, None)
            .unwrap();
        let err = arena
            .apply_schema_info(id, Some("str"), Some("x"), None, None)
            .unwrap_err();
        assert!(matches!(err, TycoError::Binding(_)));
    }

    #[test]
    fn deep_copy_is_independent() {
        let mut arena = Arena::new();
        let id = arena.alloc_value("5".to_string(), None);
        arena
            .apply_schema_info(id, Some("int"), Some("count"), Some(false), Some(false))
            .unwrap();
        let copy = arena.deep_copy(id);
        arena.render_base(copy).unwrap();
        assert_eq!(arena.rendered(copy), Some(&Rendered::Int(5)));
        assert_eq!(arena.rendered(id), None);
    }

    #[test]
    fn bool_literal_is_strict() {
        let mut arena = Arena::new();
        let id = arena.alloc_value("yes".to_string(), None);
        arena
            .apply_schema_info(id, Some("bool"), Some("flag"), Some(false), Some(false))
            .unwrap();
        let err = arena.render_base(id).unwrap_err();
        assert!(err.message().contains("not in (true, false)"));
    }
}
