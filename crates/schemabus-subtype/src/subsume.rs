//! Structural subsumption over JSON Schema documents.
//!
//! `includes(sub, sup)` answers "is every instance of `sub` also an instance
//! of `sup`?". The walk is sound but incomplete: a `true` answer is always
//! correct, while some genuine inclusions are reported as `false` when they
//! cannot be proven keyword by keyword.
//!
//! # Rules
//!
//! | Construct | Treatment |
//! |-----------|-----------|
//! | `true` / `false` / annotation-only object | accept-all / accept-none |
//! | `$ref` | resolved against the owning document, cycles assumed to hold |
//! | `anyOf` / `oneOf` on `sub` | every branch must fit |
//! | `anyOf` / `oneOf` on `sup` | `sub` must fit one branch; for `oneOf` it must be provably disjoint from the rest |
//! | `allOf` | `sup`: every branch; `sub`: any branch suffices |
//! | `enum` / `const` on `sub` | every value validated against `sup` |
//! | `type` | set inclusion, `integer` within `number` |
//! | object, array, string, numeric keywords | per-keyword narrowing checks |
//! | anything else on `sup` | unprovable, answers `false` |

use schemabus_core::{CompatibilityOracle, OracleError, Schema, TypesIdentity};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Keywords that never restrict the set of valid instances.
const ANNOTATIONS: &[&str] = &[
    "$schema",
    "$id",
    "$comment",
    "$defs",
    "definitions",
    "title",
    "description",
    "default",
    "examples",
    "format",
    "deprecated",
    "readOnly",
    "writeOnly",
    "contentEncoding",
    "contentMediaType",
];

/// Reference chain length followed before giving up on a disjointness proof.
const MAX_REF_HOPS: usize = 32;

/// Assertion keywords the walk understands.
const HANDLED: &[&str] = &[
    "$ref",
    "type",
    "enum",
    "const",
    "anyOf",
    "oneOf",
    "allOf",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "minItems",
    "maxItems",
    "uniqueItems",
    "minLength",
    "maxLength",
    "pattern",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];

/// Oracle deciding subtyping by walking both documents side by side.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralOracle;

impl StructuralOracle {
    /// Create the oracle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CompatibilityOracle for StructuralOracle {
    fn compare(&self, a: &Schema, b: &Schema) -> Result<TypesIdentity, OracleError> {
        let a_in_b = is_subschema(a.document(), b.document())?;
        let b_in_a = is_subschema(b.document(), a.document())?;
        let identity = TypesIdentity::from_inclusions(a_in_b, b_in_a);
        tracing::trace!(?identity, a_in_b, b_in_a, "Compared schemas");
        Ok(identity)
    }
}

/// Whether every instance of `sub` is an instance of `sup`.
///
/// Both arguments are complete documents; `$ref`s resolve against them.
///
/// # Errors
///
/// Returns error if either document is malformed or holds a reference that
/// does not resolve.
pub fn is_subschema(sub: &Value, sup: &Value) -> Result<bool, OracleError> {
    let mut walker = Walker {
        sub_root: sub,
        sup_root: sup,
        assumed: HashSet::new(),
    };
    walker.includes(sub, sup)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    Boolean,
    Object,
    Array,
    String,
    Number,
    Integer,
}

impl Kind {
    const ALL: [Kind; 7] = [
        Kind::Null,
        Kind::Boolean,
        Kind::Object,
        Kind::Array,
        Kind::String,
        Kind::Number,
        Kind::Integer,
    ];

    fn parse(name: &str) -> Result<Self, OracleError> {
        Ok(match name {
            "null" => Self::Null,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            other => {
                return Err(OracleError::Malformed(format!("unknown type '{other}'")));
            }
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
        }
    }

    fn within(self, kinds: &[Kind]) -> bool {
        kinds.contains(&self) || (self == Self::Integer && kinds.contains(&Self::Number))
    }
}

struct Walker<'a> {
    sub_root: &'a Value,
    sup_root: &'a Value,
    /// Pairs under comparison on the current path, keyed by node address.
    assumed: HashSet<(usize, usize)>,
}

impl<'a> Walker<'a> {
    fn includes(&mut self, sub: &Value, sup: &Value) -> Result<bool, OracleError> {
        let sub_map = match sub {
            Value::Bool(false) => return Ok(true),
            Value::Bool(true) => return accepts_everything(sup),
            Value::Object(map) => map,
            other => return Err(not_a_schema(other)),
        };
        let sup_map = match sup {
            Value::Bool(true) => return Ok(true),
            Value::Bool(false) => return Ok(false),
            Value::Object(map) => map,
            other => return Err(not_a_schema(other)),
        };

        if let Some(reference) = ref_of(sub_map)? {
            let target = resolve(self.sub_root, reference)?;
            if self.guarded(target, sup, |walker| walker.includes(target, sup))? {
                return Ok(true);
            }
            let rest = without(sub_map, "$ref");
            return if has_assertions(&rest) {
                self.includes(&Value::Object(rest), sup)
            } else {
                Ok(false)
            };
        }

        if let Some(reference) = ref_of(sup_map)? {
            let target = resolve(self.sup_root, reference)?;
            if !self.guarded(sub, target, |walker| walker.includes(sub, target))? {
                return Ok(false);
            }
            let rest = without(sup_map, "$ref");
            return if has_assertions(&rest) {
                self.includes(sub, &Value::Object(rest))
            } else {
                Ok(true)
            };
        }

        if sub == sup && !contains_ref(sub) {
            return Ok(true);
        }

        for key in ["anyOf", "oneOf"] {
            if let Some(branches) = array_of(sub_map, key)? {
                let rest = without(sub_map, key);
                if has_assertions(&rest) && self.includes(&Value::Object(rest), sup)? {
                    return Ok(true);
                }
                for branch in branches {
                    if !self.includes(branch, sup)? {
                        return Ok(false);
                    }
                }
                return Ok(true);
            }
        }

        if let Some(branches) = array_of(sub_map, "allOf")? {
            for branch in branches {
                if self.includes(branch, sup)? {
                    return Ok(true);
                }
            }
            let rest = without(sub_map, "allOf");
            return if has_assertions(&rest) {
                self.includes(&Value::Object(rest), sup)
            } else {
                Ok(false)
            };
        }

        if let Some(values) = finite_values(sub_map)? {
            return self.accepts_all(sup, &values);
        }

        if let Some(branches) = array_of(sup_map, "allOf")? {
            for branch in branches {
                if !self.includes(sub, branch)? {
                    return Ok(false);
                }
            }
            let rest = without(sup_map, "allOf");
            return if has_assertions(&rest) {
                self.includes(sub, &Value::Object(rest))
            } else {
                Ok(true)
            };
        }

        for key in ["anyOf", "oneOf"] {
            if let Some(branches) = array_of(sup_map, key)? {
                // A multi-typed `sub` may spread across several branches.
                if let Some(kinds) = kinds_of(sub_map)? {
                    if kinds.len() > 1 {
                        for kind in kinds {
                            let mut variant = sub_map.clone();
                            variant.insert("type".to_string(), Value::from(kind.name()));
                            if !self.includes(&Value::Object(variant), sup)? {
                                return Ok(false);
                            }
                        }
                        return Ok(true);
                    }
                }

                let mut fit = None;
                for (index, branch) in branches.iter().enumerate() {
                    if self.includes(sub, branch)? {
                        fit = Some(index);
                        break;
                    }
                }
                let Some(fit) = fit else {
                    return Ok(false);
                };
                // `oneOf` rejects instances matching two branches.
                if key == "oneOf" {
                    for (index, branch) in branches.iter().enumerate() {
                        if index != fit && !self.disjoint(sub_map, branch)? {
                            return Ok(false);
                        }
                    }
                }
                let rest = without(sup_map, key);
                return if has_assertions(&rest) {
                    self.includes(sub, &Value::Object(rest))
                } else {
                    Ok(true)
                };
            }
        }

        if sup_map.contains_key("enum") || sup_map.contains_key("const") {
            return Ok(false);
        }

        if let Some(keyword) = sup_map.keys().find(|key| !is_known(key)) {
            tracing::trace!(keyword = %keyword, "Unsupported keyword on supertype side");
            return Ok(false);
        }

        let effective = match (kinds_of(sub_map)?, kinds_of(sup_map)?) {
            (Some(sub_kinds), Some(sup_kinds)) => {
                if !sub_kinds.iter().all(|kind| kind.within(&sup_kinds)) {
                    return Ok(false);
                }
                sub_kinds
            }
            (Some(sub_kinds), None) => sub_kinds,
            (None, Some(_)) => return Ok(false),
            (None, None) => Kind::ALL.to_vec(),
        };

        for kind in effective {
            let fits = match kind {
                Kind::Object => self.object_includes(sub_map, sup_map)?,
                Kind::Array => self.array_includes(sub_map, sup_map)?,
                Kind::String => string_includes(sub_map, sup_map)?,
                Kind::Number | Kind::Integer => numeric_includes(sub_map, sup_map, kind)?,
                Kind::Null | Kind::Boolean => true,
            };
            if !fits {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Run `check` with the pair assumed to hold, so recursive types terminate.
    fn guarded(
        &mut self,
        sub: &Value,
        sup: &Value,
        check: impl FnOnce(&mut Self) -> Result<bool, OracleError>,
    ) -> Result<bool, OracleError> {
        let key = (address(sub), address(sup));
        if !self.assumed.insert(key) {
            return Ok(true);
        }
        let result = check(self);
        self.assumed.remove(&key);
        result
    }

    fn object_includes(
        &mut self,
        sub: &Map<String, Value>,
        sup: &Map<String, Value>,
    ) -> Result<bool, OracleError> {
        let sub_required = string_set(sub, "required")?;
        let sup_required = string_set(sup, "required")?;
        if !sup_required.is_subset(&sub_required) {
            return Ok(false);
        }

        let empty = Map::new();
        let sub_props = object_of(sub, "properties")?.unwrap_or(&empty);
        let sup_props = object_of(sup, "properties")?.unwrap_or(&empty);
        let sub_extra = sub.get("additionalProperties");
        let sup_extra = sup.get("additionalProperties");

        for (name, sup_prop) in sup_props {
            let fits = match (sub_props.get(name), sub_extra) {
                (Some(sub_prop), _) => self.includes(sub_prop, sup_prop)?,
                (None, Some(extra)) => self.includes(extra, sup_prop)?,
                (None, None) => accepts_everything(sup_prop)?,
            };
            if !fits {
                return Ok(false);
            }
        }

        if let Some(sup_extra) = sup_extra {
            for (name, sub_prop) in sub_props {
                if !sup_props.contains_key(name) && !self.includes(sub_prop, sup_extra)? {
                    return Ok(false);
                }
            }
            let fits = match sub_extra {
                Some(sub_extra) => self.includes(sub_extra, sup_extra)?,
                None => accepts_everything(sup_extra)?,
            };
            if !fits {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn array_includes(
        &mut self,
        sub: &Map<String, Value>,
        sup: &Map<String, Value>,
    ) -> Result<bool, OracleError> {
        if let Some(sup_items) = sup.get("items") {
            let fits = match sub.get("items") {
                // Tuple-form `items` is outside the supported vocabulary.
                Some(Value::Array(_)) => false,
                _ if sup_items.is_array() => false,
                Some(sub_items) => self.includes(sub_items, sup_items)?,
                None => accepts_everything(sup_items)?,
            };
            if !fits {
                return Ok(false);
            }
        }

        if flag(sup, "uniqueItems")? && !flag(sub, "uniqueItems")? {
            return Ok(false);
        }

        length_within(sub, sup, "minItems", "maxItems")
    }

    /// Whether no instance of `sub` can satisfy `other`. Only disjoint
    /// `type` sets and required properties `sub` forbids are recognised.
    fn disjoint(&self, sub: &Map<String, Value>, other: &Value) -> Result<bool, OracleError> {
        let mut other = other;
        let mut hops = 0;
        while let Some(reference) = other.as_object().map(ref_of).transpose()?.flatten() {
            hops += 1;
            if hops > MAX_REF_HOPS {
                return Ok(false);
            }
            other = resolve(self.sup_root, reference)?;
        }
        let other = match other {
            Value::Bool(accept) => return Ok(!accept),
            Value::Object(map) => map,
            value => return Err(not_a_schema(value)),
        };

        let sub_kinds = kinds_of(sub)?;
        if let (Some(sub_kinds), Some(other_kinds)) = (&sub_kinds, kinds_of(other)?) {
            let overlap = sub_kinds.iter().any(|kind| {
                kind.within(&other_kinds) || other_kinds.iter().any(|other| other.within(&[*kind]))
            });
            if !overlap {
                return Ok(true);
            }
        }

        if sub_kinds.as_deref() == Some(&[Kind::Object][..]) {
            let empty = Map::new();
            let props = object_of(sub, "properties")?.unwrap_or(&empty);
            let closed = sub.get("additionalProperties") == Some(&Value::Bool(false));
            for name in string_set(other, "required")? {
                let forbidden = match props.get(name) {
                    Some(prop) => prop == &Value::Bool(false),
                    None => closed,
                };
                if forbidden {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Validate each value of a finite `sub` against `sup`.
    fn accepts_all(&self, sup: &Value, values: &[Value]) -> Result<bool, OracleError> {
        let mut document = sup.clone();
        if let (Value::Object(target), Value::Object(root)) = (&mut document, self.sup_root) {
            for key in ["$defs", "definitions"] {
                if let Some(defs) = root.get(key) {
                    target.entry(key).or_insert_with(|| defs.clone());
                }
            }
        }

        let validator = jsonschema::validator_for(&document)
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        Ok(values.iter().all(|value| validator.is_valid(value)))
    }
}

fn string_includes(
    sub: &Map<String, Value>,
    sup: &Map<String, Value>,
) -> Result<bool, OracleError> {
    if let Some(pattern) = sup.get("pattern") {
        if sub.get("pattern") != Some(pattern) {
            return Ok(false);
        }
    }
    length_within(sub, sup, "minLength", "maxLength")
}

fn numeric_includes(
    sub: &Map<String, Value>,
    sup: &Map<String, Value>,
    kind: Kind,
) -> Result<bool, OracleError> {
    if let Some(sup_low) = Bound::lower(sup)? {
        match Bound::lower(sub)? {
            Some(sub_low) if sub_low.tighter_low(sup_low) => {}
            _ => return Ok(false),
        }
    }
    if let Some(sup_high) = Bound::upper(sup)? {
        match Bound::upper(sub)? {
            Some(sub_high) if sub_high.tighter_high(sup_high) => {}
            _ => return Ok(false),
        }
    }

    if let Some(step) = number(sup, "multipleOf")? {
        let fits = match number(sub, "multipleOf")? {
            Some(sub_step) => is_multiple(sub_step, step),
            None => kind == Kind::Integer && is_multiple(1.0, step),
        };
        if !fits {
            return Ok(false);
        }
    }

    Ok(true)
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    exclusive: bool,
}

impl Bound {
    fn lower(map: &Map<String, Value>) -> Result<Option<Self>, OracleError> {
        let inclusive = number(map, "minimum")?.map(|value| Self {
            value,
            exclusive: false,
        });
        let exclusive = number(map, "exclusiveMinimum")?.map(|value| Self {
            value,
            exclusive: true,
        });
        Ok(match (inclusive, exclusive) {
            (Some(a), Some(b)) => Some(if b.tighter_low(a) { b } else { a }),
            (a, b) => a.or(b),
        })
    }

    fn upper(map: &Map<String, Value>) -> Result<Option<Self>, OracleError> {
        let inclusive = number(map, "maximum")?.map(|value| Self {
            value,
            exclusive: false,
        });
        let exclusive = number(map, "exclusiveMaximum")?.map(|value| Self {
            value,
            exclusive: true,
        });
        Ok(match (inclusive, exclusive) {
            (Some(a), Some(b)) => Some(if b.tighter_high(a) { b } else { a }),
            (a, b) => a.or(b),
        })
    }

    fn tighter_low(self, other: Self) -> bool {
        self.value > other.value
            || (self.value == other.value && (self.exclusive || !other.exclusive))
    }

    fn tighter_high(self, other: Self) -> bool {
        self.value < other.value
            || (self.value == other.value && (self.exclusive || !other.exclusive))
    }
}

fn length_within(
    sub: &Map<String, Value>,
    sup: &Map<String, Value>,
    min_key: &str,
    max_key: &str,
) -> Result<bool, OracleError> {
    if let Some(sup_min) = number(sup, min_key)? {
        if number(sub, min_key)?.unwrap_or(0.0) < sup_min {
            return Ok(false);
        }
    }
    if let Some(sup_max) = number(sup, max_key)? {
        match number(sub, max_key)? {
            Some(sub_max) if sub_max <= sup_max => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn is_multiple(value: f64, step: f64) -> bool {
    if step <= 0.0 {
        return false;
    }
    let quotient = value / step;
    (quotient - quotient.round()).abs() < 1e-9
}

fn accepts_everything(schema: &Value) -> Result<bool, OracleError> {
    match schema {
        Value::Bool(accept) => Ok(*accept),
        Value::Object(map) => Ok(!has_assertions(map)),
        other => Err(not_a_schema(other)),
    }
}

fn has_assertions(map: &Map<String, Value>) -> bool {
    map.keys()
        .any(|key| !ANNOTATIONS.contains(&key.as_str()) && !key.starts_with("x-"))
}

fn is_known(key: &str) -> bool {
    ANNOTATIONS.contains(&key) || HANDLED.contains(&key) || key.starts_with("x-")
}

fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.contains_key("$ref") || map.values().any(contains_ref),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}

fn without(map: &Map<String, Value>, key: &str) -> Map<String, Value> {
    let mut rest = map.clone();
    rest.remove(key);
    rest
}

fn resolve<'a>(root: &'a Value, reference: &str) -> Result<&'a Value, OracleError> {
    let pointer = reference
        .strip_prefix('#')
        .ok_or_else(|| OracleError::UnresolvedRef(format!("{reference} (not a local reference)")))?;
    if pointer.is_empty() {
        return Ok(root);
    }
    root.pointer(pointer)
        .ok_or_else(|| OracleError::UnresolvedRef(reference.to_string()))
}

fn address(value: &Value) -> usize {
    std::ptr::from_ref(value) as usize
}

fn ref_of(map: &Map<String, Value>) -> Result<Option<&str>, OracleError> {
    match map.get("$ref") {
        None => Ok(None),
        Some(Value::String(reference)) => Ok(Some(reference)),
        Some(other) => Err(OracleError::Malformed(format!(
            "$ref must be a string, got {other}"
        ))),
    }
}

fn kinds_of(map: &Map<String, Value>) -> Result<Option<Vec<Kind>>, OracleError> {
    match map.get("type") {
        None => Ok(None),
        Some(Value::String(name)) => Ok(Some(vec![Kind::parse(name)?])),
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .ok_or_else(|| OracleError::Malformed(format!("type entry {name} is not a string")))
                    .and_then(Kind::parse)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(OracleError::Malformed(format!(
            "type must be a string or an array, got {other}"
        ))),
    }
}

fn finite_values(map: &Map<String, Value>) -> Result<Option<Vec<Value>>, OracleError> {
    if let Some(value) = map.get("const") {
        return Ok(Some(vec![value.clone()]));
    }
    match map.get("enum") {
        None => Ok(None),
        Some(Value::Array(values)) => Ok(Some(values.clone())),
        Some(other) => Err(OracleError::Malformed(format!(
            "enum must be an array, got {other}"
        ))),
    }
}

fn array_of<'m>(map: &'m Map<String, Value>, key: &str) -> Result<Option<&'m Vec<Value>>, OracleError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(OracleError::Malformed(format!(
            "{key} must be an array, got {other}"
        ))),
    }
}

fn object_of<'m>(
    map: &'m Map<String, Value>,
    key: &str,
) -> Result<Option<&'m Map<String, Value>>, OracleError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(other) => Err(OracleError::Malformed(format!(
            "{key} must be an object, got {other}"
        ))),
    }
}

fn string_set<'m>(map: &'m Map<String, Value>, key: &str) -> Result<HashSet<&'m str>, OracleError> {
    match array_of(map, key)? {
        None => Ok(HashSet::new()),
        Some(items) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    OracleError::Malformed(format!("{key} entry {item} is not a string"))
                })
            })
            .collect(),
    }
}

fn number(map: &Map<String, Value>, key: &str) -> Result<Option<f64>, OracleError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| OracleError::Malformed(format!("{key} must be a number, got {value}"))),
    }
}

fn flag(map: &Map<String, Value>, key: &str) -> Result<bool, OracleError> {
    match map.get(key) {
        None => Ok(false),
        Some(Value::Bool(value)) => Ok(*value),
        Some(other) => Err(OracleError::Malformed(format!(
            "{key} must be a boolean, got {other}"
        ))),
    }
}

fn not_a_schema(value: &Value) -> OracleError {
    OracleError::Malformed(format!("expected an object or boolean schema, got {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde_json::json;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Narrow {
        a: String,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Wide {
        a: String,
        b: i64,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Clash {
        a: i64,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Tree {
        label: String,
        children: Vec<Tree>,
        parent: Option<Box<Tree>>,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    enum Level {
        Low,
        High,
    }

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Reading {
        level: Level,
        note: Option<String>,
        samples: Vec<u8>,
    }

    fn schema(value: Value) -> Schema {
        Schema::from_value(value).unwrap()
    }

    fn compare(a: &Schema, b: &Schema) -> TypesIdentity {
        StructuralOracle::new().compare(a, b).unwrap()
    }

    #[test]
    fn derived_schemas_are_reflexive() {
        for derived in [
            Schema::derive::<Narrow>(),
            Schema::derive::<Wide>(),
            Schema::derive::<Tree>(),
            Schema::derive::<Reading>(),
        ] {
            assert_eq!(compare(&derived, &derived), TypesIdentity::Equal);
        }
    }

    #[test]
    fn reparsed_stamp_is_equal() {
        let derived = Schema::derive::<Reading>();
        let stamped = Schema::parse(derived.as_str()).unwrap();
        assert_eq!(compare(&derived, &stamped), TypesIdentity::Equal);
    }

    #[test]
    fn extra_required_field_is_subtype() {
        let wide = Schema::derive::<Wide>();
        let narrow = Schema::derive::<Narrow>();
        assert_eq!(compare(&wide, &narrow), TypesIdentity::AIsSubtypeOfB);
        assert_eq!(compare(&narrow, &wide), TypesIdentity::AIsSupertypeOfB);
    }

    #[test]
    fn conflicting_field_types_are_incompatible() {
        let narrow = Schema::derive::<Narrow>();
        let clash = Schema::derive::<Clash>();
        assert_eq!(compare(&narrow, &clash), TypesIdentity::Incompatible);
    }

    #[test]
    fn integer_within_number() {
        let integer = schema(json!({"type": "integer"}));
        let number = schema(json!({"type": "number"}));
        assert_eq!(compare(&integer, &number), TypesIdentity::AIsSubtypeOfB);
    }

    #[test]
    fn nullable_is_supertype() {
        let plain = schema(json!({"type": "string"}));
        let nullable = schema(json!({"type": ["string", "null"]}));
        assert_eq!(compare(&nullable, &plain), TypesIdentity::AIsSupertypeOfB);
    }

    #[test]
    fn multi_type_spreads_over_union() {
        let nullable = schema(json!({"type": ["string", "null"]}));
        let union = schema(json!({"anyOf": [{"type": "null"}, {"type": "string"}]}));
        assert_eq!(compare(&nullable, &union), TypesIdentity::Equal);
    }

    #[test]
    fn closed_object_is_narrower_than_open() {
        let open = schema(json!({
            "type": "object",
            "properties": {"a": {"type": "string"}}
        }));
        let closed = schema(json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        }));
        assert_eq!(compare(&closed, &open), TypesIdentity::AIsSubtypeOfB);
    }

    #[test]
    fn enum_subset_is_subtype() {
        let small = schema(json!({"enum": ["low"]}));
        let large = schema(json!({"type": "string", "enum": ["low", "high"]}));
        assert_eq!(compare(&small, &large), TypesIdentity::AIsSubtypeOfB);
    }

    #[test]
    fn numeric_bounds_narrow() {
        let byte = schema(json!({"type": "integer", "minimum": 0, "maximum": 255}));
        let wide = schema(json!({"type": "integer", "format": "int64"}));
        assert_eq!(compare(&byte, &wide), TypesIdentity::AIsSubtypeOfB);

        let positive = schema(json!({"type": "number", "exclusiveMinimum": 0}));
        let non_negative = schema(json!({"type": "number", "minimum": 0}));
        assert_eq!(
            compare(&positive, &non_negative),
            TypesIdentity::AIsSubtypeOfB
        );
    }

    #[test]
    fn array_items_follow_elements() {
        let ints = schema(json!({"type": "array", "items": {"type": "integer"}}));
        let nums = schema(json!({"type": "array", "items": {"type": "number"}, "maxItems": 4}));
        assert_eq!(compare(&ints, &nums), TypesIdentity::Incompatible);

        let bounded = schema(json!({"type": "array", "items": {"type": "integer"}, "maxItems": 2}));
        assert_eq!(compare(&bounded, &nums), TypesIdentity::AIsSubtypeOfB);
    }

    #[test]
    fn boolean_schemas() {
        let anything = schema(json!(true));
        let nothing = schema(json!(false));
        let string = schema(json!({"type": "string"}));
        assert_eq!(compare(&string, &anything), TypesIdentity::AIsSubtypeOfB);
        assert_eq!(compare(&nothing, &string), TypesIdentity::AIsSubtypeOfB);
        assert_eq!(
            compare(&anything, &schema(json!({"title": "only annotations"}))),
            TypesIdentity::Equal
        );
    }

    #[test]
    fn unknown_supertype_keyword_is_unprovable() {
        let plain = schema(json!({"type": "object"}));
        let guarded = schema(json!({"type": "object", "minProperties": 1}));
        assert_eq!(compare(&guarded, &plain), TypesIdentity::AIsSubtypeOfB);
        assert_eq!(compare(&guarded, &guarded), TypesIdentity::Equal);
    }

    #[test]
    fn recursive_reference_terminates() {
        let looped = schema(json!({"$ref": "#"}));
        assert_eq!(compare(&looped, &looped), TypesIdentity::Equal);
    }

    #[test]
    fn malformed_type_is_an_error() {
        let bad = schema(json!({"type": 5}));
        let good = schema(json!({"type": "string"}));
        assert!(matches!(
            StructuralOracle::new().compare(&good, &bad),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn overlapping_one_of_is_not_a_supertype() {
        let short = json!({"type": "string", "maxLength": 2});
        let overlapping = json!({"oneOf": [
            {"type": "string"},
            {"type": "string", "maxLength": 3}
        ]});
        assert!(!is_subschema(&short, &overlapping).unwrap());

        let any = json!({"anyOf": [
            {"type": "string"},
            {"type": "string", "maxLength": 3}
        ]});
        assert!(is_subschema(&short, &any).unwrap());
    }

    #[test]
    fn disjoint_one_of_branches() {
        let short = json!({"type": "string", "maxLength": 2});
        let by_type = json!({"oneOf": [{"type": "string"}, {"type": "integer"}]});
        assert!(is_subschema(&short, &by_type).unwrap());

        let number = json!({"type": "number"});
        let numeric = json!({"oneOf": [{"type": "number"}, {"type": "integer"}]});
        assert!(!is_subschema(&number, &numeric).unwrap());
    }

    #[test]
    fn tagged_variant_within_one_of() {
        let variant = |tag: &str| {
            json!({
                "type": "object",
                "properties": {tag: {"type": "number"}},
                "required": [tag],
                "additionalProperties": false
            })
        };
        let shape = json!({"oneOf": [variant("Circle"), variant("Square")]});
        let circle = json!({
            "type": "object",
            "properties": {"Circle": {"type": "integer"}},
            "required": ["Circle"],
            "additionalProperties": false
        });
        assert!(is_subschema(&circle, &shape).unwrap());

        let open = json!({
            "type": "object",
            "properties": {"Circle": {"type": "integer"}},
            "required": ["Circle"]
        });
        assert!(!is_subschema(&open, &shape).unwrap());
    }

    #[test]
    fn dangling_reference_is_an_error() {
        let dangling = schema(json!({"$ref": "#/$defs/Missing"}));
        let good = schema(json!({"type": "string"}));
        assert!(matches!(
            StructuralOracle::new().compare(&dangling, &good),
            Err(OracleError::UnresolvedRef(_))
        ));
    }
}
