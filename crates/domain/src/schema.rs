//! Schema normalization — turns vendor JSON-schema-like capability
//! descriptions into canonical [`Parameter`]s and [`Transition`]s.
//!
//! Normalization never fails outward. A fragment that cannot be expressed in
//! the canonical model yields `None`, and the reason is recorded in a
//! [`Diagnostics`] collector supplied by the caller.
//!
//! Resolution order for one fragment:
//!
//! 1. only the first `oneOf` alternative is considered;
//! 2. an `enum` makes the parameter an `ENUM`, whatever its `type`;
//! 3. otherwise `type` selects the parameter kind, recursing into
//!    `properties` for objects.

use std::fmt;

use serde_json::{Map, Value};

use crate::device::{Parameter, ParameterKind, Transition};

/// Default bound on object nesting.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Why a schema fragment was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// An attribute has no `schema.properties.value`.
    MissingValueSchema,
    /// An attribute is driven by enum commands rather than a readable value.
    HasEnumCommands,
    /// A command argument has no `name`.
    MissingArgumentName,
    /// A command argument has no `schema`.
    MissingArgumentSchema,
    /// `oneOf` is present but has no alternatives.
    EmptyOneOf,
    /// `enum` is present but is not an array.
    MalformedEnum,
    /// An `array` schema has no `items`.
    MissingItems,
    /// An `array` schema whose items are not strings.
    UnsupportedItems,
    /// `type` is absent or not one of the supported primitive types.
    UnknownType(Option<String>),
    /// Objects nest deeper than the configured bound.
    DepthExceeded(usize),
    /// One argument of a command did not resolve; the command is dropped.
    UnresolvedArgument(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValueSchema => f.write_str("attribute has no value schema"),
            Self::HasEnumCommands => f.write_str("attribute is set through enum commands"),
            Self::MissingArgumentName => f.write_str("argument has no name"),
            Self::MissingArgumentSchema => f.write_str("argument has no schema"),
            Self::EmptyOneOf => f.write_str("oneOf has no alternatives"),
            Self::MalformedEnum => f.write_str("enum is not an array"),
            Self::MissingItems => f.write_str("array schema has no items"),
            Self::UnsupportedItems => f.write_str("array items are not strings"),
            Self::UnknownType(Some(t)) => write!(f, "unsupported schema type {t}"),
            Self::UnknownType(None) => f.write_str("schema has no type"),
            Self::DepthExceeded(max) => write!(f, "schema nests deeper than {max}"),
            Self::UnresolvedArgument(arg) => write!(f, "argument {arg} did not resolve"),
        }
    }
}

/// One dropped schema element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDiagnostic {
    /// Dotted path of the dropped element (`attr.field`, `command(arg)`).
    pub path: String,
    pub reason: DropReason,
}

/// Collector for [`SchemaDiagnostic`]s produced during normalization.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<SchemaDiagnostic>,
}

impl Diagnostics {
    fn drop_at(&mut self, path: impl Into<String>, reason: DropReason) {
        self.entries.push(SchemaDiagnostic {
            path: path.into(),
            reason,
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaDiagnostic> {
        self.entries.iter()
    }

    /// Take all collected entries, leaving the collector empty.
    pub fn drain(&mut self) -> impl Iterator<Item = SchemaDiagnostic> + '_ {
        self.entries.drain(..)
    }
}

/// Marker for a fragment that nests past the bound; it poisons every
/// enclosing object.
struct TooDeep;

/// What a fragment resolved to, before it is attached to a named parameter.
struct Resolved {
    kind: ParameterKind,
    /// Option lists and objects are never live readings.
    non_sensor: bool,
}

/// Recursive translator from vendor schemas to the canonical model.
#[derive(Debug, Clone, Copy)]
pub struct SchemaNormalizer {
    max_depth: usize,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SchemaNormalizer {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Normalize a bare schema fragment into a non-sensor parameter.
    pub fn scan(&self, name: &str, fragment: &Value, diags: &mut Diagnostics) -> Option<Parameter> {
        self.finish(Parameter::new(name, ParameterKind::String), fragment, name, diags)
    }

    /// Normalize a capability attribute (`{schema: {properties: {value, unit}}, enumCommands}`)
    /// into a sensor parameter.
    ///
    /// Unit metadata is attached to the outer parameter before the value
    /// schema is resolved.
    pub fn attribute_parameter(
        &self,
        name: &str,
        attribute: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Parameter> {
        let Some(props) = attribute
            .get("schema")
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
        else {
            diags.drop_at(name, DropReason::MissingValueSchema);
            return None;
        };
        let Some(value) = props.get("value") else {
            diags.drop_at(name, DropReason::MissingValueSchema);
            return None;
        };
        if attribute
            .get("enumCommands")
            .and_then(Value::as_array)
            .is_some_and(|cmds| !cmds.is_empty())
        {
            diags.drop_at(name, DropReason::HasEnumCommands);
            return None;
        }

        let mut param = Parameter::new(name, ParameterKind::String).sensor(true);
        if let Some(unit) = props.get("unit") {
            param.units = unit.get("enum").and_then(Value::as_array).map(|units| {
                units
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            });
            param.default_unit = unit
                .get("default")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        self.finish(param, value, name, diags)
    }

    /// Normalize one command argument (`{name, schema}`), copying the
    /// schema `title` into the label.
    pub fn command_parameter(&self, argument: &Value, diags: &mut Diagnostics) -> Option<Parameter> {
        let Some(name) = argument.get("name").and_then(Value::as_str) else {
            diags.drop_at("?", DropReason::MissingArgumentName);
            return None;
        };
        let Some(schema) = argument.get("schema") else {
            diags.drop_at(name, DropReason::MissingArgumentSchema);
            return None;
        };
        let schema = first_alternative(schema).unwrap_or(schema);

        let mut param = Parameter::new(name, ParameterKind::String);
        param.label = schema
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        self.finish(param, schema, name, diags)
    }

    /// Assemble a transition from a vendor command (`{name?, arguments: [...]}`).
    ///
    /// All or nothing: if any argument fails to resolve, no transition is
    /// produced.
    pub fn command_transition(
        &self,
        key: &str,
        command: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Transition> {
        let name = command.get("name").and_then(Value::as_str).unwrap_or(key);
        let arguments = command
            .get("arguments")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut parameters = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let mut arg_diags = Diagnostics::default();
            match self.command_parameter(argument, &mut arg_diags) {
                Some(param) => parameters.push(param),
                None => {
                    for mut entry in arg_diags.drain() {
                        entry.path = format!("{name}({})", entry.path);
                        diags.entries.push(entry);
                    }
                    let arg_name = argument
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("?")
                        .to_string();
                    diags.drop_at(name, DropReason::UnresolvedArgument(arg_name));
                    return None;
                }
            }
        }

        Some(Transition::new(name, parameters))
    }

    fn finish(
        &self,
        mut param: Parameter,
        fragment: &Value,
        path: &str,
        diags: &mut Diagnostics,
    ) -> Option<Parameter> {
        match self.resolve(&param.name, fragment, 0, path, diags) {
            Ok(Some(resolved)) => {
                param.kind = resolved.kind;
                if resolved.non_sensor {
                    param.is_sensor = false;
                }
                Some(param)
            }
            Ok(None) => None,
            Err(TooDeep) => {
                diags.drop_at(path, DropReason::DepthExceeded(self.max_depth));
                None
            }
        }
    }

    fn resolve(
        &self,
        name: &str,
        fragment: &Value,
        depth: usize,
        path: &str,
        diags: &mut Diagnostics,
    ) -> Result<Option<Resolved>, TooDeep> {
        if depth > self.max_depth {
            return Err(TooDeep);
        }

        let fragment = match fragment.get("oneOf") {
            Some(_) => match first_alternative(fragment) {
                Some(alt) => alt,
                None => {
                    diags.drop_at(path, DropReason::EmptyOneOf);
                    return Ok(None);
                }
            },
            None => fragment,
        };

        if let Some(values) = fragment.get("enum") {
            let Some(values) = values.as_array() else {
                diags.drop_at(path, DropReason::MalformedEnum);
                return Ok(None);
            };
            return Ok(Some(Resolved {
                kind: ParameterKind::Enum {
                    values: values.clone(),
                },
                non_sensor: false,
            }));
        }

        let declared = fragment.get("type").and_then(Value::as_str);
        let kind = match declared {
            Some("string") if name == "color" => ParameterKind::Color,
            Some("string") => ParameterKind::String,
            Some("integer") => ParameterKind::Integer {
                min: number_field(fragment, "minimum"),
                max: number_field(fragment, "maximum"),
            },
            Some("number") => ParameterKind::Real {
                min: number_field(fragment, "minimum"),
                max: number_field(fragment, "maximum"),
            },
            Some("boolean") => ParameterKind::Boolean,
            Some("array") => return Ok(Self::resolve_array(fragment, path, diags)),
            Some("object") => {
                let fields = self.resolve_fields(fragment.get("properties"), depth, path, diags)?;
                return Ok(Some(Resolved {
                    kind: ParameterKind::Object { fields },
                    non_sensor: true,
                }));
            }
            other => {
                diags.drop_at(path, DropReason::UnknownType(other.map(str::to_string)));
                return Ok(None);
            }
        };

        Ok(Some(Resolved {
            kind,
            non_sensor: false,
        }))
    }

    fn resolve_array(fragment: &Value, path: &str, diags: &mut Diagnostics) -> Option<Resolved> {
        let Some(items) = fragment.get("items") else {
            diags.drop_at(path, DropReason::MissingItems);
            return None;
        };
        if items.get("type").and_then(Value::as_str) != Some("string") {
            diags.drop_at(path, DropReason::UnsupportedItems);
            return None;
        }
        match items.get("enum").and_then(Value::as_array) {
            Some(values) => Some(Resolved {
                kind: ParameterKind::Set {
                    values: values.clone(),
                },
                non_sensor: false,
            }),
            None => Some(Resolved {
                kind: ParameterKind::StringList,
                non_sensor: true,
            }),
        }
    }

    fn resolve_fields(
        &self,
        properties: Option<&Value>,
        depth: usize,
        path: &str,
        diags: &mut Diagnostics,
    ) -> Result<Vec<Parameter>, TooDeep> {
        let Some(properties) = properties.and_then(Value::as_object) else {
            return Ok(Vec::new());
        };
        let mut fields = Vec::with_capacity(properties.len());
        for (prop_name, prop) in properties {
            let child_path = format!("{path}.{prop_name}");
            if let Some(resolved) = self.resolve(prop_name, prop, depth + 1, &child_path, diags)? {
                let mut field = Parameter::new(prop_name.as_str(), resolved.kind);
                field.is_sensor = false;
                fields.push(field);
            }
        }
        Ok(fields)
    }
}

fn first_alternative(fragment: &Value) -> Option<&Value> {
    fragment
        .get("oneOf")
        .and_then(Value::as_array)
        .and_then(|alts| alts.first())
}

fn number_field(fragment: &Value, key: &str) -> Option<serde_json::Number> {
    fragment.get(key).and_then(Value::as_number).cloned()
}

/// Iterate the commands of a capability description in declaration order.
pub fn commands_of(capability: &Value) -> impl Iterator<Item = (&String, &Value)> {
    capability
        .get("commands")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::iter)
}

/// Iterate the attributes of a capability description in declaration order.
pub fn attributes_of(capability: &Value) -> impl Iterator<Item = (&String, &Value)> {
    capability
        .get("attributes")
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(Map::iter)
}
