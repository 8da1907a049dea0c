//! Universal, engine-agnostic record type model.
//!
//! Every dialect maps its column types into and out of [`UniversalType`].
//! A type is a physical tag ([`PhysicalType`]), an optional semantic
//! refinement ([`LogicalType`]) and a nullability flag that is orthogonal
//! to both.
//!
//! The JSON exchange form is a tree of `{type, logicalType?, nullable}` nodes:
//!
//! ```json
//! { "type": "record", "fields": [
//!     { "name": "ID", "type": "int" },
//!     { "name": "PRICE", "type": "bytes", "logicalType": "decimal",
//!       "precision": 10, "scale": 2, "nullable": true }
//! ]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical type tag of a universal type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    /// Homogeneous array of the element type.
    Array(Box<UniversalType>),
    /// Ordered, uniquely named fields.
    Record(Vec<Field>),
}

impl PhysicalType {
    /// Lower-case tag used in the exchange format.
    pub fn tag(&self) -> &'static str {
        match self {
            PhysicalType::Null => "null",
            PhysicalType::Boolean => "boolean",
            PhysicalType::Int => "int",
            PhysicalType::Long => "long",
            PhysicalType::Float => "float",
            PhysicalType::Double => "double",
            PhysicalType::Bytes => "bytes",
            PhysicalType::String => "string",
            PhysicalType::Array(_) => "array",
            PhysicalType::Record(_) => "record",
        }
    }
}

/// Semantic refinement attached to a physical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Days since the Unix epoch, over INT.
    Date,
    /// Milliseconds since midnight, over INT.
    TimeMillis,
    /// Microseconds since midnight, over LONG.
    TimeMicros,
    /// Milliseconds since the Unix epoch (UTC), over LONG.
    TimestampMillis,
    /// Microseconds since the Unix epoch (UTC), over LONG.
    TimestampMicros,
    /// Exact decimal, over BYTES.
    Decimal { precision: u32, scale: u32 },
}

impl LogicalType {
    /// Lower-case name used in the exchange format.
    pub fn tag(&self) -> &'static str {
        match self {
            LogicalType::Date => "date",
            LogicalType::TimeMillis => "time-millis",
            LogicalType::TimeMicros => "time-micros",
            LogicalType::TimestampMillis => "timestamp-millis",
            LogicalType::TimestampMicros => "timestamp-micros",
            LogicalType::Decimal { .. } => "decimal",
        }
    }

    /// Whether the logical type may refine the given physical type.
    fn fits(&self, physical: &PhysicalType) -> bool {
        matches!(
            (self, physical),
            (LogicalType::Date, PhysicalType::Int)
                | (LogicalType::TimeMillis, PhysicalType::Int)
                | (LogicalType::TimeMicros, PhysicalType::Long)
                | (LogicalType::TimestampMillis, PhysicalType::Long)
                | (LogicalType::TimestampMicros, PhysicalType::Long)
                | (LogicalType::Decimal { .. }, PhysicalType::Bytes)
        )
    }
}

/// A universal type: physical tag, optional logical refinement, nullability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaNode", into = "SchemaNode")]
pub struct UniversalType {
    physical: PhysicalType,
    logical: Option<LogicalType>,
    nullable: bool,
}

impl UniversalType {
    /// Create a non-nullable type with no logical refinement.
    pub fn of(physical: PhysicalType) -> Self {
        Self {
            physical,
            logical: None,
            nullable: false,
        }
    }

    /// Create a non-nullable logical type over its canonical physical type.
    pub fn logical(logical: LogicalType) -> Self {
        let physical = match logical {
            LogicalType::Date | LogicalType::TimeMillis => PhysicalType::Int,
            LogicalType::TimeMicros
            | LogicalType::TimestampMillis
            | LogicalType::TimestampMicros => PhysicalType::Long,
            LogicalType::Decimal { .. } => PhysicalType::Bytes,
        };
        Self {
            physical,
            logical: Some(logical),
            nullable: false,
        }
    }

    pub fn null() -> Self {
        Self::of(PhysicalType::Null)
    }

    pub fn boolean() -> Self {
        Self::of(PhysicalType::Boolean)
    }

    pub fn int() -> Self {
        Self::of(PhysicalType::Int)
    }

    pub fn long() -> Self {
        Self::of(PhysicalType::Long)
    }

    pub fn float() -> Self {
        Self::of(PhysicalType::Float)
    }

    pub fn double() -> Self {
        Self::of(PhysicalType::Double)
    }

    pub fn bytes() -> Self {
        Self::of(PhysicalType::Bytes)
    }

    pub fn string() -> Self {
        Self::of(PhysicalType::String)
    }

    pub fn date() -> Self {
        Self::logical(LogicalType::Date)
    }

    pub fn time_millis() -> Self {
        Self::logical(LogicalType::TimeMillis)
    }

    pub fn time_micros() -> Self {
        Self::logical(LogicalType::TimeMicros)
    }

    pub fn timestamp_millis() -> Self {
        Self::logical(LogicalType::TimestampMillis)
    }

    pub fn timestamp_micros() -> Self {
        Self::logical(LogicalType::TimestampMicros)
    }

    pub fn decimal(precision: u32, scale: u32) -> Self {
        Self::logical(LogicalType::Decimal { precision, scale })
    }

    pub fn array(items: UniversalType) -> Self {
        Self::of(PhysicalType::Array(Box::new(items)))
    }

    pub fn record(fields: Vec<Field>) -> Self {
        Self::of(PhysicalType::Record(fields))
    }

    /// Wrap as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Strip the nullable wrapper.
    #[must_use]
    pub fn non_nullable(&self) -> Self {
        let mut inner = self.clone();
        inner.nullable = false;
        inner
    }

    /// Set nullability explicitly.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn physical(&self) -> &PhysicalType {
        &self.physical
    }

    pub fn logical_type(&self) -> Option<LogicalType> {
        self.logical
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Declared decimal scale, if this is a DECIMAL type.
    pub fn decimal_scale(&self) -> Option<u32> {
        match self.logical {
            Some(LogicalType::Decimal { scale, .. }) => Some(scale),
            _ => None,
        }
    }

    /// Fields of a RECORD type.
    pub fn fields(&self) -> Option<&[Field]> {
        match &self.physical {
            PhysicalType::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Human-readable name used in validation messages, e.g. `long (timestamp-micros)`.
    pub fn display_name(&self) -> String {
        match (&self.physical, self.logical) {
            (_, Some(LogicalType::Decimal { precision, scale })) => {
                format!("decimal({},{})", precision, scale)
            }
            (physical, Some(logical)) => format!("{} ({})", physical.tag(), logical.tag()),
            (PhysicalType::Array(items), None) => format!("array<{}>", items.display_name()),
            (physical, None) => physical.tag().to_string(),
        }
    }
}

impl fmt::Display for UniversalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())?;
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// A named element of a RECORD type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub schema: UniversalType,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: UniversalType) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Find a field by name.
pub fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.name == name)
}

// =============================================================================
// Exchange format
// =============================================================================

/// Serialized node of the schema exchange format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaNode {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(rename = "logicalType", default, skip_serializing_if = "Option::is_none")]
    logical_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale: Option<u32>,
    #[serde(default, skip_serializing_if = "is_false")]
    nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Box<UniversalType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<Field>>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl TryFrom<SchemaNode> for UniversalType {
    type Error = String;

    fn try_from(node: SchemaNode) -> Result<Self, Self::Error> {
        let physical = match node.type_name.to_lowercase().as_str() {
            "null" => PhysicalType::Null,
            "boolean" => PhysicalType::Boolean,
            "int" => PhysicalType::Int,
            "long" => PhysicalType::Long,
            "float" => PhysicalType::Float,
            "double" => PhysicalType::Double,
            "bytes" => PhysicalType::Bytes,
            "string" => PhysicalType::String,
            "array" => {
                let items = node
                    .items
                    .ok_or_else(|| "array type requires 'items'".to_string())?;
                PhysicalType::Array(items)
            }
            "record" => {
                let fields = node
                    .fields
                    .ok_or_else(|| "record type requires 'fields'".to_string())?;
                for (i, field) in fields.iter().enumerate() {
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        return Err(format!("duplicate field name '{}'", field.name));
                    }
                }
                PhysicalType::Record(fields)
            }
            other => return Err(format!("unknown type '{}'", other)),
        };

        let logical = match node.logical_type.as_deref() {
            None => None,
            Some("date") => Some(LogicalType::Date),
            Some("time-millis") => Some(LogicalType::TimeMillis),
            Some("time-micros") => Some(LogicalType::TimeMicros),
            Some("timestamp-millis") => Some(LogicalType::TimestampMillis),
            Some("timestamp-micros") => Some(LogicalType::TimestampMicros),
            Some("decimal") => {
                let precision = node
                    .precision
                    .ok_or_else(|| "decimal requires 'precision'".to_string())?;
                let scale = node.scale.unwrap_or(0);
                if precision == 0 || scale > precision {
                    return Err(format!(
                        "invalid decimal precision/scale ({},{})",
                        precision, scale
                    ));
                }
                Some(LogicalType::Decimal { precision, scale })
            }
            Some(other) => return Err(format!("unknown logicalType '{}'", other)),
        };

        if let Some(logical) = logical {
            if !logical.fits(&physical) {
                return Err(format!(
                    "logicalType '{}' cannot refine '{}'",
                    logical.tag(),
                    physical.tag()
                ));
            }
        }

        Ok(UniversalType {
            physical,
            logical,
            nullable: node.nullable,
        })
    }
}

impl From<UniversalType> for SchemaNode {
    fn from(ty: UniversalType) -> Self {
        let (precision, scale) = match ty.logical {
            Some(LogicalType::Decimal { precision, scale }) => (Some(precision), Some(scale)),
            _ => (None, None),
        };
        let type_name = ty.physical.tag().to_string();
        let (items, fields) = match ty.physical {
            PhysicalType::Array(items) => (Some(items), None),
            PhysicalType::Record(fields) => (None, Some(fields)),
            _ => (None, None),
        };
        SchemaNode {
            type_name,
            logical_type: ty.logical.map(|l| l.tag().to_string()),
            precision,
            scale,
            nullable: ty.nullable,
            items,
            fields,
        }
    }
}
