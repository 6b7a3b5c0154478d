// Field annotation parsing: constraint strings and storage-name tags

/// Constraint attributes parsed from a field's `#[docschema("...")]` string.
///
/// Supported tokens: `unique`, `index`, `required`, `immutable`,
/// `default=value`, `enum=a|b|c`, `min=N`, `max=N`, `ref=collection`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    pub required: bool,
    pub unique: bool,
    pub index: bool,
    pub immutable: bool,
    pub default: Option<String>,
    pub enum_values: Vec<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub reference: Option<String>,
}

/// Parse a comma-separated constraint string.
///
/// Unknown tokens and non-integer bounds are ignored rather than rejected.
/// Bare keywords are idempotent and order-independent; when a `key=value`
/// pair repeats, the last occurrence wins.
pub fn parse_constraints(tag: &str) -> Constraints {
    let mut constraints = Constraints::default();

    for part in tag.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((key, value)) = part.split_once('=') {
            match key.trim() {
                "default" => {
                    constraints.default = (!value.is_empty()).then(|| value.to_string());
                }
                "enum" => {
                    constraints.enum_values = value.split('|').map(str::to_string).collect();
                }
                "min" => {
                    if let Ok(n) = value.trim().parse() {
                        constraints.min = Some(n);
                    }
                }
                "max" => {
                    if let Ok(n) = value.trim().parse() {
                        constraints.max = Some(n);
                    }
                }
                "ref" => constraints.reference = Some(value.trim().to_string()),
                _ => {}
            }
        } else {
            match part {
                "unique" => constraints.unique = true,
                "index" => constraints.index = true,
                "required" => constraints.required = true,
                "immutable" => constraints.immutable = true,
                _ => {}
            }
        }
    }

    constraints
}

/// Storage (wire) name annotation: `name[,omitempty]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageTag {
    /// Explicit wire name; empty means "derive from the declared name".
    pub name: String,
    pub omit_empty: bool,
}

impl StorageTag {
    /// A wire name of `-` removes the field from the schema entirely.
    pub fn is_excluded(&self) -> bool {
        self.name == "-"
    }
}

/// Parse a storage-name tag such as `"email,omitempty"`, `",omitempty"` or `"-"`.
pub fn parse_storage_tag(tag: &str) -> StorageTag {
    let mut parts = tag.split(',');
    let name = parts.next().unwrap_or_default().trim().to_string();
    let omit_empty = parts.any(|p| p.trim() == "omitempty");
    StorageTag { name, omit_empty }
}
