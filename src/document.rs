//! Swagger documents and their definitions
//!
//! Only the parts of a swagger document the variant walk needs are modelled:
//! the `definitions` table, each definition's `discriminator`, and the
//! `$ref` entries of its `allOf` list. Everything else stays as raw JSON.

use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::error::{Result, VariantError};
use crate::identity::normalize_path;

/// A parsed swagger file
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    path: PathBuf,
    json: Value,
}

impl SchemaDocument {
    /// Read and parse a swagger file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| VariantError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let json: Value = serde_json::from_str(&content).map_err(|source| VariantError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(path, json)
    }

    /// Wrap an already parsed JSON value
    pub fn from_value(path: &Path, json: Value) -> Result<Self> {
        if !json.is_object() {
            return Err(VariantError::NotADocument(path.to_path_buf()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            json,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all entries in the `definitions` table, in sorted order
    pub fn definition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .json
            .get("definitions")
            .and_then(|v| v.as_object())
            .map(|defs| defs.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Look up a definition by name
    pub fn definition(&self, name: &str) -> Option<SchemaDefinition<'_>> {
        self.json
            .get("definitions")
            .and_then(|defs| defs.get(name))
            .map(SchemaDefinition::new)
    }

    /// Evaluate a JSON pointer fragment (`/definitions/Foo`) against the document
    pub fn pointer(&self, fragment: &str) -> Option<&Value> {
        if fragment.is_empty() {
            return Some(&self.json);
        }
        self.json.pointer(fragment)
    }
}

/// Borrowed view of one schema definition
#[derive(Debug, Clone, Copy)]
pub struct SchemaDefinition<'a> {
    json: &'a Value,
}

/// One element of a definition's `allOf` list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component<'a> {
    /// Fields contributed in place
    Inline(&'a Value),
    /// `$ref` to another schema
    Reference(&'a str),
}

impl<'a> SchemaDefinition<'a> {
    pub fn new(json: &'a Value) -> Self {
        Self { json }
    }

    /// Whether this schema is a polymorphic base.
    ///
    /// Swagger 2.0 declares the discriminator as a property name string;
    /// OpenAPI 3 uses an object with `propertyName`.
    pub fn has_discriminator(&self) -> bool {
        match self.json.get("discriminator") {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Object(_)) => true,
            _ => false,
        }
    }

    /// Inheritance components in declaration order
    pub fn components(&self) -> impl Iterator<Item = Component<'a>> + 'a {
        self.json
            .get("allOf")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .map(|item| match item.get("$ref").and_then(|r| r.as_str()) {
                Some(reference) => Component::Reference(reference),
                None => Component::Inline(item),
            })
    }

    /// Only the `$ref` components
    pub fn references(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.components().filter_map(|c| match c {
            Component::Reference(r) => Some(r),
            Component::Inline(_) => None,
        })
    }
}

/// A `$ref` split into its file part and JSON pointer fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRef {
    /// Absolute, normalized path of the target file
    pub path: PathBuf,
    /// JSON pointer into the target file, without the leading `#` and with
    /// percent escapes decoded
    pub fragment: String,
}

impl SchemaRef {
    /// Parse `reference` as written in the file at `current`.
    ///
    /// An empty file part points back into `current`; relative file parts are
    /// resolved against `current`'s directory.
    pub fn parse(current: &Path, reference: &str) -> Result<Self> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Err(VariantError::UnsupportedReference {
                file: current.to_path_buf(),
                reference: reference.to_string(),
            });
        }

        let (file, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let fragment = percent_decode_str(fragment).decode_utf8().map_err(|_| {
            VariantError::UnresolvedReference {
                file: current.to_path_buf(),
                reference: reference.to_string(),
            }
        })?;

        let path = if file.is_empty() {
            current.to_path_buf()
        } else {
            let target = Path::new(file);
            if target.is_absolute() {
                normalize_path(target)
            } else {
                let parent = current.parent().unwrap_or(Path::new(""));
                normalize_path(&parent.join(target))
            }
        };

        Ok(Self {
            path,
            fragment: fragment.into_owned(),
        })
    }

    /// Schema name addressed by the fragment: its last segment, unescaped
    pub fn schema_name(&self) -> Option<String> {
        let last = self.fragment.rsplit('/').next()?;
        if last.is_empty() {
            return None;
        }
        Some(last.replace("~1", "/").replace("~0", "~"))
    }
}
