//! Schema types and the `name:type,...` schema expression language.
//!
//! ```
//! use polyframe_core::{DataType, Schema};
//!
//! let schema: Schema = "a:str,b:[{x:int,y:double}]".parse().unwrap();
//! assert_eq!(schema.names(), vec!["a", "b"]);
//! assert!(matches!(schema.fields()[1].data_type, DataType::List(_)));
//! assert_eq!(schema.to_string(), "a:str,b:[{x:int,y:double}]");
//! ```

use crate::error::{FrameError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Str,
    Bool,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    Double,
    Date,
    Datetime,
    List(Box<DataType>),
    Struct(Vec<Field>),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Long | DataType::Double)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int | DataType::Long)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Datetime)
    }

    /// List and struct types; backends without native nesting store these as encoded text.
    pub fn is_nested(&self) -> bool {
        matches!(self, DataType::List(_) | DataType::Struct(_))
    }

    fn parse_primitive(token: &str) -> Option<DataType> {
        match token.to_ascii_lowercase().as_str() {
            "str" | "string" => Some(DataType::Str),
            "bool" | "boolean" => Some(DataType::Bool),
            "int" | "int32" => Some(DataType::Int),
            "long" | "int64" | "bigint" => Some(DataType::Long),
            "double" | "float64" => Some(DataType::Double),
            "date" => Some(DataType::Date),
            "datetime" | "timestamp" => Some(DataType::Datetime),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Str => write!(f, "str"),
            DataType::Bool => write!(f, "bool"),
            DataType::Int => write!(f, "int"),
            DataType::Long => write!(f, "long"),
            DataType::Double => write!(f, "double"),
            DataType::Date => write!(f, "date"),
            DataType::Datetime => write!(f, "datetime"),
            DataType::List(inner) => write!(f, "[{inner}]"),
            DataType::Struct(fields) => {
                write!(f, "{{")?;
                write_fields(f, fields)?;
                write!(f, "}}")
            }
        }
    }
}

impl FromStr for DataType {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser::new(s);
        let dtype = parser.data_type()?;
        parser.expect_end()?;
        Ok(dtype)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Field {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if is_plain_name(&self.name) {
            write!(f, "{}:{}", self.name, self.data_type)
        } else {
            write!(f, "`{}`:{}", self.name.replace('`', "``"), self.data_type)
        }
    }
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &[Field]) -> fmt::Result {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{field}")?;
    }
    Ok(())
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Ordered list of uniquely named, typed columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema, rejecting empty or duplicated names.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        check_names(&fields)?;
        Ok(Schema { fields })
    }

    pub fn empty() -> Self {
        Schema::default()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn types(&self) -> Vec<&DataType> {
        self.fields.iter().map(|f| &f.data_type).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.index_of(name)
            .map(|i| &self.fields[i])
            .ok_or_else(|| self.missing(name))
    }

    /// Positions of `names` in this schema, failing on the first missing column.
    pub fn indices_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| self.index_of(n.as_ref()).ok_or_else(|| self.missing(n.as_ref())))
            .collect()
    }

    /// Sub-schema with `names` in the given order.
    pub fn extract<S: AsRef<str>>(&self, names: &[S]) -> Result<Schema> {
        let fields = self
            .indices_of(names)?
            .into_iter()
            .map(|i| self.fields[i].clone())
            .collect();
        Schema::new(fields)
    }

    /// Schema without `names`; every name must exist.
    pub fn exclude<S: AsRef<str>>(&self, names: &[S]) -> Result<Schema> {
        self.indices_of(names)?;
        let drop: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        Ok(Schema {
            fields: self
                .fields
                .iter()
                .filter(|f| !drop.contains(f.name.as_str()))
                .cloned()
                .collect(),
        })
    }

    /// Rename columns; keys must exist and the result must keep names unique.
    pub fn rename(&self, mapping: &HashMap<String, String>) -> Result<Schema> {
        for old in mapping.keys() {
            if !self.contains(old) {
                return Err(self.missing(old));
            }
        }
        let fields = self
            .fields
            .iter()
            .map(|f| match mapping.get(&f.name) {
                Some(new) => Field {
                    name: new.clone(),
                    ..f.clone()
                },
                None => f.clone(),
            })
            .collect();
        Schema::new(fields)
    }

    /// Replace the types of the columns named in `changes`, keeping order.
    pub fn alter(&self, changes: &Schema) -> Result<Schema> {
        let mut fields = self.fields.clone();
        for change in &changes.fields {
            let i = self.index_of(&change.name).ok_or_else(|| self.missing(&change.name))?;
            fields[i].data_type = change.data_type.clone();
        }
        Ok(Schema { fields })
    }

    /// Append the fields of `other`; names must stay unique.
    pub fn append(&self, other: &Schema) -> Result<Schema> {
        let mut fields = self.fields.clone();
        fields.extend(other.fields.iter().cloned());
        Schema::new(fields)
    }

    /// Serialize the schema to JSON (array of field objects).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Schema> {
        let schema: Schema = serde_json::from_str(json)
            .map_err(|e| FrameError::InvalidSchema(format!("invalid schema json: {e}")))?;
        check_names(&schema.fields)?;
        Ok(schema)
    }

    fn missing(&self, name: &str) -> FrameError {
        let available: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        FrameError::missing_column(name, &available)
    }
}

fn check_names(fields: &[Field]) -> Result<()> {
    let mut seen = HashSet::with_capacity(fields.len());
    for f in fields {
        if f.name.is_empty() {
            return Err(FrameError::InvalidSchema("column name can't be empty".into()));
        }
        if !seen.insert(f.name.as_str()) {
            return Err(FrameError::InvalidSchema(format!(
                "duplicate column name '{}'",
                f.name
            )));
        }
        if let DataType::Struct(inner) = &f.data_type {
            check_names(inner)?;
        }
    }
    Ok(())
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fields(f, &self.fields)
    }
}

impl FromStr for Schema {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser::new(s);
        parser.skip_ws();
        if parser.at_end() {
            return Ok(Schema::empty());
        }
        let fields = parser.fields(None)?;
        parser.expect_end()?;
        Schema::new(fields)
    }
}

impl TryFrom<&str> for Schema {
    type Error = FrameError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Parser { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, msg: &str) -> FrameError {
        FrameError::InvalidSchema(format!("{msg} at position {} in '{}'", self.pos, self.src))
    }

    fn expect(&mut self, ch: char) -> Result<()> {
        self.skip_ws();
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(self.error(&format!("expected '{ch}'")))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_ws();
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    /// Comma separated `name:type` list, ending at `close` (or end of input).
    fn fields(&mut self, close: Option<char>) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        loop {
            let name = self.name()?;
            self.expect(':')?;
            let data_type = self.data_type()?;
            fields.push(Field::new(name, data_type));
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                c if c == close || c.is_none() => return Ok(fields),
                _ => return Err(self.error("expected ','")),
            }
        }
    }

    fn name(&mut self) -> Result<String> {
        self.skip_ws();
        if self.peek() == Some('`') {
            self.pos += 1;
            let mut name = String::new();
            loop {
                match self.peek() {
                    None => return Err(self.error("unterminated quoted name")),
                    Some('`') => {
                        self.pos += 1;
                        if self.peek() == Some('`') {
                            self.pos += 1;
                            name.push('`');
                        } else {
                            return Ok(name);
                        }
                    }
                    Some(c) => {
                        self.pos += c.len_utf8();
                        name.push(c);
                    }
                }
            }
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if start == self.pos {
            return Err(self.error("expected column name"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn data_type(&mut self) -> Result<DataType> {
        self.skip_ws();
        match self.peek() {
            Some('[') => {
                self.pos += 1;
                let inner = self.data_type()?;
                self.expect(']')?;
                Ok(DataType::List(Box::new(inner)))
            }
            Some('{') => {
                self.pos += 1;
                self.skip_ws();
                let fields = if self.peek() == Some('}') {
                    Vec::new()
                } else {
                    self.fields(Some('}'))?
                };
                self.expect('}')?;
                check_names(&fields)?;
                Ok(DataType::Struct(fields))
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    self.pos += c.len_utf8();
                }
                let token = &self.src[start..self.pos];
                DataType::parse_primitive(token)
                    .ok_or_else(|| self.error(&format!("unknown type '{token}'")))
            }
        }
    }
}
