//! Field descriptors
//!
//! A [`FieldDescriptor`] ties one member of a record type to where it lives
//! in the stored layout: its offset candidates, the versions it applies to,
//! an optional byte-order override and, for strings, how the text is stored.

use super::value::{FieldValue, ValueKind};
use super::version::{VersionRange, Versioned};
use super::Structure;
use crate::dependency::DependencyReader;
use crate::error::{BinaryError, Result};
use crate::reader::ByteOrder;

/// How a string field is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringEncoding {
    /// 32-bit byte count followed by the payload
    LengthPrefixed,
    /// Exactly `length` bytes; trailing NULs and `padding` are stripped
    FixedLength {
        length: usize,
        padding: Option<char>,
        trim: bool,
    },
    /// Terminated by NUL, optionally capped at `max_length` bytes
    NullTerminated { max_length: Option<usize> },
}

impl StringEncoding {
    pub fn fixed(length: usize) -> Self {
        Self::FixedLength {
            length,
            padding: None,
            trim: false,
        }
    }

    pub fn null_terminated(max_length: usize) -> Self {
        Self::NullTerminated {
            max_length: Some(max_length),
        }
    }
}

/// Special meaning attached to an integer field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldRole {
    #[default]
    Plain,
    /// Supplies the version when the caller did not
    VersionNumber,
    /// Authoritative record length
    DataLength,
}

/// Per-read information handed to value readers
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'s> {
    pub version: Option<i32>,
    pub encoding: Option<&'s StringEncoding>,
}

type ReadFn<T> = Box<
    dyn Fn(&mut T, &mut DependencyReader<'_>, FieldContext<'_>) -> Result<Option<i64>>
        + Send
        + Sync,
>;

/// Layout metadata for one member of `T`
pub struct FieldDescriptor<T> {
    name: &'static str,
    offsets: Versioned<u64>,
    applicability: VersionRange,
    byte_order: Option<ByteOrder>,
    encoding: Option<StringEncoding>,
    role: FieldRole,
    kind: ValueKind,
    read: ReadFn<T>,
}

impl<T: 'static> FieldDescriptor<T> {
    /// Describe a field read as `V` and stored through `set`
    pub fn new<V, F>(name: &'static str, set: F) -> Self
    where
        V: FieldValue,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        Self::with_reader(
            name,
            V::KIND,
            Box::new(move |target, reader, context| {
                let value = V::read_value(reader, context)?;
                let integer = value.as_integer();
                set(target, value);
                Ok(integer)
            }),
        )
    }

    /// Describe a nested record read with the same version
    pub fn object<U, F>(name: &'static str, set: F) -> Self
    where
        U: Structure,
        F: Fn(&mut T, U) + Send + Sync + 'static,
    {
        Self::with_reader(
            name,
            ValueKind::Other,
            Box::new(move |target, reader, context| {
                let value = reader.read_object::<U>(context.version)?;
                set(target, value);
                Ok(None)
            }),
        )
    }

    fn with_reader(name: &'static str, kind: ValueKind, read: ReadFn<T>) -> Self {
        Self {
            name,
            offsets: Versioned::new(),
            applicability: VersionRange::ANY,
            byte_order: None,
            encoding: None,
            role: FieldRole::Plain,
            kind,
            read,
        }
    }

    /// Offset used for every version
    pub fn at(self, offset: u64) -> Self {
        self.at_versions(VersionRange::ANY, offset)
    }

    /// Offset used for versions in `range`
    pub fn at_versions(mut self, range: VersionRange, offset: u64) -> Self {
        self.offsets.push(range, offset);
        self
    }

    /// Only read from `version` onwards
    pub fn min_version(mut self, version: i32) -> Self {
        self.applicability = VersionRange::new(Some(version), self.applicability.max());
        self
    }

    /// Only read before `version`
    pub fn max_version(mut self, version: i32) -> Self {
        self.applicability = VersionRange::new(self.applicability.min(), Some(version));
        self
    }

    /// Only read for exactly `version`
    pub fn exact_version(mut self, version: i32) -> Self {
        self.applicability = VersionRange::exactly(version);
        self
    }

    pub fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = Some(byte_order);
        self
    }

    pub fn encoding(mut self, encoding: StringEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn version_number(mut self) -> Self {
        self.role = FieldRole::VersionNumber;
        self
    }

    pub fn data_length(mut self) -> Self {
        self.role = FieldRole::DataLength;
        self
    }
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn role(&self) -> FieldRole {
        self.role
    }

    pub fn applicability(&self) -> VersionRange {
        self.applicability
    }

    /// Whether the field is read for `version`
    pub fn applies_to(&self, version: Option<i32>) -> bool {
        self.applicability.contains(version)
    }

    /// Offset of this field for `version`, if any candidate covers it
    pub fn offset_for(&self, version: Option<i32>) -> Option<u64> {
        self.offsets.resolve(version)
    }

    pub(crate) fn validate(&self, record: &str) -> Result<()> {
        let owner = format!("{}.{}", record, self.name);
        if self.offsets.is_empty() {
            return Err(BinaryError::configuration(format!(
                "{}: no offset declared",
                owner
            )));
        }
        self.offsets.validate(&owner)?;

        match (self.kind, &self.encoding) {
            (ValueKind::Text, None) => {
                return Err(BinaryError::configuration(format!(
                    "{}: string field without an encoding",
                    owner
                )));
            }
            (ValueKind::Text, Some(_)) | (_, None) => {}
            (_, Some(_)) => {
                return Err(BinaryError::configuration(format!(
                    "{}: encoding declared on a non-string field",
                    owner
                )));
            }
        }

        if self.role != FieldRole::Plain && self.kind != ValueKind::Integer {
            return Err(BinaryError::configuration(format!(
                "{}: {:?} field must be an integer",
                owner, self.role
            )));
        }
        Ok(())
    }

    /// Read the field at the cursor into `target`.
    ///
    /// Returns the integer value for integer fields so the caller can act
    /// on version-number and data-length roles.
    pub(crate) fn read_into(
        &self,
        target: &mut T,
        reader: &mut DependencyReader<'_>,
        version: Option<i32>,
    ) -> Result<Option<i64>> {
        let ambient = reader.byte_order();
        if let Some(order) = self.byte_order {
            reader.set_byte_order(order);
        }
        let context = FieldContext {
            version,
            encoding: self.encoding.as_ref(),
        };
        let result = (self.read)(target, reader, context);
        reader.set_byte_order(ambient);
        result
    }
}

impl<T> std::fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("offsets", &self.offsets)
            .field("applicability", &self.applicability)
            .field("byte_order", &self.byte_order)
            .field("encoding", &self.encoding)
            .field("role", &self.role)
            .finish()
    }
}
