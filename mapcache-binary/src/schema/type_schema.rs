//! Per-type record layouts

use super::field::{FieldDescriptor, FieldRole};
use super::version::{VersionRange, Versioned};
use crate::dependency::DependencyReader;
use crate::error::{BinaryError, Result};

type ManualFn<T> =
    Box<dyn Fn(&mut DependencyReader<'_>, Option<i32>) -> Result<T> + Send + Sync>;

/// Layout of a record type: either field descriptors or a manual routine,
/// plus an optional version-ranged fixed size
pub struct TypeSchema<T> {
    name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
    sizes: Versioned<u64>,
    manual: Option<ManualFn<T>>,
}

impl<T: 'static> TypeSchema<T> {
    /// Start a field-driven schema
    pub fn builder(name: &'static str) -> SchemaBuilder<T> {
        SchemaBuilder {
            name,
            fields: Vec::new(),
            sizes: Versioned::new(),
            manual: None,
        }
    }

    /// Start a schema whose records are read by `routine`
    pub fn manual<F>(name: &'static str, routine: F) -> SchemaBuilder<T>
    where
        F: Fn(&mut DependencyReader<'_>, Option<i32>) -> Result<T> + Send + Sync + 'static,
    {
        SchemaBuilder {
            name,
            fields: Vec::new(),
            sizes: Versioned::new(),
            manual: Some(Box::new(routine)),
        }
    }
}

impl<T> TypeSchema<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Declared size for `version`
    pub fn fixed_size(&self, version: Option<i32>) -> Option<u64> {
        self.sizes.resolve(version)
    }

    pub(crate) fn manual_routine(
        &self,
    ) -> Option<&(dyn Fn(&mut DependencyReader<'_>, Option<i32>) -> Result<T> + Send + Sync)> {
        self.manual.as_deref()
    }

    pub fn version_field(&self) -> Option<&FieldDescriptor<T>> {
        self.fields
            .iter()
            .find(|field| field.role() == FieldRole::VersionNumber)
    }
}

impl<T> std::fmt::Debug for TypeSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("sizes", &self.sizes)
            .field("manual", &self.manual.is_some())
            .finish()
    }
}

/// Builder for [`TypeSchema`]; all declarations are validated by [`build`](Self::build)
pub struct SchemaBuilder<T> {
    name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
    sizes: Versioned<u64>,
    manual: Option<ManualFn<T>>,
}

impl<T> SchemaBuilder<T> {
    pub fn field(mut self, field: FieldDescriptor<T>) -> Self {
        self.fields.push(field);
        self
    }

    /// Record size for every version
    pub fn fixed_size(self, size: u64) -> Self {
        self.fixed_size_for(VersionRange::ANY, size)
    }

    /// Record size for versions in `range`
    pub fn fixed_size_for(mut self, range: VersionRange, size: u64) -> Self {
        self.sizes.push(range, size);
        self
    }

    pub fn build(self) -> Result<TypeSchema<T>> {
        let name = self.name;
        self.sizes.validate(&format!("{} size", name))?;

        if self.manual.is_some() && !self.fields.is_empty() {
            return Err(BinaryError::configuration(format!(
                "{}: manual schemas cannot declare fields",
                name
            )));
        }

        for field in &self.fields {
            field.validate(name)?;
        }

        let version_fields: Vec<_> = self
            .fields
            .iter()
            .filter(|field| field.role() == FieldRole::VersionNumber)
            .collect();
        match version_fields.as_slice() {
            [] => {}
            [field] => {
                if !field.applicability().is_unbounded() || field.offset_for(None).is_none() {
                    return Err(BinaryError::configuration(format!(
                        "{}.{}: version field needs an unconditional offset",
                        name,
                        field.name()
                    )));
                }
            }
            _ => {
                return Err(BinaryError::configuration(format!(
                    "{}: more than one version field",
                    name
                )));
            }
        }

        let lengths: Vec<_> = self
            .fields
            .iter()
            .filter(|field| field.role() == FieldRole::DataLength)
            .collect();
        for (i, field) in lengths.iter().enumerate() {
            for other in &lengths[i + 1..] {
                if field.applicability().overlaps(&other.applicability()) {
                    return Err(BinaryError::configuration(format!(
                        "{}: data length fields {} and {} apply to the same versions",
                        name,
                        field.name(),
                        other.name()
                    )));
                }
            }
        }

        Ok(TypeSchema {
            name,
            fields: self.fields,
            sizes: self.sizes,
            manual: self.manual,
        })
    }
}
