//! Declarative record layouts
//!
//! Record types describe their stored layout once through [`Structure`];
//! the resulting [`TypeSchema`] is validated on first use and cached for
//! the life of the process. Reading is done by
//! [`DependencyReader::read_object`](crate::dependency::DependencyReader::read_object).

pub mod field;
pub mod type_schema;
pub mod value;
pub mod version;

pub use field::{FieldContext, FieldDescriptor, FieldRole, StringEncoding};
pub use type_schema::{SchemaBuilder, TypeSchema};
pub use value::{FieldValue, ValueKind};
pub use version::{VersionRange, Versioned};

use crate::dependency::Constructible;
use crate::error::{BinaryError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;

/// A record type with a declared stored layout
pub trait Structure: Constructible {
    fn build_schema() -> Result<TypeSchema<Self>>;
}

type SchemaEntry = &'static (dyn Any + Send + Sync);

static SCHEMAS: Lazy<RwLock<HashMap<TypeId, SchemaEntry>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Cached schema of `T`, built and validated on first request.
///
/// A schema that fails validation is not cached; every request reports the
/// same configuration error.
pub fn schema_of<T: Structure>() -> Result<&'static TypeSchema<T>> {
    let id = TypeId::of::<T>();
    if let Some(entry) = SCHEMAS.read().get(&id) {
        return downcast(*entry);
    }

    let built = T::build_schema()?;
    let entry = *SCHEMAS
        .write()
        .entry(id)
        .or_insert_with(|| Box::leak(Box::new(built)) as SchemaEntry);
    downcast(entry)
}

fn downcast<T: 'static>(entry: SchemaEntry) -> Result<&'static TypeSchema<T>> {
    entry.downcast_ref::<TypeSchema<T>>().ok_or_else(|| {
        BinaryError::configuration(format!(
            "Schema cache entry for {} has the wrong type",
            std::any::type_name::<T>()
        ))
    })
}
