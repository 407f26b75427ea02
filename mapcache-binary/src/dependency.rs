//! Dependency-resolving construction
//!
//! Some values cannot be built from bytes alone: a [`Pointer`](crate::Pointer)
//! needs the translator of its address space, a resource identifier needs
//! the container it belongs to. Those values list their constructors and the
//! dependencies each one takes; a [`DependencyReader`] resolves them against
//! the factories and instances registered for the current read session.

use crate::error::{BinaryError, Result};
use crate::reader::BinaryReader;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Constructor nesting beyond this depth is treated as unresolvable
const MAX_DEPTH: usize = 16;

type Factory<T> = dyn Fn(&mut DependencyReader<'_>) -> Result<T> + Send + Sync;

#[derive(Clone)]
struct Registration {
    type_name: &'static str,
    factory: Arc<dyn Any + Send + Sync>,
}

/// Factories and instances available to a read session
#[derive(Clone, Default)]
pub struct DependencyRegistry {
    factories: HashMap<TypeId, Registration>,
    instances: HashMap<TypeId, Registration>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory that builds `T` from the active reader
    pub fn register_factory<T, F>(&mut self, factory: F) -> Result<()>
    where
        T: 'static,
        F: Fn(&mut DependencyReader<'_>) -> Result<T> + Send + Sync + 'static,
    {
        self.ensure_unregistered::<T>()?;
        let factory: Box<Factory<T>> = Box::new(factory);
        self.factories.insert(
            TypeId::of::<T>(),
            Registration {
                type_name: std::any::type_name::<T>(),
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Register a singleton; every resolution receives a clone
    pub fn register_instance<T>(&mut self, value: T) -> Result<()>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.ensure_unregistered::<T>()?;
        let factory: Box<Factory<T>> = Box::new(move |_| Ok(value.clone()));
        self.instances.insert(
            TypeId::of::<T>(),
            Registration {
                type_name: std::any::type_name::<T>(),
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    fn ensure_unregistered<T: 'static>(&self) -> Result<()> {
        let id = TypeId::of::<T>();
        if let Some(existing) = self.factories.get(&id).or_else(|| self.instances.get(&id)) {
            return Err(BinaryError::configuration(format!(
                "{} is already registered",
                existing.type_name
            )));
        }
        Ok(())
    }

    /// Whether `T` was registered as a factory or an instance
    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<T>())
    }

    fn contains_id(&self, id: TypeId) -> bool {
        self.factories.contains_key(&id) || self.instances.contains_key(&id)
    }

    fn registered<T: 'static>(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        let id = TypeId::of::<T>();
        self.factories
            .get(&id)
            .or_else(|| self.instances.get(&id))
            .map(|registration| Arc::clone(&registration.factory))
    }

    /// Pick the richest resolvable constructor of `T`
    pub fn select_constructor<T: Constructible>(&self) -> Result<Constructor<T>> {
        let candidates: Vec<_> = T::constructors()
            .into_iter()
            .filter(|ctor| ctor.is_resolvable(self, 0))
            .collect();
        let Some(best) = candidates.iter().map(Constructor::arity).max() else {
            return Err(BinaryError::configuration(format!(
                "No resolvable constructor for {}",
                std::any::type_name::<T>()
            )));
        };

        let mut richest = candidates.into_iter().filter(|ctor| ctor.arity() == best);
        match (richest.next(), richest.next()) {
            (Some(ctor), None) => Ok(ctor),
            (Some(first), Some(second)) => Err(BinaryError::configuration(format!(
                "{}: constructors '{}' and '{}' are equally rich",
                std::any::type_name::<T>(),
                first.name,
                second.name
            ))),
            (None, _) => Err(BinaryError::configuration(format!(
                "No resolvable constructor for {}",
                std::any::type_name::<T>()
            ))),
        }
    }

    /// Check that `T` can be resolved unambiguously with the current registrations
    pub fn validate<T: Constructible>(&self) -> Result<()> {
        if self.contains::<T>() {
            return Ok(());
        }
        self.select_constructor::<T>().map(|_| ())
    }
}

impl std::fmt::Debug for DependencyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |map: &HashMap<TypeId, Registration>| {
            map.values().map(|r| r.type_name).collect::<Vec<_>>()
        };
        f.debug_struct("DependencyRegistry")
            .field("factories", &names(&self.factories))
            .field("instances", &names(&self.instances))
            .finish()
    }
}

/// A type that can be built by the resolver
pub trait Constructible: Sized + 'static {
    /// Canonical constructors; types without any can only be registered
    fn constructors() -> Vec<Constructor<Self>> {
        Vec::new()
    }
}

/// One way of building `T`
pub struct Constructor<T> {
    name: &'static str,
    dependencies: Vec<Dependency>,
    build: fn(&mut DependencyReader<'_>) -> Result<T>,
}

impl<T> Constructor<T> {
    pub fn new(
        name: &'static str,
        dependencies: Vec<Dependency>,
        build: fn(&mut DependencyReader<'_>) -> Result<T>,
    ) -> Self {
        Self {
            name,
            dependencies,
            build,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of dependencies, the cursor included
    pub fn arity(&self) -> usize {
        self.dependencies.len()
    }

    fn is_resolvable(&self, registry: &DependencyRegistry, depth: usize) -> bool {
        self.dependencies
            .iter()
            .all(|dependency| dependency.is_resolvable(registry, depth))
    }
}

impl<T: Default> Constructor<T> {
    /// Cursor-only constructor producing `T::default()`
    pub fn default_value() -> Self {
        Self::new("default", vec![Dependency::cursor()], |_| Ok(T::default()))
    }
}

/// A constructor parameter
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    type_name: &'static str,
    kind: DependencyKind,
}

#[derive(Debug, Clone, Copy)]
enum DependencyKind {
    Cursor,
    Type {
        id: TypeId,
        constructible: fn(&DependencyRegistry, usize) -> bool,
    },
}

impl Dependency {
    /// The active cursor; always available
    pub fn cursor() -> Self {
        Self {
            type_name: "cursor",
            kind: DependencyKind::Cursor,
        }
    }

    /// A value of type `T`
    pub fn on<T: Constructible>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            kind: DependencyKind::Type {
                id: TypeId::of::<T>(),
                constructible: can_construct::<T>,
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn is_resolvable(&self, registry: &DependencyRegistry, depth: usize) -> bool {
        match self.kind {
            DependencyKind::Cursor => true,
            DependencyKind::Type { id, constructible } => {
                registry.contains_id(id) || constructible(registry, depth + 1)
            }
        }
    }
}

fn can_construct<T: Constructible>(registry: &DependencyRegistry, depth: usize) -> bool {
    depth < MAX_DEPTH
        && T::constructors()
            .iter()
            .any(|ctor| ctor.is_resolvable(registry, depth))
}

/// Cursor bound to the registrations of a read session
#[derive(Clone)]
pub struct DependencyReader<'a> {
    reader: BinaryReader<'a>,
    registry: Arc<DependencyRegistry>,
}

impl<'a> DependencyReader<'a> {
    pub fn new(reader: BinaryReader<'a>, registry: Arc<DependencyRegistry>) -> Self {
        Self { reader, registry }
    }

    pub fn registry(&self) -> &Arc<DependencyRegistry> {
        &self.registry
    }

    /// Sub-cursor at the current position sharing this session's registrations
    pub fn virtual_reader(&self) -> DependencyReader<'a> {
        DependencyReader {
            reader: self.reader.virtual_reader(),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Cursor at the same position with extra registrations layered on top
    pub fn child_scope<F>(&self, configure: F) -> Result<DependencyReader<'a>>
    where
        F: FnOnce(&mut DependencyRegistry) -> Result<()>,
    {
        let mut registry = DependencyRegistry::clone(&self.registry);
        configure(&mut registry)?;
        Ok(DependencyReader {
            reader: self.reader.clone(),
            registry: Arc::new(registry),
        })
    }

    pub fn into_inner(self) -> BinaryReader<'a> {
        self.reader
    }

    /// Build a `T`: registered factory, then registered instance, then the
    /// richest resolvable constructor
    pub fn resolve<T: Constructible>(&mut self) -> Result<T> {
        let registry = Arc::clone(&self.registry);
        if let Some(entry) = registry.registered::<T>() {
            let factory = entry.downcast_ref::<Box<Factory<T>>>().ok_or_else(|| {
                BinaryError::configuration(format!(
                    "Registration for {} has the wrong type",
                    std::any::type_name::<T>()
                ))
            })?;
            return factory(self);
        }
        let ctor = registry.select_constructor::<T>()?;
        (ctor.build)(self)
    }
}

impl<'a> Deref for DependencyReader<'a> {
    type Target = BinaryReader<'a>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl DerefMut for DependencyReader<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

impl std::fmt::Debug for DependencyReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyReader")
            .field("reader", &self.reader)
            .field("registry", &self.registry)
            .finish()
    }
}

/// Identifies the record a metadata read belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadContext {
    pub record_id: i32,
}

impl Constructible for ReadContext {}
