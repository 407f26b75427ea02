//! Stored pointers bound to their address space

use crate::dependency::{Constructible, Constructor, Dependency, DependencyReader};
use crate::error::Result;
use crate::schema::{FieldContext, FieldValue};
use crate::translator::{AddressTranslator, PointerExpander};
use std::fmt;
use std::sync::Arc;

/// A 32-bit stored pointer.
///
/// Always carries the translator of its address space; containers with
/// truncated metadata pointers also attach an expander.
#[derive(Clone)]
pub struct Pointer {
    raw: u32,
    translator: Arc<dyn AddressTranslator>,
    expander: Option<Arc<dyn PointerExpander>>,
}

impl Pointer {
    pub fn new(raw: u32, translator: Arc<dyn AddressTranslator>) -> Self {
        Self {
            raw,
            translator,
            expander: None,
        }
    }

    pub fn with_expander(mut self, expander: Arc<dyn PointerExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Stored value
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn is_null(&self) -> bool {
        self.raw == 0
    }

    /// Pointer value after expansion
    pub fn value(&self) -> Result<u64> {
        match &self.expander {
            Some(expander) => expander.expand(self.raw),
            None => Ok(u64::from(self.raw)),
        }
    }

    /// File offset this pointer refers to
    pub fn address(&self) -> Result<u64> {
        self.translator.get_address(self.value()?)
    }

    pub fn translator(&self) -> &Arc<dyn AddressTranslator> {
        &self.translator
    }

    /// Same stored value interpreted in another address space
    pub fn retarget(&self, translator: Arc<dyn AddressTranslator>) -> Self {
        Self {
            raw: self.raw,
            translator,
            expander: self.expander.clone(),
        }
    }

    /// Same address space with a different stored value
    pub fn with_raw(&self, raw: u32) -> Self {
        Self {
            raw,
            translator: Arc::clone(&self.translator),
            expander: self.expander.clone(),
        }
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:#010x} in {}", self.raw, self.translator.space())?;
        if self.expander.is_some() {
            f.write_str(", expanded")?;
        }
        f.write_str(")")
    }
}

impl Constructible for Pointer {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new(
                "translated",
                vec![
                    Dependency::cursor(),
                    Dependency::on::<Arc<dyn AddressTranslator>>(),
                ],
                |reader| {
                    let raw = reader.read_u32()?;
                    Ok(Pointer::new(raw, reader.resolve()?))
                },
            ),
            Constructor::new(
                "expanded",
                vec![
                    Dependency::cursor(),
                    Dependency::on::<Arc<dyn AddressTranslator>>(),
                    Dependency::on::<Arc<dyn PointerExpander>>(),
                ],
                |reader| {
                    let raw = reader.read_u32()?;
                    let translator = reader.resolve::<Arc<dyn AddressTranslator>>()?;
                    let expander = reader.resolve::<Arc<dyn PointerExpander>>()?;
                    Ok(Pointer::new(raw, translator).with_expander(expander))
                },
            ),
        ]
    }
}

impl FieldValue for Pointer {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        reader.resolve()
    }
}

/// A 64-bit stored pointer
#[derive(Clone)]
pub struct Pointer64 {
    raw: u64,
    translator: Arc<dyn AddressTranslator>,
}

impl Pointer64 {
    pub fn new(raw: u64, translator: Arc<dyn AddressTranslator>) -> Self {
        Self { raw, translator }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    pub fn is_null(&self) -> bool {
        self.raw == 0
    }

    pub fn address(&self) -> Result<u64> {
        self.translator.get_address(self.raw)
    }

    pub fn translator(&self) -> &Arc<dyn AddressTranslator> {
        &self.translator
    }

    pub fn retarget(&self, translator: Arc<dyn AddressTranslator>) -> Self {
        Self::new(self.raw, translator)
    }
}

impl fmt::Debug for Pointer64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pointer64({:#018x} in {})",
            self.raw,
            self.translator.space()
        )
    }
}

impl Constructible for Pointer64 {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(
            "translated",
            vec![
                Dependency::cursor(),
                Dependency::on::<Arc<dyn AddressTranslator>>(),
            ],
            |reader| {
                let raw = reader.read_u64()?;
                Ok(Pointer64::new(raw, reader.resolve()?))
            },
        )]
    }
}

impl FieldValue for Pointer64 {
    fn read_value(reader: &mut DependencyReader<'_>, _: FieldContext<'_>) -> Result<Self> {
        reader.resolve()
    }
}
