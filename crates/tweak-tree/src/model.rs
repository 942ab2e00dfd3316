//! Model type declarations.
//!
//! A model type is declared as data: its name (recorded under
//! [`MODEL_TYPE_KEY`](crate::snapshot::MODEL_TYPE_KEY) in standard
//! snapshots), its fields with default values, and an optional unique-id
//! field the snapshot applier uses to decide whether an incoming snapshot
//! describes an existing instance.
//!
//! ```
//! use tweak_tree::ModelType;
//!
//! let todo = ModelType::builder("todo")
//!     .id_field("id")
//!     .field("text", "")
//!     .field("done", false)
//!     .build();
//! assert_eq!(todo.name(), "todo");
//! assert_eq!(todo.id_field(), Some("id"));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelType {
    name: String,
    id_field: Option<String>,
    defaults: IndexMap<String, Snapshot>,
}

impl ModelType {
    pub fn builder(name: impl Into<String>) -> ModelTypeBuilder {
        ModelTypeBuilder {
            ty: ModelType {
                name: name.into(),
                id_field: None,
                defaults: IndexMap::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    /// Declared fields with their default values, in declaration order.
    pub fn defaults(&self) -> &IndexMap<String, Snapshot> {
        &self.defaults
    }

    /// The unique id recorded in a model data snapshot, if the type declares
    /// an id field and the snapshot carries it.
    pub fn id_of<'a>(&self, data: &'a Snapshot) -> Option<&'a Snapshot> {
        data.get(self.id_field.as_deref()?)
    }
}

pub struct ModelTypeBuilder {
    ty: ModelType,
}

impl ModelTypeBuilder {
    /// Declares a field and the value it takes when a new instance does not
    /// provide one.
    pub fn field(mut self, name: impl Into<String>, default: impl Into<Snapshot>) -> Self {
        self.ty.defaults.insert(name.into(), default.into());
        self
    }

    /// Declares the field holding the instance's unique id. The field is
    /// added with a `null` default if it was not declared yet.
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.ty.defaults.entry(name.clone()).or_insert(Snapshot::Null);
        self.ty.id_field = Some(name);
        self
    }

    pub fn build(self) -> ModelType {
        self.ty
    }
}

#[derive(Debug, Default)]
pub(crate) struct ModelRegistry {
    types: HashMap<String, Arc<ModelType>>,
}

impl ModelRegistry {
    pub fn register(&mut self, ty: ModelType) -> Arc<ModelType> {
        let ty = Arc::new(ty);
        if self.types.insert(ty.name.clone(), ty.clone()).is_some() {
            log::debug!("model type {:?} re-registered", ty.name);
        }
        ty
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelType>> {
        self.types.get(name).cloned()
    }
}
