//! Schema descriptors and struct binding.
//!
//! A target type lists its fields once in [`Schema::describe`]. Binding and
//! schema validation are then loops over that list; nested schemas are folded
//! into the parent's list at description time.
//!
//! ```
//! use layerconf::{Config, Descriptor, Schema};
//!
//! #[derive(Debug, Default)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Schema for Server {
//!     fn describe(d: &mut Descriptor<Self>) {
//!         d.field("host", "server.host", |s| &mut s.host).default("localhost");
//!         d.field("port", "server.port", |s| &mut s.port).default("8080").validate("min=1,max=65535");
//!     }
//! }
//!
//! let config = Config::builder().build();
//! let server: Server = config.bind().unwrap();
//! assert_eq!(server.host, "localhost");
//! assert_eq!(server.port, 8080);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::config::error::{BindError, BindFailure};
use crate::config::store::Config;
use crate::value::{CoerceError, FlatMap, FromValue, Value, ValueKind};

type Assign<T> = Arc<dyn Fn(&mut T, &Value) -> Result<(), CoerceError> + Send + Sync>;
type AssignLiteral<T> = Arc<dyn Fn(&mut T, &str) -> Result<(), CoerceError> + Send + Sync>;
type Registry = Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static DESCRIPTORS: OnceLock<Registry> = OnceLock::new();

/// A type that can be populated from configuration.
pub trait Schema: Default + 'static {
    fn describe(descriptor: &mut Descriptor<Self>);

    fn descriptor() -> Descriptor<Self> {
        let mut descriptor = Descriptor::new();
        Self::describe(&mut descriptor);
        descriptor
    }
}

/// Descriptor for `T`, described once per process and shared afterwards.
pub fn shared_descriptor<T: Schema>() -> Arc<Descriptor<T>> {
    let registry = DESCRIPTORS.get_or_init(Registry::default);
    let cached = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&TypeId::of::<T>())
        .cloned();
    if let Some(descriptor) = cached.and_then(|any| any.downcast::<Descriptor<T>>().ok()) {
        return descriptor;
    }

    // Described outside the lock: nested schemas describe their children.
    let built = Arc::new(T::descriptor());
    let entry = registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::clone(&built) as Arc<dyn Any + Send + Sync>)
        .clone();
    entry.downcast::<Descriptor<T>>().unwrap_or(built)
}

/// Ordered leaf fields of a schema.
pub struct Descriptor<T> {
    fields: Vec<FieldSpec<T>>,
}

/// One leaf field: lookup key, optional default and rule expression.
pub struct FieldSpec<T> {
    name: String,
    key: String,
    kind: ValueKind,
    default: Option<String>,
    rules: Option<String>,
    assign: Assign<T>,
    assign_literal: AssignLiteral<T>,
}

impl<T: 'static> Descriptor<T> {
    fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a leaf field bound to `key`.
    pub fn field<F, A>(&mut self, name: &str, key: &str, access: A) -> &mut FieldSpec<T>
    where
        F: FromValue + 'static,
        A: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let access = Arc::new(access);
        let access_literal = Arc::clone(&access);
        self.fields.push(FieldSpec {
            name: name.to_string(),
            key: key.to_string(),
            kind: F::KIND,
            default: None,
            rules: None,
            assign: Arc::new(move |target: &mut T, value: &Value| {
                *access(target) = F::from_value(value)?;
                Ok(())
            }),
            assign_literal: Arc::new(move |target: &mut T, literal: &str| {
                *access_literal(target) = F::from_literal(literal)?;
                Ok(())
            }),
        });
        let last = self.fields.len() - 1;
        &mut self.fields[last]
    }

    /// Declare a nested schema. Its fields are listed under `name.`.
    pub fn nested<N, A>(&mut self, name: &str, access: A)
    where
        N: Schema,
        A: Fn(&mut T) -> &mut N + Send + Sync + 'static,
    {
        let access = Arc::new(access);
        for child in N::descriptor().fields {
            let assign = child.assign;
            let assign_literal = child.assign_literal;
            let access_value = Arc::clone(&access);
            let access_literal = Arc::clone(&access);
            self.fields.push(FieldSpec {
                name: format!("{}.{}", name, child.name),
                key: child.key,
                kind: child.kind,
                default: child.default,
                rules: child.rules,
                assign: Arc::new(move |target: &mut T, value: &Value| {
                    assign(access_value(target), value)
                }),
                assign_literal: Arc::new(move |target: &mut T, literal: &str| {
                    assign_literal(access_literal(target), literal)
                }),
            });
        }
    }

    pub fn fields(&self) -> &[FieldSpec<T>] {
        &self.fields
    }

    /// Populate `target` from `data`, stopping at the first failure.
    pub fn bind_into(&self, data: &FlatMap, target: &mut T) -> Result<(), BindError> {
        for field in &self.fields {
            match data.get(&field.key) {
                Some(value) => (field.assign)(&mut *target, value)
                    .map_err(|cause| field.error(BindFailure::Value(cause)))?,
                None => {
                    if let Some(literal) = &field.default {
                        (field.assign_literal)(&mut *target, literal).map_err(|cause| {
                            field.error(BindFailure::Default {
                                literal: literal.clone(),
                                cause,
                            })
                        })?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl<T> FieldSpec<T> {
    /// Textual default used when the key is absent.
    pub fn default(&mut self, literal: &str) -> &mut Self {
        self.default = Some(literal.to_string());
        self
    }

    /// Rule expression, e.g. `required,min=1,max=65535`.
    pub fn validate(&mut self, expression: &str) -> &mut Self {
        self.rules = Some(expression.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_literal(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn rules(&self) -> Option<&str> {
        self.rules.as_deref()
    }

    fn error(&self, reason: BindFailure) -> BindError {
        BindError {
            field: self.name.clone(),
            key: self.key.clone(),
            reason,
        }
    }
}

impl Config {
    /// Build a `T` from the current snapshot.
    ///
    /// Missing keys fall back to declared defaults, or stay at `T::default()`.
    ///
    /// # Errors
    ///
    /// The first field whose value or default cannot be converted.
    pub fn bind<T: Schema>(&self) -> Result<T, BindError> {
        let mut target = T::default();
        self.bind_into(&mut target)?;
        Ok(target)
    }

    /// Populate an existing value in place.
    pub fn bind_into<T: Schema>(&self, target: &mut T) -> Result<(), BindError> {
        let data = self.current();
        shared_descriptor::<T>().bind_into(&data, target)
    }
}
