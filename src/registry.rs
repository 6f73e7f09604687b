use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::encode::Encoder;
use crate::error::Result;
use crate::value::CborObject;

/// Stable identifier for an application type.
pub type TypeKey = Cow<'static, str>;

/// Encoder function registered for a semantic type.
///
/// It receives the active encoder and the object, and may emit any number
/// of items (tags included). Nothing is wrapped around its output.
pub type EncodeFn = Arc<dyn Fn(&mut Encoder<'_>, &dyn CborObject) -> Result<()> + Send + Sync>;

/// Table of semantic-type encoders owned by one [`Encoder`].
///
/// A registry may sit on top of a shared, read-only base table. Lookups try
/// the owned entries first and fall back to the base; registrations only
/// ever touch the owned entries.
#[derive(Clone, Default)]
pub struct Registry {
    types: HashMap<TypeKey, EncodeFn>,
    base: Option<Arc<Registry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry layered over a shared base table.
    pub fn with_base(base: Arc<Registry>) -> Self {
        Registry {
            types: HashMap::new(),
            base: Some(base),
        }
    }

    /// Inserts or replaces the encoder for `key`.
    pub fn register<K, F>(&mut self, key: K, f: F)
    where
        K: Into<TypeKey>,
        F: Fn(&mut Encoder<'_>, &dyn CborObject) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(key.into(), Arc::new(f));
    }

    pub fn insert(&mut self, key: TypeKey, f: EncodeFn) {
        trace!(type_key = %key, "registering semantic type");
        self.types.insert(key, f);
    }

    fn lookup(&self, key: &str) -> Option<&EncodeFn> {
        self.types
            .get(key)
            .or_else(|| self.base.as_deref().and_then(|base| base.lookup(key)))
    }

    /// Finds the most specific encoder for `object`, walking its type key and
    /// then its supertypes in declaration order.
    pub fn resolve(&self, object: &dyn CborObject) -> Option<EncodeFn> {
        std::iter::once(object.type_key())
            .chain(object.supertypes().iter().copied())
            .find_map(|key| self.lookup(key))
            .cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Number of entries owned by this registry, excluding the base table.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("base", &self.base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[derive(Debug)]
    struct Animal;

    impl CborObject for Animal {
        fn type_key(&self) -> &str {
            "Animal"
        }
    }

    #[derive(Debug)]
    struct Dog;

    impl CborObject for Dog {
        fn type_key(&self) -> &str {
            "Dog"
        }

        fn supertypes(&self) -> &[&str] {
            &["Mammal", "Animal"]
        }
    }

    fn emit_text(text: &'static str) -> impl Fn(&mut Encoder<'_>, &dyn CborObject) -> Result<()> {
        move |enc, _| {
            enc.push_text(text);
            Ok(())
        }
    }

    fn run(registry: &Registry, object: &dyn CborObject) -> Vec<u8> {
        let f = registry.resolve(object).expect("registered");
        let mut enc = Encoder::default();
        f(&mut enc, object).unwrap();
        enc.finalize().unwrap()
    }

    #[test]
    fn test_resolve_walks_supertypes() {
        let mut registry = Registry::new();
        registry.register("Animal", emit_text("animal"));
        assert_eq!(run(&registry, &Dog), crate::encode(&Value::from("animal")).unwrap());

        registry.register("Mammal", emit_text("mammal"));
        assert_eq!(run(&registry, &Dog), crate::encode(&Value::from("mammal")).unwrap());

        registry.register("Dog", emit_text("dog"));
        assert_eq!(run(&registry, &Dog), crate::encode(&Value::from("dog")).unwrap());
        assert_eq!(run(&registry, &Animal), crate::encode(&Value::from("animal")).unwrap());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.register("Animal", emit_text("first"));
        registry.register("Animal", emit_text("second"));
        assert_eq!(registry.len(), 1);
        assert_eq!(run(&registry, &Animal), crate::encode(&Value::from("second")).unwrap());
    }

    #[test]
    fn test_base_table_is_shared_but_not_mutated() {
        let mut base = Registry::new();
        base.register("Animal", emit_text("base"));
        let base = Arc::new(base);

        let mut a = Registry::with_base(base.clone());
        let b = Registry::with_base(base.clone());
        a.register("Animal", emit_text("override"));

        assert_eq!(run(&a, &Animal), crate::encode(&Value::from("override")).unwrap());
        assert_eq!(run(&b, &Animal), crate::encode(&Value::from("base")).unwrap());
        assert!(b.is_empty());
        assert!(b.contains("Animal"));
        assert!(!b.contains("Dog"));
    }

    #[test]
    fn test_unregistered_type_resolves_to_none() {
        let registry = Registry::new();
        assert!(registry.resolve(&Dog).is_none());
    }
}
