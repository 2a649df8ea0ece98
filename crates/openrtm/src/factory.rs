// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! String-keyed constructor registry.
//!
//! Buffers and publishers are selected by name from the connector profile
//! (`dataport.buffer_type`, `dataport.subscription_type`). Registries are
//! plain values built once and shared by `Arc`; there is no global instance.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Ctor<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Registry of named constructors producing `Box<T>`.
pub struct Factory<T: ?Sized> {
    ctors: RwLock<HashMap<String, Ctor<T>>>,
}

impl<T: ?Sized> Factory<T> {
    pub fn new() -> Self {
        Self {
            ctors: RwLock::new(HashMap::new()),
        }
    }

    /// Register a constructor. Returns `false` if the name was already taken
    /// (the existing entry is kept).
    pub fn register<F>(&self, name: impl Into<String>, ctor: F) -> bool
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        let mut ctors = self.ctors.write();
        let name = name.into();
        if ctors.contains_key(&name) {
            return false;
        }
        ctors.insert(name, Arc::new(ctor));
        true
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.ctors.write().remove(name).is_some()
    }

    /// Build a fresh instance, or `None` for an unknown name.
    pub fn create(&self, name: &str) -> Option<Box<T>> {
        // Clone the constructor out so user code never runs under the lock.
        let ctor = self.ctors.read().get(name).cloned()?;
        Some(ctor())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ctors.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ctors.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: ?Sized> Default for Factory<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send {
        fn sides(&self) -> u32;
    }
    struct Square;
    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    #[test]
    fn test_register_and_create() {
        let factory: Factory<dyn Shape> = Factory::new();
        assert!(factory.register("square", || Box::new(Square)));
        assert!(!factory.register("square", || Box::new(Square)));
        assert_eq!(factory.create("square").map(|s| s.sides()), Some(4));
        assert!(factory.create("circle").is_none());
        assert_eq!(factory.names(), vec!["square".to_string()]);
        assert!(factory.unregister("square"));
        assert!(!factory.contains("square"));
    }
}
