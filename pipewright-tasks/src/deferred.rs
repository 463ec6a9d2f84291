//! Values that may be computed on first use.

/// Either a value or a function producing it. A supplier is called at most
/// once; its result replaces it.
pub enum Deferred<T> {
    /// An available value.
    Value(T),
    /// A function that produces the value on first use.
    Supplier(Box<dyn FnMut() -> T + Send + Sync>),
}

impl<T> Deferred<T> {
    /// Wraps a function to be called on first use.
    pub fn supplier(f: impl FnMut() -> T + Send + Sync + 'static) -> Self {
        Self::Supplier(Box::new(f))
    }

    /// Returns whether the value has been computed or was given directly.
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns the value, computing and memoizing it if needed.
    pub fn resolve(&mut self) -> &T {
        if let Self::Supplier(supplier) = self {
            *self = Self::Value(supplier());
        }

        match self {
            Self::Value(value) => value,
            Self::Supplier(_) => unreachable!("supplier replaced above"),
        }
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn supplier_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut deferred = Deferred::supplier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "computed".to_owned()
        });

        assert!(!deferred.is_resolved());
        assert_eq!(deferred.resolve(), "computed");
        assert_eq!(deferred.resolve(), "computed");
        assert!(deferred.is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn plain_value_is_resolved() {
        let mut deferred = Deferred::from(3);
        assert!(deferred.is_resolved());
        assert_eq!(*deferred.resolve(), 3);
    }
}
