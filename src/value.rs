use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::composition::InstanceId;
use crate::descriptor::{MetadataBag, MetadataValue};

/// Identifier of a value produced by a recorded call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultId(pub(crate) usize);

impl ResultId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// A value handed to constructors, setters and collection fills.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// A composed component instance.
    Instance(InstanceId),
    /// Return value of a recorded call.
    Returned(ResultId),
    Array {
        element_type: String,
        items: Vec<Value>,
    },
    Lazy(LazyValue),
    Metadata(MetadataProxy),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_lazy(&self) -> Option<&LazyValue> {
        match self {
            Value::Lazy(lazy) => Some(lazy),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Instance(a), Value::Instance(b)) => a == b,
            (Value::Returned(a), Value::Returned(b)) => a == b,
            (
                Value::Array { element_type: ta, items: ia },
                Value::Array { element_type: tb, items: ib },
            ) => ta == tb && ia == ib,
            (Value::Lazy(a), Value::Lazy(b)) => a.value.same(&b.value),
            (Value::Metadata(a), Value::Metadata(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Instance(id) => write!(f, "{id}"),
            Value::Returned(id) => write!(f, "{id}"),
            Value::Array { element_type, items } => {
                write!(f, "{element_type}[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Lazy(lazy) => write!(f, "{}", lazy.type_name),
            Value::Metadata(proxy) => write!(f, "{}{{..}}", proxy.type_name),
        }
    }
}

struct DeferredInner<T> {
    thunk: RefCell<Option<Box<dyn FnOnce() -> T>>>,
    value: OnceCell<T>,
}

/// A value computed on first use by a zero-argument thunk.
///
/// Clones share the thunk and the cached result.
pub struct Deferred<T> {
    inner: Rc<DeferredInner<T>>,
}

impl<T> Deferred<T> {
    pub fn new(thunk: impl FnOnce() -> T + 'static) -> Self {
        Self {
            inner: Rc::new(DeferredInner {
                thunk: RefCell::new(Some(Box::new(thunk))),
                value: OnceCell::new(),
            }),
        }
    }

    /// Run the thunk if it has not run yet and return the cached value.
    pub fn force(&self) -> &T {
        self.inner.value.get_or_init(|| {
            let thunk = self.inner.thunk.borrow_mut().take();
            match thunk {
                Some(thunk) => thunk(),
                None => unreachable!("deferred value forced re-entrantly"),
            }
        })
    }

    pub fn is_forced(&self) -> bool {
        self.inner.value.get().is_some()
    }

    /// Whether both handles share the same thunk.
    pub fn same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.value.get() {
            Some(value) => f.debug_tuple("Deferred").field(value).finish(),
            None => f.write_str("Deferred(<pending>)"),
        }
    }
}

/// Lazy wrapper delivered to lazy imports.
#[derive(Debug, Clone)]
pub struct LazyValue {
    /// Wrapper type, e.g. `Lazy<ILogger, IMeta>`.
    pub type_name: String,
    pub value: Deferred<Value>,
    /// Metadata view synthesized from the export's metadata bag.
    pub metadata: Option<Box<Value>>,
}

impl LazyValue {
    pub fn force(&self) -> &Value {
        self.value.force()
    }

    pub fn metadata(&self) -> Option<&MetadataProxy> {
        match self.metadata.as_deref() {
            Some(Value::Metadata(proxy)) => Some(proxy),
            _ => None,
        }
    }
}

/// Instance of a metadata view type backed by an export's metadata bag.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataProxy {
    pub type_name: String,
    pub entries: MetadataBag,
}

impl MetadataProxy {
    pub fn new(type_name: impl Into<String>, entries: MetadataBag) -> Self {
        Self {
            type_name: type_name.into(),
            entries,
        }
    }

    /// Single value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        match self.entries.get(key).map(Vec::as_slice) {
            Some([value]) => Some(value),
            _ => None,
        }
    }

    /// All values stored under `key`.
    pub fn get_all(&self, key: &str) -> &[MetadataValue] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }
}

type ClosureBody = Rc<dyn Fn(&[Value]) -> Value>;

/// Native closure with no declared method, used to synthesize values.
#[derive(Clone)]
pub struct NativeClosure {
    label: String,
    body: ClosureBody,
}

impl NativeClosure {
    pub fn new(label: impl Into<String>, body: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self {
            label: label.into(),
            body: Rc::new(body),
        }
    }

    /// Closure producing a lazy wrapper around `value`.
    pub fn lazy_wrapper(
        type_name: String,
        value: Deferred<Value>,
        metadata: Option<Value>,
    ) -> Self {
        let label = format!("synthesize {type_name}");
        Self::new(label, move |_| {
            Value::Lazy(LazyValue {
                type_name: type_name.clone(),
                value: value.clone(),
                metadata: metadata.clone().map(Box::new),
            })
        })
    }

    /// Closure producing a metadata view instance.
    pub fn metadata_proxy(proxy: MetadataProxy) -> Self {
        let label = format!("synthesize metadata {}", proxy.type_name);
        Self::new(label, move |_| Value::Metadata(proxy.clone()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl fmt::Debug for NativeClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NativeClosure").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn deferred_runs_thunk_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let deferred = Deferred::new(move || {
            counter.set(counter.get() + 1);
            42
        });
        let other = deferred.clone();

        assert!(!deferred.is_forced());
        assert_eq!(*deferred.force(), 42);
        assert_eq!(*other.force(), 42);
        assert!(other.is_forced());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn metadata_proxy_single_and_many() {
        let mut bag = MetadataBag::new();
        bag.insert("Name".into(), vec!["csv".into()]);
        bag.insert("Ext".into(), vec!["csv".into(), "tsv".into()]);
        let proxy = MetadataProxy::new("IFormat", bag);

        assert_eq!(proxy.get("Name"), Some(&MetadataValue::from("csv")));
        assert_eq!(proxy.get("Ext"), None);
        assert_eq!(proxy.get_all("Ext").len(), 2);
        assert!(proxy.get_all("Missing").is_empty());
    }
}
