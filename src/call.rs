use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::composition::InstanceId;
use crate::types::MethodSignature;
use crate::value::{NativeClosure, ResultId, Value};

/// Execution collaborator: receives every side-effecting call the composer decides on.
pub trait CallContext {
    /// Fire-and-forget call of `method` on `target`.
    fn call(&mut self, target: &Value, method: &MethodSignature, args: Vec<Value>);

    fn call_with_return(&mut self, target: &Value, method: &MethodSignature, args: Vec<Value>)
        -> Value;

    /// Call a native closure that has no declared method.
    fn call_direct(&mut self, closure: &NativeClosure, args: Vec<Value>);

    fn call_direct_with_return(&mut self, closure: &NativeClosure, args: Vec<Value>) -> Value;

    /// Run the constructor of `instance`.
    fn construct(&mut self, instance: InstanceId, constructor: &MethodSignature, args: Vec<Value>);

    fn is_null(&self, value: &Value) -> bool;
}

/// Shared handle the composer and deferred thunks call through.
pub type SharedContext = Rc<RefCell<dyn CallContext>>;

/// One recorded call intent.
#[derive(Debug, Clone, PartialEq)]
pub enum CallIntent {
    Construct {
        instance: InstanceId,
        constructor: MethodSignature,
        args: Vec<Value>,
    },
    Call {
        target: Value,
        method: MethodSignature,
        args: Vec<Value>,
    },
    CallWithReturn {
        target: Value,
        method: MethodSignature,
        args: Vec<Value>,
        result: ResultId,
    },
    Direct {
        closure: String,
        args: Vec<Value>,
        result: Option<Value>,
    },
}

impl CallIntent {
    /// Name of the invoked method, or the closure label.
    pub fn method_name(&self) -> &str {
        match self {
            CallIntent::Construct { constructor, .. } => &constructor.name,
            CallIntent::Call { method, .. } | CallIntent::CallWithReturn { method, .. } => {
                &method.name
            }
            CallIntent::Direct { closure, .. } => closure,
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            CallIntent::Construct { args, .. }
            | CallIntent::Call { args, .. }
            | CallIntent::CallWithReturn { args, .. }
            | CallIntent::Direct { args, .. } => args,
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

impl fmt::Display for CallIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallIntent::Construct {
                instance,
                constructor,
                args,
            } => {
                write!(f, "{instance} = {}::{}(", constructor.owner, constructor.name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            CallIntent::Call {
                target,
                method,
                args,
            } => {
                write!(f, "{target}.{}(", method.name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            CallIntent::CallWithReturn {
                target,
                method,
                args,
                result,
            } => {
                write!(f, "{result} = {target}.{}(", method.name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            CallIntent::Direct {
                closure,
                args,
                result,
            } => {
                if let Some(result) = result {
                    write!(f, "{result} = ")?;
                }
                write!(f, "<{closure}>(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
        }
    }
}

/// Append-only log of call intents.
///
/// Clones share the same log, so intents recorded after a run (for instance by
/// forcing a lazy value) show up in every handle.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<CallIntent>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the intents recorded so far.
    pub fn intents(&self) -> Vec<CallIntent> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn push(&self, intent: CallIntent) {
        self.0.borrow_mut().push(intent);
    }
}

/// [`CallContext`] that performs nothing and records every call intent.
///
/// Returned values are symbolic [`Value::Returned`] handles unless a stub was
/// registered for the method.
#[derive(Debug, Default)]
pub struct CallRecorder {
    log: CallLog,
    next_result: usize,
    stubs: Vec<(MethodSignature, Value)>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `call_with_return` of `method` return `value`.
    pub fn stub_return(mut self, method: MethodSignature, value: Value) -> Self {
        self.stubs.push((method, value));
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn next_result(&mut self) -> ResultId {
        let id = ResultId(self.next_result);
        self.next_result += 1;
        id
    }
}

impl CallContext for CallRecorder {
    fn call(&mut self, target: &Value, method: &MethodSignature, args: Vec<Value>) {
        self.log.push(CallIntent::Call {
            target: target.clone(),
            method: method.clone(),
            args,
        });
    }

    fn call_with_return(
        &mut self,
        target: &Value,
        method: &MethodSignature,
        args: Vec<Value>,
    ) -> Value {
        let result = self.next_result();
        self.log.push(CallIntent::CallWithReturn {
            target: target.clone(),
            method: method.clone(),
            args,
            result,
        });
        self.stubs
            .iter()
            .find(|(stubbed, _)| stubbed == method)
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Returned(result))
    }

    fn call_direct(&mut self, closure: &NativeClosure, args: Vec<Value>) {
        closure.invoke(&args);
        self.log.push(CallIntent::Direct {
            closure: closure.label().to_string(),
            args,
            result: None,
        });
    }

    fn call_direct_with_return(&mut self, closure: &NativeClosure, args: Vec<Value>) -> Value {
        let value = closure.invoke(&args);
        self.log.push(CallIntent::Direct {
            closure: closure.label().to_string(),
            args,
            result: Some(value.clone()),
        });
        value
    }

    fn construct(&mut self, instance: InstanceId, constructor: &MethodSignature, args: Vec<Value>) {
        self.log.push(CallIntent::Construct {
            instance,
            constructor: constructor.clone(),
            args,
        });
    }

    fn is_null(&self, value: &Value) -> bool {
        value.is_null()
    }
}
