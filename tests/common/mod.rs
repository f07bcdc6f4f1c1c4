//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use ferrous_wire::{
    Arguments, DiError, DiResult, Injected, Instance, ParamDescriptor, Service, TypeDescriptor, Value,
};
use parking_lot::Mutex;

/// Recording service: remembers its constructor arguments, method calls and
/// properties, and reports construction, calls and cleanup to a [`Harness`].
pub struct Stub {
    pub class: String,
    pub serial: usize,
    pub args: Vec<Injected>,
    props: Mutex<HashMap<String, Injected>>,
    harness: Harness,
}

impl Stub {
    pub fn arg(&self, index: usize) -> &Injected {
        &self.args[index]
    }

    pub fn arg_value(&self, index: usize) -> Value {
        self.args[index].as_value().cloned().unwrap_or_default()
    }

    pub fn dependency(&self, index: usize) -> &Stub {
        self.args[index]
            .downcast::<Stub>()
            .expect("argument is not a stub")
    }

    pub fn property(&self, name: &str) -> Option<Injected> {
        self.props.lock().get(name).cloned()
    }
}

impl Service for Stub {
    fn type_name(&self) -> &str {
        &self.class
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn invoke(&self, method: &str, args: Vec<Injected>) -> DiResult<Injected> {
        self.harness.calls.lock().push(format!("{}.{}", self.class, method));
        match method {
            "fail" => Err(DiError::construction(self.class.clone(), "fail was called")),
            "echo" => Ok(args.into_iter().next().unwrap_or(Injected::Value(Value::Null))),
            "make" => {
                let class = args.string(0)?;
                Ok(Injected::Service(self.harness.instance(&class, Vec::new())))
            }
            _ => Ok(Injected::Value(Value::from(format!("{}:{}", self.class, method)))),
        }
    }

    fn get_property(&self, name: &str) -> DiResult<Injected> {
        self.props.lock().get(name).cloned().ok_or_else(|| DiError::PropertyNotFound {
            target: self.class.clone(),
            property: name.to_string(),
        })
    }

    fn set_property(&self, name: &str, value: Injected) -> DiResult<()> {
        self.props.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn cleanup(&self) {
        self.harness.cleanups.lock().push(self.class.clone());
    }
}

/// Counters shared by every stub a test creates.
#[derive(Clone, Default)]
pub struct Harness {
    builds: Arc<Mutex<HashMap<String, usize>>>,
    calls: Arc<Mutex<Vec<String>>>,
    cleanups: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stub directly, counting it as a construction of `class`.
    pub fn instance(&self, class: &str, args: Vec<Injected>) -> Instance {
        let serial = {
            let mut builds = self.builds.lock();
            let count = builds.entry(class.to_string()).or_default();
            *count += 1;
            *count
        };
        Arc::new(Stub {
            class: class.to_string(),
            serial,
            args,
            props: Mutex::new(HashMap::new()),
            harness: self.clone(),
        })
    }

    /// A constructible descriptor for `class`.
    pub fn stub(&self, class: &str) -> TypeDescriptor {
        let harness = self.clone();
        let name = class.to_string();
        TypeDescriptor::new(class, move |args| Ok(harness.instance(&name, args)))
    }

    /// A descriptor whose constructor fails the first `failures` times.
    pub fn flaky(&self, class: &str, failures: usize) -> TypeDescriptor {
        let harness = self.clone();
        let name = class.to_string();
        let remaining = Arc::new(Mutex::new(failures));
        TypeDescriptor::new(class, move |args| {
            let mut remaining = remaining.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DiError::construction(name.clone(), "not yet"));
            }
            Ok(harness.instance(&name, args))
        })
    }

    pub fn builds(&self, class: &str) -> usize {
        self.builds.lock().get(class).copied().unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn cleanups(&self) -> Vec<String> {
        self.cleanups.lock().clone()
    }
}

pub fn stub(instance: &Instance) -> &Stub {
    instance.downcast_ref::<Stub>().expect("not a stub")
}

/// The adapter from the classic `%db.path%` scenario.
pub struct MySqlAdapter {
    pub path: String,
}

impl Service for MySqlAdapter {
    fn type_name(&self) -> &str {
        "MySQLAdapter"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn mysql_adapter() -> TypeDescriptor {
    TypeDescriptor::new("MySQLAdapter", |args| Ok(Arc::new(MySqlAdapter { path: args.string(0)? })))
        .implements("DatabaseAdapter")
        .param(ParamDescriptor::string("path"))
}
