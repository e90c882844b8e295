//! Name-based dispatch of renderer calls onto an accessor.

use color_eyre::Result;
use serde_json::Value;
use std::collections::HashMap;

pub type Getter<T> = fn(&T) -> Result<Value>;
pub type Setter<T> = fn(&T, &Value) -> Result<()>;
pub type Method<T> = fn(&T, &[Value]) -> Result<Option<Value>>;

pub enum Member<T> {
    Property {
        get: Getter<T>,
        set: Option<Setter<T>>,
    },
    Method(Method<T>),
}

/// The members an accessor exposes to themes, by name.
pub struct Registry<T> {
    members: HashMap<&'static str, Member<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            members: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn property(mut self, name: &'static str, get: Getter<T>) -> Self {
        self.members
            .insert(name, Member::Property { get, set: None });
        self
    }

    #[must_use]
    pub fn property_rw(mut self, name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        self.members.insert(
            name,
            Member::Property {
                get,
                set: Some(set),
            },
        );
        self
    }

    #[must_use]
    pub fn method(mut self, name: &'static str, method: Method<T>) -> Self {
        self.members.insert(name, Member::Method(method));
        self
    }

    /// Dispatches a call of the form `[name, ...args]` onto `target`.
    ///
    /// Returns `Ok(None)` when the value is absent:
    /// unknown names, setter calls and falsy property values.
    /// Method results are returned as-is.
    pub fn dispatch(&self, target: &T, args: &[Value]) -> Result<Option<Value>> {
        let Some((Value::String(name), rest)) = args.split_first() else {
            return Ok(None);
        };

        let Some(member) = self.members.get(name.as_str()) else {
            tracing::debug!("Unknown member '{name}'");
            return Ok(None);
        };

        match member {
            Member::Method(method) => method(target, rest),
            Member::Property {
                set: Some(set),
                ..
            } if !rest.is_empty() => {
                set(target, &rest[0])?;
                Ok(None)
            }
            Member::Property { get, .. } => {
                let value = get(target)?;
                Ok((!is_falsy(&value)).then_some(value))
            }
        }
    }
}

/// Whether a value would be treated as false by the renderer.
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n == 0.0 || n.is_nan()),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Reads argument `index` as a string, if it is one.
pub fn arg_str(args: &[Value], index: usize) -> Option<&str> {
    args.get(index).and_then(Value::as_str)
}

/// Reads argument `index` as a whole number, if it is one.
pub fn arg_i32(args: &[Value], index: usize) -> Option<i32> {
    args.get(index)
        .and_then(Value::as_f64)
        .map(|value| value.round() as i32)
}
