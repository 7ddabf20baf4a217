//! Human-readable rendering of runtime values
//!
//! The formatter never fails: every value has a textual form, cycles render
//! as `[Circular]`, and values it cannot inspect fall back to their structured
//! serialization and then to their default string.

use crate::promise::{Observed, PromiseObservations};
use crate::value::Value;
use chrono::SecondsFormat;
use std::cell::RefCell;
use std::rc::Rc;

/// Largest integer a double represents exactly
const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Value formatter bound to a promise observation table
#[derive(Clone, Default)]
pub struct Formatter {
    observations: Rc<RefCell<PromiseObservations>>,
}

impl Formatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Rc<RefCell<PromiseObservations>> {
        Rc::clone(&self.observations)
    }

    /// Format a top-level value; strings are rendered raw
    pub fn format(&self, value: &Value) -> String {
        Walk::new(&self.observations).value(value, false)
    }

    /// Format console arguments, space-separated
    pub fn format_args(&self, args: &[Value]) -> String {
        args.iter()
            .map(|arg| self.format(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Format a value with a throwaway observation table
pub fn format_value(value: &Value) -> String {
    Formatter::new().format(value)
}

/// JavaScript-style number rendering
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let s = format!("{:e}", n);
        return match s.split_once('e') {
            Some((mantissa, exp)) if exp.starts_with('-') => format!("{}e{}", mantissa, exp),
            Some((mantissa, exp)) => format!("{}e+{}", mantissa, exp),
            None => s,
        };
    }
    format!("{}", n)
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

/// Replace integers that would lose precision with `"<digits>n"` strings
fn widen_unsafe_integers(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Json::Number(n) => {
            let unsafe_int = match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i),
                (None, Some(_)) => true,
                _ => false,
            };
            if unsafe_int {
                Json::String(format!("{}n", n))
            } else {
                Json::Number(n)
            }
        }
        Json::Array(items) => Json::Array(items.into_iter().map(widen_unsafe_integers).collect()),
        Json::Object(map) => Json::Object(
            map.into_iter()
                .map(|(k, v)| (k, widen_unsafe_integers(v)))
                .collect(),
        ),
        other => other,
    }
}

/// One formatting pass; `path` holds identities of the ancestors being printed
struct Walk<'a> {
    observations: &'a RefCell<PromiseObservations>,
    path: Vec<usize>,
}

impl<'a> Walk<'a> {
    fn new(observations: &'a RefCell<PromiseObservations>) -> Self {
        Self {
            observations,
            path: Vec::new(),
        }
    }

    fn value(&mut self, value: &Value, nested: bool) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::BigInt(n) => format!("{}n", n),
            Value::String(s) if nested => quote(s),
            Value::String(s) => s.clone(),
            Value::Symbol(Some(desc)) => format!("Symbol({})", desc),
            Value::Symbol(None) => "Symbol()".to_string(),
            Value::Function(f) if f.name.is_empty() => "[Function anonymous]".to_string(),
            Value::Function(f) => format!("[Function {}]", f.name),
            Value::Error(e) => e.stack.clone().unwrap_or_else(|| e.message.clone()),
            Value::Date(Some(at)) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Date(None) => "Invalid Date".to_string(),
            Value::RegExp(re) => format!("/{}/{}", re.source, re.flags),
            Value::TypedArray(arr) => {
                let items: Vec<_> = arr.elements.iter().map(|n| format_number(*n)).collect();
                format!("{}({}) [{}]", arr.kind.name(), items.len(), items.join(", "))
            }
            Value::Host(host) => match host.to_json() {
                Ok(json) => serde_json::to_string(&widen_unsafe_integers(json))
                    .unwrap_or_else(|_| host.default_string()),
                Err(_) => host.default_string(),
            },
            _ => self.composite(value),
        }
    }

    fn composite(&mut self, value: &Value) -> String {
        let identity = value.identity();
        if let Some(id) = identity {
            if self.path.contains(&id) {
                return "[Circular]".to_string();
            }
            self.path.push(id);
        }

        let out = match value {
            Value::Array(items) => match items.try_borrow() {
                Ok(items) => {
                    let parts: Vec<_> = items.iter().map(|v| self.value(v, true)).collect();
                    format!("[{}]", parts.join(", "))
                }
                Err(_) => "[Array]".to_string(),
            },
            Value::Set(items) => match items.try_borrow() {
                Ok(items) => {
                    let parts: Vec<_> = items.iter().map(|v| self.value(v, true)).collect();
                    format!("Set({}) {{{}}}", parts.len(), parts.join(", "))
                }
                Err(_) => "[Set]".to_string(),
            },
            Value::Map(entries) => match entries.try_borrow() {
                Ok(entries) => {
                    let parts: Vec<_> = entries
                        .iter()
                        .map(|(k, v)| format!("{} => {}", self.value(k, true), self.value(v, true)))
                        .collect();
                    format!("Map({}) {{{}}}", parts.len(), parts.join(", "))
                }
                Err(_) => "[Map]".to_string(),
            },
            Value::Object(obj) => match obj.try_borrow() {
                Ok(obj) => {
                    let parts: Vec<_> = obj
                        .entries
                        .iter()
                        .map(|(k, v)| format!("{}: {}", quote(k), self.value(v, true)))
                        .collect();
                    let body = format!("{{{}}}", parts.join(", "));
                    match &obj.class_name {
                        Some(name) => format!("{} {}", name, body),
                        None => body,
                    }
                }
                Err(_) => "[Object]".to_string(),
            },
            Value::Promise(promise) => {
                let observed = match self.observations.try_borrow_mut() {
                    Ok(mut table) => table.register(promise),
                    Err(_) => Observed::Pending,
                };
                match observed {
                    Observed::Pending => "Promise { <pending> }".to_string(),
                    Observed::Fulfilled(v) => format!("Promise {{ {} }}", self.value(&v, true)),
                    Observed::Rejected(r) => {
                        format!("Promise {{ <rejected> {} }}", self.value(&r, true))
                    }
                }
            }
            other => other.type_name().to_string(),
        };

        if identity.is_some() {
            self.path.pop();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::Promise;
    use crate::value::{ErrorValue, HostObject, TypedArrayKind};
    use chrono::{TimeZone, Utc};

    #[derive(Debug)]
    struct Node {
        json: Option<serde_json::Value>,
    }

    impl HostObject for Node {
        fn type_name(&self) -> &str {
            "HTMLDivElement"
        }

        fn to_json(&self) -> Result<serde_json::Value, String> {
            self.json.clone().ok_or_else(|| "not serializable".to_string())
        }
    }

    #[test]
    fn test_primitives() {
        assert_eq!(format_value(&Value::Undefined), "undefined");
        assert_eq!(format_value(&Value::Null), "null");
        assert_eq!(format_value(&Value::from(true)), "true");
        assert_eq!(format_value(&Value::from("hi")), "hi");
        assert_eq!(format_value(&Value::BigInt(123)), "123n");
        assert_eq!(format_value(&Value::symbol("tag")), "Symbol(tag)");
        assert_eq!(format_value(&Value::function("greet")), "[Function greet]");
        assert_eq!(format_value(&Value::function("")), "[Function anonymous]");
    }

    #[test]
    fn test_numbers() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-0.0), "-0");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
    }

    #[test]
    fn test_collections() {
        let arr = Value::array(vec![Value::from(1), Value::from("a")]);
        assert_eq!(format_value(&arr), "[1, \"a\"]");

        let set = Value::set(vec![Value::from(1), Value::from(2)]);
        assert_eq!(format_value(&set), "Set(2) {1, 2}");

        let map = Value::map(vec![(Value::from("k"), Value::from(1))]);
        assert_eq!(format_value(&map), "Map(1) {\"k\" => 1}");

        let bytes = Value::typed_array(TypedArrayKind::Uint8, vec![1.0, 2.0, 3.0]);
        assert_eq!(format_value(&bytes), "Uint8Array(3) [1, 2, 3]");

        let obj = Value::object(vec![("a", Value::from(1))]);
        assert_eq!(format_value(&obj), "{\"a\": 1}");

        let point = Value::instance("Point", vec![("x", Value::from(1))]);
        assert_eq!(format_value(&point), "Point {\"x\": 1}");
    }

    #[test]
    fn test_dates_regexps_and_errors() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(format_value(&Value::date(at)), "2024-01-02T03:04:05.000Z");
        assert_eq!(format_value(&Value::invalid_date()), "Invalid Date");
        assert_eq!(format_value(&Value::regexp("a+b", "gi")), "/a+b/gi");

        assert_eq!(format_value(&Value::error("boom")), "boom");
        let with_stack = ErrorValue::new("TypeError", "bad").with_stack("TypeError: bad\n    at main.js:1");
        assert_eq!(
            format_value(&Value::fault(with_stack)),
            "TypeError: bad\n    at main.js:1"
        );
    }

    #[test]
    fn test_circular_object_terminates() {
        let obj = Value::object(vec![("name", Value::from("a"))]);
        obj.set_property("self", obj.clone());

        assert_eq!(format_value(&obj), "{\"name\": \"a\", \"self\": [Circular]}");
    }

    #[test]
    fn test_shared_reference_is_not_circular() {
        let shared = Value::array(vec![Value::from(1)]);
        let outer = Value::array(vec![shared.clone(), shared]);
        assert_eq!(format_value(&outer), "[[1], [1]]");
    }

    #[test]
    fn test_pending_promise_then_settled() {
        let formatter = Formatter::new();
        let p = Promise::new();
        let value = Value::Promise(p.clone());
        assert_eq!(formatter.format(&value), "Promise { <pending> }");

        formatter
            .observations()
            .borrow_mut()
            .record(p.id(), Ok(Value::from("done")));
        assert_eq!(formatter.format(&value), "Promise { \"done\" }");
    }

    #[test]
    fn test_host_object_fallbacks() {
        let node = Value::host(Node {
            json: Some(serde_json::json!({"big": 9007199254740993u64})),
        });
        assert_eq!(format_value(&node), "{\"big\":\"9007199254740993n\"}");

        let small = Value::host(Node {
            json: Some(serde_json::json!([1, "app"])),
        });
        assert_eq!(format_value(&small), "[1,\"app\"]");

        let opaque = Value::host(Node { json: None });
        assert_eq!(format_value(&opaque), "[object HTMLDivElement]");
    }
}
