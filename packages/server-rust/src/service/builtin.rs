//! Built-in `Test` interface, registered by the server binary so a fresh
//! deployment can be exercised end to end.

use std::time::Duration;

use appbus_core::{ParamType, Signature};
use serde_json::{json, Value};

use super::registry::OperationRegistry;

pub const TEST_INTERFACE: &str = "Test";

/// Upper bound for `Test.sleep`, so a caller cannot park a dispatch slot
/// indefinitely.
const MAX_SLEEP_MILLIS: u64 = 60_000;

/// Registers the `Test` operations:
///
/// - `helloWorld(name: string) -> "Hello {name}"`
/// - `add(a: integer, b: integer) -> a + b`
/// - `echo(value: any) -> value`
/// - `sleep(millis: integer) -> null`, after waiting `millis`
/// - `fail(message: string)`, always fails with `message`
pub fn register_builtins(registry: &OperationRegistry) {
    registry.register_fn(
        TEST_INTERFACE,
        "helloWorld",
        Signature::empty().param("name", ParamType::String),
        |args| {
            let name = args[0].as_str().unwrap_or_default();
            Ok(Value::String(format!("Hello {name}")))
        },
    );

    registry.register_fn(
        TEST_INTERFACE,
        "add",
        Signature::empty()
            .param("a", ParamType::Integer)
            .param("b", ParamType::Integer),
        |args| {
            let (a, b) = (args[0].as_i64(), args[1].as_i64());
            match (a, b) {
                (Some(a), Some(b)) => a
                    .checked_add(b)
                    .map(Value::from)
                    .ok_or_else(|| format!("{a} + {b} overflows")),
                _ => Err("operands must be signed 64-bit integers".to_string()),
            }
        },
    );

    registry.register_fn(
        TEST_INTERFACE,
        "echo",
        Signature::empty().param("value", ParamType::Any),
        |mut args| Ok(args.swap_remove(0)),
    );

    registry.register_async(
        TEST_INTERFACE,
        "sleep",
        Signature::empty().param("millis", ParamType::Integer),
        |args| async move {
            let millis = args[0]
                .as_u64()
                .ok_or_else(|| "millis must be non-negative".to_string())?;
            if millis > MAX_SLEEP_MILLIS {
                return Err(format!("millis must be at most {MAX_SLEEP_MILLIS}"));
            }
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(json!(null))
        },
    );

    registry.register_fn(
        TEST_INTERFACE,
        "fail",
        Signature::empty().param("message", ParamType::String),
        |args| Err(args[0].as_str().unwrap_or_default().to_string()),
    );
}

#[cfg(test)]
mod tests {
    use appbus_core::{
        CapabilityRegistry, InstanceRef, InvocationContext, InvocationTarget, TicketId,
    };

    use super::*;

    async fn call(operation: &str, args: Vec<Value>) -> Result<Value, String> {
        let registry = OperationRegistry::new();
        register_builtins(&registry);
        let op = registry.resolve(TEST_INTERFACE, operation).unwrap();
        let args = op.signature().bind(args).map_err(|e| e.to_string())?;
        let ctx = InvocationContext {
            ticket_id: TicketId(1),
            interface: TEST_INTERFACE.to_string(),
            operation: operation.to_string(),
            target: InvocationTarget::NodeInstance {
                node_instance_id: InstanceRef::Number(1),
            },
        };
        op.invoke(&ctx, args).await
    }

    #[test]
    fn registers_all_test_operations() {
        let registry = OperationRegistry::new();
        register_builtins(&registry);
        assert_eq!(
            registry.names(),
            vec!["Test.helloWorld", "Test.add", "Test.echo", "Test.sleep", "Test.fail"]
        );
    }

    #[tokio::test]
    async fn hello_world_greets() {
        assert_eq!(call("helloWorld", vec![json!("Michael")]).await, Ok(json!("Hello Michael")));
    }

    #[tokio::test]
    async fn add_sums_and_detects_overflow() {
        assert_eq!(call("add", vec![json!(2), json!("40")]).await, Ok(json!(42)));
        assert!(call("add", vec![json!(i64::MAX), json!(1)]).await.is_err());
    }

    #[tokio::test]
    async fn echo_returns_argument() {
        let value = json!({"nested": [1, "two", null]});
        assert_eq!(call("echo", vec![value.clone()]).await, Ok(value));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_waits_then_returns_null() {
        assert_eq!(call("sleep", vec![json!(1_000)]).await, Ok(Value::Null));
        assert!(call("sleep", vec![json!(-1)]).await.is_err());
        assert!(call("sleep", vec![json!(MAX_SLEEP_MILLIS + 1)]).await.is_err());
    }

    #[tokio::test]
    async fn fail_reports_message() {
        assert_eq!(call("fail", vec![json!("nope")]).await, Err("nope".to_string()));
    }
}
