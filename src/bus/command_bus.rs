//! Command bus (§4.I): a dotted name resolves to an async handler returning
//! a typed result. Submission never requires the caller's own thread to be
//! running a Tokio reactor — a stored `Handle` schedules the handler call
//! onto the owning runtime, generalizing the teacher's pattern of parking
//! commands in a channel the engine drains on its own runtime.

use crate::error::AppError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub type CommandHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, AppError>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub ok: bool,
    pub value: Option<Value>,
    pub error: Option<String>,
}

impl CommandResult {
    fn ok(value: Value) -> CommandResult {
        CommandResult {
            ok: true,
            value: Some(value),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> CommandResult {
        CommandResult {
            ok: false,
            value: None,
            error: Some(message.into()),
        }
    }
}

pub struct CommandBus {
    handlers: RwLock<HashMap<String, CommandHandler>>,
    handle: tokio::runtime::Handle,
}

impl CommandBus {
    pub fn new(handle: tokio::runtime::Handle) -> CommandBus {
        CommandBus {
            handlers: RwLock::new(HashMap::new()),
            handle,
        }
    }

    pub fn register(&self, name: impl Into<String>, handler: CommandHandler) {
        self.handlers.write().expect("command bus handlers poisoned").insert(name.into(), handler);
    }

    /// Resolves immediately with an error for an unregistered name, per
    /// §4.I. `timeout` bounds the handler's own execution, not lookup.
    pub async fn submit(&self, name: &str, payload: Value, timeout: Option<Duration>) -> CommandResult {
        let handler = self.handlers.read().expect("command bus handlers poisoned").get(name).cloned();
        let Some(handler) = handler else {
            return CommandResult::err(format!("unknown command: {name}"));
        };

        let task = self.handle.spawn(handler(payload));
        let outcome = match timeout {
            Some(duration) => match tokio::time::timeout(duration, task).await {
                Ok(joined) => joined,
                Err(_) => return CommandResult::err(format!("command {name} timed out")),
            },
            None => task.await,
        };

        match outcome {
            Ok(Ok(value)) => CommandResult::ok(value),
            Ok(Err(error)) => CommandResult::err(error.to_string()),
            Err(_join_error) => CommandResult::err(format!("command {name} handler panicked")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unknown_command_errors_immediately() {
        let bus = CommandBus::new(tokio::runtime::Handle::current());
        let result = bus.submit("does.not.exist", Value::Null, None).await;
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("unknown command"));
    }

    #[tokio::test]
    async fn registered_handler_returns_its_value() {
        let bus = CommandBus::new(tokio::runtime::Handle::current());
        bus.register(
            "echo",
            Arc::new(|payload: Value| Box::pin(async move { Ok(payload) }) as BoxFuture<'static, Result<Value, AppError>>),
        );

        let result = bus.submit("echo", json!({"n": 1}), None).await;
        assert!(result.ok);
        assert_eq!(result.value.unwrap(), json!({"n": 1}));
    }

    #[tokio::test]
    async fn slow_handler_times_out() {
        let bus = CommandBus::new(tokio::runtime::Handle::current());
        bus.register(
            "slow",
            Arc::new(|_payload: Value| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(Value::Null)
                }) as BoxFuture<'static, Result<Value, AppError>>
            }),
        );

        let result = bus.submit("slow", Value::Null, Some(Duration::from_millis(20))).await;
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("timed out"));
    }
}
