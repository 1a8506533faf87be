//! `hello` - greets the caller.

use super::{Command, CommandError, CommandModule, Invocation, ModuleSettings};
use crate::error::ModuleError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use tuffy_proto::Reply;

pub struct HelloModule {
    hello: Arc<HelloCommand>,
}

impl HelloModule {
    pub fn build(settings: &ModuleSettings) -> Result<Box<dyn CommandModule>, ModuleError> {
        let greeting = settings.str("greeting")?.unwrap_or("Hello").to_string();
        if greeting.trim().is_empty() {
            return Err(ModuleError::new("greeting must not be blank"));
        }
        Ok(Box::new(Self {
            hello: Arc::new(HelloCommand { greeting }),
        }))
    }
}

#[async_trait]
impl CommandModule for HelloModule {
    fn name(&self) -> &str {
        "hello"
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![self.hello.clone()]
    }

    async fn setup(&self) -> Result<(), ModuleError> {
        info!(greeting = %self.hello.greeting, "Hello module is ready");
        Ok(())
    }
}

struct HelloCommand {
    greeting: String,
}

#[async_trait]
impl Command for HelloCommand {
    fn name(&self) -> &str {
        "hello"
    }

    fn description(&self) -> &str {
        "Says hello to you!"
    }

    async fn invoke(&self, ctx: &Invocation, _args: &str) -> Result<Reply, CommandError> {
        Ok(Reply::Text(format!("{}, @{} 👋", self.greeting, ctx.caller.name)))
    }
}
