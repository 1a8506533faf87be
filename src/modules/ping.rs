//! `ping` - reports how long the host took to answer.

use super::{Command, CommandError, CommandModule, Invocation, ModuleSettings};
use crate::error::ModuleError;
use async_trait::async_trait;
use std::sync::Arc;
use tuffy_proto::Reply;

pub struct PingModule {
    ping: Arc<PingCommand>,
}

impl PingModule {
    pub fn build(_settings: &ModuleSettings) -> Result<Box<dyn CommandModule>, ModuleError> {
        Ok(Box::new(Self {
            ping: Arc::new(PingCommand),
        }))
    }
}

#[async_trait]
impl CommandModule for PingModule {
    fn name(&self) -> &str {
        "ping"
    }

    fn commands(&self) -> Vec<Arc<dyn Command>> {
        vec![self.ping.clone()]
    }
}

struct PingCommand;

#[async_trait]
impl Command for PingCommand {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check the bot's response time"
    }

    async fn invoke(&self, ctx: &Invocation, _args: &str) -> Result<Reply, CommandError> {
        let latency = ctx.received_at.elapsed().as_millis();
        Ok(Reply::Text(format!("Pong! ^~^ Response time: {latency}ms")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Caller;

    #[tokio::test]
    async fn ping_reports_latency() {
        let module = PingModule::build(&ModuleSettings::default()).unwrap();
        let commands = module.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name(), "ping");

        let reply = commands[0]
            .invoke(&Invocation::new(Caller::guest(1)), "")
            .await
            .unwrap();
        let Reply::Text(text) = reply else {
            panic!("expected a text reply");
        };
        assert!(text.starts_with("Pong! ^~^ Response time: "));
        assert!(text.ends_with("ms"));
    }
}
