//! Scripted in-process agent client for unit tests
//!
//! [`ScriptedClient`] replays a fixed list of messages instead of driving a
//! real agent process. [`ScriptedFactory`] hands out one scripted client per
//! turn and records the options and prompts it was given, so handler tests
//! can assert on what the gateway asked the agent to do.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use crate::agent::client::{AgentClient, AgentClientFactory, AgentOptions, MessageStream};
use crate::agent::types::AgentMessage;
use crate::error::{AgentGateError, Result};

/// Agent client that replays a script
pub struct ScriptedClient {
    script: Vec<Result<AgentMessage>>,
    fail_connect: Option<String>,
    stall: bool,
    connected: bool,
    prompts: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
}

impl ScriptedClient {
    /// Create a client that yields `script` once connected and queried
    pub fn new(script: Vec<Result<AgentMessage>>) -> Self {
        Self {
            script,
            fail_connect: None,
            stall: false,
            connected: false,
            prompts: Arc::new(Mutex::new(Vec::new())),
            live: Arc::new(AtomicUsize::new(1)),
        }
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentClient for ScriptedClient {
    async fn connect(&mut self) -> Result<()> {
        if let Some(message) = &self.fail_connect {
            return Err(AgentGateError::Agent(message.clone()).into());
        }
        self.connected = true;
        Ok(())
    }

    async fn query(&mut self, prompt: &str) -> Result<()> {
        if !self.connected {
            return Err(AgentGateError::Agent("client not connected".to_string()).into());
        }
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(())
    }

    fn receive_messages(&mut self) -> MessageStream<'_> {
        let replay = futures::stream::iter(std::mem::take(&mut self.script));
        if self.stall {
            Box::pin(replay.chain(futures::stream::pending()))
        } else {
            Box::pin(replay)
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}

impl Drop for ScriptedClient {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Factory producing [`ScriptedClient`]s from a cloneable script
///
/// Script entries are `Err(message)` for a mid-stream failure.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    script: Vec<std::result::Result<AgentMessage, String>>,
    fail_connect: Option<String>,
    stall: bool,
    options: Arc<Mutex<Vec<AgentOptions>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    /// Factory whose clients replay `script`
    pub fn new(script: Vec<std::result::Result<AgentMessage, String>>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }

    /// Factory whose clients fail in `connect`
    pub fn failing_connect(message: &str) -> Self {
        Self {
            fail_connect: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Factory whose clients replay `script` and then never yield again
    pub fn stalling(script: Vec<std::result::Result<AgentMessage, String>>) -> Self {
        Self {
            script,
            stall: true,
            ..Default::default()
        }
    }

    /// Clients created by this factory that have not been dropped yet
    pub fn live_clients(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Options passed to every `create` call, in order
    pub fn options(&self) -> Vec<AgentOptions> {
        self.options.lock().unwrap().clone()
    }

    /// Prompts delivered to any client from this factory
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl AgentClientFactory for ScriptedFactory {
    fn create(&self, options: AgentOptions) -> Box<dyn AgentClient> {
        self.options.lock().unwrap().push(options);
        let script: Vec<Result<AgentMessage>> = self
            .script
            .iter()
            .cloned()
            .map(|item| item.map_err(|message| anyhow::Error::from(AgentGateError::Agent(message))))
            .collect();
        self.live.fetch_add(1, Ordering::SeqCst);
        Box::new(ScriptedClient {
            script,
            fail_connect: self.fail_connect.clone(),
            stall: self.stall,
            connected: false,
            prompts: Arc::clone(&self.prompts),
            live: Arc::clone(&self.live),
        })
    }
}
