//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Per-connection session state machine
//!
//! A [`Session`] drives one connection through
//! `Connecting -> Authenticating -> Active -> Closing -> Closed`:
//! - stream the banner and system name
//! - ask for an account number and password and check them once
//! - take a line number and join the room on channel 1
//! - route each line to the command processor or the broadcaster
//! - on any exit, deregister, close the socket, and announce the departure

use crate::{
    AuthGateway, Broadcaster, Channel, ChatConnection, ChatRegistry, CommandContext, CommandLine,
    CommandOutcome, CommandProcessor, ConnectionId, LineNumber, MessageFormatter, RegisterError,
    ServerConfig, ServerMetrics, SessionState, UserDirectory, UserRecord,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace, warn};
use varidial_linecodec::{InputEvent, OutputFrame};

/// Prompt for the account number
pub const NUMBER_PROMPT: &str = "Enter your number: ";
/// Prompt for the password
pub const PASSWORD_PROMPT: &str = "Enter your password: ";
/// Shown to a user whose name already has a session
pub const DUPLICATE_LOGIN_NOTICE: &str = "That account is already online.";
/// Shown to every session when the server stops
pub const SHUTDOWN_NOTICE: &str = "System going down.";

/// Control messages for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Close the session now
    Close,
    /// Tell the user the server is stopping, then close
    Shutdown,
}

/// Everything a session shares with the rest of the server
#[derive(Debug)]
pub struct ChatContext {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Online sessions and line numbers
    pub registry: Arc<ChatRegistry>,
    /// Credential check
    pub auth: AuthGateway,
    /// Fan-out to other sessions
    pub broadcaster: Broadcaster,
    /// Slash-command execution
    pub commands: CommandProcessor,
    /// Server metrics
    pub metrics: Arc<ServerMetrics>,
}

impl ChatContext {
    /// Wire up the shared chat state
    pub fn new(
        config: Arc<ServerConfig>,
        directory: Arc<dyn UserDirectory>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        let registry = Arc::new(ChatRegistry::new());
        let broadcaster =
            Broadcaster::new(registry.clone(), metrics.clone(), config.delivery_timeout);
        let commands = CommandProcessor::new(
            registry.clone(),
            broadcaster.clone(),
            config.clone(),
            metrics.clone(),
        );
        Self {
            config,
            registry,
            auth: AuthGateway::new(directory),
            broadcaster,
            commands,
            metrics,
        }
    }
}

/// Identity held while the session is registered
#[derive(Debug, Clone)]
struct Membership {
    username: String,
    line: LineNumber,
    level: u8,
}

/// What a read produced
enum Input {
    Line(String),
    Closed,
}

/// State machine for one connection
pub struct Session {
    id: ConnectionId,
    connection: ChatConnection,
    context: Arc<ChatContext>,
    control_rx: mpsc::Receiver<ControlMessage>,
    control_open: bool,
    state: Arc<AtomicU8>,
    membership: Option<Membership>,
    close_limit: Duration,
}

impl Session {
    /// Create a session over a wrapped connection
    ///
    /// `control_rx` must be the receiving end of the control channel the
    /// connection's writer task was given.
    pub fn new(
        connection: ChatConnection,
        context: Arc<ChatContext>,
        control_rx: mpsc::Receiver<ControlMessage>,
        state: Arc<AtomicU8>,
    ) -> Self {
        Self {
            id: connection.id(),
            connection,
            control_rx,
            control_open: true,
            close_limit: context.config.write_timeout,
            context,
            state,
            membership: None,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Drive the session until it is closed
    #[instrument(skip(self), fields(connection_id = %self.id))]
    pub async fn run(mut self) {
        self.set_state(SessionState::Connecting);
        self.send_banner().await;

        self.set_state(SessionState::Authenticating);
        if let Some(user) = self.authenticate().await {
            if self.admit(user).await {
                self.set_state(SessionState::Active);
                self.chat_loop().await;
            }
        }

        self.close().await;
    }

    async fn send(&self, frames: Vec<OutputFrame>) {
        if let Err(e) = self.connection.writer().send(frames).await {
            trace!(error = %e, "Own output dropped");
        }
    }

    async fn send_banner(&self) {
        let writer = self.connection.writer();
        if let Some(path) = &self.context.config.banner_path {
            match tokio::fs::File::open(path).await {
                Ok(file) => {
                    let mut lines = BufReader::new(file).split(b'\n');
                    loop {
                        match lines.next_segment().await {
                            Ok(Some(mut line)) => {
                                if line.last() == Some(&b'\r') {
                                    line.pop();
                                }
                                if writer.send(vec![OutputFrame::verbatim(line)]).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "Banner read failed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Banner file unavailable");
                    self.send(vec![OutputFrame::line(format!(
                        "Error opening file: {}",
                        path.display()
                    ))])
                    .await;
                }
            }
        }
        self.send(vec![OutputFrame::line(self.context.config.system_name.clone())])
            .await;
    }

    async fn authenticate(&mut self) -> Option<UserRecord> {
        let limit = self.context.config.login_timeout;

        self.send(vec![OutputFrame::prompt(NUMBER_PROMPT)]).await;
        let Input::Line(number) = self.read_line(limit).await else {
            return None;
        };
        let Ok(account) = number.trim().parse::<u32>() else {
            debug!("Non-numeric account number, closing");
            self.context.metrics.login_failed();
            return None;
        };

        self.send(vec![OutputFrame::blank(), OutputFrame::prompt(PASSWORD_PROMPT)])
            .await;
        let Input::Line(password) = self.read_line(limit).await else {
            return None;
        };

        match self.context.auth.authenticate(account, &password).await {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(account, error = %e, "Login failed");
                self.context.metrics.login_failed();
                None
            }
        }
    }

    async fn admit(&mut self, user: UserRecord) -> bool {
        let writer = self.connection.writer().clone();
        match self.context.registry.register(&user, self.id, writer) {
            Ok(line) => {
                info!(username = %user.username, line = %line, "User logged in");
                self.context.metrics.login();
                self.membership = Some(Membership {
                    username: user.username.clone(),
                    line,
                    level: user.level,
                });
                self.send(vec![OutputFrame::blank(), OutputFrame::line("/? for help")])
                    .await;
                self.context
                    .broadcaster
                    .broadcast(
                        Channel::DEFAULT,
                        MessageFormatter::join_announcement(line, &user.username),
                    )
                    .await;
                true
            }
            Err(RegisterError::DuplicateUser(username)) => {
                warn!(username = %username, "Duplicate login rejected");
                self.context.metrics.login_rejected();
                self.send(vec![OutputFrame::line(DUPLICATE_LOGIN_NOTICE)]).await;
                false
            }
            Err(RegisterError::Exhausted(e)) => {
                warn!(username = %user.username, error = %e, "Login rejected");
                self.context.metrics.login_rejected();
                false
            }
        }
    }

    async fn chat_loop(&mut self) {
        let Some(member) = self.membership.clone() else {
            return;
        };
        let writer = self.connection.writer().clone();
        let limit = self.context.config.idle_timeout;

        loop {
            let Input::Line(text) = self.read_line(limit).await else {
                return;
            };
            if text.is_empty() {
                continue;
            }

            if let Some(command) = CommandLine::parse(&text) {
                let ctx = CommandContext {
                    username: &member.username,
                    line: member.line,
                    writer: &writer,
                };
                if self.context.commands.execute(ctx, command).await == CommandOutcome::Quit {
                    debug!(username = %member.username, "Quit requested");
                    return;
                }
                continue;
            }

            self.context.metrics.message_received();
            let Some(channel) = self.context.registry.channel_of(&member.username) else {
                return;
            };
            match MessageFormatter::chat_line(
                member.line,
                channel,
                &member.username,
                member.level,
                &text,
            ) {
                Ok(rendered) => {
                    self.context
                        .broadcaster
                        .broadcast(channel, vec![OutputFrame::line(rendered)])
                        .await;
                }
                Err(e) => warn!(username = %member.username, error = %e, "Chat line not sent"),
            }
        }
    }

    /// Wait for the next complete line
    ///
    /// Answers option negotiation in passing. Returns [`Input::Closed`] on
    /// end of stream, read error, interrupt, timeout or a control message.
    async fn read_line(&mut self, limit: Option<Duration>) -> Input {
        loop {
            select! {
                read = read_event(&mut self.connection, limit) => {
                    match read {
                        Some(Ok(Some(InputEvent::Line(line)))) => return Input::Line(line),
                        Some(Ok(Some(InputEvent::Negotiate(verb, option)))) => {
                            if let Some(reply) = verb.refusal() {
                                trace!(verb = %verb, option, "Refusing option");
                                self.send(vec![OutputFrame::Negotiate(reply, option)]).await;
                            }
                        }
                        Some(Ok(Some(InputEvent::Interrupt))) => {
                            debug!("Interrupt received");
                            return Input::Closed;
                        }
                        Some(Ok(None)) => return Input::Closed,
                        Some(Err(e)) => {
                            debug!(error = %e, "Read failed");
                            return Input::Closed;
                        }
                        None => {
                            debug!(state = %self.state(), "Read timed out");
                            return Input::Closed;
                        }
                    }
                }

                msg = self.control_rx.recv(), if self.control_open => {
                    match msg {
                        Some(ControlMessage::Close) => return Input::Closed,
                        Some(ControlMessage::Shutdown) => {
                            let notice = vec![OutputFrame::blank(), OutputFrame::line(SHUTDOWN_NOTICE)];
                            let limit = self.context.config.delivery_timeout;
                            if let Err(e) = self.connection.writer().deliver(notice, limit).await {
                                debug!(error = %e, "Shutdown notice dropped");
                            }
                            self.close_limit = self.close_limit.min(limit);
                            return Input::Closed;
                        }
                        None => self.control_open = false,
                    }
                }
            }
        }
    }

    /// Tear the session down exactly once
    async fn close(&mut self) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.set_state(SessionState::Closing);

        let departed = self
            .membership
            .take()
            .and_then(|member| self.context.registry.deregister(&member.username));
        if let Some(entry) = &departed {
            info!(username = %entry.username, line = %entry.line, "User logged out");
            self.context.metrics.logout();
        }
        self.connection.shutdown(self.close_limit).await;

        if let Some(entry) = departed {
            self.context
                .broadcaster
                .broadcast_all(MessageFormatter::departure_announcement(&entry.username))
                .await;
        }

        while self.control_rx.try_recv().is_ok() {}
        self.set_state(SessionState::Closed);
    }
}

async fn read_event(
    connection: &mut ChatConnection,
    limit: Option<Duration>,
) -> Option<crate::Result<Option<InputEvent>>> {
    match limit {
        Some(limit) => timeout(limit, connection.next_event()).await.ok(),
        None => Some(connection.next_event().await),
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("membership", &self.membership)
            .finish()
    }
}
