//! Line-based interactive loop.

use std::io::{self, BufRead, Write};

use agentchat_core::backends::LocalRestTransport;
use agentchat_core::diagnostics::{drain, Subscription};
use agentchat_core::{ChatError, Session, SessionId, SessionOrchestrator};

use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sessions,
    Refresh,
    /// Optional JSON seed for the new session's state.
    New(Option<String>),
    Select(String),
    Delete(String),
    History,
    User(String),
    Apps,
    Help,
    Quit,
    Send(String),
    /// A known command used wrongly; carries the usage line.
    Usage(&'static str),
    Unknown(String),
    Empty,
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match (name, arg.is_empty()) {
        ("sessions", _) => Command::Sessions,
        ("refresh", _) => Command::Refresh,
        ("new", true) => Command::New(None),
        ("new", false) => Command::New(Some(arg.to_string())),
        ("select", false) => Command::Select(arg.to_string()),
        ("select", true) => Command::Usage("/select <n|id>"),
        ("delete", false) => Command::Delete(arg.to_string()),
        ("delete", true) => Command::Usage("/delete <n|id>"),
        ("history", _) => Command::History,
        ("user", false) => Command::User(arg.to_string()),
        ("user", true) => Command::Usage("/user <name>"),
        ("apps", _) => Command::Apps,
        ("help", _) => Command::Help,
        ("quit", _) | ("exit", _) => Command::Quit,
        _ => Command::Unknown(name.to_string()),
    }
}

/// A 1-based list number picks from `sessions`; anything else is an id.
pub fn resolve(target: &str, sessions: &[Session]) -> SessionId {
    match target.parse::<usize>() {
        Ok(n) if n >= 1 && n <= sessions.len() => sessions[n - 1].id.clone(),
        _ => SessionId::from(target),
    }
}

pub struct Repl<W: Write> {
    orchestrator: SessionOrchestrator,
    diagnostics: Subscription,
    /// Present for the local backend only; serves `/apps`.
    local: Option<LocalRestTransport>,
    out: W,
}

impl<W: Write> Repl<W> {
    pub fn new(
        orchestrator: SessionOrchestrator,
        diagnostics: Subscription,
        local: Option<LocalRestTransport>,
        out: W,
    ) -> Self {
        Self {
            orchestrator,
            diagnostics,
            local,
            out,
        }
    }

    pub fn run(&mut self, input: impl BufRead) -> io::Result<()> {
        writeln!(
            self.out,
            "Connected to {} backend as {}. Type /help for commands.",
            self.orchestrator.backend(),
            self.orchestrator.user_id()
        )?;
        self.execute(Command::Sessions)?;
        self.flush_diagnostics()?;

        let mut lines = input.lines();
        loop {
            self.prompt()?;
            let Some(line) = lines.next() else {
                break;
            };
            let command = parse(&line?);
            if command == Command::Quit {
                break;
            }
            self.execute(command)?;
            self.flush_diagnostics()?;
        }
        Ok(())
    }

    fn prompt(&mut self) -> io::Result<()> {
        match self.orchestrator.active_session().id() {
            Some(id) => write!(self.out, "[{}] > ", id.short(8))?,
            None => write!(self.out, "> ")?,
        }
        self.out.flush()
    }

    fn execute(&mut self, command: Command) -> io::Result<()> {
        let result: Result<(), Failure> = match command {
            Command::Empty | Command::Quit => Ok(()),
            Command::Help => writeln!(self.out, "{}", render::HELP).map_err(Into::into),
            Command::Usage(usage) => writeln!(self.out, "Usage: {}", usage).map_err(Into::into),
            Command::Unknown(name) => {
                writeln!(self.out, "Unknown command /{}. Type /help for commands.", name).map_err(Into::into)
            }
            Command::Sessions => self.show_sessions(),
            Command::Refresh => {
                self.orchestrator.request_refresh();
                self.show_sessions()
            }
            Command::New(seed) => self.create(seed.as_deref()),
            Command::Select(target) => self.select(&target),
            Command::Delete(target) => self.delete(&target),
            Command::History => {
                let text = render::history(self.orchestrator.history());
                writeln!(self.out, "{}", text).map_err(Into::into)
            }
            Command::User(name) => {
                self.orchestrator.set_user_id(name);
                writeln!(self.out, "Now chatting as {}.", self.orchestrator.user_id())?;
                self.show_sessions()
            }
            Command::Apps => self.apps(),
            Command::Send(text) => self.send(&text),
        };

        match result {
            Ok(()) => Ok(()),
            Err(Failure::Io(err)) => Err(err),
            Err(Failure::Chat(err)) => writeln!(self.out, "{}", render::error(&err)),
        }
    }

    fn show_sessions(&mut self) -> Result<(), Failure> {
        let active = self.orchestrator.active_session().id().cloned();
        let sessions = self.orchestrator.sessions()?;
        let text = render::session_list(sessions, active.as_ref());
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    fn create(&mut self, seed: Option<&str>) -> Result<(), Failure> {
        let seed = match seed.map(serde_json::from_str::<serde_json::Value>).transpose() {
            Ok(seed) => seed,
            Err(err) => {
                writeln!(self.out, "Seed is not valid JSON: {}", err)?;
                return Ok(());
            }
        };
        match self.orchestrator.create_session(seed.as_ref())? {
            Some(id) => writeln!(self.out, "Created new session: {}", id)?,
            None => writeln!(self.out, "The backend did not return a session id.")?,
        }
        Ok(())
    }

    fn select(&mut self, target: &str) -> Result<(), Failure> {
        let id = resolve(target, self.orchestrator.cached_sessions());
        let session = self.orchestrator.select(id)?;
        writeln!(self.out, "Chat session: {} ({} events)", session.id, session.events.len())?;
        let text = render::history(self.orchestrator.history());
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    fn delete(&mut self, target: &str) -> Result<(), Failure> {
        let id = resolve(target, self.orchestrator.cached_sessions());
        if self.orchestrator.delete_session(&id)? {
            writeln!(self.out, "Session deleted: {}", id)?;
        }
        Ok(())
    }

    fn apps(&mut self) -> Result<(), Failure> {
        let Some(local) = &self.local else {
            writeln!(self.out, "/apps is only available for the local backend.")?;
            return Ok(());
        };
        let report = local.probe()?;
        writeln!(self.out, "{}", render::probe(&report))?;
        Ok(())
    }

    fn send(&mut self, text: &str) -> Result<(), Failure> {
        let out = &mut self.out;
        let mut write_error: Option<io::Error> = None;
        let result = self.orchestrator.send_and_append(text, |message| {
            if write_error.is_some() {
                return;
            }
            let written = writeln!(out, "{}", render::message(message)).and_then(|()| out.flush());
            if let Err(err) = written {
                write_error = Some(err);
            }
        });
        let result = result.map(|_| ());
        if let Some(err) = write_error {
            return Err(Failure::Io(err));
        }
        result.map_err(Failure::Chat)
    }

    fn flush_diagnostics(&mut self) -> io::Result<()> {
        for notice in drain(&mut self.diagnostics) {
            writeln!(self.out, "{}", render::diagnostic(&notice))?;
        }
        Ok(())
    }
}

/// Why a command did not complete: the backend refused, or the terminal
/// went away.
enum Failure {
    Chat(ChatError),
    Io(io::Error),
}

impl From<ChatError> for Failure {
    fn from(err: ChatError) -> Self {
        Failure::Chat(err)
    }
}

impl From<io::Error> for Failure {
    fn from(err: io::Error) -> Self {
        Failure::Io(err)
    }
}
