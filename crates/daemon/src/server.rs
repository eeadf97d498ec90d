//! The single-threaded, readiness-driven event loop: accept, dispatch,
//! graceful shutdown.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mio::{Events, Interest, Poll, Token};
use tracing::{info, warn};
use ulog_core::file_handler::{ClientId, FileHandlerRegistry};
use ulog_core::path::path_max;
use ulog_core::wire::{BYE_SENTINEL, SHUTDOWN_NOTICE};
use ulog_platform::signal::{SelfPipe, SIGINT, SIGTERM};

use crate::session::{Session, SessionOutcome};

const LISTENER: Token = Token(0);
const SELF_PIPE: Token = Token(1);
const FIRST_SESSION_TOKEN: usize = 2;

/// Owns the listen socket, the session table, the self-pipe, and the
/// poller. `run()` blocks until a graceful shutdown completes.
pub struct Server {
    poll: Poll,
    listener: Option<mio::net::UnixListener>,
    socket_path: PathBuf,
    self_pipe: SelfPipe,
    self_pipe_mio: mio::net::UnixStream,
    sessions: HashMap<Token, Session>,
    registry: FileHandlerRegistry,
    next_token: usize,
    next_client_id: ClientId,
    path_max: usize,
    shutting_down: bool,
}

impl Server {
    /// Binds `socket_path`, unlinking any stale entry first, and installs
    /// `SIGINT`/`SIGTERM` handlers via the self-pipe.
    pub fn bind(socket_path: impl Into<PathBuf>) -> io::Result<Self> {
        let socket_path = socket_path.into();
        let poll = Poll::new()?;
        let listener = bind_listener(&socket_path)?;
        let self_pipe = SelfPipe::install(&[SIGINT, SIGTERM])?;
        let self_pipe_mio = mio::net::UnixStream::from_std(self_pipe.reader().try_clone()?);

        Ok(Self {
            poll,
            listener: Some(listener),
            socket_path,
            self_pipe,
            self_pipe_mio,
            sessions: HashMap::new(),
            registry: FileHandlerRegistry::new(),
            next_token: FIRST_SESSION_TOKEN,
            next_client_id: 0,
            path_max: path_max(),
            shutting_down: false,
        })
    }

    /// Runs the event loop until graceful shutdown completes. Returns once
    /// the listen socket is closed and every session has reached EOF.
    pub fn run(mut self) -> io::Result<()> {
        self.poll.registry().register(
            self.listener.as_mut().expect("listener present at startup"),
            LISTENER,
            Interest::READABLE,
        )?;
        self.poll
            .registry()
            .register(&mut self.self_pipe_mio, SELF_PIPE, Interest::READABLE)?;

        let mut events = Events::with_capacity(1024);
        loop {
            let timeout = self.shutting_down.then(|| Duration::from_millis(200));
            match self.poll.poll(&mut events, timeout) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_all(),
                    SELF_PIPE => self.handle_signal(),
                    token => self.handle_session(token),
                }
            }
            if self.shutting_down && self.listener.is_none() && self.sessions.is_empty() {
                info!("all sessions drained, exiting");
                return Ok(());
            }
        }
    }

    fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn accept_all(&mut self) {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return;
            };
            match listener.accept() {
                Ok((mut stream, _addr)) => {
                    let token = self.next_token();
                    if let Err(err) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(error = %err, "failed to register new connection");
                        continue;
                    }
                    let id = self.next_client_id;
                    self.next_client_id += 1;
                    info!(client = id, "accepted");
                    self.sessions
                        .insert(token, Session::new(id, stream, self.path_max));
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    return;
                }
            }
        }
    }

    fn handle_signal(&mut self) {
        if let Err(err) = self.self_pipe.drain() {
            warn!(error = %err, "failed to drain self-pipe");
        }
        if !self.shutting_down {
            info!("signal received, beginning graceful shutdown");
            self.begin_shutdown();
        }
    }

    fn begin_shutdown(&mut self) {
        self.shutting_down = true;

        let _ = self.poll.registry().deregister(&mut self.self_pipe_mio);

        if let Some(mut listener) = self.listener.take() {
            let _ = self.poll.registry().deregister(&mut listener);
            drop(listener);
        }
        if let Err(err) = std::fs::remove_file(&self.socket_path) {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(error = %err, path = %self.socket_path.display(), "failed to unlink socket");
            }
        }

        for session in self.sessions.values_mut() {
            session.send_response(SHUTDOWN_NOTICE);
            if let Err(err) = session.shutdown_read() {
                warn!(error = %err, "failed to half-close session for reading");
            }
        }
    }

    fn handle_session(&mut self, token: Token) {
        let outcome = match self.sessions.get_mut(&token) {
            Some(session) => session.on_readable(&mut self.registry),
            None => return,
        };
        if matches!(outcome, SessionOutcome::Continue) {
            return;
        }
        let Some(mut session) = self.sessions.remove(&token) else {
            return;
        };
        if !self.shutting_down {
            session.send_response(BYE_SENTINEL);
        }
        let _ = self.poll.registry().deregister(session.stream_mut());
        if let Some(path) = session.path.take() {
            info!(client = session.id, path = %path.display(), "disconnected");
            self.registry.client_done(&path, session.id);
        } else {
            info!(client = session.id, "disconnected before handshake completed");
        }
    }
}

fn bind_listener(path: &Path) -> io::Result<mio::net::UnixListener> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    mio::net::UnixListener::bind(path)
}
