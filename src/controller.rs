use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, Stream, StreamExt};
use thiserror::Error;

use crate::fetch;
use crate::registry::{CategoryId, Registry};
use crate::session::{self, AuthLinks};
use crate::state::{self, Command, Event, PageState};
use crate::transport::Transport;

type InFlight = FuturesUnordered<BoxFuture<'static, Event>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("unknown category: {label}")]
    UnknownCategory { label: String },
}

/// Something typed by the user in interactive mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiCommand {
    Select(CategoryId),
    Retry,
    Login,
    Logout,
    Quit,
}

impl UiCommand {
    pub fn into_event(self) -> Option<Event> {
        match self {
            UiCommand::Select(id) => Some(Event::SelectCategory(id)),
            UiCommand::Retry => Some(Event::Retry),
            UiCommand::Logout => Some(Event::Logout),
            UiCommand::Login | UiCommand::Quit => None,
        }
    }
}

/// Blank input is not a command.
pub fn parse_command(line: &str, registry: &Registry) -> Result<Option<UiCommand>, ControllerError> {
    let input = line.trim();
    let command = match input.to_lowercase().as_str() {
        "" => return Ok(None),
        "r" | "retry" => UiCommand::Retry,
        "q" | "quit" | "exit" => UiCommand::Quit,
        "login" => UiCommand::Login,
        "logout" => UiCommand::Logout,
        _ => registry
            .resolve(input)
            .map(UiCommand::Select)
            .ok_or_else(|| ControllerError::UnknownCategory {
                label: input.to_string(),
            })?,
    };
    Ok(Some(command))
}

/// Owns the single page state. UI events and network completions are
/// interleaved on the caller's task; nothing here spawns threads.
pub struct Controller {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    links: AuthLinks,
    state: PageState,
}

impl Controller {
    pub fn new(registry: Arc<Registry>, transport: Arc<dyn Transport>, links: AuthLinks) -> Self {
        let state = PageState::new(&registry);
        Self {
            registry,
            transport,
            links,
            state,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn links(&self) -> &AuthLinks {
        &self.links
    }

    /// Mounts the page, then processes `ui` until it ends and every
    /// in-flight operation has completed, or until logout.
    pub async fn run<S, F>(&mut self, mut ui: S, mut on_change: F) -> PageState
    where
        S: Stream<Item = Event> + Unpin,
        F: FnMut(&PageState),
    {
        let mut in_flight: InFlight = FuturesUnordered::new();
        self.apply(Event::Mount, &mut in_flight, &mut on_change);

        let mut ui_open = true;
        loop {
            if self.state.is_terminated() {
                break;
            }
            if !ui_open && in_flight.is_empty() {
                break;
            }
            tokio::select! {
                ev = ui.next(), if ui_open => match ev {
                    Some(ev) => self.apply(ev, &mut in_flight, &mut on_change),
                    None => {
                        tracing::debug!(pending = in_flight.len(), "input closed, draining");
                        ui_open = false;
                    }
                },
                Some(ev) = in_flight.next(), if !in_flight.is_empty() => {
                    self.apply(ev, &mut in_flight, &mut on_change);
                }
                else => break,
            }
        }
        self.state.clone()
    }

    fn apply<F>(&mut self, event: Event, in_flight: &mut InFlight, on_change: &mut F)
    where
        F: FnMut(&PageState),
    {
        let step = state::reduce(&self.state, event, &self.registry, &self.links.logout_url);
        let changed = step.state != self.state;
        self.state = step.state;
        for command in step.commands {
            if let Some(fut) = self.execute(command) {
                in_flight.push(fut);
            }
        }
        if changed {
            if self.state.is_settled() {
                tracing::info!(
                    category = %self.registry.category(self.state.view.active).label,
                    phase = ?self.state.phase,
                    rows = self.state.view.rows.len(),
                    "view settled"
                );
            }
            on_change(&self.state);
        }
    }

    fn execute(&self, command: Command) -> Option<BoxFuture<'static, Event>> {
        match command {
            Command::ResolveSession => {
                let transport = Arc::clone(&self.transport);
                let path = self.links.identity_path.clone();
                Some(
                    async move {
                        Event::SessionResolved(
                            session::resolve_session(transport.as_ref(), &path).await,
                        )
                    }
                    .boxed(),
                )
            }
            Command::Fetch(request) => {
                let transport = Arc::clone(&self.transport);
                let registry = Arc::clone(&self.registry);
                Some(
                    async move {
                        Event::FetchCompleted(
                            fetch::fetch(transport.as_ref(), &registry, request).await,
                        )
                    }
                    .boxed(),
                )
            }
            Command::Navigate(url) => {
                tracing::info!(%url, "navigating away");
                None
            }
        }
    }
}
