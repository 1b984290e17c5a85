//! Page state and its reducer.
//!
//! `PageState` is never mutated in place: every event produces a new value
//! through [`reduce`], together with the side effects the controller must
//! run. Fetch completions carry the token and category they were issued
//! for; anything that no longer matches the pending request is dropped.

use std::sync::Arc;

use serde::Serialize;

use crate::fetch::{ErrorKind, FetchCompletion, FetchOutcome, FetchRequest, RequestToken};
use crate::registry::{CategoryId, Record, Registry};
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Fetching,
    Displayed,
    Forbidden,
    TransientError,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewState {
    pub active: CategoryId,
    pub rows: Arc<Vec<Record>>,
    pub error: Option<ErrorKind>,
}

impl ViewState {
    pub fn empty(active: CategoryId) -> Self {
        Self {
            active,
            rows: Arc::new(Vec::new()),
            error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageState {
    pub session: Session,
    pub view: ViewState,
    pub phase: Phase,
    pub pending: Option<FetchRequest>,
    /// Changes only when the active category changes; drives the panel
    /// transition.
    pub transition: u64,
    /// Set by logout. Terminal.
    pub navigated_to: Option<String>,
    next_token: u64,
}

impl PageState {
    pub fn new(registry: &Registry) -> Self {
        Self {
            session: Session::anonymous(),
            view: ViewState::empty(registry.default_id()),
            phase: Phase::Idle,
            pending: None,
            transition: 0,
            navigated_to: None,
            next_token: 0,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.navigated_to.is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.pending.is_none()
    }

    pub fn error_message(&self) -> Option<&'static str> {
        self.view.error.map(ErrorKind::message)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Mount,
    SelectCategory(CategoryId),
    Retry,
    SessionResolved(Session),
    FetchCompleted(FetchCompletion),
    Logout,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    ResolveSession,
    Fetch(FetchRequest),
    Navigate(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub state: PageState,
    pub commands: Vec<Command>,
}

impl Step {
    fn unchanged(state: &PageState) -> Self {
        Self {
            state: state.clone(),
            commands: Vec::new(),
        }
    }
}

/// Pure transition function. Panics if an event names a category the
/// registry does not hold.
pub fn reduce(state: &PageState, event: Event, registry: &Registry, logout_url: &str) -> Step {
    if state.is_terminated() {
        tracing::debug!(?event, "page already navigated away, ignoring event");
        return Step::unchanged(state);
    }

    match event {
        Event::Mount => {
            let mut step = dispatch_fetch(state, registry.default_id(), registry);
            step.commands.insert(0, Command::ResolveSession);
            step
        }
        Event::SelectCategory(category) => dispatch_fetch(state, category, registry),
        Event::Retry => dispatch_fetch(state, state.view.active, registry),
        Event::SessionResolved(session) => Step {
            state: PageState {
                session,
                ..state.clone()
            },
            commands: Vec::new(),
        },
        Event::FetchCompleted(completion) => apply_completion(state, completion),
        Event::Logout => Step {
            state: PageState {
                session: Session::anonymous(),
                pending: None,
                navigated_to: Some(logout_url.to_string()),
                ..state.clone()
            },
            commands: vec![Command::Navigate(logout_url.to_string())],
        },
    }
}

fn dispatch_fetch(state: &PageState, category: CategoryId, registry: &Registry) -> Step {
    assert!(
        registry.contains(category),
        "category {:?} is not registered",
        category
    );
    let token = RequestToken(state.next_token + 1);
    let request = FetchRequest { token, category };
    let transition = if category != state.view.active {
        state.transition + 1
    } else {
        state.transition
    };
    Step {
        state: PageState {
            view: ViewState::empty(category),
            phase: Phase::Fetching,
            pending: Some(request),
            transition,
            next_token: token.0,
            ..state.clone()
        },
        commands: vec![Command::Fetch(request)],
    }
}

fn apply_completion(state: &PageState, completion: FetchCompletion) -> Step {
    let current = match state.pending {
        Some(pending)
            if pending.token == completion.token
                && pending.category == completion.category
                && state.view.active == completion.category =>
        {
            pending
        }
        _ => {
            tracing::debug!(
                token = completion.token.0,
                category = completion.category.index(),
                "discarding stale completion"
            );
            return Step::unchanged(state);
        }
    };

    let (view, phase) = match completion.outcome {
        FetchOutcome::Rows(rows) => (
            ViewState {
                active: current.category,
                rows: Arc::new(rows),
                error: None,
            },
            Phase::Displayed,
        ),
        FetchOutcome::Failed(kind) => (
            ViewState {
                active: current.category,
                rows: Arc::new(Vec::new()),
                error: Some(kind),
            },
            match kind {
                ErrorKind::Forbidden => Phase::Forbidden,
                ErrorKind::Transient => Phase::TransientError,
            },
        ),
    };

    Step {
        state: PageState {
            view,
            phase,
            pending: None,
            ..state.clone()
        },
        commands: Vec::new(),
    }
}
