pub mod page;

use serde::Serialize;

use crate::fetch::ErrorKind;
use crate::registry::{Record, Registry};
use crate::session::AuthLinks;
use crate::state::{PageState, Phase};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

/// Everything a renderer needs. Rendering is a pure function of this.
#[derive(Clone, Copy, Debug)]
pub struct PageView<'a> {
    pub registry: &'a Registry,
    pub state: &'a PageState,
    pub links: &'a AuthLinks,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    pub key: String,
    pub cells: Vec<String>,
}

impl<'a> PageView<'a> {
    pub fn new(registry: &'a Registry, state: &'a PageState, links: &'a AuthLinks) -> Self {
        Self {
            registry,
            state,
            links,
        }
    }

    pub fn headers(&self) -> Vec<&'a str> {
        self.registry.schema(self.state.view.active).headers().collect()
    }

    /// `None` when an error replaces the table.
    pub fn rows(&self) -> Option<Vec<RenderedRow>> {
        if self.state.view.error.is_some() {
            return None;
        }
        let schema = self.registry.schema(self.state.view.active);
        Some(
            self.state
                .view
                .rows
                .iter()
                .enumerate()
                .map(|(i, r)| RenderedRow {
                    key: schema.row_key(r, i).to_string(),
                    cells: schema.cells(r),
                })
                .collect(),
        )
    }
}

#[derive(Serialize)]
struct ViewSnapshot<'a> {
    category: &'a str,
    endpoint: &'a str,
    phase: Phase,
    authenticated: bool,
    user: Option<&'a str>,
    roles: Vec<&'a str>,
    error: Option<ErrorKind>,
    message: Option<&'static str>,
    headers: Vec<&'a str>,
    rows: Vec<RenderedRow>,
    records: &'a [Record],
}

pub fn render(format: OutputFormat, view: &PageView<'_>) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_text(view),
        OutputFormat::Json => render_json(view),
        OutputFormat::Html => page::render_html(view),
    }
}

pub fn render_json(view: &PageView<'_>) -> Vec<u8> {
    let state = view.state;
    let active = state.view.active;
    let snapshot = ViewSnapshot {
        category: &view.registry.category(active).label,
        endpoint: view.registry.endpoint(active),
        phase: state.phase,
        authenticated: state.session.authenticated,
        user: state.session.display_name.as_deref(),
        roles: state.session.roles.iter().map(String::as_str).collect(),
        error: state.view.error,
        message: state.error_message(),
        headers: view.headers(),
        rows: view.rows().unwrap_or_default(),
        records: state.view.rows.as_slice(),
    };
    serde_json::to_vec_pretty(&snapshot).unwrap_or_else(|_| b"{}\n".to_vec())
}

pub fn render_text(view: &PageView<'_>) -> Vec<u8> {
    let state = view.state;
    let mut out = String::new();

    match state.session.greeting() {
        Some(greeting) => {
            out.push_str(&greeting);
            out.push_str(&format!("  [logout: {}]", view.links.logout_url));
        }
        None => out.push_str(&format!("Login: {}", view.links.login_url)),
    }
    out.push('\n');

    let tabs = view
        .registry
        .iter()
        .map(|(id, e)| {
            if id == state.view.active {
                format!("[{}]", e.category.title())
            } else {
                format!(" {} ", e.category.title())
            }
        })
        .collect::<Vec<_>>();
    out.push_str(&tabs.join(" "));
    out.push_str("\n\n");

    if let Some(message) = state.error_message() {
        out.push_str(message);
        out.push('\n');
        return out.into_bytes();
    }

    let headers = view.headers();
    let rows = view.rows().unwrap_or_default();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows.iter() {
        for (i, cell) in row.cells.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    out.push_str(&line(headers.as_slice()));
    out.push('\n');
    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join("-+-");
    out.push_str(&rule);
    out.push('\n');
    for row in rows.iter() {
        let cells = row.cells.iter().map(String::as_str).collect::<Vec<_>>();
        out.push_str(&line(cells.as_slice()));
        out.push('\n');
    }
    if state.phase == Phase::Fetching {
        out.push_str("(loading)\n");
    }
    out.into_bytes()
}
