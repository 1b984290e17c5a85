use super::PageView;
use crate::state::Phase;

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn query_escape(value: &str) -> String {
    let mut out = String::new();
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn render_auth(view: &PageView<'_>) -> String {
    match view.state.session.greeting() {
        Some(greeting) => format!(
            r#"<div class="auth flex items-center gap-4">
        <span class="text-slate-700">{greeting}</span>
        <a href="{logout}" class="text-blue-500 hover:underline">Logout</a>
      </div>"#,
            greeting = escape_html(&greeting),
            logout = escape_html(&view.links.logout_url),
        ),
        None => format!(
            r#"<a href="{login}" class="text-blue-500 hover:underline">Login</a>"#,
            login = escape_html(&view.links.login_url),
        ),
    }
}

fn render_nav(view: &PageView<'_>) -> String {
    let mut out = String::new();
    out.push_str("<nav>\n        <ul>\n");
    for (id, entry) in view.registry.iter() {
        let selected = id == view.state.view.active;
        out.push_str(&format!(
            "          <li class=\"{}\"><a href=\"?tab={}\">{}</a>{}</li>\n",
            if selected { "selected" } else { "" },
            query_escape(&entry.category.label),
            escape_html(&entry.category.title()),
            if selected {
                "<div class=\"underline\"></div>"
            } else {
                ""
            }
        ));
    }
    out.push_str("        </ul>\n      </nav>");
    out
}

fn render_body(view: &PageView<'_>) -> String {
    let rows = match view.rows() {
        Some(rows) => rows,
        None => {
            let message = view.state.error_message().unwrap_or_default();
            return format!(
                "<p class=\"error text-red-600\">{}</p>",
                escape_html(message)
            );
        }
    };

    let mut out = String::new();
    out.push_str("<table class=\"min-w-full bg-white border border-gray-300\">\n");
    out.push_str("            <thead>\n              <tr>\n");
    for header in view.headers() {
        out.push_str(&format!(
            "                <th class=\"py-2 px-4 border-b\">{}</th>\n",
            escape_html(header)
        ));
    }
    out.push_str("              </tr>\n            </thead>\n            <tbody>\n");
    for row in rows {
        out.push_str(&format!(
            "              <tr data-key=\"{}\">\n",
            escape_html(&row.key)
        ));
        for cell in row.cells.iter() {
            out.push_str(&format!(
                "                <td class=\"py-2 px-4 border-b\">{}</td>\n",
                escape_html(cell)
            ));
        }
        out.push_str("              </tr>\n");
    }
    out.push_str("            </tbody>\n          </table>");
    out
}

pub fn render_html(view: &PageView<'_>) -> Vec<u8> {
    let state = view.state;
    let title = view.registry.category(state.view.active).title();
    let busy = if state.phase == Phase::Fetching {
        "true"
    } else {
        "false"
    };

    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>{title}</title>
  <script src="https://cdn.tailwindcss.com"></script>
  <style>
    nav ul {{ display: flex; gap: 1rem; list-style: none; padding: 0; }}
    nav li {{ position: relative; cursor: pointer; padding: 0.5rem 1rem; }}
    nav li.selected {{ font-weight: 700; }}
    nav .underline {{ position: absolute; left: 0; right: 0; bottom: -1px; height: 2px; background: #3b82f6; }}
    @keyframes panel-enter {{
      from {{ transform: translateY(10px); opacity: 0; }}
      to {{ transform: translateY(0); opacity: 1; }}
    }}
    .panel {{ animation: panel-enter 0.2s ease-out; }}
  </style>
</head>
<body>
  <div class="container mx-auto p-4">
    <header class="flex items-center justify-between mb-4">
      <h1 class="text-4xl font-bold">Hello World</h1>
      {auth}
    </header>
    <div class="window">
      {nav}
      <main aria-busy="{busy}">
        <div class="panel" data-transition="{transition}" data-phase="{phase}">
          {body}
        </div>
      </main>
    </div>
  </div>
</body>
</html>
"####,
        title = escape_html(&title),
        auth = render_auth(view),
        nav = render_nav(view),
        busy = busy,
        transition = state.transition,
        phase = phase_name(state.phase),
        body = render_body(view),
    );
    html.into_bytes()
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Fetching => "fetching",
        Phase::Displayed => "displayed",
        Phase::Forbidden => "forbidden",
        Phase::TransientError => "transient-error",
    }
}
