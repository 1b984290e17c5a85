use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use crate::app::PageSink;
use crate::controller::Controller;
use crate::fetch::ErrorKind;
use crate::output::{self, OutputFormat, PageView};
use crate::registry::Registry;
use crate::session::AuthLinks;
use crate::state::{Event, PageState, Phase};
use crate::transport::{HttpResponse, Transport, TransportError};

const TRANSACTIONS: &str = "/data-api/rest/Transaction";
const EMPLOYEES: &str = "/data-api/rest/Employees";
const IDENTITY: &str = "/.auth/me";

enum Reply {
    Status(u16, String),
    Unreachable,
}

#[derive(Default)]
struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    hold_until: HashMap<String, Arc<Notify>>,
    release_after: HashMap<String, Arc<Notify>>,
}

impl ScriptedTransport {
    fn reply(self, path: &str, status: u16, body: &str) -> Self {
        self.push(path, Reply::Status(status, body.to_string()))
    }

    fn unreachable(self, path: &str) -> Self {
        self.push(path, Reply::Unreachable)
    }

    fn push(self, path: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// `held` does not answer until `releaser` has been answered.
    fn hold(mut self, held: &str, releaser: &str) -> Self {
        let gate = Arc::new(Notify::new());
        self.hold_until.insert(held.to_string(), Arc::clone(&gate));
        self.release_after.insert(releaser.to_string(), gate);
        self
    }

    fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, path: &str) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(path.to_string());
        if let Some(gate) = self.hold_until.get(path) {
            gate.notified().await;
        }
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|q| q.pop_front());
        if let Some(gate) = self.release_after.get(path) {
            gate.notify_one();
        }
        match reply {
            Some(Reply::Status(status, body)) => Ok(HttpResponse::new(status, body)),
            Some(Reply::Unreachable) => Err(TransportError::Connection {
                url: format!("http://localhost{path}"),
                message: "connection refused".to_string(),
            }),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}

fn anonymous(t: ScriptedTransport) -> ScriptedTransport {
    t.reply(IDENTITY, 200, r#"{"clientPrincipal":null}"#)
}

struct Outcome {
    final_state: PageState,
    history: Vec<PageState>,
}

async fn drive(
    transport: Arc<ScriptedTransport>,
    events: Vec<Event>,
) -> Outcome {
    let registry = Arc::new(Registry::default());
    let mut controller = Controller::new(registry, transport, AuthLinks::default());
    let mut history = Vec::new();
    let run = controller.run(futures::stream::iter(events), |s: &PageState| {
        history.push(s.clone())
    });
    let final_state = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("controller did not settle");
    Outcome {
        final_state,
        history,
    }
}

fn html(state: &PageState) -> String {
    let registry = Registry::default();
    let links = AuthLinks::default();
    let view = PageView::new(&registry, state, &links);
    String::from_utf8(output::render(OutputFormat::Html, &view)).unwrap()
}

#[tokio::test]
async fn mount_fetches_default_tab_then_switches_to_employees() {
    let transport = Arc::new(anonymous(ScriptedTransport::default())
        .reply(
            TRANSACTIONS,
            200,
            r#"{"value":[{"Transaction_ID":1,"Product_ID":9,"Customer_ID":4,"Quantity":2}]}"#,
        )
        .reply(EMPLOYEES, 200, r#"{"value":[]}"#));
    let registry = Arc::new(Registry::default());
    let employees = registry.find("Employees").unwrap();

    let (tx, rx) = mpsc::channel::<Event>(4);
    let mut tx = Some(tx);
    let ui = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|ev| (ev, rx))
    }));

    let mut controller = Controller::new(
        Arc::clone(&registry),
        transport.clone(),
        AuthLinks::default(),
    );
    let mut settled = Vec::new();
    let run = controller.run(ui, |s: &PageState| {
        if s.phase == Phase::Displayed {
            settled.push(s.clone());
            // click the second tab once the first table is on screen
            if let Some(tx) = tx.take() {
                tx.try_send(Event::SelectCategory(employees)).unwrap();
            }
        }
    });
    let final_state = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap();

    assert_eq!(settled.len(), 2);
    let first = html(&settled[0]);
    assert_eq!(settled[0].view.active, registry.default_id());
    assert_eq!(first.matches("<tr data-key=").count(), 1);
    assert!(first.contains(r#"<tr data-key="id:1">"#));
    assert!(first.contains(r#"<td class="py-2 px-4 border-b">9</td>"#));

    assert_eq!(final_state.view.active, employees);
    assert_eq!(final_state.phase, Phase::Displayed);
    let second = html(&final_state);
    assert!(second.contains(r#"<th class="py-2 px-4 border-b">EmployeeID</th>"#));
    assert_eq!(second.matches("<tr data-key=").count(), 0);
    assert!(!second.contains(ErrorKind::Transient.message()));
    assert!(!second.contains(ErrorKind::Forbidden.message()));

    assert_eq!(transport.calls_to(TRANSACTIONS), 1);
    assert_eq!(transport.calls_to(EMPLOYEES), 1);
    assert_eq!(transport.calls_to(IDENTITY), 1);
}

#[tokio::test]
async fn late_result_for_previous_tab_never_reaches_the_view() {
    let transport = Arc::new(
        anonymous(ScriptedTransport::default())
            .reply(TRANSACTIONS, 200, r#"{"value":[{"Transaction_ID":1}]}"#)
            .reply(EMPLOYEES, 200, r#"{"value":[{"employee_id":7,"first_name":"Grace"}]}"#)
            .hold(TRANSACTIONS, EMPLOYEES),
    );
    let employees = Registry::default().find("Employees").unwrap();

    let out = drive(transport.clone(), vec![Event::SelectCategory(employees)]).await;

    assert_eq!(transport.calls_to(TRANSACTIONS), 1);
    assert_eq!(out.final_state.view.active, employees);
    assert_eq!(out.final_state.view.rows.len(), 1);
    assert_eq!(out.final_state.view.rows[0]["employee_id"], 7);
    assert!(out
        .history
        .iter()
        .all(|s| s.view.active == employees || s.view.rows.is_empty()));
}

#[tokio::test]
async fn forbidden_replaces_table_with_message() {
    let transport = Arc::new(anonymous(ScriptedTransport::default()).reply(TRANSACTIONS, 403, ""));
    let out = drive(transport, vec![]).await;

    assert_eq!(out.final_state.phase, Phase::Forbidden);
    assert_eq!(out.final_state.view.error, Some(ErrorKind::Forbidden));
    assert!(out.final_state.view.rows.is_empty());
    let page = html(&out.final_state);
    assert!(page.contains("You do not have permission to access this resource."));
    assert!(!page.contains("<table"));
}

#[tokio::test]
async fn network_failure_and_server_errors_are_transient() {
    for transport in [
        anonymous(ScriptedTransport::default()).unreachable(TRANSACTIONS),
        anonymous(ScriptedTransport::default()).reply(TRANSACTIONS, 500, "oops"),
        anonymous(ScriptedTransport::default()).reply(TRANSACTIONS, 404, ""),
    ] {
        let out = drive(Arc::new(transport), vec![]).await;
        assert_eq!(out.final_state.phase, Phase::TransientError);
        assert_eq!(
            out.final_state.error_message(),
            Some("Error fetching data. Please try again later.")
        );
        assert!(!html(&out.final_state).contains("<table"));
    }
}

#[tokio::test]
async fn retry_after_failure_recovers() {
    let transport = Arc::new(
        anonymous(ScriptedTransport::default())
            .unreachable(TRANSACTIONS)
            .reply(TRANSACTIONS, 200, r#"{"value":[{"Transaction_ID":3}]}"#),
    );
    let (tx, rx) = mpsc::channel::<Event>(4);
    let mut tx = Some(tx);
    let ui = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|ev| (ev, rx))
    }));
    let mut controller = Controller::new(
        Arc::new(Registry::default()),
        transport.clone(),
        AuthLinks::default(),
    );
    let run = controller.run(ui, |s: &PageState| {
        if s.phase == Phase::TransientError {
            if let Some(tx) = tx.take() {
                tx.try_send(Event::Retry).unwrap();
            }
        }
    });
    let final_state = tokio::time::timeout(Duration::from_secs(5), run).await.unwrap();

    assert_eq!(final_state.phase, Phase::Displayed);
    assert_eq!(final_state.view.error, None);
    assert_eq!(final_state.view.rows.len(), 1);
    assert_eq!(transport.calls_to(TRANSACTIONS), 2);
}

#[tokio::test]
async fn reselecting_active_tab_refetches_and_yields_same_view() {
    let body = r#"{"value":[{"Transaction_ID":1},{"Transaction_ID":2}]}"#;
    let once = Arc::new(anonymous(ScriptedTransport::default()).reply(TRANSACTIONS, 200, body));
    let baseline = drive(once, vec![]).await;

    let default_tab = Registry::default().default_id();
    let twice = Arc::new(
        anonymous(ScriptedTransport::default())
            .reply(TRANSACTIONS, 200, body)
            .reply(TRANSACTIONS, 200, body)
            .reply(TRANSACTIONS, 200, body),
    );
    let again = drive(
        twice.clone(),
        vec![Event::SelectCategory(default_tab), Event::SelectCategory(default_tab)],
    )
    .await;

    assert_eq!(twice.calls_to(TRANSACTIONS), 3);
    assert_eq!(again.final_state.view, baseline.final_state.view);
    assert_eq!(again.final_state.transition, baseline.final_state.transition);
}

#[tokio::test]
async fn anonymous_session_shows_login_link_and_tabs_still_work() {
    let transport = Arc::new(
        anonymous(ScriptedTransport::default())
            .reply(TRANSACTIONS, 200, r#"{"value":[]}"#)
            .reply(EMPLOYEES, 200, r#"{"value":[{"employee_id":1}]}"#),
    );
    let employees = Registry::default().find("Employees").unwrap();
    let out = drive(transport, vec![Event::SelectCategory(employees)]).await;

    assert!(!out.final_state.session.authenticated);
    let page = html(&out.final_state);
    assert!(page.contains(r#"<a href="/.auth/login/aad" class="text-blue-500 hover:underline">Login</a>"#));
    assert!(!page.contains("Welcome"));
    assert_eq!(out.final_state.view.rows.len(), 1);
}

#[tokio::test]
async fn principal_shows_greeting_and_logout() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(
                IDENTITY,
                200,
                r#"{"clientPrincipal":{"userDetails":"alice","userRoles":["reader"]}}"#,
            )
            .reply(TRANSACTIONS, 200, r#"{"value":[]}"#),
    );
    let out = drive(transport, vec![]).await;

    assert!(out.final_state.session.authenticated);
    let page = html(&out.final_state);
    assert!(page.contains("Welcome, alice Roles:(reader)!"));
    assert!(page.contains(r#"<a href="/.auth/logout""#));
    assert!(!page.contains(">Login</a>"));
}

#[tokio::test]
async fn identity_failure_is_swallowed() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .unreachable(IDENTITY)
            .reply(TRANSACTIONS, 200, r#"{"value":[{"Transaction_ID":5}]}"#),
    );
    let out = drive(transport, vec![]).await;

    assert!(!out.final_state.session.authenticated);
    assert_eq!(out.final_state.phase, Phase::Displayed);
    assert_eq!(out.final_state.view.rows.len(), 1);
}

#[tokio::test]
async fn rejected_identity_lookup_stays_anonymous() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(IDENTITY, 401, "")
            .reply(TRANSACTIONS, 200, r#"{"value":[{"Transaction_ID":5}]}"#),
    );
    let out = drive(Arc::clone(&transport), vec![]).await;

    assert_eq!(transport.calls_to(IDENTITY), 1);
    assert!(!out.final_state.session.authenticated);
    assert!(out.final_state.view.error.is_none());
    assert_eq!(out.final_state.phase, Phase::Displayed);
    assert!(html(&out.final_state).contains(">Login</a>"));
}

/// Feeds every observed state through a sink the way `run_async` does.
fn replay(mut sink: PageSink<Vec<u8>>, out: &Outcome) -> Vec<u8> {
    let registry = Registry::default();
    let links = AuthLinks::default();
    for state in out.history.iter() {
        if sink.renders_change(state) {
            sink.emit(&registry, &links, state);
        }
    }
    if sink.renders_final(&out.final_state) {
        sink.emit(&registry, &links, &out.final_state);
    }
    sink.finish().unwrap()
}

#[tokio::test]
async fn one_shot_stdout_gets_a_single_page_after_a_late_identity() {
    let transport = Arc::new(
        ScriptedTransport::default()
            .reply(
                IDENTITY,
                200,
                r#"{"clientPrincipal":{"userDetails":"alice","userRoles":["reader"]}}"#,
            )
            .reply(TRANSACTIONS, 200, r#"{"value":[{"Transaction_ID":1}]}"#)
            .hold(IDENTITY, TRANSACTIONS),
    );
    let out = drive(transport, vec![]).await;

    let settled = out.history.iter().filter(|s| s.is_settled()).count();
    assert_eq!(settled, 2, "rows land before the session");

    let printed = replay(PageSink::new(OutputFormat::Json, None, false, Vec::new()), &out);
    let page: serde_json::Value = serde_json::from_slice(&printed).unwrap();
    assert_eq!(page["user"], "alice");
    assert_eq!(page["rows"][0]["key"], "id:1");

    let printed = replay(PageSink::new(OutputFormat::Html, None, false, Vec::new()), &out);
    let page = String::from_utf8(printed).unwrap();
    assert_eq!(page.matches("<html").count(), 1);
    assert!(page.contains("Welcome, alice Roles:(reader)!"));

    let printed = replay(PageSink::new(OutputFormat::Text, None, true, Vec::new()), &out);
    let page = String::from_utf8(printed).unwrap();
    assert_eq!(page.matches("[🍅 Transactions]").count(), 2);
}

#[tokio::test]
async fn logout_navigates_away_and_stops_the_page() {
    let transport = Arc::new(
        anonymous(ScriptedTransport::default()).reply(TRANSACTIONS, 200, r#"{"value":[]}"#),
    );
    let out = drive(transport, vec![Event::Logout, Event::Retry]).await;

    assert_eq!(out.final_state.navigated_to.as_deref(), Some("/.auth/logout"));
    assert!(!out.final_state.session.authenticated);
    assert!(out.final_state.pending.is_none());
}

#[test]
fn text_and_json_projections_follow_the_schema() {
    let registry = Registry::default();
    let links = AuthLinks::default();
    let mut state = PageState::new(&registry);
    let step = crate::state::reduce(&state, Event::Mount, &registry, &links.logout_url);
    state = step.state;
    let request = state.pending.unwrap();
    let rows = serde_json::json!([{"Transaction_ID": 1, "Product_ID": 9, "Product_Category": "Fruit"}]);
    let step = crate::state::reduce(
        &state,
        Event::FetchCompleted(crate::fetch::FetchCompletion {
            token: request.token,
            category: request.category,
            outcome: crate::fetch::FetchOutcome::Rows(
                rows.as_array()
                    .unwrap()
                    .iter()
                    .map(|r| r.as_object().cloned().unwrap())
                    .collect(),
            ),
        }),
        &registry,
        &links.logout_url,
    );
    let view = PageView::new(&registry, &step.state, &links);

    let text = String::from_utf8(output::render(OutputFormat::Text, &view)).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "Login: /.auth/login/aad");
    assert!(lines[1].starts_with("[🍅 Transactions]"));
    assert!(lines[3].starts_with("ID | ProductID | CustomerID | CategoryName"));
    assert!(lines[5].starts_with("1  | 9         |            | Fruit"));

    let json: serde_json::Value =
        serde_json::from_slice(&output::render(OutputFormat::Json, &view)).unwrap();
    assert_eq!(json["phase"], "displayed");
    assert_eq!(json["category"], "Transactions");
    assert_eq!(json["rows"][0]["key"], "id:1");
    assert_eq!(json["rows"][0]["cells"][3], "Fruit");
    assert_eq!(json["message"], serde_json::Value::Null);
}
