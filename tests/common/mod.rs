#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::Value;

use loan_desk::api::ApplicationApi;
use loan_desk::core::errors::{DeskError, Result};
use loan_desk::engine::alerts::{DesktopNotification, NotificationId, Permission};
use loan_desk::engine::badges::BadgeBoard;
use loan_desk::engine::controller::{Controller, ControllerSettings};
use loan_desk::engine::host::{Collaborators, ModalHost, Notifier, ToastLevel, ToastSink, ViewSink};
use loan_desk::logger::activity::ActivityLoggerHandle;
use loan_desk::model::application::{
    ApiResponse, ApplicationCounts, ApplicationDetail, ApplicationRecord, UserPendingCount,
};
use loan_desk::model::section::{Section, Stage};
use loan_desk::model::users::{LoginResponse, LoginUser, NewUser, Session, UserAccount};
use loan_desk::table::view::SectionView;

// ──────────────────── canned HTTP service ────────────────────

/// Serve `requests` connections, each answered with `status` and `body`.
/// Returns the base URL to put in `[api] base_url` and a handle yielding
/// every request line received.
pub fn serve_json(
    status: &'static str,
    body: &'static str,
    requests: usize,
) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind canned service");
    let base = format!("http://{}/api", listener.local_addr().expect("local addr"));
    let handle = thread::spawn(move || {
        let mut seen = Vec::with_capacity(requests);
        for _ in 0..requests {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).expect("request line");
            seen.push(line.trim_end().to_string());
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).expect("header") == 0 || header == "\r\n" {
                    break;
                }
            }
            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
        }
        seen
    });
    (base, handle)
}

/// A base URL nothing listens on.
pub fn closed_base_url() -> String {
    let port = TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("reserve free port")
        .port();
    format!("http://127.0.0.1:{port}/api")
}

// ──────────────────── binary runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_ldk") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "ldk.exe" } else { "ldk" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve ldk binary path for integration test"),
    }
}

const LDK_ENV: [&str; 11] = [
    "LDK_API_BASE_URL",
    "LDK_API_TIMEOUT_SECS",
    "LDK_USER",
    "LDK_REFRESH_POLL_INTERVAL_MS",
    "LDK_REFRESH_DEBOUNCE_MS",
    "LDK_REFRESH_HIGHLIGHT_MS",
    "LDK_NOTIFICATIONS_CHECK_INTERVAL_MS",
    "LDK_NOTIFICATIONS_DISMISS_AFTER_MS",
    "LDK_NOTIFICATIONS_ENABLED",
    "LDK_ACTIVITY_LOG",
    "LDK_OUTPUT_FORMAT",
];

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("ldk-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command.args(args).env("RUST_BACKTRACE", "1");
    for name in LDK_ENV {
        command.env_remove(name);
    }
    let output = command.output().expect("execute ldk command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

// ──────────────────── fake service ────────────────────

#[derive(Default)]
pub struct FakeService {
    pub lists: HashMap<String, ApiResponse<Vec<ApplicationRecord>>>,
    pub counts: ApplicationCounts,
    pub user_count: u64,
    pub details: HashMap<String, ApiResponse<ApplicationDetail>>,
    /// When set, every call fails with a transport error.
    pub offline: bool,
    pub calls: Vec<String>,
}

/// In-memory [`ApplicationApi`] whose responses tests change between fetches.
#[derive(Clone, Default)]
pub struct FakeApi {
    pub state: Arc<Mutex<FakeService>>,
}

impl FakeApi {
    pub fn set_list(&self, stage: Stage, records: Vec<ApplicationRecord>) {
        self.state
            .lock()
            .lists
            .insert(stage.as_str().to_string(), ApiResponse::ok(records));
    }

    pub fn fail_list(&self, stage: Stage, message: &str) {
        self.state
            .lock()
            .lists
            .insert(stage.as_str().to_string(), ApiResponse::failed(message));
    }

    pub fn set_counts(&self, counts: ApplicationCounts) {
        self.state.lock().counts = counts;
    }

    pub fn set_user_count(&self, count: u64) {
        self.state.lock().user_count = count;
    }

    pub fn set_detail(&self, app_number: &str, response: ApiResponse<ApplicationDetail>) {
        self.state
            .lock()
            .details
            .insert(app_number.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: String) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call.clone());
        if state.offline {
            return Err(DeskError::Transport {
                endpoint: call,
                details: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

impl ApplicationApi for FakeApi {
    fn login(&self, name: &str) -> Result<LoginResponse> {
        self.record(format!("login {name}"))?;
        Ok(LoginResponse {
            success: true,
            user: Some(LoginUser {
                role: Some("Approver".to_string()),
                level: Some(4),
            }),
            message: None,
        })
    }

    fn fetch_applications(&self, stage: &Stage) -> Result<ApiResponse<Vec<ApplicationRecord>>> {
        self.record(format!("applications {stage}"))?;
        Ok(self
            .state
            .lock()
            .lists
            .get(stage.as_str())
            .cloned()
            .unwrap_or_else(|| ApiResponse::ok(Vec::new())))
    }

    fn fetch_application_counts(&self) -> Result<ApiResponse<ApplicationCounts>> {
        self.record("counts".to_string())?;
        Ok(ApiResponse::ok(self.state.lock().counts))
    }

    fn fetch_user_pending_count(&self, user: &str) -> Result<UserPendingCount> {
        self.record(format!("pending-count {user}"))?;
        Ok(UserPendingCount {
            count: self.state.lock().user_count,
        })
    }

    fn fetch_application_details(
        &self,
        app_number: &str,
        user: &str,
    ) -> Result<ApiResponse<ApplicationDetail>> {
        self.record(format!("details {app_number} {user}"))?;
        Ok(self
            .state
            .lock()
            .details
            .get(app_number)
            .cloned()
            .unwrap_or_else(|| ApiResponse {
                success: false,
                data: None,
                message: None,
            }))
    }

    fn list_users(&self) -> Result<ApiResponse<Vec<UserAccount>>> {
        self.record("users".to_string())?;
        Ok(ApiResponse::ok(Vec::new()))
    }

    fn add_user(&self, user: &NewUser) -> Result<ApiResponse<Value>> {
        self.record(format!("add-user {}", user.name))?;
        Ok(ApiResponse::ok(Value::Null))
    }

    fn delete_user(&self, name: &str) -> Result<ApiResponse<Value>> {
        self.record(format!("delete-user {name}"))?;
        Ok(ApiResponse::ok(Value::Null))
    }
}

// ──────────────────── recording host ────────────────────

/// Everything the controller told its collaborators.
#[derive(Default)]
pub struct HostLog {
    pub sections: Vec<(Section, SectionView)>,
    pub badges: Option<BadgeBoard>,
    pub actives: Vec<Section>,
    pub toasts: Vec<(ToastLevel, String)>,
    pub forms: Vec<Option<String>>,
    pub detail_views: Vec<String>,
    pub notifications: Vec<(NotificationId, DesktopNotification)>,
    pub closed: Vec<NotificationId>,
    pub focused: usize,
}

impl HostLog {
    /// Last view published for `section`.
    pub fn last_view(&self, section: Section) -> Option<&SectionView> {
        self.sections
            .iter()
            .rev()
            .find(|(s, _)| *s == section)
            .map(|(_, view)| view)
    }

    pub fn toast_messages(&self) -> Vec<&str> {
        self.toasts.iter().map(|(_, m)| m.as_str()).collect()
    }
}

pub type SharedLog = Arc<Mutex<HostLog>>;

struct RecordingView(SharedLog);

impl ViewSink for RecordingView {
    fn section_changed(&mut self, section: Section, view: &SectionView) {
        self.0.lock().sections.push((section, view.clone()));
    }

    fn badges_changed(&mut self, badges: &BadgeBoard) {
        self.0.lock().badges = Some(badges.clone());
    }

    fn active_section_changed(&mut self, section: Section) {
        self.0.lock().actives.push(section);
    }
}

struct RecordingModals {
    log: SharedLog,
    fail: bool,
}

impl ModalHost for RecordingModals {
    fn open_new_application(&mut self, app_number: Option<&str>) -> Result<()> {
        if self.fail {
            return Err(DeskError::Collaborator {
                collaborator: "modal host",
                details: "form template missing".to_string(),
            });
        }
        self.log.lock().forms.push(app_number.map(str::to_string));
        Ok(())
    }

    fn open_application_view(&mut self, detail: &ApplicationDetail) -> Result<()> {
        if self.fail {
            return Err(DeskError::Collaborator {
                collaborator: "modal host",
                details: "view template missing".to_string(),
            });
        }
        self.log.lock().detail_views.push(detail.app_number.clone());
        Ok(())
    }
}

struct RecordingToasts(SharedLog);

impl ToastSink for RecordingToasts {
    fn toast(&mut self, level: ToastLevel, message: &str) {
        self.0.lock().toasts.push((level, message.to_string()));
    }
}

struct FakeNotifier {
    log: SharedLog,
    permission: Permission,
    next_id: u64,
}

impl Notifier for FakeNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn request_permission(&mut self) -> Permission {
        if self.permission == Permission::Default {
            self.permission = Permission::Granted;
        }
        self.permission
    }

    fn show(&mut self, notification: &DesktopNotification) -> Result<NotificationId> {
        self.next_id += 1;
        let id = NotificationId(self.next_id);
        self.log.lock().notifications.push((id, notification.clone()));
        Ok(id)
    }

    fn close(&mut self, id: NotificationId) {
        self.log.lock().closed.push(id);
    }

    fn focus_window(&mut self) {
        self.log.lock().focused += 1;
    }
}

// ──────────────────── composition ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modals {
    Absent,
    Working,
    Failing,
}

#[derive(Debug, Clone, Copy)]
pub struct HostOptions {
    pub modals: Modals,
    pub toasts: bool,
    /// `None` composes without a notifier.
    pub notifier: Option<Permission>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            modals: Modals::Working,
            toasts: true,
            notifier: Some(Permission::Granted),
        }
    }
}

pub fn collaborators(options: HostOptions) -> (Collaborators, SharedLog) {
    let log: SharedLog = Arc::new(Mutex::new(HostLog::default()));
    let mut host = Collaborators::new(Box::new(RecordingView(Arc::clone(&log))));
    match options.modals {
        Modals::Absent => {}
        Modals::Working | Modals::Failing => {
            host = host.with_modals(Box::new(RecordingModals {
                log: Arc::clone(&log),
                fail: options.modals == Modals::Failing,
            }));
        }
    }
    if options.toasts {
        host = host.with_toasts(Box::new(RecordingToasts(Arc::clone(&log))));
    }
    if let Some(permission) = options.notifier {
        host = host.with_notifier(Box::new(FakeNotifier {
            log: Arc::clone(&log),
            permission,
            next_id: 0,
        }));
    }
    (host, log)
}

pub struct Harness {
    pub ctl: Controller,
    pub api: FakeApi,
    pub host: SharedLog,
}

pub fn harness_with(options: HostOptions, log: ActivityLoggerHandle) -> Harness {
    let (host, shared) = collaborators(options);
    Harness {
        ctl: Controller::new(ControllerSettings::default(), host, log),
        api: FakeApi::default(),
        host: shared,
    }
}

pub fn harness() -> Harness {
    harness_with(HostOptions::default(), ActivityLoggerHandle::discard())
}

/// Default host, custom timing.
pub fn harness_timed(settings: ControllerSettings) -> Harness {
    let (host, shared) = collaborators(HostOptions::default());
    Harness {
        ctl: Controller::new(settings, host, ActivityLoggerHandle::discard()),
        api: FakeApi::default(),
        host: shared,
    }
}

pub fn approver(name: &str) -> Session {
    Session {
        user: name.to_string(),
        role: Some("Approver".to_string()),
        level: Some(4),
    }
}

pub fn keys(view: &SectionView) -> Vec<String> {
    view.rows().iter().map(|row| row.key.clone()).collect()
}
