use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tempfile::tempdir;
use zenith_core::advisor::{Advisor, AdvisorSettings, SubtaskGenerator, SubtaskRequest, Suggestions};
use zenith_core::checklist::StatusPolicy;
use zenith_core::cli::{AddArgs, Command};
use zenith_core::commands::{CommandEnv, dispatch};
use zenith_core::config::Config;
use zenith_core::datastore::SlotStore;
use zenith_core::error::AdvisorResult;
use zenith_core::render::Renderer;
use zenith_core::store::{DEFAULT_STORAGE_KEY, LoadOutcome, TaskStore};
use zenith_core::task::{Status, Task, TaskPatch};

struct FixedPlan {
    calls: AtomicUsize,
}

#[async_trait]
impl SubtaskGenerator for FixedPlan {
    async fn generate(&self, request: &SubtaskRequest) -> AdvisorResult<Suggestions> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Suggestions {
            items: vec![format!("Outline {}", request.title), "Review".to_string()],
            tokens: 42,
        })
    }
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 9, 9, 30, 0)
        .single()
        .expect("valid now")
}

fn configured_advisor(generator: Arc<FixedPlan>) -> Advisor {
    let settings = AdvisorSettings {
        api_key: Some("test-key".to_string()),
        ..AdvisorSettings::default()
    };
    Advisor::new(settings, generator)
}

fn run(store: &mut TaskStore, advisor: &Advisor, command: Command) -> String {
    let cfg = Config::default();
    let renderer = Renderer::plain();
    let mut out = Vec::new();
    {
        let mut env = CommandEnv {
            store,
            cfg: &cfg,
            renderer: &renderer,
            advisor,
            out: &mut out,
        };
        dispatch(&mut env, Some(command), now()).expect("command should succeed");
    }
    String::from_utf8(out).expect("utf8 output")
}

#[test]
fn empty_slot_opens_as_empty_store() {
    let temp = tempdir().expect("tempdir");
    let slots = SlotStore::open(temp.path()).expect("open slots");
    let store = TaskStore::open(slots, DEFAULT_STORAGE_KEY);

    assert!(store.list().is_empty());
    assert_eq!(store.load_outcome(), &LoadOutcome::Missing);
    assert!(store.search("").is_empty());
}

#[test]
fn saved_tasks_survive_reopen() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(
        SlotStore::open(temp.path()).expect("open slots"),
        DEFAULT_STORAGE_KEY,
    );

    let first = store
        .save(TaskPatch::titled("Wash the car"), now())
        .expect("save first");
    let mut patch = TaskPatch::titled("Plan trip");
    patch.description = Some("- [ ] wash\n- [ ] dry".to_string());
    let second = store.save(patch, now()).expect("save second");

    store
        .toggle_checklist(&second.id, 1, StatusPolicy::DeriveFromChecklist)
        .expect("toggle");

    let reopened = TaskStore::open(
        SlotStore::open(temp.path()).expect("reopen slots"),
        DEFAULT_STORAGE_KEY,
    );
    assert_eq!(reopened.load_outcome(), &LoadOutcome::Loaded(2));
    assert_eq!(reopened.list()[0].id, second.id);
    assert_eq!(reopened.list()[1].id, first.id);

    let trip = reopened.get(&second.id).expect("trip present");
    assert_eq!(trip.description, "- [ ] wash\n- [x] dry");
    assert_eq!(trip.status, Status::InProgress);
    assert_eq!(reopened.search("").len(), 2);
    assert_eq!(reopened.search("WASH").len(), 2);
}

#[test]
fn add_with_plan_then_check_items() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(
        SlotStore::open(temp.path()).expect("open slots"),
        DEFAULT_STORAGE_KEY,
    );
    let generator = Arc::new(FixedPlan {
        calls: AtomicUsize::new(0),
    });
    let advisor = configured_advisor(generator.clone());

    let output = run(
        &mut store,
        &advisor,
        Command::Add(AddArgs {
            title: vec!["Quarterly".to_string(), "report".to_string()],
            priority: Some("high".to_string()),
            due: Some("tomorrow".to_string()),
            plan: true,
            ..AddArgs::default()
        }),
    );
    assert!(output.starts_with("Created task "));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    let task: Task = store.list()[0].clone();
    assert_eq!(task.description, "- [ ] Outline Quarterly report\n- [ ] Review");
    assert_eq!(task.tokens_used, Some(42));
    assert_eq!(task.due_date.to_string(), "2026-03-10");

    run(
        &mut store,
        &advisor,
        Command::Check {
            id: task.id[..8].to_string(),
            index: 0,
        },
    );
    let output = run(
        &mut store,
        &advisor,
        Command::Check {
            id: task.id.clone(),
            index: 1,
        },
    );
    assert!(output.contains("\"Review\" is done"));
    assert_eq!(store.get(&task.id).expect("task").status, Status::Done);

    let info = run(&mut store, &advisor, Command::Show { id: task.id.clone() });
    assert!(info.contains("progress  [##########] 2/2 (100%)"));
    assert!(info.contains("ai tokens 42"));
}

#[test]
fn unconfigured_advisor_leaves_task_untouched() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(
        SlotStore::open(temp.path()).expect("open slots"),
        DEFAULT_STORAGE_KEY,
    );
    let generator = Arc::new(FixedPlan {
        calls: AtomicUsize::new(0),
    });
    let advisor = Advisor::new(AdvisorSettings::default(), generator.clone());
    let task = store
        .save(TaskPatch::titled("Taxes"), now())
        .expect("save");

    let cfg = Config::default();
    let renderer = Renderer::plain();
    let mut out = Vec::new();
    let mut env = CommandEnv {
        store: &mut store,
        cfg: &cfg,
        renderer: &renderer,
        advisor: &advisor,
        out: &mut out,
    };
    let err = dispatch(
        &mut env,
        Some(Command::Suggest {
            id: task.id.clone(),
            apply: true,
        }),
        now(),
    )
    .expect_err("suggest must fail without a key");

    assert!(format!("{err:#}").contains("not configured"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.get(&task.id), Some(&task));
}

#[test]
fn export_prints_camel_case_json() {
    let temp = tempdir().expect("tempdir");
    let mut store = TaskStore::open(
        SlotStore::open(temp.path()).expect("open slots"),
        DEFAULT_STORAGE_KEY,
    );
    let advisor = Advisor::new(
        AdvisorSettings::default(),
        Arc::new(FixedPlan {
            calls: AtomicUsize::new(0),
        }),
    );
    store
        .save(TaskPatch::titled("Export me"), now())
        .expect("save");

    let output = run(&mut store, &advisor, Command::Export);
    let value: serde_json::Value = serde_json::from_str(&output).expect("json");
    assert_eq!(value[0]["title"], "Export me");
    assert_eq!(value[0]["dueDate"], "2026-03-09");
    assert_eq!(value[0]["status"], "todo");
}
