use std::future::Future;
use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::advisor::{Advisor, Suggestions};
use crate::checklist::{self, StatusPolicy};
use crate::cli::{AddArgs, Command, EditArgs, ListArgs};
use crate::config::Config;
use crate::datetime::{parse_due_date, parse_year_month};
use crate::projection::{CalendarMonth, group_by_due_date, group_by_status};
use crate::render::Renderer;
use crate::session::{EditContext, View, ViewState};
use crate::store::TaskStore;
use crate::task::{Priority, Status, Task, TaskPatch};

/// Everything a command needs besides its own arguments.
pub struct CommandEnv<'a, W: Write> {
    pub store: &'a mut TaskStore,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub advisor: &'a Advisor,
    pub out: W,
}

#[instrument(skip(ctx, command, now))]
pub fn dispatch<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    command: Option<Command>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::View { name: None });
    debug!(?command, "dispatching command");

    match command {
        Command::Add(args) => cmd_add(ctx, args, now),
        Command::Edit(args) => cmd_edit(ctx, args, now),
        Command::List(args) => cmd_list(ctx, args, now),
        Command::Search { query } => cmd_search(ctx, &query.join(" "), now),
        Command::Board { query } => cmd_board(ctx, &query.join(" ")),
        Command::Calendar { month } => cmd_calendar(ctx, month.as_deref(), now),
        Command::Show { id } => cmd_show(ctx, &id),
        Command::Check { id, index } => cmd_check(ctx, &id, index),
        Command::Suggest { id, apply } => cmd_suggest(ctx, &id, apply),
        Command::Export => cmd_export(ctx),
        Command::View { name } => cmd_view(ctx, name.as_deref(), now),
    }
}

#[instrument(skip(ctx, args, now))]
fn cmd_add<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    args: AddArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");
    let today = now.date_naive();

    let mut draft = EditContext::for_new(today);
    draft.title = args.title.join(" ");
    if let Some(description) = args.description {
        draft.description = description;
    }
    if let Some(status) = args.status.as_deref() {
        draft.status = status.parse::<Status>()?;
    }
    if let Some(priority) = args.priority.as_deref() {
        draft.priority = priority.parse::<Priority>()?;
    }
    if let Some(due) = args.due.as_deref() {
        draft.due_date = parse_due_date(due, today)?;
    }

    if args.plan {
        request_suggestions(ctx.advisor, &mut draft)?;
        if let Some(err) = draft.last_error() {
            warn!(error = %err, "saving task without a plan");
            writeln!(ctx.out, "AI suggestions unavailable: {err}")?;
        } else {
            let added = draft.accept_suggestions();
            debug!(added, "plan merged into description");
        }
    }

    let tokens = draft.tokens();
    let mut task = ctx.store.save(draft.into_patch(), now)?;
    if tokens > 0 {
        task = ctx.store.record_tokens(&task.id, tokens)?;
    }

    writeln!(ctx.out, "Created task {}.", short_id(&task.id))?;
    Ok(())
}

#[instrument(skip(ctx, args, now))]
fn cmd_edit<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    args: EditArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command edit");
    let id = resolve_id(ctx.store, &args.id)?;

    if args.title.is_none()
        && args.description.is_none()
        && args.status.is_none()
        && args.priority.is_none()
        && args.due.is_none()
    {
        return Err(anyhow!("nothing to change; pass at least one field"));
    }

    let mut patch = TaskPatch::for_id(id);
    patch.title = args.title;
    patch.description = args.description;
    patch.status = args.status.as_deref().map(str::parse::<Status>).transpose()?;
    patch.priority = args
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()?;
    patch.due_date = args
        .due
        .as_deref()
        .map(|due| parse_due_date(due, now.date_naive()))
        .transpose()?;

    let task = ctx.store.save(patch, now)?;
    writeln!(ctx.out, "Modified task {}.", short_id(&task.id))?;
    Ok(())
}

#[instrument(skip(ctx, args, now))]
fn cmd_list<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    args: ListArgs,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");
    let today = now.date_naive();

    let mut tasks: Vec<&Task> = match args.status.as_deref() {
        Some(status) => ctx.store.by_status(status.parse::<Status>()?),
        None => ctx.store.list().iter().collect(),
    };
    if let Some(due) = args.due.as_deref() {
        tasks = group_by_due_date(tasks, parse_due_date(due, today)?);
    }

    write_table_or_empty(ctx.renderer, &mut ctx.out, &tasks, today)
}

#[instrument(skip(ctx, now))]
fn cmd_search<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    query: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command search");
    let state = ViewState::new(View::List).with_query(query);
    let tasks = state.visible(ctx.store);
    write_table_or_empty(ctx.renderer, &mut ctx.out, &tasks, now.date_naive())
}

#[instrument(skip(ctx))]
fn cmd_board<W: Write>(ctx: &mut CommandEnv<'_, W>, query: &str) -> anyhow::Result<()> {
    info!("command board");
    let state = ViewState::new(View::Board).with_query(query);
    let board = group_by_status(state.visible(ctx.store));
    ctx.renderer.write_board(&mut ctx.out, &board)
}

#[instrument(skip(ctx, now))]
fn cmd_calendar<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    month: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command calendar");
    let today = now.date_naive();
    let (year, month) = match month {
        Some(raw) => parse_year_month(raw)?,
        None => (today.year(), today.month()),
    };

    let grid = CalendarMonth::build(year, month, ctx.store.list())
        .ok_or_else(|| anyhow!("month out of range: {year:04}-{month:02}"))?;
    ctx.renderer.write_calendar(&mut ctx.out, &grid, today)
}

#[instrument(skip(ctx))]
fn cmd_show<W: Write>(ctx: &mut CommandEnv<'_, W>, id: &str) -> anyhow::Result<()> {
    info!("command show");
    let id = resolve_id(ctx.store, id)?;
    let task = ctx
        .store
        .get(&id)
        .ok_or_else(|| anyhow!("task not found: {id}"))?;
    ctx.renderer.write_task_info(&mut ctx.out, task)
}

#[instrument(skip(ctx))]
fn cmd_check<W: Write>(ctx: &mut CommandEnv<'_, W>, id: &str, index: usize) -> anyhow::Result<()> {
    info!("command check");
    let id = resolve_id(ctx.store, id)?;
    let policy = StatusPolicy::from_flag(ctx.cfg.get_bool("checklist.autostatus").unwrap_or(true));

    let total = ctx
        .store
        .get(&id)
        .map(|task| checklist::parse(&task.description).len())
        .unwrap_or(0);
    if index >= total {
        return Err(anyhow!(
            "task {} has {total} checklist item(s); index {index} does not exist",
            short_id(&id)
        ));
    }

    let task = ctx.store.toggle_checklist(&id, index, policy)?;
    let items = checklist::parse(&task.description);
    let Some(item) = items.get(index) else {
        return Err(anyhow!("checklist item {index} vanished after toggle"));
    };

    let state = if item.done { "done" } else { "open" };
    writeln!(
        ctx.out,
        "Item {index} \"{}\" is {state}; task {} is {}.",
        item.text,
        short_id(&task.id),
        task.status
    )?;
    Ok(())
}

#[instrument(skip(ctx))]
fn cmd_suggest<W: Write>(ctx: &mut CommandEnv<'_, W>, id: &str, apply: bool) -> anyhow::Result<()> {
    info!("command suggest");
    let id = resolve_id(ctx.store, id)?;
    let task = ctx
        .store
        .get(&id)
        .ok_or_else(|| anyhow!("task not found: {id}"))?;

    let mut draft = EditContext::for_task(task);
    request_suggestions(ctx.advisor, &mut draft)?;
    if let Some(err) = draft.last_error() {
        return Err(anyhow::Error::new(err.clone()).context("subtask suggestion failed"));
    }

    let suggestions = Suggestions {
        items: draft.suggestions().to_vec(),
        tokens: draft.tokens(),
    };
    ctx.renderer.write_suggestions(&mut ctx.out, &suggestions)?;

    if apply {
        let task = ctx
            .store
            .apply_suggestions(&id, &suggestions.items, suggestions.tokens)?;
        writeln!(
            ctx.out,
            "Added {} checklist item(s) to task {}.",
            suggestions.items.len(),
            short_id(&task.id)
        )?;
    } else if suggestions.tokens > 0 {
        ctx.store.record_tokens(&id, suggestions.tokens)?;
    }
    Ok(())
}

#[instrument(skip(ctx))]
fn cmd_export<W: Write>(ctx: &mut CommandEnv<'_, W>) -> anyhow::Result<()> {
    info!("command export");
    let payload =
        serde_json::to_string_pretty(ctx.store.list()).context("failed to serialize tasks")?;
    writeln!(ctx.out, "{payload}")?;
    Ok(())
}

#[instrument(skip(ctx, now))]
fn cmd_view<W: Write>(
    ctx: &mut CommandEnv<'_, W>,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let view = match name {
        Some(name) => name.parse::<View>()?,
        None => ctx
            .cfg
            .get("default.view")
            .map(|raw| raw.parse::<View>())
            .transpose()?
            .unwrap_or_default(),
    };
    debug!(%view, "rendering view");

    match view {
        View::Board => cmd_board(ctx, ""),
        View::List => cmd_list(ctx, ListArgs::default(), now),
        View::Calendar => cmd_calendar(ctx, None, now),
    }
}

/// Runs one advisor call for the draft, blocking on a local runtime.
fn request_suggestions(advisor: &Advisor, draft: &mut EditContext) -> anyhow::Result<()> {
    if !draft.begin_suggest() {
        return Err(anyhow!("a title is required to suggest subtasks"));
    }
    let result = block_on(advisor.suggest(&draft.title, &draft.description))?;
    draft.finish_suggest(result);
    Ok(())
}

fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

fn write_table_or_empty<W: Write>(
    renderer: &Renderer,
    out: &mut W,
    tasks: &[&Task],
    today: NaiveDate,
) -> anyhow::Result<()> {
    if tasks.is_empty() {
        writeln!(out, "No matches.")?;
        return Ok(());
    }
    renderer.write_task_table(out, tasks, today)?;
    writeln!(out)?;
    writeln!(out, "{} task(s)", tasks.len())?;
    Ok(())
}

/// Accepts a full id or an unambiguous prefix of one.
fn resolve_id(store: &TaskStore, token: &str) -> anyhow::Result<String> {
    let token = token.trim();
    if token.is_empty() {
        return Err(anyhow!("task id cannot be empty"));
    }
    if let Some(task) = store.get(token) {
        return Ok(task.id.clone());
    }

    let mut matches = store.list().iter().filter(|task| task.id.starts_with(token));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no task matches id {token}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("id prefix {token} is ambiguous"));
    }
    Ok(first.id.clone())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
