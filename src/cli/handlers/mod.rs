use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{info, warn};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::document::insert_at_line;
use crate::io::remote::{RemoteClient, TaskService};
use crate::io::vault::FsVault;
use crate::io::watcher::DocumentWatcher;
use crate::model::config::{Settings, TodayFilter};
use crate::model::record::{CategoryRecord, ItemKind};
use crate::ops::add_task::{AddTaskError, add_task, build_new_task, resolve_choice};
use crate::ops::format::Formatter;
use crate::ops::hierarchy::CategoryIndex;
use crate::ops::mirror::Mirror;
use crate::util::ticker::{Ticker, next_notice_frame};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

const WATCH_POLL: Duration = Duration::from_millis(200);
const NOTICE_FRAME: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(config_io::default_config_path);

    // Editing the file must work even when it no longer loads.
    if let Commands::Config(cmd) = cli.command {
        return cmd_config(cmd, &config_path, json);
    }

    let settings = config_io::load_settings(&config_path)?;
    match cli.command {
        Commands::Sync => cmd_sync(&settings, json),
        Commands::Today(args) => cmd_today(args, &settings, json),
        Commands::Add(args) => cmd_add(args, &settings, json),
        Commands::Done(args) => cmd_done(args, &settings, json),
        Commands::Categories => cmd_categories(&settings, json),
        Commands::Watch(args) => cmd_watch(args, &settings, json),
        Commands::Config(_) => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fetch_categories(client: &RemoteClient) -> Result<Vec<CategoryRecord>, Box<dyn std::error::Error>> {
    Ok(client
        .categories()?
        .into_iter()
        .filter_map(CategoryRecord::from_raw)
        .collect())
}

/// Print generated markdown, or insert it into a file before the given
/// 1-based line.
fn emit_block(markdown: String, insert: &InsertArgs, json: bool) -> CmdResult {
    if let Some(file) = &insert.into {
        let line = insert.line.map(|n| n.saturating_sub(1));
        insert_at_line(Path::new(file), line, &markdown)
            .map_err(|e| format!("could not insert into {}: {}", file, e))?;
        if json {
            let out = BlockJson {
                markdown,
                inserted_into: Some(file.clone()),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            println!("inserted {} line(s) into {}", markdown.lines().count(), file);
        }
        return Ok(());
    }

    if json {
        let out = BlockJson {
            markdown,
            inserted_into: None,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", markdown);
    }
    Ok(())
}

fn parse_date(value: Option<&str>) -> Result<NaiveDate, String> {
    match value {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", s)),
    }
}

/// Repaints `Syncing...` on stderr until stopped. Only when stderr is a
/// terminal.
fn start_notice(label: &'static str) -> Option<Ticker> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let mut frame = "    ";
    eprint!("{}{}", label, frame);
    Some(Ticker::start(NOTICE_FRAME, move || {
        frame = next_notice_frame(frame);
        eprint!("\r{}{}", label, frame);
        let _ = std::io::stderr().flush();
    }))
}

fn clear_notice(notice: Option<Ticker>, label: &str) {
    if let Some(ticker) = notice {
        ticker.stop();
        eprint!("\r{}\r", " ".repeat(label.len() + 4));
    }
}

// ---------------------------------------------------------------------------
// Sync and import commands
// ---------------------------------------------------------------------------

fn cmd_sync(settings: &Settings, json: bool) -> CmdResult {
    let client = RemoteClient::from_settings(settings)?;
    let vault = FsVault::new(&settings.sync.vault_dir);
    let mirror = Mirror::new(&client, &vault, settings);

    const LABEL: &str = "Syncing";
    let notice = if json { None } else { start_notice(LABEL) };
    let report = mirror.sync();
    clear_notice(notice, LABEL);

    if json {
        println!("{}", serde_json::to_string_pretty(&sync_report_to_json(&report))?);
    } else {
        println!("{}", format_sync_report(&report));
    }
    Ok(())
}

fn cmd_today(args: TodayArgs, settings: &Settings, json: bool) -> CmdResult {
    let date = parse_date(args.date.as_deref())?;
    let filter = match args.show.as_deref() {
        Some(s) => TodayFilter::parse(s)
            .ok_or_else(|| format!("invalid --show '{}' (expected due, scheduled or both)", s))?,
        None => settings.today.tasks,
    };

    let client = RemoteClient::from_settings(settings)?;
    let vault = FsVault::new(&settings.sync.vault_dir);
    let markdown = Mirror::new(&client, &vault, settings).today(date, filter)?;
    emit_block(markdown, &args.insert, json)
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, settings: &Settings, json: bool) -> CmdResult {
    let text = args.text.join(" ");
    // Input errors surface before any remote call.
    if args.category.is_none() || text.trim().is_empty() {
        build_new_task(&text, None)?;
    }
    let selector = args.category.as_deref().unwrap_or_default();

    let client = RemoteClient::from_settings(settings)?;
    let records = if selector.trim().eq_ignore_ascii_case("inbox") {
        Vec::new()
    } else {
        fetch_categories(&client)?
    };
    let index = CategoryIndex::build(&records);
    let choice = resolve_choice(selector, &index)?;
    let task = build_new_task(&text, Some(&choice))?;

    let formatter = Formatter::new(&index, &settings.sync.base_dir, settings.format);
    match add_task(&client, &formatter, &task) {
        Ok(line) => emit_block(line, &args.insert, json),
        Err(AddTaskError::Remote(e)) => Err(format!(
            "could not add task ({}); add it manually at {}",
            e,
            client.links().app_url()
        )
        .into()),
        Err(e) => Err(e.into()),
    }
}

fn cmd_done(args: DoneArgs, settings: &Settings, json: bool) -> CmdResult {
    let client = RemoteClient::from_settings(settings)?;
    match client.mark_done(&args.id) {
        Ok(ack) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&ack)?);
            } else {
                println!("done {}", args.id);
            }
            Ok(())
        }
        Err(e) => Err(format!(
            "could not mark {} done ({}); open {} to finish it",
            args.id,
            e,
            client.links().for_item(ItemKind::Task, &args.id)
        )
        .into()),
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_categories(settings: &Settings, json: bool) -> CmdResult {
    let client = RemoteClient::from_settings(settings)?;
    let records = fetch_categories(&client)?;
    let index = CategoryIndex::build(&records);
    let entries = picker_to_json(&index);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            println!("{}", format_picker_line(entry));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Completion watcher
// ---------------------------------------------------------------------------

fn cmd_watch(args: WatchArgs, settings: &Settings, json: bool) -> CmdResult {
    let path = PathBuf::from(&args.file);
    let marking = args.mark_done || settings.watch.mark_done;
    let client = if marking {
        Some(RemoteClient::from_settings(settings)?)
    } else {
        None
    };

    let mut watcher = DocumentWatcher::start(&path, settings.watch.viewport_lines)
        .map_err(|e| format!("could not watch {}: {}", path.display(), e))?;
    if !json {
        eprintln!("watching {} (Ctrl-C to stop)", path.display());
    }

    loop {
        let completions = match watcher.poll() {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read watched file");
                Vec::new()
            }
        };

        for completion in completions {
            let line = watcher.snapshot()[..completion.line_start].matches('\n').count() + 1;
            if json {
                let out = CompletionJson {
                    item_id: completion.item_id.clone(),
                    line,
                    marking_done: client.is_some(),
                };
                println!("{}", serde_json::to_string(&out)?);
            } else {
                println!("checked {} (line {})", completion.item_id, line);
            }

            match &client {
                Some(client) => spawn_mark_done(client.clone(), completion.item_id),
                None => info!(item = %completion.item_id, "mark-done disabled, not sending"),
            }
        }

        thread::sleep(WATCH_POLL);
    }
}

/// Fire and forget. A failure leaves a notice with the item's link.
fn spawn_mark_done(client: RemoteClient, item_id: String) {
    thread::spawn(move || match client.mark_done(&item_id) {
        Ok(_) => info!(item = %item_id, "marked done"),
        Err(e) => eprintln!(
            "could not mark {} done ({}); open {} to finish it",
            item_id,
            e,
            client.links().for_item(ItemKind::Task, &item_id)
        ),
    });
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config(cmd: ConfigCmd, path: &Path, json: bool) -> CmdResult {
    match cmd.action {
        ConfigAction::Show => {
            let settings = config_io::load_settings(path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print!("{}", config_io::render_settings(&settings)?);
            }
        }
        ConfigAction::Set { key, value } => {
            config_io::set_value(path, &key, &value)?;
            println!("set {} = {}", key, value);
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}

