//! Subcommand implementations

use crate::cli::{Command, DrawArgs, FolderCommand, InboxCommand, SlideshowArgs};
use anyhow::{anyhow, bail, Context, Result};
use app_core::{
    parse_sample, AppConfig, AppState, DrawEngine, DrawPhase, DrawSnapshot, ImageSource, ManagedFolder,
    ShakeDetector, Slideshow,
};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::watch;

pub async fn run(command: Command, config: AppConfig, runtime: Handle) -> Result<()> {
    let state = AppState::open(config, runtime.clone()).context("open application state")?;

    match command {
        Command::Folders(command) => folders(&state, command).await,
        Command::Draw(args) => draw(&state, &args).await,
        Command::Restore => restore(&state).await,
        Command::Slideshow(args) => slideshow(&state, &args, &runtime).await,
        Command::Shake => shake(&state).await,
        Command::Inbox(command) => inbox(&state, command).await,
        Command::Reset => {
            state.clear_all_data();
            println!("Last result cleared");
            Ok(())
        }
    }
}

async fn folders(state: &AppState, command: FolderCommand) -> Result<()> {
    match command {
        FolderCommand::List => {
            state.registry().validate_access();
            state.registry().refresh_folder_counts().await;
            print_folders(state);
        }
        FolderCommand::Add { paths } => {
            let added = state.add_folder_paths(&paths).await;
            println!("Added {} folder(s)", added);
            print_folders(state);
        }
        FolderCommand::Remove { indices } => {
            let removed = state.remove_folders(&indices).await;
            println!("Removed {} folder(s)", removed);
        }
        FolderCommand::Include { index } => {
            let folder = folder_at(state, index)?;
            state.set_include(folder.id, true).await;
            println!("{} takes part in draws", folder.name());
        }
        FolderCommand::Exclude { index } => {
            let folder = folder_at(state, index)?;
            state.set_include(folder.id, false).await;
            println!("{} is excluded from draws", folder.name());
        }
        FolderCommand::Clear => {
            let removed = state.clear_folders().await;
            println!("Removed {} folder(s)", removed);
        }
    }
    Ok(())
}

fn folder_at(state: &AppState, index: usize) -> Result<ManagedFolder> {
    state
        .registry()
        .folders()
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow!("no folder at index {}", index))
}

fn print_folders(state: &AppState) {
    let registry = state.registry();
    let counts = registry.folder_counts();
    let folders = registry.folders();

    if folders.is_empty() {
        println!("No folders yet. Add one with `shakedraw folders add <DIR>`.");
        return;
    }

    for (index, folder) in folders.iter().enumerate() {
        let mark = if folder.include_in_draw { "x" } else { " " };
        let count = counts
            .get(&folder.id)
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        println!(
            "{:>3} [{}] {:<24} {:>6}  {}",
            index,
            mark,
            folder.name(),
            count,
            folder.last_resolved_path
        );
    }
}

/// Launch sequence shared by the drawing commands
async fn prepare(state: &AppState) -> Result<()> {
    state.startup().await;
    state.engine().settled().await;

    if !state.engine().can_draw() {
        bail!("Nothing to draw: add a folder with images first (`shakedraw folders add <DIR>`)");
    }
    Ok(())
}

async fn draw(state: &AppState, args: &DrawArgs) -> Result<()> {
    prepare(state).await?;

    let engine = state.engine();
    for _ in 0..args.times.max(1) {
        let snapshot = draw_once(engine).await?;
        print_result(&snapshot);
    }
    Ok(())
}

async fn draw_once(engine: &DrawEngine) -> Result<DrawSnapshot> {
    if !engine.perform_random_draw() {
        bail!("Nothing left to draw");
    }
    engine.settled().await;
    Ok(engine.snapshot())
}

async fn restore(state: &AppState) -> Result<()> {
    state.startup().await;
    state.engine().settled().await;

    let snapshot = state.engine().snapshot();
    if snapshot.current_source() == Some(ImageSource::Full) {
        print_result(&snapshot);
    } else {
        println!("No last result to restore");
    }
    Ok(())
}

async fn slideshow(state: &AppState, args: &SlideshowArgs, runtime: &Handle) -> Result<()> {
    prepare(state).await?;

    let interval = match args.interval {
        Some(seconds) if seconds > 0.0 => Duration::from_secs_f64(seconds),
        Some(seconds) => bail!("invalid interval: {}", seconds),
        None => state.config().slideshow.interval(),
    };

    let printer = runtime.spawn(print_reveals(state.engine().subscribe()));

    let mut slideshow = Slideshow::new(state.engine().clone(), interval);
    if let Some(count) = args.count {
        slideshow = slideshow.max_draws(count);
    }
    let handle = slideshow.start(runtime);

    let control = handle.control();
    let interrupt = runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            control.stop();
        }
    });

    let draws = handle.join().await;
    interrupt.abort();
    printer.abort();

    println!("Slideshow ended after {} draw(s)", draws);
    Ok(())
}

/// Print every full-resolution reveal
async fn print_reveals(mut updates: watch::Receiver<DrawSnapshot>) {
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.phase == (DrawPhase::Revealing { source: ImageSource::Full }) {
            print_result(&snapshot);
        }
    }
}

async fn shake(state: &AppState) -> Result<()> {
    prepare(state).await?;

    let engine = state.engine();
    let mut detector = ShakeDetector::new(&state.config().shake);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Waiting for samples (x y z per line)...");
    while let Some(line) = lines.next_line().await? {
        let Some(sample) = parse_sample(&line) else {
            tracing::warn!("Ignoring malformed sample: {:?}", line);
            continue;
        };

        if !detector.on_sample(sample, Instant::now()) {
            continue;
        }

        let snapshot = draw_once(engine).await?;
        print_result(&snapshot);
    }
    Ok(())
}

async fn inbox(state: &AppState, command: InboxCommand) -> Result<()> {
    let Some(inbox) = state.inbox() else {
        bail!("The shared container is disabled in the configuration");
    };

    match command {
        InboxCommand::Import { files } => {
            for file in &files {
                let saved = state
                    .import_shared_file(file)
                    .await
                    .with_context(|| format!("import {}", file.display()))?;
                println!("{} -> {}", file.display(), saved.display());
            }
        }
        InboxCommand::List => {
            let items = inbox.list()?;
            if items.is_empty() {
                println!("The shared container is empty");
            }
            for item in items {
                let created = item
                    .created
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{:<16} {:>10}  {}", created, item.size, item.file_name);
            }
            println!("Total: {} byte(s) in {}", inbox.total_size()?, inbox.root().display());
        }
        InboxCommand::Delete { files } => {
            let paths: Vec<_> = files
                .iter()
                .map(|f| if f.is_absolute() { f.clone() } else { inbox.root().join(f) })
                .collect();
            let deleted = state.delete_shared(&paths).await?;
            println!("Deleted {} image(s)", deleted);
        }
    }
    Ok(())
}

fn print_result(snapshot: &DrawSnapshot) {
    match &snapshot.current {
        Some(shown) => {
            let locator = shown
                .locator
                .as_ref()
                .map_or_else(|| "(unknown)".to_string(), |l| l.to_string());
            println!("{}  [{}x{}]", locator, shown.image.width, shown.image.height);
        }
        None => println!("No image revealed"),
    }
}
