//! Command line front end for the relationship graph engine.
//!
//! Every command reads a project JSON file, and commands that change the
//! graph write it back in place:
//!
//! ```bash
//! compass baseline salt_road.json
//! compass advance salt_road.json
//! compass chart salt_road.json 12 --dark > chart.json
//! ```

use compass_core::chart::{ChartData, Theme};
use compass_core::persist::list_projects;
use compass_core::{run_audit, ChatGenerator, GraphBuilder, NovelProject, Progress, Snapshot};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let command = args[1].as_str();
    let path = PathBuf::from(&args[2]);
    let rest = &args[3..];

    match command {
        "baseline" => baseline(path, rest).await,
        "advance" => advance(path).await,
        "audit" => audit(path).await,
        "chapter-graph" => chapter_graph(path, rest).await,
        "show" => show(path, rest).await,
        "chart" => chart(path, rest).await,
        "list" => list(path).await,
        other => {
            eprintln!("Unknown command: {other}");
            print_help();
            std::process::exit(2);
        }
    }
}

fn print_progress(progress: &Progress) {
    eprintln!("[{}/{}] {}", progress.step, progress.total, progress.message);
}

/// First argument that parses as a chapter number.
fn chapter_arg(rest: &[String]) -> Option<u32> {
    rest.iter().find_map(|a| a.parse().ok())
}

async fn baseline(path: PathBuf, rest: &[String]) -> CliResult {
    let mut project = NovelProject::load_json(&path).await?;
    if project.graph_data.graph_generated && !rest.iter().any(|a| a == "--force") {
        eprintln!("Graph already generated. Use --force to rebuild it from scratch.");
        std::process::exit(1);
    }

    let generator = ChatGenerator::from_env()?;
    let builder = GraphBuilder::new(&generator).with_progress(print_progress);
    project.graph_data = builder.baseline(&project.material()).await?;
    project.touch();
    project.save_json(&path).await?;

    if let Some(baseline) = project.graph_data.baseline() {
        println!(
            "Baseline: {} nodes, {} edges",
            baseline.node_count(),
            baseline.edge_count()
        );
    }
    Ok(())
}

async fn advance(path: PathBuf) -> CliResult {
    let mut project = NovelProject::load_json(&path).await?;
    let generator = ChatGenerator::from_env()?;
    let builder = GraphBuilder::new(&generator).with_progress(print_progress);

    let report = builder
        .advance(&mut project.graph_data, &project.chapters)
        .await?;

    if report.is_empty() {
        println!("Every chapter already has a snapshot.");
        return Ok(());
    }

    for (chapter, outcome) in &report.outcomes {
        println!("Chapter {chapter}: {outcome:?}");
    }

    project.touch();
    project.save_json(&path).await?;

    let errors = report.errors();
    if !errors.is_empty() {
        println!("Chapters to retry: {errors:?}");
    }
    Ok(())
}

async fn audit(path: PathBuf) -> CliResult {
    let mut project = NovelProject::load_json(&path).await?;
    let generator = ChatGenerator::from_env()?;

    let outline = project.outline().map(str::to_string);
    let state = run_audit(&generator, &mut project.graph_data, outline.as_deref()).await?;
    project.touch();
    project.save_json(&path).await?;

    if state.is_clean() {
        println!("No inconsistencies found.");
    }
    for item in &state.inconsistencies {
        println!(
            "[{}] {} (chapters {:?}): {}",
            item.severity.name(),
            item.kind,
            item.chapters,
            item.message
        );
    }
    Ok(())
}

async fn chapter_graph(path: PathBuf, rest: &[String]) -> CliResult {
    let Some(chapter) = chapter_arg(rest) else {
        eprintln!("Usage: compass chapter-graph <project.json> <chapter>");
        std::process::exit(2);
    };

    let mut project = NovelProject::load_json(&path).await?;
    let Some(text) = project.chapters.get(&chapter).cloned() else {
        eprintln!("Chapter {chapter} has no text.");
        std::process::exit(1);
    };

    let generator = ChatGenerator::from_env()?;
    let builder = GraphBuilder::new(&generator).with_progress(print_progress);
    let snapshot = builder
        .chapter_graph(chapter, &text, project.character_state())
        .await?;

    print_snapshot(chapter, &snapshot);
    project.chapter_graphs.insert(chapter, snapshot);
    project.touch();
    project.save_json(&path).await?;
    Ok(())
}

async fn show(path: PathBuf, rest: &[String]) -> CliResult {
    let project = NovelProject::load_json(&path).await?;
    let snapshots = &project.graph_data.snapshots;

    let entry = match chapter_arg(rest) {
        Some(chapter) => snapshots.nearest_entry(i64::from(chapter)),
        None => snapshots.nearest_entry(i64::MAX),
    };
    let Some((chapter, snapshot)) = entry else {
        println!("No snapshot available.");
        return Ok(());
    };

    println!("Stored chapters: {:?}", snapshots.chapters());
    print_snapshot(chapter, snapshot);

    let dangling = snapshot.dangling_edges();
    if !dangling.is_empty() {
        println!("Edges with missing endpoints: {}", dangling.len());
    }
    Ok(())
}

async fn chart(path: PathBuf, rest: &[String]) -> CliResult {
    let project = NovelProject::load_json(&path).await?;
    let theme = if rest.iter().any(|a| a == "--dark") {
        Theme::Dark
    } else {
        Theme::Light
    };

    let chapter = chapter_arg(rest).map(i64::from).unwrap_or(i64::MAX);
    let Some(snapshot) = project.graph_data.snapshot_for_chapter(chapter) else {
        eprintln!("No snapshot available.");
        std::process::exit(1);
    };

    let chart = ChartData::from_snapshot(snapshot, theme);
    println!("{}", serde_json::to_string_pretty(&chart)?);
    Ok(())
}

async fn list(dir: PathBuf) -> CliResult {
    for info in list_projects(&dir).await? {
        println!(
            "{}  {} ({} chapters, {} snapshots{})",
            info.path.display(),
            info.title,
            info.chapters,
            info.snapshots,
            if info.graph_generated { "" } else { ", no graph" }
        );
    }
    Ok(())
}

fn print_snapshot(chapter: u32, snapshot: &Snapshot) {
    println!("--- Chapter {chapter} ---");
    for node in &snapshot.nodes {
        let faction = node.faction.as_deref().unwrap_or("-");
        println!(
            "  {} [{}] {} importance {} faction {}",
            node.id,
            node.node_type.name(),
            node.status.as_str(),
            node.importance,
            faction
        );
    }
    for edge in &snapshot.edges {
        println!(
            "  {} -[{} {}]-> {}",
            edge.source,
            edge.relation_type.as_str(),
            edge.strength,
            edge.target
        );
    }
}

fn print_help() {
    println!("compass - chapter-versioned relationship graphs for generated novels");
    println!();
    println!("USAGE:");
    println!("  compass <COMMAND> <PROJECT.json> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("  baseline [--force]        Build the chapter 0 graph from the setting documents");
    println!("  advance                   Add snapshots for chapters that have none");
    println!("  audit                     Check the snapshot sequence for inconsistencies");
    println!("  chapter-graph <CHAPTER>   Extract a standalone graph from one chapter");
    println!("  show [CHAPTER]            Print the graph as of a chapter (default: latest)");
    println!("  chart [CHAPTER] [--dark]  Print chart data as JSON");
    println!("  list <DIR>                List project files in a directory");
    println!();
    println!("ENVIRONMENT:");
    println!("  COMPASS_API_KEY           API key (required for generating commands)");
    println!("  COMPASS_BASE_URL          OpenAI-compatible endpoint base URL");
    println!("  COMPASS_MODEL             Model name");
    println!("  COMPASS_TEMPERATURE, COMPASS_MAX_TOKENS, COMPASS_TIMEOUT_SECS");
    println!("  RUST_LOG                  Log filter (default: info)");
}
