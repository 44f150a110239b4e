mod cli;
mod format;

use clap::Parser;
use cli::{CacheCommand, Cli, Command, ReprocessArgs, ResumeArgs, RunArgs, ValidateArgs};
use oracle_pipeline::{Coordinator, GeoSeriesMetadata, OracleConfig, PipelineError};
use oracle_store::Store;
use tokio_util::sync::CancellationToken;

fn print_json<T: serde::Serialize>(val: &T) {
    println!("{}", serde_json::to_string_pretty(val).expect("JSON serialization failed"));
}

fn exit_with(code: i32, msg: &str) -> ! {
    if code != 0 {
        eprintln!("Error: {msg}");
    }
    std::process::exit(code);
}

fn exit_code_for(err: &PipelineError) -> i32 {
    match err {
        PipelineError::Config(_) | PipelineError::NoSeeds { .. } => 2,
        PipelineError::Store(_) | PipelineError::Source(_) | PipelineError::Extraction(_) | PipelineError::Io(_) | PipelineError::Json(_) => 4,
    }
}

/// Installs a Ctrl-C handler that cancels `token` once, per §5's cooperative
/// cancellation contract.
fn watch_for_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match OracleConfig::from_env() {
        Ok(config) => config,
        Err(e) => exit_with(2, &e.to_string()),
    };
    if let Some(root) = &cli.store_root {
        config.store_root = root.clone();
    }

    let store = match Store::open(&config.store_root) {
        Ok(store) => store,
        Err(e) => exit_with(4, &e.to_string()),
    };

    let coordinator = match Coordinator::new(store, config) {
        Ok(coordinator) => coordinator,
        Err(e) => exit_with(exit_code_for(&e), &e.to_string()),
    };

    let code = match cli.command {
        Command::Run(args) => run_command(&coordinator, args, cli.json).await,
        Command::Resume(args) => resume_command(&coordinator, args, cli.json).await,
        Command::Validate(args) => validate_command(&coordinator, args, cli.json),
        Command::Reprocess(args) => reprocess_command(&coordinator, args, cli.json).await,
        Command::Cache { cmd } => cache_command(&coordinator, cmd, cli.json),
    };
    std::process::exit(code);
}

async fn run_command(coordinator: &Coordinator, args: RunArgs, json: bool) -> i32 {
    let geo = GeoSeriesMetadata {
        geo_id: args.geo,
        pubmed_ids: args.pmids,
        title: args.title,
        summary: args.summary,
        keywords: args.keywords,
    };

    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    match coordinator.run(&geo, &cancel).await {
        Ok(summary) => {
            if json {
                print_json(&serde_json::json!({
                    "geo_id": summary.geo_id,
                    "papers_discovered": summary.papers_discovered,
                    "p2": summary.p2,
                    "p3": summary.p3,
                    "p4": summary.p4,
                }));
            } else {
                print!("{}", format::format_run_summary(&summary));
            }
            if summary.p2.failed > 0 || summary.p3.failed > 0 || summary.p4.failed > 0 {
                3
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

async fn resume_command(coordinator: &Coordinator, args: ResumeArgs, json: bool) -> i32 {
    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    match coordinator.resume(&args.geo, &cancel).await {
        Ok(summary) => {
            if json {
                print_json(&serde_json::json!({
                    "geo_id": summary.geo_id,
                    "p2": summary.p2,
                    "p3": summary.p3,
                    "p4": summary.p4,
                }));
            } else {
                print!("{}", format::format_run_summary(&summary));
            }
            if summary.p2.failed > 0 || summary.p3.failed > 0 || summary.p4.failed > 0 {
                3
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}

/// Recomputes artifact checksums for every paper under `--geo`, and, when
/// GEO context is supplied, recomputes relevance scores too (§6's "recompute
/// hashes and re-score"). The store has no table for a GEO's own title,
/// summary, or keywords — only the `run` invocation that produced the data
/// knows them — so rescoring without `--title`/`--summary` just verifies
/// checksums and says so.
fn validate_command(coordinator: &Coordinator, args: ValidateArgs, json: bool) -> i32 {
    let store = coordinator.store();
    let data = match store.get_complete_geo_data(&args.geo) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: {e}");
            return 4;
        }
    };

    let mut checked = 0;
    let mut mismatches = Vec::new();
    for paper in &data.papers {
        if paper.artifact.is_none() {
            continue;
        }
        checked += 1;
        if let Err(e) = store.verify_artifact(&args.geo, &paper.identifier.pmid) {
            eprintln!("Error: {e}");
            mismatches.push(paper.identifier.pmid.clone());
        }
    }

    let mut rescored = 0;
    if let Some(title) = &args.title {
        let summary = args.summary.clone().unwrap_or_default();
        let geo_ctx = oracle_pipeline::scoring::GeoContext { title, summary: &summary, keywords: &args.keywords };

        for paper in &data.papers {
            let Some(extraction) = &paper.extraction else { continue };
            let paper_ctx = oracle_pipeline::scoring::PaperContext {
                title: &paper.identifier.title,
                abstract_text: extraction.abstract_text.as_deref(),
                keywords: &[],
                mesh_terms: &[],
                age_years: 0.0,
                citations: 0,
            };
            let (components, total) = oracle_pipeline::scoring::score(&geo_ctx, &paper_ctx);
            if store
                .save_score(&args.geo, &paper.identifier.pmid, &components, total, oracle_pipeline::scoring::WEIGHTS_VERSION)
                .is_ok()
            {
                rescored += 1;
            }
        }
    }

    if json {
        print_json(&serde_json::json!({
            "geo_id": args.geo,
            "checked": checked,
            "mismatches": mismatches,
            "rescored": rescored,
        }));
    } else {
        print!("{}", format::format_geo_data(&data));
        print!("{}", format::format_validate_result(&args.geo, checked, &mismatches, rescored));
    }

    if mismatches.is_empty() { 0 } else { 3 }
}

async fn reprocess_command(coordinator: &Coordinator, args: ReprocessArgs, json: bool) -> i32 {
    use cli::StageArg;

    let data = match coordinator.store().get_complete_geo_data(&args.geo) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: {e}");
            return 4;
        }
    };

    if args.stage == StageArg::P1 {
        exit_with(2, "reprocess --stage P1 is not supported: P1 needs the GEO's original title/summary/seed PMIDs, which are not persisted; use `run` instead");
    }

    let mut attempted = 0;
    let mut succeeded = 0;
    let cancel = CancellationToken::new();
    watch_for_interrupt(cancel.clone());

    for paper in &data.papers {
        let publication = oracle_sources::Publication {
            pmid: Some(paper.identifier.pmid.clone()),
            doi: paper.identifier.doi.clone(),
            pmcid: paper.identifier.pmcid.clone(),
            title: paper.identifier.title.clone(),
            ..Default::default()
        };
        attempted += 1;
        let ok = match args.stage {
            StageArg::P1 => unreachable!(),
            StageArg::P2 => coordinator.reprocess_p2(&args.geo, &publication).await.map(|n| n > 0).unwrap_or(false),
            StageArg::P3 => coordinator
                .reprocess_p3(&args.geo, &publication, &cancel)
                .await
                .map(|outcome| matches!(outcome, oracle_pipeline::DownloadOutcome::Downloaded { .. } | oracle_pipeline::DownloadOutcome::AlreadyPresent))
                .unwrap_or(false),
            StageArg::P4 => coordinator.reprocess_p4(&args.geo, &paper.identifier.pmid).await.map(|r| r.is_some()).unwrap_or(false),
        };
        if ok {
            succeeded += 1;
        }
    }

    if json {
        print_json(&serde_json::json!({
            "geo_id": args.geo,
            "stage": format!("{:?}", args.stage),
            "attempted": attempted,
            "succeeded": succeeded,
        }));
    } else {
        print!("{}", format::format_reprocess_result(&args.geo, &format!("{:?}", args.stage), attempted, succeeded));
    }

    if succeeded < attempted { 3 } else { 0 }
}

fn cache_command(coordinator: &Coordinator, cmd: CacheCommand, json: bool) -> i32 {
    match cmd {
        CacheCommand::Stats => {
            let discovery = coordinator.discovery_cache().stats();
            let parsed = coordinator.parsed_cache().stats();
            if json {
                print_json(&serde_json::json!({
                    "discovery": { "hits": discovery.hits, "misses": discovery.misses, "entries": discovery.entries },
                    "parsed": { "hits": parsed.hits, "misses": parsed.misses, "entries": parsed.entries },
                }));
            } else {
                print!("{}", format::format_cache_stats(&discovery, &parsed));
            }
            0
        }
        CacheCommand::Cleanup => {
            let removed_discovery = coordinator.discovery_cache().cleanup_expired();
            let keep: std::collections::HashSet<String> = match coordinator.store().get_connection().with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT DISTINCT pdf_hash_sha256 FROM pdf_artifact")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut out = std::collections::HashSet::new();
                for row in rows {
                    out.insert(row?);
                }
                Ok(out)
            }) {
                Ok(set) => set,
                Err(_) => std::collections::HashSet::new(),
            };
            let removed_parsed = coordinator.parsed_cache().cleanup_unreferenced(&keep);
            if json {
                print_json(&serde_json::json!({ "discovery_removed": removed_discovery, "parsed_removed": removed_parsed }));
            } else {
                println!("removed {removed_discovery} discovery entries, {removed_parsed} parsed entries");
            }
            0
        }
        CacheCommand::Clear => {
            let discovery_removed = coordinator.discovery_cache().clear();
            let parsed_removed = coordinator.parsed_cache().clear();
            if json {
                print_json(&serde_json::json!({ "discovery_removed": discovery_removed, "parsed_removed": parsed_removed }));
            } else {
                println!("cleared {discovery_removed} discovery entries, {parsed_removed} parsed entries");
            }
            0
        }
        CacheCommand::Invalidate { key } => {
            let removed = coordinator.discovery_cache().invalidate(&key);
            if json {
                print_json(&serde_json::json!({ "removed": removed }));
            } else {
                println!("invalidated {removed} entries matching {key}");
            }
            0
        }
    }
}
