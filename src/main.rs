use std::sync::Arc;

use clap::Parser;
use pipeline_kb::{
    AnswerComposer,
    Contributor,
    GeminiGenerator,
    KbDir,
    KnowledgeBase,
    RagQueryRequest,
    ScoredDocument,
    cli::{self, Cli, Command},
    composer::QueryContext,
    config::GenerationConfig,
    error::{self, Error},
    mcp,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("PIPELINE_KB_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    // Generation settings are checked before anything is loaded so a missing
    // API key stops the process up front.
    let generation = match cli.command {
        Command::Ask(_) | Command::Mcp => {
            Some(GenerationConfig::resolve(cli.model.as_deref())?)
        }
        _ => None,
    };

    let kb_dir = KbDir::resolve(cli.kb_dir.as_deref())?;
    let kb = KnowledgeBase::load(&kb_dir);

    match cli.command {
        Command::Search(args) => {
            let results = kb.search(&args.query, args.count);
            if args.json {
                format_json(&results, &args.query);
            } else {
                format_human(&results);
            }
        }
        Command::Ask(args) => {
            let config = generation.ok_or_else(|| {
                Error::Config("generation settings were not resolved".into())
            })?;
            cmd_ask(kb, config, args)?;
        }
        Command::Docs(args) => {
            cmd_docs(&kb, &args)?;
        }
        Command::Get(args) => {
            cmd_get(&kb, &args)?;
        }
        Command::Status(args) => {
            cmd_status(&kb, args.json)?;
        }
        Command::Mcp => {
            let config = generation.ok_or_else(|| {
                Error::Config("generation settings were not resolved".into())
            })?;
            let generator = Arc::new(GeminiGenerator::new(config));
            mcp::run_mcp(AnswerComposer::new(kb, generator))?;
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_ask(
    kb: KnowledgeBase,
    config: GenerationConfig,
    args: cli::AskArgs,
) -> error::Result<()> {
    let composer =
        AnswerComposer::new(kb, Arc::new(GeminiGenerator::new(config)));

    let context = (args.entity_id.is_some() || args.chart_type.is_some())
        .then(|| QueryContext {
            entity_id: args.entity_id,
            filters: None,
            chart_type: args.chart_type,
        });
    let request = RagQueryRequest {
        question: args.question,
        context,
        include_numeric_data: None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;
    let response = runtime.block_on(composer.answer(&request))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.answer);
    if !response.sources.is_empty() {
        println!("\nSources:");
        for s in &response.sources {
            println!(
                "  #{} [{:.3}] {} ({}, {})",
                s.doc_id, s.relevance_score, s.title, s.contributor, s.doc_type
            );
        }
    }
    if let Some(tokens) = response.tokens_used {
        eprintln!("tokens used: {tokens}");
    }
    Ok(())
}

fn cmd_docs(kb: &KnowledgeBase, args: &cli::DocsArgs) -> error::Result<()> {
    let glob = args
        .pattern
        .as_deref()
        .map(|pattern| {
            globset::Glob::new(pattern)
                .map(|g| g.compile_matcher())
                .map_err(|e| {
                    Error::Config(format!("invalid glob pattern: {e}"))
                })
        })
        .transpose()?;

    let matches: Vec<_> = kb
        .documents()
        .iter()
        .filter(|d| args.contributor.is_none_or(|c| d.contributor == c))
        .filter(|d| glob.as_ref().is_none_or(|g| g.is_match(&d.source)))
        .collect();

    if args.json {
        let listing: Vec<_> = matches
            .iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "title": d.title,
                    "docType": d.doc_type,
                    "source": d.source,
                    "contributor": d.contributor,
                    "chars": d.content.chars().count(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&listing)?);
    } else if matches.is_empty() {
        println!("No documents match.");
    } else {
        for d in &matches {
            println!(
                "#{}\t{}\t{}\t{}\t{}",
                d.id, d.contributor, d.doc_type, d.source, d.title
            );
        }
        println!("\n{} document(s)", matches.len());
    }
    Ok(())
}

fn cmd_get(kb: &KnowledgeBase, args: &cli::GetArgs) -> error::Result<()> {
    let doc = kb.get(args.id).ok_or_else(|| Error::NotFound {
        kind: "document",
        name: format!("#{}", args.id),
    })?;

    if args.json {
        println!("{}", serde_json::to_string(doc)?);
    } else {
        println!("# {}", doc.title);
        println!(
            "<!-- #{} {} {} {} -->\n",
            doc.id, doc.contributor, doc.doc_type, doc.source
        );
        print!("{}", doc.content);
        if !doc.content.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

fn cmd_status(kb: &KnowledgeBase, json: bool) -> error::Result<()> {
    let report = kb.report();
    let by_contributor: Vec<_> = Contributor::ALL
        .into_iter()
        .map(|c| {
            let n = kb.documents().iter().filter(|d| d.contributor == c).count();
            (c, n)
        })
        .collect();

    if json {
        let contributors: serde_json::Map<_, _> = by_contributor
            .iter()
            .map(|(c, n)| (c.to_string(), json!(n)))
            .collect();
        println!(
            "{}",
            json!({
                "kbDir": report.root,
                "documents": kb.len(),
                "contributors": contributors,
                "groups": report.groups,
                "diagnostics": report.diagnostics,
            })
        );
        return Ok(());
    }

    println!("Knowledge base: {}", report.root.display());
    println!("Documents: {}", kb.len());
    for g in &report.groups {
        println!("  {:?}: {}", g.group, g.documents);
    }
    for (c, n) in &by_contributor {
        println!("  {c}: {n}");
    }
    if !report.diagnostics.is_empty() {
        println!("Skipped sources:");
        for d in &report.diagnostics {
            println!(
                "  [{:?}] {:?} {}: {}",
                d.group, d.kind, d.source, d.message
            );
        }
    }
    Ok(())
}

/// Format results for human-readable terminal output.
fn format_human(results: &[ScoredDocument<'_>]) {
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, r) in results.iter().enumerate() {
        let doc = r.document;
        println!(
            "{:>3}. [{:.3}] #{} {} {}",
            i + 1,
            r.relevance_score,
            doc.id,
            doc.contributor,
            doc.doc_type
        );
        println!("     {}", doc.title);
    }
    println!("\n{} result(s)", results.len());
}

/// Format results as JSON output.
fn format_json(results: &[ScoredDocument<'_>], query: &str) {
    let items: Vec<_> = results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            json!({
                "rank": i + 1,
                "relevanceScore": r.relevance_score,
                "docId": r.document.id,
                "title": r.document.title,
                "docType": r.document.doc_type,
                "contributor": r.document.contributor,
                "source": r.document.source,
            })
        })
        .collect();

    let output = json!({
        "query": query,
        "resultCount": items.len(),
        "results": items,
    });
    println!("{output}");
}
