use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::info_span;

use nps_engine::{Capabilities, EnrichmentReport, Session};
use nps_ingest::load_lookup_csv;
use nps_model::{Relation, Stream, SummaryLevel, SummaryOptions};
use nps_cli::config::CliConfig;
use nps_cli::render::{
    capabilities_line, enrichment_table, frame_json, frame_table, relations_table, summary_table,
};

use crate::cli::{LevelArg, OutputArgs, ProcessArgs, QueryArgs, SessionArgs, StreamArg, SummaryArgs};

#[derive(Serialize)]
struct RegisterOutput<'a> {
    relations: &'a [Relation],
    capabilities: &'a Capabilities,
    enrichment: &'a [EnrichmentReport],
}

/// Builds the effective configuration and opens a session.
pub fn open_session(args: &SessionArgs) -> Result<Session> {
    let config = match &args.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    }
    .with_overrides(
        args.lookup.clone(),
        args.data_dir.clone(),
        args.database.clone(),
        args.offline,
    );

    let lookup_path = config
        .lookup
        .clone()
        .ok_or_else(|| anyhow!("no lookup dataset: pass --lookup or set `lookup` in the config file"))?;
    let lookup = load_lookup_csv(&lookup_path)
        .with_context(|| format!("load lookup {}", lookup_path.display()))?;

    let span = info_span!("session", lookup = %lookup_path.display());
    let _guard = span.enter();
    Session::open(config.engine, lookup).context("open session")
}

pub fn run_register(session: &Session, output: OutputArgs) -> Result<()> {
    let relations = session.relations();
    let reports = session.opening_reports();
    if output.json {
        let value = RegisterOutput {
            relations: &relations,
            capabilities: session.capabilities(),
            enrichment: reports,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("{}", capabilities_line(session.capabilities()));
    if relations.is_empty() {
        println!("No relations registered.");
    } else {
        println!("{}", relations_table(&relations));
    }
    if !reports.is_empty() {
        println!("{}", enrichment_table(reports));
    }
    Ok(())
}

pub fn run_summary(session: &Session, args: &SummaryArgs) -> Result<()> {
    let level = match args.level {
        LevelArg::Domain => SummaryLevel::Domain,
        LevelArg::Subdomain => SummaryLevel::Subdomain,
        LevelArg::Narrow => SummaryLevel::Narrow,
    };
    let options = SummaryOptions::at_level(level)
        .with_by_stream(args.by_stream)
        .with_include_all(!args.data_only);
    let rows = session.domain_summary(options).context("domain summary")?;

    if args.output.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{}", summary_table(&rows, args.by_stream));
    }
    Ok(())
}

pub fn run_process(session: &Session, args: &ProcessArgs) -> Result<()> {
    let stream = match args.stream {
        StreamArg::Neurocog => Stream::Cognitive,
        StreamArg::Neurobehav => Stream::Behavioral,
        StreamArg::Validity => Stream::Validity,
    };
    let scales: Vec<&str> = args.scales.iter().map(String::as_str).collect();
    let frame = session
        .process(&args.domain, stream, &scales)
        .with_context(|| format!("process {} ({stream})", args.domain))?;
    print_frame(&frame, args.output)
}

pub fn run_query(session: &Session, args: &QueryArgs) -> Result<()> {
    let frame = session.query(&args.sql)?;
    print_frame(&frame, args.output)
}

pub fn run_unmapped(session: &Session, output: OutputArgs) -> Result<()> {
    let frame = session.unmapped_log().context("read unmapped-key log")?;
    if frame.height() == 0 && !output.json {
        println!("No unmapped join keys logged.");
        return Ok(());
    }
    print_frame(&frame, output)
}

fn print_frame(frame: &polars::prelude::DataFrame, output: OutputArgs) -> Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(&frame_json(frame))?);
    } else {
        println!("{}", frame_table(frame));
        println!("{} row(s)", frame.height());
    }
    Ok(())
}
