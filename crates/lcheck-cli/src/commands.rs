use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use lcheck_audit::{AuditConfig, AuditMode, AuditReport, Auditor, JsonEffectsDecoder};
use lcheck_crypto::MerkleFactory;
use lcheck_store::{InMemoryStore, LedgerSimulator, RandomHistory};
use lcheck_types::Hash256;
use tokio_util::sync::CancellationToken;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Objects(args) => {
            let config = load_config(&args, |_| {})?;
            cmd_audit(AuditMode::Objects, &args, config, &format).await
        }
        Command::Diff(args) => {
            let config = load_config(&args, |_| {})?;
            cmd_audit(AuditMode::Diff, &args, config, &format).await
        }
        Command::Tx(args) => {
            let config = load_config(&args.run, |c| {
                let checks = &mut c.checks;
                checks.skip_digest |= args.skip_digest;
                checks.skip_account_check |= args.skip_account_check;
                checks.skip_nft_check |= args.skip_nft_check;
                checks.skip_diff_check |= args.skip_diff_check;
                checks.fix_nft_uri |= args.fix_nft_uri;
            })?;
            cmd_audit(AuditMode::Tx, &args.run, config, &format).await
        }
        Command::LedgerHash(args) => {
            let config = load_config(&args.run, |c| {
                c.checks.fix_ledger_hash |= args.fix_ledger_hash;
            })?;
            cmd_audit(AuditMode::LedgerHash, &args.run, config, &format).await
        }
        Command::Demo(args) => cmd_demo(args),
    }
}

/// Config file (or defaults), then command-line overrides.
fn load_config(
    args: &RunArgs,
    overrides: impl FnOnce(&mut AuditConfig),
) -> anyhow::Result<AuditConfig> {
    let mut config = match &args.config {
        Some(path) => AuditConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AuditConfig::default(),
    };
    if let Some(wave_size) = args.wave_size {
        config.wave_size = wave_size;
    }
    if let Some(fanout) = args.fanout {
        config.fanout = fanout;
    }
    overrides(&mut config);
    config.validate()?;
    Ok(config)
}

async fn cmd_audit(
    mode: AuditMode,
    args: &RunArgs,
    config: AuditConfig,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let store = Arc::new(
        InMemoryStore::load_json(&args.store)
            .with_context(|| format!("opening store {}", args.store.display()))?,
    );
    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    let auditor = Auditor::new(
        store.clone(),
        Arc::new(MerkleFactory),
        Arc::new(JsonEffectsDecoder),
        config,
    )
    .with_repair_writer(store.clone())
    .with_cancel(cancel);

    let (from, to) = auditor.resolve_range(args.from, args.to).await?;
    let report = auditor.run(mode, from, to).await?;

    if report.repairs.confirmed > 0 {
        store
            .save_json(&args.store)
            .with_context(|| format!("saving repaired store {}", args.store.display()))?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling audit");
            cancel.cancel();
        }
    });
}

fn print_report(report: &AuditReport) {
    let range = format!("{}..={}", report.from, report.to);
    if report.is_consistent() {
        println!(
            "{} {} {}: {} ledgers, {} mismatches",
            "✓".green().bold(),
            report.mode.bold(),
            range,
            report.ledgers_checked,
            "0".green()
        );
    } else {
        println!(
            "{} {} {}: {} ledgers, {} mismatches",
            "✗".red().bold(),
            report.mode.bold(),
            range,
            report.ledgers_checked,
            report.total_mismatches().to_string().red().bold()
        );
        for mismatch in &report.mismatches {
            println!(
                "  {} {} {}",
                format!("seq {}", mismatch.sequence).yellow(),
                mismatch.kind.to_string().red(),
                mismatch.detail.dimmed()
            );
        }
    }
    if report.repairs.attempted > 0 {
        println!(
            "  repairs: {} confirmed, {} failed",
            report.repairs.confirmed.to_string().green(),
            report.repairs.failed().to_string().red()
        );
    }
}

fn cmd_demo(args: DemoArgs) -> anyhow::Result<()> {
    let (first, last) = demo_range(&args)?;
    let store = write_demo(&args)?;
    store.save_json(&args.out)?;
    println!(
        "{} Wrote {} ledgers ({}..={}) to {}",
        "✓".green().bold(),
        store.ledger_count(),
        first,
        last,
        args.out.display().to_string().bold()
    );
    Ok(())
}

/// First and last sequence of the demo history. The sequence after the
/// last one must still be representable.
fn demo_range(args: &DemoArgs) -> anyhow::Result<(u64, u64)> {
    if args.ledgers == 0 {
        anyhow::bail!("--ledgers must be at least 1");
    }
    match args.first.checked_add(args.ledgers) {
        Some(end) => Ok((args.first, end - 1)),
        None => anyhow::bail!(
            "--first {} with --ledgers {} runs past the last sequence",
            args.first,
            args.ledgers
        ),
    }
}

/// Simulate a history and apply the requested damage.
fn write_demo(args: &DemoArgs) -> anyhow::Result<InMemoryStore> {
    demo_range(args)?;
    let store = Arc::new(InMemoryStore::new());
    let mut sim = LedgerSimulator::new(store.clone(), Arc::new(MerkleFactory), args.first);
    RandomHistory {
        seed: args.seed,
        ledgers: args.ledgers,
        ..Default::default()
    }
    .generate(&mut sim)?;
    drop(sim);

    let bogus = Hash256::new([0xee; 32]);
    for &seq in &args.corrupt_state {
        warn_if_missing(seq, store.corrupt_state_digest(seq, bogus));
    }
    for &seq in &args.corrupt_tx {
        warn_if_missing(seq, store.corrupt_tx_digest(seq, bogus));
    }

    let dump = store.to_dump();
    for &seq in &args.drop_ledger_hash {
        let dropped = dump
            .headers
            .iter()
            .find(|h| h.sequence == seq)
            .is_some_and(|h| store.drop_ledger_hash(&h.ledger_hash));
        warn_if_missing(seq, dropped);
    }
    for &seq in &args.drop_nft_uri {
        let mut dropped = false;
        for row in dump.nft_uris.iter().filter(|row| row.seq == seq) {
            dropped |= store.drop_nft_uri(&row.token, seq);
        }
        warn_if_missing(seq, dropped);
    }

    Arc::try_unwrap(store).map_err(|_| anyhow::anyhow!("demo store still shared"))
}

fn warn_if_missing(seq: u64, applied: bool) {
    if !applied {
        tracing::warn!(seq, "nothing to damage at this ledger");
    }
}
