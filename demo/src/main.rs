//! memstamp Anchoring Engine — Demo CLI
//!
//! Runs one or all of the three anchoring scenarios.  Each scenario uses
//! real memstamp components (ledger, batcher, publisher, verifier) wired
//! together against an in-process mock chain.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- lifecycle
//!   cargo run -p demo -- signed-agents
//!   cargo run -p demo -- chain-fault

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use memstamp_anchor::{
    keypair_from_seed, sign_event_hash, InMemoryKeyRegistry, MockChainAdapter,
};
use memstamp_contracts::{CreateStampRequest, EventType, MemstampResult};
use memstamp_core::{config::EngineConfig, hash::compute_hash};
use memstamp_service::MemstampEngine;

// ── CLI definition ────────────────────────────────────────────────────────────

/// memstamp — hash-chained event attestation with Merkle anchoring.
///
/// Each subcommand runs one or all of the three demo scenarios,
/// demonstrating ingestion, batching, anchoring, and verification.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "memstamp anchoring engine demo",
    long_about = "Runs memstamp demo scenarios showing per-agent hash chains,\n\
                  size/age-triggered batching, Merkle anchoring to a mock chain,\n\
                  and four-check stamp verification."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all three scenarios in sequence.
    RunAll,
    /// Scenario 1: the full stamp lifecycle for one agent.
    Lifecycle,
    /// Scenario 2: two Ed25519-signed agents sharing one batch.
    SignedAgents,
    /// Scenario 3: transient chain faults, retry, and re-batching.
    ChainFault,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::Lifecycle => run_lifecycle(),
        Command::SignedAgents => run_signed_agents(),
        Command::ChainFault => run_chain_fault(),
    };

    match result {
        Ok(()) => {
            println!("All selected scenarios completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_all() -> MemstampResult<()> {
    run_lifecycle()?;
    run_signed_agents()?;
    run_chain_fault()?;
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn demo_config(batch_max_size: usize) -> EngineConfig {
    EngineConfig {
        batch_max_size,
        batch_max_age_secs: 60,
        finality_threshold: 2,
        ..EngineConfig::default()
    }
}

fn request(agent_id: &str, event_type: EventType, payload: serde_json::Value) -> CreateStampRequest {
    CreateStampRequest {
        agent_id: agent_id.to_string(),
        event_type,
        content_hash: compute_hash(&payload),
        framework: "langchain".to_string(),
        signature: None,
        metadata: None,
    }
}

// ── Scenario 1: full lifecycle ────────────────────────────────────────────────

/// One agent stamps three events; the batch closes by size, anchors to the
/// mock chain, confirms, finalizes, and every stamp verifies.
fn run_lifecycle() -> MemstampResult<()> {
    println!("── Scenario 1: stamp lifecycle ─────────────────────────────────");

    let adapter = Arc::new(MockChainAdapter::new("solana"));
    let engine = MemstampEngine::new(demo_config(3), vec![adapter.clone()])?;
    let now = Utc::now();

    let payloads = [
        (EventType::Decision, json!({ "decision": "book the 9am flight" })),
        (EventType::ToolCall, json!({ "tool": "flights.search", "query": "SFO→JFK" })),
        (EventType::ToolResult, json!({ "results": 14, "cheapest_usd": 189 })),
    ];
    let mut stamp_ids = Vec::new();
    for (event_type, payload) in payloads {
        let stamp = engine.create_stamp(&request("agt-travel", event_type, payload), now)?;
        println!(
            "  stamped {} event {} (status: {:?})",
            stamp.event.event_type, stamp.id, stamp.status
        );
        stamp_ids.push(stamp.id);
    }

    let published = engine.run_anchor_cycle(now)?;
    let anchor = &published[0];
    println!(
        "  anchored batch of {} under root {} → tx {:?}",
        anchor.event_count, anchor.merkle_root, anchor.tx_hash
    );

    adapter.confirm_all(1_204_500);
    adapter.advance_confirmations(2);
    engine.run_confirmation_cycle(now)?;
    let anchor = engine.get_anchor(&anchor.id).expect("anchor just published");
    println!(
        "  confirmations reached threshold: status {:?}, block {:?}",
        anchor.status, anchor.block_number
    );

    for stamp_id in &stamp_ids {
        let result = engine.verify_stamp(stamp_id, None)?;
        println!(
            "  verify {}: verified={} (chain={}, merkle={}, onchain={})",
            stamp_id,
            result.verified,
            result.hash_chain_valid,
            result.merkle_included,
            result.chain_verified
        );
    }
    println!();
    Ok(())
}

// ── Scenario 2: signed agents ─────────────────────────────────────────────────

/// Two agents with registered Ed25519 keys interleave events into one
/// batch; verification checks their signatures alongside everything else.
fn run_signed_agents() -> MemstampResult<()> {
    println!("── Scenario 2: signed agents ───────────────────────────────────");

    let adapter = Arc::new(MockChainAdapter::new("solana"));
    let registry = Arc::new(InMemoryKeyRegistry::new());

    let (key_alpha, pub_alpha) = keypair_from_seed(&[1u8; 32]);
    let (key_beta, pub_beta) = keypair_from_seed(&[2u8; 32]);
    registry.register("agt-alpha", &pub_alpha)?;
    registry.register("agt-beta", &pub_beta)?;

    let engine = MemstampEngine::new(demo_config(4), vec![adapter.clone()])?
        .with_key_registry(registry.clone());
    let now = Utc::now();

    // Interleaved ingestion: each agent keeps its own independent chain.
    let mut stamp_ids = Vec::new();
    for i in 0..2 {
        for (agent, key) in [("agt-alpha", &key_alpha), ("agt-beta", &key_beta)] {
            let req = request(
                agent,
                EventType::Observation,
                json!({ "agent": agent, "step": i }),
            );
            let stamp = engine.create_stamp(&req, now)?;
            // Sign the event hash the ledger assigned; the signature is
            // checked at verification time.
            let signature = sign_event_hash(key, &stamp.event.event_hash)?;
            engine.attach_signature(&stamp.id, &signature)?;
            stamp_ids.push(stamp.id);
            println!("  {} stamped step {} → {}", agent, i, stamp.event.event_hash);
        }
    }

    let published = engine.run_anchor_cycle(now)?;
    adapter.confirm_all(1_204_777);
    engine.run_confirmation_cycle(now)?;
    println!(
        "  one shared batch anchored: {} events under {}",
        published[0].event_count, published[0].merkle_root
    );

    for stamp_id in &stamp_ids {
        let result = engine.verify_stamp(stamp_id, None)?;
        println!("  verify {}: verified={}", stamp_id, result.verified);
    }

    for record in engine.list_agents()? {
        println!(
            "  agent {} ({}) holds {} stamps",
            record.agent_id, record.framework, record.stamp_count
        );
    }
    println!();
    Ok(())
}

// ── Scenario 3: chain faults ──────────────────────────────────────────────────

/// The mock chain drops submissions; the publisher backs off, retries, and
/// after terminal failure the engine re-batches the stranded stamps.
fn run_chain_fault() -> MemstampResult<()> {
    println!("── Scenario 3: chain faults and re-batching ────────────────────");

    let adapter = Arc::new(MockChainAdapter::new("solana"));
    let config = EngineConfig {
        retry_max_attempts: 2,
        retry_base_delay_ms: 100,
        ..demo_config(2)
    };
    let engine = MemstampEngine::new(config, vec![adapter.clone()])?;
    let now = Utc::now();

    let stamps: Vec<_> = ["draft email", "send email"]
        .iter()
        .map(|step| {
            engine.create_stamp(
                &request("agt-mail", EventType::ExternalAction, json!({ "step": step })),
                now,
            )
        })
        .collect::<MemstampResult<Vec<_>>>()?;

    // Two faults hit the two-attempt cap and mark the anchor failed.
    adapter.fail_next_submits(2);
    let mut tick = now;
    for _ in 0..2 {
        engine.run_anchor_cycle(tick)?;
        tick += chrono::Duration::seconds(1);
    }
    let failed = engine
        .list_anchors()
        .into_iter()
        .find(|a| a.status == memstamp_contracts::AnchorStatus::Failed)
        .expect("anchor exhausted its retries");
    println!(
        "  anchor {} failed after retries: {}",
        failed.id,
        failed.last_error.as_deref().unwrap_or("unknown")
    );

    // The stamps were re-batched; a healthy chain picks them up.
    let recovered = engine.run_anchor_cycle(tick)?;
    println!(
        "  re-batched {} stamps under new anchor {} → tx {:?}",
        recovered[0].event_count, recovered[0].id, recovered[0].tx_hash
    );

    adapter.confirm_all(1_205_000);
    engine.run_confirmation_cycle(tick)?;
    for stamp in &stamps {
        let result = engine.verify_stamp(&stamp.id, None)?;
        println!("  verify {}: verified={}", stamp.id, result.verified);
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("memstamp — Verifiable Event Attestation");
    println!("Anchoring Engine Demo");
    println!("=======================================");
    println!();
    println!("memstamp pipeline per event:");
    println!("  [1] Content hash appended to the agent's SHA-256 hash chain");
    println!("  [2] Stamp recorded pending and enqueued for batching");
    println!("  [3] Batch closes on size or age; Merkle root built over leaves");
    println!("  [4] Root anchored on chain; pending → submitted → confirmed → finalized");
    println!("  [5] Verification rechecks chain, proof, on-chain tx, and signature");
    println!();
}
