//! tagmesh-admin CLI tool
//!
//! Inspects and edits the local statement ledger.
//!
//! Usage:
//!   tagmesh-admin objects <subject> [predicate]
//!   tagmesh-admin suggestions <subject> [predicate]
//!   tagmesh-admin add <subject> <object> [predicate]
//!   tagmesh-admin remove <subject> <object> [predicate]
//!   tagmesh-admin seed <subject> <object> [predicate]
//!   tagmesh-admin clock <creator_hex> <subject> <object> [predicate]
//!   tagmesh-admin sample [count]
//!   tagmesh-admin whoami

use tagmesh_ledger::{
    Ledger, LedgerConfig, OperationKind, Predicate, PublicKey, RocksStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A parsed command line.
#[derive(Debug)]
enum AdminCommand {
    Objects { subject: String, predicate: Predicate },
    Suggestions { subject: String, predicate: Predicate },
    Edit { subject: String, object: String, predicate: Predicate, kind: OperationKind },
    Seed { subject: String, object: String, predicate: Predicate },
    Clock { creator: PublicKey, subject: String, object: String, predicate: Predicate },
    Sample { count: Option<usize> },
    WhoAmI,
}

fn print_usage() {
    eprintln!("tagmesh-admin - Inspect and edit the local statement ledger");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  tagmesh-admin objects <subject> [predicate]          Shown objects, best first");
    eprintln!("  tagmesh-admin suggestions <subject> [predicate]      Suggested objects");
    eprintln!("  tagmesh-admin add <subject> <object> [predicate]     Add a statement as this node");
    eprintln!("  tagmesh-admin remove <subject> <object> [predicate]  Remove a statement as this node");
    eprintln!("  tagmesh-admin seed <subject> <object> [predicate]    Seed a bootstrap statement");
    eprintln!("  tagmesh-admin clock <creator_hex> <subject> <object> [predicate]");
    eprintln!("                                                       Stored clock of a peer's claim");
    eprintln!("  tagmesh-admin sample [count]                         Sample operations for gossip");
    eprintln!("  tagmesh-admin whoami                                 Print this node's public key");
    eprintln!();
    eprintln!("Predicates are snake_case names (has_tag) or numeric codes (101).");
    eprintln!("The default predicate is has_tag.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TAGMESH_DATA_DIR             Ledger directory (default: ./tagmesh-data)");
    eprintln!("  TAGMESH_SHOW_THRESHOLD       Score needed to show a statement (default: 1)");
    eprintln!("  TAGMESH_HIDE_THRESHOLD       Score at or below which it is hidden (default: -2)");
    eprintln!("  TAGMESH_GOSSIP_ATTEMPTS      Random probes per sample (default: 100)");
    eprintln!("  TAGMESH_GOSSIP_BATCH         Operations per sample (default: 10)");
    eprintln!("  TAGMESH_GOSSIP_MIN_AGE_SECS  Minimum age of sampled operations (default: 0)");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn predicate_arg(args: &[String], index: usize) -> Predicate {
    match args.get(index) {
        Some(raw) => raw.parse().unwrap_or_else(|e| fail(e)),
        None => Predicate::default(),
    }
}

fn require(args: &[String], count: usize, usage: &str) {
    if args.len() < count {
        fail(format!("usage: tagmesh-admin {}", usage));
    }
}

fn parse_command(args: &[String]) -> AdminCommand {
    match args[1].as_str() {
        "objects" => {
            require(args, 3, "objects <subject> [predicate]");
            AdminCommand::Objects {
                subject: args[2].clone(),
                predicate: predicate_arg(args, 3),
            }
        }
        "suggestions" => {
            require(args, 3, "suggestions <subject> [predicate]");
            AdminCommand::Suggestions {
                subject: args[2].clone(),
                predicate: predicate_arg(args, 3),
            }
        }
        cmd @ ("add" | "remove") => {
            require(args, 4, &format!("{} <subject> <object> [predicate]", cmd));
            AdminCommand::Edit {
                subject: args[2].clone(),
                object: args[3].clone(),
                predicate: predicate_arg(args, 4),
                kind: if cmd == "add" {
                    OperationKind::Add
                } else {
                    OperationKind::Remove
                },
            }
        }
        "seed" => {
            require(args, 4, "seed <subject> <object> [predicate]");
            AdminCommand::Seed {
                subject: args[2].clone(),
                object: args[3].clone(),
                predicate: predicate_arg(args, 4),
            }
        }
        "clock" => {
            require(args, 5, "clock <creator_hex> <subject> <object> [predicate]");
            AdminCommand::Clock {
                creator: PublicKey::from_hex(&args[2])
                    .unwrap_or_else(|e| fail(format!("invalid creator key: {}", e))),
                subject: args[3].clone(),
                object: args[4].clone(),
                predicate: predicate_arg(args, 5),
            }
        }
        "sample" => AdminCommand::Sample {
            count: args
                .get(2)
                .map(|raw| raw.parse().unwrap_or_else(|e| fail(format!("invalid count: {}", e)))),
        },
        "whoami" => AdminCommand::WhoAmI,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_list(items: Vec<String>) {
    if items.is_empty() {
        println!("(none)");
    } else {
        for item in items {
            println!("{}", item);
        }
    }
}

fn run(config: &LedgerConfig, cmd: AdminCommand) -> tagmesh_ledger::Result<()> {
    let ledger: Ledger<RocksStore> = Ledger::open(config)?;

    match cmd {
        AdminCommand::Objects { subject, predicate } => {
            print_list(ledger.objects_for(&subject, predicate)?);
        }
        AdminCommand::Suggestions { subject, predicate } => {
            print_list(ledger.suggestions_for(&subject, predicate)?);
        }
        AdminCommand::Edit {
            subject,
            object,
            predicate,
            kind,
        } => {
            let node_key = ledger.store().get_or_create_node_key()?;
            let signed = ledger.add_local(&node_key, &subject, predicate, &object, kind)?;
            println!("{}", serde_json::to_string(&signed)?);
        }
        AdminCommand::Seed {
            subject,
            object,
            predicate,
        } => {
            let applied =
                ledger.seed_statement(&PublicKey::auto_generated(), &subject, predicate, &object)?;
            println!("{}", if applied { "seeded" } else { "already seeded" });
        }
        AdminCommand::Clock {
            creator,
            subject,
            object,
            predicate,
        } => {
            println!("{}", ledger.clock_of(&creator, &subject, predicate, &object)?);
        }
        AdminCommand::Sample { count } => {
            let count = count.unwrap_or(config.gossip_batch_size);
            for signed in ledger.operations_for_gossip(config.gossip_min_age, count)? {
                println!("{}", serde_json::to_string(&signed)?);
            }
        }
        AdminCommand::WhoAmI => {
            let node_key = ledger.store().get_or_create_node_key()?;
            println!("{}", PublicKey::from(&node_key.verifying_key()).to_hex());
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagmesh=info,tagmesh_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = parse_command(&args);
    let config = LedgerConfig::from_env().unwrap_or_else(|e| fail(e));

    if let Err(e) = run(&config, cmd) {
        fail(e);
    }
}
