//! ScriptJaeger CLI
//!
//! CLI tool for inspecting, migrating and merging preference documents, and
//! for trying decisions against them.

mod bench;

use std::fs;

use clap::{Parser, Subcommand};

use sj_core::{decompose, BlacklistNode, Policy, PolicyStore, PreferenceRoot, RequestType};
use sj_prefs::{default_preferences, export_document, parse_document, Imported};

#[derive(Parser)]
#[command(name = "sj-cli")]
#[command(about = "ScriptJaeger preferences and decision tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a preferences document
    Validate {
        /// Document to validate
        #[arg(short, long)]
        input: String,
    },

    /// Rewrite a document (any version) in the current format
    Migrate {
        /// Document to migrate
        #[arg(short, long)]
        input: String,

        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Merge one document into another
    Merge {
        /// Document merged into
        #[arg(short, long)]
        base: String,

        /// Document whose rules win on conflicts
        #[arg(short = 'm', long)]
        incoming: String,

        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print the bundled first-run preferences
    Defaults {
        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Show the effective policy and script list for a URL
    Resolve {
        /// Page URL
        url: String,

        /// Preferences document (bundled defaults when absent)
        #[arg(short, long)]
        prefs: Option<String>,

        /// Use the private-window default policy
        #[arg(long)]
        private: bool,
    },

    /// Decide whether a page may load a resource
    Decide {
        /// Requesting page URL
        page: String,

        /// Resource URL
        url: String,

        /// Preferences document (bundled defaults when absent)
        #[arg(short, long)]
        prefs: Option<String>,

        /// Request type (script, sub_frame, websocket, ping, ...)
        #[arg(short = 't', long = "type", default_value = "script")]
        request_type: String,

        /// Evaluate as a private window
        #[arg(long)]
        private: bool,

        /// Evaluate under this policy instead of the resolved one
        #[arg(long)]
        policy: Option<String>,
    },

    /// Measure decision latency on a synthetic or recorded workload
    Bench {
        /// Preferences document (bundled defaults when absent)
        #[arg(short, long)]
        prefs: Option<String>,

        /// Number of passes over the workload
        #[arg(long, default_value_t = 200)]
        iterations: usize,

        /// Synthetic pages to generate
        #[arg(long, default_value_t = 200)]
        pages: usize,

        /// Requests per synthetic page
        #[arg(long, default_value_t = 25)]
        reqs_per_page: usize,

        /// Synthetic workload seed
        #[arg(long, default_value_t = bench::DEFAULT_SEED)]
        seed: u32,

        /// JSONL trace of `{"page", "url", "type"}` records instead of the synthetic workload
        #[arg(long)]
        trace: Option<String>,

        /// Maximum trace records
        #[arg(long, default_value_t = 100_000)]
        trace_limit: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Migrate { input, output } => cmd_migrate(&input, output.as_deref()),
        Commands::Merge {
            base,
            incoming,
            output,
        } => cmd_merge(&base, &incoming, output.as_deref()),
        Commands::Defaults { output } => cmd_defaults(output.as_deref()),
        Commands::Resolve { url, prefs, private } => cmd_resolve(&url, prefs.as_deref(), private),
        Commands::Decide {
            page,
            url,
            prefs,
            request_type,
            private,
            policy,
        } => cmd_decide(&page, &url, prefs.as_deref(), &request_type, private, policy.as_deref()),
        Commands::Bench {
            prefs,
            iterations,
            pages,
            reqs_per_page,
            seed,
            trace,
            trace_limit,
        } => load_prefs(prefs.as_deref()).and_then(|prefs| {
            bench::run(bench::BenchOptions {
                prefs,
                iterations,
                pages,
                reqs_per_page,
                seed,
                trace_path: trace,
                trace_limit,
            })
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_document(path: &str) -> Result<Imported, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    parse_document(&text).map_err(|e| format!("Invalid document '{}': {}", path, e))
}

fn load_prefs(path: Option<&str>) -> Result<PreferenceRoot, String> {
    match path {
        Some(path) => read_document(path).map(|imported| imported.prefs),
        None => default_preferences().map_err(|e| format!("Bundled defaults are invalid: {}", e)),
    }
}

fn write_output(prefs: &PreferenceRoot, output: Option<&str>) -> Result<(), String> {
    let text = export_document(prefs).map_err(|e| format!("Failed to export: {}", e))?;
    match output {
        Some(path) => {
            fs::write(path, text + "\n").map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            eprintln!("Wrote '{}'", path);
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let Imported {
        prefs,
        warnings,
        from_version: version,
        ..
    } = read_document(input)?;

    println!("Document '{}' is valid", input);
    println!("  Version:          {}", version);
    println!("  Default policy:   {}", prefs.default_policy);
    println!("  Private policy:   {}", prefs.default_private_policy);
    println!("  Block ping:       {}", prefs.block_ping);
    println!("  Sites:            {}", prefs.site_rules.children.len());
    println!("  Site rules:       {}", prefs.site_rules.rule_count());
    println!("  Global list:      {} rules", prefs.global_blacklist.rule_count());

    if !warnings.is_empty() {
        println!("  Warnings:         {}", warnings.len());
        for warning in &warnings {
            println!("    {}", warning);
        }
    }
    Ok(())
}

fn cmd_migrate(input: &str, output: Option<&str>) -> Result<(), String> {
    let imported = read_document(input)?;
    eprintln!(
        "Migrated from version {} ({} warnings)",
        imported.from_version,
        imported.warnings.len()
    );
    write_output(&imported.prefs, output)
}

fn cmd_merge(base: &str, incoming: &str, output: Option<&str>) -> Result<(), String> {
    let mut prefs = read_document(base)?.prefs;
    let other = read_document(incoming)?;
    for warning in &other.warnings {
        eprintln!("Warning: {}", warning);
    }
    prefs.merge_from(&other.prefs);
    prefs.apply_settings(&other.settings);
    write_output(&prefs, output)
}

fn cmd_defaults(output: Option<&str>) -> Result<(), String> {
    let prefs = load_prefs(None)?;
    write_output(&prefs, output)
}

fn open_store(prefs: PreferenceRoot, private: bool) -> PolicyStore {
    let mut store = PolicyStore::new(prefs);
    if private {
        store.open_window(1, true);
    }
    store
}

fn cmd_resolve(url: &str, prefs: Option<&str>, private: bool) -> Result<(), String> {
    let address = decompose(url).map_err(|e| e.to_string())?;
    let store = open_store(load_prefs(prefs)?, private);
    let resolved = store.resolve(&address, private);

    println!("Address:");
    println!("  Protocol:  {}", address.protocol);
    println!("  Subdomain: {}", address.subdomain);
    println!("  Domain:    {}", address.domain);
    println!("  Path:      {}", address.path);
    println!("Policy: {} (matched {} of 3 levels)", resolved.policy, resolved.depth);
    println!("Site script list:");
    print_list(&resolved.blacklist);
    Ok(())
}

fn print_list(list: &BlacklistNode) {
    if list.children.is_empty() {
        println!("  (empty)");
    }
    for (domain, node) in &list.children {
        if let Some(rule) = node.rule {
            println!("  {:<40} {}", domain, if rule { "block" } else { "allow" });
        }
        for (subdomain, sub) in &node.children {
            if let Some(rule) = sub.rule {
                let origin = format!("{}.{}", subdomain, domain);
                println!("  {:<40} {}", origin, if rule { "block" } else { "allow" });
            }
        }
    }
}

fn cmd_decide(
    page: &str,
    url: &str,
    prefs: Option<&str>,
    request_type: &str,
    private: bool,
    policy: Option<&str>,
) -> Result<(), String> {
    let page = decompose(page).map_err(|e| e.to_string())?;
    let target = decompose(url).map_err(|e| e.to_string())?;
    let store = open_store(load_prefs(prefs)?, private);
    let ctx = store.context(&page, private);

    let verdict = match policy {
        Some(name) => {
            let policy = Policy::from_name(name).ok_or_else(|| format!("Unknown policy '{}'", name))?;
            store.decide_as(&ctx, policy, &target)
        }
        None => store.decide_in(&ctx, &target, RequestType::from_str(request_type)),
    };

    println!(
        "{} ({}, page policy {})",
        if verdict.block { "BLOCK" } else { "ALLOW" },
        verdict.reason,
        ctx.policy
    );
    Ok(())
}
