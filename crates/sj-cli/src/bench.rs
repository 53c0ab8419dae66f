use std::cmp::Ordering;
use std::time::Instant;

use sj_core::{decompose, Address, PolicyStore, PreferenceRoot, RequestType, Tabs, TOP_FRAME};

pub const DEFAULT_SEED: u32 = 0xc0ffee;

pub struct BenchOptions {
    pub prefs: PreferenceRoot,
    pub iterations: usize,
    pub pages: usize,
    pub reqs_per_page: usize,
    pub seed: u32,
    pub trace_path: Option<String>,
    pub trace_limit: usize,
}

/// One page load and the resources it requests.
struct BenchPage {
    page: Address,
    requests: Vec<(RequestType, Address)>,
}

pub fn run(opts: BenchOptions) -> Result<(), String> {
    println!("============================================================");
    println!("ScriptJaeger Decision Benchmark");
    println!("============================================================");

    let pages = match &opts.trace_path {
        Some(path) => {
            println!("Loading trace: {} (limit {})", path, opts.trace_limit);
            load_trace_jsonl(path, opts.trace_limit)?
        }
        None => {
            println!(
                "Generating synthetic workload: pages={}, reqs/page={}, seed={}",
                opts.pages, opts.reqs_per_page, opts.seed
            );
            generate_synthetic_workload(opts.pages, opts.reqs_per_page, opts.seed)
        }
    };
    let request_count: usize = pages.iter().map(|page| page.requests.len()).sum();
    println!("Dataset size: {} pages, {} requests", pages.len(), request_count);
    println!("Iterations: {}", opts.iterations);
    println!();

    let store = PolicyStore::new(opts.prefs);

    println!("Warming up...");
    run_in_context(&store, &pages, 10);
    println!();

    let result = run_in_context(&store, &pages, opts.iterations);
    println!("{}", format_result("decide_in (resolved context)", &result));
    println!();

    let result = run_with_tabs(&store, &pages, opts.iterations);
    println!("{}", format_result("Tabs::decide (navigate + record)", &result));
    println!();

    println!("Notes:");
    println!("- Tabs::decide includes the per-page navigation (resolve) cost, spread over its requests.");
    Ok(())
}

struct BenchResult {
    op_count: usize,
    total_ms: f64,
    avg_us: f64,
    p50_us: f64,
    p95_us: f64,
    p99_us: f64,
    ops_per_sec: u64,
    blocked_pct: f64,
}

fn summarize(mut samples_us: Vec<f64>, op_count: usize, blocked: usize, total_ms: f64) -> BenchResult {
    samples_us.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let avg_us = if op_count == 0 { 0.0 } else { total_ms * 1000.0 / op_count as f64 };

    BenchResult {
        op_count,
        total_ms,
        avg_us,
        p50_us: percentile(&samples_us, 0.50),
        p95_us: percentile(&samples_us, 0.95),
        p99_us: percentile(&samples_us, 0.99),
        ops_per_sec: if total_ms > 0.0 { (op_count as f64 / (total_ms / 1000.0)) as u64 } else { 0 },
        blocked_pct: if op_count == 0 { 0.0 } else { blocked as f64 * 100.0 / op_count as f64 },
    }
}

fn run_in_context(store: &PolicyStore, pages: &[BenchPage], iterations: usize) -> BenchResult {
    let contexts: Vec<_> = pages.iter().map(|page| store.context(&page.page, false)).collect();
    let mut samples_us = Vec::new();
    let mut op_count = 0usize;
    let mut blocked = 0usize;

    let start = Instant::now();
    for _ in 0..iterations {
        for (page, ctx) in pages.iter().zip(&contexts) {
            for (kind, target) in &page.requests {
                let op_start = Instant::now();
                let verdict = store.decide_in(ctx, target, *kind);
                samples_us.push(op_start.elapsed().as_secs_f64() * 1_000_000.0);
                op_count += 1;
                blocked += usize::from(verdict.block);
            }
        }
    }
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;

    summarize(samples_us, op_count, blocked, total_ms)
}

fn run_with_tabs(store: &PolicyStore, pages: &[BenchPage], iterations: usize) -> BenchResult {
    let mut tabs = Tabs::new();
    let mut samples_us = Vec::new();
    let mut op_count = 0usize;
    let mut blocked = 0usize;

    let start = Instant::now();
    for _ in 0..iterations {
        for page in pages {
            if page.requests.is_empty() {
                continue;
            }
            let batch_start = Instant::now();
            tabs.navigate(store, 1, &page.page, false);
            for (i, (kind, target)) in page.requests.iter().enumerate() {
                let frame = if kind.contains(RequestType::SUBDOCUMENT) { i as i32 + 1 } else { TOP_FRAME };
                let verdict = tabs.decide(store, 1, frame, TOP_FRAME, *kind, target);
                blocked += usize::from(verdict.block);
            }
            let per_op = batch_start.elapsed().as_secs_f64() * 1_000_000.0 / page.requests.len() as f64;
            samples_us.extend(std::iter::repeat(per_op).take(page.requests.len()));
            op_count += page.requests.len();
        }
    }
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;

    summarize(samples_us, op_count, blocked, total_ms)
}

fn format_result(name: &str, result: &BenchResult) -> String {
    format!(
        "{}:\n  Ops:         {}\n  Total time:  {:.2}ms\n  Avg latency: {:.3}μs\n  P50 latency: {:.3}μs\n  P95 latency: {:.3}μs\n  P99 latency: {:.3}μs\n  Throughput:  {} ops/sec\n  Blocked:     {:.1}%",
        name,
        result.op_count,
        result.total_ms,
        result.avg_us,
        result.p50_us,
        result.p95_us,
        result.p99_us,
        result.ops_per_sec,
        result.blocked_pct,
    )
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(values.len() - 1);
    values[idx]
}

fn load_trace_jsonl(path: &str, limit: usize) -> Result<Vec<BenchPage>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read trace '{}': {}", path, e))?;

    let mut pages: Vec<BenchPage> = Vec::new();
    let mut count = 0usize;
    for line in text.lines() {
        if count >= limit {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(val) => val,
            Err(_) => continue,
        };
        let page_url = value.get("page").and_then(|v| v.as_str()).unwrap_or("");
        let url = value.get("url").and_then(|v| v.as_str()).unwrap_or("");
        let (Ok(page), Ok(target)) = (decompose(page_url), decompose(url)) else {
            log::debug!("skipping trace record without usable URLs: {}", trimmed);
            continue;
        };
        let kind = RequestType::from_str(value.get("type").and_then(|v| v.as_str()).unwrap_or("script"));

        match pages.last_mut() {
            Some(last) if last.page == page => last.requests.push((kind, target)),
            _ => pages.push(BenchPage {
                page,
                requests: vec![(kind, target)],
            }),
        }
        count += 1;
    }

    if pages.is_empty() {
        return Err(format!("Trace loaded 0 requests from {}", path));
    }
    Ok(pages)
}

fn create_rng(seed: u32) -> impl FnMut() -> f64 {
    let mut state = seed;
    move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state as f64) / (u32::MAX as f64)
    }
}

fn pick<'a>(items: &[&'a str], rand: &mut impl FnMut() -> f64) -> &'a str {
    let idx = (rand() * items.len() as f64).floor() as usize;
    items[idx.min(items.len() - 1)]
}

fn generate_synthetic_workload(pages: usize, reqs_per_page: usize, seed: u32) -> Vec<BenchPage> {
    let mut rng = create_rng(seed);

    const TOP_SITES: &[&str] = &[
        "www.amazon.com",
        "www.facebook.com",
        "onedrive.live.com",
        "www.netflix.com",
        "www.linkedin.com",
        "duckduckgo.com",
        "en.wikipedia.org",
        "www.nytimes.com",
        "news.bbc.co.uk",
        "github.com",
        "www.reddit.com",
        "stackoverflow.com",
    ];

    const CDN_HOSTS: &[&str] = &[
        "cdnjs.cloudflare.com",
        "cdn.jsdelivr.net",
        "ajax.googleapis.com",
        "static.xx.fbcdn.net",
        "code.jquery.com",
        "i.ytimg.com",
        "s.ytimg.com",
    ];

    const TRACKER_HOSTS: &[&str] = &[
        "www.googletagmanager.com",
        "stats.g.doubleclick.net",
        "connect.facebook.net",
        "aax.amazon-adsystem.com",
        "snap.licdn.com",
        "bat.bing.com",
        "apis.google.com",
    ];

    const PATHS: &[&str] = &["/assets/app.js", "/js/vendor.js", "/static/main.js", "/widget.js"];

    let mut out = Vec::with_capacity(pages);
    for _ in 0..pages {
        let site = pick(TOP_SITES, &mut rng);
        let page = match decompose(&format!("https://{}/", site)) {
            Ok(page) => page,
            Err(_) => continue,
        };

        let mut requests = Vec::with_capacity(reqs_per_page);
        for _ in 0..reqs_per_page {
            let roll = rng();
            let (kind, host) = if roll < 0.35 {
                (RequestType::SCRIPT, site)
            } else if roll < 0.65 {
                (RequestType::SCRIPT, pick(CDN_HOSTS, &mut rng))
            } else if roll < 0.90 {
                (RequestType::SCRIPT, pick(TRACKER_HOSTS, &mut rng))
            } else if roll < 0.95 {
                (RequestType::SUBDOCUMENT, pick(TRACKER_HOSTS, &mut rng))
            } else {
                (RequestType::PING, pick(TRACKER_HOSTS, &mut rng))
            };
            let path = pick(PATHS, &mut rng);
            if let Ok(target) = decompose(&format!("https://{}{}", host, path)) {
                requests.push((kind, target));
            }
        }
        out.push(BenchPage { page, requests });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.50), 5.0);
        assert_eq!(percentile(&values, 0.99), 10.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_synthetic_workload_is_deterministic() {
        let a = generate_synthetic_workload(20, 10, DEFAULT_SEED);
        let b = generate_synthetic_workload(20, 10, DEFAULT_SEED);
        assert_eq!(a.len(), 20);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.page, y.page);
            assert_eq!(x.requests, y.requests);
        }
    }

    #[test]
    fn test_bench_runs_on_small_workload() {
        let store = PolicyStore::default();
        let pages = generate_synthetic_workload(5, 5, 7);
        let result = run_in_context(&store, &pages, 2);
        assert_eq!(result.op_count, 50);
        let result = run_with_tabs(&store, &pages, 1);
        assert_eq!(result.op_count, 25);
    }
}
