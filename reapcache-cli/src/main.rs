//! reapcache CLI
//!
//! Demonstrates the TTL cache's expiry timeline and load-tests it with
//! concurrent readers and writers.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reapcache_cache::{CachedFetcher, TtlCache};
use reapcache_core::{CacheConfig, Fetcher};

/// reapcache - concurrent TTL cache with a background reaper
#[derive(Parser)]
#[command(name = "reapcache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON cache config file; overrides the per-command expiry flags
    #[arg(short, long, global = true, env = "REAPCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the expiry timeline of a single entry
    Demo {
        /// Entry time-to-live in milliseconds
        #[arg(long, default_value = "100", env = "REAPCACHE_TTL_MS")]
        ttl_ms: u64,
        /// Reaper sweep interval in milliseconds
        #[arg(long, default_value = "50", env = "REAPCACHE_SWEEP_MS")]
        sweep_ms: u64,
        /// Simulated latency of the slow fetch in milliseconds
        #[arg(long, default_value = "20")]
        fetch_latency_ms: u64,
    },

    /// Run concurrent writers and readers against one cache
    Bench {
        /// Number of writer threads
        #[arg(short, long, default_value = "4")]
        writers: usize,
        /// Number of reader threads
        #[arg(short, long, default_value = "4")]
        readers: usize,
        /// Operations per thread
        #[arg(short, long, default_value = "100000")]
        ops: usize,
        /// Distinct keys per writer
        #[arg(short, long, default_value = "1000")]
        keys: usize,
        /// Entry time-to-live in milliseconds
        #[arg(long, default_value = "250", env = "REAPCACHE_TTL_MS")]
        ttl_ms: u64,
        /// Reaper sweep interval in milliseconds
        #[arg(long, default_value = "100", env = "REAPCACHE_SWEEP_MS")]
        sweep_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "reapcache=debug,reapcache_cache=debug,reapcache_core=debug,info"
    } else {
        "reapcache=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Demo {
            ttl_ms,
            sweep_ms,
            fetch_latency_ms,
        } => {
            let config = load_config(cli.config.as_deref(), ttl_ms, sweep_ms)?;
            cmd_demo(config, Duration::from_millis(fetch_latency_ms)).await
        }
        Commands::Bench {
            writers,
            readers,
            ops,
            keys,
            ttl_ms,
            sweep_ms,
        } => {
            let config = load_config(cli.config.as_deref(), ttl_ms, sweep_ms)?;
            let opts = BenchOptions {
                writers,
                readers,
                ops,
                keys: keys.max(1),
            };
            tokio::task::spawn_blocking(move || cmd_bench(config, opts))
                .await
                .context("bench task panicked")?
        }
    }
}

/// Builds the cache config from a file if given, otherwise from flags.
fn load_config(path: Option<&Path>, ttl_ms: u64, sweep_ms: u64) -> Result<CacheConfig> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            CacheConfig::from_json(&json).context("parsing cache config")?
        }
        None => CacheConfig::new()
            .ttl(Duration::from_millis(ttl_ms))
            .sweep_interval(Duration::from_millis(sweep_ms)),
    };
    debug!(?config, "loaded cache config");
    Ok(config)
}

/// Stand-in for a remote API call.
struct SlowFetcher {
    latency: Duration,
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, key: &str) -> reapcache_core::Result<Bytes> {
        tokio::time::sleep(self.latency).await;
        Ok(Bytes::from(format!("{{\"url\":\"{key}\"}}")))
    }
}

/// Replay the expiry timeline
async fn cmd_demo(config: CacheConfig, fetch_latency: Duration) -> Result<()> {
    println!("{}", "⏱  reapcache expiry demo".cyan().bold());
    println!(
        "   ttl = {}ms, sweep interval = {}ms\n",
        config.ttl_millis, config.sweep_interval_millis
    );

    let (cache, reaper) = TtlCache::new(config.clone()).context("creating cache")?;
    let memo = CachedFetcher::new(cache.clone(), SlowFetcher { latency: fetch_latency });
    let url = "https://pokeapi.co/api/v2/location-area";
    let t0 = Instant::now();

    let stamp = |label: &str, detail: String| {
        println!("   [{:>6}ms] {:<10} {}", t0.elapsed().as_millis(), label, detail);
    };

    let first = memo.get(url).await?;
    stamp(
        if first.from_cache { "hit" } else { "fetched" },
        format!("{} bytes", first.payload.len()),
    );

    let second = memo.get(url).await?;
    stamp(
        if second.from_cache { "hit" } else { "fetched" },
        format!("{} bytes", second.payload.len()),
    );

    let bound = config.ttl_duration() + config.sweep_interval_duration() + Duration::from_millis(10);
    tokio::time::sleep(bound.saturating_sub(t0.elapsed())).await;

    match cache.get(url) {
        Ok(payload) => stamp("present".red().to_string().as_str(), format!("{} bytes", payload.len())),
        Err(e) if e.is_miss() => stamp("expired", "reaped by background sweep".to_string()),
        Err(e) => return Err(e.into()),
    }

    let sweeps = reaper.sweeps();
    reaper.stop();

    println!("\n{}", "📈 Results:".green().bold());
    println!("   Sweeps run: {}", sweeps);
    println!("   Entries left: {}", cache.len());
    if cache.get(url).is_err() {
        println!("   {} Entry expired within ttl + sweep interval", "✅".green());
    } else {
        println!("   {} Entry outlived ttl + sweep interval", "❌".red());
    }

    Ok(())
}

struct BenchOptions {
    writers: usize,
    readers: usize,
    ops: usize,
    keys: usize,
}

/// Writes `opts.ops` entries for writer `w`, cycling over its key space.
fn write_keys(cache: &TtlCache, w: usize, opts: &BenchOptions, pb: &ProgressBar) -> reapcache_core::Result<()> {
    for i in 0..opts.ops {
        let key = format!("https://bench.test/{}/{}", w, i % opts.keys);
        cache.add(key, vec![(i % 251) as u8; 64])?;
        if i % 1000 == 999 {
            pb.inc(1000);
        }
    }
    pb.inc((opts.ops % 1000) as u64);
    Ok(())
}

/// Run the concurrent load bench
fn cmd_bench(config: CacheConfig, opts: BenchOptions) -> Result<()> {
    println!(
        "{} {} writers, {} readers, {} ops each",
        "📊 Benchmarking with".cyan().bold(),
        opts.writers,
        opts.readers,
        opts.ops
    );

    let (cache, reaper) = TtlCache::new(config).context("creating cache")?;
    let total = ((opts.writers + opts.readers) * opts.ops) as u64;

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let hits = AtomicU64::new(0);
    let misses = AtomicU64::new(0);
    let start = Instant::now();

    thread::scope(|s| -> Result<()> {
        let mut writers = Vec::with_capacity(opts.writers);
        for w in 0..opts.writers {
            let cache = &cache;
            let pb = &pb;
            let opts = &opts;
            writers.push(s.spawn(move || write_keys(cache, w, opts, pb)));
        }
        for r in 0..opts.readers {
            let cache = &cache;
            let pb = &pb;
            let hits = &hits;
            let misses = &misses;
            let writers = opts.writers.max(1);
            s.spawn(move || {
                for i in 0..opts.ops {
                    let key = format!("https://bench.test/{}/{}", (r + i) % writers, i % opts.keys);
                    match cache.get(&key) {
                        Ok(_) => hits.fetch_add(1, Ordering::Relaxed),
                        Err(_) => misses.fetch_add(1, Ordering::Relaxed),
                    };
                    if i % 1000 == 999 {
                        pb.inc(1000);
                    }
                }
                pb.inc((opts.ops % 1000) as u64);
            });
        }
        for (w, writer) in writers.into_iter().enumerate() {
            writer
                .join()
                .map_err(|_| anyhow!("writer {w} panicked"))?
                .with_context(|| format!("writer {w} failed"))?;
        }
        Ok(())
    })?;
    pb.finish();

    let elapsed = start.elapsed();
    let sweeps = reaper.sweeps();
    let failed = reaper.failed_sweeps();
    let state = reaper.state();
    reaper.stop();

    let hits = hits.load(Ordering::Relaxed);
    let misses = misses.load(Ordering::Relaxed);
    let rate = total as f64 / elapsed.as_secs_f64();

    println!("\n{}", "📈 Results:".green().bold());
    println!("   Elapsed: {:?}", elapsed);
    println!("   Throughput: {:.0} ops/sec", rate);
    println!("   Reads: {} hits, {} misses", hits, misses);
    println!("   Entries live at end: {}", cache.len());
    println!("   Reaper: {:?}, {} sweeps, {} failed", state, sweeps, failed);

    if failed == 0 {
        println!("   {} No sweep failures", "✅".green());
    } else {
        println!("   {} {} sweeps failed", "❌".red(), failed);
    }

    Ok(())
}
