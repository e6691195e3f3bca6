use clap::{CommandFactory, Parser};
use colored::*;
use std::collections::HashSet;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use sublicheck_core::{
    timestamp, ConsoleSink, JobPhase, JobSnapshot, LogLevel, RootDomain, ScanConfig, ScanEventSink,
    ScanOrchestrator, SinkRef,
};

mod progress;

use progress::ProgressSink;

#[derive(Parser, Debug)]
#[command(
    name = "sublicheck",
    version,
    about = "Concurrent subdomain enumeration and HTTP(S) probing",
    override_usage = "sublicheck <domains>...  <options>",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Single domain:                  sublicheck example.com
  Wildcard scope entries:         sublicheck '*.example.com' '*.example.org'
  Domains from file + CSV:        sublicheck -l scope.txt -o results.csv
  JSON lines export:              sublicheck example.com -o results.jsonl
  Bounded concurrency:            sublicheck -l scope.txt --max-domains 4 --probe-concurrency 10
  Config file:                    sublicheck -c scan.json
  Dry-run test:                   sublicheck -l scope.txt --dry-run"
)]
pub struct Args {
    #[arg(help = "Root domains to scan (wildcard prefixes like '*.' are stripped)")]
    pub domains: Vec<String>,

    #[arg(short = 'l', long = "list", help = "File containing root domains (one per line)")]
    pub list: Option<String>,

    #[arg(short = 'c', long = "config", help = "JSON config file; flags override its values")]
    pub config: Option<String>,

    #[arg(short = 'o', long, help = "Export non-200 results (.csv, or .json/.jsonl for JSON lines)")]
    pub output: Option<String>,

    #[arg(long, help = "Per-request timeout in seconds [default: 6]")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Maximum domains scanned at once, 0 = unbounded [default: 0]")]
    pub max_domains: Option<usize>,

    #[arg(long, help = "Concurrent probes per domain [default: 1]")]
    pub probe_concurrency: Option<usize>,

    #[arg(long, help = "Path to the subfinder binary (default: ./tools, cwd, then PATH)")]
    pub subfinder: Option<String>,

    #[arg(long, help = "Proxy URL for probes (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(long, help = "Fixed User-Agent instead of the rotating browser pool")]
    pub user_agent: Option<String>,

    #[arg(long, default_value_t = false, help = "Accept invalid TLS certificates")]
    pub insecure: bool,

    #[arg(long, default_value_t = false, help = "Plain line output instead of progress bars")]
    pub plain: bool,

    #[arg(short = 'v', long, default_value_t = false, help = "Verbose diagnostics on stderr")]
    pub verbose: bool,

    #[arg(long, default_value_t = false, help = "Show which domains would be scanned and exit")]
    pub dry_run: bool,
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();

    let result = match build_config(&args) {
        Ok(config) => {
            init_logging(config.verbose);
            run(&args, config).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprint!("{}\r\n", format!("[!] {:#}", e).red());
        process::exit(1);
    }
}

fn log_filter(verbose: bool) -> &'static str {
    if verbose { "sublicheck_core=debug" } else { "warn" }
}

fn init_logging(verbose: bool) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(verbose)))
        .target(env_logger::Target::Stderr)
        .init();
}

async fn run(args: &Args, config: ScanConfig) -> anyhow::Result<()> {
    let raw_domains = config.collect_domains()?;

    if raw_domains.is_empty() {
        eprint!("{}\r\n", "[!] No domains specified. Provide domains, -l <file> or -c <config>.".red());
        let mut cmd = Args::command();
        cmd.print_help().ok();
        process::exit(1);
    }

    let domains = unique_domains(&raw_domains);

    if config.dry_run {
        for domain in &domains {
            print!("[DRY RUN] Would scan domain: {}\r\n", domain);
        }
        std::io::stdout().flush().ok();
        return Ok(());
    }

    print_banner();
    print_scan_config(&config, domains.len());

    let orchestrator = ScanOrchestrator::from_config(&config)?;
    let bus = orchestrator.bus();

    let sink: SinkRef = if args.plain || !std::io::stderr().is_terminal() {
        ConsoleSink::new_ref()
    } else {
        Arc::new(ProgressSink::new())
    };
    let forwarder = bus.attach(sink);

    let started = orchestrator.submit(&domains);
    log::info!("started {} domain job(s)", started.len());

    orchestrator.wait().await;
    bus.close();
    let _ = forwarder.await;

    print_session_summary(&orchestrator);

    if let Some(path) = config.output_ref() {
        export(&orchestrator, path)?;
    }

    Ok(())
}

/// Config file first, then command-line overrides.
fn build_config(args: &Args) -> anyhow::Result<ScanConfig> {
    let mut config = match args.config.as_deref() {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    config.domains.extend(args.domains.iter().cloned());
    if let Some(ref list) = args.list {
        config.list_file = list.clone();
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(max) = args.max_domains {
        config.max_domains = max;
    }
    if let Some(n) = args.probe_concurrency {
        config.probe_concurrency = n;
    }
    if let Some(ref path) = args.subfinder {
        config.subfinder = path.clone();
    }
    if let Some(ref proxy) = args.proxy {
        config.proxy = proxy.clone();
    }
    if let Some(ref ua) = args.user_agent {
        config.user_agent = ua.clone();
    }
    config.accept_invalid_certs |= args.insecure;
    config.verbose |= args.verbose;
    config.dry_run |= args.dry_run;

    Ok(config)
}

/// Normalized, non-empty domains in first-seen order.
fn unique_domains(raw: &[String]) -> Vec<RootDomain> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|d| RootDomain::normalize(d))
        .filter(|d| !d.is_empty() && seen.insert(d.clone()))
        .collect()
}

fn export(orchestrator: &ScanOrchestrator, path: &str) -> anyhow::Result<()> {
    let aggregator = orchestrator.aggregator();
    let is_json = matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    );

    let rows = if is_json {
        aggregator.write_jsonl(path)?
    } else {
        aggregator.write_csv(path)?
    };

    let kind = if is_json { "JSON" } else { "CSV" };
    print!(
        "{}\r\n",
        format!("{} {} exported: {} ({} row(s))", timestamp(), kind, path, rows).green().bold()
    );
    std::io::stdout().flush().ok();
    Ok(())
}

fn print_banner() {
    let banner = r#"
   ___ _  _ ___ _    ___ ___ _  _ ___ ___ _  __
  / __| || | _ ) |  |_ _/ __| || | __/ __| |/ /
  \__ \ || | _ \ |__ | | (__| __ | _| (__| ' <
  |___/\__/|___/____|___\___|_||_|___\___|_|\_\
    "#;
    print!("{}\r\n", banner.bright_cyan().bold());
    print!("{}\r\n", "──────────────────────────────────────────────────".dimmed());
    std::io::stdout().flush().ok();
}

fn print_scan_config(config: &ScanConfig, domain_count: usize) {
    let max_domains = if config.max_domains == 0 {
        "unbounded".to_string()
    } else {
        config.max_domains.to_string()
    };

    print!("{}\r\n", format!("[+] Domains:     {}", domain_count).green().bold());
    print!("{}\r\n", format!("[+] Timeout:     {}s", config.timeout).blue());
    print!("{}\r\n", format!("[+] Max domains: {}", max_domains).blue());
    print!("{}\r\n", format!("[+] Probes:      {} per domain", config.probe_concurrency.max(1)).blue());
    if let Some(path) = config.subfinder_ref() {
        print!("{}\r\n", format!("[+] Subfinder:   {}", path).magenta());
    }
    if !config.proxy.is_empty() {
        print!("{}\r\n", format!("[+] Proxy:       {}", config.proxy).yellow());
    }
    if config.accept_invalid_certs {
        print!("{}\r\n", "[+] TLS:         invalid certificates accepted".yellow());
    }
    if let Some(path) = config.output_ref() {
        print!("{}\r\n", format!("[+] Output:      {}", path).blue());
    }
    print!("{}\r\n", "──────────────────────────────────────────────────".dimmed());
    std::io::stdout().flush().ok();
}

fn job_line(domain: &RootDomain, snap: &JobSnapshot) -> String {
    format!(
        "{:<30} {:<11} checked {}/{} | 200 OK: {} | {}%",
        domain.as_str(),
        snap.phase.to_string(),
        snap.checked,
        snap.total,
        snap.found,
        snap.percent()
    )
}

fn print_session_summary(orchestrator: &ScanOrchestrator) {
    let console = ConsoleSink::new_ref();

    console.on_log(LogLevel::Info, "");
    console.on_log(LogLevel::Info, &"━━━ Summary ━━━".bright_white().bold().to_string());
    for (domain, snap) in orchestrator.jobs() {
        let level = if snap.phase == JobPhase::Completed { LogLevel::Success } else { LogLevel::Warn };
        console.on_log(level, &job_line(&domain, &snap));
    }

    console.on_log(LogLevel::Info, "");
    console.on_log(LogLevel::Info, &"━━━ Status codes ━━━".bright_white().bold().to_string());
    orchestrator.aggregator().report_summary(&console);
}
