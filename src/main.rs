//! plagicheck CLI
//!
//! Fingerprints a file or directory tree and scans it against a knowledge
//! base, or emits the WFP container alone with `-fp`. Pretty JSON goes to
//! stdout; status, progress, and diagnostics stay on stderr.

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use plagicheck::engine::{has_wfp_extension, ScanConfig, ScanEngine};
use plagicheck::kb::LdbKnowledgeBase;
use plagicheck::{report, wfp};

const USAGE: &str = concat!(
    "Usage: plagicheck [-fp] [--output <file>] [--min-hits <N>] [-T <threads>] [-d] <file|directory|file.wfp>\n",
    "       plagicheck --version\n",
    "\n",
    "Options:\n",
    "  -fp                Generate WFP from file or directory (output only, no scan)\n",
    "  --output <file>    Output file for generated WFP (default: stdout)\n",
    "  --min-hits <N>     Minimum hits required for a valid snippet match (default: 3)\n",
    "  -T <threads>       Parallel worker threads (default: 3)\n",
    "  -d                 Enable debug output\n",
    "  --version          Show version information\n",
);

#[derive(Debug, Clone)]
struct ParsedArgs {
    fingerprint_only: bool,
    output: Option<PathBuf>,
    min_hits: u32,
    threads: usize,
    debug: bool,
    path: PathBuf,
}

fn parse_args(argv: &[String]) -> Result<ParsedArgs, String> {
    let mut fingerprint_only = false;
    let mut output: Option<PathBuf> = None;
    let mut min_hits: u32 = 3;
    let mut threads: usize = 3;
    let mut debug = false;
    let mut path: Option<PathBuf> = None;

    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        match arg {
            "-fp" | "--fp" => {
                fingerprint_only = true;
                i += 1;
            }
            "--output" | "-output" => {
                let value = argv.get(i + 1).ok_or("--output requires a value")?;
                output = Some(PathBuf::from(value));
                i += 2;
            }
            "--min-hits" | "-min-hits" => {
                let value = argv.get(i + 1).ok_or("--min-hits requires a value")?;
                min_hits = value
                    .parse()
                    .map_err(|_| "--min-hits must be an integer".to_string())?;
                if min_hits < 1 {
                    return Err("--min-hits must be >= 1".into());
                }
                i += 2;
            }
            "-T" | "--threads" => {
                let value = argv.get(i + 1).ok_or("-T requires a value")?;
                threads = value
                    .parse()
                    .map_err(|_| "-T must be an integer".to_string())?;
                i += 2;
            }
            "-d" | "--debug" => {
                debug = true;
                i += 1;
            }
            "--version" | "-version" => {
                println!("plagicheck version {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            _ if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}"));
            }
            _ => {
                if path.is_some() {
                    return Err("exactly one input path is expected".into());
                }
                path = Some(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    let path = path.ok_or("missing input path")?;
    Ok(ParsedArgs {
        fingerprint_only,
        output,
        min_hits,
        threads: threads.max(1),
        debug,
        path,
    })
}

/// Captures `progress:<done>/<total>` lines and animates a progress bar
/// on stderr. A line restarting the count (or changing the total) starts
/// a fresh bar, so the fingerprinting and scanning passes each get one.
struct ProgressWriter {
    bar: Option<ProgressBar>,
    total: u64,
}

impl ProgressWriter {
    fn new() -> Self {
        Self { bar: None, total: 0 }
    }

    fn handle(&mut self, msg: &str) {
        let Some(rest) = msg.trim().strip_prefix("progress:") else {
            return;
        };
        let Some((current, total)) = rest.split_once('/') else {
            return;
        };
        let (Ok(current), Ok(total)) = (current.parse::<u64>(), total.parse::<u64>()) else {
            return;
        };

        if self.bar.is_none() || self.total != total || current == 1 {
            if let Some(old) = self.bar.take() {
                old.finish_and_clear();
            }
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            self.bar = Some(bar);
            self.total = total;
        }
        if let Some(bar) = &self.bar {
            bar.set_position(current);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
            eprintln!();
        }
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        self.finish();
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for line in String::from_utf8_lossy(buf).lines() {
            self.handle(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "plagicheck=debug" } else { "plagicheck=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn fingerprint_only(path: &Path, output: Option<&Path>) -> Result<(), String> {
    let meta =
        std::fs::metadata(path).map_err(|e| format!("error accessing {}: {e}", path.display()))?;
    let wfp_text = if meta.is_dir() {
        wfp::generate_from_dir(path, None)
    } else {
        wfp::generate_from_file(path)
    }
    .map_err(|e| format!("error generating WFP: {e}"))?;

    match output {
        Some(out) => {
            std::fs::write(out, &wfp_text).map_err(|e| format!("error writing file: {e}"))?;
            eprintln!("WFP successfully generated at: {}", out.display());
        }
        None => print!("{wfp_text}"),
    }
    Ok(())
}

fn scan(args: &ParsedArgs) -> Result<(), String> {
    let config = ScanConfig {
        min_hits: args.min_hits,
        threads: args.threads,
        ..ScanConfig::default()
    };
    let kb = Arc::new(LdbKnowledgeBase::new(&config.kb_name));
    let engine = ScanEngine::new(config, kb);

    let meta = std::fs::metadata(&args.path)
        .map_err(|e| format!("error accessing {}: {e}", args.path.display()))?;
    if !(meta.is_file() && has_wfp_extension(&args.path)) {
        eprintln!("Generating WFP...");
    }
    eprintln!("Scanning files with {} threads...", args.threads);

    // The writer finishes its bar when the engine drops it.
    let progress: Box<dyn Write + Send> = Box::new(ProgressWriter::new());
    let results = engine
        .scan(&args.path, Some(progress))
        .map_err(|e| format!("error scanning: {e}"))?;

    let rendered = report::json::render(&results).map_err(|e| format!("error generating JSON: {e}"))?;
    println!("{rendered}");
    Ok(())
}

fn main() -> ExitCode {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("Error: {msg}");
            eprint!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(args.debug);

    let outcome = if args.fingerprint_only {
        fingerprint_only(&args.path, args.output.as_deref())
    } else {
        scan(&args)
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("Error: {msg}");
            ExitCode::FAILURE
        }
    }
}
