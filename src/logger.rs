use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only show progress bar and final summary
    Summary = 1,   // High-level run progress (default)
    Detailed = 2,  // Per-phase details and warnings
    Debug = 3,     // All messages including per-request tracing
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    fn tracing_directive(self) -> &'static str {
        match self {
            VerbosityLevel::Silent | VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "warn,logocluster=info",
            VerbosityLevel::Debug => "info,logocluster=debug",
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the verbosity-derived default.
pub fn init_tracing(verbosity: VerbosityLevel) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| verbosity.tracing_directive().into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init();
}

/// Ordered human-readable diagnostics collected while processing one domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticLog {
    lines: Vec<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!("{}", line);
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    total_domains: usize,
    logos_retrieved: usize,
    logos_failed: usize,
    hashes_saved: usize,
    groups_written: usize,
    output_files: Vec<String>,
}

/// Console reporting for a run: leveled messages, a progress bar during the
/// fetch phase and the closing summary.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    show_progress: bool,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    metadata: Arc<Mutex<RunMetadata>>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_progress: true,
            progress_bar: Arc::new(RwLock::new(None)),
            metadata: Arc::new(Mutex::new(RunMetadata::default())),
        }
    }

    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    fn metadata(&self) -> std::sync::MutexGuard<'_, RunMetadata> {
        self.metadata.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are shown regardless of verbosity
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Local::now().format("%H:%M:%S%.3f"), level, message);

        // Print above an active progress bar instead of tearing it
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    pub fn start_progress(&self, total_domains: u64) {
        {
            let mut metadata = self.metadata();
            metadata.start_time.get_or_insert_with(Instant::now);
            metadata.total_domains = total_domains as usize;
        }

        if !self.show_progress {
            return;
        }

        let pb = ProgressBar::new(total_domains);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sites ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Scraping logos...");

        if let Ok(mut guard) = self.progress_bar.write() {
            *guard = Some(pb);
        }
    }

    /// Record one finished domain and refresh the success/failed counters
    pub fn record_site(&self, success: bool) {
        let (retrieved, failed) = {
            let mut metadata = self.metadata();
            if success {
                metadata.logos_retrieved += 1;
            } else {
                metadata.logos_failed += 1;
            }
            (metadata.logos_retrieved, metadata.logos_failed)
        };

        if let Ok(guard) = self.progress_bar.read() {
            if let Some(pb) = guard.as_ref() {
                pb.inc(1);
                pb.set_message(format!("success={} failed={}", retrieved, failed));
            }
        }
    }

    pub fn finish_progress(&self, final_message: &str) {
        if let Ok(mut guard) = self.progress_bar.write() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        self.metadata().end_time = Some(Instant::now());
        self.info(final_message);
    }

    pub fn record_hashes_saved(&self, count: usize) {
        self.metadata().hashes_saved = count;
    }

    pub fn record_groups_written(&self, count: usize) {
        self.metadata().groups_written = count;
    }

    pub fn record_output_file(&self, path: &str) {
        self.metadata().output_files.push(path.to_string());
        self.info(&format!("Written: {}", path));
    }

    pub fn print_final_summary(&self) {
        let metadata = self.metadata().clone();

        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n==================================================");
        println!("LOGO SCRAPING COMPLETE - SUMMARY");
        println!("==================================================");

        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            println!("Run Duration:      {:.2}s", end.duration_since(start).as_secs_f64());
        }

        if metadata.total_domains > 0 {
            println!("Total domains:     {}", metadata.total_domains);
            println!("Logos retrieved:   {}", metadata.logos_retrieved);
            println!("Logos failed:      {}", metadata.logos_failed);
        }
        println!("Hashes saved:      {}", metadata.hashes_saved);
        if metadata.groups_written > 0 {
            println!("Groups written:    {}", metadata.groups_written);
        }
        for file in &metadata.output_files {
            println!("Output:            {}", file);
        }
        println!("==================================================\n");
    }
}
