use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use vmm::{Config, EvictionPolicy, OperatingSystem, Program, StepOutcome};

mod console;

#[derive(Parser)]
#[command(name = "vmsim")]
#[command(about = "Runs a scripted workload through the demand-paging memory manager")]
struct Args {
    /// Physical memory size in cells
    #[arg(long, default_value_t = 50)]
    physical_size: usize,

    /// Cells per page; must be a power of two
    #[arg(long, default_value_t = 4)]
    page_size: usize,

    /// Number of pages in the virtual address space
    #[arg(long, default_value_t = 256)]
    virtual_pages: usize,

    /// Stop after this many ticks instead of running every process to completion
    #[arg(long)]
    ticks: Option<usize>,

    /// Memory size of a program to start; repeat to start several processes
    #[arg(short, long = "program", value_name = "SIZE", default_values_t = [32, 16, 24])]
    programs: Vec<usize>,

    /// Which resident page to evict when physical memory is full
    #[arg(long, value_enum, default_value_t = Eviction::FirstResident)]
    eviction: Eviction,

    /// Keep the frames of closed processes reserved
    #[arg(long)]
    leak_frames_on_close: bool,

    /// Log every step
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Eviction {
    FirstResident,
    Clock,
}

impl From<Eviction> for EvictionPolicy {
    fn from(eviction: Eviction) -> Self {
        match eviction {
            Eviction::FirstResident => EvictionPolicy::FirstResident,
            Eviction::Clock => EvictionPolicy::Clock,
        }
    }
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Warn
        } else if self.verbose {
            LevelFilter::Trace
        } else {
            console::default_level()
        }
    }

    fn config(&self) -> Config {
        Config::new(self.physical_size, self.page_size, self.virtual_pages)
            .with_eviction(self.eviction.into())
            .with_release_frames_on_close(!self.leak_frames_on_close)
    }
}

/// Running totals over a whole simulation.
#[derive(Debug, Default, PartialEq, Eq)]
struct Totals {
    ticks: usize,
    steps: usize,
    faults: usize,
    evictions: usize,
    closed: usize,
}

impl Totals {
    fn record(&mut self, outcomes: &[StepOutcome]) {
        self.ticks += 1;
        self.steps += outcomes.len();
        self.faults += outcomes.iter().filter(|outcome| outcome.faulted).count();
        self.evictions += outcomes
            .iter()
            .filter(|outcome| outcome.evicted.is_some())
            .count();
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = console::Console::init(args.log_level()) {
        eprintln!("failed to install logger: {e}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(totals) => {
            log::info!(
                "finished after {} ticks: {} steps, {} faults, {} evictions, {} processes closed",
                totals.ticks,
                totals.steps,
                totals.faults,
                totals.evictions,
                totals.closed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("simulation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<Totals, Box<dyn Error>> {
    let mut os = OperatingSystem::with_config(args.config())?;
    log::info!(
        "{} physical cells, {} virtual pages of {} cells, {}-bit addresses",
        args.physical_size,
        args.virtual_pages,
        args.page_size,
        os.address_bits()
    );

    for &size in &args.programs {
        // A program that does not fit is skipped; the rest still run
        if let Err(e) = os.start_process(Program::sequential(size)) {
            log::warn!("skipping program of {} cells: {}", size, e);
        }
    }

    let mut totals = Totals::default();
    while os.process_count() > 0 && args.ticks.is_none_or(|limit| totals.ticks < limit) {
        let outcomes = os.step_all()?;
        totals.record(&outcomes);

        for outcome in &outcomes {
            log::debug!(
                "process {} {:#x} -> {}{}",
                outcome.pid,
                outcome.virtual_address,
                outcome.physical_address,
                match (outcome.faulted, outcome.evicted) {
                    (true, Some(victim)) => format!(" (fault, evicted page {victim})"),
                    (true, None) => String::from(" (fault)"),
                    _ => String::new(),
                }
            );
        }

        for pid in os.finished_processes() {
            os.close_process(pid)?;
            totals.closed += 1;
        }

        log::info!(
            "tick {}: {} processes, {} resident pages, {} free cells in {} blocks",
            totals.ticks,
            os.process_count(),
            os.resident_page_count(),
            os.free_cells(),
            os.free_region_count()
        );
    }

    Ok(totals)
}
