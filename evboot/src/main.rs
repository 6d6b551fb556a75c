// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use evboot::descriptor::AdapterType;
use evboot::utils::string::{hex_bytes, pretty_sectors};
use evboot::utils::{LogLevel, set_log_level, tag};
use evboot::{Orchestrator, PrepReport, Settings, log_normal};
use evio::prelude::*;
use evpart::SectorKind;

#[derive(Parser)]
#[command(
    name = "evboot",
    version,
    about = "Boot forensic disk images in VMware without writing to the evidence",
    long_about = None
)]
struct Cli {
    /// Settings file (defaults to ./evboot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Evidence {
    /// Image file, every chunk of a split image, or a device node
    #[arg(required = true)]
    evidence: Vec<PathBuf>,

    /// Treat the single path as a physical device
    #[arg(long, conflicts_with = "discover")]
    device: bool,

    /// Collect sibling chunks of the given first chunk (disk.001, disk.002, ...)
    #[arg(long)]
    discover: bool,
}

#[derive(Args)]
struct Overrides {
    /// Output directory for the fabricated MBR, descriptor and VMX
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, value_enum)]
    adapter: Option<AdapterType>,

    /// Template boot sector for partition images
    #[arg(long)]
    template: Option<PathBuf>,

    /// Hash the evidence before and after and fail on any change
    #[arg(long)]
    verify: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fabricate, describe, mount, classify the guest and patch the disk serial
    Prepare {
        #[command(flatten)]
        evidence: Evidence,
        #[command(flatten)]
        overrides: Overrides,

        /// Where the guest volume is mounted while its registry is read
        #[arg(long)]
        mount_point: Option<PathBuf>,

        #[arg(long)]
        no_vmx: bool,
    },
    /// Write the fabricated MBR and the descriptor only; nothing is mounted
    Descriptor {
        #[command(flatten)]
        evidence: Evidence,
        #[command(flatten)]
        overrides: Overrides,

        /// Capacity of the virtual disk a partition image is placed on
        #[arg(long)]
        parent_sectors: Option<u64>,
    },
    /// Show how the first sector is classified
    Inspect {
        #[command(flatten)]
        evidence: Evidence,
    },
    /// Print chunk files in concatenation order
    Order {
        #[arg(required = true)]
        chunks: Vec<PathBuf>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", tag(), format!("{e:#}").red());
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    set_log_level(if cli.quiet {
        LogLevel::Quiet
    } else if cli.verbose {
        LogLevel::Verbose
    } else {
        LogLevel::Normal
    });

    match cli.command {
        Commands::Prepare {
            evidence,
            overrides,
            mount_point,
            no_vmx,
        } => {
            let mut settings = Settings::load(cli.config.as_deref())?;
            overrides.apply(&mut settings);
            if let Some(mp) = mount_point {
                settings.mount_point = mp;
            }
            if no_vmx {
                settings.write_vmx = false;
            }
            settings.validate()?;
            let source = evidence.source()?;
            prepare(&settings, source)?;
        }
        Commands::Descriptor {
            evidence,
            overrides,
            parent_sectors,
        } => {
            let mut settings = Settings::load(cli.config.as_deref())?;
            overrides.apply(&mut settings);
            if let Some(n) = parent_sectors {
                settings.parent_disk_sectors = n;
            }
            settings.validate()?;
            let source = evidence.source()?;
            let report = Orchestrator::offline(&settings).describe(source)?;
            print_report(&report);
        }
        Commands::Inspect { evidence } => inspect(&evidence.source()?)?,
        Commands::Order { mut chunks } => {
            let order = order_chunks(&mut chunks);
            log_normal!("{:?} order, {} chunk(s)", order, chunks.len());
            for (i, c) in chunks.iter().enumerate() {
                println!("{:>4}  {}", i + 1, c.display());
            }
        }
    }

    Ok(())
}

impl Evidence {
    fn source(&self) -> anyhow::Result<DiskImageSource> {
        let first = &self.evidence[0];
        if self.device {
            if self.evidence.len() != 1 {
                bail!("--device takes exactly one path");
            }
            return Ok(DiskImageSource::PhysicalDevice(first.clone()));
        }
        let mut paths = if self.discover {
            let (found, order) = discover_chunks(first)
                .map_err(|e| e.at_path(first))
                .with_context(|| format!("collecting chunks of {}", first.display()))?;
            log_normal!("Found {} chunk(s), {:?} order", found.len(), order);
            found
        } else {
            self.evidence.clone()
        };
        match paths.len() {
            0 => bail!("no evidence files found next to {}", first.display()),
            1 => Ok(DiskImageSource::SingleFile(paths.remove(0))),
            _ => {
                order_chunks(&mut paths);
                Ok(DiskImageSource::ChunkedFiles(paths))
            }
        }
    }
}

impl Overrides {
    fn apply(&self, settings: &mut Settings) {
        if let Some(o) = &self.output {
            settings.output_dir = o.clone();
        }
        if let Some(a) = self.adapter {
            settings.adapter_type = a;
        }
        if let Some(t) = &self.template {
            settings.mbr_template = Some(t.clone());
        }
        if self.verify {
            settings.verify_evidence = true;
        }
    }
}

#[cfg(feature = "host-tools")]
fn prepare(settings: &Settings, source: DiskImageSource) -> anyhow::Result<()> {
    use evboot::host::{HivexRegistry, HostTool, VmwareMount};

    let mut mount = VmwareMount::new(&settings.mount_point);
    let mut registry = HivexRegistry;
    mount.validate_binaries()?;
    registry.validate_binaries()?;

    let report = Orchestrator::new(&mut mount, &mut registry, settings).run(source)?;
    print_report(&report);
    Ok(())
}

#[cfg(not(feature = "host-tools"))]
fn prepare(_settings: &Settings, _source: DiskImageSource) -> anyhow::Result<()> {
    bail!("built without host tools; use `evboot descriptor` or enable the host-tools feature")
}

fn print_report(report: &PrepReport) {
    log_normal!("Done: {}", report.descriptor_path.display());
    if let Some(mbr) = &report.fabricated_mbr {
        println!("  MBR        : {}", mbr.display());
    }
    println!("  Kind       : {:?}", report.kind);
    println!(
        "  Disk       : {} in {} extent(s), {} zero",
        pretty_sectors(report.descriptor.total_sectors()),
        report.descriptor.extents.len(),
        pretty_sectors(report.descriptor.zero_sectors())
    );
    if let Some(id) = &report.guest_os_id {
        println!("  Guest OS   : {id}");
    }
    if let Some(serial) = report.serial {
        println!("  Serial     : {}", hex_bytes(&serial));
    }
    if let Some(vmx) = &report.vmx_path {
        println!("  VMX        : {}", vmx.display());
    }
    if let Some(crc) = report.evidence_crc32 {
        println!("  Evidence   : crc32 {crc:08x} (unchanged)");
    }
}

fn inspect(source: &DiskImageSource) -> anyhow::Result<()> {
    let first: &Path = source.first_path()?;
    let bytes = source
        .read_first_sector()
        .map_err(|e| e.at_path(first))
        .with_context(|| format!("reading {}", first.display()))?;
    let sector = evpart::BootSector::parse(&bytes)?;
    let kind = sector.classify()?;

    log_normal!("{source}");
    println!("  Size       : {}", pretty_sectors(source.total_bytes()? / 512));
    println!("  Kind       : {kind:?}");
    match kind {
        SectorKind::PartitionOnly => {
            println!("  Filesystem : {}", sector.volume_filesystem());
        }
        SectorKind::FullDisk => {
            println!("  Serial     : {}", hex_bytes(&sector.disk_serial()));
            println!("  Described  : {}", pretty_sectors(sector.described_sectors()));
            for (i, e) in sector.entries().iter().enumerate() {
                if e.is_empty() {
                    continue;
                }
                let boot = if e.is_bootable() { "*" } else { " " };
                println!(
                    "  {}{} type {:02X}  start {:>12}  sectors {:>12}  end CHS {:?}",
                    boot,
                    i + 1,
                    e.partition_type,
                    e.start_lba,
                    e.sector_count,
                    e.end()
                );
            }
        }
    }
    Ok(())
}
