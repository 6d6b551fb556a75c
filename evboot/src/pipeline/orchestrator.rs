// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use evio::prelude::*;
use evpart::mbr::PART_TYPE_NTFS;
use evpart::{
    BootSector, DEFAULT_HEADS, FabricatedBootSector, Persisted, SectorKind, VolumeFs,
    fabricate_geometry, load_template, parse_disk_serial,
};

use super::collab::*;
use super::{BootPreparationContext, PrepState};
use crate::config::Settings;
use crate::descriptor::{VirtualDiskDescriptor, synthesize};
use crate::error::{Phase, PrepError, PrepResult};
use crate::guest::{self, GuestOsClassification};
use crate::utils::progress::evidence_crc32;
use crate::utils::string::{hex_bytes, pretty_sectors};
use crate::vmx::VmxConfig;

/// Cooperative cancellation, checked between states.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished preparation produced.
#[derive(Debug, Clone)]
pub struct PrepReport {
    /// Every state visited, starting with `Unclassified`.
    pub states: Vec<PrepState>,
    pub kind: SectorKind,
    pub descriptor_path: PathBuf,
    pub descriptor: VirtualDiskDescriptor,
    pub fabricated_mbr: Option<PathBuf>,
    /// Guest facts; absent for a descriptor-only run.
    pub guest_os_id: Option<String>,
    pub guest: Option<GuestOsClassification>,
    /// Disk serial written into the fabricated MBR.
    pub serial: Option<[u8; 4]>,
    pub vmx_path: Option<PathBuf>,
    pub evidence_crc32: Option<u32>,
}

/// Guest facts gathered while the descriptor is mounted.
struct GuestFacts {
    guest_os_id: String,
    guest: GuestOsClassification,
    serial: Option<[u8; 4]>,
}

/// Output of the stages that run before anything is mounted.
struct Described {
    ctx: BootPreparationContext,
    first: PathBuf,
    kind: SectorKind,
    sector: BootSector,
    fabricated: Option<FabricatedBootSector<Persisted>>,
    descriptor: VirtualDiskDescriptor,
    descriptor_path: PathBuf,
    crc_before: Option<u32>,
}

/// Runs one preparation attempt through the state machine.
///
/// Evidence is only read. Once the descriptor is mounted, any failure or
/// cancellation unmounts it (forced) before the error is returned.
pub struct Orchestrator<'a> {
    mount: Option<&'a mut dyn Mount>,
    registry: Option<&'a mut dyn Registry>,
    settings: &'a Settings,
    cancel: CancelFlag,
    state: PrepState,
    visited: Vec<PrepState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        mount: &'a mut dyn Mount,
        registry: &'a mut dyn Registry,
        settings: &'a Settings,
    ) -> Self {
        Self {
            mount: Some(mount),
            registry: Some(registry),
            ..Self::offline(settings)
        }
    }

    /// Without collaborators: only `describe` can run.
    pub fn offline(settings: &'a Settings) -> Self {
        Self {
            mount: None,
            registry: None,
            settings,
            cancel: CancelFlag::new(),
            state: PrepState::Unclassified,
            visited: vec![PrepState::Unclassified],
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    #[inline]
    pub fn state(&self) -> PrepState {
        self.state
    }

    /// States visited by the last run, including the one it stopped in.
    #[inline]
    pub fn visited(&self) -> &[PrepState] {
        &self.visited
    }

    fn advance(&mut self, next: PrepState) -> PrepResult {
        if !self.state.can_advance_to(next) {
            return Err(PrepError::OutOfOrder {
                from: self.state,
                to: next,
            });
        }
        crate::log_verbose!("{} -> {}", self.state, next);
        self.state = next;
        self.visited.push(next);
        Ok(())
    }

    fn check_cancel(&self) -> PrepResult {
        if self.cancel.is_cancelled() {
            return Err(PrepError::Cancelled);
        }
        Ok(())
    }

    /// Classification, fabrication and descriptor only; nothing is mounted.
    pub fn describe(&mut self, source: DiskImageSource) -> PrepResult<PrepReport> {
        let d = self.prepare_descriptor(source)?;
        self.verify_unchanged(&d)?;
        self.advance(PrepState::Finalized)?;
        Ok(PrepReport {
            states: self.visited.clone(),
            kind: d.kind,
            descriptor_path: d.descriptor_path,
            descriptor: d.descriptor,
            fabricated_mbr: d.ctx.fabricated_mbr,
            guest_os_id: None,
            guest: None,
            serial: None,
            vmx_path: None,
            evidence_crc32: d.crc_before,
        })
    }

    /// The whole pipeline, through mount, guest classification and the
    /// serial patch.
    pub fn run(&mut self, source: DiskImageSource) -> PrepResult<PrepReport> {
        if self.mount.is_none() || self.registry.is_none() {
            return Err(PrepError::Config(
                "mount and registry collaborators are required".into(),
            ));
        }
        let d = self.prepare_descriptor(source)?;
        self.check_cancel()?;

        let partition_index = match d.kind {
            SectorKind::PartitionOnly => 1,
            SectorKind::FullDisk => d
                .sector
                .bootable_entry()
                .map(|(i, _)| i as u8 + 1)
                .unwrap_or(1),
        };
        let handle = self.mount()?.mount(&d.descriptor_path, partition_index)?;
        let facts = match self.inspect_guest(&d.ctx, &handle) {
            Ok(f) => f,
            Err(e) => {
                self.unwind(&handle);
                return Err(e);
            }
        };
        // the mount must release the fabricated MBR before it is patched
        if let Err(e) = self.mount()?.unmount(&handle, false) {
            self.unwind(&handle);
            return Err(e);
        }

        let serial = match (d.fabricated.as_ref(), facts.guest.is_nt_kernel, facts.serial) {
            (Some(_), true, Some(serial)) => Some(self.patch_serial(&d, serial)?),
            (Some(_), true, None) => {
                crate::log_warn!("No disk serial recorded by the guest; MBR serial left blank");
                None
            }
            _ => None,
        };

        let vmx_path = if self.settings.write_vmx {
            let path = d.ctx.vmx_path();
            let descriptor_name = d
                .descriptor_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            VmxConfig {
                display_name: &d.ctx.base_name,
                guest_os: &facts.guest_os_id,
                memory_mb: self.settings.memory_mb,
                adapter_type: d.ctx.adapter_type,
                descriptor_name,
            }
            .write_to(&path)?;
            Some(path)
        } else {
            None
        };

        self.verify_unchanged(&d)?;
        self.advance(PrepState::Finalized)?;
        Ok(PrepReport {
            states: self.visited.clone(),
            kind: d.kind,
            descriptor_path: d.descriptor_path,
            descriptor: d.descriptor,
            fabricated_mbr: d.ctx.fabricated_mbr,
            guest_os_id: Some(facts.guest_os_id),
            guest: Some(facts.guest),
            serial,
            vmx_path,
            evidence_crc32: d.crc_before,
        })
    }

    fn mount(&mut self) -> PrepResult<&mut (dyn Mount + 'a)> {
        self.mount
            .as_deref_mut()
            .ok_or_else(|| PrepError::Config("no mount collaborator".into()))
    }

    fn registry(&mut self) -> PrepResult<&mut (dyn Registry + 'a)> {
        self.registry
            .as_deref_mut()
            .ok_or_else(|| PrepError::Config("no registry collaborator".into()))
    }

    /// Signature check, classification, phase one fabrication, descriptor.
    fn prepare_descriptor(&mut self, source: DiskImageSource) -> PrepResult<Described> {
        self.state = PrepState::Unclassified;
        self.visited = vec![PrepState::Unclassified];
        self.check_cancel()?;

        let mut ctx = BootPreparationContext::new(source, self.settings)?;
        let first = ctx
            .source
            .first_path()
            .map_err(|e| PrepError::io(Phase::Inspect, Path::new(""), e))?
            .to_path_buf();
        crate::log_info!("Preparing {} ({})", ctx.source, pretty_sectors(ctx.image_sectors()));

        let crc_before = self.hash_evidence(&ctx, &first)?;

        // Boot sector
        let bytes = ctx
            .source
            .read_first_sector()
            .map_err(|e| PrepError::io(Phase::ReadSector, &first, e))?;
        let sector = match BootSector::parse(&bytes) {
            Ok(s) => s,
            Err(e) => {
                self.advance(PrepState::Rejected)?;
                return Err(PrepError::from_part(Phase::ReadSector, &first, e));
            }
        };
        self.advance(PrepState::SignatureChecked)?;

        // ambiguity is handed back from SignatureChecked, not Rejected
        let kind = sector
            .classify()
            .map_err(|e| PrepError::from_part(Phase::ReadSector, &first, e))?;
        ctx.boot_sector = Some(sector);
        ctx.kind = Some(kind);
        ctx.volume_fs = match kind {
            SectorKind::PartitionOnly => sector.volume_filesystem(),
            SectorKind::FullDisk => sector
                .bootable_entry()
                .map(|(_, e)| VolumeFs::from_partition_type(e.partition_type))
                .unwrap_or(VolumeFs::Unknown),
        };
        self.advance(match kind {
            SectorKind::FullDisk => PrepState::FullDiskClassified,
            SectorKind::PartitionOnly => PrepState::PartitionClassified,
        })?;
        crate::log_info!("Classified as {:?} ({})", kind, ctx.volume_fs);
        self.check_cancel()?;

        std::fs::create_dir_all(&ctx.output_dir)
            .map_err(|e| PrepError::io(Phase::Descriptor, &ctx.output_dir, e))?;

        let fabricated = match kind {
            SectorKind::PartitionOnly => Some(self.fabricate(&mut ctx)?),
            SectorKind::FullDisk => None,
        };
        self.check_cancel()?;

        let descriptor = synthesize(&ctx)?;
        let descriptor_path = ctx.descriptor_path();
        descriptor.write_to(&descriptor_path)?;
        self.advance(PrepState::DescriptorSynthesized)?;
        crate::log_info!(
            "Descriptor {} ({} extents, {})",
            descriptor_path.display(),
            descriptor.extents.len(),
            pretty_sectors(descriptor.total_sectors())
        );

        Ok(Described {
            ctx,
            first,
            kind,
            sector,
            fabricated,
            descriptor,
            descriptor_path,
            crc_before,
        })
    }

    /// Phase two; consumes the persisted sector.
    fn patch_serial(&mut self, d: &Described, serial: [u8; 4]) -> PrepResult<[u8; 4]> {
        self.check_cancel()?;
        let path = d.ctx.mbr_path();
        let fab = d
            .fabricated
            .clone()
            .ok_or_else(|| PrepError::MissingCustomMbr {
                expected: path.clone(),
            })?;
        let patched = fab
            .patch_serial(serial)
            .map_err(|e| PrepError::from_part(Phase::PatchSerial, &path, e))?;
        self.advance(PrepState::SerialPatched)?;
        crate::log_info!("Disk serial {} written to {}", hex_bytes(&serial), path.display());
        Ok(patched.serial())
    }

    fn verify_unchanged(&self, d: &Described) -> PrepResult {
        let after = self.hash_evidence(&d.ctx, &d.first)?;
        if let (Some(before), Some(after)) = (d.crc_before, after) {
            if before != after {
                return Err(PrepError::EvidenceModified { before, after });
            }
            crate::log_info!("Evidence unchanged (crc32 {before:08x})");
        }
        Ok(())
    }

    fn hash_evidence(&self, ctx: &BootPreparationContext, first: &Path) -> PrepResult<Option<u32>> {
        if !self.settings.verify_evidence {
            return Ok(None);
        }
        evidence_crc32(&ctx.source)
            .map(Some)
            .map_err(|e| PrepError::io(Phase::Integrity, first, e))
    }

    /// Phase one: template patched for the partition and persisted.
    fn fabricate(
        &mut self,
        ctx: &mut BootPreparationContext,
    ) -> PrepResult<FabricatedBootSector<Persisted>> {
        let template = match &self.settings.mbr_template {
            Some(p) => load_template(p).map_err(|e| PrepError::from_part(Phase::Template, p, e))?,
            None => BootSector::generic_template(),
        };
        let path = ctx.mbr_path();
        let partition_type = ctx.volume_fs.partition_type().unwrap_or(PART_TYPE_NTFS);
        let fab = fabricate_geometry(template, ctx.image_sectors(), DEFAULT_HEADS)
            .map_err(|e| PrepError::from_part(Phase::Fabricate, &path, e))?
            .with_partition_type(partition_type)
            .persist(&path)
            .map_err(|e| PrepError::from_part(Phase::Fabricate, &path, e))?;
        crate::log_info!(
            "Fabricated MBR {} ({} cylinders, type {:02X})",
            path.display(),
            fab.cylinders(),
            partition_type
        );
        ctx.fabricated_mbr = Some(path);
        self.advance(PrepState::GeometryFabricated)?;
        Ok(fab)
    }

    /// Runs while the descriptor is mounted; the caller unwinds on error.
    fn inspect_guest(
        &mut self,
        ctx: &BootPreparationContext,
        handle: &MountHandle,
    ) -> PrepResult<GuestFacts> {
        self.advance(PrepState::MountRequested)?;
        self.check_cancel()?;

        let root = handle.mount_point.as_path();
        let software = locate_hive(root, SOFTWARE_HIVE);
        let system = locate_hive(root, SYSTEM_HIVE);

        let guest_os_id = match &software {
            Some(hive) => {
                let product = self.registry()?.query(hive, PRODUCT_KEY, PRODUCT_VALUE)?;
                let is_64bit = match &system {
                    Some(sys) => self
                        .registry()?
                        .query(sys, ARCH_KEY, ARCH_VALUE)?
                        .is_some_and(|a| {
                            a.eq_ignore_ascii_case("AMD64") || a.eq_ignore_ascii_case("IA64")
                        }),
                    None => false,
                };
                match product {
                    Some(p) => {
                        crate::log_info!("Guest product: {}", p.trim());
                        guest::guest_os_id_from_product(&p, is_64bit).to_string()
                    }
                    None => "other".to_string(),
                }
            }
            None if looks_like_linux_root(root) => "otherlinux".to_string(),
            None => "other".to_string(),
        };
        let classification = guest::classify(&guest_os_id, ctx.volume_fs);
        self.advance(PrepState::OsClassified)?;
        crate::log_info!(
            "Guest OS {} (family {}, NT kernel: {})",
            guest_os_id,
            classification.family,
            classification.is_nt_kernel
        );
        self.check_cancel()?;

        let serial = if classification.is_nt_kernel && !ctx.is_full_disk() {
            let sys = system.ok_or_else(|| {
                PrepError::collaborator("registry", "SYSTEM hive not found on the guest volume")
            })?;
            let raw = self
                .registry()?
                .query(&sys, MOUNTED_DEVICES_KEY, SYSTEM_DRIVE_VALUE)?;
            let serial = raw.as_deref().and_then(parse_disk_serial);
            if let (Some(raw), None) = (&raw, serial) {
                crate::log_warn!("Unreadable MountedDevices value: {raw}");
            }
            serial
        } else {
            None
        };

        Ok(GuestFacts {
            guest_os_id,
            guest: classification,
            serial,
        })
    }

    fn unwind(&mut self, handle: &MountHandle) {
        crate::log_verbose!("Unwinding: forced unmount of {}", handle.descriptor.display());
        if let Err(e) = self.mount().and_then(|m| m.unmount(handle, true)) {
            crate::log_warn!("Forced unmount failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingMount {
        root: PathBuf,
        unmounts: Vec<bool>,
        cancel_on_mount: Option<CancelFlag>,
    }

    impl Mount for RecordingMount {
        fn mount(&mut self, descriptor: &Path, partition_index: u8) -> PrepResult<MountHandle> {
            if let Some(c) = &self.cancel_on_mount {
                c.cancel();
            }
            Ok(MountHandle {
                descriptor: descriptor.to_path_buf(),
                partition_index,
                mount_point: self.root.clone(),
            })
        }

        fn unmount(&mut self, _handle: &MountHandle, force: bool) -> PrepResult {
            self.unmounts.push(force);
            Ok(())
        }
    }

    /// Refuses a regular unmount, accepts a forced one.
    #[derive(Default)]
    struct BusyMount {
        unmounts: Vec<bool>,
    }

    impl Mount for BusyMount {
        fn mount(&mut self, descriptor: &Path, partition_index: u8) -> PrepResult<MountHandle> {
            Ok(MountHandle {
                descriptor: descriptor.to_path_buf(),
                partition_index,
                mount_point: PathBuf::from("/nonexistent/evboot-mnt"),
            })
        }

        fn unmount(&mut self, _handle: &MountHandle, force: bool) -> PrepResult {
            self.unmounts.push(force);
            if force {
                Ok(())
            } else {
                Err(PrepError::collaborator("vmware-mount", "device busy"))
            }
        }
    }

    struct FailingRegistry;

    impl Registry for FailingRegistry {
        fn query(&mut self, _hive: &Path, _key: &str, _value: &str) -> PrepResult<Option<String>> {
            Err(PrepError::collaborator("registry", "hive is corrupt"))
        }
    }

    fn fat32_partition_image(path: &Path, sectors: usize) {
        let mut data = vec![0u8; sectors * 512];
        data[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        data[3..11].copy_from_slice(b"MSDOS5.0");
        data[11..13].copy_from_slice(&512u16.to_le_bytes());
        data[82..90].copy_from_slice(b"FAT32   ");
        data[510] = 0x55;
        data[511] = 0xAA;
        std::fs::write(path, data).unwrap();
    }

    fn windows_root(root: &Path) {
        let cfg = root.join("WINDOWS/system32/config");
        std::fs::create_dir_all(&cfg).unwrap();
        std::fs::write(cfg.join("SOFTWARE"), b"regf").unwrap();
        std::fs::write(cfg.join("SYSTEM"), b"regf").unwrap();
    }

    #[test]
    fn unsigned_sector_is_rejected_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("blank.dd");
        std::fs::write(&image, vec![0u8; 4096]).unwrap();
        let settings = Settings {
            output_dir: dir.path().join("vm"),
            ..Settings::default()
        };
        let mut mount = RecordingMount::default();
        let mut registry = FailingRegistry;
        let mut o = Orchestrator::new(&mut mount, &mut registry, &settings);

        let err = o.run(DiskImageSource::SingleFile(image)).unwrap_err();
        assert!(matches!(err, PrepError::Format(_)));
        assert_eq!(o.visited(), &[PrepState::Unclassified, PrepState::Rejected]);
        assert!(!dir.path().join("vm").exists());
    }

    #[test]
    fn registry_failure_unmounts_with_force() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part.dd");
        fat32_partition_image(&image, 2048);
        let root = dir.path().join("mnt");
        windows_root(&root);
        let settings = Settings {
            output_dir: dir.path().join("vm"),
            ..Settings::default()
        };
        let mut mount = RecordingMount {
            root,
            ..Default::default()
        };
        let mut registry = FailingRegistry;
        let err = Orchestrator::new(&mut mount, &mut registry, &settings)
            .run(DiskImageSource::SingleFile(image))
            .unwrap_err();

        assert!(matches!(
            err,
            PrepError::ExternalCollaborator {
                collaborator: "registry",
                ..
            }
        ));
        assert_eq!(mount.unmounts, vec![true]);
        // phase one already happened; the MBR stays for inspection
        assert!(dir.path().join("vm/part-mbr.bin").is_file());
    }

    #[test]
    fn cancellation_after_mount_unwinds() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part.dd");
        fat32_partition_image(&image, 2048);
        let settings = Settings {
            output_dir: dir.path().join("vm"),
            ..Settings::default()
        };
        let cancel = CancelFlag::new();
        let mut mount = RecordingMount {
            root: dir.path().to_path_buf(),
            cancel_on_mount: Some(cancel.clone()),
            ..Default::default()
        };
        let mut registry = FailingRegistry;
        let mut o =
            Orchestrator::new(&mut mount, &mut registry, &settings).with_cancel(cancel.clone());
        let err = o.run(DiskImageSource::SingleFile(image)).unwrap_err();

        assert!(matches!(err, PrepError::Cancelled));
        assert_eq!(o.state(), PrepState::MountRequested);
        drop(o);
        assert_eq!(mount.unmounts, vec![true]);
    }

    #[test]
    fn failed_unmount_is_forced() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part.dd");
        fat32_partition_image(&image, 2048);
        let settings = Settings {
            output_dir: dir.path().join("vm"),
            ..Settings::default()
        };
        let mut mount = BusyMount::default();
        let mut registry = FailingRegistry;
        let err = Orchestrator::new(&mut mount, &mut registry, &settings)
            .run(DiskImageSource::SingleFile(image))
            .unwrap_err();

        assert!(err.to_string().contains("device busy"));
        assert_eq!(mount.unmounts, vec![false, true]);
    }

    #[test]
    fn ambiguous_sector_stops_at_signature_check() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("odd.dd");
        fat32_partition_image(&image, 2048);
        // a plausible partition table on top of the FAT32 boot record
        let mut data = std::fs::read(&image).unwrap();
        data[446..462].copy_from_slice(&[
            0x80, 0x01, 0x01, 0x00, 0x0C, 0xFE, 0x3F, 0x00, 0x3F, 0x00, 0x00, 0x00, 0xC1, 0x07,
            0x00, 0x00,
        ]);
        std::fs::write(&image, data).unwrap();
        let settings = Settings {
            output_dir: dir.path().join("vm"),
            ..Settings::default()
        };
        let mut mount = RecordingMount::default();
        let mut registry = FailingRegistry;
        let mut o = Orchestrator::new(&mut mount, &mut registry, &settings);

        let err = o.run(DiskImageSource::SingleFile(image)).unwrap_err();
        assert!(matches!(err, PrepError::ClassificationAmbiguous(_)));
        assert_eq!(o.state(), PrepState::SignatureChecked);
        assert!(!o.visited().contains(&PrepState::Rejected));
        assert!(!dir.path().join("vm").exists());
    }

    #[test]
    fn cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut mount = RecordingMount::default();
        let mut registry = FailingRegistry;
        let err = Orchestrator::new(&mut mount, &mut registry, &settings)
            .with_cancel(cancel)
            .run(DiskImageSource::SingleFile(dir.path().join("x.dd")))
            .unwrap_err();
        assert!(matches!(err, PrepError::Cancelled));
        assert!(mount.unmounts.is_empty());
    }

    #[test]
    fn non_windows_volume_skips_registry() {
        // FailingRegistry would abort the run if it were queried
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("part.dd");
        fat32_partition_image(&image, 2048);
        let settings = Settings {
            output_dir: dir.path().join("vm"),
            write_vmx: false,
            ..Settings::default()
        };
        let mut mount = RecordingMount {
            root: dir.path().join("empty-mnt"),
            ..Default::default()
        };
        let mut registry = FailingRegistry;
        let report = Orchestrator::new(&mut mount, &mut registry, &settings)
            .run(DiskImageSource::SingleFile(image))
            .unwrap();

        assert_eq!(report.guest_os_id.as_deref(), Some("other"));
        let guest = report.guest.unwrap();
        assert_eq!(guest.family, crate::guest::GuestOsFamily::Unknown);
        assert!(guest.is_mountable_filesystem);
        assert_eq!(report.serial, None);
        assert_eq!(report.vmx_path, None);
        assert_eq!(mount.unmounts, vec![false]);
        assert!(!report.states.contains(&PrepState::SerialPatched));
        assert_eq!(report.states.last(), Some(&PrepState::Finalized));
    }
}
