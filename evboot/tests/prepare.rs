// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use evboot::descriptor::ExtentKind;
use evboot::pipeline::{Mount, MountHandle, Registry};
use evboot::{Orchestrator, PrepResult, PrepState, Settings};
use evio::prelude::*;
use evpart::geometry::Chs;
use evpart::{BootSector, PartitionTableEntry, SectorKind};

/// Serves a prepared directory as the mounted guest volume.
struct DirMount {
    root: PathBuf,
    mounted: Vec<u8>,
    unmounts: Vec<bool>,
}

impl DirMount {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            mounted: Vec::new(),
            unmounts: Vec::new(),
        }
    }
}

impl Mount for DirMount {
    fn mount(&mut self, descriptor: &Path, partition_index: u8) -> PrepResult<MountHandle> {
        assert!(descriptor.is_file(), "descriptor written before mount");
        self.mounted.push(partition_index);
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

/// Answers by value name, like a guest with one XP installation.
#[derive(Default)]
struct XpRegistry {
    queried: Vec<String>,
}

impl Registry for XpRegistry {
    fn query(&mut self, hive: &Path, _key: &str, value: &str) -> PrepResult<Option<String>> {
        assert!(hive.is_file());
        self.queried.push(value.to_string());
        Ok(match value {
            "ProductName" => Some("Microsoft Windows XP".into()),
            "PROCESSOR_ARCHITECTURE" => Some("x86".into()),
            r"\DosDevices\C:" => Some("hex:de,ad,be,ef,00,7e,00,00,00,00,00,00".into()),
            _ => None,
        })
    }
}

fn fat32_vbr() -> Vec<u8> {
    let mut b = vec![0u8; 512];
    b[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
    b[3..11].copy_from_slice(b"MSDOS5.0");
    b[11..13].copy_from_slice(&512u16.to_le_bytes());
    b[82..90].copy_from_slice(b"FAT32   ");
    b[510] = 0x55;
    b[511] = 0xAA;
    b
}

fn ntfs_vbr() -> Vec<u8> {
    let mut b = vec![0u8; 512];
    b[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    b[3..11].copy_from_slice(b"NTFS    ");
    b[11..13].copy_from_slice(&512u16.to_le_bytes());
    b[510] = 0x55;
    b[511] = 0xAA;
    b
}

/// Writes `image` split into chunks of the given sector counts.
fn write_chunks(dir: &Path, stem: &str, image: &[u8], sectors: &[usize]) -> Vec<PathBuf> {
    let mut offset = 0;
    sectors
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let path = dir.join(format!("{stem}.{:03}", i + 1));
            std::fs::write(&path, &image[offset..offset + n * 512]).unwrap();
            offset += n * 512;
            path
        })
        .collect()
}

fn xp_volume(root: &Path) {
    let cfg = root.join("WINDOWS/system32/config");
    std::fs::create_dir_all(&cfg).unwrap();
    std::fs::write(cfg.join("SOFTWARE"), b"regf").unwrap();
    std::fs::write(cfg.join("SYSTEM"), b"regf").unwrap();
}

#[test]
fn chunked_partition_image_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let mut image = vec![0u8; 5000 * 512];
    image[..512].copy_from_slice(&fat32_vbr());
    let mut chunks = write_chunks(dir.path(), "usb", &image, &[2000, 2000, 1000]);
    chunks.reverse();
    assert_eq!(order_chunks(&mut chunks), ChunkOrder::Numeric);

    let settings = Settings {
        output_dir: dir.path().join("vm"),
        ..Settings::default()
    };
    let report = Orchestrator::offline(&settings)
        .describe(DiskImageSource::ChunkedFiles(chunks.clone()))
        .unwrap();

    assert_eq!(report.kind, SectorKind::PartitionOnly);
    assert_eq!(
        report.states,
        vec![
            PrepState::Unclassified,
            PrepState::SignatureChecked,
            PrepState::PartitionClassified,
            PrepState::GeometryFabricated,
            PrepState::DescriptorSynthesized,
            PrepState::Finalized,
        ]
    );

    let extents = &report.descriptor.extents;
    let mbr = dir.path().join("vm/usb-mbr.bin");
    assert_eq!(report.fabricated_mbr.as_deref(), Some(mbr.as_path()));
    assert_eq!(extents.len(), 5);
    assert_eq!(extents[0].size_sectors, 63);
    assert_eq!(extents[0].source(), Some(mbr.as_path()));
    let data: Vec<_> = extents[1..4]
        .iter()
        .map(|e| (e.source().unwrap().to_path_buf(), e.size_sectors))
        .collect();
    assert_eq!(
        data,
        vec![
            (chunks[0].clone(), 2000),
            (chunks[1].clone(), 2000),
            (chunks[2].clone(), 1000),
        ]
    );
    assert_eq!(extents[4].kind, ExtentKind::Zero);
    assert_eq!(extents[4].size_sectors, 199_218_750 - 5000 - 63);
    assert_eq!(report.descriptor.total_sectors(), 199_218_750);

    // the fabricated gap is fully backed and announces the partition
    let mbr_bytes = std::fs::read(&mbr).unwrap();
    assert_eq!(mbr_bytes.len(), 63 * 512);
    assert_eq!(&mbr_bytes[510..512], &[0x55, 0xAA]);
    assert_eq!(&mbr_bytes[458..462], &5000u32.to_le_bytes());
    assert_eq!(mbr_bytes[450], 0x0C);

    let text = std::fs::read_to_string(dir.path().join("vm/usb.vmdk")).unwrap();
    assert!(text.contains(&format!("RW 2000 FLAT \"{}\" 0", chunks[0].display())));
    assert!(text.contains("RW 199213687 ZERO"));
    assert!(text.contains("ddb.adapterType = \"ide\""));
}

#[test]
fn nt_partition_gets_its_disk_serial() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("c-drive.dd");
    let mut data = vec![0u8; 4096 * 512];
    data[..512].copy_from_slice(&ntfs_vbr());
    std::fs::write(&image, &data).unwrap();
    let guest_root = dir.path().join("mnt");
    xp_volume(&guest_root);

    let settings = Settings {
        output_dir: dir.path().join("vm"),
        verify_evidence: true,
        ..Settings::default()
    };
    let mut mount = DirMount::new(guest_root);
    let mut registry = XpRegistry::default();
    let report = Orchestrator::new(&mut mount, &mut registry, &settings)
        .run(DiskImageSource::SingleFile(image.clone()))
        .unwrap();

    assert_eq!(report.guest_os_id.as_deref(), Some("winXPPro"));
    assert!(report.guest.unwrap().is_nt_kernel);
    assert_eq!(report.serial, Some([0xDE, 0xAD, 0xBE, 0xEF]));
    assert!(report.states.contains(&PrepState::SerialPatched));
    assert_eq!(report.states.last(), Some(&PrepState::Finalized));
    assert!(report.evidence_crc32.is_some());

    let mbr = std::fs::read(dir.path().join("vm/c-drive-mbr.bin")).unwrap();
    assert_eq!(&mbr[440..444], &[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(mbr[450], 0x07);

    let vmx = std::fs::read_to_string(report.vmx_path.unwrap()).unwrap();
    assert!(vmx.contains("guestOS = \"winXPPro\""));
    assert!(vmx.contains("ide0:0.fileName = \"c-drive.vmdk\""));

    assert_eq!(mount.mounted, vec![1]);
    assert_eq!(mount.unmounts, vec![false]);
    assert!(registry.queried.iter().any(|v| v == "ProductName"));
    assert_eq!(std::fs::read(&image).unwrap(), data);
}

#[test]
fn full_disk_is_described_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("disk.dd");
    let entry = PartitionTableEntry::new(
        0x80,
        Chs::new(0, 1, 1),
        0x07,
        Chs::new(0, 254, 63),
        63,
        8000,
    );
    let mut mbr = BootSector::new_from_entries([
        PartitionTableEntry::new_empty(),
        entry,
        PartitionTableEntry::new_empty(),
        PartitionTableEntry::new_empty(),
    ])
    .to_bytes();
    mbr[..4].copy_from_slice(&[0x33, 0xC0, 0x8E, 0xD0]);
    let mut data = vec![0u8; 4000 * 512];
    data[..512].copy_from_slice(&mbr);
    std::fs::write(&image, &data).unwrap();
    let guest_root = dir.path().join("mnt");
    xp_volume(&guest_root);

    let settings = Settings {
        output_dir: dir.path().join("vm"),
        ..Settings::default()
    };
    let mut mount = DirMount::new(guest_root);
    let mut registry = XpRegistry::default();
    let report = Orchestrator::new(&mut mount, &mut registry, &settings)
        .run(DiskImageSource::SingleFile(image.clone()))
        .unwrap();

    assert_eq!(report.kind, SectorKind::FullDisk);
    assert_eq!(report.fabricated_mbr, None);
    assert!(!report.states.contains(&PrepState::GeometryFabricated));
    assert!(!report.states.contains(&PrepState::SerialPatched));
    assert_eq!(report.serial, None);
    // the bootable partition sits in the second slot
    assert_eq!(mount.mounted, vec![2]);

    let extents = &report.descriptor.extents;
    assert_eq!(extents.len(), 2);
    assert_eq!(extents[0].source(), Some(image.as_path()));
    assert_eq!(extents[0].size_sectors, 4000);
    assert_eq!(extents[1].kind, ExtentKind::Zero);
    assert_eq!(extents[1].size_sectors, 63 + 8000 - 4000);
    assert_eq!(report.descriptor.ddb.heads_per_cylinder, 255);
    assert_eq!(report.descriptor.ddb.sectors_per_track, 63);
    assert!(!registry.queried.iter().any(|v| v == r"\DosDevices\C:"));
    assert!(!dir.path().join("vm/disk-mbr.bin").exists());
}

#[test]
fn descriptor_only_run_needs_no_collaborators() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("stick.img");
    let mut data = vec![0u8; 100 * 512];
    data[..512].copy_from_slice(&fat32_vbr());
    std::fs::write(&image, &data).unwrap();
    let settings = Settings {
        output_dir: dir.path().join("vm"),
        parent_disk_sectors: 10_000,
        ..Settings::default()
    };

    let mut orchestrator = Orchestrator::offline(&settings);
    assert!(
        orchestrator
            .run(DiskImageSource::SingleFile(image.clone()))
            .is_err()
    );
    let report = orchestrator
        .describe(DiskImageSource::SingleFile(image))
        .unwrap();
    assert_eq!(report.descriptor.total_sectors(), 10_000);
    assert_eq!(report.guest_os_id, None);
    assert_eq!(report.vmx_path, None);
    assert!(!dir.path().join("vm/stick.vmx").exists());
}
