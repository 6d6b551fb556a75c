// SPDX-License-Identifier: MIT

//! Guest-OS family from a VMware `guestOS` token.

use evpart::VolumeFs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestOsFamily {
    Xp,
    Win2k,
    Win2003,
    Win98,
    WinMe,
    Nt,
    Vista,
    Win7,
    Win2008,
    Linux,
    Unknown,
}

impl GuestOsFamily {
    /// Families whose boot needs registry and MBR serial work.
    #[inline]
    pub fn is_nt_kernel(self) -> bool {
        matches!(
            self,
            GuestOsFamily::Xp
                | GuestOsFamily::Win2k
                | GuestOsFamily::Win2003
                | GuestOsFamily::Win2008
                | GuestOsFamily::Vista
                | GuestOsFamily::Win7
        )
    }
}

impl core::fmt::Display for GuestOsFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            GuestOsFamily::Xp => "xp",
            GuestOsFamily::Win2k => "2k",
            GuestOsFamily::Win2003 => "2003",
            GuestOsFamily::Win98 => "98",
            GuestOsFamily::WinMe => "me",
            GuestOsFamily::Nt => "nt",
            GuestOsFamily::Vista => "vista",
            GuestOsFamily::Win7 => "win7",
            GuestOsFamily::Win2008 => "2008",
            GuestOsFamily::Linux => "linux",
            GuestOsFamily::Unknown => "unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestOsClassification {
    pub family: GuestOsFamily,
    pub is_nt_kernel: bool,
    pub is_mountable_filesystem: bool,
}

/// Exact tokens, compared case-insensitively after a `-64` suffix is dropped.
const GUEST_OS_TABLE: &[(&str, GuestOsFamily)] = &[
    ("winXPPro", GuestOsFamily::Xp),
    ("winXPHome", GuestOsFamily::Xp),
    ("win2000Pro", GuestOsFamily::Win2k),
    ("win2000Serv", GuestOsFamily::Win2k),
    ("win2000AdvServ", GuestOsFamily::Win2k),
    ("winNetStandard", GuestOsFamily::Win2003),
    ("winNetEnterprise", GuestOsFamily::Win2003),
    ("winNetDatacenter", GuestOsFamily::Win2003),
    ("winNetWeb", GuestOsFamily::Win2003),
    ("winNetBusiness", GuestOsFamily::Win2003),
    ("win95", GuestOsFamily::Win98),
    ("win98", GuestOsFamily::Win98),
    ("winMe", GuestOsFamily::WinMe),
    ("winNT", GuestOsFamily::Nt),
    ("winVista", GuestOsFamily::Vista),
    ("windows7", GuestOsFamily::Win7),
    ("longhorn", GuestOsFamily::Win2008),
    ("windows7Server", GuestOsFamily::Win2008),
    ("winServer2008Standard", GuestOsFamily::Win2008),
    ("winServer2008Enterprise", GuestOsFamily::Win2008),
    ("winServer2008Datacenter", GuestOsFamily::Win2008),
];

/// Substrings that identify a Linux distribution token.
const LINUX_MARKERS: &[&str] = &[
    "linux", "ubuntu", "debian", "rhel", "redhat", "centos", "fedora", "suse", "sles",
    "mandrake", "mandriva", "asianux",
];

pub fn family_of(guest_os_id: &str) -> GuestOsFamily {
    let id = guest_os_id.trim();
    let base = id.strip_suffix("-64").unwrap_or(id);
    if let Some((_, family)) = GUEST_OS_TABLE
        .iter()
        .find(|(token, _)| token.eq_ignore_ascii_case(base))
    {
        return *family;
    }
    let lower = base.to_ascii_lowercase();
    if LINUX_MARKERS.iter().any(|m| lower.contains(m)) {
        return GuestOsFamily::Linux;
    }
    GuestOsFamily::Unknown
}

#[inline]
pub fn is_nt_kernel(guest_os_id: &str) -> bool {
    family_of(guest_os_id).is_nt_kernel()
}

/// Family plus the predicates that gate fabrication branches.
///
/// A FAT or NTFS volume is mountable on the host; an NT family is treated
/// as mountable whatever was sniffed, since sniffing may need the mount.
pub fn classify(guest_os_id: &str, fs: VolumeFs) -> GuestOsClassification {
    let family = family_of(guest_os_id);
    let is_nt_kernel = family.is_nt_kernel();
    GuestOsClassification {
        family,
        is_nt_kernel,
        is_mountable_filesystem: fs.is_fat() || fs.is_ntfs() || is_nt_kernel,
    }
}

/// Registry `ProductName` fragment, 32-bit token, 64-bit token.
/// Ordered so that longer names match before their prefixes.
const PRODUCT_TABLE: &[(&str, &str, &str)] = &[
    ("server 2008 r2", "windows7Server-64", "windows7Server-64"),
    ("server 2008", "longhorn", "longhorn-64"),
    ("server 2003", "winNetStandard", "winNetStandard-64"),
    (".net", "winNetStandard", "winNetStandard-64"),
    ("xp home", "winXPHome", "winXPPro-64"),
    ("xp", "winXPPro", "winXPPro-64"),
    ("2000 server", "win2000Serv", "win2000Serv"),
    ("2000 advanced", "win2000AdvServ", "win2000AdvServ"),
    ("2000", "win2000Pro", "win2000Pro"),
    ("vista", "winVista", "winVista-64"),
    ("windows 7", "windows7", "windows7-64"),
    ("millennium", "winMe", "winMe"),
    ("windows me", "winMe", "winMe"),
    ("windows 98", "win98", "win98"),
    ("windows 95", "win95", "win95"),
    ("windows nt", "winNT", "winNT"),
];

/// Lowercase, trademark marks dropped, single spaces:
/// `Windows Server (R) 2008 Standard` → `windows server 2008 standard`.
fn normalize_product(name: &str) -> String {
    let mut lower = name.to_lowercase();
    for mark in ["(r)", "(tm)", "\u{ae}", "\u{2122}"] {
        lower = lower.replace(mark, " ");
    }
    lower.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// VMware `guestOS` token for a registry `ProductName`; `other` when the
/// name is not recognised.
pub fn guest_os_id_from_product(product_name: &str, is_64bit: bool) -> &'static str {
    let lower = normalize_product(product_name);
    PRODUCT_TABLE
        .iter()
        .find(|(needle, _, _)| lower.contains(needle))
        .map(|&(_, t32, t64)| if is_64bit { t64 } else { t32 })
        .unwrap_or("other")
}
