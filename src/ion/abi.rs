//! Kernel ABI of the legacy (pre-4.12) MSM ION driver.
//!
//! The layout changes between kernels; this matches the msm-3.18/4.4
//! `linux/ion.h` where handles are per-client integer ids.

use libc::{c_int, size_t};
use nix::ioctl_readwrite;

use crate::models::RegionCategory;

pub const ION_IOC_MAGIC: u8 = b'I';

pub type IonUserHandle = c_int;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IonAllocationData {
    pub len: size_t,
    pub align: size_t,
    pub heap_id_mask: u32,
    pub flags: u32,
    pub handle: IonUserHandle,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IonFdData {
    pub handle: IonUserHandle,
    pub fd: c_int,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IonHandleData {
    pub handle: IonUserHandle,
}

ioctl_readwrite!(ion_ioc_alloc, ION_IOC_MAGIC, 0, IonAllocationData);
ioctl_readwrite!(ion_ioc_free, ION_IOC_MAGIC, 1, IonHandleData);
ioctl_readwrite!(ion_ioc_map, ION_IOC_MAGIC, 2, IonFdData);

/// Allocation flag requesting a secure (content-protected) buffer.
pub const ION_FLAG_SECURE: u32 = 1 << 31;
/// Allocation flag forcing physically contiguous memory.
pub const ION_FLAG_FORCE_CONTIGUOUS: u32 = 1 << 30;

/// MSM heap ids. Bit 31 is reserved for [`ION_FLAG_SECURE`].
pub mod heap_id {
    pub const CP_MM: u32 = 8;
    pub const SECURE: u32 = 9;
    pub const SECURE_DISPLAY: u32 = 10;
    pub const CP_MFC: u32 = 12;
    /// 8660 only
    pub const CP_WB: u32 = 16;
    /// 8660 only
    pub const CAMERA: u32 = 20;
    pub const SYSTEM_CONTIG: u32 = 21;
    pub const ADSP: u32 = 22;
    pub const PIL1: u32 = 23;
    pub const SF: u32 = 24;
    pub const SYSTEM: u32 = 25;
    pub const PIL2: u32 = 26;
    pub const QSECOM: u32 = 27;
    pub const AUDIO: u32 = 28;
    pub const MM_FIRMWARE: u32 = 29;
    pub const RESERVED: u32 = 31;
}

/// Heaps tried for the one-page allocation, highest priority first.
pub const MSM_HEAP_TABLE: [RegionCategory; 8] = [
    RegionCategory::new("cp_mm", heap_id::CP_MM),
    RegionCategory::new("cp_mfc", heap_id::CP_MFC),
    RegionCategory::new("system_contig", heap_id::SYSTEM_CONTIG),
    RegionCategory::new("adsp", heap_id::ADSP),
    RegionCategory::new("sf", heap_id::SF),
    RegionCategory::new("system", heap_id::SYSTEM),
    RegionCategory::new("qsecom", heap_id::QSECOM),
    RegionCategory::new("audio", heap_id::AUDIO),
];
