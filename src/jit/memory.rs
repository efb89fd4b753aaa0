//! Executable memory management using mmap.
//!
//! Memory is mapped read/write, filled with code, and then flipped to
//! read/execute with mprotect. It is never writable and executable at once.

use std::io;
use std::ptr::NonNull;

/// Error type for memory operations.
#[derive(Debug)]
pub enum MemoryError {
    AllocationFailed(io::Error),
    ProtectionFailed(io::Error),
    InvalidSize,
    /// Write attempted after the region was made executable.
    Sealed,
    Unsupported,
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::AllocationFailed(e) => {
                write!(f, "executable memory allocation failed: {}", e)
            }
            MemoryError::ProtectionFailed(e) => {
                write!(f, "memory protection change failed: {}", e)
            }
            MemoryError::InvalidSize => write!(f, "invalid memory size"),
            MemoryError::Sealed => write!(f, "memory is already executable"),
            MemoryError::Unsupported => {
                write!(f, "executable memory is not supported on this platform")
            }
        }
    }
}

impl std::error::Error for MemoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemoryError::AllocationFailed(e) | MemoryError::ProtectionFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// A block of executable memory allocated via mmap.
///
/// The memory is initially writable. Call `make_executable()` to make it
/// executable (and read-only) before calling the generated code.
pub struct ExecutableMemory {
    ptr: NonNull<u8>,
    size: usize,
    executable: bool,
}

impl ExecutableMemory {
    /// Map a writable region large enough for `size` bytes, rounded up to
    /// whole pages.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size == 0 {
            return Err(MemoryError::InvalidSize);
        }

        let page_size = Self::page_size();
        let aligned_size = size
            .checked_add(page_size - 1)
            .ok_or(MemoryError::InvalidSize)?
            & !(page_size - 1);

        let ptr = Self::mmap_alloc(aligned_size)?;

        Ok(Self {
            ptr,
            size: aligned_size,
            executable: false,
        })
    }

    #[cfg(unix)]
    fn page_size() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 { size as usize } else { 4096 }
    }

    #[cfg(not(unix))]
    fn page_size() -> usize {
        4096
    }

    #[cfg(unix)]
    fn mmap_alloc(size: usize) -> Result<NonNull<u8>, MemoryError> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed(io::Error::last_os_error()));
        }

        NonNull::new(ptr as *mut u8).ok_or_else(|| {
            MemoryError::AllocationFailed(io::Error::other("mmap returned null"))
        })
    }

    #[cfg(not(unix))]
    fn mmap_alloc(_size: usize) -> Result<NonNull<u8>, MemoryError> {
        Err(MemoryError::Unsupported)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Size of the mapping in bytes (a whole number of pages).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Write bytes to the memory at the given offset.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), MemoryError> {
        if self.executable {
            return Err(MemoryError::Sealed);
        }

        match offset.checked_add(data.len()) {
            Some(end) if end <= self.size => {}
            _ => return Err(MemoryError::InvalidSize),
        }

        // SAFETY: the range [offset, offset + len) was checked against the
        // mapping, which is writable until `make_executable` runs.
        unsafe {
            let dest = self.ptr.as_ptr().add(offset);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dest, data.len());
        }

        Ok(())
    }

    /// Make the memory executable (and read-only).
    #[cfg(unix)]
    pub fn make_executable(&mut self) -> Result<(), MemoryError> {
        if self.executable {
            return Ok(());
        }

        let result = unsafe {
            libc::mprotect(
                self.ptr.as_ptr() as *mut libc::c_void,
                self.size,
                libc::PROT_READ | libc::PROT_EXEC,
            )
        };

        if result != 0 {
            return Err(MemoryError::ProtectionFailed(io::Error::last_os_error()));
        }

        self.executable = true;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn make_executable(&mut self) -> Result<(), MemoryError> {
        Err(MemoryError::Unsupported)
    }

    pub fn is_executable(&self) -> bool {
        self.executable
    }

    /// Reinterpret the start of the region as a function pointer.
    ///
    /// Returns `None` until the memory has been made executable.
    ///
    /// # Safety
    /// `F` must be a function pointer type whose ABI and signature match the
    /// machine code stored in the region.
    pub unsafe fn as_fn<F: Copy>(&self) -> Option<F> {
        if !self.executable || std::mem::size_of::<F>() != std::mem::size_of::<*const u8>() {
            return None;
        }

        let ptr = self.ptr.as_ptr() as *const u8;
        // SAFETY: size checked above; caller guarantees F matches the code.
        Some(unsafe { std::mem::transmute_copy(&ptr) })
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.size);
            }
        }
    }
}

impl std::fmt::Debug for ExecutableMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableMemory")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("executable", &self.executable)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_memory() {
        let mem = ExecutableMemory::new(100).unwrap();
        assert!(mem.size() >= 100);
        assert_eq!(mem.size() % ExecutableMemory::page_size(), 0);
        assert!(!mem.is_executable());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(matches!(
            ExecutableMemory::new(0),
            Err(MemoryError::InvalidSize)
        ));
    }

    #[test]
    fn test_write_memory() {
        let mut mem = ExecutableMemory::new(4096).unwrap();
        mem.write(0, &[0x90, 0x90, 0xC3]).unwrap();
        let written = unsafe { std::slice::from_raw_parts(mem.as_ptr(), 3) };
        assert_eq!(written, &[0x90, 0x90, 0xC3]);
    }

    #[test]
    fn test_write_overflow_rejected() {
        let mut mem = ExecutableMemory::new(16).unwrap();
        let size = mem.size();
        assert!(matches!(
            mem.write(size - 1, &[0x90, 0x90]),
            Err(MemoryError::InvalidSize)
        ));
    }

    #[test]
    fn test_cannot_write_after_executable() {
        let mut mem = ExecutableMemory::new(4096).unwrap();
        mem.write(0, &[0xC3]).unwrap();
        mem.make_executable().unwrap();
        assert!(mem.is_executable());
        assert!(matches!(mem.write(0, &[0x90]), Err(MemoryError::Sealed)));
    }

    #[test]
    fn test_as_fn_requires_executable() {
        let mem = ExecutableMemory::new(16).unwrap();
        let f: Option<fn()> = unsafe { mem.as_fn() };
        assert!(f.is_none());
    }
}
