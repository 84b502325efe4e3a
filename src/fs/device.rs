//! A block device or plain file opened for sequential, block-granular I/O
//!
//! Reads and writes go through `pread`/`pwrite`-style offset calls
//! ([`FileExt::read_at`]/[`FileExt::write_at`]) rather than a seek cursor, so
//! a device can be safely read by one worker's chunk while another worker
//! operates on a disjoint chunk of the same underlying file.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, Result};

/// Whether `posix_fadvise` hints should be applied to a device's file handle.
/// Hints degrade silently on platforms or filesystems that don't honor them.
#[derive(Debug, Clone, Copy)]
pub struct CacheAdvisor {
    enabled: bool,
}

impl CacheAdvisor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Hint that the file won't be reused soon, applied once at open time
    pub fn advise_noreuse(&self, file: &File) {
        if !self.enabled {
            return;
        }
        #[cfg(unix)]
        {
            let _ = nix::fcntl::posix_fadvise(
                file,
                0,
                0,
                nix::fcntl::PosixFadviseAdvice::POSIX_FADV_NOREUSE,
            );
        }
        #[cfg(not(unix))]
        let _ = file;
    }

    /// Hint that a just-touched byte range can be evicted, applied after each block
    pub fn advise_dontneed(&self, file: &File, offset: u64, len: u64) {
        if !self.enabled {
            return;
        }
        #[cfg(unix)]
        {
            let _ = nix::fcntl::posix_fadvise(
                file,
                offset as i64,
                len as i64,
                nix::fcntl::PosixFadviseAdvice::POSIX_FADV_DONTNEED,
            );
        }
        #[cfg(not(unix))]
        {
            let _ = (file, offset, len);
        }
    }
}

/// A source or destination device, opened once and read/written block by block
pub struct Device {
    file: File,
    path: PathBuf,
    size: u64,
    advisor: CacheAdvisor,
}

impl Device {
    /// Open an existing device read-only, as the driver opens the source
    pub fn open_read_only(path: impl AsRef<Path>, advisor: CacheAdvisor) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_path(path)?;
        let size = file.metadata().with_path(path)?.len();
        advisor.advise_noreuse(&file);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
            advisor,
        })
    }

    /// Open (and optionally create/extend) a device read-write, as the agent opens the destination
    pub fn open_read_write(
        path: impl AsRef<Path>,
        create_size: Option<u64>,
        advisor: CacheAdvisor,
    ) -> Result<Self> {
        let path = path.as_ref();

        if let Some(size) = create_size {
            if size > 0 {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(path)
                    .with_path(path)?;
                file.set_len(size).with_path(path)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_path(path)?;
        let size = file.metadata().with_path(path)?.len();
        advisor.advise_noreuse(&file);
        Ok(Self {
            file,
            path: path.to_path_buf(),
            size,
            advisor,
        })
    }

    /// Total device size in bytes, as observed at open time
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read block `index` of `blocksize` bytes; the final block may be short
    pub fn read_block(&self, index: u64, blocksize: u64) -> io::Result<Vec<u8>> {
        let offset = index * blocksize;
        let len = blocksize.min(self.size.saturating_sub(offset));
        let mut buf = vec![0u8; len as usize];
        if len > 0 {
            self.file.read_exact_at(&mut buf, offset)?;
        }
        self.advisor.advise_dontneed(&self.file, offset, len);
        Ok(buf)
    }

    /// Write `data` at block `index`'s offset; `data` may be shorter than `blocksize` for the final block
    pub fn write_block(&self, index: u64, blocksize: u64, data: &[u8]) -> io::Result<()> {
        let offset = index * blocksize;
        self.file.write_all_at(data, offset)?;
        self.advisor
            .advise_dontneed(&self.file, offset, data.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn reads_full_and_short_final_block() {
        let data = vec![0xAB; 2_500_000];
        let f = write_temp_file(&data);
        let device = Device::open_read_only(f.path(), CacheAdvisor::new(false)).unwrap();
        assert_eq!(device.size(), 2_500_000);

        let block0 = device.read_block(0, 1_048_576).unwrap();
        assert_eq!(block0.len(), 1_048_576);

        let block2 = device.read_block(2, 1_048_576).unwrap();
        assert_eq!(block2.len(), 2_500_000 - 2 * 1_048_576);
    }

    #[test]
    fn write_block_then_read_back() {
        let data = vec![0u8; 4096];
        let f = write_temp_file(&data);
        let device = Device::open_read_write(f.path(), None, CacheAdvisor::new(false)).unwrap();
        device.write_block(1, 1024, &[0xFFu8; 1024]).unwrap();
        let read_back = device.read_block(1, 1024).unwrap();
        assert_eq!(read_back, vec![0xFFu8; 1024]);
    }

    #[test]
    fn create_size_extends_destination() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        let device =
            Device::open_read_write(tmp.path(), Some(8192), CacheAdvisor::new(false)).unwrap();
        assert_eq!(device.size(), 8192);
    }
}
