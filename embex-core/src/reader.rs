use crate::error::{Error, Result};
use byteorder::{ByteOrder, LE};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

/// Upper bound on scratch buffers retained by a [`BufferPool`].
const MAX_POOLED: usize = 16;

/// Reusable scratch buffers for word reads.
///
/// Pooling only saves allocations; a reader behaves the same whether the
/// pool is empty, full or shared.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a zeroed buffer of exactly `len` bytes.
    fn take(&self, len: usize) -> Vec<u8> {
        let mut buf = match self.free.lock() {
            Ok(mut free) => free.pop().unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    fn give(&self, buf: Vec<u8>) {
        if let Ok(mut free) = self.free.lock() {
            if free.len() < MAX_POOLED {
                free.push(buf);
            }
        }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|f| f.len()).unwrap_or(0)
    }
}

/// Positioned reads against a file, with no shared cursor.
///
/// Every call names its own absolute offset, so `&self` reads may be issued
/// from several threads at once.
#[derive(Debug)]
pub struct RandomAccessReader {
    file: Option<File>,
    len: u64,
    pool: BufferPool,
}

impl RandomAccessReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_pool(path, BufferPool::new())
    }

    pub fn with_pool<P: AsRef<Path>>(path: P, pool: BufferPool) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        log::debug!("Opened {} ({} bytes)", path.as_ref().display(), len);
        Ok(Self {
            file: Some(file),
            len,
            pool,
        })
    }

    /// File size captured at open.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Reads `count` little-endian `u64` words starting at `offset`.
    pub fn read_words(&self, count: usize, offset: u64) -> Result<Vec<u64>> {
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        let byte_len = count.checked_mul(8).ok_or(Error::ShortRead {
            offset,
            len: u64::MAX,
        })?;
        self.check_bounds(offset, byte_len as u64)?;

        let mut buf = self.pool.take(byte_len);
        let read = read_exact_at(file, &mut buf, offset);
        let words = read.map(|()| {
            let mut words = vec![0u64; count];
            LE::read_u64_into(&buf, &mut words);
            words
        });
        self.pool.give(buf);
        words.map_err(|e| short_read(e, offset, byte_len as u64))
    }

    /// Reads `len` raw bytes starting at `offset`.
    pub fn read_bytes(&self, len: usize, offset: u64) -> Result<Vec<u8>> {
        let file = self.file.as_ref().ok_or(Error::Closed)?;
        self.check_bounds(offset, len as u64)?;

        let mut buf = vec![0u8; len];
        read_exact_at(file, &mut buf, offset).map_err(|e| short_read(e, offset, len as u64))?;
        Ok(buf)
    }

    /// Releases the file handle; later reads fail with [`Error::Closed`].
    pub fn close(&mut self) {
        self.file = None;
    }

    fn check_bounds(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::ShortRead { offset, len }),
        }
    }
}

fn short_read(err: io::Error, offset: u64, len: u64) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::ShortRead { offset, len }
    } else {
        Error::Io(err)
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
