use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;

const TEMP_FILE_PREFIX: &str = "batchstore-";

/// Where a batch keeps its bytes until upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferKind {
    /// Spill to a temp file, in `dir` or the system temp dir.
    File { dir: Option<PathBuf> },
    Memory,
}

impl Default for BufferKind {
    fn default() -> Self {
        BufferKind::File { dir: None }
    }
}

/// Local storage owned by one batch. Temp files are unlinked when dropped.
#[derive(Debug)]
pub(crate) enum Backing {
    File(NamedTempFile),
    Memory(Cursor<Vec<u8>>),
    /// Memory buffer that refuses writes past `capacity`.
    #[cfg(test)]
    Capped {
        cursor: Cursor<Vec<u8>>,
        capacity: u64,
    },
}

impl Backing {
    pub fn create(kind: &BufferKind) -> io::Result<Self> {
        match kind {
            BufferKind::File { dir } => {
                let mut builder = tempfile::Builder::new();
                builder.prefix(TEMP_FILE_PREFIX);
                let file = match dir {
                    Some(dir) => builder.tempfile_in(dir)?,
                    None => builder.tempfile()?,
                };
                Ok(Backing::File(file))
            }
            BufferKind::Memory => Ok(Backing::Memory(Cursor::new(Vec::new()))),
        }
    }

    /// Write all of `bytes` starting at `position`.
    ///
    /// On failure returns how many bytes landed before the error. Those bytes
    /// stay in the buffer until a later write at the same position replaces them.
    pub fn write_at(&mut self, position: u64, bytes: &[u8]) -> Result<(), (u64, io::Error)> {
        if let Err(e) = self.seek(SeekFrom::Start(position)) {
            return Err((0, e));
        }

        let mut written = 0u64;
        let mut remaining = bytes;
        while !remaining.is_empty() {
            match self.write(remaining) {
                Ok(0) => {
                    return Err((
                        written,
                        io::Error::new(io::ErrorKind::WriteZero, "failed to write whole payload"),
                    ));
                }
                Ok(n) => {
                    written += n as u64;
                    remaining = &remaining[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err((written, e)),
            }
        }

        Ok(())
    }

    /// Drop anything past `len` and move the cursor to the start.
    pub fn truncate_and_rewind(&mut self, len: u64) -> io::Result<()> {
        match self {
            Backing::File(file) => {
                file.as_file_mut().flush()?;
                file.as_file().set_len(len)?;
            }
            Backing::Memory(cursor) => {
                cursor.get_mut().truncate(len as usize);
            }
            #[cfg(test)]
            Backing::Capped { cursor, .. } => {
                cursor.get_mut().truncate(len as usize);
            }
        }
        self.rewind()
    }

    /// Delete the backing storage. A temp file that is already gone is fine.
    pub fn release(self) -> io::Result<()> {
        match self {
            Backing::File(file) => match file.close() {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            },
            _ => Ok(()),
        }
    }

    /// Read up to `max` bytes from the current position. File reads run on
    /// the blocking pool through a cloned handle sharing the file cursor.
    pub async fn read_next(&mut self, max: usize) -> io::Result<Vec<u8>> {
        if let Backing::File(file) = &*self {
            let handle = file.as_file().try_clone()?;
            return tokio::task::spawn_blocking(move || -> io::Result<Vec<u8>> {
                let mut chunk = Vec::with_capacity(max);
                handle.take(max as u64).read_to_end(&mut chunk)?;
                Ok(chunk)
            })
            .await
            .map_err(io::Error::other)?;
        }

        let mut chunk = Vec::with_capacity(max);
        Read::take(&mut *self, max as u64).read_to_end(&mut chunk)?;
        Ok(chunk)
    }

    #[cfg(test)]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Backing::File(file) => Some(file.path()),
            _ => None,
        }
    }
}

impl Read for Backing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Backing::File(file) => file.read(buf),
            Backing::Memory(cursor) => cursor.read(buf),
            #[cfg(test)]
            Backing::Capped { cursor, .. } => cursor.read(buf),
        }
    }
}

impl Write for Backing {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Backing::File(file) => file.write(buf),
            Backing::Memory(cursor) => cursor.write(buf),
            #[cfg(test)]
            Backing::Capped { cursor, capacity } => {
                let room = capacity.saturating_sub(cursor.position()) as usize;
                if room == 0 && !buf.is_empty() {
                    return Err(io::Error::other("buffer full"));
                }
                cursor.write(&buf[..buf.len().min(room)])
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Backing::File(file) => file.flush(),
            Backing::Memory(cursor) => cursor.flush(),
            #[cfg(test)]
            Backing::Capped { cursor, .. } => cursor.flush(),
        }
    }
}

impl Seek for Backing {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Backing::File(file) => file.seek(pos),
            Backing::Memory(cursor) => cursor.seek(pos),
            #[cfg(test)]
            Backing::Capped { cursor, .. } => cursor.seek(pos),
        }
    }
}
