//! File access used by the pipelines: a random-access source, an append-only
//! sink for the compressed stream, and a preallocated sink for decompressed
//! output. Each has a file-backed and an in-memory implementation.

use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use memmap2::{Mmap, MmapOptions};

/// A readable view of part of a source.
pub enum SourceView<'a> {
    Mapped(Mmap),
    Borrowed(&'a [u8]),
}

impl Deref for SourceView<'_> {
    type Target = [u8];

    #[inline(always)]
    fn deref(&self) -> &[u8] {
        match self {
            SourceView::Mapped(mmap) => mmap,
            SourceView::Borrowed(slice) => slice,
        }
    }
}

pub trait RandomAccessSource {
    /// Total length of the source in bytes.
    fn size(&self) -> u64;

    /// Exposes `len` bytes starting at `offset`. Ranges past the end fail
    /// with `UnexpectedEof`.
    fn map_range(&self, offset: u64, len: usize) -> io::Result<SourceView<'_>>;
}

impl<S: RandomAccessSource + ?Sized> RandomAccessSource for &S {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn map_range(&self, offset: u64, len: usize) -> io::Result<SourceView<'_>> {
        (**self).map_range(offset, len)
    }
}

fn check_range(offset: u64, len: usize, size: u64) -> io::Result<()> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "range {:#x}+{:#x} is past the end of a {} byte source",
                offset, len, size
            ),
        )),
    }
}

/// A file whose ranges are memory mapped on demand.
#[derive(Debug)]
pub struct MmapSource {
    file: File,
    path: PathBuf,
    size: u64,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<MmapSource> {
        let file = OpenOptions::new().read(true).open(path.as_ref())?;
        let size = file.metadata()?.len();

        Ok(MmapSource {
            file,
            path: path.as_ref().to_path_buf(),
            size,
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RandomAccessSource for MmapSource {
    #[inline(always)]
    fn size(&self) -> u64 {
        self.size
    }

    fn map_range(&self, offset: u64, len: usize) -> io::Result<SourceView<'_>> {
        check_range(offset, len, self.size)?;
        if len == 0 {
            return Ok(SourceView::Borrowed(&[]));
        }

        // Safety: the mapping is read-only and dropped before the pipeline
        // returns; concurrent truncation of the file by another process is
        // outside of what this type guards against.
        let mmap = unsafe { MmapOptions::new().offset(offset).len(len).map(&self.file)? };
        Ok(SourceView::Mapped(mmap))
    }
}

/// An in-memory source that counts how often it is read.
#[derive(Debug, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    reads: AtomicUsize,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> MemorySource {
        MemorySource {
            data,
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `map_range` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl RandomAccessSource for MemorySource {
    #[inline(always)]
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn map_range(&self, offset: u64, len: usize) -> io::Result<SourceView<'_>> {
        check_range(offset, len, self.size())?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let start = offset as usize;
        Ok(SourceView::Borrowed(&self.data[start..start + len]))
    }
}

pub trait AppendSink {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: AppendSink + ?Sized> AppendSink for &mut T {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).append(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl AppendSink for Vec<u8> {
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// A buffered, freshly truncated output file written front to back.
#[derive(Debug)]
pub struct FileSink {
    file: BufWriter<File>,
}

impl FileSink {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<FileSink> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        Ok(FileSink {
            file: BufWriter::new(file),
        })
    }
}

impl AppendSink for FileSink {
    #[inline(always)]
    fn append(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

pub trait PreallocatedSink {
    /// Sizes the output before any `write_at`.
    fn set_length(&mut self, len: u64) -> io::Result<()>;

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: PreallocatedSink + ?Sized> PreallocatedSink for &mut T {
    fn set_length(&mut self, len: u64) -> io::Result<()> {
        (**self).set_length(len)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        (**self).write_at(offset, bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

impl PreallocatedSink for Vec<u8> {
    fn set_length(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length exceeds memory"))?;
        self.resize(len, 0);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        check_range(offset, bytes.len(), self.len() as u64)?;
        let start = offset as usize;
        self[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// An output file written at arbitrary offsets.
#[derive(Debug)]
pub struct OutputFile {
    file: File,
    len: u64,
}

impl OutputFile {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<OutputFile> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        Ok(OutputFile { file, len: 0 })
    }
}

impl PreallocatedSink for OutputFile {
    fn set_length(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)?;
        self.len = len;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        check_range(offset, bytes.len(), self.len)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_counts_reads() {
        let source = MemorySource::new((0..100u8).collect());
        assert_eq!(source.size(), 100);
        assert_eq!(&*source.map_range(10, 5).unwrap(), &[10, 11, 12, 13, 14]);
        assert_eq!(source.reads(), 1);

        let err = source.map_range(98, 5).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn mmap_source_maps_unaligned_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.bin");
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let source = MmapSource::open(&path).unwrap();
        assert_eq!(source.size(), 20_000);
        assert_eq!(&*source.map_range(4097, 300).unwrap(), &data[4097..4397]);
        assert!(source.map_range(0, 0).unwrap().is_empty());
        assert!(source.map_range(19_990, 11).is_err());
    }

    #[test]
    fn vec_sinks() {
        let mut out = Vec::new();
        AppendSink::append(&mut out, b"abc").unwrap();
        AppendSink::append(&mut out, b"def").unwrap();
        assert_eq!(out, b"abcdef");

        let mut out = Vec::new();
        out.set_length(6).unwrap();
        out.write_at(3, b"xyz").unwrap();
        out.write_at(0, b"abc").unwrap();
        assert_eq!(out, b"abcxyz");
        assert!(out.write_at(4, b"zzz").is_err());
    }

    #[test]
    fn output_file_writes_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        let mut out = OutputFile::create(&path).unwrap();
        out.set_length(8).unwrap();
        out.write_at(4, b"5678").unwrap();
        out.write_at(0, b"1234").unwrap();
        PreallocatedSink::flush(&mut out).unwrap();
        drop(out);

        assert_eq!(std::fs::read(&path).unwrap(), b"12345678");
    }

    #[test]
    fn file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("append.bin");
        std::fs::write(&path, b"stale contents").unwrap();

        let mut sink = FileSink::create(&path).unwrap();
        sink.append(b"fresh").unwrap();
        AppendSink::flush(&mut sink).unwrap();
        drop(sink);

        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
    }
}
