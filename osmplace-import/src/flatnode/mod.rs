//! Disk-backed flat-node coordinate cache.
//!
//! Maps OSM node ids to fixed-point coordinate records in a single flat
//! file: a small header followed by an array of 8-byte records indexed by
//! id. Initial imports stream large sequential write blocks; append mode
//! and all reads go through a block cache of small randomly accessed
//! read blocks with an approximate-LFU replacement policy.
//!
//! Real I/O failures on the cache file are fatal to the import; advisory
//! calls (fsync, fadvise, sync_file_range) only log. A crashed initial
//! import is recovered by deleting the file and restarting, so durability
//! of the header rewrite is best effort.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use log::{info, warn};
use thiserror::Error;

use osmplace_core::{Coordinate, FixedPoint, OsmId};

mod hints;

const FORMAT_VERSION: i32 = 1;
const ID_SIZE: i32 = 8;

/// Header bytes at the start of the cache file.
pub const HEADER_BYTES: u64 = 16;
/// Bytes per coordinate record.
pub const RECORD_BYTES: u64 = 8;

const READ_BLOCK_SHIFT: u32 = 10;
/// Records per read block.
pub const READ_BLOCK_RECORDS: usize = 1 << READ_BLOCK_SHIFT;
const READ_BLOCK_MASK: i64 = (READ_BLOCK_RECORDS as i64) - 1;
const READ_CACHE_BLOCKS: usize = 10_000;

const WRITE_BLOCK_SHIFT: u32 = 20;
const WRITE_BLOCK_RECORDS: usize = 1 << WRITE_BLOCK_SHIFT;
const WRITE_BLOCK_MASK: i64 = (WRITE_BLOCK_RECORDS as i64) - 1;

/// Create-mode blocks this far behind the write head are flushed to disk
/// and dropped from the OS page cache.
const EVICT_LAG_BLOCKS: i64 = 16;

/// Errors raised by the flat-node cache. All variants except the
/// advisory-logged conditions are fatal to the import.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Opening or creating the cache file failed.
    #[error("failed to open flat node file at {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// A seek, read or write on the cache file failed.
    #[error("failed to {operation} flat node file")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    /// The file was produced by an incompatible version of the importer.
    #[error("flat node file has format version {found}, expected {FORMAT_VERSION}")]
    BadVersion { found: i32 },
    /// The file was produced with a different id width.
    #[error("flat node file has id size {found}, expected {ID_SIZE}")]
    BadIdSize { found: i32 },
    /// The file is shorter than its header claims.
    #[error("flat node file at {path:?} is truncated")]
    Truncated { path: PathBuf },
    /// Create-mode writes must advance monotonically through the file.
    #[error("create-mode write for block {requested} behind current block {current}")]
    OutOfOrder { current: i64, requested: i64 },
}

/// Read access to the RAM node cache owned by the import driver.
///
/// The persistent cache consults it on batch reads and fills it on the
/// create-mode write path; ownership stays with the driver.
pub trait RamNodes {
    fn get(&self, id: OsmId) -> Option<Coordinate>;
    fn set(&mut self, id: OsmId, coord: Coordinate);
}

/// Simple bounded hash-map RAM cache. Once full, new ids are dropped
/// rather than evicting older entries; the persistent cache remains the
/// source of truth.
#[derive(Debug)]
pub struct SparseRamCache {
    nodes: HashMap<OsmId, Coordinate>,
    capacity: usize,
}

impl SparseRamCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl RamNodes for SparseRamCache {
    fn get(&self, id: OsmId) -> Option<Coordinate> {
        self.nodes.get(&id).copied()
    }

    fn set(&mut self, id: OsmId, coord: Coordinate) {
        if self.nodes.len() < self.capacity || self.nodes.contains_key(&id) {
            self.nodes.insert(id, coord);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FixedRecord {
    lon: i32,
    lat: i32,
}

impl FixedRecord {
    const ABSENT: FixedRecord = FixedRecord {
        lon: i32::MIN,
        lat: i32::MIN,
    };
}

#[derive(Debug, Clone, Copy)]
struct CacheHeader {
    format_version: i32,
    id_size: i32,
    max_initialised_id: OsmId,
}

#[derive(Debug)]
struct ReadBlock {
    records: Vec<FixedRecord>,
    /// Block offset in the file, or -1 for an unused slot.
    offset: i64,
    used: i32,
    dirty: bool,
}

#[derive(Debug)]
struct WriteBlock {
    records: Vec<FixedRecord>,
    offset: i64,
    dirty: bool,
}

/// The persistent flat-node cache.
///
/// # Examples
/// ```no_run
/// use osmplace_core::{Coordinate, DEFAULT_SCALE};
/// use osmplace_import::flatnode::PersistentNodeCache;
///
/// # fn main() -> Result<(), osmplace_import::flatnode::CacheError> {
/// let mut cache = PersistentNodeCache::create("flat.nodes", DEFAULT_SCALE)?;
/// cache.set(42, Coordinate::new(2.0, 1.0))?;
/// assert!(cache.get(42)?.is_some());
/// assert!(cache.get(43)?.is_none());
/// cache.close()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PersistentNodeCache {
    file: File,
    path: PathBuf,
    append: bool,
    codec: FixedPoint,
    header: CacheHeader,
    write_block: WriteBlock,
    read_blocks: Vec<ReadBlock>,
    /// Sorted (block offset, cache slot) pairs for O(log n) block lookup.
    index: Vec<(i64, usize)>,
    closed: bool,
}

impl PersistentNodeCache {
    /// Create a fresh cache file for an initial import, truncating any
    /// existing file at `path`.
    pub fn create(path: impl AsRef<Path>, scale: i32) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| CacheError::Open {
                path: path.clone(),
                source,
            })?;

        let header = CacheHeader {
            format_version: FORMAT_VERSION,
            id_size: ID_SIZE,
            max_initialised_id: -1,
        };
        write_header(&mut file, &header).map_err(|source| CacheError::Io {
            operation: "initialise header of",
            source,
        })?;

        Self::finish_open(file, path, false, scale)
    }

    /// Open an existing cache file for incremental updates.
    pub fn open_append(path: impl AsRef<Path>, scale: i32) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| CacheError::Open {
                path: path.clone(),
                source,
            })?;

        Self::finish_open(file, path, true, scale)
    }

    fn finish_open(
        mut file: File,
        path: PathBuf,
        append: bool,
        scale: i32,
    ) -> Result<Self, CacheError> {
        let header = read_header(&mut file).map_err(|source| CacheError::Io {
            operation: "read header of",
            source,
        })?;
        if header.format_version != FORMAT_VERSION {
            return Err(CacheError::BadVersion {
                found: header.format_version,
            });
        }
        if header.id_size != ID_SIZE {
            return Err(CacheError::BadIdSize {
                found: header.id_size,
            });
        }

        let len = file
            .metadata()
            .map_err(|source| CacheError::Io {
                operation: "stat",
                source,
            })?
            .len();
        let required = HEADER_BYTES + (header.max_initialised_id + 1) as u64 * RECORD_BYTES;
        if len < required {
            return Err(CacheError::Truncated { path });
        }

        info!(
            "flat-node cache {}: maximum initialised node id {}",
            path.display(),
            header.max_initialised_id
        );

        let read_blocks = (0..READ_CACHE_BLOCKS)
            .map(|_| ReadBlock {
                records: Vec::new(),
                offset: -1,
                used: 0,
                dirty: false,
            })
            .collect();

        Ok(Self {
            file,
            path,
            append,
            codec: FixedPoint::new(scale),
            header,
            write_block: WriteBlock {
                records: vec![FixedRecord::ABSENT; WRITE_BLOCK_RECORDS],
                offset: 0,
                dirty: false,
            },
            read_blocks,
            index: Vec::with_capacity(READ_CACHE_BLOCKS),
            closed: false,
        })
    }

    pub fn max_initialised_id(&self) -> OsmId {
        self.header.max_initialised_id
    }

    /// Store a coordinate for `id`.
    ///
    /// In create mode writes must progress monotonically through the
    /// write blocks; in append mode any id may be written.
    pub fn set(&mut self, id: OsmId, coord: Coordinate) -> Result<(), CacheError> {
        if self.append {
            self.set_append(id, coord)
        } else {
            self.set_create(id, coord)
        }
    }

    fn set_create(&mut self, id: OsmId, coord: Coordinate) -> Result<(), CacheError> {
        let target = id >> WRITE_BLOCK_SHIFT;

        if self.write_block.offset != target {
            if self.write_block.dirty {
                self.flush_create_block()?;
                self.header.max_initialised_id =
                    ((self.write_block.offset + 1) << WRITE_BLOCK_SHIFT) - 1;
                self.write_block.dirty = false;
                self.write_block.offset += 1;
            }
            if self.write_block.offset > target {
                return Err(CacheError::OutOfOrder {
                    current: self.write_block.offset,
                    requested: target,
                });
            }
            // Ids skipped by the input stream must read back as absent.
            self.write_block.records.fill(FixedRecord::ABSENT);
            while self.write_block.offset < target {
                self.flush_create_block()?;
                self.header.max_initialised_id =
                    ((self.write_block.offset + 1) << WRITE_BLOCK_SHIFT) - 1;
                self.write_block.offset += 1;
            }
        }

        let (lon, lat) = self.codec.encode(coord);
        self.write_block.records[(id & WRITE_BLOCK_MASK) as usize] = FixedRecord { lon, lat };
        self.write_block.dirty = true;
        Ok(())
    }

    fn set_append(&mut self, id: OsmId, coord: Coordinate) -> Result<(), CacheError> {
        let offset = id >> READ_BLOCK_SHIFT;
        let slot = match self.find_block(offset) {
            Some(slot) => slot,
            None => self.load_block(offset)?,
        };

        let (lon, lat) = self.codec.encode(coord);
        let block = &mut self.read_blocks[slot];
        block.records[(id & READ_BLOCK_MASK) as usize] = FixedRecord { lon, lat };
        block.used = READ_CACHE_BLOCKS as i32;
        block.dirty = true;
        Ok(())
    }

    /// Read the coordinate stored for `id`; `None` when the id was never
    /// written or lies beyond the initialised range.
    pub fn get(&mut self, id: OsmId) -> Result<Option<Coordinate>, CacheError> {
        if id < 0 {
            return Ok(None);
        }
        let offset = id >> READ_BLOCK_SHIFT;
        let slot = match self.find_block(offset) {
            Some(slot) => slot,
            None => {
                // Pending create-mode data has to reach the file before
                // the block covering it can be read back.
                self.writeout_dirty(false)?;
                if id > self.header.max_initialised_id {
                    return Ok(None);
                }
                self.load_block(offset)?
            }
        };

        self.read_blocks[slot].used = READ_CACHE_BLOCKS as i32;
        let rec = self.read_blocks[slot].records[(id & READ_BLOCK_MASK) as usize];
        Ok(self.codec.decode(rec.lon, rec.lat))
    }

    /// Batch lookup. The RAM cache is consulted first; for the remaining
    /// ids a readahead hint is issued before each one is read
    /// synchronously. Returns only the resolved coordinates, in input
    /// order; callers needing per-id alignment must use [`Self::get`].
    pub fn get_list(
        &mut self,
        ids: &[OsmId],
        ram: Option<&dyn RamNodes>,
    ) -> Result<Vec<Coordinate>, CacheError> {
        let mut found: Vec<Option<Coordinate>> = ids
            .iter()
            .map(|&id| ram.and_then(|cache| cache.get(id)))
            .collect();

        if found.iter().all(Option::is_some) {
            return Ok(found.into_iter().flatten().collect());
        }

        // Issue all readahead hints up front for a deeper I/O queue.
        for (i, &id) in ids.iter().enumerate() {
            if found[i].is_none() {
                self.prefetch(id)?;
            }
        }
        for (i, &id) in ids.iter().enumerate() {
            if found[i].is_none() {
                found[i] = self.get(id)?;
            }
        }

        Ok(found.into_iter().flatten().collect())
    }

    /// Write out all dirty state and rewrite the header.
    pub fn flush(&mut self) -> Result<(), CacheError> {
        self.writeout_dirty(true)?;
        self.write_header_and_sync()
    }

    /// Flush and close the cache. Preferred over dropping, which can only
    /// log failures.
    pub fn close(mut self) -> Result<(), CacheError> {
        self.flush()?;
        info!(
            "flat-node cache {}: maximum initialised node id {}",
            self.path.display(),
            self.header.max_initialised_id
        );
        self.closed = true;
        Ok(())
    }

    fn prefetch(&mut self, id: OsmId) -> Result<(), CacheError> {
        if id < 0 {
            return Ok(());
        }
        let offset = id >> READ_BLOCK_SHIFT;
        if self.find_block(offset).is_some() {
            return Ok(());
        }
        if self.write_block.dirty {
            self.writeout_dirty(false)?;
        }
        if id > self.header.max_initialised_id {
            return Ok(());
        }
        hints::prefetch(
            &self.file,
            read_block_pos(offset),
            READ_BLOCK_RECORDS as u64 * RECORD_BYTES,
        );
        Ok(())
    }

    /// Write the current create-mode block at its file position and hint
    /// the kernel about writeback and page-cache eviction.
    fn flush_create_block(&mut self) -> Result<(), CacheError> {
        let pos = HEADER_BYTES
            + ((self.write_block.offset as u64) << WRITE_BLOCK_SHIFT) * RECORD_BYTES;
        write_records(&mut self.file, pos, &self.write_block.records).map_err(|source| {
            CacheError::Io {
                operation: "write block to",
                source,
            }
        })?;

        let len = WRITE_BLOCK_RECORDS as u64 * RECORD_BYTES;
        hints::start_writeback(&self.file, pos, len);
        if self.write_block.offset > EVICT_LAG_BLOCKS {
            let old = HEADER_BYTES
                + (((self.write_block.offset - EVICT_LAG_BLOCKS) as u64) << WRITE_BLOCK_SHIFT)
                    * RECORD_BYTES;
            hints::finish_and_evict(&self.file, old, len);
        }
        Ok(())
    }

    fn writeout_dirty(&mut self, flush_reads: bool) -> Result<(), CacheError> {
        if self.write_block.dirty {
            let pos = HEADER_BYTES
                + ((self.write_block.offset as u64) << WRITE_BLOCK_SHIFT) * RECORD_BYTES;
            write_records(&mut self.file, pos, &self.write_block.records).map_err(|source| {
                CacheError::Io {
                    operation: "write block to",
                    source,
                }
            })?;
            self.header.max_initialised_id =
                ((self.write_block.offset + 1) << WRITE_BLOCK_SHIFT) - 1;
            self.write_block.dirty = false;
            self.write_header_and_sync()?;
        }

        if flush_reads {
            for slot in 0..self.read_blocks.len() {
                if !self.read_blocks[slot].dirty {
                    continue;
                }
                let pos = read_block_pos(self.read_blocks[slot].offset);
                write_records(&mut self.file, pos, &self.read_blocks[slot].records).map_err(
                    |source| CacheError::Io {
                        operation: "write block to",
                        source,
                    },
                )?;
                self.read_blocks[slot].dirty = false;
            }
        }
        Ok(())
    }

    fn write_header_and_sync(&mut self) -> Result<(), CacheError> {
        write_header(&mut self.file, &self.header).map_err(|source| CacheError::Io {
            operation: "update header of",
            source,
        })?;
        if let Err(err) = self.file.sync_all() {
            info!("flat-node cache fsync failed, durability is best effort: {err}");
        }
        Ok(())
    }

    fn find_block(&self, offset: i64) -> Option<usize> {
        self.index
            .binary_search_by_key(&offset, |entry| entry.0)
            .ok()
            .map(|i| self.index[i].1)
    }

    fn remove_from_index(&mut self, offset: i64) {
        if let Ok(i) = self.index.binary_search_by_key(&offset, |entry| entry.0) {
            self.index.remove(i);
        }
    }

    fn add_to_index(&mut self, offset: i64, slot: usize) {
        match self.index.binary_search_by_key(&offset, |entry| entry.0) {
            Ok(i) => self.index[i] = (offset, slot),
            Err(i) => self.index.insert(i, (offset, slot)),
        }
    }

    /// Pick the block with the minimum usage count for replacement. When
    /// every block is in use, age the whole cache by one.
    fn replace_block(&mut self) -> usize {
        let mut min_used = i32::MAX;
        let mut slot = 0;
        for (i, block) in self.read_blocks.iter().enumerate() {
            if block.used < min_used {
                min_used = block.used;
                slot = i;
            }
        }
        if min_used > 0 {
            for block in &mut self.read_blocks {
                if block.used > 1 {
                    block.used -= 1;
                }
            }
        }
        slot
    }

    /// Load a read block synchronously, evicting the least used slot and
    /// extending the file first when the block lies beyond the
    /// initialised range.
    fn load_block(&mut self, offset: i64) -> Result<usize, CacheError> {
        let slot = self.replace_block();

        if self.read_blocks[slot].dirty {
            let pos = read_block_pos(self.read_blocks[slot].offset);
            write_records(&mut self.file, pos, &self.read_blocks[slot].records).map_err(
                |source| CacheError::Io {
                    operation: "write block to",
                    source,
                },
            )?;
            self.read_blocks[slot].dirty = false;
        }
        if self.read_blocks[slot].offset >= 0 {
            self.remove_from_index(self.read_blocks[slot].offset);
        }

        if self.read_blocks[slot].records.is_empty() {
            self.read_blocks[slot].records = vec![FixedRecord::ABSENT; READ_BLOCK_RECORDS];
        } else {
            self.read_blocks[slot].records.fill(FixedRecord::ABSENT);
        }
        self.read_blocks[slot].offset = offset;
        self.read_blocks[slot].used = READ_CACHE_BLOCKS as i32;

        if self.header.max_initialised_id < ((offset + 1) << READ_BLOCK_SHIFT) - 1 {
            self.expand(offset)?;
        }

        read_records(
            &mut self.file,
            read_block_pos(offset),
            &mut self.read_blocks[slot].records,
        )
        .map_err(|source| CacheError::Io {
            operation: "read block from",
            source,
        })?;

        self.add_to_index(offset, slot);
        Ok(slot)
    }

    /// Extend the file with absence-sentinel blocks up to and including
    /// `target_block`, then advance the header.
    fn expand(&mut self, target_block: i64) -> Result<(), CacheError> {
        let first = (self.header.max_initialised_id + 1) >> READ_BLOCK_SHIFT;
        let sentinels = vec![FixedRecord::ABSENT; READ_BLOCK_RECORDS];
        for block in first..=target_block {
            write_records(&mut self.file, read_block_pos(block), &sentinels).map_err(
                |source| CacheError::Io {
                    operation: "expand",
                    source,
                },
            )?;
        }
        self.header.max_initialised_id = ((target_block + 1) << READ_BLOCK_SHIFT) - 1;
        self.write_header_and_sync()
    }
}

impl Drop for PersistentNodeCache {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.flush() {
            warn!("flat-node cache flush on drop failed: {err}");
        }
    }
}

fn read_block_pos(offset: i64) -> u64 {
    HEADER_BYTES + ((offset as u64) << READ_BLOCK_SHIFT) * RECORD_BYTES
}

fn write_header(file: &mut File, header: &CacheHeader) -> io::Result<()> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::with_capacity(HEADER_BYTES as usize);
    buf.write_i32::<NativeEndian>(header.format_version)?;
    buf.write_i32::<NativeEndian>(header.id_size)?;
    buf.write_i64::<NativeEndian>(header.max_initialised_id)?;
    file.write_all(&buf)
}

fn read_header(file: &mut File) -> io::Result<CacheHeader> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = [0u8; HEADER_BYTES as usize];
    file.read_exact(&mut buf)?;
    let mut rdr = &buf[..];
    Ok(CacheHeader {
        format_version: rdr.read_i32::<NativeEndian>()?,
        id_size: rdr.read_i32::<NativeEndian>()?,
        max_initialised_id: rdr.read_i64::<NativeEndian>()?,
    })
}

fn write_records(file: &mut File, pos: u64, records: &[FixedRecord]) -> io::Result<()> {
    file.seek(SeekFrom::Start(pos))?;
    let mut buf = Vec::with_capacity(records.len() * RECORD_BYTES as usize);
    for rec in records {
        buf.write_i32::<NativeEndian>(rec.lon)?;
        buf.write_i32::<NativeEndian>(rec.lat)?;
    }
    file.write_all(&buf)
}

fn read_records(file: &mut File, pos: u64, records: &mut [FixedRecord]) -> io::Result<()> {
    file.seek(SeekFrom::Start(pos))?;
    let mut buf = vec![0u8; records.len() * RECORD_BYTES as usize];
    file.read_exact(&mut buf)?;
    let mut rdr = &buf[..];
    for rec in records.iter_mut() {
        rec.lon = rdr.read_i32::<NativeEndian>()?;
        rec.lat = rdr.read_i32::<NativeEndian>()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn create_then_read_back_within_one_block() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("flat.nodes");
        let mut cache =
            PersistentNodeCache::create(&path, osmplace_core::DEFAULT_SCALE).expect("create");

        cache.set(7, Coordinate::new(12.3, 3.0)).expect("set");
        let got = cache.get(7).expect("get").expect("present");
        assert!((got.lon - 12.3).abs() < 1e-6);
        assert!((got.lat - 3.0).abs() < 1e-6);
        assert!(cache.get(8).expect("get").is_none());
    }

    #[rstest]
    fn create_mode_rejects_backwards_blocks() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("flat.nodes");
        let mut cache =
            PersistentNodeCache::create(&path, osmplace_core::DEFAULT_SCALE).expect("create");

        let far = (3 << WRITE_BLOCK_SHIFT) + 5;
        cache.set(far, Coordinate::new(1.0, 1.0)).expect("set");
        let err = cache.set(1, Coordinate::new(1.0, 1.0)).expect_err("regression");
        assert!(matches!(err, CacheError::OutOfOrder { .. }));
    }

    #[rstest]
    fn version_mismatch_is_rejected() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("flat.nodes");
        {
            let cache =
                PersistentNodeCache::create(&path, osmplace_core::DEFAULT_SCALE).expect("create");
            cache.close().expect("close");
        }
        // Corrupt the version field.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .expect("reopen raw");
        let mut header = read_header(&mut file).expect("read header");
        header.format_version = 99;
        write_header(&mut file, &header).expect("rewrite header");
        drop(file);

        let err = PersistentNodeCache::open_append(&path, osmplace_core::DEFAULT_SCALE)
            .expect_err("bad version");
        assert!(matches!(err, CacheError::BadVersion { found: 99 }));
    }

    #[rstest]
    fn ram_cache_respects_capacity() {
        let mut ram = SparseRamCache::new(2);
        ram.set(1, Coordinate::new(1.0, 1.0));
        ram.set(2, Coordinate::new(2.0, 2.0));
        ram.set(3, Coordinate::new(3.0, 3.0));
        assert_eq!(ram.len(), 2);
        assert!(ram.get(1).is_some());
        assert!(ram.get(3).is_none());
        // Existing ids may still be refreshed.
        ram.set(1, Coordinate::new(9.0, 9.0));
        assert_eq!(ram.get(1).map(|c| c.lon), Some(9.0));
    }
}
