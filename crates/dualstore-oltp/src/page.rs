//! Fixed-size page I/O and leaf-node (de)serialisation.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use dualstore_sql::StorageError;

/// Fixed page size, in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Page 0: the file header. First 8 bytes hold the big-endian offset of the
/// root metadata page; the rest is reserved (zero).
pub const HEADER_PAGE: u64 = 0;
/// Page 1: serialised table schemas.
pub const METADATA_PAGE: u64 = 1;
/// Page 2: serialised rows for every table. The minimal core keeps this to
/// a single leaf page.
pub const DATA_PAGE: u64 = 2;

const HEADER_LEN: usize = 16;

/// Raw byte I/O over fixed-size pages, with a reusable scratch buffer so
/// callers avoid a fresh allocation on every read. Reads and writes take `&self`:
/// `File`'s OS-level read/seek/write are available through a shared
/// reference, and the scratch buffer's reuse is mediated by a `Mutex` the
/// router's outer lock makes uncontended in practice.
pub struct Pager {
    file: File,
    scratch: Mutex<[u8; PAGE_SIZE]>,
}

impl Pager {
    pub fn open(file: File) -> std::io::Result<Self> {
        Ok(Self {
            file,
            scratch: Mutex::new([0u8; PAGE_SIZE]),
        })
    }

    fn offset(page: u64) -> u64 {
        page * PAGE_SIZE as u64
    }

    /// Reads a page into the scratch buffer and returns an owned copy.
    /// A page beyond the current end of file reads as all-zero.
    pub fn read_page(&self, page: u64) -> std::io::Result<[u8; PAGE_SIZE]> {
        let mut scratch = self.scratch.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        scratch.fill(0);
        let len = self.file.metadata()?.len();
        let offset = Self::offset(page);
        if offset < len {
            (&self.file).seek(SeekFrom::Start(offset))?;
            let to_read = PAGE_SIZE.min((len - offset) as usize);
            (&self.file).read_exact(&mut scratch[..to_read])?;
        }
        Ok(*scratch)
    }

    /// Writes a whole page at a fixed offset and fsyncs, so a write either
    /// lands in full or (on I/O failure) leaves the file as if it never
    /// happened — no partial-page updates.
    pub fn write_page(&self, page: u64, data: &[u8; PAGE_SIZE]) -> std::io::Result<()> {
        (&self.file).seek(SeekFrom::Start(Self::offset(page)))?;
        (&self.file).write_all(data)?;
        self.file.sync_all()
    }

    pub fn flush(&self) -> std::io::Result<()> {
        self.file.sync_all()
    }
}

/// Initialises a freshly created file with the fixed header, an empty
/// metadata page and an empty data page.
pub fn init_file(pager: &Pager) -> std::io::Result<()> {
    let mut header = [0u8; PAGE_SIZE];
    let metadata_offset = METADATA_PAGE * PAGE_SIZE as u64;
    header[0..8].copy_from_slice(&metadata_offset.to_be_bytes());
    pager.write_page(HEADER_PAGE, &header)?;
    pager.write_page(METADATA_PAGE, &encode_entries(&[]).expect("empty page always fits"))?;
    pager.write_page(DATA_PAGE, &encode_entries(&[]).expect("empty page always fits"))?;
    Ok(())
}

/// Encodes a sorted `(key, value)` entry list into one leaf-node page.
///
/// Layout: `num_keys:u64 | is_leaf:u64` header, then per entry
/// `key_len:u32 | key_bytes | value_len:u32 | value_bytes`, sorted by
/// byte-lexicographic key order. Fails with `StorageFull`
/// rather than silently truncating if the entries don't fit one page.
pub fn encode_entries(entries: &[(String, Vec<u8>)]) -> Result<[u8; PAGE_SIZE], StorageError> {
    let mut sorted: Vec<&(String, Vec<u8>)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut body = Vec::with_capacity(PAGE_SIZE);
    for (key, value) in &sorted {
        let key_bytes = key.as_bytes();
        #[allow(clippy::cast_possible_truncation)]
        body.extend_from_slice(&(key_bytes.len() as u32).to_be_bytes());
        body.extend_from_slice(key_bytes);
        #[allow(clippy::cast_possible_truncation)]
        body.extend_from_slice(&(value.len() as u32).to_be_bytes());
        body.extend_from_slice(value);
    }

    if HEADER_LEN + body.len() > PAGE_SIZE {
        return Err(StorageError::StorageFull);
    }

    let mut page = [0u8; PAGE_SIZE];
    #[allow(clippy::cast_possible_truncation)]
    page[0..8].copy_from_slice(&(sorted.len() as u64).to_be_bytes());
    page[8..16].copy_from_slice(&1u64.to_be_bytes()); // is_leaf
    page[HEADER_LEN..HEADER_LEN + body.len()].copy_from_slice(&body);
    Ok(page)
}

/// Decodes a leaf-node page back into its `(key, value)` entries.
pub fn decode_entries(page: &[u8; PAGE_SIZE]) -> Vec<(String, Vec<u8>)> {
    let num_keys = u64::from_be_bytes(page[0..8].try_into().unwrap()) as usize;
    let mut entries = Vec::with_capacity(num_keys);
    let mut pos = HEADER_LEN;

    for _ in 0..num_keys {
        let key_len = u32::from_be_bytes(page[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let key = String::from_utf8_lossy(&page[pos..pos + key_len]).into_owned();
        pos += key_len;

        let value_len = u32::from_be_bytes(page[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let value = page[pos..pos + value_len].to_vec();
        pos += value_len;

        entries.push((key, value));
    }
    entries
}
