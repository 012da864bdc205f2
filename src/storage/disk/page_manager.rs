use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::common::{DbError, PageId, Result, META_PAGE_ID, PAGE_SIZE};
use crate::storage::page::{MetaPage, Page, PageType};

/// Allocator state guarded by the manager's reader/writer lock.
struct AllocatorState {
    /// Next never-issued page ID
    next_page: u32,
    /// Reclaimed page IDs, reused LIFO
    free_list: Vec<PageId>,
    /// In-memory copy of page 0
    meta: MetaPage,
}

/// PageManager owns a single database file and hands out fixed-size pages.
///
/// Every write is synchronous: the page is written at `id * PAGE_SIZE` and the
/// file is synced before the call returns. Page 0 is reserved for metadata,
/// which also records the root page of every named tree.
pub struct PageManager {
    /// The database file
    db_file: Mutex<File>,
    /// Path to the database file
    db_path: PathBuf,
    state: RwLock<AllocatorState>,
    /// Number of page reads performed
    num_reads: AtomicU32,
    /// Number of page writes performed
    num_writes: AtomicU32,
}

impl PageManager {
    /// Opens the database file at `db_path`, creating it if needed.
    ///
    /// An empty file is initialized with the metadata page. For an existing
    /// file the next page ID is derived from the file length and every page
    /// marked `Free` is put back on the free list.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let file_size = file.metadata()?.len();

        let pm = Self {
            db_file: Mutex::new(file),
            db_path,
            state: RwLock::new(AllocatorState {
                next_page: 1,
                free_list: Vec::new(),
                meta: MetaPage::new(),
            }),
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        };

        if file_size == 0 {
            let meta = MetaPage::new();
            pm.write_meta_locked(&meta)?;
            info!("initialized new database file {}", pm.db_path.display());
        } else {
            pm.recover(file_size)?;
        }

        Ok(pm)
    }

    fn recover(&self, file_size: u64) -> Result<()> {
        if file_size % PAGE_SIZE as u64 != 0 {
            warn!(
                "database file {} has a partial trailing page ({} bytes)",
                self.db_path.display(),
                file_size
            );
        }
        let num_pages = (file_size / PAGE_SIZE as u64).max(1) as u32;

        let meta_page = self.read_page_unchecked(META_PAGE_ID)?;
        let meta = match MetaPage::decode(meta_page.data())? {
            Some(meta) => meta,
            None => {
                warn!(
                    "metadata page of {} does not carry the expected magic",
                    self.db_path.display()
                );
                MetaPage::new()
            }
        };

        let mut free_list = Vec::new();
        for id in 1..num_pages {
            let page_id = PageId::new(id);
            if self.read_page_type(page_id)? == PageType::Free {
                free_list.push(page_id);
            }
        }
        // Pop order hands out the lowest reclaimed ID first.
        free_list.reverse();

        info!(
            "opened database file {}: {} pages, {} free, {} roots",
            self.db_path.display(),
            num_pages,
            free_list.len(),
            meta.roots().len()
        );

        let mut state = self.state.write();
        state.next_page = num_pages;
        state.free_list = free_list;
        state.meta = meta;
        Ok(())
    }

    /// Allocates a page of the given type, reusing the most recently freed ID
    /// if there is one. The zeroed page is durable before the ID is returned.
    pub fn allocate_page(&self, page_type: PageType) -> Result<PageId> {
        let mut state = self.state.write();

        let reused = state.free_list.pop();
        let page_id = reused.unwrap_or(PageId::new(state.next_page));

        let mut page = Page::new(page_id, page_type);
        if let Err(e) = self.write_page_locked(&mut page) {
            if reused.is_some() {
                state.free_list.push(page_id);
            }
            return Err(e);
        }
        if reused.is_none() {
            state.next_page += 1;
        }

        debug!("allocated {} as {:?}", page_id, page_type);
        Ok(page_id)
    }

    /// Marks a page free and makes its ID available for reuse. The caller
    /// guarantees nothing still references the page.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.write();

        if page_id == META_PAGE_ID
            || page_id.as_u32() >= state.next_page
            || state.free_list.contains(&page_id)
        {
            return Err(DbError::InvalidPageId(page_id));
        }

        let mut page = Page::new(page_id, PageType::Free);
        self.write_page_locked(&mut page)?;
        state.free_list.push(page_id);

        debug!("deallocated {}", page_id);
        Ok(())
    }

    /// Reads and verifies a page.
    pub fn read_page(&self, page_id: PageId) -> Result<Page> {
        {
            let state = self.state.read();
            if !page_id.is_valid() || page_id.as_u32() >= state.next_page {
                return Err(DbError::InvalidPageId(page_id));
            }
        }

        let page = self.read_page_unchecked(page_id)?;
        page.verify_checksum()?;
        Ok(page)
    }

    /// Recomputes the checksum and writes the page durably.
    pub fn write_page(&self, page: &mut Page) -> Result<()> {
        let state = self.state.read();
        if !page.id().is_valid() || page.id().as_u32() >= state.next_page {
            return Err(DbError::InvalidPageId(page.id()));
        }
        self.write_page_locked(page)
    }

    fn read_page_unchecked(&self, page_id: PageId) -> Result<Page> {
        let mut buf = vec![0u8; PAGE_SIZE];

        let read = {
            let mut file = self.db_file.lock();
            file.seek(SeekFrom::Start(page_id.file_offset()))?;
            read_full(&mut *file, &mut buf)?
        };
        if read != PAGE_SIZE {
            return Err(DbError::ShortRead { page_id, read });
        }

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Page::deserialize(page_id, &buf)
    }

    fn read_page_type(&self, page_id: PageId) -> Result<PageType> {
        let mut type_byte = [0u8; 1];
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(page_id.file_offset()))?;
        file.read_exact(&mut type_byte)?;
        Ok(PageType::from(type_byte[0]))
    }

    /// Writes a page without validating its ID against the allocator.
    /// Callers hold the state lock.
    fn write_page_locked(&self, page: &mut Page) -> Result<()> {
        if !page.id().is_valid() {
            return Err(DbError::InvalidPageId(page.id()));
        }

        page.update_checksum();
        let buf = page.serialize();

        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(page.id().file_offset()))?;
        file.write_all(&buf)?;
        file.sync_data()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_meta_locked(&self, meta: &MetaPage) -> Result<()> {
        let mut page = Page::new(META_PAGE_ID, PageType::Meta);
        page.set_data(&meta.encode()?)?;
        self.write_page_locked(&mut page)
    }

    /// Root page recorded for the tree called `name`.
    pub fn root(&self, name: &str) -> Option<PageId> {
        self.state.read().meta.root(name)
    }

    /// Durably records `root` as the root page of the tree called `name`.
    pub fn set_root(&self, name: &str, root: PageId) -> Result<()> {
        let mut state = self.state.write();
        let mut meta = state.meta.clone();
        meta.set_root(name, root);
        self.write_meta_locked(&meta)?;
        state.meta = meta;
        debug!("recorded root {} for {:?}", root, name);
        Ok(())
    }

    /// Removes the catalog entry for `name`, returning the root it recorded.
    pub fn remove_root(&self, name: &str) -> Result<Option<PageId>> {
        let mut state = self.state.write();
        let mut meta = state.meta.clone();
        let removed = meta.remove_root(name);
        if removed.is_some() {
            self.write_meta_locked(&meta)?;
            state.meta = meta;
        }
        Ok(removed)
    }

    /// All recorded `(name, root)` pairs, in insertion order.
    pub fn roots(&self) -> Vec<(String, PageId)> {
        self.state.read().meta.roots().to_vec()
    }

    /// Returns the number of pages in the file, including page 0.
    pub fn num_pages(&self) -> u32 {
        self.state.read().next_page
    }

    pub fn free_list_len(&self) -> usize {
        self.state.read().free_list.len()
    }

    /// Returns the number of page reads performed.
    pub fn num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of page writes performed.
    pub fn num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Flushes file contents and metadata to stable storage.
    pub fn sync(&self) -> Result<()> {
        let file = self.db_file.lock();
        file.sync_all()?;
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        self.sync()?;
        info!("closed database file {}", self.db_path.display());
        Ok(())
    }
}

impl Drop for PageManager {
    fn drop(&mut self) {
        let file = self.db_file.get_mut();
        let _ = file.sync_all();
    }
}

/// Reads until `buf` is full or EOF, returning the byte count.
fn read_full(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match file.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}
