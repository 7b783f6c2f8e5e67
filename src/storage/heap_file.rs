use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use log::debug;

use crate::tuple::{DbType, DbValue, Tuple, TupleDesc, TupleError, STRING_LENGTH};

use super::buffer_pool::{BufferPool, PageKey};
use super::dbfile::{DbFile, Permission, TransactionId, TupleIter};
use super::error::{StorageError, StorageResult};
use super::heap_page::HeapPage;
use super::{PageId, PAGE_SIZE};

/// An unordered table stored as a sequence of slotted pages on a single
/// backing file. All page access on behalf of a transaction goes through
/// the buffer pool, which mediates locking and caching; the file itself
/// is opened per operation.
pub struct HeapFile {
    path: PathBuf,
    desc: TupleDesc,
    pool: Arc<BufferPool>,
    me: Weak<HeapFile>,
}

impl HeapFile {
    /// Open a heap file backed by `path`, creating the file if it does
    /// not exist
    pub fn new(
        path: impl AsRef<Path>,
        desc: TupleDesc,
        pool: Arc<BufferPool>,
    ) -> StorageResult<Arc<HeapFile>> {
        let path = path.as_ref().to_path_buf();
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        Ok(Arc::new_cyclic(|me| HeapFile {
            path,
            desc,
            pool,
            me: me.clone(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }

    fn handle(&self) -> Arc<HeapFile> {
        // A HeapFile is only ever constructed behind an Arc
        self.me.upgrade().expect("heap file outlived its Arc")
    }

    /// Number of pages in the backing file
    pub fn num_pages(&self) -> StorageResult<usize> {
        let len = std::fs::metadata(&self.path)?.len() as usize;
        Ok(len / PAGE_SIZE)
    }

    /// Read the page at `page_no` straight from disk. Callers wanting
    /// transactional access go through [`BufferPool::get_page`], which
    /// calls this on a cache miss.
    pub fn read_page(&self, page_no: PageId) -> StorageResult<HeapPage> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start((page_no * PAGE_SIZE) as u64))?;
        let mut buf = vec![0u8; PAGE_SIZE];
        file.read_exact(&mut buf)?;
        HeapPage::from_bytes(&self.desc, page_no, &buf)
    }

    /// Write `page` back at its offset, extending the file if needed.
    /// The caller is responsible for clearing the page's dirty flag.
    pub fn flush_page(&self, page: &HeapPage) -> StorageResult<()> {
        let bytes = page.to_bytes()?;
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let offset = (page.page_no() * PAGE_SIZE) as u64;
        let required = offset + PAGE_SIZE as u64;
        if file.metadata()?.len() < required {
            file.set_len(required)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Store `t` in the first page with a free slot, searching pages in
    /// order under write locks. When every existing page is full, a
    /// fresh page is appended and flushed directly, bypassing the pool
    /// so that buffer pressure never blocks inserts.
    pub fn insert_tuple(&self, t: &mut Tuple, tid: TransactionId) -> StorageResult<()> {
        for page_no in 0..self.num_pages()? {
            let handle = self
                .pool
                .get_page(&self.handle(), page_no, tid, Permission::ReadWrite)?;
            let mut page = handle.lock().unwrap();
            if !page.is_full() {
                page.insert_tuple(t)?;
                page.set_dirty(true);
                return Ok(());
            }
        }

        let page_no = self.num_pages()?;
        let mut page = HeapPage::new(&self.desc, page_no);
        page.insert_tuple(t)?;
        self.flush_page(&page)?;
        debug!("{}: appended page {}", self.path.display(), page_no);
        Ok(())
    }

    /// Remove the stored tuple `t` points at via its record id
    pub fn delete_tuple(&self, t: &Tuple, tid: TransactionId) -> StorageResult<()> {
        let rid = t
            .rid()
            .ok_or_else(|| StorageError::TupleNotFound("tuple has no record id".to_string()))?;
        let handle = self
            .pool
            .get_page(&self.handle(), rid.page_no, tid, Permission::ReadWrite)?;
        let mut page = handle.lock().unwrap();
        page.delete_tuple(rid)?;
        page.set_dirty(true);
        Ok(())
    }

    /// Scan every page under read locks, yielding occupied slots in
    /// order. Yielded tuples carry their record ids.
    pub fn scan(&self, tid: TransactionId) -> HeapFileScan {
        HeapFileScan {
            file: self.handle(),
            tid,
            page_no: 0,
            slot: 0,
            page: None,
        }
    }

    /// Bulk-load rows from CSV. Every row is inserted under its own
    /// immediately-committed transaction, so pool pressure cannot wedge
    /// a long load. Returns the number of rows inserted.
    pub fn load_from_csv<R: io::Read>(&self, reader: R, has_header: bool) -> StorageResult<usize> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .from_reader(reader);

        let mut rows = 0;
        for record in csv_reader.records() {
            let record = record.map_err(|e| StorageError::MalformedData(e.to_string()))?;
            let mut tuple = tuple_from_csv_record(&self.desc, &record)?;
            let tid = TransactionId::fresh();
            self.pool.begin_transaction(tid)?;
            if let Err(err) = self.insert_tuple(&mut tuple, tid) {
                self.pool.abort_transaction(tid)?;
                return Err(err);
            }
            self.pool.commit_transaction(tid)?;
            rows += 1;
        }
        debug!("{}: loaded {} rows from CSV", self.path.display(), rows);
        Ok(rows)
    }
}

impl DbFile for HeapFile {
    fn descriptor(&self) -> &TupleDesc {
        &self.desc
    }

    fn insert_tuple(&self, t: &mut Tuple, tid: TransactionId) -> StorageResult<()> {
        HeapFile::insert_tuple(self, t, tid)
    }

    fn delete_tuple(&self, t: &Tuple, tid: TransactionId) -> StorageResult<()> {
        HeapFile::delete_tuple(self, t, tid)
    }

    fn read_page(&self, page_no: PageId) -> StorageResult<HeapPage> {
        HeapFile::read_page(self, page_no)
    }

    fn flush_page(&self, page: &HeapPage) -> StorageResult<()> {
        HeapFile::flush_page(self, page)
    }

    fn page_key(&self, page_no: PageId) -> StorageResult<PageKey> {
        Ok(PageKey::new(&self.path, page_no))
    }

    fn iterator(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        Ok(Box::new(self.scan(tid)))
    }
}

/// Streaming scan over a heap file; pulls pages through the buffer pool
/// with read permission as it advances
pub struct HeapFileScan {
    file: Arc<HeapFile>,
    tid: TransactionId,
    page_no: PageId,
    slot: usize,
    page: Option<Arc<Mutex<HeapPage>>>,
}

impl Iterator for HeapFileScan {
    type Item = StorageResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.page.is_none() {
                let num_pages = match self.file.num_pages() {
                    Ok(n) => n,
                    Err(e) => return Some(Err(e)),
                };
                if self.page_no >= num_pages {
                    return None;
                }
                let handle = match self.file.pool.get_page(
                    &self.file,
                    self.page_no,
                    self.tid,
                    Permission::ReadOnly,
                ) {
                    Ok(h) => h,
                    Err(e) => return Some(Err(e)),
                };
                self.page = Some(handle);
                self.slot = 0;
            }

            if let Some(handle) = &self.page {
                let page = handle.lock().unwrap();
                while self.slot < page.num_slots() {
                    let slot = self.slot;
                    self.slot += 1;
                    if let Some(tuple) = page.tuple(slot) {
                        return Some(Ok(tuple.clone()));
                    }
                }
            }
            self.page = None;
            self.page_no += 1;
        }
    }
}

/// Convert one CSV record into a tuple of schema `desc`. Integer columns
/// accept decimal notation (the value is truncated); string columns are
/// cut down to the fixed wire width.
pub(crate) fn tuple_from_csv_record(
    desc: &TupleDesc,
    record: &csv::StringRecord,
) -> StorageResult<Tuple> {
    if record.len() != desc.num_fields() {
        return Err(StorageError::MalformedData(format!(
            "expected {} fields, got {} in record {:?}",
            desc.num_fields(),
            record.len(),
            record
        )));
    }

    let mut fields = Vec::with_capacity(desc.num_fields());
    for (raw, field) in record.iter().zip(desc.fields()) {
        match field.db_type {
            DbType::Int => {
                let parsed: f64 = raw.trim().parse().map_err(|_| TupleError::TypeMismatch {
                    expected: "int".to_string(),
                    actual: raw.to_string(),
                })?;
                fields.push(DbValue::Int(parsed as i64));
            }
            DbType::String => {
                let mut s = raw.to_string();
                if s.len() > STRING_LENGTH {
                    let mut end = STRING_LENGTH;
                    while !s.is_char_boundary(end) {
                        end -= 1;
                    }
                    s.truncate(end);
                }
                fields.push(DbValue::String(s));
            }
        }
    }
    Ok(Tuple::new(desc.clone(), fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{FieldType, RecordId};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn sample_desc() -> TupleDesc {
        TupleDesc::new(vec![
            FieldType::new("name", DbType::String),
            FieldType::new("age", DbType::Int),
        ])
    }

    fn sample_tuple(name: &str, age: i64) -> Tuple {
        Tuple::new(
            sample_desc(),
            vec![DbValue::String(name.to_string()), DbValue::Int(age)],
        )
    }

    fn setup() -> (TempDir, Arc<BufferPool>, Arc<HeapFile>) {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(BufferPool::new(16));
        let file = HeapFile::new(dir.path().join("test.dat"), sample_desc(), Arc::clone(&pool))
            .unwrap();
        (dir, pool, file)
    }

    #[test]
    fn test_new_file_is_empty() {
        let (_dir, _pool, file) = setup();
        assert_eq!(file.num_pages().unwrap(), 0);

        let tid = TransactionId::fresh();
        assert_eq!(file.scan(tid).count(), 0);
    }

    #[test]
    fn test_insert_and_scan() {
        let (_dir, pool, file) = setup();
        let tid = TransactionId::fresh();

        let mut t1 = sample_tuple("sam", 25);
        let mut t2 = sample_tuple("george jones", 999);
        file.insert_tuple(&mut t1, tid).unwrap();
        file.insert_tuple(&mut t2, tid).unwrap();
        pool.commit_transaction(tid).unwrap();

        assert_eq!(file.num_pages().unwrap(), 1);

        let tid2 = TransactionId::fresh();
        let tuples: Vec<Tuple> = file.scan(tid2).map(|t| t.unwrap()).collect();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].fields(), t1.fields());
        assert_eq!(tuples[1].fields(), t2.fields());
        assert!(tuples.iter().all(|t| t.rid().is_some()));
    }

    #[test]
    fn test_insert_spills_to_second_page() {
        let (_dir, pool, file) = setup();
        let tid = TransactionId::fresh();
        let per_page = HeapPage::slot_capacity(&sample_desc());

        for i in 0..per_page + 1 {
            let mut t = sample_tuple("bulk", i as i64);
            file.insert_tuple(&mut t, tid).unwrap();
        }
        pool.commit_transaction(tid).unwrap();
        assert_eq!(file.num_pages().unwrap(), 2);

        let tid2 = TransactionId::fresh();
        assert_eq!(file.scan(tid2).count(), per_page + 1);
    }

    #[test]
    fn test_delete_by_rid() {
        let (_dir, pool, file) = setup();
        let tid = TransactionId::fresh();

        let mut t1 = sample_tuple("sam", 25);
        let mut t2 = sample_tuple("george jones", 999);
        file.insert_tuple(&mut t1, tid).unwrap();
        file.insert_tuple(&mut t2, tid).unwrap();
        file.delete_tuple(&t1, tid).unwrap();
        pool.commit_transaction(tid).unwrap();

        let tid2 = TransactionId::fresh();
        let tuples: Vec<Tuple> = file.scan(tid2).map(|t| t.unwrap()).collect();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].fields(), t2.fields());
    }

    #[test]
    fn test_delete_without_rid() {
        let (_dir, _pool, file) = setup();
        let tid = TransactionId::fresh();
        let result = file.delete_tuple(&sample_tuple("nobody", 0), tid);
        assert!(matches!(result, Err(StorageError::TupleNotFound(_))));
    }

    #[test]
    fn test_read_page_past_end() {
        let (_dir, _pool, file) = setup();
        assert!(file.read_page(3).is_err());
    }

    #[test]
    fn test_page_key_stability() {
        let (dir, pool, file) = setup();
        let twin = HeapFile::new(
            dir.path().join("test.dat"),
            sample_desc(),
            Arc::clone(&pool),
        )
        .unwrap();
        assert_eq!(file.page_key(4).unwrap(), twin.page_key(4).unwrap());
        assert_ne!(file.page_key(4).unwrap(), file.page_key(5).unwrap());

        let other = HeapFile::new(
            dir.path().join("other.dat"),
            sample_desc(),
            Arc::clone(&pool),
        )
        .unwrap();
        assert_ne!(file.page_key(4).unwrap(), other.page_key(4).unwrap());
    }

    #[test]
    fn test_flush_reload_preserves_tuples() {
        let (dir, pool, file) = setup();
        let tid = TransactionId::fresh();
        for i in 0..10 {
            let mut t = sample_tuple("row", i);
            file.insert_tuple(&mut t, tid).unwrap();
        }
        pool.commit_transaction(tid).unwrap();
        pool.flush_all_pages().unwrap();

        let fresh_pool = Arc::new(BufferPool::new(16));
        let reopened = HeapFile::new(dir.path().join("test.dat"), sample_desc(), fresh_pool)
            .unwrap();
        let tid2 = TransactionId::fresh();
        let ages: Vec<i64> = reopened
            .scan(tid2)
            .map(|t| match t.unwrap().field(1).unwrap() {
                DbValue::Int(v) => *v,
                _ => panic!("expected int"),
            })
            .collect();
        assert_eq!(ages, (0..10).collect::<Vec<i64>>());
    }

    #[test]
    fn test_csv_load() {
        let (_dir, _pool, file) = setup();
        let csv = "name,age\nsam,25\ngeorge jones,999\n";
        let rows = file.load_from_csv(Cursor::new(csv), true).unwrap();
        assert_eq!(rows, 2);

        let tid = TransactionId::fresh();
        let tuples: Vec<Tuple> = file.scan(tid).map(|t| t.unwrap()).collect();
        assert_eq!(tuples.len(), 2);
        assert_eq!(
            tuples[0].field(0),
            Some(&DbValue::String("sam".to_string()))
        );
        assert_eq!(tuples[1].field(1), Some(&DbValue::Int(999)));
    }

    #[test]
    fn test_csv_wrong_column_count() {
        let (_dir, _pool, file) = setup();
        let csv = "name,age\nsam,25,extra\n";
        let result = file.load_from_csv(Cursor::new(csv), true);
        assert!(matches!(result, Err(StorageError::MalformedData(_))));
    }

    #[test]
    fn test_csv_type_mismatch() {
        let (_dir, _pool, file) = setup();
        let csv = "name,age\nsam,not_a_number\n";
        let result = file.load_from_csv(Cursor::new(csv), true);
        assert!(matches!(
            result,
            Err(StorageError::Tuple(TupleError::TypeMismatch { .. }))
        ));
    }

    #[test]
    fn test_csv_truncates_long_strings() {
        let (_dir, _pool, file) = setup();
        let long_name = "x".repeat(STRING_LENGTH + 10);
        let csv = format!("name,age\n{},1\n", long_name);
        file.load_from_csv(Cursor::new(csv), true).unwrap();

        let tid = TransactionId::fresh();
        let tuple = file.scan(tid).next().unwrap().unwrap();
        match tuple.field(0).unwrap() {
            DbValue::String(s) => assert_eq!(s.len(), STRING_LENGTH),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn test_csv_accepts_decimal_ints() {
        let (_dir, _pool, file) = setup();
        let csv = "name,age\nsam,25.7\n";
        file.load_from_csv(Cursor::new(csv), true).unwrap();

        let tid = TransactionId::fresh();
        let tuple = file.scan(tid).next().unwrap().unwrap();
        assert_eq!(tuple.field(1), Some(&DbValue::Int(25)));
    }

    #[test]
    fn test_scan_rids_match_storage() {
        let (_dir, pool, file) = setup();
        let tid = TransactionId::fresh();
        for i in 0..3 {
            let mut t = sample_tuple("row", i);
            file.insert_tuple(&mut t, tid).unwrap();
        }
        pool.commit_transaction(tid).unwrap();

        let tid2 = TransactionId::fresh();
        let rids: Vec<RecordId> = file.scan(tid2).map(|t| t.unwrap().rid().unwrap()).collect();
        assert_eq!(
            rids,
            vec![
                RecordId { page_no: 0, slot: 0 },
                RecordId { page_no: 0, slot: 1 },
                RecordId { page_no: 0, slot: 2 },
            ]
        );
    }
}
