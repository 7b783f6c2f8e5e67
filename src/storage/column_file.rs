use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::tuple::{Tuple, TupleDesc};

use super::buffer_pool::{BufferPool, PageKey};
use super::dbfile::{DbFile, TransactionId, TupleIter};
use super::error::{StorageError, StorageResult};
use super::heap_file::{tuple_from_csv_record, HeapFile, HeapFileScan};
use super::heap_page::HeapPage;
use super::PageId;

/// A table with a row schema stored column-at-a-time: each field backs
/// to its own single-column heap file named `<base>_<field>.dat`. Rows
/// are decomposed on insert and reassembled on read.
///
/// The columnar layout reuses the heap-file machinery wholesale, so
/// page-level locking and caching apply per column. The ColumnFile
/// itself is not page-addressable; the page operations of [`DbFile`]
/// belong to the per-column heap files and are rejected here.
pub struct ColumnFile {
    base: PathBuf,
    desc: TupleDesc,
    columns: Vec<Arc<HeapFile>>,
    pool: Arc<BufferPool>,
}

impl ColumnFile {
    /// Open a column file rooted at `base`, creating one heap file per
    /// field of `desc`
    pub fn new(
        base: impl AsRef<Path>,
        desc: TupleDesc,
        pool: Arc<BufferPool>,
    ) -> StorageResult<ColumnFile> {
        let base = base.as_ref().to_path_buf();
        let mut columns = Vec::with_capacity(desc.num_fields());
        for field in desc.fields() {
            let column_desc = TupleDesc::new(vec![field.clone()]);
            let path = Self::column_path(&base, &field.name);
            columns.push(HeapFile::new(path, column_desc, Arc::clone(&pool))?);
        }
        Ok(ColumnFile {
            base,
            desc,
            columns,
            pool,
        })
    }

    fn column_path(base: &Path, field_name: &str) -> PathBuf {
        let mut name = base.as_os_str().to_os_string();
        name.push(format!("_{}.dat", field_name));
        PathBuf::from(name)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn columns(&self) -> &[Arc<HeapFile>] {
        &self.columns
    }

    /// Decompose `t` into one singleton tuple per column and insert each
    /// into its column file. The record id reported on `t` is the one
    /// produced by the last per-column insert; columns allocate slots in
    /// lockstep as long as row inserts and deletes are not interleaved
    /// per column.
    pub fn insert_tuple(&self, t: &mut Tuple, tid: TransactionId) -> StorageResult<()> {
        if t.fields().len() != self.columns.len() {
            return Err(StorageError::IllegalOperation(format!(
                "tuple has {} fields but the table has {} columns",
                t.fields().len(),
                self.columns.len()
            )));
        }

        let mut rid = None;
        for (i, column) in self.columns.iter().enumerate() {
            let mut field_tuple = Tuple::new(
                TupleDesc::new(vec![self.desc.fields()[i].clone()]),
                vec![t.fields()[i].clone()],
            );
            column.insert_tuple(&mut field_tuple, tid)?;
            rid = field_tuple.rid();
        }
        t.set_rid(rid);
        Ok(())
    }

    /// Delete the row `t` points at, replaying its record id against
    /// every column file
    pub fn delete_tuple(&self, t: &Tuple, tid: TransactionId) -> StorageResult<()> {
        let rid = t
            .rid()
            .ok_or_else(|| StorageError::TupleNotFound("tuple has no record id".to_string()))?;
        for (i, column) in self.columns.iter().enumerate() {
            let mut field_tuple = Tuple::new(
                TupleDesc::new(vec![self.desc.fields()[i].clone()]),
                vec![t.fields()[i].clone()],
            );
            field_tuple.set_rid(Some(rid));
            column.delete_tuple(&field_tuple, tid)?;
        }
        Ok(())
    }

    /// Iterate the columns named in `select`, reassembling one row per
    /// step in selection order. A name that resolves to no column is an
    /// error. The scan ends as soon as any selected column is exhausted.
    pub fn project_scan(
        &self,
        tid: TransactionId,
        select: &TupleDesc,
    ) -> StorageResult<ColumnScan> {
        let mut scans = Vec::with_capacity(select.num_fields());
        for field in select.fields() {
            let idx = self.desc.find_field(field)?;
            scans.push(self.columns[idx].scan(tid));
        }
        Ok(ColumnScan { scans })
    }

    /// Bulk-load rows from CSV, one immediately-committed transaction
    /// per row. Returns the number of rows inserted.
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
        debug!("{}: loaded {} rows from CSV", self.base.display(), rows);
        Ok(rows)
    }
}

impl DbFile for ColumnFile {
    fn descriptor(&self) -> &TupleDesc {
        &self.desc
    }

    fn insert_tuple(&self, t: &mut Tuple, tid: TransactionId) -> StorageResult<()> {
        ColumnFile::insert_tuple(self, t, tid)
    }

    fn delete_tuple(&self, t: &Tuple, tid: TransactionId) -> StorageResult<()> {
        ColumnFile::delete_tuple(self, t, tid)
    }

    fn read_page(&self, _page_no: PageId) -> StorageResult<HeapPage> {
        Err(StorageError::IllegalOperation(
            "a column file is not page-addressable; read pages through its column heap files"
                .to_string(),
        ))
    }

    fn flush_page(&self, _page: &HeapPage) -> StorageResult<()> {
        Err(StorageError::IllegalOperation(
            "a column file is not page-addressable; flush pages through its column heap files"
                .to_string(),
        ))
    }

    fn page_key(&self, _page_no: PageId) -> StorageResult<PageKey> {
        Err(StorageError::IllegalOperation(
            "a column file has no page keys of its own".to_string(),
        ))
    }

    fn iterator(&self, tid: TransactionId) -> StorageResult<TupleIter<'_>> {
        Ok(Box::new(self.project_scan(tid, &self.desc)?))
    }
}

/// Reassembles rows by pulling one tuple from each selected column scan
/// per step. The row's record id is the last column's.
pub struct ColumnScan {
    scans: Vec<HeapFileScan>,
}

impl Iterator for ColumnScan {
    type Item = StorageResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut row: Option<Tuple> = None;
        for scan in &mut self.scans {
            let column_tuple = match scan.next()? {
                Ok(t) => t,
                Err(e) => return Some(Err(e)),
            };
            row = Some(match row {
                Some(partial) => {
                    let mut joined = partial.join(&column_tuple);
                    joined.set_rid(column_tuple.rid());
                    joined
                }
                None => column_tuple,
            });
        }
        row.map(Ok)
    }
}
