use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::tables::*;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(Box<redb::CommitError>),
    #[error("Database error: {0}")]
    Redb(Box<redb::Error>),
    #[error("Database error: {0}")]
    RedbDatabase(Box<redb::DatabaseError>),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Record already exists: {0}")]
    Duplicate(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(Box<redb::StorageError>),
    #[error("Table error: {0}")]
    Table(Box<redb::TableError>),
    #[error("Transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
}

macro_rules! boxed_from {
    ($($source:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$source> for DatabaseError {
                fn from(e: $source) -> Self {
                    DatabaseError::$variant(Box::new(e))
                }
            }
        )+
    };
}

// redb errors are large; box them to keep `Result`s small
boxed_from! {
    redb::CommitError => Commit,
    redb::DatabaseError => RedbDatabase,
    redb::Error => Redb,
    redb::StorageError => Storage,
    redb::TableError => Table,
    redb::TransactionError => Transaction,
}

/// Cheap to clone; clones share one redb handle.
#[derive(Clone)]
pub struct Database {
    db: Arc<RedbDatabase>,
}

/// What a purge removed.
#[derive(Debug, Default)]
pub struct PurgeStats {
    pub files: u64,
}

impl Database {
    /// Open or create `media-library.redb` under `data_dir`, creating all tables.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db = Arc::new(RedbDatabase::create(
            data_dir.as_ref().join("media-library.redb"),
        )?);

        let write_txn = db.begin_write()?;
        for table in ALL_TABLES {
            write_txn.open_table(table)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    /// Drop every record and the owner index in one transaction.
    pub fn purge_all(&self) -> Result<PurgeStats, DatabaseError> {
        let write_txn = self.begin_write()?;
        let files = clear_table(&write_txn, FILES)?;
        clear_table(&write_txn, OWNER_FILES)?;
        write_txn.commit()?;
        Ok(PurgeStats { files })
    }
}

/// Remove every entry of `definition`, returning how many there were.
fn clear_table(txn: &WriteTransaction, definition: MsgpackTable) -> Result<u64, DatabaseError> {
    let mut table = txn.open_table(definition)?;
    let keys = table
        .iter()?
        .map(|entry| entry.map(|(key, _)| key.value().to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    for key in &keys {
        table.remove(key.as_str())?;
    }
    Ok(keys.len() as u64)
}
