use redb::{ReadableTable, WriteTransaction};

use super::db::{Database, DatabaseError};
use super::models::FileRecord;
use super::tables::*;

impl Database {
    // ========================================================================
    // File operations
    // ========================================================================

    /// Insert a new file record and add it to the owner index.
    /// Fails with `Duplicate` if the id is already taken.
    pub fn insert_file(&self, file: &FileRecord) -> Result<(), DatabaseError> {
        debug_assert!(!file.id.is_empty(), "file id must not be empty");

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(FILES)?;
            if table.get(file.id.as_str())?.is_some() {
                return Err(DatabaseError::Duplicate(file.id.clone()));
            }
            let data = rmp_serde::to_vec_named(file)?;
            table.insert(file.id.as_str(), data.as_slice())?;
        }
        if !file.author_id.is_empty() {
            add_to_owner_index(&write_txn, &file.author_id, &file.id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Get a file by its id
    pub fn get_file(&self, id: &str) -> Result<Option<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        match table.get(id)? {
            Some(data) => {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(file))
            }
            None => Ok(None),
        }
    }

    /// Get all files uploaded by one author
    pub fn get_files_by_owner(&self, owner_id: &str) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let owner_table = read_txn.open_table(OWNER_FILES)?;
        let files_table = read_txn.open_table(FILES)?;

        let file_ids: Vec<String> = match owner_table.get(owner_id)? {
            Some(data) => rmp_serde::from_slice(data.value())?,
            None => return Ok(Vec::new()),
        };

        let mut files = Vec::new();
        for file_id in file_ids {
            if let Some(data) = files_table.get(file_id.as_str())? {
                let file: FileRecord = rmp_serde::from_slice(data.value())?;
                files.push(file);
            }
        }

        Ok(files)
    }

    /// Get every file
    pub fn get_all_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(FILES)?;

        let mut files = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let file: FileRecord = rmp_serde::from_slice(value.value())?;
            files.push(file);
        }

        Ok(files)
    }

    /// Get every file marked as published
    pub fn get_published_files(&self) -> Result<Vec<FileRecord>, DatabaseError> {
        Ok(self
            .get_all_files()?
            .into_iter()
            .filter(|f| f.is_published)
            .collect())
    }

    /// Set the publish flag. Returns the stored record, or `None` if the id is unknown.
    pub fn set_published(
        &self,
        id: &str,
        is_published: bool,
    ) -> Result<Option<FileRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file)
                }
                None => None,
            };
            result
        };

        let updated = match existing {
            Some(mut file) => {
                if file.is_published != is_published {
                    file.is_published = is_published;
                    let serialized = rmp_serde::to_vec_named(&file)?;
                    let mut table = write_txn.open_table(FILES)?;
                    table.insert(id, serialized.as_slice())?;
                }
                Some(file)
            }
            None => None,
        };

        write_txn.commit()?;
        Ok(updated)
    }

    /// Delete a file by id and clean up the owner index
    pub fn delete_file(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;

        let owner: Option<String> = {
            let table = write_txn.open_table(FILES)?;
            let result = match table.get(id)? {
                Some(data) => {
                    let file: FileRecord = rmp_serde::from_slice(data.value())?;
                    Some(file.author_id)
                }
                None => None,
            };
            result
        };

        let deleted = match owner {
            Some(owner_id) => {
                {
                    let mut table = write_txn.open_table(FILES)?;
                    table.remove(id)?;
                }
                if !owner_id.is_empty() {
                    remove_from_owner_index(&write_txn, &owner_id, id)?;
                }
                true
            }
            None => false,
        };

        write_txn.commit()?;
        Ok(deleted)
    }
}

fn add_to_owner_index(
    write_txn: &WriteTransaction,
    owner_id: &str,
    file_id: &str,
) -> Result<(), DatabaseError> {
    let mut owner_table = write_txn.open_table(OWNER_FILES)?;
    let mut file_ids: Vec<String> = match owner_table.get(owner_id)? {
        Some(data) => rmp_serde::from_slice(data.value())?,
        None => Vec::new(),
    };

    if !file_ids.iter().any(|fid| fid == file_id) {
        file_ids.push(file_id.to_string());
        let data = rmp_serde::to_vec_named(&file_ids)?;
        owner_table.insert(owner_id, data.as_slice())?;
    }
    Ok(())
}

fn remove_from_owner_index(
    write_txn: &WriteTransaction,
    owner_id: &str,
    file_id: &str,
) -> Result<(), DatabaseError> {
    let file_ids: Option<Vec<String>> = {
        let owner_table = write_txn.open_table(OWNER_FILES)?;
        let result = match owner_table.get(owner_id)? {
            Some(data) => Some(rmp_serde::from_slice(data.value())?),
            None => None,
        };
        result
    };

    if let Some(mut ids) = file_ids {
        ids.retain(|fid| fid != file_id);
        let mut owner_table = write_txn.open_table(OWNER_FILES)?;
        if ids.is_empty() {
            owner_table.remove(owner_id)?;
        } else {
            let data = rmp_serde::to_vec_named(&ids)?;
            owner_table.insert(owner_id, data.as_slice())?;
        }
    }
    Ok(())
}
