use redb::TableDefinition;

/// Every table maps a string key to a msgpack-encoded value.
pub type MsgpackTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// File records: id -> FileRecord
pub const FILES: MsgpackTable = TableDefinition::new("files");

/// Owner index: author_id -> Vec of file ids
pub const OWNER_FILES: MsgpackTable = TableDefinition::new("owner_files");

pub const ALL_TABLES: [MsgpackTable; 2] = [FILES, OWNER_FILES];
