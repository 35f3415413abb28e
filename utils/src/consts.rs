/// Default backup PV mount path in container, this path cannot be mounted by user
pub const DEFAULT_BACKUP_DIR: &str = "/xline-backup";
/// Default xline data dir, this path cannot be mounted by user
pub const DEFAULT_DATA_DIR: &str = "/usr/local/xline/data-dir";
/// The rocksdb table xline stores its kv pairs in
pub const KV_TABLE: &str = "kv";
/// All rocksdb tables the sidecar's local engine handle opens
pub const XLINE_TABLES: [&str; 1] = [KV_TABLE];
