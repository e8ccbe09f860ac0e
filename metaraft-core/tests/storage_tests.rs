use metaraft_core::{Command, MemoryWal, MetadataStore, WalRecord, WriteAheadLog};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use super::*;

    #[test]
    fn test_put_and_get(){
        let store = MetadataStore::new();
        store.apply(&Command::put("/docs/a.txt", "node1,node2"));
        assert_eq!(store.get("/docs/a.txt"), Some("node1,node2".to_string()));
    }
    #[test]
    fn test_get_missing_key(){
        let store = MetadataStore::new();
        assert_eq!(store.get("missing"), None);
        assert!(store.is_empty());
    }
    #[test]
    fn test_put_overwrites(){
        let store = MetadataStore::new();
        store.apply(&Command::put("k", "1"));
        store.apply(&Command::put("k", "2"));
        assert_eq!(store.get("k"), Some("2".to_string()));
        assert_eq!(store.len(), 1);
    }
    #[test]
    fn test_delete(){
        let store = MetadataStore::new();
        store.apply(&Command::put("k", "v"));
        store.apply(&Command::delete("k"));
        assert_eq!(store.get("k"), None);

        // deleting an absent key is a no-op
        store.apply(&Command::delete("k"));
        assert!(store.is_empty());
    }
    #[test]
    fn test_clones_share_data(){
        let store = MetadataStore::new();
        let reader = store.clone();
        store.apply(&Command::put("k", "v"));
        assert_eq!(reader.get("k"), Some("v".to_string()));
    }
    #[test]
    fn test_snapshot_is_sorted(){
        let store = MetadataStore::new();
        for key in ["c", "a", "b"] {
            store.apply(&Command::put(key, key));
        }
        let keys: Vec<_> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }
    #[test]
    fn test_thread_safety(){
        let store = Arc::new(MetadataStore::new());
        let handles: Vec<_> = (0..10).map(|i| {
            let store_clone = store.clone();
            std::thread::spawn(move || {
                let key = format!("key{}", i);
                let value = format!("value{}", i);
                store_clone.apply(&Command::put(key.clone(), value.clone()));
                assert_eq!(store_clone.get(&key), Some(value));
            })
        }).collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 10);
    }
    #[test]
    fn test_wal_tracks_unsynced_records(){
        let wal = MemoryWal::new();
        let mut writer: Box<dyn WriteAheadLog> = Box::new(wal.clone());

        writer.write(WalRecord::HardState { term: 1, voted_for: None }).unwrap();
        writer.write(WalRecord::Truncate { from: 3 }).unwrap();
        assert_eq!(wal.pending(), 2);

        writer.sync().unwrap();
        assert_eq!(wal.pending(), 0);
        assert_eq!(wal.records().len(), 2);
        assert_eq!(wal.records()[1], WalRecord::Truncate { from: 3 });
    }
}
