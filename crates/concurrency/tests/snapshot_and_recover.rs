use tempfile::TempDir;
use txn_core::{ChangeId, ManagerConfig};
use txn_durability::wal::DurabilityMode;
use txn_manager::TransactionManager;

fn config(dir: &std::path::Path) -> ManagerConfig {
    ManagerConfig::with_snapshot_dir(dir.to_string_lossy().to_string())
}

#[test]
fn state_survives_a_snapshot_and_a_reopen_with_no_new_edits() {
    let dir = TempDir::new().unwrap();
    {
        let m = TransactionManager::open(config(dir.path()), DurabilityMode::Always).unwrap();
        let tx = m.start_short(None).unwrap();
        assert!(m.can_commit(&tx, vec![ChangeId::new(vec![0x01])]).unwrap());
        assert!(m.commit(&tx).unwrap());
        m.take_snapshot().unwrap();
    }

    let m2 = TransactionManager::open(config(dir.path()), DurabilityMode::Always).unwrap();
    let status = m2.status();
    assert_eq!(status.in_progress_count, 0);
    assert_eq!(status.committed_count, 1);
}

#[test]
fn edits_after_a_snapshot_still_replay_on_reopen() {
    let dir = TempDir::new().unwrap();
    let first_tx_id;
    {
        let m = TransactionManager::open(config(dir.path()), DurabilityMode::Always).unwrap();
        let tx = m.start_short(None).unwrap();
        first_tx_id = tx.transaction_id;
        assert!(m.can_commit(&tx, vec![ChangeId::new(vec![0x01])]).unwrap());
        assert!(m.commit(&tx).unwrap());
        m.take_snapshot().unwrap();

        // These edits land in a fresh log segment after the snapshot.
        let tx2 = m.start_short(None).unwrap();
        assert!(m.can_commit(&tx2, vec![ChangeId::new(vec![0x02])]).unwrap());
        assert!(m.commit(&tx2).unwrap());
    }

    let m2 = TransactionManager::open(config(dir.path()), DurabilityMode::Always).unwrap();
    let status = m2.status();
    assert_eq!(status.committed_count, 2);
    assert!(status.read_pointer > first_tx_id);
}

#[test]
fn pruning_old_snapshots_does_not_affect_the_newest_recovery_path() {
    let dir = TempDir::new().unwrap();
    {
        let m = TransactionManager::open(
            ManagerConfig {
                snapshot_retain_count: 1,
                ..config(dir.path())
            },
            DurabilityMode::Always,
        )
        .unwrap();
        for _ in 0..3 {
            let tx = m.start_short(None).unwrap();
            m.abort(&tx).unwrap();
            m.take_snapshot().unwrap();
        }
    }

    let m2 = TransactionManager::open(config(dir.path()), DurabilityMode::Always).unwrap();
    assert_eq!(m2.status().in_progress_count, 0);
}
