use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tempfile::TempDir;
use txn_core::{ChangeId, ManagerConfig, Transaction};
use txn_durability::wal::DurabilityMode;
use txn_manager::TransactionManager;
use txn_orchestrator::{NoRetry, Participant, TxFailure, TxOrchestrator};

type Entries = Arc<Mutex<Vec<(Vec<u8>, Vec<u8>)>>>;

struct MapParticipant {
    pending: Entries,
    committed: Entries,
    persist_should_fail: bool,
    post_commit_should_fail: bool,
}

impl MapParticipant {
    fn new() -> (Self, Entries, Entries) {
        let pending = Arc::new(Mutex::new(Vec::new()));
        let committed = Arc::new(Mutex::new(Vec::new()));
        (
            MapParticipant {
                pending: Arc::clone(&pending),
                committed: Arc::clone(&committed),
                persist_should_fail: false,
                post_commit_should_fail: false,
            },
            pending,
            committed,
        )
    }
}

impl Participant for MapParticipant {
    fn start(&mut self, _tx: &Transaction) {
        self.pending.lock().unwrap().clear();
    }

    fn update_tx(&mut self, _tx: &Transaction) {}

    fn get_changes(&self) -> Vec<ChangeId> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| ChangeId::new(k.clone()))
            .collect()
    }

    fn persist(&mut self) -> bool {
        !self.persist_should_fail
    }

    fn rollback(&mut self) -> bool {
        self.pending.lock().unwrap().clear();
        true
    }

    fn post_commit(&mut self) -> bool {
        if self.post_commit_should_fail {
            return false;
        }
        let mut pending = self.pending.lock().unwrap();
        self.committed.lock().unwrap().append(&mut pending);
        true
    }
}

fn manager() -> (TempDir, Arc<TransactionManager>) {
    let dir = TempDir::new().unwrap();
    let config = ManagerConfig::with_snapshot_dir(dir.path().to_string_lossy().to_string());
    let manager = Arc::new(TransactionManager::open(config, DurabilityMode::Always).unwrap());
    (dir, manager)
}

#[test]
fn a_successful_unit_of_work_commits_and_runs_post_commit() {
    let (_dir, manager) = manager();
    let orchestrator = TxOrchestrator::with_retry_policy(Arc::clone(&manager), Box::new(NoRetry));
    let (participant, pending, committed) = MapParticipant::new();
    let mut participants: Vec<Box<dyn Participant>> = vec![Box::new(participant)];

    orchestrator
        .execute(&mut participants, |_tx, _participants| {
            pending.lock().unwrap().push((b"k1".to_vec(), b"v1".to_vec()));
            Ok(())
        })
        .unwrap();

    assert_eq!(committed.lock().unwrap().len(), 1);
    assert!(pending.lock().unwrap().is_empty());
}

#[test]
fn a_failed_persist_rolls_back_and_aborts() {
    let (_dir, manager) = manager();
    let orchestrator = TxOrchestrator::with_retry_policy(Arc::clone(&manager), Box::new(NoRetry));
    let (mut participant, pending, _committed) = MapParticipant::new();
    participant.persist_should_fail = true;
    let mut participants: Vec<Box<dyn Participant>> = vec![Box::new(participant)];

    let result = orchestrator.execute(&mut participants, |_tx, _participants| {
        pending.lock().unwrap().push((b"k1".to_vec(), b"v1".to_vec()));
        Ok(())
    });

    assert!(matches!(result, Err(TxFailure::PersistFailed)));
    assert_eq!(manager.status().in_progress_count, 0);
}

#[test]
fn conflicting_writers_surface_as_conflict_with_no_retry() {
    // Both transactions must be started before either commits, the way
    // `second_writer_to_the_same_key_conflicts` does at the manager level:
    // otherwise the loser's visibility bound would already include the
    // winner's commit and no conflict would be detected. The two unit of
    // work closures rendezvous through these channels so the loser's
    // transaction is guaranteed to have started before the winner commits,
    // and the loser doesn't attempt `canCommit` until after the winner has.
    let (_dir, manager) = manager();

    let (loser_started_tx, loser_started_rx) = mpsc::channel::<()>();
    let (winner_committed_tx, winner_committed_rx) = mpsc::channel::<()>();

    let winner_manager = Arc::clone(&manager);
    let winner_thread = thread::spawn(move || {
        let orchestrator = TxOrchestrator::with_retry_policy(winner_manager, Box::new(NoRetry));
        let (winner, winner_pending, _) = MapParticipant::new();
        let mut participants: Vec<Box<dyn Participant>> = vec![Box::new(winner)];
        let result = orchestrator.execute(&mut participants, |_tx, _participants| {
            winner_pending.lock().unwrap().push((b"k1".to_vec(), b"v1".to_vec()));
            loser_started_rx.recv().unwrap();
            Ok(())
        });
        result.unwrap();
        winner_committed_tx.send(()).unwrap();
    });

    let loser_manager = Arc::clone(&manager);
    let loser_thread = thread::spawn(move || {
        let orchestrator = TxOrchestrator::with_retry_policy(loser_manager, Box::new(NoRetry));
        let (loser, loser_pending, _) = MapParticipant::new();
        let mut participants: Vec<Box<dyn Participant>> = vec![Box::new(loser)];
        orchestrator.execute(&mut participants, |_tx, _participants| {
            loser_pending.lock().unwrap().push((b"k1".to_vec(), b"v2".to_vec()));
            loser_started_tx.send(()).unwrap();
            winner_committed_rx.recv().unwrap();
            Ok(())
        })
    });

    winner_thread.join().unwrap();
    let result = loser_thread.join().unwrap();

    assert!(matches!(result, Err(TxFailure::Conflict)));
}

#[test]
fn a_failing_post_commit_surfaces_tx_failure_without_rolling_back() {
    let (_dir, manager) = manager();
    let orchestrator = TxOrchestrator::with_retry_policy(Arc::clone(&manager), Box::new(NoRetry));
    let (mut participant, pending, committed) = MapParticipant::new();
    participant.post_commit_should_fail = true;
    let mut participants: Vec<Box<dyn Participant>> = vec![Box::new(participant)];

    let result = orchestrator.execute(&mut participants, |_tx, _participants| {
        pending.lock().unwrap().push((b"k1".to_vec(), b"v1".to_vec()));
        Ok(())
    });

    assert!(matches!(result, Err(TxFailure::PostCommitFailed)));
    // The commit already happened; post_commit failing must not roll it
    // back or abort the transaction.
    assert!(committed.lock().unwrap().is_empty());
    assert_eq!(manager.status().in_progress_count, 0);
}
