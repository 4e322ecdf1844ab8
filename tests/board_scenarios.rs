use chrono::NaiveDate;
use std::time::Duration;
use taskclock::models::MAX_TIME_SPENT;
use taskclock::store::StoreOp;
use taskclock::timer::ManualClock;
use taskclock::{Board, BoardError, MemoryStore, SqliteStore, TaskStore, User};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 2).unwrap()
}

fn board_on(store: &MemoryStore, clock: &ManualClock) -> Board {
    let mut board = Board::new(Box::new(store.clone()), Box::new(clock.clone()), day());
    board.set_user(Some(User::from_name("alice").unwrap())).unwrap();
    board
}

fn tick_seconds(board: &mut Board, clock: &ManualClock, seconds: u64) {
    for _ in 0..seconds {
        clock.advance(Duration::from_secs(1));
        board.tick();
    }
}

#[test]
fn dragging_last_task_to_top_rewrites_positions() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let mut board = board_on(&store, &clock);
    let one = board.add_task("1", Vec::new(), None).unwrap();
    let two = board.add_task("2", Vec::new(), None).unwrap();
    let three = board.add_task("3", Vec::new(), None).unwrap();

    assert!(board.reorder_tasks(2, 0).unwrap());

    let persisted = store.query_by_date("alice", day()).unwrap();
    let position_of = |id: &str| persisted.iter().find(|t| t.id == id).map(|t| t.position);
    assert_eq!(position_of(&one), Some(1));
    assert_eq!(position_of(&two), Some(2));
    assert_eq!(position_of(&three), Some(0));
}

#[test]
fn five_ticks_then_stop_persists_five_seconds() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(1_000);
    let mut board = board_on(&store, &clock);
    let id = board.add_task("focus", Vec::new(), None).unwrap();

    board.start_timer(&id).unwrap();
    tick_seconds(&mut board, &clock, 5);
    board.stop_timer().unwrap();

    let persisted = store.query_by_date("alice", day()).unwrap();
    assert_eq!(persisted[0].time_spent, 5);
    assert_eq!(board.timer_view().active_task_id, None);
    assert_eq!(board.timer_view().elapsed, 0);
}

#[test]
fn switching_tasks_flushes_the_first_before_the_second_runs() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let mut board = board_on(&store, &clock);
    let a = board.add_task("a", Vec::new(), None).unwrap();
    let b = board.add_task("b", Vec::new(), None).unwrap();
    store.clear_operations();

    board.start_timer(&a).unwrap();
    tick_seconds(&mut board, &clock, 3);
    board.start_timer(&b).unwrap();

    let flushes: Vec<(String, Option<u64>)> = store
        .operations()
        .into_iter()
        .filter_map(|op| match op {
            StoreOp::Patch { task_id, patch } => Some((task_id, patch.time_spent)),
            _ => None,
        })
        .collect();
    assert_eq!(flushes, vec![(a.clone(), Some(3))]);
    assert_eq!(board.timer_view().active_task_id.as_deref(), Some(b.as_str()));
}

#[test]
fn deleting_the_timed_task_flushes_before_delete() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let mut board = board_on(&store, &clock);
    let id = board.add_task("doomed", Vec::new(), None).unwrap();
    store.clear_operations();

    board.start_timer(&id).unwrap();
    tick_seconds(&mut board, &clock, 2);
    board.delete_task(&id).unwrap();

    let ops = store.operations();
    assert_eq!(ops.len(), 2);
    assert!(matches!(&ops[0], StoreOp::Patch { task_id, patch } if *task_id == id && patch.time_spent == Some(2)));
    assert!(matches!(&ops[1], StoreOp::Delete { task_id } if *task_id == id));
    assert_eq!(board.timer_view().active_task_id, None);
}

#[test]
fn failed_flush_still_pauses_and_reports() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(0);
    let mut board = board_on(&store, &clock);
    let id = board.add_task("flaky", Vec::new(), None).unwrap();

    board.start_timer(&id).unwrap();
    tick_seconds(&mut board, &clock, 4);
    store.set_failing(true);

    assert!(board.pause_timer().is_err());
    let view = board.timer_view();
    assert!(!view.running);
    assert_eq!(view.elapsed, 4);
}

#[test]
fn sqlite_board_sees_its_own_writes_through_the_subscription() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::open(&dir.path().join("tasks.db")).unwrap();
    let mut board = Board::new(Box::new(store), Box::new(ManualClock::new(0)), day());
    board.set_user(Some(User::from_name("alice").unwrap())).unwrap();

    let id = board.add_task("persisted", vec!["work".to_string()], None).unwrap();
    board.add_subtask(&id, "step one").unwrap();
    board.sync();
    board.refresh().unwrap();

    let task = board.task(&id).unwrap();
    assert_eq!(task.tags, vec!["work".to_string()]);
    assert_eq!(task.sub_tasks.len(), 1);
    assert_eq!(task.sub_tasks[0].title, "step one");
}

#[test]
fn timing_an_imported_task_with_the_largest_time_spent_is_safe() {
    let store = MemoryStore::new();
    let clock = ManualClock::new(1_700_000_000_000);
    let mut board = board_on(&store, &clock);

    let too_big = r#"[{"id":"a","title":"big","date":"2024-10-02","timeSpent":10000000000000000}]"#;
    assert!(matches!(board.import_json(too_big), Err(BoardError::Transfer(_))));
    assert!(board.tasks().is_empty());

    let largest = format!(
        r#"[{{"id":"a","title":"big","date":"2024-10-02","timeSpent":{}}}]"#,
        MAX_TIME_SPENT
    );
    assert_eq!(board.import_json(&largest).unwrap(), 1);
    let id = board.tasks()[0].id.clone();

    board.start_timer(&id).unwrap();
    tick_seconds(&mut board, &clock, 3);
    board.stop_timer().unwrap();
    assert!(!board.timer_view().running);
    assert_eq!(board.task(&id).unwrap().time_spent, MAX_TIME_SPENT);
}
