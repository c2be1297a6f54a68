use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use bson::doc;
use docquery::{memory::InMemoryStore, prelude::*};
use pretty_assertions::assert_eq;

async fn numbered(count: i32) -> DocumentStore<InMemoryStore> {
    let store = DocumentStore::new(InMemoryStore::new());

    store
        .collection("rows")
        .insert_many((1..=count).map(|n| doc! { "_id": n, "n": n }).collect())
        .await
        .unwrap();

    store
}

fn in_order() -> Query {
    Query::builder().sort("n", SortDirection::Asc).build()
}

#[tokio::test]
async fn awaiting_handlers_never_overlap() {
    let store = numbered(3).await;
    let log = Arc::new(Mutex::new(Vec::new()));
    let in_flight = Arc::new(AtomicUsize::new(0));

    store
        .collection("rows")
        .for_each_await(&in_order(), |row| {
            let log = log.clone();
            let in_flight = in_flight.clone();

            async move {
                let n = row.get_i32("n").unwrap();

                assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0);
                log.lock().unwrap().push(format!("start r{n}"));
                tokio::task::yield_now().await;
                log.lock().unwrap().push(format!("end r{n}"));
                in_flight.fetch_sub(1, Ordering::SeqCst);

                Ok(())
            }
        })
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["start r1", "end r1", "start r2", "end r2", "start r3", "end r3"]
    );
}

#[tokio::test]
async fn failing_handler_stops_the_stream() {
    let store = numbered(3).await;
    let rows = store.collection("rows");
    let mut driver = rows.cursor(&in_order()).await.unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let err = driver
        .for_each_await(|row| {
            let seen = seen.clone();

            async move {
                let n = row.get_i32("n").unwrap();
                seen.lock().unwrap().push(n);

                if n == 2 {
                    return Err(StoreError::callback(io::Error::other("boom")));
                }

                Ok(())
            }
        })
        .await
        .unwrap_err();

    match err {
        StoreError::Callback(source) => {
            let source = source.downcast_ref::<io::Error>().unwrap();
            assert_eq!(source.to_string(), "boom");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(driver.phase(), StreamPhase::Failed);
    assert_eq!(driver.last_outcome(), Some(HandlerOutcome::Failed));
    assert_eq!(driver.rows_handled(), 1);
}

#[tokio::test]
async fn sync_handlers_see_rows_in_cursor_order() {
    let store = numbered(5).await;
    let mut seen = Vec::new();

    store
        .collection("rows")
        .for_each_sync(
            &Query::builder().sort("n", SortDirection::Desc).offset(1).limit(3).build(),
            |row| {
                seen.push(row.get_i32("n").unwrap());
                Ok(())
            },
        )
        .await
        .unwrap();

    assert_eq!(seen, vec![4, 3, 2]);
}

#[tokio::test]
async fn sync_handler_failure_skips_the_remaining_rows() {
    let store = numbered(4).await;
    let mut seen = Vec::new();

    let err = store
        .collection("rows")
        .for_each_sync(&in_order(), |row| {
            let n = row.get_i32("n").unwrap();
            seen.push(n);

            if n == 2 {
                return Err(StoreError::callback(io::Error::other("stop")));
            }

            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Callback(_)));
    assert_eq!(seen, vec![1, 2]);
}

#[tokio::test]
async fn streams_over_empty_results_complete() {
    let store = numbered(3).await;
    let rows = store.collection("rows");
    let mut driver = rows
        .cursor(&Query::builder().filter(Filter::gt("n", 10)).build())
        .await
        .unwrap();
    let mut calls = 0;

    driver
        .for_each_sync(|_| {
            calls += 1;
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(calls, 0);
    assert_eq!(driver.phase(), StreamPhase::Completed);
    assert!(driver.phase().is_terminal());
}

#[tokio::test]
async fn a_consumed_cursor_cannot_be_replayed() {
    let store = numbered(2).await;
    let rows = store.collection("rows");
    let mut driver = rows.cursor(&in_order()).await.unwrap();

    assert_eq!(driver.phase(), StreamPhase::Idle);
    driver.for_each_sync(|_| Ok(())).await.unwrap();
    assert_eq!(driver.rows_handled(), 2);

    let err = driver.for_each_sync(|_| Ok(())).await.unwrap_err();
    assert!(matches!(err, StoreError::CursorConsumed));
}

#[tokio::test]
async fn writes_during_a_stream_are_not_observed() {
    let store = numbered(3).await;
    let rows = store.collection("rows");
    let mut seen = Vec::new();

    rows.for_each_await(&in_order(), |row| {
        let rows = &rows;
        let n = row.get_i32("n").unwrap();
        seen.push(n);

        async move {
            rows.insert_one(doc! { "n": n + 100 }).await?;
            Ok::<_, StoreError>(())
        }
    })
    .await
    .unwrap();

    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(rows.count(None).await.unwrap(), 6);
}
