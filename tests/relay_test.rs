//! Integration tests: transport ordering and the child-process transport.

mod common;

use common::{settings, START_FEN};
use engine_host::relay::{OutputSink, RelayEventKind};
use engine_host::{AnalysisService, ProcessLauncher, ResultStatus};
use proptest::prelude::*;
use tokio::sync::mpsc;

/// Several producers emit numbered lines at once through clones of one sink.
/// Each producer's lines must arrive in order, once each.
fn relay_preserves_order(producers: usize, per_producer: usize) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();

    runtime.block_on(async {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = OutputSink::new(7, tx);

        let mut tasks = Vec::new();
        for producer in 0..producers {
            let sink = sink.clone();
            tasks.push(tokio::spawn(async move {
                for seq in 0..per_producer {
                    assert!(sink.line(format!("info producer {producer} seq {seq} pv e2e4")));
                    if seq % 7 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(sink);

        let mut next_seq = vec![0usize; producers];
        while let Some(event) = rx.recv().await {
            assert_eq!(event.epoch, 7);
            let RelayEventKind::Line(line) = &event.kind else {
                panic!("unexpected event {:?}", event.kind);
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let producer: usize = tokens[2].parse().unwrap();
            let seq: usize = tokens[4].parse().unwrap();
            assert_eq!(seq, next_seq[producer], "producer {producer} out of order");
            next_seq[producer] += 1;
        }
        assert!(next_seq.iter().all(|n| *n == per_producer));
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn relay_receipt_is_monotonic(producers in 1usize..6, per_producer in 1usize..200) {
        relay_preserves_order(producers, per_producer);
    }
}

/// A shell script standing in for a UCI engine.
#[cfg(unix)]
const SCRIPTED_ENGINE: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name ScriptFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      i=1
      while [ $i -le 30 ]; do
        echo "info depth $i score cp $i pv e2e4 e7e5"
        i=$((i + 1))
      done
      echo "bestmove e2e4 ponder e7e5"
      ;;
    quit) exit 0 ;;
  esac
done
"#;

#[cfg(unix)]
#[tokio::test]
async fn test_process_transport_end_to_end() {
    let launcher = ProcessLauncher::new("sh").with_args(["-c", SCRIPTED_ENGINE]);
    let (service, task) = AnalysisService::spawn(launcher, settings());

    service.start().await.unwrap();
    let result = service.analyze(START_FEN, Some(30)).await;
    assert_eq!(result.status, ResultStatus::Completed);
    assert_eq!(result.best_move, "e2e4");
    // Thirty progress lines in order: the last one wins.
    assert_eq!(result.depth, Some(30));
    assert_eq!(result.evaluation, Some(0.3));

    service.reconfigure(2, 32).await.unwrap();
    let result = service.analyze(START_FEN, None).await;
    assert_eq!(result.status, ResultStatus::Completed);

    service.shutdown().await;
    task.await.unwrap();
}

#[tokio::test]
async fn test_missing_engine_binary() {
    let launcher = ProcessLauncher::new("/nonexistent/stockfish");
    let (service, _task) = AnalysisService::spawn(launcher, settings());

    assert!(service.start().await.is_err());
    assert_eq!(
        service.analyze(START_FEN, None).await.status,
        ResultStatus::Unavailable
    );
}
