// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 有界队列收发 (bounded hand-off between stages)
//!
//! 生产者在队列满时阻塞等待, 不覆盖、不丢弃;
//! 收发都带超时, 以便及时看到停止标志。

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use super::state::PipelineState;

/// 每次等待的最长时间, 之后重新检查停止标志
pub const QUEUE_POLL: Duration = Duration::from_millis(10);

/// 阻塞直到送达; 停止或下游已断开时把数据还回去
pub fn publish<T>(tx: &Sender<T>, item: T, state: &PipelineState) -> Result<(), T> {
    let mut item = item;
    loop {
        match tx.send_timeout(item, QUEUE_POLL) {
            Ok(()) => return Ok(()),
            Err(SendTimeoutError::Timeout(back)) => {
                if !state.is_running() {
                    return Err(back);
                }
                item = back;
            }
            Err(SendTimeoutError::Disconnected(back)) => return Err(back),
        }
    }
}

/// 取下一个; 停止后不再取新数据
pub fn receive<T>(rx: &Receiver<T>, state: &PipelineState) -> Option<T> {
    while state.is_running() {
        match rx.recv_timeout(QUEUE_POLL) {
            Ok(item) => return Some(item),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::StopReason;
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_publish_waits_for_space_and_never_overwrites() {
        let (tx, rx) = bounded::<u32>(1);
        let state = Arc::new(PipelineState::new());
        publish(&tx, 1, &state).unwrap();

        let producer = {
            let state = state.clone();
            thread::spawn(move || publish(&tx, 2, &state))
        };
        thread::sleep(Duration::from_millis(50));
        // 生产者仍在等待, 队列里还是第一个
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.recv().unwrap(), 1);
        assert!(producer.join().unwrap().is_ok());
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn test_publish_full_queue_returns_item_on_stop() {
        let (tx, rx) = bounded::<u32>(1);
        let state = Arc::new(PipelineState::new());
        publish(&tx, 1, &state).unwrap();

        let producer = {
            let state = state.clone();
            thread::spawn(move || publish(&tx, 2, &state))
        };
        thread::sleep(Duration::from_millis(30));
        state.request_stop(StopReason::Requested);

        assert_eq!(producer.join().unwrap(), Err(2));
        assert_eq!(rx.try_recv().unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_receive_stops_pulling_after_stop() {
        let (tx, rx) = bounded::<u32>(4);
        let state = PipelineState::new();
        tx.send(7).unwrap();
        tx.send(8).unwrap();
        assert_eq!(receive(&rx, &state), Some(7));

        state.request_stop(StopReason::Requested);
        assert_eq!(receive(&rx, &state), None);
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_receive_disconnected() {
        let (tx, rx) = bounded::<u32>(1);
        drop(tx);
        assert_eq!(receive(&rx, &PipelineState::new()), None);
    }
}
