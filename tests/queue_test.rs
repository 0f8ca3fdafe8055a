/*!
 * Queue Tests
 * FIFO thread queue behaviour checked against a reference model
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::VecDeque;
use uthread::queue::ThreadQueue;
use uthread::Tid;

#[derive(Debug, Clone)]
enum Op {
    Enqueue(u32),
    Dequeue,
    Remove(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..16).prop_map(Op::Enqueue),
        Just(Op::Dequeue),
        (0u32..16).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_matches_vecdeque_model(ops in prop::collection::vec(op(), 0..64)) {
        let mut queue = ThreadQueue::new();
        let mut model: VecDeque<Tid> = VecDeque::new();

        for op in ops {
            match op {
                Op::Enqueue(raw) => {
                    queue.enqueue(Tid(raw));
                    model.push_back(Tid(raw));
                }
                Op::Dequeue => {
                    prop_assert_eq!(queue.dequeue(), model.pop_front());
                }
                Op::Remove(raw) => {
                    let expected = model
                        .iter()
                        .position(|&tid| tid == Tid(raw))
                        .and_then(|pos| model.remove(pos));
                    prop_assert_eq!(queue.remove(Tid(raw)), expected);
                }
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.peek(), model.front().copied());
        }

        prop_assert_eq!(queue.iter().collect::<Vec<_>>(), model.into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn prop_remove_keeps_relative_order(len in 1usize..32, pick in any::<prop::sample::Index>()) {
        let mut queue: ThreadQueue = (0..len as u32).map(Tid).collect();
        let victim = Tid(pick.index(len) as u32);

        prop_assert_eq!(queue.remove(victim), Some(victim));
        prop_assert!(!queue.contains(victim));

        let rest: Vec<Tid> = queue.iter().collect();
        let mut sorted = rest.clone();
        sorted.sort();
        prop_assert_eq!(rest, sorted);
    }
}

#[test]
fn test_duplicate_ids_removed_one_at_a_time() {
    let mut queue: ThreadQueue = [1, 2, 1].into_iter().map(Tid).collect();
    assert_eq!(queue.remove(Tid(1)), Some(Tid(1)));
    assert_eq!(queue.iter().collect::<Vec<_>>(), vec![Tid(2), Tid(1)]);
}
