/*!
 * Thread Table
 *
 * Fixed-capacity slots indexed by thread id. A slot is free only once its
 * thread has exited and its context and stack have been reclaimed, so an id
 * never names two live threads and is never reissued while its stack is still
 * in use.
 *
 * # Allocation
 *
 * Ids are handed out starting just after the most recently allocated id and
 * wrapping around, which spreads reuse across the table instead of recycling
 * the lowest free id.
 */

use super::operations::Entry;
use crate::core::types::{ExitCode, ThreadState, Tid};
use crate::hal::Stack;
use crate::queue::WaitQueue;
use uuid::Uuid;

/// Thread control block
pub(crate) struct Tcb {
    pub state: ThreadState,
    /// Entry code, taken when the dispatcher first primes the thread
    pub entry: Option<Entry>,
    /// Stack while no context runs on it: before the first start, and after
    /// exit until reclaimed
    pub stack: Option<Stack>,
    /// The dispatcher holds a primed context for this thread
    pub resident: bool,
    /// Bumped on every install, distinguishing reuses of the same id
    pub generation: u64,
    /// Set while the thread is switched away, cleared on resumption
    pub suspended: bool,
    /// Deferred kill, observed at the next resumption point
    pub killed: bool,
    /// Exit code delivered to this thread while it waited in a join
    pub delivered: Option<ExitCode>,
    /// Threads joined on this one
    pub joiners: WaitQueue,
}

impl Tcb {
    fn vacant(owner: Uuid) -> Self {
        Self {
            state: ThreadState::Invalid,
            entry: None,
            stack: None,
            resident: false,
            generation: 0,
            suspended: false,
            killed: false,
            delivered: None,
            joiners: WaitQueue::new(owner),
        }
    }

    /// Invalid with nothing left to reclaim
    #[inline]
    pub fn is_free(&self) -> bool {
        self.state == ThreadState::Invalid
            && self.entry.is_none()
            && self.stack.is_none()
            && !self.resident
    }
}

pub(crate) struct ThreadTable {
    slots: Vec<Tcb>,
    last_allocated: Option<Tid>,
    owner: Uuid,
}

impl ThreadTable {
    pub fn new(capacity: usize, owner: Uuid) -> Self {
        Self {
            slots: (0..capacity).map(|_| Tcb::vacant(owner)).collect(),
            last_allocated: None,
            owner,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn in_range(&self, tid: Tid) -> bool {
        tid.index() < self.slots.len()
    }

    pub fn get(&self, tid: Tid) -> Option<&Tcb> {
        self.slots.get(tid.index())
    }

    /// Slot of an id already known to be in range
    #[inline]
    pub fn slot(&self, tid: Tid) -> &Tcb {
        &self.slots[tid.index()]
    }

    #[inline]
    pub fn slot_mut(&mut self, tid: Tid) -> &mut Tcb {
        &mut self.slots[tid.index()]
    }

    /// Next free id after the most recently allocated one, wrapping
    ///
    /// Does not reserve the slot; `install` commits the choice.
    pub fn find_free(&self) -> Option<Tid> {
        let capacity = self.slots.len();
        let start = self.last_allocated.map_or(0, |tid| tid.index() + 1);

        (start..capacity)
            .chain(0..capacity.min(start))
            .find(|&index| self.slots[index].is_free())
            .map(|index| Tid(index as u32))
    }

    /// Occupy a free slot with a new thread in the READY state
    pub fn install(&mut self, tid: Tid, entry: Entry, stack: Stack) {
        let owner = self.owner;
        let slot = self.slot_mut(tid);
        debug_assert!(slot.is_free());

        *slot = Tcb {
            state: ThreadState::Ready,
            entry: Some(entry),
            stack: Some(stack),
            generation: slot.generation.wrapping_add(1),
            ..Tcb::vacant(owner)
        };
        self.last_allocated = Some(tid);
    }

    /// Whether `tid` is a valid thread installed as `generation`
    pub fn is_live(&self, tid: Tid, generation: u64) -> bool {
        self.get(tid)
            .is_some_and(|slot| slot.state.is_valid() && slot.generation == generation)
    }

    /// Ids of slots still holding an entry, stack, or context
    pub fn occupied(&self) -> Vec<Tid> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.is_free())
            .map(|(index, _)| Tid(index as u32))
            .collect()
    }

    /// Ids and states of every valid thread
    pub fn live(&self) -> impl Iterator<Item = (Tid, &Tcb)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state.is_valid())
            .map(|(index, slot)| (Tid(index as u32), slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limits::MIN_STACK_SIZE;

    fn occupy(table: &mut ThreadTable) -> Tid {
        let tid = table.find_free().unwrap();
        table.install(tid, Box::new(|| {}), Stack::allocate(MIN_STACK_SIZE).unwrap());
        tid
    }

    fn vacate(table: &mut ThreadTable, tid: Tid) {
        let slot = table.slot_mut(tid);
        slot.state = ThreadState::Invalid;
        slot.entry = None;
        slot.stack = None;
    }

    #[test]
    fn test_allocation_starts_at_zero() {
        let mut table = ThreadTable::new(4, Uuid::new_v4());
        assert_eq!(occupy(&mut table), Tid(0));
        assert_eq!(occupy(&mut table), Tid(1));
        assert_eq!(table.slot(Tid(1)).state, ThreadState::Ready);
    }

    #[test]
    fn test_reuse_is_spread() {
        let mut table = ThreadTable::new(4, Uuid::new_v4());
        for _ in 0..3 {
            occupy(&mut table);
        }
        vacate(&mut table, Tid(1));

        // Next id follows the last allocation before wrapping to the hole
        assert_eq!(occupy(&mut table), Tid(3));
        assert_eq!(occupy(&mut table), Tid(1));
        assert_eq!(table.find_free(), None);
    }

    #[test]
    fn test_unreclaimed_slot_not_reused() {
        let mut table = ThreadTable::new(2, Uuid::new_v4());
        occupy(&mut table);
        occupy(&mut table);

        // Exited, but its context still runs on the stack
        let slot = table.slot_mut(Tid(0));
        slot.state = ThreadState::Invalid;
        slot.entry = None;
        slot.stack = None;
        slot.resident = true;
        assert_eq!(table.find_free(), None);

        // Context finished and handed its stack back, not yet released
        let slot = table.slot_mut(Tid(0));
        slot.resident = false;
        slot.stack = Some(Stack::allocate(MIN_STACK_SIZE).unwrap());
        assert_eq!(table.find_free(), None);

        table.slot_mut(Tid(0)).stack = None;
        assert_eq!(table.find_free(), Some(Tid(0)));
    }

    #[test]
    fn test_reuse_bumps_generation() {
        let mut table = ThreadTable::new(1, Uuid::new_v4());
        let tid = occupy(&mut table);
        let first = table.slot(tid).generation;
        assert!(table.is_live(tid, first));

        vacate(&mut table, tid);
        assert!(!table.is_live(tid, first));

        assert_eq!(occupy(&mut table), tid);
        assert!(!table.is_live(tid, first));
        assert!(table.is_live(tid, first + 1));
    }

    #[test]
    fn test_cursor_unchanged_until_install() {
        let mut table = ThreadTable::new(3, Uuid::new_v4());
        occupy(&mut table);
        assert_eq!(table.find_free(), Some(Tid(1)));
        assert_eq!(table.find_free(), Some(Tid(1)));
        assert_eq!(table.occupied(), vec![Tid(0)]);
    }
}
