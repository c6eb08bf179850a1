//! Singly-linked chain of events sharing one key.
//!
//! The chain links live inside the events themselves (stored in the event arena), the list only keeps
//! head, tail and length. Removing the head is O(1), removing any other event walks the chain.

use crate::arena::Arena;
use crate::event::{Event, EventId};

fn event_mut(events: &mut Arena<Event>, id: EventId) -> &mut Event {
    match events.get_mut(id) {
        Some(event) => event,
        None => panic!("event {:?} is linked but not stored", id),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct EventList {
    head: Option<EventId>,
    tail: Option<EventId>,
    len: usize,
}

impl EventList {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[cfg(test)]
    pub fn head(&self) -> Option<EventId> {
        self.head
    }

    #[cfg(test)]
    pub fn tail(&self) -> Option<EventId> {
        self.tail
    }

    /// Inserts at the tail (FIFO).
    pub fn append(&mut self, events: &mut Arena<Event>, id: EventId) {
        event_mut(events, id).next = None;
        match self.tail {
            Some(tail) => event_mut(events, tail).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        self.len += 1;
    }

    /// Inserts at the head (LIFO).
    pub fn prepend(&mut self, events: &mut Arena<Event>, id: EventId) {
        event_mut(events, id).next = self.head;
        self.head = Some(id);
        if self.tail.is_none() {
            self.tail = Some(id);
        }
        self.len += 1;
    }

    /// Unlinks and returns the head.
    pub fn pop_front(&mut self, events: &mut Arena<Event>) -> Option<EventId> {
        let head = self.head?;
        let next = event_mut(events, head).next.take();
        self.head = next;
        if next.is_none() {
            self.tail = None;
        }
        self.len -= 1;
        Some(head)
    }

    /// Unlinks `id` from the chain. Returns `false` if it is not part of this list.
    pub fn remove(&mut self, events: &mut Arena<Event>, id: EventId) -> bool {
        if self.head == Some(id) {
            self.pop_front(events);
            return true;
        }
        let mut cursor = self.head;
        while let Some(prev) = cursor {
            let next = event_mut(events, prev).next;
            if next == Some(id) {
                let after = event_mut(events, id).next.take();
                event_mut(events, prev).next = after;
                if self.tail == Some(id) {
                    self.tail = Some(prev);
                }
                self.len -= 1;
                return true;
            }
            cursor = next;
        }
        false
    }

    pub fn iter<'a>(&self, events: &'a Arena<Event>) -> Iter<'a> {
        Iter {
            events,
            cursor: self.head,
        }
    }
}

pub(crate) struct Iter<'a> {
    events: &'a Arena<Event>,
    cursor: Option<EventId>,
}

impl Iterator for Iter<'_> {
    type Item = EventId;

    fn next(&mut self) -> Option<EventId> {
        let id = self.cursor?;
        self.cursor = self.events.get(id).and_then(|event| event.next);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::NodeId;

    fn new_event(events: &mut Arena<Event>, owner: u32) -> EventId {
        events.insert(Event::new(Box::new(|_| {}), NodeId::NIL, owner))
    }

    fn owners(list: &EventList, events: &Arena<Event>) -> Vec<u32> {
        list.iter(events)
            .map(|id| events.get(id).unwrap().owner)
            .collect()
    }

    #[test]
    fn fifo_and_lifo_compose() {
        let mut events = Arena::with_capacity(8);
        let mut list = EventList::default();
        let ids: Vec<_> = (0..5).map(|i| new_event(&mut events, i)).collect();
        list.append(&mut events, ids[0]);
        list.append(&mut events, ids[1]);
        list.prepend(&mut events, ids[2]);
        list.prepend(&mut events, ids[3]);
        list.append(&mut events, ids[4]);
        assert_eq!(owners(&list, &events), vec![3, 2, 0, 1, 4]);
        assert_eq!(list.len(), 5);
        assert_eq!(list.tail(), Some(ids[4]));
    }

    #[test]
    fn prepend_into_empty_sets_tail() {
        let mut events = Arena::with_capacity(2);
        let mut list = EventList::default();
        let a = new_event(&mut events, 0);
        let b = new_event(&mut events, 1);
        list.prepend(&mut events, a);
        assert_eq!(list.tail(), Some(a));
        list.append(&mut events, b);
        assert_eq!(owners(&list, &events), vec![0, 1]);
    }

    #[test]
    fn remove_head_middle_and_tail() {
        let mut events = Arena::with_capacity(4);
        let mut list = EventList::default();
        let ids: Vec<_> = (0..4).map(|i| new_event(&mut events, i)).collect();
        for &id in &ids {
            list.append(&mut events, id);
        }
        assert!(list.remove(&mut events, ids[3]));
        assert_eq!(list.tail(), Some(ids[2]));
        assert!(list.remove(&mut events, ids[1]));
        assert!(list.remove(&mut events, ids[0]));
        assert!(!list.remove(&mut events, ids[0]));
        assert_eq!(owners(&list, &events), vec![2]);
        assert_eq!(list.head(), list.tail());

        // appending after a tail removal must link behind the new tail
        let e = new_event(&mut events, 9);
        list.append(&mut events, e);
        assert_eq!(owners(&list, &events), vec![2, 9]);
    }

    #[test]
    fn pop_front_drains_in_order() {
        let mut events = Arena::with_capacity(3);
        let mut list = EventList::default();
        let ids: Vec<_> = (0..3).map(|i| new_event(&mut events, i)).collect();
        for &id in &ids {
            list.append(&mut events, id);
        }
        assert_eq!(list.pop_front(&mut events), Some(ids[0]));
        assert_eq!(list.pop_front(&mut events), Some(ids[1]));
        assert_eq!(list.pop_front(&mut events), Some(ids[2]));
        assert_eq!(list.pop_front(&mut events), None);
        assert!(list.is_empty());
        assert_eq!(list.tail(), None);
        assert_eq!(list.len(), 0);
    }
}
