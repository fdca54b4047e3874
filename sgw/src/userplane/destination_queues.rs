use super::aggregation_queue::AggregationQueue;
use crate::{AggregationConfig, MessageClass};
use std::collections::BTreeMap;
use std::net::IpAddr;

/// The aggregation queues for one base station, one per message class, created on first use.
#[derive(Debug)]
pub struct DestinationQueueSet {
    destination: IpAddr,
    queues: BTreeMap<MessageClass, AggregationQueue>,
}

impl DestinationQueueSet {
    pub fn new(destination: IpAddr) -> Self {
        DestinationQueueSet {
            destination,
            queues: BTreeMap::new(),
        }
    }

    pub fn destination(&self) -> IpAddr {
        self.destination
    }

    pub fn queue_mut(
        &mut self,
        message_class: MessageClass,
        config: &AggregationConfig,
    ) -> &mut AggregationQueue {
        let destination = self.destination;
        self.queues.entry(message_class).or_insert_with(|| {
            AggregationQueue::new(destination, message_class, config.queue_params(message_class))
        })
    }

    pub fn existing_queue_mut(&mut self, message_class: MessageClass) -> Option<&mut AggregationQueue> {
        self.queues.get_mut(&message_class)
    }

    pub fn queue(&self, message_class: MessageClass) -> Option<&AggregationQueue> {
        self.queues.get(&message_class)
    }

    pub fn queues_mut(&mut self) -> impl Iterator<Item = &mut AggregationQueue> {
        self.queues.values_mut()
    }

    pub fn pending_packets(&self) -> usize {
        self.queues.values().map(|q| q.len()).sum()
    }
}
