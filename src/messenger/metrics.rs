//! Messenger counters and reply latency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const NANOSECONDS_PER_MICROSECOND: u128 = 1_000;

/// Counted messenger events.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Counter {
    Sent,
    SentNoReply,
    Received,
    RepliesSent,
    RepliesReceived,
    Unhandled,
    SendFailures,
}

/// Per-messenger counters.
#[derive(Default)]
pub(crate) struct MessengerMetrics {
    sent: AtomicU64,
    sent_no_reply: AtomicU64,
    received: AtomicU64,
    replies_sent: AtomicU64,
    replies_received: AtomicU64,
    unhandled: AtomicU64,
    send_failures: AtomicU64,
    reply_latency_total_ns: AtomicU64,
    reply_latency_max_ns: AtomicU64,
}

impl MessengerMetrics {
    #[inline]
    pub(crate) fn record(&self, counter: Counter) {
        let target = match counter {
            Counter::Sent => &self.sent,
            Counter::SentNoReply => &self.sent_no_reply,
            Counter::Received => &self.received,
            Counter::RepliesSent => &self.replies_sent,
            Counter::RepliesReceived => &self.replies_received,
            Counter::Unhandled => &self.unhandled,
            Counter::SendFailures => &self.send_failures,
        };
        target.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reply_latency(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.reply_latency_total_ns.fetch_add(nanos, Ordering::Relaxed);
        update_max(&self.reply_latency_max_ns, nanos);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sent_messages: self.sent.load(Ordering::Relaxed),
            sent_without_reply: self.sent_no_reply.load(Ordering::Relaxed),
            received_messages: self.received.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            reply_latency_total_ns: self.reply_latency_total_ns.load(Ordering::Relaxed),
            reply_latency_max_ns: self.reply_latency_max_ns.load(Ordering::Relaxed),
        }
    }
}

fn update_max(target: &AtomicU64, candidate: u64) {
    let mut current = target.load(Ordering::Relaxed);
    while candidate > current {
        match target.compare_exchange_weak(current, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(old) => current = old,
        }
    }
}

/// Point-in-time copy of a messenger's counters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Messages sent expecting a reply
    pub sent_messages: u64,
    /// Fire-and-forget messages sent
    pub sent_without_reply: u64,
    /// Inbound messages routed to a handler
    pub received_messages: u64,
    /// Replies sent for inbound messages (including empty ones)
    pub replies_sent: u64,
    /// Replies received for outbound messages
    pub replies_received: u64,
    /// Inbound messages on channels with no handler
    pub unhandled_messages: u64,
    /// Outbound sends that failed synchronously
    pub send_failures: u64,
    /// Sum of send-to-reply latencies
    pub reply_latency_total_ns: u64,
    /// Largest send-to-reply latency
    pub reply_latency_max_ns: u64,
}

impl MetricsSnapshot {
    /// Average send-to-reply latency in microseconds.
    #[must_use]
    pub fn avg_reply_latency_us(&self) -> Option<u64> {
        if self.replies_received == 0 {
            return None;
        }
        let avg = u128::from(self.reply_latency_total_ns)
            / (u128::from(self.replies_received) * NANOSECONDS_PER_MICROSECOND);
        Some(u64::try_from(avg).unwrap_or(u64::MAX))
    }
}
