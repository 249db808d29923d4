use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{Errno, Fd};

/// Identifiers for clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum Clockid {
    Realtime = 0,
    Monotonic = 1,
    ProcessCputimeId = 2,
    ThreadCputimeId = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Eventtype {
    Clock = 0,
    FdRead = 1,
    FdWrite = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubscriptionKind {
    Clock {
        clock_id: Clockid,
        timeout_ns: u64,
        precision_ns: u64,
        /// `subclockflags::subscription_clock_abstime`.
        is_absolute: bool,
    },
    FdRead {
        fd: Fd,
    },
    FdWrite {
        fd: Fd,
    },
}

/// Subscription to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subscription {
    /// User-provided value that is attached to the subscription and copied
    /// into the resulting event.
    pub userdata: u64,
    pub kind: SubscriptionKind,
}

impl Subscription {
    pub fn event_type(&self) -> Eventtype {
        match self.kind {
            SubscriptionKind::Clock { .. } => Eventtype::Clock,
            SubscriptionKind::FdRead { .. } => Eventtype::FdRead,
            SubscriptionKind::FdWrite { .. } => Eventtype::FdWrite,
        }
    }
}

/// An event that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    pub userdata: u64,
    pub errno: Errno,
    pub event_type: Eventtype,
    /// Bytes available for `fd_read`/`fd_write` events.
    pub bytes_available: u64,
    /// The peer of this socket or pipe has closed or disconnected.
    pub is_hangup: bool,
}

impl Event {
    pub fn clock(userdata: u64, errno: Errno) -> Self {
        Self {
            userdata,
            errno,
            event_type: Eventtype::Clock,
            bytes_available: 0,
            is_hangup: false,
        }
    }

    pub fn fd(subscription: &Subscription, errno: Errno, bytes_available: u64) -> Self {
        Self {
            userdata: subscription.userdata,
            errno,
            event_type: subscription.event_type(),
            bytes_available,
            is_hangup: false,
        }
    }
}
