use std::sync::Arc;
use std::time::{Duration, Instant};

use wasi_hostfs_types::{Clockid, Errno, Event, Rights, Subscription, SubscriptionKind};

use crate::error::PollError;
use crate::op::PollInput;
use crate::resource::{FdResource, Readiness};

use super::state::FileSystemState;

/// Longest single sleep while waiting for readiness.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

impl FileSystemState {
    pub(super) fn poll(&self, input: PollInput) -> Result<Vec<Event>, PollError> {
        if input.subscriptions.is_empty() {
            return Err(PollError::InvalidArgument(
                "poll requires at least one subscription".to_string(),
            ));
        }
        let started = Instant::now();
        let mut events = Vec::new();
        let mut timers: Vec<(Instant, u64)> = Vec::new();
        let mut watched: Vec<(Subscription, Arc<dyn FdResource>)> = Vec::new();

        for subscription in &input.subscriptions {
            match subscription.kind {
                SubscriptionKind::Clock {
                    clock_id,
                    timeout_ns,
                    is_absolute,
                    ..
                } => {
                    let supported = matches!(clock_id, Clockid::Realtime | Clockid::Monotonic);
                    if is_absolute || !supported {
                        events.push(Event::clock(subscription.userdata, Errno::Inval));
                    } else {
                        let deadline = started + Duration::from_nanos(timeout_ns);
                        timers.push((deadline, subscription.userdata));
                    }
                }
                SubscriptionKind::FdRead { fd } | SubscriptionKind::FdWrite { fd } => {
                    let required = match subscription.kind {
                        SubscriptionKind::FdWrite { .. } => Rights::FD_WRITE,
                        _ => Rights::FD_READ,
                    };
                    match self.fds.get(fd) {
                        None => events.push(Event::fd(subscription, Errno::Badf, 0)),
                        Some(resource) if !resource.rights().has(required) => {
                            events.push(Event::fd(subscription, Errno::Notcapable, 0));
                        }
                        Some(resource) => watched.push((*subscription, resource)),
                    }
                }
            }
        }

        loop {
            for (subscription, resource) in &watched {
                match resource.poll_readiness(subscription.event_type()) {
                    Readiness::Ready { bytes_available } => {
                        events.push(Event::fd(subscription, Errno::Success, bytes_available));
                    }
                    Readiness::Failed(errno) => events.push(Event::fd(subscription, errno, 0)),
                    Readiness::NotReady => {}
                }
            }
            let now = Instant::now();
            events.extend(
                timers
                    .iter()
                    .filter(|(deadline, _)| *deadline <= now)
                    .map(|(_, userdata)| Event::clock(*userdata, Errno::Success)),
            );
            if !events.is_empty() {
                return Ok(events);
            }

            let Some(next_deadline) = timers.iter().map(|(deadline, _)| *deadline).min() else {
                return Err(PollError::Interrupted(
                    "no descriptor became ready and no clock is set".to_string(),
                ));
            };
            let wait = next_deadline.saturating_duration_since(now).min(POLL_INTERVAL);
            tracing::trace!(?wait, "waiting for readiness");
            std::thread::sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use wasi_hostfs_types::{Eventtype, FdRightsBlock, Filestat, STDIN_FD};

    use super::*;
    use crate::backend::BackendKind;
    use crate::error::{CloseError, FdAttributesError, StatError};
    use crate::fd_table::FileDescriptorTable;
    use crate::resolver::PathResolver;
    use crate::resource::FdAttributes;
    use crate::stdio::StandardInputOutput;

    #[derive(Debug)]
    struct NotReady;

    impl FdResource for NotReady {
        fn rights(&self) -> FdRightsBlock {
            FdRightsBlock::STDIO
        }

        fn fd_attributes(&self) -> Result<FdAttributes, FdAttributesError> {
            Err(FdAttributesError::InvalidArgument("unused".to_string()))
        }

        fn stat(&self) -> Result<Filestat, StatError> {
            Ok(Filestat::default())
        }

        fn close(&self) -> Result<(), CloseError> {
            Ok(())
        }

        fn poll_readiness(&self, _event: Eventtype) -> Readiness {
            Readiness::NotReady
        }
    }

    fn state() -> FileSystemState {
        let stdio = StandardInputOutput::new(io::empty(), io::sink(), io::sink());
        let mut entries: Vec<(u32, Arc<dyn FdResource>)> = stdio.into_resources().into();
        entries.push((7, Arc::new(NotReady)));
        FileSystemState::new(
            BackendKind::Std.create().expect("std backend"),
            PathResolver::new(false, None),
            FileDescriptorTable::with_entries(entries),
        )
    }

    fn clock(userdata: u64, clock_id: Clockid, timeout_ns: u64, is_absolute: bool) -> Subscription {
        Subscription {
            userdata,
            kind: SubscriptionKind::Clock {
                clock_id,
                timeout_ns,
                precision_ns: 0,
                is_absolute,
            },
        }
    }

    #[test]
    fn empty_subscription_list_is_invalid() {
        let result = state().poll(PollInput {
            subscriptions: vec![],
        });
        assert!(matches!(result, Err(PollError::InvalidArgument(_))));
    }

    #[test]
    fn stdin_is_ready_and_unknown_fd_is_badf() {
        let subscriptions = vec![
            Subscription {
                userdata: 1,
                kind: SubscriptionKind::FdRead { fd: STDIN_FD },
            },
            Subscription {
                userdata: 2,
                kind: SubscriptionKind::FdRead { fd: 99 },
            },
        ];
        let events = state().poll(PollInput { subscriptions }).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.userdata == 1 && e.errno == Errno::Success));
        assert!(events.iter().any(|e| e.userdata == 2 && e.errno == Errno::Badf));
    }

    #[test]
    fn invalid_clocks_are_reported_as_events() {
        let subscriptions = vec![
            clock(1, Clockid::Realtime, 0, true),
            clock(2, Clockid::ProcessCputimeId, 0, false),
        ];
        let events = state().poll(PollInput { subscriptions }).unwrap();
        assert_eq!(
            events,
            vec![Event::clock(1, Errno::Inval), Event::clock(2, Errno::Inval)]
        );
    }

    #[test]
    fn relative_clock_fires_after_timeout() {
        let started = Instant::now();
        let subscriptions = vec![
            clock(5, Clockid::Monotonic, 20_000_000, false),
            Subscription {
                userdata: 6,
                kind: SubscriptionKind::FdRead { fd: 7 },
            },
        ];
        let events = state().poll(PollInput { subscriptions }).unwrap();
        assert_eq!(events, vec![Event::clock(5, Errno::Success)]);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn nothing_ready_without_clock_is_interrupted() {
        let subscriptions = vec![Subscription {
            userdata: 1,
            kind: SubscriptionKind::FdRead { fd: 7 },
        }];
        let result = state().poll(PollInput { subscriptions });
        assert!(matches!(result, Err(PollError::Interrupted(_))));
    }
}
