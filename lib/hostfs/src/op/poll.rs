use wasi_hostfs_types::Subscription;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollInput {
    pub subscriptions: Vec<Subscription>,
}
